use esphome_ota_config::{
    Error,
    PartitionRegion,
    PartitionTable,
};
use pretty_assertions::assert_eq;

#[test]
fn test_comments_and_blank_lines_are_ignored() {
    let annotated = PartitionTable::from_csv_file("tests/assets/partitions_app_b.csv").unwrap();
    let stripped =
        PartitionTable::from_csv_file("tests/assets/partitions_app_b_stripped.csv").unwrap();

    assert_eq!(annotated, stripped);
    assert_eq!(annotated.regions.len(), 5);
}

#[test]
fn test_regions_keep_file_order() {
    let table = PartitionTable::from_csv_file("tests/assets/partitions_app_b.csv").unwrap();
    let names: Vec<&str> = table.regions.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["nvs", "otadata", "app_a", "app_b", "spiffs"]);

    let spiffs = table.find("spiffs").unwrap();
    assert_eq!(spiffs.subtype, "spiffs");
    assert_eq!(spiffs.size, "");
}

#[test]
fn test_malformed_row_names_the_file() {
    let result = PartitionTable::from_csv_file("tests/assets/partitions_malformed.csv");
    match result {
        Err(Error::PartitionFileParse { path, source }) => {
            assert!(path.ends_with("partitions_malformed.csv"));
            assert!(matches!(*source, Error::MalformedRow { line: 2, .. }));
        }
        other => panic!("Expected PartitionFileParse, got {:?}", other),
    }
}

#[test]
fn test_missing_file_names_the_file() {
    let err = PartitionTable::from_csv_file("tests/assets/does_not_exist.csv").unwrap_err();
    assert!(err.to_string().contains("does_not_exist.csv"));
}

#[test]
fn test_written_table_reads_back() {
    let table = PartitionTable::from_csv_file("tests/assets/partitions_app_b.csv").unwrap();
    let content = table.to_csv(&["Copied table"]).unwrap();

    assert!(content.starts_with("# Copied table\n"));
    assert_eq!(PartitionTable::from_csv(&content).unwrap(), table);
}

#[test]
fn test_written_table_with_csv_syntax_in_names_reads_back() {
    let mut table = PartitionTable::from_csv_file("tests/assets/partitions_app_b.csv").unwrap();
    table
        .regions
        .push(PartitionRegion::new("app,c", "app", "ota_2", "", "0x100000"));
    table
        .regions
        .push(PartitionRegion::new("\"fs", "data", "spiffs", "", "0x10000"));

    let content = table.to_csv(&[]).unwrap();
    let reread = PartitionTable::from_csv(&content).unwrap();

    assert_eq!(reread, table);
    assert_eq!(reread.find("app,c").unwrap().subtype, "ota_2");
}
