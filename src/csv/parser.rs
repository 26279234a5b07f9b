use crate::error::Error;
use crate::partition::consts::COLUMN_COUNT;
use crate::partition::{
    PartitionRegion,
    PartitionTable,
};

/// Parse partition table CSV content from a string into a [`PartitionTable`].
///
/// ESP-IDF partition tables have no header row, so columns are positional:
/// `name, type, subtype, offset, size, flags`.
pub(crate) fn parse_csv(content: &str) -> Result<PartitionTable, Error> {
    // Comment detection has to look past leading whitespace, which the csv
    // crate's comment option does not, so filter lines up front and remember
    // where each kept line came from.
    let mut source_lines = Vec::new();
    let mut filtered = String::with_capacity(content.len());
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        filtered.push_str(line);
        filtered.push('\n');
        source_lines.push(index + 1);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(filtered.as_bytes());

    let mut table = PartitionTable::default();
    for result in reader.records() {
        let record = result?;
        let line = record
            .position()
            .and_then(|pos| source_lines.get((pos.line() as usize).saturating_sub(1)))
            .copied()
            .unwrap_or_default();

        if record.len() > COLUMN_COUNT {
            return Err(Error::MalformedRow {
                line,
                reason: format!(
                    "expected at most {} columns, found {}",
                    COLUMN_COUNT,
                    record.len()
                ),
            });
        }

        let region: PartitionRegion = record.deserialize(None).map_err(|e| Error::MalformedRow {
            line,
            reason: e.to_string(),
        })?;
        table.regions.push(region);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_row() {
        let table = parse_csv("nvs, data, nvs, 0x9000, 0x6000, encrypted\n").unwrap();
        assert_eq!(table.regions.len(), 1);

        let region = &table.regions[0];
        assert_eq!(region.name, "nvs");
        assert_eq!(region.region_type, "data");
        assert_eq!(region.subtype, "nvs");
        assert_eq!(region.offset, "0x9000");
        assert_eq!(region.size, "0x6000");
        assert_eq!(region.flags, "encrypted");
    }

    #[test]
    fn test_missing_trailing_columns_are_empty() {
        let table = parse_csv("app_b, app\n").unwrap();
        let region = &table.regions[0];
        assert_eq!(region.name, "app_b");
        assert_eq!(region.region_type, "app");
        assert_eq!(region.subtype, "");
        assert_eq!(region.offset, "");
        assert_eq!(region.size, "");
        assert_eq!(region.flags, "");
    }

    #[test]
    fn test_indented_comment_is_skipped() {
        let content = "   # Name, Type, SubType\n\n\t\nfactory, app, factory, 0x10000, 1M\n";
        let table = parse_csv(content).unwrap();
        assert_eq!(table.regions.len(), 1);
        assert_eq!(table.regions[0].name, "factory");
    }

    #[test]
    fn test_too_many_columns_reports_source_line() {
        let content = "# header\nnvs, data, nvs, 0x9000, 0x6000,\n\nbad, app, ota_0, , 1M, , extra\n";
        match parse_csv(content) {
            Err(Error::MalformedRow { line, .. }) => assert_eq!(line, 4),
            other => panic!("Expected MalformedRow, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_content() {
        let table = parse_csv("# only a comment\n\n").unwrap();
        assert!(table.regions.is_empty());
    }
}
