pub(crate) mod consts;

use std::fs;
use std::path::Path;

pub use consts::MAX_PARTITION_NAME_LENGTH;

use crate::error::Error;

/// A single row of an ESP-IDF partition table.
///
/// All fields are kept as written in the table. `offset` and `flags` are
/// frequently blank: a blank offset means the region follows the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(default)]
pub struct PartitionRegion {
    pub name: String,
    #[serde(rename = "type")]
    pub region_type: String,
    pub subtype: String,
    pub offset: String,
    pub size: String,
    pub flags: String,
}

impl PartitionRegion {
    /// Create a region without flags.
    pub fn new(name: &str, region_type: &str, subtype: &str, offset: &str, size: &str) -> Self {
        Self {
            name: name.to_string(),
            region_type: region_type.to_string(),
            subtype: subtype.to_string(),
            offset: offset.to_string(),
            size: size.to_string(),
            flags: String::new(),
        }
    }

    /// Whether this region holds an application image. The type column is
    /// compared case-insensitively.
    pub fn is_app(&self) -> bool {
        self.region_type.eq_ignore_ascii_case("app")
    }
}

/// An ordered list of partition regions as found in a `partitions.csv` file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionTable {
    pub regions: Vec<PartitionRegion>,
}

impl PartitionTable {
    /// Parse partition table CSV content from a string.
    ///
    /// Blank lines and lines starting with `#` are skipped. Missing trailing
    /// columns are read as empty strings.
    pub fn from_csv(content: &str) -> Result<Self, Error> {
        crate::csv::parser::parse_csv(content)
    }

    /// Read and parse the partition table at `path`.
    ///
    /// Read and parse failures are reported as [`Error::PartitionFileParse`]
    /// naming the file.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|content| Self::from_csv(&content))
            .map_err(|e| Error::PartitionFileParse {
                path: path.to_path_buf(),
                source: Box::new(e),
            })
    }

    /// Render the table in the native, column-aligned format, preceded by
    /// one `#` comment line per entry of `header`.
    pub fn to_csv(&self, header: &[&str]) -> Result<String, Error> {
        crate::csv::writer::write_csv_content(self, header)
    }

    /// Find the first region called `name`.
    pub fn find(&self, name: &str) -> Option<&PartitionRegion> {
        self.regions.iter().find(|region| region.name == name)
    }
}

/// Validate that a partition name is non-empty, fits the ESP-IDF limit and
/// can be written to a table as a plain cell.
pub(crate) fn validate_partition_name(field: &'static str, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidValue {
            field,
            reason: "partition name must not be empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| matches!(*c, ',' | '"' | '\n' | '\r')) {
        return Err(Error::InvalidValue {
            field,
            reason: format!("partition name {:?} must not contain {:?}", name, c),
        });
    }
    if name.len() > MAX_PARTITION_NAME_LENGTH {
        return Err(Error::InvalidValue {
            field,
            reason: format!(
                "partition name '{}' is too long (max {} characters)",
                name, MAX_PARTITION_NAME_LENGTH
            ),
        });
    }
    Ok(())
}
