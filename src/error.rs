use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the configuration, merging OTA
/// declarations or planning the OTA helper partition.
///
/// Every variant is fatal for the current build and carries enough context
/// (field, port, partition name or path) to fix the configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unable to detect the target platform, expected one of: {expected}")]
    UnknownPlatform { expected: String },

    #[error("ota declaration for platform '{platform}' has no port")]
    MissingPort { platform: String },

    #[error("found multiple configurations for port {port} but {field} is inconsistent{detail}")]
    InconsistentField {
        field: &'static str,
        port: u16,
        detail: String,
    },

    #[error("'{feature}' is only supported on the esp32 platform, not on {chip}")]
    UnsupportedChip { feature: &'static str, chip: String },

    #[error("{0}")]
    PsramUnavailable(String),

    #[error("custom partitions file '{}' not found", .0.display())]
    PartitionFileNotFound(PathBuf),

    #[error("failed to parse custom partitions file '{}': {source}", .path.display())]
    PartitionFileParse {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error(
        "custom partitions file '{}' does not contain partition named '{name}'. \
         When using 'ota_helper_partition', your custom partition table must include this partition as an 'app' type.",
        .path.display()
    )]
    PartitionNotFound { path: PathBuf, name: String },

    #[error("partition '{name}' must be of type 'app', got '{found}'")]
    NotAppPartition { name: String, found: String },

    #[error(
        "dual-partition OTA with 'ota_helper_partition' requires supported flash size. \
         Got '{got}', supported: {supported}. For custom layouts, provide your own partitions.csv file."
    )]
    UnsupportedFlashSize { got: String, supported: String },

    #[error("partition name '{0}' is reserved by the generated partition table")]
    ReservedPartitionName(String),

    #[error("failed to write partition table '{}': {source}", .path.display())]
    PartitionFileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
