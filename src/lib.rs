//! Build-time configuration of ESPHome network OTA updates.
//!
//! Two steps run once per build on the parsed device configuration:
//!
//! 1. [`endpoint::merge_declarations`] folds the `esphome` OTA declarations
//!    into one declaration per port, rejecting conflicting duplicates.
//! 2. [`planner::plan_helper_partition`] makes sure the OTA helper partition
//!    requested by those declarations exists, either in the user's own
//!    partition table or in a generated dual-partition table.
//!
//! [`SystemConfig::finalize`] runs both in order.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod partition;
pub mod planner;

mod csv;

pub use config::{
    BuildContext,
    ChipFamily,
    Esp32Config,
    SystemConfig,
};
pub use endpoint::{
    merge,
    merge_declarations,
    Identifier,
    MergeOutcome,
    OtaDeclaration,
    OtaMode,
    OWN_PLATFORM,
};
pub use error::Error;
pub use partition::{
    PartitionRegion,
    PartitionTable,
    MAX_PARTITION_NAME_LENGTH,
};
pub use planner::{
    dual_partition_table,
    plan_helper_partition,
    FlashLayout,
    FlashSize,
    HelperPartitionPlan,
    GENERATED_PARTITIONS_FILE,
};
