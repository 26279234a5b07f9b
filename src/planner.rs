//! Decides how the OTA helper partition is provided: either found in the
//! user's own partition table, or through a generated dual-partition table.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use strum::VariantNames;

use crate::config::{
    BuildContext,
    ChipFamily,
    Esp32Config,
    SystemConfig,
};
use crate::endpoint::OWN_PLATFORM;
use crate::error::Error;
use crate::partition::consts::{
    MAIN_APP_NAME,
    MAIN_APP_OFFSET,
    NVS_NAME,
    NVS_OFFSET,
    OTADATA_NAME,
    OTADATA_SIZE,
    PHY_INIT_NAME,
    PHY_INIT_SIZE,
    RESERVED_NAMES,
};
use crate::partition::{
    PartitionRegion,
    PartitionTable,
};

/// File name of the generated table, inside the configuration directory.
pub const GENERATED_PARTITIONS_FILE: &str = "partitions.csv";

/// Flash sizes a dual-partition table can be generated for.
///
/// This is a closed set on purpose; other sizes need a custom table.
#[derive(
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::VariantNames,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
pub enum FlashSize {
    #[strum(serialize = "4MB")]
    Size4Mb,
    #[strum(serialize = "8MB")]
    Size8Mb,
    #[strum(serialize = "16MB")]
    Size16Mb,
    #[strum(serialize = "32MB")]
    Size32Mb,
}

/// Region sizes of the generated table for one flash size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    pub main_size: u32,
    pub helper_size: u32,
    pub nvs_size: u32,
}

impl FlashSize {
    pub fn layout(self) -> FlashLayout {
        let main_size = match self {
            Self::Size4Mb => 0x2F0000,
            Self::Size8Mb => 0x6F0000,
            Self::Size16Mb => 0xEF0000,
            Self::Size32Mb => 0x1EF0000,
        };
        FlashLayout {
            main_size,
            helper_size: 0x100000,
            nvs_size: 0x6000,
        }
    }
}

/// How the OTA helper partition requirement was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperPartitionPlan {
    /// No declaration asks for a helper partition.
    NotRequested,
    /// The user's partition table already contains a suitable app partition.
    CustomTable {
        path: PathBuf,
        partition: PartitionRegion,
    },
    /// A dual-partition table was written to `path`.
    Generated {
        path: PathBuf,
        flash_size: FlashSize,
        layout: FlashLayout,
        table: PartitionTable,
    },
}

/// Plan the OTA helper partition requested by the merged `esphome` OTA
/// declarations of `config`.
///
/// With a custom table configured in the `esp32` section the table must
/// contain an `app` partition of the requested name. Without one, a table
/// for the configured flash size is generated and written to
/// [`GENERATED_PARTITIONS_FILE`] in the configuration directory, replacing
/// any existing file.
pub fn plan_helper_partition(
    config: &SystemConfig,
    context: &BuildContext,
) -> Result<HelperPartitionPlan, Error> {
    let helper = config
        .ota
        .iter()
        .filter(|declaration| declaration.platform == OWN_PLATFORM)
        .find_map(|declaration| declaration.ota_helper_partition.as_deref());

    let Some(helper) = helper else {
        return Ok(HelperPartitionPlan::NotRequested);
    };

    if context.chip != ChipFamily::Esp32 {
        return Err(Error::UnsupportedChip {
            feature: "ota_helper_partition",
            chip: context.chip.to_string(),
        });
    }

    let default_esp32 = Esp32Config::default();
    let esp32 = config.esp32.as_ref().unwrap_or(&default_esp32);

    match &esp32.partitions {
        Some(custom) => check_custom_table(context, custom, helper),
        None => generate_dual_partition_table(context, helper, esp32.flash_size()),
    }
}

fn check_custom_table(
    context: &BuildContext,
    custom: &Path,
    helper: &str,
) -> Result<HelperPartitionPlan, Error> {
    let path = context.relative_config_path(custom);
    if !path.exists() {
        return Err(Error::PartitionFileNotFound(path));
    }

    let table = PartitionTable::from_csv_file(&path)?;
    let region = table
        .find(helper)
        .ok_or_else(|| Error::PartitionNotFound {
            path: path.clone(),
            name: helper.to_string(),
        })?;

    if !region.is_app() {
        return Err(Error::NotAppPartition {
            name: helper.to_string(),
            found: region.region_type.to_lowercase(),
        });
    }

    log::info!(
        "Using custom partitions.csv with OTA helper partition '{}'",
        helper
    );

    Ok(HelperPartitionPlan::CustomTable {
        path,
        partition: region.clone(),
    })
}

fn generate_dual_partition_table(
    context: &BuildContext,
    helper: &str,
    flash_size: &str,
) -> Result<HelperPartitionPlan, Error> {
    let flash_size: FlashSize = flash_size
        .parse()
        .map_err(|_| Error::UnsupportedFlashSize {
            got: flash_size.to_string(),
            supported: FlashSize::VARIANTS.join(", "),
        })?;

    let table = dual_partition_table(helper, flash_size)?;
    let comment = format!("Auto-generated for dual-partition OTA (flash_size={flash_size})");
    let content = table.to_csv(&["ESP-IDF Partition Table", &comment])?;

    let path = context.relative_config_path(GENERATED_PARTITIONS_FILE);
    fs::write(&path, content).map_err(|source| Error::PartitionFileWrite {
        path: path.clone(),
        source,
    })?;

    let layout = flash_size.layout();
    log::info!(
        "Auto-generated dual-partition table: {} (main={:#X}, {}={:#X})",
        path.display(),
        layout.main_size,
        helper,
        layout.helper_size
    );

    Ok(HelperPartitionPlan::Generated {
        path,
        flash_size,
        layout,
        table,
    })
}

/// Build the five-region dual-partition table for `flash_size`, with the
/// helper partition called `helper` as the second OTA slot.
///
/// Only the nvs and main app regions get explicit offsets, the others follow
/// their predecessor.
pub fn dual_partition_table(helper: &str, flash_size: FlashSize) -> Result<PartitionTable, Error> {
    if RESERVED_NAMES.contains(&helper) {
        return Err(Error::ReservedPartitionName(helper.to_string()));
    }

    let layout = flash_size.layout();
    Ok(PartitionTable {
        regions: vec![
            PartitionRegion::new(NVS_NAME, "data", "nvs", &hex(NVS_OFFSET), &hex(layout.nvs_size)),
            PartitionRegion::new(OTADATA_NAME, "data", "ota", "", &hex(OTADATA_SIZE)),
            PartitionRegion::new(PHY_INIT_NAME, "data", "phy", "", &hex(PHY_INIT_SIZE)),
            PartitionRegion::new(
                MAIN_APP_NAME,
                "app",
                "ota_0",
                &hex(MAIN_APP_OFFSET),
                &hex(layout.main_size),
            ),
            PartitionRegion::new(helper, "app", "ota_1", "", &hex(layout.helper_size)),
        ],
    })
}

// Partition tables spell sizes as upper-case hex with a 0x prefix.
fn hex(value: u32) -> String {
    format!("{value:#X}")
}
