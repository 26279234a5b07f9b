// ESP-IDF partition name limit (16 bytes, the on-flash entry holds no terminator)
pub const MAX_PARTITION_NAME_LENGTH: usize = 16;

// Anchor offsets of the generated dual-partition table
pub const NVS_OFFSET: u32 = 0x9000;
pub const MAIN_APP_OFFSET: u32 = 0x10000;

// Fixed region sizes
pub const OTADATA_SIZE: u32 = 0x2000;
pub const PHY_INIT_SIZE: u32 = 0x1000;

// Region names used by the generated table
pub const NVS_NAME: &str = "nvs";
pub const OTADATA_NAME: &str = "otadata";
pub const PHY_INIT_NAME: &str = "phy_init";
pub const MAIN_APP_NAME: &str = "main";

pub const RESERVED_NAMES: [&str; 4] = [NVS_NAME, OTADATA_NAME, PHY_INIT_NAME, MAIN_APP_NAME];

// Columns of a partition table row
pub const COLUMN_COUNT: usize = 6;
