//! The whole-system configuration tree and the build context derived from it.

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Deserializer,
};
use serde_yaml::Mapping;
use strum::IntoEnumIterator;

use crate::endpoint::{
    Identifier,
    OtaDeclaration,
    DEFAULT_OTA_VERSION,
    OWN_PLATFORM,
};
use crate::error::Error;
use crate::partition::validate_partition_name;

/// Flash size assumed when the `esp32` section does not name one.
pub const DEFAULT_FLASH_SIZE: &str = "4MB";

/// Keys of an `esphome` OTA declaration that now belong to `safe_mode`.
const MOVED_TO_SAFE_MODE: [&str; 3] = ["num_attempts", "reboot_timeout", "safe_mode"];

/// The target platform of a build, detected from the top-level platform key.
#[derive(
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[strum(serialize_all = "lowercase")]
pub enum ChipFamily {
    Esp32,
    Esp8266,
    Rp2040,
    Bk72xx,
    Ln882x,
    Rtl87xx,
}

impl ChipFamily {
    /// Port the OTA listener binds to when the declaration omits one.
    pub fn default_ota_port(self) -> u16 {
        match self {
            Self::Esp32 => 3232,
            Self::Esp8266 => 8266,
            Self::Rp2040 => 2040,
            Self::Bk72xx | Self::Rtl87xx => 8892,
            Self::Ln882x => 8820,
        }
    }
}

/// Hardware settings from the `esp32` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Esp32Config {
    #[serde(default)]
    pub board: Option<String>,
    /// Flash-size class such as `4MB`.
    #[serde(default)]
    pub flash_size: Option<String>,
    /// Custom partition table, relative to the configuration directory.
    #[serde(default)]
    pub partitions: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Esp32Config {
    pub fn flash_size(&self) -> &str {
        self.flash_size.as_deref().unwrap_or(DEFAULT_FLASH_SIZE)
    }
}

/// The parsed configuration of a whole device.
///
/// Only the keys this crate works on are typed; every other top-level key is
/// carried in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub ota: Vec<OtaDeclaration>,
    /// `esp32:` with an empty body still selects the platform.
    #[serde(default, deserialize_with = "present_section")]
    pub esp32: Option<Esp32Config>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl SystemConfig {
    /// Parse a configuration from YAML and apply the OTA schema defaults.
    ///
    /// See [`SystemConfig::apply_defaults`].
    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        let mut config: SystemConfig = serde_yaml::from_str(content)?;
        config.apply_defaults()?;
        Ok(config)
    }

    /// Read and parse the YAML configuration at `path`.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Detect the target platform from the top-level platform key.
    pub fn chip_family(&self) -> Result<ChipFamily, Error> {
        if self.esp32.is_some() {
            return Ok(ChipFamily::Esp32);
        }
        ChipFamily::iter()
            .find(|chip| {
                let key: &'static str = (*chip).into();
                self.has_section(key)
            })
            .ok_or_else(|| Error::UnknownPlatform {
                expected: ChipFamily::iter()
                    .map(|chip| chip.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Whether an opaque top-level section called `key` is present.
    pub fn has_section(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    /// Fill in and check the schema defaults of the OTA declarations that
    /// belong to this crate's platform.
    ///
    /// - the former safe mode keys are rejected;
    /// - `version` must be 1 or 2;
    /// - a missing `port` becomes the chip family's default OTA port;
    /// - a missing `id` becomes a generated identifier;
    /// - partition names must fit the ESP-IDF name limit.
    pub fn apply_defaults(&mut self) -> Result<(), Error> {
        let chip = self.chip_family().ok();

        for (index, declaration) in self.ota.iter_mut().enumerate() {
            if declaration.platform != OWN_PLATFORM {
                continue;
            }

            if let Some(key) = MOVED_TO_SAFE_MODE
                .iter()
                .find(|key| declaration.extra.contains_key(**key))
            {
                return Err(Error::InvalidValue {
                    field: *key,
                    reason: "'safe_mode' (and its related configuration variables) has moved \
                             from 'ota' to its own component. See \
                             https://esphome.io/components/safe_mode"
                        .to_string(),
                });
            }

            let version = *declaration.version.get_or_insert(DEFAULT_OTA_VERSION);
            if !matches!(version, 1 | 2) {
                return Err(Error::InvalidValue {
                    field: "version",
                    reason: format!("{} is not one of 1, 2", version),
                });
            }

            if declaration.port.is_none() {
                let chip = chip.ok_or_else(|| Error::MissingPort {
                    platform: declaration.platform.clone(),
                })?;
                declaration.port = Some(chip.default_ota_port());
            }

            if declaration.id.is_generated() && declaration.id.as_str().is_empty() {
                declaration.id =
                    Identifier::Generated(format!("{}_ota_{}", OWN_PLATFORM, index));
            }

            if let Some(name) = &declaration.target_partition {
                validate_partition_name("target_partition", name)?;
            }
            if let Some(name) = &declaration.ota_helper_partition {
                validate_partition_name("ota_helper_partition", name)?;
            }
        }

        Ok(())
    }

    /// Merge the OTA declarations, check the PSRAM mode and plan the OTA
    /// helper partition, in that order.
    ///
    /// The merged declaration list only replaces `ota` once merging succeeded.
    pub fn finalize(
        &mut self,
        context: &BuildContext,
    ) -> Result<crate::planner::HelperPartitionPlan, Error> {
        let merged = crate::endpoint::merge_declarations(&self.ota, OWN_PLATFORM)?;
        merged.report();
        self.ota = merged.declarations;

        crate::endpoint::validate_psram_mode(self, context)?;
        crate::planner::plan_helper_partition(self, context)
    }
}

fn present_section<'de, D>(deserializer: D) -> Result<Option<Esp32Config>, D::Error>
where
    D: Deserializer<'de>,
{
    let section = Option::<Esp32Config>::deserialize(deserializer)?;
    Ok(Some(section.unwrap_or_default()))
}

/// Per-build context handed to the planner instead of global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub chip: ChipFamily,
    /// Directory holding the device configuration; relative paths in the
    /// configuration and generated files live here.
    pub config_dir: PathBuf,
}

impl BuildContext {
    pub fn new<P: Into<PathBuf>>(chip: ChipFamily, config_dir: P) -> Self {
        Self {
            chip,
            config_dir: config_dir.into(),
        }
    }

    /// Build a context for `config`, detecting the chip family from it.
    pub fn for_config<P: Into<PathBuf>>(
        config: &SystemConfig,
        config_dir: P,
    ) -> Result<Self, Error> {
        Ok(Self::new(config.chip_family()?, config_dir))
    }

    /// Resolve `path` against the configuration directory.
    pub fn relative_config_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.config_dir.join(path)
    }
}
