//! OTA endpoint declarations and the per-port merge of duplicates.
//!
//! Several packages of a device configuration may each declare an `esphome`
//! OTA endpoint. Declarations sharing a port are folded into one, as long as
//! their `version`, explicit `id` and `password` agree.

use std::collections::HashMap;
use std::fmt;

use serde::{
    Deserialize,
    Deserializer,
};
use serde_yaml::{
    Mapping,
    Value,
};

use crate::config::{
    BuildContext,
    ChipFamily,
    SystemConfig,
};
use crate::error::Error;

/// Platform discriminator of the OTA endpoints handled by this crate.
pub const OWN_PLATFORM: &str = "esphome";

/// OTA protocol version used when a declaration does not name one.
pub const DEFAULT_OTA_VERSION: u8 = 2;

/// The identifier of a declaration.
///
/// Generated identifiers never conflict with each other or with a manual one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Written by the user as `id:`.
    Manual(String),
    /// Assigned while loading the configuration.
    Generated(String),
}

impl Identifier {
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Manual(id) | Self::Generated(id) => id,
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::Generated(String::new())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Manual)
    }
}

/// Where an incoming image is buffered before it is written to flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtaMode {
    Standard,
    Psram,
}

/// One entry of the `ota:` list.
///
/// Only `platform` is shared by every OTA platform. The remaining typed
/// fields are those of the `esphome` platform; keys of other platforms end up
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OtaDeclaration {
    pub platform: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub version: Option<u8>,
    #[serde(default)]
    pub id: Identifier,
    #[serde(default)]
    pub mode: Option<OtaMode>,
    #[serde(default)]
    pub target_partition: Option<String>,
    #[serde(default)]
    pub ota_helper_partition: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl OtaDeclaration {
    /// An `esphome` declaration on `port` with the default version and a
    /// generated identifier.
    pub fn esphome(port: u16) -> Self {
        Self {
            platform: OWN_PLATFORM.to_string(),
            port: Some(port),
            version: Some(DEFAULT_OTA_VERSION),
            ..Default::default()
        }
    }
}

/// Result of [`merge_declarations`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Foreign declarations in their original order, followed by one merged
    /// declaration per port in the order the ports were first seen.
    pub declarations: Vec<OtaDeclaration>,
    /// Ports that had more than one declaration, in encounter order.
    pub merged_ports: Vec<u16>,
    platform: String,
}

impl MergeOutcome {
    /// Log a single warning if any port needed a merge.
    pub fn report(&self) {
        if !self.merged_ports.is_empty() {
            log::warn!(
                "Found and merged multiple configurations for ota platform {} port(s) {:?}",
                self.platform,
                self.merged_ports
            );
        }
    }
}

/// Merge `incoming` into `acc`, two declarations for the same port.
///
/// Fails if the versions differ, if both carry different manual identifiers,
/// or if both carry different passwords. Otherwise values already present on
/// `acc` are kept and only the gaps are filled from `incoming`; a manual
/// identifier replaces a generated one.
pub fn merge(mut acc: OtaDeclaration, incoming: OtaDeclaration) -> Result<OtaDeclaration, Error> {
    let port = acc.port.or(incoming.port).unwrap_or_default();

    if acc.version != incoming.version {
        return Err(Error::InconsistentField {
            field: "version",
            port,
            detail: format!(
                " ({} vs {})",
                display_version(acc.version),
                display_version(incoming.version)
            ),
        });
    }

    if let (Identifier::Manual(existing), Identifier::Manual(other)) = (&acc.id, &incoming.id) {
        if existing != other {
            return Err(Error::InconsistentField {
                field: "id",
                port,
                detail: format!(" ({} vs {})", existing, other),
            });
        }
    }

    if let (Some(existing), Some(other)) = (&acc.password, &incoming.password) {
        if existing != other {
            // Never echo passwords into build logs.
            return Err(Error::InconsistentField {
                field: "password",
                port,
                detail: String::new(),
            });
        }
    }

    if acc.id.is_generated() && !incoming.id.is_generated() {
        acc.id = incoming.id;
    }
    acc.port = acc.port.or(incoming.port);
    acc.password = acc.password.or(incoming.password);
    acc.mode = acc.mode.or(incoming.mode);
    acc.target_partition = acc.target_partition.or(incoming.target_partition);
    acc.ota_helper_partition = acc.ota_helper_partition.or(incoming.ota_helper_partition);
    merge_mapping(&mut acc.extra, incoming.extra);

    Ok(acc)
}

/// Fold every declaration of `platform` into one declaration per port.
///
/// Declarations of other platforms are passed through unchanged. Nothing is
/// returned on a conflict, so the caller's list stays as it was.
pub fn merge_declarations(
    declarations: &[OtaDeclaration],
    platform: &str,
) -> Result<MergeOutcome, Error> {
    let mut foreign = Vec::new();
    let mut merged: Vec<OtaDeclaration> = Vec::new();
    let mut index_by_port: HashMap<u16, usize> = HashMap::new();
    let mut merged_ports = Vec::new();

    for declaration in declarations {
        if declaration.platform != platform {
            foreign.push(declaration.clone());
            continue;
        }

        let port = declaration.port.ok_or_else(|| Error::MissingPort {
            platform: declaration.platform.clone(),
        })?;

        match index_by_port.get(&port) {
            Some(&index) => {
                let acc = std::mem::take(&mut merged[index]);
                merged[index] = merge(acc, declaration.clone())?;
                if !merged_ports.contains(&port) {
                    merged_ports.push(port);
                }
            }
            None => {
                index_by_port.insert(port, merged.len());
                merged.push(declaration.clone());
            }
        }
    }

    foreign.extend(merged);
    Ok(MergeOutcome {
        declarations: foreign,
        merged_ports,
        platform: platform.to_string(),
    })
}

/// Reject `mode: psram` unless the target is an ESP32 with a `psram` section.
pub fn validate_psram_mode(config: &SystemConfig, context: &BuildContext) -> Result<(), Error> {
    let psram_requested = config.ota.iter().any(|declaration| {
        declaration.platform == OWN_PLATFORM && declaration.mode == Some(OtaMode::Psram)
    });
    if !psram_requested {
        return Ok(());
    }

    if context.chip != ChipFamily::Esp32 {
        return Err(Error::UnsupportedChip {
            feature: "mode: psram",
            chip: context.chip.to_string(),
        });
    }
    if !config.has_section("psram") {
        return Err(Error::PsramUnavailable(
            "PSRAM OTA mode requires the psram component".to_string(),
        ));
    }

    log::warn!("PSRAM OTA mode enabled - initial flash via serial required");
    Ok(())
}

// Additive: keys already in `target` win, nested mappings are merged key by key.
fn merge_mapping(target: &mut Mapping, incoming: Mapping) {
    for (key, value) in incoming {
        if !target.contains_key(&key) {
            target.insert(key, value);
            continue;
        }
        if let (Some(Value::Mapping(existing)), Value::Mapping(nested)) =
            (target.get_mut(&key), value)
        {
            merge_mapping(existing, nested);
        }
    }
}

fn display_version(version: Option<u8>) -> String {
    version.map_or_else(|| "unset".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreign(platform: &str) -> OtaDeclaration {
        OtaDeclaration {
            platform: platform.to_string(),
            ..Default::default()
        }
    }

    fn manual(port: u16, id: &str) -> OtaDeclaration {
        OtaDeclaration {
            id: Identifier::Manual(id.to_string()),
            ..OtaDeclaration::esphome(port)
        }
    }

    #[test]
    fn test_merge_identical_is_idempotent() {
        let declaration = OtaDeclaration {
            password: Some("secret".to_string()),
            ota_helper_partition: Some("app_b".to_string()),
            ..manual(3232, "ota_main")
        };

        let merged = merge(declaration.clone(), declaration.clone()).unwrap();
        assert_eq!(merged, declaration);
    }

    #[test]
    fn test_version_conflict() {
        let first = OtaDeclaration::esphome(3232);
        let second = OtaDeclaration {
            version: Some(1),
            ..OtaDeclaration::esphome(3232)
        };

        match merge(first, second) {
            Err(Error::InconsistentField { field, port, .. }) => {
                assert_eq!(field, "version");
                assert_eq!(port, 3232);
            }
            other => panic!("Expected version conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_id_conflict() {
        let result = merge(manual(3232, "ota_a"), manual(3232, "ota_b"));
        assert!(matches!(
            result,
            Err(Error::InconsistentField { field: "id", .. })
        ));
    }

    #[test]
    fn test_generated_id_never_conflicts() {
        let generated = OtaDeclaration {
            id: Identifier::Generated("esphome_ota_1".to_string()),
            ..OtaDeclaration::esphome(3232)
        };

        let merged = merge(generated.clone(), manual(3232, "ota_a")).unwrap();
        assert_eq!(merged.id, Identifier::Manual("ota_a".to_string()));

        let merged = merge(manual(3232, "ota_a"), generated).unwrap();
        assert_eq!(merged.id, Identifier::Manual("ota_a".to_string()));
    }

    #[test]
    fn test_password_conflict_is_not_echoed() {
        let first = OtaDeclaration {
            password: Some("hunter2".to_string()),
            ..OtaDeclaration::esphome(3232)
        };
        let second = OtaDeclaration {
            password: Some("letmein".to_string()),
            ..OtaDeclaration::esphome(3232)
        };

        let err = merge(first, second).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("password"));
        assert!(!message.contains("hunter2"));
        assert!(!message.contains("letmein"));
    }

    #[test]
    fn test_merge_is_additive() {
        let first = OtaDeclaration {
            target_partition: Some("ota_0".to_string()),
            ..OtaDeclaration::esphome(3232)
        };
        let second = OtaDeclaration {
            password: Some("secret".to_string()),
            target_partition: Some("ota_1".to_string()),
            ota_helper_partition: Some("app_b".to_string()),
            ..OtaDeclaration::esphome(3232)
        };

        let merged = merge(first, second).unwrap();
        assert_eq!(merged.target_partition.as_deref(), Some("ota_0"));
        assert_eq!(merged.password.as_deref(), Some("secret"));
        assert_eq!(merged.ota_helper_partition.as_deref(), Some("app_b"));
    }

    #[test]
    fn test_extra_keys_merge_recursively() {
        let mut first = OtaDeclaration::esphome(3232);
        first.extra = serde_yaml::from_str("on_begin:\n  then: log_a\n").unwrap();
        let mut second = OtaDeclaration::esphome(3232);
        second.extra = serde_yaml::from_str(
            "on_begin:\n  then: log_b\n  else: log_c\non_end: log_d\n",
        )
        .unwrap();

        let merged = merge(first, second).unwrap();
        let expected: Mapping = serde_yaml::from_str(
            "on_begin:\n  then: log_a\n  else: log_c\non_end: log_d\n",
        )
        .unwrap();
        assert_eq!(merged.extra, expected);
    }

    #[test]
    fn test_foreign_order_preserved() {
        let declarations = vec![
            foreign("http_request"),
            OtaDeclaration::esphome(3232),
            foreign("web_server"),
            OtaDeclaration::esphome(3232),
            foreign("http_request"),
            OtaDeclaration::esphome(8266),
        ];

        let outcome = merge_declarations(&declarations, OWN_PLATFORM).unwrap();
        let platforms: Vec<&str> = outcome
            .declarations
            .iter()
            .map(|declaration| declaration.platform.as_str())
            .collect();
        assert_eq!(
            platforms,
            ["http_request", "web_server", "http_request", "esphome", "esphome"]
        );

        let ports: Vec<Option<u16>> = outcome.declarations[3..]
            .iter()
            .map(|declaration| declaration.port)
            .collect();
        assert_eq!(ports, [Some(3232), Some(8266)]);
        assert_eq!(outcome.merged_ports, [3232]);
    }

    #[test]
    fn test_merged_ports_reported_once() {
        let declarations = vec![
            OtaDeclaration::esphome(3232),
            OtaDeclaration::esphome(3232),
            OtaDeclaration::esphome(3232),
        ];

        let outcome = merge_declarations(&declarations, OWN_PLATFORM).unwrap();
        assert_eq!(outcome.declarations.len(), 1);
        assert_eq!(outcome.merged_ports, [3232]);
    }

    #[test]
    fn test_own_declaration_without_port() {
        let declarations = vec![OtaDeclaration {
            port: None,
            ..OtaDeclaration::esphome(0)
        }];

        assert!(matches!(
            merge_declarations(&declarations, OWN_PLATFORM),
            Err(Error::MissingPort { .. })
        ));
    }
}
