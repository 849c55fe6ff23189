//! Configuration management for telemon
//!
//! The monitor configuration is a fixed, ordered list of per-class records,
//! each with a fixed set of named parameters. A loaded list is only accepted
//! when its shape matches the canonical defaults exactly; otherwise it is
//! replaced by the defaults wholesale.

use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Monitor class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorType {
    Cpu,
    Ram,
    Gpu,
    Hd,
    Network,
    Mainboard,
}

impl MonitorType {
    /// Position in the refresh pass: CPU, GPU, RAM, disks, network, board
    pub fn refresh_rank(&self) -> u8 {
        match self {
            MonitorType::Cpu => 0,
            MonitorType::Gpu => 1,
            MonitorType::Ram => 2,
            MonitorType::Hd => 3,
            MonitorType::Network => 4,
            MonitorType::Mainboard => 5,
        }
    }
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorType::Cpu => write!(f, "CPU"),
            MonitorType::Ram => write!(f, "RAM"),
            MonitorType::Gpu => write!(f, "GPU"),
            MonitorType::Hd => write!(f, "Drives"),
            MonitorType::Network => write!(f, "Network"),
            MonitorType::Mainboard => write!(f, "Mainboard"),
        }
    }
}

/// Parameter name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKey {
    HardwareNames,
    UseFahrenheit,
    AllCoreClocks,
    CoreLoads,
    TempAlert,
    DriveDetails,
    UsedSpaceAlert,
    BandwidthInAlert,
    BandwidthOutAlert,
    UseBytes,
}

/// Parameter value: a flag or an integer threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
}

impl ParamValue {
    fn same_variant(&self, other: &ParamValue) -> bool {
        matches!(
            (self, other),
            (ParamValue::Bool(_), ParamValue::Bool(_)) | (ParamValue::Int(_), ParamValue::Int(_))
        )
    }
}

/// One named parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParam {
    pub key: ParamKey,
    pub value: ParamValue,
}

impl ConfigParam {
    pub fn flag(key: ParamKey, value: bool) -> Self {
        Self {
            key,
            value: ParamValue::Bool(value),
        }
    }

    pub fn int(key: ParamKey, value: i64) -> Self {
        Self {
            key,
            value: ParamValue::Int(value),
        }
    }
}

/// Lookups over a parameter list. Missing keys and mismatched variants read
/// as `false` / `0`.
pub trait ParamsExt {
    fn get_bool(&self, key: ParamKey) -> bool;
    fn get_int(&self, key: ParamKey) -> i64;
}

impl ParamsExt for [ConfigParam] {
    fn get_bool(&self, key: ParamKey) -> bool {
        self.iter()
            .find(|p| p.key == key)
            .map(|p| matches!(p.value, ParamValue::Bool(true)))
            .unwrap_or(false)
    }

    fn get_int(&self, key: ParamKey) -> i64 {
        self.iter()
            .find(|p| p.key == key)
            .and_then(|p| match p.value {
                ParamValue::Int(v) => Some(v),
                ParamValue::Bool(_) => None,
            })
            .unwrap_or(0)
    }
}

/// Per-class configuration record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    pub enabled: bool,
    pub order: u8,
    pub params: Vec<ConfigParam>,
}

impl MonitorConfig {
    /// Canonical configuration
    pub fn defaults() -> Vec<MonitorConfig> {
        use ParamKey::*;

        vec![
            MonitorConfig {
                monitor_type: MonitorType::Cpu,
                enabled: true,
                order: 0,
                params: vec![
                    ConfigParam::flag(HardwareNames, true),
                    ConfigParam::flag(UseFahrenheit, false),
                    ConfigParam::flag(AllCoreClocks, true),
                    ConfigParam::flag(CoreLoads, true),
                    ConfigParam::int(TempAlert, 0),
                ],
            },
            MonitorConfig {
                monitor_type: MonitorType::Ram,
                enabled: true,
                order: 1,
                params: vec![ConfigParam::flag(HardwareNames, true)],
            },
            MonitorConfig {
                monitor_type: MonitorType::Gpu,
                enabled: true,
                order: 2,
                params: vec![
                    ConfigParam::flag(HardwareNames, true),
                    ConfigParam::flag(UseFahrenheit, false),
                    ConfigParam::int(TempAlert, 0),
                ],
            },
            MonitorConfig {
                monitor_type: MonitorType::Hd,
                enabled: true,
                order: 3,
                params: vec![
                    ConfigParam::flag(HardwareNames, true),
                    ConfigParam::flag(UseFahrenheit, false),
                    ConfigParam::flag(DriveDetails, false),
                    ConfigParam::int(UsedSpaceAlert, 0),
                ],
            },
            MonitorConfig {
                monitor_type: MonitorType::Network,
                enabled: true,
                order: 4,
                params: vec![
                    ConfigParam::int(BandwidthInAlert, 0),
                    ConfigParam::int(BandwidthOutAlert, 0),
                    ConfigParam::flag(UseBytes, false),
                ],
            },
            MonitorConfig {
                monitor_type: MonitorType::Mainboard,
                enabled: true,
                order: 5,
                params: vec![
                    ConfigParam::flag(HardwareNames, true),
                    ConfigParam::flag(UseFahrenheit, false),
                    ConfigParam::int(TempAlert, 0),
                ],
            },
        ]
    }

    /// Validate a loaded configuration against the canonical shape.
    ///
    /// Any mismatch (record count, missing or duplicated class, parameter
    /// count, parameter key at any position, value variant) yields the
    /// canonical defaults; there is no partial merge. A valid configuration
    /// is returned sorted by `order`.
    pub fn check(config: Option<Vec<MonitorConfig>>) -> Vec<MonitorConfig> {
        let defaults = Self::defaults();
        let Some(mut config) = config else {
            return defaults;
        };

        if let Err(reason) = Self::validate(&config, &defaults) {
            warn!("Monitor configuration reset to defaults: {}", reason);
            return defaults;
        }

        config.sort_by_key(|c| c.order);
        config
    }

    fn validate(config: &[MonitorConfig], defaults: &[MonitorConfig]) -> Result<()> {
        if config.len() != defaults.len() {
            return Err(Error::Config(format!(
                "expected {} monitor records, found {}",
                defaults.len(),
                config.len()
            )));
        }

        for canonical in defaults {
            let matching: Vec<&MonitorConfig> = config
                .iter()
                .filter(|c| c.monitor_type == canonical.monitor_type)
                .collect();
            let record = match matching.as_slice() {
                [record] => *record,
                _ => {
                    return Err(Error::Config(format!(
                        "{} record missing or duplicated",
                        canonical.monitor_type
                    )))
                }
            };

            if record.params.len() != canonical.params.len() {
                return Err(Error::Config(format!(
                    "{} expects {} params, found {}",
                    canonical.monitor_type,
                    canonical.params.len(),
                    record.params.len()
                )));
            }

            let shape_matches = record
                .params
                .iter()
                .zip(&canonical.params)
                .all(|(p, d)| p.key == d.key && p.value.same_variant(&d.value));
            if !shape_matches {
                return Err(Error::Config(format!(
                    "{} params do not match the canonical keys",
                    canonical.monitor_type
                )));
            }
        }

        Ok(())
    }

    /// Record for a class, if present
    pub fn find(config: &[MonitorConfig], monitor_type: MonitorType) -> Option<&MonitorConfig> {
        config.iter().find(|c| c.monitor_type == monitor_type)
    }
}

/// Persistent telemon settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Refresh interval in milliseconds
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u32,
    /// Per-class monitor records
    #[serde(default = "MonitorConfig::defaults")]
    pub monitors: Vec<MonitorConfig>,
}

fn default_update_interval() -> u32 {
    2000 // 2 seconds
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval(),
            monitors: MonitorConfig::defaults(),
        }
    }
}

impl Settings {
    /// Get the default configuration directory
    ///
    /// Returns `~/.config/telemon` on Unix-like systems,
    /// or `%APPDATA%\telemon` on Windows.
    pub fn default_path() -> PathBuf {
        let config_dir = if cfg!(windows) {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from(".config"))
        };

        config_dir.join("telemon")
    }

    /// Load settings from the default path; a missing file yields defaults
    pub fn load() -> Result<Self> {
        let config_file = Self::default_path().join("config.toml");

        if !config_file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_file)
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse settings from TOML text, validating the monitor records
    pub fn parse(contents: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(contents)
            .map_err(|e| Error::Parse(format!("Failed to parse config: {}", e)))?;
        settings.monitors = MonitorConfig::check(Some(settings.monitors));
        Ok(settings)
    }

    /// Save settings to the default path
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::default_path();
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize config: {}", e)))
    }

    /// Record for a class, if present
    pub fn monitor(&self, monitor_type: MonitorType) -> Option<&MonitorConfig> {
        MonitorConfig::find(&self.monitors, monitor_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let settings = Settings::default();
        assert_eq!(settings.update_interval_ms, 2000);
        assert_eq!(settings.monitors.len(), 6);

        let cpu = settings.monitor(MonitorType::Cpu).unwrap();
        assert!(cpu.params.get_bool(ParamKey::HardwareNames));
        assert!(!cpu.params.get_bool(ParamKey::UseFahrenheit));
        assert_eq!(cpu.params.get_int(ParamKey::TempAlert), 0);
    }

    #[test]
    fn test_check_accepts_canonical_shape() {
        let mut config = MonitorConfig::defaults();
        config[0].params[4] = ConfigParam::int(ParamKey::TempAlert, 85);
        config[1].enabled = false;

        let checked = MonitorConfig::check(Some(config.clone()));
        assert_eq!(checked, config);
    }

    #[test]
    fn test_check_resets_truncated_params() {
        let mut config = MonitorConfig::defaults();
        config[0].params[4] = ConfigParam::int(ParamKey::TempAlert, 85);
        config[1].params.truncate(0);
        config[4].params.truncate(1);

        assert_eq!(MonitorConfig::check(Some(config)), MonitorConfig::defaults());
    }

    #[test]
    fn test_check_resets_reordered_keys() {
        let mut config = MonitorConfig::defaults();
        config[2].params.swap(0, 1);
        assert_eq!(MonitorConfig::check(Some(config)), MonitorConfig::defaults());
    }

    #[test]
    fn test_check_resets_wrong_variant() {
        let mut config = MonitorConfig::defaults();
        config[0].params[0] = ConfigParam::int(ParamKey::HardwareNames, 1);
        assert_eq!(MonitorConfig::check(Some(config)), MonitorConfig::defaults());
    }

    #[test]
    fn test_check_resets_missing_record() {
        let mut config = MonitorConfig::defaults();
        config.pop();
        assert_eq!(MonitorConfig::check(Some(config)), MonitorConfig::defaults());

        let mut config = MonitorConfig::defaults();
        config[5].monitor_type = MonitorType::Cpu;
        assert_eq!(MonitorConfig::check(Some(config)), MonitorConfig::defaults());

        assert_eq!(MonitorConfig::check(None), MonitorConfig::defaults());
    }

    #[test]
    fn test_check_sorts_by_order() {
        let mut config = MonitorConfig::defaults();
        config[0].order = 9;
        let checked = MonitorConfig::check(Some(config));
        assert_eq!(checked.last().unwrap().monitor_type, MonitorType::Cpu);
    }

    #[test]
    fn test_config_serialization() {
        let mut settings = Settings::default();
        settings.monitors[3].params[2] = ConfigParam::flag(ParamKey::DriveDetails, true);

        let toml_str = settings.to_toml().unwrap();
        let deserialized = Settings::parse(&toml_str).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_parse_with_broken_records_falls_back() {
        let text = r#"
            update_interval_ms = 1000

            [[monitors]]
            type = "Cpu"
            enabled = true
            order = 0
            params = [{ key = "HardwareNames", value = true }]
        "#;
        let settings = Settings::parse(text).unwrap();
        assert_eq!(settings.update_interval_ms, 1000);
        assert_eq!(settings.monitors, MonitorConfig::defaults());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.update_interval_ms = 500;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_params_lookup_defaults() {
        let params = [ConfigParam::flag(ParamKey::UseBytes, true)];
        assert!(params.get_bool(ParamKey::UseBytes));
        assert!(!params.get_bool(ParamKey::CoreLoads));
        assert_eq!(params.get_int(ParamKey::UseBytes), 0);
    }
}
