//! Device configuration using Figment.
//!
//! Settings are loaded from a TOML file and then overridden by environment
//! variables prefixed with `DAQDEV_`:
//!
//! ```text
//! DAQDEV_LOG_LEVEL=debug
//! ```
//!
//! # Example file
//!
//! ```toml
//! log_level = "info"
//!
//! [[devices]]
//! name = "det1"
//! label = "Mandelbrot Detector"
//! level = 3
//! require_metrics = true
//!
//! [[devices]]
//! name = "inner_scan"
//! role = "MALCOLM"
//! supported_scan_modes = ["HARDWARE", "MASTER"]
//! primary_scan_device = false
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::device::{DeviceRole, ScanMode};
use crate::error::{DeviceError, DeviceResult};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level settings for a set of devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Device definitions
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Construction-time configuration of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device name
    pub name: String,
    /// Display label; the name is shown when absent
    #[serde(default)]
    pub label: Option<String>,
    /// Ordering priority, lower runs first
    #[serde(default = "default_level")]
    pub level: i32,
    /// Kind of device, `HARDWARE` unless set
    #[serde(default)]
    pub role: DeviceRole,
    /// Accepted scan modes, `SOFTWARE` unless set
    #[serde(default = "default_scan_modes")]
    pub supported_scan_modes: BTreeSet<ScanMode>,
    /// False for devices nested inside another device's scan
    #[serde(default = "default_true")]
    pub primary_scan_device: bool,
    /// Time every completed point and log run totals
    #[serde(default)]
    pub require_metrics: bool,
    /// Selected for the next scan
    #[serde(default)]
    pub activated: bool,
}

impl DeviceConfig {
    /// Configuration with every field at its default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            level: default_level(),
            role: DeviceRole::default(),
            supported_scan_modes: default_scan_modes(),
            primary_scan_device: true,
            require_metrics: false,
            activated: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_level() -> i32 {
    1
}

fn default_scan_modes() -> BTreeSet<ScanMode> {
    BTreeSet::from([ScanMode::Software])
}

fn default_true() -> bool {
    true
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            devices: Vec::new(),
        }
    }
}

impl DeviceSettings {
    /// Load settings from `path`, then apply `DAQDEV_` environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DeviceResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed("DAQDEV_")),
        )
    }

    /// Parse settings from a TOML string. Environment is not consulted.
    pub fn from_toml_str(toml: &str) -> DeviceResult<Self> {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> DeviceResult<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings after loading.
    ///
    /// Checks:
    /// - Log level is valid
    /// - Device names are non-empty and unique
    /// - Every device supports at least one scan mode
    pub fn validate(&self) -> DeviceResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(DeviceError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(DeviceError::Configuration(
                    "Device name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(DeviceError::Configuration(format!(
                    "Duplicate device name '{}'",
                    device.name
                )));
            }
            if device.supported_scan_modes.is_empty() {
                return Err(DeviceError::Configuration(format!(
                    "Device '{}' must support at least one scan mode",
                    device.name
                )));
            }
        }
        Ok(())
    }

    /// Configuration of the device called `name`.
    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Render settings in the same TOML layout `load_from` reads.
    pub fn to_toml_string(&self) -> DeviceResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DeviceError::Configuration(format!("Cannot serialize settings: {e}")))
    }

    /// Write settings to `path`, replacing any existing file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> DeviceResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|e| {
            DeviceError::Configuration(format!("Cannot write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const SAMPLE: &str = r#"
log_level = "debug"

[[devices]]
name = "det1"
label = "Mandelbrot Detector"
level = 3
require_metrics = true

[[devices]]
name = "inner_scan"
role = "MALCOLM"
supported_scan_modes = ["HARDWARE", "MASTER"]
primary_scan_device = false
"#;

    #[test]
    fn test_parse_with_defaults() {
        let settings = DeviceSettings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.devices.len(), 2);

        let det = settings.device("det1").unwrap();
        assert_eq!(det.level, 3);
        assert_eq!(det.role, DeviceRole::Hardware);
        assert_eq!(det.supported_scan_modes, default_scan_modes());
        assert!(det.primary_scan_device);
        assert!(det.require_metrics);

        let inner = settings.device("inner_scan").unwrap();
        assert_eq!(inner.level, 1);
        assert_eq!(inner.role, DeviceRole::Malcolm);
        assert!(!inner.primary_scan_device);
        assert!(inner.supported_scan_modes.contains(&ScanMode::Master));
    }

    #[test]
    fn test_invalid_log_level() {
        let result = DeviceSettings::from_toml_str("log_level = \"loud\"");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid log_level"));
    }

    #[test]
    fn test_duplicate_device_names() {
        let toml = "[[devices]]\nname = \"a\"\n[[devices]]\nname = \"a\"\n";
        let err = DeviceSettings::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("Duplicate device name"));
    }

    #[test]
    fn test_empty_scan_modes_rejected() {
        let toml = "[[devices]]\nname = \"a\"\nsupported_scan_modes = []\n";
        assert!(DeviceSettings::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_unknown_role_is_load_error() {
        let toml = "[[devices]]\nname = \"a\"\nrole = \"TOASTER\"\n";
        let err = DeviceSettings::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, DeviceError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        std::env::set_var("DAQDEV_LOG_LEVEL", "warn");
        let settings = DeviceSettings::load_from(file.path());
        std::env::remove_var("DAQDEV_LOG_LEVEL");

        let settings = settings.unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.devices.len(), 2);
    }

    #[test]
    #[serial]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.toml");
        let settings = DeviceSettings::from_toml_str(SAMPLE).unwrap();

        settings.save_to(&path).unwrap();
        let reloaded = DeviceSettings::load_from(&path).unwrap();

        assert_eq!(reloaded.devices, settings.devices);
        assert_eq!(reloaded.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_defaults() {
        let settings = DeviceSettings::load_from("/nonexistent/devices.toml").unwrap();
        assert_eq!(settings.log_level, "info");
        assert!(settings.devices.is_empty());
    }
}
