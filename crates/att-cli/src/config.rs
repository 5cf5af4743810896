//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use att_core::ReconcileConfig;
use att_device::{AnyDevice, ExportFileDevice, HttpDevice};
use chrono_tz::Tz;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Timezone the terminals' clocks and the work calendars run on.
    pub timezone: Tz,

    /// Directory for per-terminal lock files.
    pub state_dir: PathBuf,

    /// Only stage punches from the last N local days (0 = today only).
    /// Unset stages everything the terminal returns.
    pub lookback_days: Option<u32>,

    /// Upper bound for every terminal operation.
    pub device_timeout_secs: u64,

    pub reconcile: ReconcileSettings,

    pub devices: Vec<DeviceConfig>,
}

/// Reconciliation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Let a day-shift check-out close a session opened on an earlier day.
    pub cross_day_checkout: bool,
}

/// One configured terminal. Exactly one of `url` and `export_path` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,
}

impl DeviceConfig {
    /// Builds the adapter for this terminal.
    pub fn connect_with(&self, timeout: Duration) -> Result<AnyDevice> {
        match (&self.url, &self.export_path) {
            (Some(url), None) => Ok(AnyDevice::Http(HttpDevice::new(&self.name, url, timeout)?)),
            (None, Some(path)) => Ok(AnyDevice::ExportFile(ExportFileDevice::new(
                &self.name, path,
            ))),
            (Some(_), Some(_)) => bail!("device {} sets both url and export_path", self.name),
            (None, None) => bail!("device {} needs a url or an export_path", self.name),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("timezone", &self.timezone.name())
            .field("state_dir", &self.state_dir)
            .field("lookback_days", &self.lookback_days)
            .field("device_timeout_secs", &self.device_timeout_secs)
            .field("devices", &self.devices.len())
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let state_dir = dirs_state_path().unwrap_or_else(|| data_dir.clone());
        Self {
            database_path: data_dir.join("att.db"),
            timezone: Tz::UTC,
            state_dir,
            lookback_days: None,
            device_timeout_secs: 30,
            reconcile: ReconcileSettings::default(),
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ATT_*, ATT_RECONCILE__CROSS_DAY_CHECKOUT)
        figment = figment.merge(Env::prefixed("ATT_").split("__"));

        figment.extract()
    }

    pub const fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            timezone: self.timezone,
            cross_day_checkout: self.reconcile.cross_day_checkout,
        }
    }

    pub const fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs)
    }

    /// Looks up a configured terminal by name.
    pub fn device(&self, name: &str) -> Result<&DeviceConfig> {
        match self.devices.iter().find(|device| device.name == name) {
            Some(device) => Ok(device),
            None => bail!("no device named {name} in configuration"),
        }
    }
}

/// Returns the platform-specific config directory for att.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("att"))
}

/// Returns the platform-specific data directory for att.
///
/// On Linux: `~/.local/share/att`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("att"))
}

/// Returns the platform-specific state directory for att.
///
/// On Linux: `~/.local/state/att`
pub fn dirs_state_path() -> Option<PathBuf> {
    dirs::state_dir().map(|p| p.join("att"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dirs_data_path_ends_with_att() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "att");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("att.db"));
        assert_eq!(config.timezone, Tz::UTC);
        assert!(!config.reconcile.cross_day_checkout);
    }

    #[test]
    fn load_from_file_reads_devices_and_timezone() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/att-test.db"
timezone = "Asia/Yangon"
lookback_days = 0

[reconcile]
cross_day_checkout = true

[[devices]]
name = "gate"
url = "http://10.0.0.5:8080"

[[devices]]
name = "usb"
export_path = "/mnt/usb/1_attlog.dat"
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/att-test.db"));
        assert_eq!(config.timezone, Tz::Asia__Yangon);
        assert_eq!(config.lookback_days, Some(0));
        assert!(config.reconcile_config().cross_day_checkout);
        assert_eq!(config.devices.len(), 2);
        assert!(config.device("usb").is_ok());
        assert!(config.device("dock").is_err());
    }

    #[test]
    fn device_needs_exactly_one_source() {
        let timeout = Duration::from_secs(1);
        let neither = DeviceConfig {
            name: "gate".to_string(),
            url: None,
            export_path: None,
        };
        assert!(neither.connect_with(timeout).is_err());

        let both = DeviceConfig {
            url: Some("http://10.0.0.5".to_string()),
            export_path: Some(PathBuf::from("/tmp/attlog.dat")),
            ..neither.clone()
        };
        assert!(both.connect_with(timeout).is_err());

        let export = DeviceConfig {
            export_path: Some(PathBuf::from("/tmp/attlog.dat")),
            ..neither
        };
        assert!(matches!(
            export.connect_with(timeout).unwrap(),
            AnyDevice::ExportFile(_)
        ));
    }
}
