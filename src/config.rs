//! Process configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot file (env: DB_PATH)
    pub db_path: PathBuf,
    /// HTTP port (env: PORT). Not used by the core.
    pub server_port: u16,
    /// Time between scheduled sales reports (env: REPORT_INTERVAL_SECS)
    pub report_interval: Duration,
    /// Directory for report files (env: REPORT_OUTPUT_DIR, empty disables)
    pub report_output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("database.json"),
            server_port: 8080,
            report_interval: Duration::from_secs(300),
            report_output_dir: Some(PathBuf::from("reports")),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let report_interval = match lookup("REPORT_INTERVAL_SECS") {
            Some(value) => match value.trim().parse::<u64>().ok() {
                Some(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "REPORT_INTERVAL_SECS",
                        value,
                    })
                }
            },
            None => defaults.report_interval,
        };

        let server_port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?,
            None => defaults.server_port,
        };

        let report_output_dir = match lookup("REPORT_OUTPUT_DIR") {
            Some(dir) if dir.trim().is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => defaults.report_output_dir,
        };

        Ok(Self {
            db_path: lookup("DB_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            server_port,
            report_interval,
            report_output_dir,
        })
    }
}
