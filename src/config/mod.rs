use std::env;
use std::path::{Path, PathBuf};

use crate::models::Credentials;
use crate::utils::timeout_millis;

/// Fatal configuration problems; any of these aborts the run before a device is contacted
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("inventory file missing: {0}")]
    InventoryMissing(PathBuf),

    #[error("inventory file {path} is malformed: {message}")]
    InventoryMalformed { path: PathBuf, message: String },

    #[error("output directory {path} is not writable: {source}")]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid setting {key}={value}")]
    InvalidSetting { key: &'static str, value: String },
}

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub inventory_dir: PathBuf,
    pub output_dir: PathBuf,
    pub num_workers: usize,
    pub customer_name: String,
    pub ssh_timeout_secs: u64,
    /// Default device credentials; `None` when the environment doesn't provide them
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Result<Self, ConfigError> {
        let num_workers = parse_env("NUM_WORKERS", "10")?;
        if num_workers == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "NUM_WORKERS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            inventory_dir: PathBuf::from(get_env("INVENTORY_DIR", "inventory")),
            output_dir: PathBuf::from(get_env("OUTPUT_DIR", ".")),
            num_workers,
            customer_name: get_env("CUSTOMER_NAME", "Customer"),
            ssh_timeout_secs: checked_timeout(parse_env("SSH_TIMEOUT_SECS", "30")?)?,
            credentials: credentials_from_env(),
        })
    }

    pub fn facts_dir(&self) -> PathBuf {
        self.output_dir.join("facts")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.output_dir.join("configs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }
}

/// SSH timeouts must be non-zero and fit the session's millisecond timer
fn checked_timeout(secs: u64) -> Result<u64, ConfigError> {
    if secs == 0 || timeout_millis(secs).is_err() {
        return Err(ConfigError::InvalidSetting {
            key: "SSH_TIMEOUT_SECS",
            value: secs.to_string(),
        });
    }
    Ok(secs)
}

/// Create `dir` if needed and prove it accepts writes
pub fn ensure_writable(dir: &Path) -> Result<(), ConfigError> {
    let not_writable = |source| ConfigError::OutputNotWritable {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(not_writable)?;
    let probe = dir.join(".netsurvey-write-probe");
    std::fs::write(&probe, b"").map_err(not_writable)?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// Read default credentials; both variables must be present and non-empty
fn credentials_from_env() -> Option<Credentials> {
    let username = env::var("NET_USERNAME").ok().filter(|s| !s.is_empty())?;
    let password = env::var("NET_PASSWORD").ok().filter(|s| !s.is_empty())?;
    Some(Credentials::new(username, password))
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = get_env(key, default);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSetting { key, value })
}
