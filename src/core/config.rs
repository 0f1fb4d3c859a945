//! Environment-sourced configuration.
//!
//! Everything has a workable default so a bare `warren init` starts a
//! local store; replica sync and OAuth2 stay disabled until their
//! variables are set.

use crate::core::error::StoreError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Default superuser seeded on first run; both must be set.
    pub admin_email: String,
    pub admin_pass: String,
    /// Remote store of record for the embedded replica; empty disables
    /// background sync.
    pub replica_url: String,
    pub replica_token: String,
    pub sync_interval: Duration,
    pub dev: bool,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub github_client_id: String,
    pub github_client_secret: String,
}

fn var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, StoreError> {
        let interval_raw = var("WARREN_SYNC_INTERVAL_SECS", "");
        let sync_interval = if interval_raw.is_empty() {
            Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS)
        } else {
            let secs: u64 = interval_raw.parse().map_err(|_| {
                StoreError::Config(format!(
                    "WARREN_SYNC_INTERVAL_SECS must be an integer, got {:?}",
                    interval_raw
                ))
            })?;
            Duration::from_secs(secs)
        };
        let dev = matches!(var("WARREN_DEV", "false").as_str(), "1" | "true");
        Ok(Self {
            data_dir: PathBuf::from(var("WARREN_DATA_DIR", "./data")),
            admin_email: var("WARREN_ADMIN_EMAIL", ""),
            admin_pass: var("WARREN_ADMIN_PASS", ""),
            replica_url: var("WARREN_REPLICA_URL", ""),
            replica_token: var("WARREN_REPLICA_TOKEN", ""),
            sync_interval,
            dev,
            google_client_id: var("WARREN_GOOGLE_CLIENT_ID", ""),
            google_client_secret: var("WARREN_GOOGLE_CLIENT_SECRET", ""),
            github_client_id: var("WARREN_GITHUB_CLIENT_ID", ""),
            github_client_secret: var("WARREN_GITHUB_CLIENT_SECRET", ""),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            admin_email: String::new(),
            admin_pass: String::new(),
            replica_url: String::new(),
            replica_token: String::new(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            dev: false,
            google_client_id: String::new(),
            google_client_secret: String::new(),
            github_client_id: String::new(),
            github_client_secret: String::new(),
        }
    }
}
