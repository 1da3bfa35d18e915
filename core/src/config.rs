// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;

/// The name of the application.
pub const APP_NAME: &str = "crmdav";

/// The name of the database file inside the state directory.
pub const DB_FILENAME: &str = "crmdav.db";

/// Upper bound for addressbook-multiget batches.
pub const MAX_MULTIGET_BATCH: usize = 50;

/// Configuration of the sync core.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Server-wide secret the password sealing key is derived from.
    pub secret: String,

    /// Directory for storing application state. In-memory database when unset
    /// and no platform state directory is available.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Pull interval given to new subscriptions.
    #[serde(default = "default_frequency_minutes")]
    pub default_frequency_minutes: u32,

    /// Deadline of each remote operation during a sync run.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deadline of each remote operation during a connection test.
    #[serde(default = "default_connection_test_timeout_secs")]
    pub connection_test_timeout_secs: u64,

    /// Number of cards fetched per addressbook-multiget.
    #[serde(default = "default_multiget_batch_size")]
    pub multiget_batch_size: usize,

    /// User agent sent to remotes.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Config {
    /// A configuration with defaults and the given secret, backed by an in-memory database.
    pub fn new(secret: impl Into<String>) -> Self {
        Config {
            secret: secret.into(),
            state_dir: None,
            default_frequency_minutes: default_frequency_minutes(),
            request_timeout_secs: default_request_timeout_secs(),
            connection_test_timeout_secs: default_connection_test_timeout_secs(),
            multiget_batch_size: default_multiget_batch_size(),
            user_agent: default_user_agent(),
        }
    }

    /// Normalize the configuration.
    #[tracing::instrument(skip(self))]
    pub fn normalize(&mut self) -> Result<(), SyncError> {
        if self.secret.trim().is_empty() {
            return Err(SyncError::Config("secret must not be empty".to_string()));
        }

        match &self.state_dir {
            Some(a) => {
                self.state_dir = Some(expand_path(a).map_err(|e| {
                    SyncError::Config(format!("Failed to expand state directory path: {e}"))
                })?);
            }

            None => match get_state_dir() {
                Ok(a) => self.state_dir = Some(a.join(APP_NAME)),
                Err(e) => tracing::warn!(err = %e, "failed to get state directory"),
            },
        }

        self.multiget_batch_size = self.multiget_batch_size.clamp(1, MAX_MULTIGET_BATCH);
        if self.default_frequency_minutes == 0 {
            self.default_frequency_minutes = default_frequency_minutes();
        }
        Ok(())
    }

    /// Path of the database file, `None` for an in-memory database.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join(DB_FILENAME))
    }

    /// Deadline of each remote operation during a sync run.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Deadline of each remote operation during a connection test.
    pub fn connection_test_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_test_timeout_secs)
    }
}

pub(crate) const fn default_frequency_minutes() -> u32 {
    180
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_connection_test_timeout_secs() -> u64 {
    15
}

const fn default_multiget_batch_size() -> usize {
    MAX_MULTIGET_BATCH
}

fn default_user_agent() -> String {
    concat!("crmdav/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Handle tilde (~) and environment variables in the path
fn expand_path(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let path = path.to_str().ok_or("Invalid path")?;

    // Handle tilde and home directory
    let home_prefixes: &[&str] = if cfg!(unix) {
        &["~/", "$HOME/", "${HOME}/"]
    } else {
        &[r"~\", "~/", r"%UserProfile%\", r"%UserProfile%/"]
    };
    for prefix in home_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_home_dir()?.join(stripped));
        }
    }

    // Handle state directories
    let state_prefixes: &[&str] = if cfg!(unix) {
        &["$XDG_STATE_HOME/", "${XDG_STATE_HOME}/"]
    } else {
        &[r"%LOCALAPPDATA%\", "%LOCALAPPDATA%/"]
    };
    for prefix in state_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_state_dir()?.join(stripped));
        }
    }

    Ok(path.into())
}

fn get_home_dir() -> Result<PathBuf, String> {
    dirs::home_dir().ok_or_else(|| "User-specific home directory not found".to_string())
}

fn get_state_dir() -> Result<PathBuf, String> {
    #[cfg(unix)]
    let state_dir = xdg::BaseDirectories::new().get_state_home();
    #[cfg(windows)]
    let state_dir = dirs::data_dir();
    state_dir.ok_or_else(|| "User-specific state directory not found".to_string())
}
