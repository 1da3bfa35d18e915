// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, path::PathBuf, str::FromStr};

use tokio::fs;

use crmdav_core::{APP_NAME, Config as CoreConfig};

const CRMDAV_CONFIG_ENV: &str = "CRMDAV_CONFIG";

#[tracing::instrument]
pub async fn parse_config(path: Option<PathBuf>) -> Result<(CoreConfig, Config), Box<dyn Error>> {
    let path = if let Some(path) = path {
        path
    } else if let Ok(env_path) = std::env::var(CRMDAV_CONFIG_ENV) {
        PathBuf::from(env_path)
    } else {
        let config = get_config_dir()?.join(format!("{APP_NAME}/config.toml"));
        if !config.exists() {
            return Err(format!("No config found at: {}", config.display()).into());
        }
        config
    };

    fs::read_to_string(&path)
        .await
        .map_err(|e| format!("Failed to read config file at {}: {}", path.display(), e))?
        .parse::<ConfigRaw>()
        .map(|a| (a.core, Config { scope: a.scope }))
}

/// Configuration of the command-line interface.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Owner of the subscriptions the commands operate on.
    pub scope: Scope,
}

/// The account, vault and user subscriptions are created for.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Scope {
    #[serde(default = "default_scope_id")]
    pub account_id: String,

    #[serde(default = "default_scope_id")]
    pub vault_id: String,

    #[serde(default = "default_scope_id")]
    pub user_id: String,
}

impl Default for Scope {
    fn default() -> Self {
        Scope {
            account_id: default_scope_id(),
            vault_id: default_scope_id(),
            user_id: default_scope_id(),
        }
    }
}

fn default_scope_id() -> String {
    "default".to_string()
}

#[derive(Debug, serde::Deserialize)]
struct ConfigRaw {
    core: CoreConfig,

    #[serde(default)]
    scope: Scope,
}

impl FromStr for ConfigRaw {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn get_config_dir() -> Result<PathBuf, Box<dyn Error>> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or_else(|| "User-specific home directory not found".into())
}
