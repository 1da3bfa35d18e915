// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// `CardDAV` authentication method.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Username/password authentication.
    ///
    /// Requests start out with HTTP Basic. When the server answers `401` with a
    /// Digest challenge the client switches to Digest and stays there.
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
}

/// `CardDAV` server configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CardDavConfig {
    /// URL of the address book collection, or of any entry point on the server
    /// that answers principal discovery.
    pub base_url: String,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("crmdav-carddav/", env!("CARGO_PKG_VERSION")).to_string()
}

impl CardDavConfig {
    /// Creates a configuration for `base_url` authenticated with username and password.
    #[must_use]
    pub fn with_credentials(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            auth: AuthMethod::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            ..Default::default()
        }
    }
}

impl Default for CardDavConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth: AuthMethod::default(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}
