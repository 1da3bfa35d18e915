// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::types::Href;

/// Coarse category of a [`CardDavError`], used by callers to decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient failure: unreachable host, timeout, 5xx. Retrying later may succeed.
    Network,
    /// Permanent failure for this attempt: unexpected status, malformed response.
    Protocol,
    /// Credentials were rejected.
    Authn,
}

/// `CardDAV` client errors.
#[non_exhaustive]
#[derive(Debug)]
pub enum CardDavError {
    /// HTTP layer error.
    Http(String),

    /// Connection could not be established or was dropped.
    Network(String),

    /// Request exceeded its deadline.
    Timeout(String),

    /// Server answered with an unexpected status code.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if it could be read.
        body: String,
    },

    /// XML parsing/writing error.
    Xml(String),

    /// Authentication error.
    Auth(String),

    /// Resource not found.
    NotFound(Href),

    /// Precondition failed (`ETag` mismatch or invalid sync token).
    PreconditionFailed(String),

    /// Server doesn't advertise the requested collection.
    UnreachableCollection(String),

    /// Invalid response from server.
    InvalidResponse(String),

    /// Configuration error.
    Config(String),

    /// Server doesn't support required capability.
    UnsupportedCapability(String),
}

impl CardDavError {
    /// Returns the recovery category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Timeout(_) => ErrorKind::Network,
            Self::Status { status, .. } if *status >= 500 => ErrorKind::Network,
            Self::Auth(_) => ErrorKind::Authn,
            _ => ErrorKind::Protocol,
        }
    }
}

impl fmt::Display for CardDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Network(e) => write!(f, "Network error: {e}"),
            Self::Timeout(e) => write!(f, "Request timed out: {e}"),
            Self::Status { status, body } => write!(f, "HTTP error: {status}: {body}"),
            Self::Xml(e) => write!(f, "XML error: {e}"),
            Self::Auth(e) => write!(f, "Authentication failed: {e}"),
            Self::NotFound(href) => write!(f, "Resource not found: {href}"),
            Self::PreconditionFailed(e) => write!(f, "Precondition failed: {e}"),
            Self::UnreachableCollection(e) => write!(f, "Unreachable collection: {e}"),
            Self::InvalidResponse(e) => write!(f, "Invalid server response: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::UnsupportedCapability(cap) => {
                write!(f, "Server doesn't support required capability: {cap}")
            }
        }
    }
}

impl std::error::Error for CardDavError {}

impl From<reqwest::Error> for CardDavError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            Self::Network(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<quick_xml::Error> for CardDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<std::io::Error> for CardDavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}
