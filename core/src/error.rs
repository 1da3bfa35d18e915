// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crmdav_carddav::{CardDavError, ErrorKind as RemoteKind};

/// How a failure should be recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeouts, 5xx, unreachable hosts. The next scheduled run retries.
    TransientRemote,
    /// 4xx other than 401, malformed responses. Skip the entity.
    PermanentRemote,
    /// Credentials rejected. The run fails and no cursor moves.
    Authn,
    /// The stored password cannot be decrypted.
    LocalCrypto,
    /// The local database failed.
    LocalStore,
    /// The caller asked for something that does not exist in its vault, or is malformed.
    InvalidInput,
}

/// Errors surfaced by the sync core.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The subscription does not exist in the caller's vault.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The contact does not exist in the caller's vault.
    #[error("contact not found: {0}")]
    ContactNotFound(String),

    /// The sealed password could not be opened.
    #[error("failed to decrypt password: {0}")]
    Decrypt(String),

    /// The CardDAV client could not be built.
    #[error("failed to create CardDAV client: {0}")]
    ClientCreate(String),

    /// The remote answered with something unusable.
    #[error("remote protocol error: {0}")]
    RemoteProtocol(String),

    /// The remote could not be reached in time.
    #[error("remote network error: {0}")]
    RemoteNetwork(String),

    /// The remote rejected the credentials.
    #[error("remote authentication failed: {0}")]
    RemoteAuth(String),

    /// A remote card could not be parsed.
    #[error("invalid vCard: {0}")]
    InvalidVCard(String),

    /// The request itself is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The local database failed.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// An isolated task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl SyncError {
    /// Returns the recovery category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::RemoteNetwork(_) | SyncError::Cancelled => ErrorKind::TransientRemote,
            SyncError::RemoteProtocol(_) | SyncError::InvalidVCard(_) | SyncError::Panicked(_) => {
                ErrorKind::PermanentRemote
            }
            SyncError::RemoteAuth(_) => ErrorKind::Authn,
            SyncError::Decrypt(_) => ErrorKind::LocalCrypto,
            SyncError::Store(_) | SyncError::Migrate(_) => ErrorKind::LocalStore,
            SyncError::SubscriptionNotFound(_)
            | SyncError::ContactNotFound(_)
            | SyncError::ClientCreate(_)
            | SyncError::InvalidInput(_)
            | SyncError::Config(_) => ErrorKind::InvalidInput,
        }
    }
}

impl From<CardDavError> for SyncError {
    fn from(err: CardDavError) -> Self {
        match err.kind() {
            RemoteKind::Network => SyncError::RemoteNetwork(err.to_string()),
            RemoteKind::Authn => SyncError::RemoteAuth(err.to_string()),
            RemoteKind::Protocol => SyncError::RemoteProtocol(err.to_string()),
        }
    }
}
