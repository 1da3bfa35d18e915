// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio_util::sync::CancellationToken;

use crate::crypto::PasswordCipher;
use crate::error::SyncError;
use crate::localdb::{LocalDb, NewSyncLog, SubscriptionRecord, to_millis};
use crate::remote::{AddressBookClient, ClientFactory};
use crate::types::SyncAction;

/// What the pull and push engines share.
pub(crate) struct Engine {
    pub db: LocalDb,
    pub cipher: PasswordCipher,
    pub factory: Arc<dyn ClientFactory>,
    pub request_timeout: Duration,
    pub batch_size: usize,
}

impl Engine {
    /// Opens the subscription's password and builds a client for its address book.
    pub fn client_for(
        &self,
        sub: &SubscriptionRecord,
    ) -> Result<Arc<dyn AddressBookClient>, SyncError> {
        let password = self.cipher.open(&sub.password_ciphertext)?;
        self.factory
            .create(&sub.uri, &sub.username, &password, self.request_timeout)
    }

    /// Appends a sync-log entry, mirrored as a tracing event.
    ///
    /// A failed write is traced and otherwise ignored.
    pub async fn log(&self, entry: NewSyncLog<'_>) {
        match entry.action {
            SyncAction::Error => tracing::warn!(
                subscription_id = entry.subscription_id,
                contact_id = entry.contact_id,
                href = entry.distant_uri,
                error = entry.error_message,
                "sync error"
            ),
            action => tracing::debug!(
                subscription_id = entry.subscription_id,
                contact_id = entry.contact_id,
                href = entry.distant_uri,
                etag = entry.distant_etag,
                %action,
                "sync action"
            ),
        }

        if let Err(e) = self.db.sync_logs.append(&entry).await {
            tracing::error!(err = %e, "failed to append sync log");
        }
    }

    /// Logs an error entry for a subscription.
    pub async fn log_error(
        &self,
        subscription_id: &str,
        contact_id: Option<&str>,
        distant_uri: Option<&str>,
        err: &SyncError,
    ) {
        let message = err.to_string();
        let mut entry = NewSyncLog::new(subscription_id, SyncAction::Error, now_millis());
        entry.contact_id = contact_id;
        entry.distant_uri = distant_uri;
        self.log(entry.error(&message)).await;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db", &self.db)
            .field("request_timeout", &self.request_timeout)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

pub(crate) fn now_millis() -> i64 {
    to_millis(Timestamp::now())
}

/// Fails with [`SyncError::Cancelled`] once `cancel` fired.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}
