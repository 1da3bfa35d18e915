// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::error::SyncError;

/// Receives local contact changes after they are committed.
///
/// Contact services depend on this capability rather than on the sync engine,
/// which implements it by pushing to remote address books.
#[async_trait]
pub trait ContactChangePublisher: Send + Sync {
    /// A contact was created or updated.
    async fn on_contact_changed(&self, contact_id: &str, vault_id: &str) -> Result<(), SyncError>;

    /// A contact was deleted.
    async fn on_contact_deleted(&self, contact_id: &str, vault_id: &str) -> Result<(), SyncError>;
}

/// A publisher that drops every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl ContactChangePublisher for NoopPublisher {
    async fn on_contact_changed(&self, _: &str, _: &str) -> Result<(), SyncError> {
        Ok(())
    }

    async fn on_contact_deleted(&self, _: &str, _: &str) -> Result<(), SyncError> {
        Ok(())
    }
}
