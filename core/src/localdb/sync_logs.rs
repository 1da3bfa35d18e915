// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

use crate::localdb::from_millis;
use crate::{Pager, SyncAction, SyncLog};

/// Append-only ledger of sync actions.
#[derive(Debug, Clone)]
pub struct SyncLogs {
    pool: SqlitePool,
}

impl SyncLogs {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends an entry and returns its id.
    pub async fn append(&self, log: &NewSyncLog<'_>) -> Result<i64, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO subscription_sync_logs (subscription_id, contact_id, distant_uri, distant_etag,
                                    action, error_message, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?);
";

        let result = sqlx::query(SQL)
            .bind(log.subscription_id)
            .bind(log.contact_id)
            .bind(log.distant_uri)
            .bind(log.distant_etag)
            .bind(log.action.as_str())
            .bind(log.error_message)
            .bind(log.created_at)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Lists entries of a subscription, newest first.
    pub async fn list(
        &self,
        subscription_id: &str,
        pager: &Pager,
    ) -> Result<Vec<SyncLogRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, subscription_id, contact_id, distant_uri, distant_etag, action, error_message, created_at
FROM subscription_sync_logs
WHERE subscription_id = ?
ORDER BY created_at DESC, id DESC
LIMIT ? OFFSET ?;
";

        sqlx::query_as(SQL)
            .bind(subscription_id)
            .bind(pager.limit())
            .bind(pager.offset())
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count(&self, subscription_id: &str) -> Result<i64, sqlx::Error> {
        const SQL: &str = "SELECT COUNT(*) FROM subscription_sync_logs WHERE subscription_id = ?;";

        sqlx::query_scalar(SQL)
            .bind(subscription_id)
            .fetch_one(&self.pool)
            .await
    }
}

/// A sync-log entry to append.
#[derive(Debug, Clone, Copy)]
pub struct NewSyncLog<'a> {
    pub subscription_id: &'a str,
    pub contact_id: Option<&'a str>,
    pub distant_uri: Option<&'a str>,
    pub distant_etag: Option<&'a str>,
    pub action: SyncAction,
    pub error_message: Option<&'a str>,
    pub created_at: i64,
}

impl<'a> NewSyncLog<'a> {
    pub fn new(subscription_id: &'a str, action: SyncAction, created_at: i64) -> Self {
        Self {
            subscription_id,
            contact_id: None,
            distant_uri: None,
            distant_etag: None,
            action,
            error_message: None,
            created_at,
        }
    }

    pub fn contact(mut self, contact_id: &'a str) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn distant(mut self, uri: &'a str, etag: Option<&'a str>) -> Self {
        self.distant_uri = Some(uri);
        self.distant_etag = etag;
        self
    }

    pub fn error(mut self, message: &'a str) -> Self {
        self.error_message = Some(message);
        self
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncLogRecord {
    pub id: i64,
    pub subscription_id: String,
    pub contact_id: Option<String>,
    pub distant_uri: Option<String>,
    pub distant_etag: Option<String>,
    pub action: String,
    pub error_message: Option<String>,
    pub created_at: i64,
}

impl SyncLogRecord {
    /// Converts to the public form; unknown actions read back as errors.
    pub fn into_sync_log(self) -> SyncLog {
        let (action, error_message) = match self.action.parse() {
            Ok(action) => (action, self.error_message),
            Err(e) => (SyncAction::Error, Some(self.error_message.unwrap_or(e))),
        };
        SyncLog {
            id: self.id,
            subscription_id: self.subscription_id,
            contact_id: self.contact_id,
            distant_uri: self.distant_uri,
            distant_etag: self.distant_etag,
            action,
            error_message,
            created_at: from_millis(self.created_at),
        }
    }
}
