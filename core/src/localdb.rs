// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod contacts;
mod subscription_states;
mod subscriptions;
mod sync_logs;


use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use jiff::Timestamp;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

pub use crate::localdb::contacts::{AddressRecord, ContactRecord, Contacts, InformationRecord};
pub use crate::localdb::subscription_states::{StateRecord, SubscriptionStates};
pub use crate::localdb::subscriptions::{SubscriptionRecord, Subscriptions};
pub use crate::localdb::sync_logs::{NewSyncLog, SyncLogRecord, SyncLogs};

use crate::error::SyncError;

/// Gives each in-memory database its own name so pools do not share state.
pub(crate) static IN_MEMORY_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct LocalDb {
    pool: SqlitePool,

    pub contacts: Contacts,
    pub subscriptions: Subscriptions,
    pub states: SubscriptionStates,
    pub sync_logs: SyncLogs,
}

impl LocalDb {
    /// Opens a sqlite database connection.
    /// If `filename` is `None`, it opens an in-memory database.
    pub async fn open(filename: Option<&Path>) -> Result<Self, SyncError> {
        let mut pool_options = SqlitePoolOptions::new();
        let options = if let Some(filename) = filename {
            tracing::info!(path = %filename.display(), "connecting to SQLite database");
            if let Some(dir) = filename.parent() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    SyncError::Config(format!(
                        "Failed to create state directory {}: {e}",
                        dir.display()
                    ))
                })?;
            }
            SqliteConnectOptions::new()
                .filename(filename)
                .create_if_missing(true)
        } else {
            tracing::info!("connecting to in-memory SQLite database");
            let db_id = IN_MEMORY_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
            // keep one connection alive, the database vanishes with the last one
            pool_options = pool_options.min_connections(1).idle_timeout(None);
            SqliteConnectOptions::new()
                .filename(format!("file:crmdav_memdb_{db_id}?mode=memory&cache=shared"))
                .in_memory(true)
                .shared_cache(true)
                .create_if_missing(true)
        };

        let pool = pool_options
            .connect_with(options.foreign_keys(true))
            .await?;

        sqlx::migrate!("src/localdb/migrations") // relative path from the crate root
            .run(&pool)
            .await?;

        tracing::debug!("ensuring tables in the database");
        Ok(LocalDb {
            contacts: Contacts::new(pool.clone()),
            subscriptions: Subscriptions::new(pool.clone()),
            states: SubscriptionStates::new(pool.clone()),
            sync_logs: SyncLogs::new(pool.clone()),
            pool,
        })
    }

    /// Starts a short per-entity transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, SyncError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(self) -> Result<(), SyncError> {
        tracing::debug!("closing database connection");
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a timestamp to its stored form, Unix milliseconds.
pub(crate) fn to_millis(ts: Timestamp) -> i64 {
    ts.as_millisecond()
}

/// Converts stored Unix milliseconds back to a timestamp.
pub(crate) fn from_millis(ms: i64) -> Timestamp {
    Timestamp::from_millisecond(ms).unwrap_or(Timestamp::UNIX_EPOCH)
}
