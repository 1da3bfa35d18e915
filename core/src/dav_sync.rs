// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use crmdav_carddav::Href;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crypto::PasswordCipher;
use crate::driver::{self, SubscriptionRun};
use crate::engine::{Engine, now_millis};
use crate::error::SyncError;
use crate::isolate::isolate;
use crate::localdb::{LocalDb, SubscriptionRecord, SyncLogRecord};
use crate::publisher::ContactChangePublisher;
use crate::remote::{self, CardDavClientFactory, ClientFactory};
use crate::types::{
    AddressBookInfo, ConnectionParams, NewSubscription, PageMeta, Pager, Subscription, SyncLog,
    SyncResult, TestConnectionResult,
};
use crate::{pull, push};

/// CardDAV synchronization of a contact store.
///
/// Owns the store, the password cipher and the client factory, and is the
/// entry point for connection tests, subscription management, pulls and pushes.
pub struct DavSync {
    engine: Engine,
    connection_test_timeout: Duration,
    default_frequency_minutes: u32,
    contact_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DavSync {
    /// Creates an instance backed by the configured state directory and real CardDAV clients.
    pub async fn new(mut config: Config) -> Result<Self, SyncError> {
        config.normalize()?;
        let db = LocalDb::open(config.db_path().as_deref()).await?;
        let factory = Arc::new(CardDavClientFactory::new(config.user_agent.clone()));
        Ok(Self::with_factory(&config, db, factory))
    }

    /// Creates an instance over an opened store and a custom client factory.
    pub fn with_factory(config: &Config, db: LocalDb, factory: Arc<dyn ClientFactory>) -> Self {
        let default_frequency_minutes = match config.default_frequency_minutes {
            0 => crate::config::default_frequency_minutes(),
            n => n,
        };
        Self {
            engine: Engine {
                db,
                cipher: PasswordCipher::new(&config.secret),
                factory,
                request_timeout: config.request_timeout(),
                batch_size: config.multiget_batch_size.max(1),
            },
            connection_test_timeout: config.connection_test_timeout(),
            default_frequency_minutes,
            contact_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    pub fn db(&self) -> &LocalDb {
        &self.engine.db
    }

    /// Closes the store.
    pub async fn close(self) -> Result<(), SyncError> {
        self.engine.db.close().await
    }

    /// Probes a remote and lists the address books of the user.
    ///
    /// Never fails; problems are reported in the result.
    #[tracing::instrument(skip_all, fields(uri = %params.uri))]
    pub async fn test_connection(&self, params: &ConnectionParams) -> TestConnectionResult {
        let outcome = async {
            let client = self.engine.factory.create(
                &params.uri,
                &params.username,
                &params.password,
                self.connection_test_timeout,
            )?;
            remote::discover_address_books(client.as_ref(), &params.uri).await
        }
        .await;

        match outcome {
            Ok(books) => {
                tracing::info!(count = books.len(), "connection test succeeded");
                TestConnectionResult {
                    success: true,
                    address_books: books
                        .iter()
                        .map(|book| AddressBookInfo {
                            uri: book.href.to_string(),
                            name: book.name().to_string(),
                        })
                        .collect(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(err = %e, "connection test failed");
                TestConnectionResult {
                    success: false,
                    address_books: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Stores a new subscription with its password sealed. Does not contact the remote.
    #[tracing::instrument(skip_all, fields(vault_id = %new.vault_id, uri = %new.uri))]
    pub async fn create_subscription(&self, new: &NewSubscription) -> Result<String, SyncError> {
        let uri = normalize_uri(&new.uri)?;
        if new.username.is_empty() {
            return Err(SyncError::InvalidInput("username must not be empty".to_string()));
        }

        let frequency = new
            .frequency_minutes
            .filter(|f| *f > 0)
            .unwrap_or(self.default_frequency_minutes);
        let record = SubscriptionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: new.account_id.clone(),
            vault_id: new.vault_id.clone(),
            user_id: new.user_id.clone(),
            uri,
            username: new.username.clone(),
            password_ciphertext: self.engine.cipher.seal(&new.password)?,
            sync_way: i64::from(new.sync_way.bits()),
            active: true,
            distant_sync_token: None,
            last_synchronized_at: None,
            frequency_minutes: i64::from(frequency),
            created_at: now_millis(),
        };
        self.engine.db.subscriptions.insert(&record).await?;

        tracing::info!(subscription_id = %record.id, sync_way = %new.sync_way, "subscription created");
        Ok(record.id)
    }

    /// Gets a subscription of a vault.
    pub async fn get_subscription(
        &self,
        id: &str,
        vault_id: &str,
    ) -> Result<Subscription, SyncError> {
        Ok(self.subscription_in_vault(id, vault_id).await?.to_subscription())
    }

    /// Lists the subscriptions of a vault.
    pub async fn list_subscriptions(&self, vault_id: &str) -> Result<Vec<Subscription>, SyncError> {
        let records = self.engine.db.subscriptions.list(vault_id).await?;
        Ok(records.iter().map(SubscriptionRecord::to_subscription).collect())
    }

    /// Enables or disables a subscription.
    #[tracing::instrument(skip(self))]
    pub async fn set_subscription_active(
        &self,
        id: &str,
        vault_id: &str,
        active: bool,
    ) -> Result<(), SyncError> {
        self.subscription_in_vault(id, vault_id).await?;
        self.engine.db.subscriptions.set_active(id, active).await?;
        Ok(())
    }

    /// Deletes a subscription with its states and logs.
    #[tracing::instrument(skip(self))]
    pub async fn delete_subscription(&self, id: &str, vault_id: &str) -> Result<(), SyncError> {
        self.subscription_in_vault(id, vault_id).await?;
        self.engine.db.subscriptions.delete(id).await?;
        Ok(())
    }

    /// Pulls one subscription now, whether it is due or not.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn sync_subscription(
        &self,
        cancel: &CancellationToken,
        id: &str,
        vault_id: &str,
    ) -> Result<SyncResult, SyncError> {
        let sub = self.subscription_in_vault(id, vault_id).await?;
        let label = format!("pull:{id}");
        isolate(&label, pull::pull(&self.engine, &sub, cancel)).await
    }

    /// Pulls every due subscription until done or cancelled.
    pub async fn sync_all_due(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<SubscriptionRun>, SyncError> {
        driver::sync_all_due(&self.engine, cancel).await
    }

    /// Pushes a created or updated contact to the push-enabled subscriptions of its vault.
    pub async fn push_contact_change(
        &self,
        contact_id: &str,
        vault_id: &str,
    ) -> Result<(), SyncError> {
        let _guard = self.lock_contact(contact_id).await;
        push::push_change(&self.engine, contact_id, vault_id).await
    }

    /// Deletes the remote copies of a deleted contact.
    pub async fn push_contact_delete(
        &self,
        contact_id: &str,
        vault_id: &str,
    ) -> Result<(), SyncError> {
        let _guard = self.lock_contact(contact_id).await;
        push::push_delete(&self.engine, contact_id, vault_id).await
    }

    /// Reads a page of the sync log of a subscription, newest first.
    pub async fn get_sync_logs(
        &self,
        id: &str,
        vault_id: &str,
        pager: &Pager,
    ) -> Result<(Vec<SyncLog>, PageMeta), SyncError> {
        self.subscription_in_vault(id, vault_id).await?;

        let total = self.engine.db.sync_logs.count(id).await?;
        let logs = self
            .engine
            .db
            .sync_logs
            .list(id, pager)
            .await?
            .into_iter()
            .map(SyncLogRecord::into_sync_log)
            .collect();
        Ok((logs, PageMeta::new(total, pager)))
    }

    async fn subscription_in_vault(
        &self,
        id: &str,
        vault_id: &str,
    ) -> Result<SubscriptionRecord, SyncError> {
        self.engine
            .db
            .subscriptions
            .get_in_vault(id, vault_id)
            .await?
            .ok_or_else(|| SyncError::SubscriptionNotFound(id.to_string()))
    }

    /// Serializes pushes of one contact.
    async fn lock_contact(&self, contact_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .contact_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(contact_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

impl std::fmt::Debug for DavSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DavSync")
            .field("engine", &self.engine)
            .field("connection_test_timeout", &self.connection_test_timeout)
            .field("default_frequency_minutes", &self.default_frequency_minutes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ContactChangePublisher for DavSync {
    async fn on_contact_changed(&self, contact_id: &str, vault_id: &str) -> Result<(), SyncError> {
        self.push_contact_change(contact_id, vault_id).await
    }

    async fn on_contact_deleted(&self, contact_id: &str, vault_id: &str) -> Result<(), SyncError> {
        self.push_contact_delete(contact_id, vault_id).await
    }
}

/// Checks that `uri` is an absolute http(s) URL and returns it in the
/// spelling the CardDAV client uses for hrefs.
fn normalize_uri(uri: &str) -> Result<String, SyncError> {
    let lower = uri.to_ascii_lowercase();
    let host = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .and_then(|rest| rest.split('/').next())
        .filter(|host| !host.is_empty());
    match host {
        Some(_) if !uri.contains(char::is_whitespace) => Ok(Href::normalize(uri).into_string()),
        _ => Err(SyncError::InvalidInput(format!(
            "address book URI must be an absolute http(s) URL: {uri}"
        ))),
    }
}
