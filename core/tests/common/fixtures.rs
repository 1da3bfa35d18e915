// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Test data factories and a ready-wired sync stack.

use std::sync::Arc;

use crmdav_core::localdb::{ContactRecord, LocalDb, StateRecord};
use crmdav_core::{
    CancellationToken, Config, ContactDraft, ContactName, ContactService, DavSync,
    NewSubscription, Pager, SyncLog, SyncResult, SyncWay,
};

use super::mock::{BOOK, MockFactory, MockRemote};

pub const ACCOUNT: &str = "account-1";
pub const VAULT: &str = "vault-1";
pub const USER: &str = "user-1";
pub const PASSWORD: &str = "hunter2";

/// A configuration with defaults and a fixed secret.
#[must_use]
pub fn test_config() -> Config {
    Config::new("test-secret")
}

/// A vCard 3.0 with a structured name and one email.
#[must_use]
pub fn vcard(uid: &str, first: &str, last: &str) -> String {
    format!(
        "BEGIN:VCARD\r\nVERSION:3.0\r\nUID:{uid}\r\nN:{last};{first};;;\r\nFN:{first} {last}\r\n\
EMAIL;TYPE=INTERNET:{}@example.com\r\nEND:VCARD\r\n",
        first.to_lowercase()
    )
}

/// A draft with only a name.
#[must_use]
pub fn draft(first: &str, last: &str) -> ContactDraft {
    ContactDraft {
        name: ContactName {
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            nickname: None,
        },
        phones: vec!["+1 555 0100".to_string()],
        emails: vec![format!("{}@example.com", first.to_lowercase())],
        addresses: Vec::new(),
    }
}

/// Input for a subscription to the mock book.
#[must_use]
pub fn new_subscription(sync_way: SyncWay) -> NewSubscription {
    NewSubscription {
        account_id: ACCOUNT.to_string(),
        vault_id: VAULT.to_string(),
        user_id: USER.to_string(),
        uri: BOOK.to_string(),
        username: "jane".to_string(),
        password: PASSWORD.to_string(),
        sync_way,
        frequency_minutes: None,
    }
}

/// The sync core over an in-memory database and a mock server, with a
/// contact service that publishes to it.
#[derive(Debug)]
pub struct Harness {
    pub sync: Arc<DavSync>,
    pub remote: Arc<MockRemote>,
    pub factory: Arc<MockFactory>,
    pub contacts: ContactService,
    pub db: LocalDb,
}

#[allow(dead_code)]
impl Harness {
    pub async fn new() -> Self {
        let db = LocalDb::open(None).await.unwrap();
        let remote = MockRemote::new();
        let factory = MockFactory::new(remote.clone());
        let sync = Arc::new(DavSync::with_factory(
            &test_config(),
            db.clone(),
            factory.clone(),
        ));
        let contacts = ContactService::new(db.clone(), sync.clone());
        Self {
            sync,
            remote,
            factory,
            contacts,
            db,
        }
    }

    pub async fn subscribe(&self, sync_way: SyncWay) -> String {
        self.sync
            .create_subscription(&new_subscription(sync_way))
            .await
            .unwrap()
    }

    pub async fn pull(&self, subscription_id: &str) -> SyncResult {
        self.sync
            .sync_subscription(&CancellationToken::new(), subscription_id, VAULT)
            .await
            .unwrap()
    }

    /// All log entries of a subscription, newest first.
    pub async fn logs(&self, subscription_id: &str) -> Vec<SyncLog> {
        let (logs, _) = self
            .sync
            .get_sync_logs(subscription_id, VAULT, &Pager::from((1, 1000)))
            .await
            .unwrap();
        logs
    }

    /// Live contacts of the vault.
    pub async fn live_contacts(&self) -> Vec<ContactRecord> {
        self.db.contacts.list(VAULT).await.unwrap()
    }

    pub async fn contact_at(&self, href: &str) -> Option<ContactRecord> {
        self.live_contacts()
            .await
            .into_iter()
            .find(|c| c.distant_uri.as_deref() == Some(href))
    }

    pub async fn state(&self, contact_id: &str, subscription_id: &str) -> Option<StateRecord> {
        self.db
            .states
            .get(contact_id, subscription_id)
            .await
            .unwrap()
    }

    /// Creates a contact without publishing it.
    pub async fn create_unpublished(&self, first: &str, last: &str) -> String {
        let service = ContactService::new(self.db.clone(), Arc::new(crmdav_core::NoopPublisher));
        service
            .create(ACCOUNT, VAULT, USER, &draft(first, last))
            .await
            .unwrap()
            .id
    }
}
