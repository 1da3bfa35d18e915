// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use jiff::Timestamp;

use crate::error::SyncError;
use crate::localdb::{ContactRecord, InformationRecord, LocalDb, from_millis, to_millis};
use crate::publisher::ContactChangePublisher;

/// The name fields of a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactName {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Nickname.
    pub nickname: Option<String>,
}

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Street address.
    pub street: Option<String>,
    /// City or locality.
    pub city: Option<String>,
    /// Region, state or province.
    pub region: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country name.
    pub country: Option<String>,
}

impl Address {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        [
            &self.street,
            &self.city,
            &self.region,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .all(|a| a.is_none())
    }
}

/// A contact of a vault, with the fields the sync subsystem maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// The contact id, also the default remote file name.
    pub id: String,
    /// Owning account.
    pub account_id: String,
    /// Owning vault.
    pub vault_id: String,
    /// Name fields.
    pub name: ContactName,
    /// Phone numbers, in order.
    pub phones: Vec<String>,
    /// Email addresses, in order.
    pub emails: Vec<String>,
    /// Postal addresses, in order.
    pub addresses: Vec<Address>,
    /// The remote resource this contact was pulled from, if any.
    pub distant_uri: Option<String>,
    /// The `ETag` of that resource when it was last seen.
    pub distant_etag: Option<String>,
    /// When the contact was last changed locally.
    pub last_updated_at: Option<Timestamp>,
    /// When the contact was created.
    pub created_at: Timestamp,
}

impl Contact {
    /// Loads a live contact of a vault with its phones, emails and addresses.
    pub(crate) async fn load(
        db: &LocalDb,
        id: &str,
        vault_id: &str,
    ) -> Result<Option<Contact>, SyncError> {
        let Some(record) = db.contacts.get_in_vault(id, vault_id).await? else {
            return Ok(None);
        };

        let mut phones = Vec::new();
        let mut emails = Vec::new();
        for info in db.contacts.information(id).await? {
            match info.kind.as_str() {
                InformationRecord::PHONE => phones.push(info.data),
                InformationRecord::EMAIL => emails.push(info.data),
                kind => tracing::warn!(contact_id = id, kind, "unknown contact information kind"),
            }
        }

        let addresses = db
            .contacts
            .addresses(id)
            .await?
            .into_iter()
            .map(Address::from)
            .collect();

        Ok(Some(Contact {
            name: record.name(),
            id: record.id,
            account_id: record.account_id,
            vault_id: record.vault_id,
            phones,
            emails,
            addresses,
            distant_uri: record.distant_uri,
            distant_etag: record.distant_etag,
            last_updated_at: record.last_updated_at.map(from_millis),
            created_at: from_millis(record.created_at),
        }))
    }
}

/// Editable fields of a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    /// Name fields.
    pub name: ContactName,
    /// Phone numbers.
    pub phones: Vec<String>,
    /// Email addresses.
    pub emails: Vec<String>,
    /// Postal addresses.
    pub addresses: Vec<Address>,
}

/// Local contact writes.
///
/// Every write stamps `last_updated_at`, then notifies the publisher so the
/// change can be pushed to remote address books.
#[derive(Clone)]
pub struct ContactService {
    db: LocalDb,
    publisher: Arc<dyn ContactChangePublisher>,
}

impl ContactService {
    /// Creates a service over the store, notifying `publisher` after each write.
    pub fn new(db: LocalDb, publisher: Arc<dyn ContactChangePublisher>) -> Self {
        Self { db, publisher }
    }

    /// Gets a live contact of a vault.
    pub async fn get(&self, id: &str, vault_id: &str) -> Result<Contact, SyncError> {
        Contact::load(&self.db, id, vault_id)
            .await?
            .ok_or_else(|| SyncError::ContactNotFound(id.to_string()))
    }

    /// Creates a contact owned by `user_id` in a vault.
    #[tracing::instrument(skip(self, draft))]
    pub async fn create(
        &self,
        account_id: &str,
        vault_id: &str,
        user_id: &str,
        draft: &ContactDraft,
    ) -> Result<Contact, SyncError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = to_millis(Timestamp::now());
        let record = ContactRecord {
            id: id.clone(),
            account_id: account_id.to_string(),
            vault_id: vault_id.to_string(),
            first_name: draft.name.first_name.clone(),
            last_name: draft.name.last_name.clone(),
            nickname: draft.name.nickname.clone(),
            distant_uri: None,
            distant_etag: None,
            vcard: None,
            last_updated_at: Some(now),
            created_at: now,
            deleted_at: None,
        };

        let mut tx = self.db.begin().await?;
        self.db.contacts.insert(&mut tx, &record).await?;
        self.db
            .contacts
            .replace_information(&mut tx, &id, &draft.phones, &draft.emails)
            .await?;
        self.db
            .contacts
            .replace_addresses(&mut tx, &id, &draft.addresses)
            .await?;
        self.db
            .contacts
            .insert_membership(&mut tx, &id, user_id, vault_id)
            .await?;
        tx.commit().await?;

        tracing::debug!(contact_id = %id, "contact created");
        self.notify_changed(&id, vault_id).await;
        self.get(&id, vault_id).await
    }

    /// Overwrites the editable fields of a contact.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update(
        &self,
        id: &str,
        vault_id: &str,
        draft: &ContactDraft,
    ) -> Result<Contact, SyncError> {
        if self.db.contacts.get_in_vault(id, vault_id).await?.is_none() {
            return Err(SyncError::ContactNotFound(id.to_string()));
        }

        let mut tx = self.db.begin().await?;
        self.db.contacts.update_name(&mut tx, id, &draft.name).await?;
        self.db
            .contacts
            .replace_information(&mut tx, id, &draft.phones, &draft.emails)
            .await?;
        self.db
            .contacts
            .replace_addresses(&mut tx, id, &draft.addresses)
            .await?;
        self.db
            .contacts
            .set_last_updated_at(&mut tx, id, to_millis(Timestamp::now()))
            .await?;
        tx.commit().await?;

        self.notify_changed(id, vault_id).await;
        self.get(id, vault_id).await
    }

    /// Soft-deletes a contact.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str, vault_id: &str) -> Result<(), SyncError> {
        if self.db.contacts.get_in_vault(id, vault_id).await?.is_none() {
            return Err(SyncError::ContactNotFound(id.to_string()));
        }

        let now = to_millis(Timestamp::now());
        let mut tx = self.db.begin().await?;
        self.db.contacts.set_last_updated_at(&mut tx, id, now).await?;
        self.db.contacts.soft_delete(&mut tx, id, now).await?;
        tx.commit().await?;

        if let Err(e) = self.publisher.on_contact_deleted(id, vault_id).await {
            tracing::warn!(contact_id = id, err = %e, "failed to publish contact deletion");
        }
        Ok(())
    }

    /// The local write is already committed; a failed push only warns.
    async fn notify_changed(&self, id: &str, vault_id: &str) {
        if let Err(e) = self.publisher.on_contact_changed(id, vault_id).await {
            tracing::warn!(contact_id = id, err = %e, "failed to publish contact change");
        }
    }
}

impl std::fmt::Debug for ContactService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactService")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}
