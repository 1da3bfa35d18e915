// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Mapping between vCards and local contacts.

use sqlx::SqliteConnection;

use crate::contact::{Address, Contact, ContactName};
use crate::error::SyncError;
use crate::localdb::{ContactRecord, LocalDb};
use crate::types::SyncAction;
use crate::vcard::{Property, VCard};

/// The contact fields carried by a vCard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    /// Name fields.
    pub name: ContactName,
    /// Phone numbers.
    pub phones: Vec<String>,
    /// Email addresses.
    pub emails: Vec<String>,
    /// Postal addresses.
    pub addresses: Vec<Address>,
}

/// Extracts the mapped fields of a card.
///
/// The name comes from `N` when it carries a given or family name, otherwise
/// `FN` becomes the given name.
pub fn decode(card: &str) -> Result<CardFields, SyncError> {
    let card = VCard::parse(card)?;

    let mut name = ContactName::default();
    if let Some(n) = card.first("N") {
        let components = n.components();
        name.last_name = non_empty(components.first());
        name.first_name = non_empty(components.get(1));
    }
    if name.first_name.is_none() && name.last_name.is_none() {
        name.first_name = card.first("FN").and_then(|p| non_empty(Some(&p.text_value())));
    }
    name.nickname = card
        .all("NICKNAME")
        .flat_map(Property::values)
        .find_map(|v| non_empty(Some(&v)));

    let phones = card
        .all("TEL")
        .filter_map(|p| {
            let value = p.text_value();
            let value = value.trim();
            non_empty(Some(&value.strip_prefix("tel:").unwrap_or(value).to_string()))
        })
        .collect();

    let emails = card
        .all("EMAIL")
        .filter_map(|p| non_empty(Some(&p.text_value())))
        .collect();

    // ADR: post office box; extended; street; locality; region; postal code; country
    let addresses = card
        .all("ADR")
        .map(|p| {
            let c = p.components();
            Address {
                street: non_empty(c.get(2)),
                city: non_empty(c.get(3)),
                region: non_empty(c.get(4)),
                postal_code: non_empty(c.get(5)),
                country: non_empty(c.get(6)),
            }
        })
        .filter(|a| !a.is_empty())
        .collect();

    Ok(CardFields {
        name,
        phones,
        emails,
        addresses,
    })
}

/// Renders a contact as a vCard 3.0.
pub fn encode(contact: &Contact) -> String {
    let first = contact.name.first_name.as_deref().unwrap_or_default();
    let last = contact.name.last_name.as_deref().unwrap_or_default();
    let formatted = [first, last]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut card = VCard::new();
    card.push(Property::raw("VERSION", "3.0"))
        .push(Property::text("UID", &contact.id))
        .push(Property::structured("N", &[last, first, "", "", ""]))
        .push(Property::text("FN", &formatted));
    if let Some(nickname) = &contact.name.nickname {
        card.push(Property::text("NICKNAME", nickname));
    }
    for phone in &contact.phones {
        card.push(Property::text("TEL", phone).with_param("TYPE", "VOICE"));
    }
    for email in &contact.emails {
        card.push(Property::text("EMAIL", email).with_param("TYPE", "INTERNET"));
    }
    for a in &contact.addresses {
        let field = |f: &Option<String>| f.clone().unwrap_or_default();
        let components = [
            String::new(),
            String::new(),
            field(&a.street),
            field(&a.city),
            field(&a.region),
            field(&a.postal_code),
            field(&a.country),
        ];
        let components: Vec<&str> = components.iter().map(String::as_str).collect();
        card.push(Property::structured("ADR", &components));
    }
    card.to_string()
}

/// A remote card to merge into a vault.
#[derive(Debug, Clone, Copy)]
pub struct RemoteCard<'a> {
    pub account_id: &'a str,
    pub vault_id: &'a str,
    pub user_id: &'a str,
    /// Absolute URL of the remote resource.
    pub distant_uri: &'a str,
    pub distant_etag: &'a str,
    pub card: &'a str,
    /// When the subscription last finished a pull, Unix milliseconds.
    pub last_sync_at: Option<i64>,
    pub now: i64,
}

/// Merges a remote card into the vault and returns the contact id and what happened.
///
/// Identity is the remote path. An unlinked contact with the same name is
/// adopted before a new one is created. A contact edited locally after the
/// last pull keeps its fields; only its `ETag` is refreshed.
pub async fn upsert_from_vcard(
    db: &LocalDb,
    conn: &mut SqliteConnection,
    remote: &RemoteCard<'_>,
) -> Result<(String, SyncAction), SyncError> {
    let linked = db
        .contacts
        .find_by_distant_uri(&mut *conn, remote.vault_id, remote.distant_uri)
        .await?;
    if let Some(existing) = linked {
        if !remote.distant_etag.is_empty()
            && existing.distant_etag.as_deref() == Some(remote.distant_etag)
        {
            return Ok((existing.id, SyncAction::Skipped));
        }
        return merge(db, conn, existing, remote).await;
    }

    let fields = decode(remote.card)?;
    let has_name = fields.name.first_name.is_some() || fields.name.last_name.is_some();
    if has_name {
        let adoptable = db
            .contacts
            .find_adoptable(&mut *conn, remote.vault_id, &fields.name)
            .await?;
        if let Some(existing) = adoptable {
            tracing::debug!(contact_id = %existing.id, href = remote.distant_uri, "adopting contact");
            return merge(db, conn, existing, remote).await;
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let record = ContactRecord {
        id: id.clone(),
        account_id: remote.account_id.to_string(),
        vault_id: remote.vault_id.to_string(),
        first_name: fields.name.first_name.clone(),
        last_name: fields.name.last_name.clone(),
        nickname: fields.name.nickname.clone(),
        distant_uri: Some(remote.distant_uri.to_string()),
        distant_etag: Some(remote.distant_etag.to_string()),
        vcard: Some(remote.card.to_string()),
        last_updated_at: None,
        created_at: remote.now,
        deleted_at: None,
    };
    db.contacts.insert(&mut *conn, &record).await?;
    write_fields(db, conn, &id, &fields).await?;
    db.contacts
        .insert_membership(&mut *conn, &id, remote.user_id, remote.vault_id)
        .await?;

    Ok((id, SyncAction::Created))
}

async fn merge(
    db: &LocalDb,
    conn: &mut SqliteConnection,
    existing: ContactRecord,
    remote: &RemoteCard<'_>,
) -> Result<(String, SyncAction), SyncError> {
    if is_conflict(existing.last_updated_at, remote.last_sync_at) {
        db.contacts
            .set_distant(
                &mut *conn,
                &existing.id,
                remote.distant_uri,
                remote.distant_etag,
                None,
            )
            .await?;
        return Ok((existing.id, SyncAction::ConflictLocalWins));
    }

    let fields = decode(remote.card)?;
    write_fields(db, conn, &existing.id, &fields).await?;
    db.contacts
        .set_distant(
            &mut *conn,
            &existing.id,
            remote.distant_uri,
            remote.distant_etag,
            Some(remote.card),
        )
        .await?;
    Ok((existing.id, SyncAction::Updated))
}

async fn write_fields(
    db: &LocalDb,
    conn: &mut SqliteConnection,
    id: &str,
    fields: &CardFields,
) -> Result<(), SyncError> {
    db.contacts.update_name(&mut *conn, id, &fields.name).await?;
    db.contacts
        .replace_information(&mut *conn, id, &fields.phones, &fields.emails)
        .await?;
    db.contacts
        .replace_addresses(&mut *conn, id, &fields.addresses)
        .await?;
    Ok(())
}

/// A local edit newer than the last pull wins; never-synced subscriptions see no conflict.
fn is_conflict(last_updated_at: Option<i64>, last_sync_at: Option<i64>) -> bool {
    match (last_updated_at, last_sync_at) {
        (Some(updated), Some(synced)) => updated > synced,
        _ => false,
    }
}

fn non_empty(s: Option<&String>) -> Option<String> {
    s.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
