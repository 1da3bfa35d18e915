// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Propagates local contact changes to push-enabled subscriptions.

use crmdav_carddav::Href;

use crate::contact::Contact;
use crate::engine::{Engine, now_millis};
use crate::error::SyncError;
use crate::isolate::isolate;
use crate::localdb::{NewSyncLog, StateRecord, SubscriptionRecord};
use crate::mapper;
use crate::types::SyncAction;

/// Stores a created or updated contact on every push-enabled subscription of its vault.
///
/// Failures are logged per subscription and never reach the caller.
#[tracing::instrument(skip(engine))]
pub(crate) async fn push_change(
    engine: &Engine,
    contact_id: &str,
    vault_id: &str,
) -> Result<(), SyncError> {
    let contact = Contact::load(&engine.db, contact_id, vault_id)
        .await?
        .ok_or_else(|| SyncError::ContactNotFound(contact_id.to_string()))?;

    let subs = engine.db.subscriptions.list_push_enabled(vault_id).await?;
    for sub in &subs {
        let label = format!("push:{}", sub.id);
        if let Err(e) = isolate(&label, push_one(engine, sub, &contact)).await {
            engine
                .log_error(&sub.id, Some(contact_id), None, &e)
                .await;
        }
    }
    Ok(())
}

async fn push_one(
    engine: &Engine,
    sub: &SubscriptionRecord,
    contact: &Contact,
) -> Result<(), SyncError> {
    if let Some(origin) = contact
        .distant_uri
        .as_deref()
        .filter(|uri| is_within(uri, &sub.uri))
    {
        let entry = NewSyncLog::new(&sub.id, SyncAction::SkippedPushOrigin, now_millis())
            .contact(&contact.id)
            .distant(origin, contact.distant_etag.as_deref());
        engine.log(entry).await;
        return Ok(());
    }

    let client = engine.client_for(sub)?;
    let card = mapper::encode(contact);
    let target = match engine.db.states.get(&contact.id, &sub.id).await? {
        Some(state) => state.distant_uri,
        None => default_target(&sub.uri, &contact.id),
    };

    let put = client
        .put_address_object(&Href::from(target.as_str()), &card)
        .await?;
    let href = if put.href.is_empty() {
        target
    } else {
        put.href.into_string()
    };
    let state = StateRecord {
        contact_id: contact.id.clone(),
        subscription_id: sub.id.clone(),
        distant_uri: href,
        distant_etag: put.etag.into_string(),
    };

    let mut tx = engine.db.begin().await?;
    engine.db.states.upsert(&mut tx, &state).await?;
    tx.commit().await?;

    let entry = NewSyncLog::new(&sub.id, SyncAction::Pushed, now_millis())
        .contact(&contact.id)
        .distant(&state.distant_uri, Some(state.distant_etag.as_str()));
    engine.log(entry).await;
    Ok(())
}

/// Deletes the remote copies of a deleted contact.
///
/// Only resources remembered in subscription states are deleted; a contact
/// without states is a no-op.
#[tracing::instrument(skip(engine))]
pub(crate) async fn push_delete(
    engine: &Engine,
    contact_id: &str,
    vault_id: &str,
) -> Result<(), SyncError> {
    let states = engine.db.states.list_for_contact(contact_id).await?;
    if states.is_empty() {
        tracing::debug!("no remote copies to delete");
        return Ok(());
    }

    for state in &states {
        let label = format!("push-delete:{}", state.subscription_id);
        if let Err(e) = isolate(&label, delete_one(engine, state, vault_id)).await {
            engine
                .log_error(
                    &state.subscription_id,
                    Some(contact_id),
                    Some(state.distant_uri.as_str()),
                    &e,
                )
                .await;
        }
    }
    Ok(())
}

async fn delete_one(engine: &Engine, state: &StateRecord, vault_id: &str) -> Result<(), SyncError> {
    let Some(sub) = engine.db.subscriptions.get(&state.subscription_id).await? else {
        return Ok(());
    };
    if sub.vault_id != vault_id {
        return Ok(());
    }

    if !sub.active || !sub.to_subscription().sync_way.pushes() {
        tracing::debug!(subscription_id = %sub.id, "subscription no longer pushes, forgetting state");
        forget(engine, state).await?;
        return Ok(());
    }

    let client = engine.client_for(&sub)?;
    client
        .remove_all(&Href::from(state.distant_uri.as_str()))
        .await?;
    forget(engine, state).await?;

    let entry = NewSyncLog::new(&sub.id, SyncAction::PushDeleted, now_millis())
        .contact(&state.contact_id)
        .distant(&state.distant_uri, Some(state.distant_etag.as_str()));
    engine.log(entry).await;
    Ok(())
}

async fn forget(engine: &Engine, state: &StateRecord) -> Result<(), SyncError> {
    let mut tx = engine.db.begin().await?;
    engine
        .db
        .states
        .delete(&mut tx, &state.contact_id, &state.subscription_id)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Whether `uri` names the address book `base` or a resource below it.
///
/// Both sides are normalized first, so `%40` and `@` or a differently cased
/// host still match.
fn is_within(uri: &str, base: &str) -> bool {
    let uri = Href::normalize(uri);
    let base = Href::normalize(base);
    let base = base.trim_end_matches('/');
    uri.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Where a contact is stored when no state remembers a location.
fn default_target(address_book: &str, contact_id: &str) -> String {
    format!("{}/{contact_id}.vcf", address_book.trim_end_matches('/'))
}
