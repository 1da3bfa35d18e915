// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Reconciles one subscription against its remote address book.
//!
//! With a stored sync token only the changes since that token are fetched.
//! Without one, or when the server rejects it, the whole collection is listed
//! and cards gone from the listing are treated as deleted. The token and the
//! run time are only recorded when every entity went through cleanly.

use std::collections::{HashMap, HashSet};

use crmdav_carddav::{AddressObject, Href, SyncItem};
use tokio_util::sync::CancellationToken;

use crate::engine::{Engine, check_cancelled, now_millis};
use crate::error::{ErrorKind, SyncError};
use crate::localdb::{NewSyncLog, StateRecord, SubscriptionRecord};
use crate::mapper::{self, RemoteCard};
use crate::remote::AddressBookClient;
use crate::types::{SyncAction, SyncResult};

/// Pulls remote changes of a subscription into its vault.
#[tracing::instrument(skip_all, fields(subscription_id = %sub.id))]
pub(crate) async fn pull(
    engine: &Engine,
    sub: &SubscriptionRecord,
    cancel: &CancellationToken,
) -> Result<SyncResult, SyncError> {
    let started_at = now_millis();
    if !sub.to_subscription().sync_way.pulls() {
        tracing::debug!("push-only subscription, nothing to pull");
        engine
            .db
            .subscriptions
            .update_sync_status(&sub.id, None, started_at)
            .await?;
        return Ok(SyncResult::default());
    }

    let outcome = run(engine, sub, cancel, started_at).await;
    match &outcome {
        Ok(result) => tracing::info!(%result, "pull finished"),
        Err(SyncError::Cancelled) => tracing::info!("pull cancelled"),
        Err(e) => engine.log_error(&sub.id, None, None, e).await,
    }
    outcome
}

async fn run(
    engine: &Engine,
    sub: &SubscriptionRecord,
    cancel: &CancellationToken,
    started_at: i64,
) -> Result<SyncResult, SyncError> {
    let client = engine.client_for(sub)?;
    let known: HashMap<String, String> = engine
        .db
        .states
        .list_for_subscription(&sub.id)
        .await?
        .into_iter()
        .map(|s| (s.distant_uri, s.distant_etag))
        .collect();

    let mut run = PullRun {
        engine,
        sub,
        client: client.as_ref(),
        cancel,
        address_book: Href::from(sub.uri.as_str()),
        known,
        result: SyncResult::default(),
    };

    if let Some(token) = sub.distant_sync_token.as_deref().filter(|t| !t.is_empty()) {
        check_cancelled(cancel)?;
        match run.client.sync_collection(&run.address_book, token).await {
            Ok(changes) => {
                tracing::debug!(
                    updated = changes.updated.len(),
                    deleted = changes.deleted.len(),
                    "incremental sync"
                );
                run.apply(changes.updated, changes.deleted, None).await?;
                return run.finish(Some(changes.sync_token), started_at).await;
            }
            Err(e) if e.kind() == ErrorKind::Authn => return Err(e),
            Err(e) => tracing::warn!(err = %e, "incremental sync failed, falling back to full scan"),
        }
    }

    run.full(started_at).await
}

struct PullRun<'a> {
    engine: &'a Engine,
    sub: &'a SubscriptionRecord,
    client: &'a dyn AddressBookClient,
    cancel: &'a CancellationToken,
    address_book: Href,
    /// Remote path to `ETag` of every resource this subscription already mirrors.
    known: HashMap<String, String>,
    result: SyncResult,
}

impl PullRun<'_> {
    async fn full(mut self, started_at: i64) -> Result<SyncResult, SyncError> {
        check_cancelled(self.cancel)?;
        let mut empty_listing_token = None;
        match self.client.sync_collection(&self.address_book, "").await {
            Ok(listing) if !listing.sync_token.is_empty() && !listing.updated.is_empty() => {
                tracing::debug!(members = listing.updated.len(), "full listing via sync-collection");
                let listed: HashSet<String> = listing
                    .updated
                    .iter()
                    .map(|item| item.href.to_string())
                    .collect();
                self.apply(listing.updated, listing.deleted, Some(&listed))
                    .await?;
                return self.finish(Some(listing.sync_token), started_at).await;
            }
            Ok(listing) => {
                tracing::debug!("sync-collection returned no listing");
                empty_listing_token = Some(listing.sync_token).filter(|t| !t.is_empty());
            }
            Err(e) if e.kind() == ErrorKind::Authn => return Err(e),
            Err(e) => tracing::debug!(err = %e, "sync-collection unsupported"),
        }

        check_cancelled(self.cancel)?;
        let objects = self.client.query_address_book(&self.address_book).await?;
        tracing::debug!(members = objects.len(), "full listing via addressbook-query");

        // an empty listing anchors the next run only if the query agrees the book is empty
        let token = empty_listing_token.filter(|_| objects.is_empty());

        let listed: HashSet<String> = objects.iter().map(|o| o.href.to_string()).collect();
        for object in objects {
            check_cancelled(self.cancel)?;
            self.upsert(object).await;
        }
        self.detect_deletions(&listed).await?;

        self.finish(token, started_at).await
    }

    /// Fetches and merges changed members, then processes deletions.
    async fn apply(
        &mut self,
        updated: Vec<SyncItem>,
        deleted: Vec<Href>,
        listed: Option<&HashSet<String>>,
    ) -> Result<(), SyncError> {
        let mut hrefs = Vec::with_capacity(updated.len());
        for item in updated {
            if self.is_unchanged(&item.href, item.etag.as_str()) {
                self.result.skipped += 1;
            } else {
                hrefs.push(item.href);
            }
        }

        for batch in hrefs.chunks(self.engine.batch_size.max(1)) {
            check_cancelled(self.cancel)?;
            match self
                .client
                .multi_get_address_book(&self.address_book, batch)
                .await
            {
                Ok(objects) => {
                    let returned: HashSet<String> =
                        objects.iter().map(|o| o.href.to_string()).collect();
                    for object in objects {
                        check_cancelled(self.cancel)?;
                        self.upsert(object).await;
                    }
                    for href in batch.iter().filter(|h| !returned.contains(h.as_str())) {
                        self.missing(href).await;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Authn => return Err(e),
                Err(e) => {
                    self.result.errors += batch.len();
                    self.engine.log_error(&self.sub.id, None, None, &e).await;
                }
            }
        }

        // updates are visible before deletions
        for href in deleted {
            check_cancelled(self.cancel)?;
            self.delete(&href).await;
        }

        if let Some(listed) = listed {
            self.detect_deletions(listed).await?;
        }
        Ok(())
    }

    /// Records a requested member the multiget response did not carry.
    ///
    /// The member keeps its old state, so the next run asks for it again.
    async fn missing(&mut self, href: &Href) {
        self.result.errors += 1;
        let err = SyncError::RemoteProtocol(
            "member missing from addressbook-multiget response".to_string(),
        );
        self.engine
            .log_error(&self.sub.id, None, Some(href.as_str()), &err)
            .await;
    }

    fn is_unchanged(&self, href: &Href, etag: &str) -> bool {
        !etag.is_empty() && self.known.get(href.as_str()).is_some_and(|known| known == etag)
    }

    async fn upsert(&mut self, object: AddressObject) {
        if object.card.trim().is_empty() || self.is_unchanged(&object.href, &object.etag) {
            self.result.skipped += 1;
            return;
        }

        match self.try_upsert(&object).await {
            Ok((contact_id, action)) => {
                match action {
                    SyncAction::Created => self.result.created += 1,
                    SyncAction::Updated => self.result.updated += 1,
                    _ => self.result.skipped += 1,
                }
                self.known
                    .insert(object.href.to_string(), object.etag.to_string());

                let entry = NewSyncLog::new(&self.sub.id, action, now_millis())
                    .contact(&contact_id)
                    .distant(object.href.as_str(), Some(object.etag.as_str()));
                self.engine.log(entry).await;
            }
            Err(e) => {
                self.result.errors += 1;
                self.engine
                    .log_error(&self.sub.id, None, Some(object.href.as_str()), &e)
                    .await;
            }
        }
    }

    async fn try_upsert(&self, object: &AddressObject) -> Result<(String, SyncAction), SyncError> {
        let db = &self.engine.db;
        let remote = RemoteCard {
            account_id: &self.sub.account_id,
            vault_id: &self.sub.vault_id,
            user_id: &self.sub.user_id,
            distant_uri: object.href.as_str(),
            distant_etag: object.etag.as_str(),
            card: &object.card,
            last_sync_at: self.sub.last_synchronized_at,
            now: now_millis(),
        };

        let mut tx = db.begin().await?;
        let (contact_id, action) = mapper::upsert_from_vcard(db, &mut tx, &remote).await?;
        let state = StateRecord {
            contact_id: contact_id.clone(),
            subscription_id: self.sub.id.clone(),
            distant_uri: object.href.to_string(),
            distant_etag: object.etag.to_string(),
        };
        db.states.upsert(&mut tx, &state).await?;
        tx.commit().await?;

        Ok((contact_id, action))
    }

    async fn delete(&mut self, href: &Href) {
        self.known.remove(href.as_str());
        match self.try_delete(href).await {
            Ok(contact_ids) => {
                for contact_id in &contact_ids {
                    self.result.deleted += 1;
                    let entry = NewSyncLog::new(&self.sub.id, SyncAction::Deleted, now_millis())
                        .contact(contact_id)
                        .distant(href.as_str(), None);
                    self.engine.log(entry).await;
                }
            }
            Err(e) => {
                self.result.errors += 1;
                self.engine
                    .log_error(&self.sub.id, None, Some(href.as_str()), &e)
                    .await;
            }
        }
    }

    async fn try_delete(&self, href: &Href) -> Result<Vec<String>, SyncError> {
        let db = &self.engine.db;
        let now = now_millis();

        let mut tx = db.begin().await?;
        let contacts = db
            .contacts
            .list_by_distant_uri(&mut tx, &self.sub.vault_id, href.as_str())
            .await?;
        for contact in &contacts {
            db.contacts.soft_delete(&mut tx, &contact.id, now).await?;
            db.states.delete(&mut tx, &contact.id, &self.sub.id).await?;
        }
        tx.commit().await?;

        Ok(contacts.into_iter().map(|c| c.id).collect())
    }

    /// Deletes pulled contacts whose remote card is missing from a complete listing.
    async fn detect_deletions(&mut self, listed: &HashSet<String>) -> Result<(), SyncError> {
        if !self.result.is_clean() {
            tracing::debug!("skipping deletion detection after errors");
            return Ok(());
        }

        let stale: Vec<String> = self
            .engine
            .db
            .states
            .list_for_subscription(&self.sub.id)
            .await?
            .into_iter()
            .map(|s| s.distant_uri)
            .filter(|uri| !listed.contains(uri))
            .collect();

        for uri in stale {
            check_cancelled(self.cancel)?;
            self.delete(&Href::from(uri)).await;
        }
        Ok(())
    }

    async fn finish(
        self,
        token: Option<String>,
        started_at: i64,
    ) -> Result<SyncResult, SyncError> {
        if !self.result.is_clean() {
            tracing::warn!(errors = self.result.errors, "run had errors, sync status not advanced");
            return Ok(self.result);
        }

        let token = token.filter(|t| !t.is_empty());
        self.engine
            .db
            .subscriptions
            .update_sync_status(&self.sub.id, token.as_deref(), started_at)
            .await?;
        Ok(self.result)
    }
}
