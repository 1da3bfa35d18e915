// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Pushing local changes and deletions to remote address books.

use crmdav_core::localdb::SubscriptionRecord;
use crmdav_core::mapper;
use crmdav_core::{SyncAction, SyncError, SyncWay};

use crate::common::{ACCOUNT, BOOK, Harness, MockRemote, USER, VAULT, draft, vcard};

async fn actions(h: &Harness, subscription_id: &str) -> Vec<SyncAction> {
    h.logs(subscription_id)
        .await
        .into_iter()
        .map(|l| l.action)
        .collect()
}

#[tokio::test]
async fn push_on_create_uses_default_target() {
    // Arrange
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;

    // Act
    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();

    // Assert
    let target = MockRemote::href(&format!("{}.vcf", contact.id));
    assert_eq!(h.remote.puts(), vec![target.clone()]);

    let state = h.state(&contact.id, &sub_id).await.expect("state row");
    assert_eq!(state.distant_uri, target);
    assert_eq!(Some(state.distant_etag.clone()), h.remote.etag(&target));

    let logs = h.logs(&sub_id).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, SyncAction::Pushed);
    assert_eq!(logs[0].contact_id.as_deref(), Some(contact.id.as_str()));
    assert_eq!(logs[0].distant_uri.as_deref(), Some(target.as_str()));
    assert_eq!(logs[0].distant_etag.as_deref(), Some(state.distant_etag.as_str()));

    let body = &h.remote.put_bodies()[0];
    assert!(body.contains(&format!("UID:{}", contact.id)));
    let fields = mapper::decode(body).unwrap();
    assert_eq!(fields.name, contact.name);
    assert_eq!(fields.emails, vec!["carol@example.com"]);
    assert_eq!(fields.phones, vec!["+1 555 0100"]);
}

#[tokio::test]
async fn push_on_update_reuses_existing_target() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();
    let first = h.state(&contact.id, &sub_id).await.unwrap();

    h.contacts
        .update(&contact.id, VAULT, &draft("Carol", "Marvel"))
        .await
        .unwrap();

    let puts = h.remote.puts();
    assert_eq!(puts.len(), 2);
    assert_eq!(puts[1], first.distant_uri);

    let states = h.db.states.list_for_contact(&contact.id).await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].distant_uri, first.distant_uri);
    assert_ne!(states[0].distant_etag, first.distant_etag);
    assert_eq!(Some(states[0].distant_etag.clone()), h.remote.etag(&first.distant_uri));
}

#[tokio::test]
async fn push_follows_server_assigned_path() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    h.remote.relocate_puts("server-side.vcf");

    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();

    let state = h.state(&contact.id, &sub_id).await.unwrap();
    assert_eq!(state.distant_uri, MockRemote::href("server-side.vcf"));
}

#[tokio::test]
async fn push_suppressed_for_contact_pulled_from_same_book() {
    // Arrange
    let h = Harness::new().await;
    let href = h.remote.upsert_card("pulled.vcf", &vcard("p", "Paula", "Pulled"));
    let sub_id = h.subscribe(SyncWay::Both).await;
    h.pull(&sub_id).await;
    let contact = h.contact_at(&href).await.unwrap();
    h.remote.clear_calls();

    // Act
    h.sync.push_contact_change(&contact.id, VAULT).await.unwrap();

    // Assert
    assert!(h.remote.puts().is_empty());
    let logs = h.logs(&sub_id).await;
    let skipped: Vec<_> = logs
        .iter()
        .filter(|l| l.action == SyncAction::SkippedPushOrigin)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].distant_uri.as_deref(), Some(href.as_str()));
}

#[tokio::test]
async fn push_not_suppressed_for_contact_from_other_host() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let id = h.create_unpublished("Olga", "Other").await;
    let mut tx = h.db.begin().await.unwrap();
    h.db.contacts
        .set_distant(&mut tx, &id, "https://other.example.com/book/olga.vcf", "x1", None)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    h.sync.push_contact_change(&id, VAULT).await.unwrap();

    assert_eq!(h.remote.puts(), vec![MockRemote::href(&format!("{id}.vcf"))]);
    assert_eq!(actions(&h, &sub_id).await, vec![SyncAction::Pushed]);
}

#[tokio::test]
async fn push_skips_pull_only_and_inactive_subscriptions() {
    let h = Harness::new().await;
    let pull_only = h.subscribe(SyncWay::Pull).await;
    let inactive = h.subscribe(SyncWay::Push).await;
    h.sync
        .set_subscription_active(&inactive, VAULT, false)
        .await
        .unwrap();

    h.contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();

    assert!(h.remote.puts().is_empty());
    assert!(h.logs(&pull_only).await.is_empty());
    assert!(h.logs(&inactive).await.is_empty());
}

#[tokio::test]
async fn push_failure_is_isolated_per_subscription() {
    // Arrange
    let h = Harness::new().await;
    let good = h.subscribe(SyncWay::Push).await;
    h.db
        .subscriptions
        .insert(&SubscriptionRecord {
            id: "broken".to_string(),
            account_id: ACCOUNT.to_string(),
            vault_id: VAULT.to_string(),
            user_id: USER.to_string(),
            uri: "https://elsewhere.example.com/book/".to_string(),
            username: "jane".to_string(),
            password_ciphertext: "not-sealed".to_string(),
            sync_way: 1,
            active: true,
            distant_sync_token: None,
            last_synchronized_at: None,
            frequency_minutes: 180,
            created_at: 0,
        })
        .await
        .unwrap();
    let id = h.create_unpublished("Carol", "Danvers").await;

    // Act
    h.sync.push_contact_change(&id, VAULT).await.unwrap();

    // Assert
    assert_eq!(h.remote.puts().len(), 1);
    assert_eq!(actions(&h, &good).await, vec![SyncAction::Pushed]);

    let broken = h.logs("broken").await;
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].action, SyncAction::Error);
    assert_eq!(broken[0].contact_id.as_deref(), Some(id.as_str()));
    assert!(h.state(&id, "broken").await.is_none());
}

#[tokio::test]
async fn push_client_failure_is_logged() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    h.factory.set_reject(true);

    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();

    assert!(h.remote.puts().is_empty());
    assert!(h.state(&contact.id, &sub_id).await.is_none());
    assert_eq!(actions(&h, &sub_id).await, vec![SyncAction::Error]);
}

#[tokio::test]
async fn push_unknown_contact_fails() {
    let h = Harness::new().await;
    h.subscribe(SyncWay::Push).await;

    let err = h
        .sync
        .push_contact_change("missing", VAULT)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ContactNotFound(_)));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn push_delete_removes_remote_copy() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();
    let state = h.state(&contact.id, &sub_id).await.unwrap();

    h.contacts.delete(&contact.id, VAULT).await.unwrap();

    assert_eq!(h.remote.deletes(), vec![state.distant_uri.clone()]);
    assert!(h.remote.card(&state.distant_uri).is_none());
    assert!(h.state(&contact.id, &sub_id).await.is_none());
    assert_eq!(
        actions(&h, &sub_id).await,
        vec![SyncAction::PushDeleted, SyncAction::Pushed]
    );
}

#[tokio::test]
async fn push_delete_without_states_is_noop() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let id = h.create_unpublished("Carol", "Danvers").await;

    h.sync.push_contact_delete(&id, VAULT).await.unwrap();

    assert!(h.remote.calls().is_empty());
    assert!(h.logs(&sub_id).await.is_empty());
}

#[tokio::test]
async fn push_delete_failure_keeps_state() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();
    h.remote.set_fail_delete(true);

    h.contacts.delete(&contact.id, VAULT).await.unwrap();

    assert_eq!(h.remote.deletes().len(), 1);
    assert!(h.state(&contact.id, &sub_id).await.is_some());
    assert_eq!(actions(&h, &sub_id).await[0], SyncAction::Error);
}

#[tokio::test]
async fn push_delete_forgets_state_of_stopped_subscription() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();
    h.sync
        .set_subscription_active(&sub_id, VAULT, false)
        .await
        .unwrap();

    h.contacts.delete(&contact.id, VAULT).await.unwrap();

    assert!(h.remote.deletes().is_empty());
    assert!(h.state(&contact.id, &sub_id).await.is_none());
    assert_eq!(actions(&h, &sub_id).await, vec![SyncAction::Pushed]);
}

#[tokio::test]
async fn pushes_of_one_contact_are_serialized() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Push).await;
    let id = h.create_unpublished("Carol", "Danvers").await;

    let (a, b) = tokio::join!(
        h.sync.push_contact_change(&id, VAULT),
        h.sync.push_contact_change(&id, VAULT),
    );
    a.unwrap();
    b.unwrap();

    let states = h.db.states.list_for_contact(&id).await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(
        Some(states[0].distant_etag.clone()),
        h.remote.etag(&states[0].distant_uri)
    );
    assert_eq!(
        actions(&h, &sub_id).await,
        vec![SyncAction::Pushed, SyncAction::Pushed]
    );
    assert!(h.remote.puts().iter().all(|p| p.starts_with(BOOK)));
}
