// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Pull runs: full scans, incremental sync and their failure modes.

use std::time::Duration;

use crmdav_core::localdb::SubscriptionRecord;
use crmdav_core::{CancellationToken, ErrorKind, SyncAction, SyncError, SyncResult, SyncWay};

use crate::common::{ACCOUNT, BOOK, Call, Harness, PASSWORD, USER, VAULT, draft, vcard};

fn count(logs: &[crmdav_core::SyncLog], action: SyncAction) -> usize {
    logs.iter().filter(|l| l.action == action).count()
}

#[tokio::test]
async fn pull_full_scan_creates_contacts() {
    // Arrange
    let h = Harness::new().await;
    h.remote.set_sync_supported(false);
    let a = h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let b = h.remote.upsert_card("b.vcf", &vcard("b", "Bob", "Jones"));
    let sub_id = h.subscribe(SyncWay::Pull).await;

    // Act
    let result = h.pull(&sub_id).await;

    // Assert
    assert_eq!(
        result,
        SyncResult {
            created: 2,
            ..SyncResult::default()
        }
    );

    let alice = h.contact_at(&a).await.expect("alice should exist");
    assert_eq!(alice.first_name.as_deref(), Some("Alice"));
    assert_eq!(alice.last_name.as_deref(), Some("Smith"));
    assert_eq!(alice.distant_etag, h.remote.etag(&a));
    assert!(alice.vcard.is_some());
    assert_eq!(h.db.contacts.count_memberships(&alice.id).await.unwrap(), 1);

    let bob = h.contact_at(&b).await.expect("bob should exist");
    assert_eq!(bob.first_name.as_deref(), Some("Bob"));

    let emails: Vec<_> = h
        .db
        .contacts
        .information(&alice.id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.data)
        .collect();
    assert_eq!(emails, vec!["alice@example.com"]);

    // a query listing carries no anchor
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, None);
    assert!(sub.last_synchronized_at.is_some());

    let logs = h.logs(&sub_id).await;
    assert_eq!(count(&logs, SyncAction::Created), 2);
    assert!(logs.iter().all(|l| l.distant_uri.is_some()));
}

#[tokio::test]
async fn pull_full_scan_via_sync_collection_stores_token() {
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Both).await;

    let result = h.pull(&sub_id).await;

    assert_eq!(result.created, 1);
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, Some(h.remote.token()));
    assert!(!h.remote.calls().contains(&Call::Query));
}

#[tokio::test]
async fn pull_incremental_update() {
    // Arrange
    let h = Harness::new().await;
    let existing = h
        .remote
        .upsert_card("existing.vcf", &vcard("existing", "Eve", "Old"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let t1 = h.remote.token();

    h.remote
        .upsert_card("existing.vcf", &vcard("existing", "Evelyn", "Old"));
    let new = h.remote.upsert_card("new.vcf", &vcard("new", "Nina", "New"));
    h.remote.clear_calls();

    // Act
    let result = h.pull(&sub_id).await;

    // Assert
    assert_eq!(result.created, 1);
    assert_eq!(result.updated, 1);
    assert_eq!(result.errors, 0);

    let contact = h.contact_at(&existing).await.unwrap();
    assert_eq!(contact.first_name.as_deref(), Some("Evelyn"));
    assert_eq!(contact.distant_etag, h.remote.etag(&existing));
    assert!(h.contact_at(&new).await.is_some());

    let state = h.state(&contact.id, &sub_id).await.unwrap();
    assert_eq!(Some(state.distant_etag), h.remote.etag(&existing));

    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_ne!(sub.distant_sync_token.as_deref(), Some(t1.as_str()));
    assert_eq!(sub.distant_sync_token, Some(h.remote.token()));

    assert_eq!(
        h.remote.calls(),
        vec![Call::SyncCollection(t1), Call::MultiGet(2)]
    );
}

#[tokio::test]
async fn pull_incremental_deletion() {
    let h = Harness::new().await;
    let old = h.remote.upsert_card("old.vcf", &vcard("old", "Oscar", "Old"));
    let keep = h.remote.upsert_card("keep.vcf", &vcard("keep", "Kate", "Kept"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let old_contact = h.contact_at(&old).await.unwrap();

    h.remote.remove_card("old.vcf");
    let result = h.pull(&sub_id).await;

    assert_eq!(result.deleted, 1);
    assert!(h.contact_at(&old).await.is_none());
    assert!(h.contact_at(&keep).await.is_some());

    let record = h.db.contacts.get(&old_contact.id).await.unwrap().unwrap();
    assert!(record.deleted_at.is_some());
    assert!(h.state(&old_contact.id, &sub_id).await.is_none());

    let logs = h.logs(&sub_id).await;
    let deleted: Vec<_> = logs
        .iter()
        .filter(|l| l.action == SyncAction::Deleted)
        .collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].contact_id.as_deref(), Some(old_contact.id.as_str()));
}

#[tokio::test]
async fn pull_full_scan_detects_missing_cards() {
    let h = Harness::new().await;
    h.remote.set_sync_supported(false);
    let gone = h.remote.upsert_card("gone.vcf", &vcard("gone", "Gina", "Gone"));
    let stay = h.remote.upsert_card("stay.vcf", &vcard("stay", "Sam", "Stay"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;

    h.remote.remove_card("gone.vcf");
    let result = h.pull(&sub_id).await;

    assert_eq!(result.deleted, 1);
    assert_eq!(result.skipped, 1);
    assert!(h.contact_at(&gone).await.is_none());
    assert!(h.contact_at(&stay).await.is_some());
}

#[tokio::test]
async fn pull_is_idempotent() {
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    h.remote.upsert_card("b.vcf", &vcard("b", "Bob", "Jones"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let token = h.sync.get_subscription(&sub_id, VAULT).await.unwrap().distant_sync_token;
    let contacts = h.live_contacts().await;
    let log_count = h.logs(&sub_id).await.len();

    let result = h.pull(&sub_id).await;

    assert_eq!(result.created, 0);
    assert_eq!(result.updated, 0);
    assert_eq!(result.errors, 0);
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, token);
    assert_eq!(h.live_contacts().await, contacts);
    assert_eq!(h.logs(&sub_id).await.len(), log_count);
}

#[tokio::test]
async fn pull_full_scan_skips_unchanged_cards() {
    let h = Harness::new().await;
    h.remote.set_sync_supported(false);
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    h.remote.upsert_card("b.vcf", &vcard("b", "Bob", "Jones"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let log_count = h.logs(&sub_id).await.len();

    let result = h.pull(&sub_id).await;

    assert_eq!(
        result,
        SyncResult {
            skipped: 2,
            ..SyncResult::default()
        }
    );
    assert_eq!(h.logs(&sub_id).await.len(), log_count);
}

#[tokio::test]
async fn pull_skips_empty_cards() {
    let h = Harness::new().await;
    h.remote.set_sync_supported(false);
    h.remote.upsert_card("empty.vcf", "");
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;

    let result = h.pull(&sub_id).await;

    assert_eq!(result.created, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(h.live_contacts().await.len(), 1);
}

#[tokio::test]
async fn pull_counts_invalid_cards_as_errors() {
    let h = Harness::new().await;
    h.remote.set_sync_supported(false);
    let broken = h.remote.upsert_card("broken.vcf", "BEGIN:VCARD\r\nFN:No End\r\n");
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;

    let result = h.pull(&sub_id).await;

    assert_eq!(result.created, 1);
    assert_eq!(result.errors, 1);

    let logs = h.logs(&sub_id).await;
    let error = logs
        .iter()
        .find(|l| l.action == SyncAction::Error)
        .expect("an error should be logged");
    assert_eq!(error.distant_uri.as_deref(), Some(broken.as_str()));

    // the run is not clean, so it is retried from scratch next time
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert!(sub.last_synchronized_at.is_none());
}

#[tokio::test]
async fn pull_token_not_advanced_when_batch_fails() {
    // Arrange
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let before = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();

    let b = h.remote.upsert_card("b.vcf", &vcard("b", "Bob", "Jones"));
    h.remote.set_fail_multiget(true);

    // Act
    let result = h.pull(&sub_id).await;

    // Assert
    assert_eq!(result.errors, 1);
    let after = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(after.distant_sync_token, before.distant_sync_token);
    assert_eq!(after.last_synchronized_at, before.last_synchronized_at);
    assert_eq!(count(&h.logs(&sub_id).await, SyncAction::Error), 1);

    // Act - the remote recovers
    h.remote.set_fail_multiget(false);
    let result = h.pull(&sub_id).await;

    // Assert - the missed change is replayed from the old token
    assert_eq!(result.created, 1);
    assert!(h.contact_at(&b).await.is_some());
    let after = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(after.distant_sync_token, Some(h.remote.token()));
}

#[tokio::test]
async fn pull_falls_back_to_full_scan_on_invalid_token() {
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.db
        .subscriptions
        .update_sync_status(&sub_id, Some("tok-999"), 0)
        .await
        .unwrap();

    let result = h.pull(&sub_id).await;

    assert_eq!(result.created, 1);
    assert_eq!(
        h.remote.calls(),
        vec![
            Call::SyncCollection("tok-999".to_string()),
            Call::SyncCollection(String::new()),
            Call::MultiGet(1),
        ]
    );
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, Some(h.remote.token()));
}

#[tokio::test]
async fn pull_conflict_keeps_local_edit() {
    // Arrange
    let h = Harness::new().await;
    let href = h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let contact = h.contact_at(&href).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    h.contacts
        .update(&contact.id, VAULT, &draft("Alicia", "Smith"))
        .await
        .unwrap();
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Remote"));

    // Act
    let result = h.pull(&sub_id).await;

    // Assert
    assert_eq!(result.updated, 0);
    assert_eq!(result.skipped, 1);

    let after = h.contact_at(&href).await.unwrap();
    assert_eq!(after.first_name.as_deref(), Some("Alicia"));
    assert_eq!(after.last_name.as_deref(), Some("Smith"));
    assert_eq!(after.distant_etag, h.remote.etag(&href));
    assert_eq!(after.vcard, contact.vcard);

    let logs = h.logs(&sub_id).await;
    assert_eq!(count(&logs, SyncAction::ConflictLocalWins), 1);
}

#[tokio::test]
async fn pull_adopts_unlinked_contact_with_same_name() {
    let h = Harness::new().await;
    let local_id = h.create_unpublished("Alice", "Smith").await;
    let href = h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;

    let result = h.pull(&sub_id).await;

    assert_eq!(result.created, 0);
    assert_eq!(result.updated, 1);
    let contacts = h.live_contacts().await;
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].id, local_id);
    assert_eq!(contacts[0].distant_uri.as_deref(), Some(href.as_str()));
}

#[tokio::test]
async fn pull_auth_failure_aborts_run() {
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;
    let before = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();

    h.remote.set_reject_credentials(true);
    let err = h
        .sync
        .sync_subscription(&CancellationToken::new(), &sub_id, VAULT)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authn);
    let after = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(after.distant_sync_token, before.distant_sync_token);
    assert_eq!(after.last_synchronized_at, before.last_synchronized_at);
    assert!(!h.remote.calls().contains(&Call::Query));
}

#[tokio::test]
async fn pull_decrypt_failure_is_logged() {
    // Arrange
    let h = Harness::new().await;
    h.db
        .subscriptions
        .insert(&SubscriptionRecord {
            id: "broken".to_string(),
            account_id: ACCOUNT.to_string(),
            vault_id: VAULT.to_string(),
            user_id: USER.to_string(),
            uri: BOOK.to_string(),
            username: "jane".to_string(),
            password_ciphertext: "sealed-under-another-key".to_string(),
            sync_way: 3,
            active: true,
            distant_sync_token: None,
            last_synchronized_at: None,
            frequency_minutes: 180,
            created_at: 0,
        })
        .await
        .unwrap();

    // Act
    let err = h
        .sync
        .sync_subscription(&CancellationToken::new(), "broken", VAULT)
        .await
        .unwrap_err();

    // Assert
    assert!(matches!(err, SyncError::Decrypt(_)), "{err:?}");
    assert!(h.remote.calls().is_empty());
    assert!(h.factory.credentials().is_empty());

    let logs = h.logs("broken").await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, SyncAction::Error);
    assert!(logs[0].error_message.as_deref().unwrap().contains("decrypt"));

    // no automatic disabling
    let sub = h.sync.get_subscription("broken", VAULT).await.unwrap();
    assert!(sub.active);
}

#[tokio::test]
async fn pull_uses_decrypted_password() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Pull).await;

    h.pull(&sub_id).await;

    let credentials = h.factory.credentials();
    assert_eq!(credentials.len(), 1);
    assert_eq!(credentials[0].0, BOOK);
    assert_eq!(credentials[0].1, "jane");
    assert_eq!(credentials[0].2, PASSWORD);
}

#[tokio::test]
async fn pull_panic_is_contained() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.remote.set_panic_on_listing(true);

    let err = h
        .sync
        .sync_subscription(&CancellationToken::new(), &sub_id, VAULT)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Panicked(_)), "{err:?}");

    // the store is still usable
    h.remote.set_panic_on_listing(false);
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    assert_eq!(h.pull(&sub_id).await.created, 1);
}

#[tokio::test]
async fn pull_honors_cancellation() {
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Pull).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .sync
        .sync_subscription(&cancel, &sub_id, VAULT)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert!(h.live_contacts().await.is_empty());
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert!(sub.last_synchronized_at.is_none());
    assert!(h.logs(&sub_id).await.is_empty());
}

#[tokio::test]
async fn pull_push_only_subscription_only_marks_run_time() {
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let sub_id = h.subscribe(SyncWay::Push).await;

    let result = h.pull(&sub_id).await;

    assert_eq!(result, SyncResult::default());
    assert!(h.remote.calls().is_empty());
    assert!(h.live_contacts().await.is_empty());
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert!(sub.last_synchronized_at.is_some());
}

#[tokio::test]
async fn pull_rejects_subscription_of_other_vault() {
    let h = Harness::new().await;
    let sub_id = h.subscribe(SyncWay::Pull).await;

    let err = h
        .sync
        .sync_subscription(&CancellationToken::new(), &sub_id, "other-vault")
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::SubscriptionNotFound(_)));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn pull_then_export_preserves_names() {
    let h = Harness::new().await;
    let card = "BEGIN:VCARD\r\nVERSION:3.0\r\nN:Smith;Alice;;;\r\nFN:Alice Smith\r\n\
NICKNAME:Ally\r\nEND:VCARD\r\n";
    let href = h.remote.upsert_card("a.vcf", card);
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.pull(&sub_id).await;

    let record = h.contact_at(&href).await.unwrap();
    let contact = h.contacts.get(&record.id, VAULT).await.unwrap();
    let exported = crmdav_core::mapper::encode(&contact);
    let fields = crmdav_core::mapper::decode(&exported).unwrap();

    assert_eq!(fields.name, contact.name);
    assert_eq!(fields.name.nickname.as_deref(), Some("Ally"));
}

#[tokio::test]
async fn pull_token_not_advanced_when_multiget_omits_members() {
    // Arrange
    let h = Harness::new().await;
    let a = h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    let b = h.remote.upsert_card("b.vcf", &vcard("b", "Bob", "Jones"));
    let sub_id = h.subscribe(SyncWay::Both).await;
    h.remote.omit_from_multiget(&["b.vcf"]);

    // Act
    let result = h.pull(&sub_id).await;

    // Assert
    assert_eq!(result.created, 1);
    assert_eq!(result.errors, 1);
    assert!(h.contact_at(&a).await.is_some());
    assert!(h.contact_at(&b).await.is_none());

    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, None);
    assert!(sub.last_synchronized_at.is_none());

    let logs = h.logs(&sub_id).await;
    let errors: Vec<_> = logs
        .iter()
        .filter(|l| l.action == SyncAction::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].distant_uri.as_deref(), Some(b.as_str()));

    // Act - the server returns everything again
    h.remote.omit_from_multiget(&[]);
    let result = h.pull(&sub_id).await;

    // Assert - the omitted card is fetched on the next run
    assert_eq!(result.created, 1);
    assert_eq!(result.skipped, 1);
    assert!(h.contact_at(&b).await.is_some());
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, Some(h.remote.token()));
}

#[tokio::test]
async fn pull_skips_malformed_lines_and_advances_token() {
    let h = Harness::new().await;
    let card = "BEGIN:VCARD\r\nVERSION:2.1\r\nN:Jones;Bob;;;\r\nFN:Bob Jones\r\n\
NOTE;ENCODING=QUOTED-PRINTABLE:first half=\r\nsecond half without a colon\r\n\
EMAIL;INTERNET:bob@example.com\r\nEND:VCARD\r\n";
    let href = h.remote.upsert_card("bob.vcf", card);
    let sub_id = h.subscribe(SyncWay::Pull).await;

    let result = h.pull(&sub_id).await;

    assert_eq!(
        result,
        SyncResult {
            created: 1,
            ..SyncResult::default()
        }
    );
    let bob = h.contact_at(&href).await.expect("bob should exist");
    assert_eq!(bob.first_name.as_deref(), Some("Bob"));
    assert_eq!(bob.last_name.as_deref(), Some("Jones"));

    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, Some(h.remote.token()));
}

#[tokio::test]
async fn pull_stores_token_of_emptied_address_book() {
    // Arrange
    let h = Harness::new().await;
    h.remote.upsert_card("a.vcf", &vcard("a", "Alice", "Smith"));
    h.remote.remove_card("a.vcf");
    let sub_id = h.subscribe(SyncWay::Pull).await;
    h.db
        .subscriptions
        .update_sync_status(&sub_id, Some("tok-999"), 0)
        .await
        .unwrap();

    // Act
    let result = h.pull(&sub_id).await;

    // Assert
    assert_eq!(result, SyncResult::default());
    assert_eq!(
        h.remote.calls(),
        vec![
            Call::SyncCollection("tok-999".to_string()),
            Call::SyncCollection(String::new()),
            Call::Query,
        ]
    );
    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, Some(h.remote.token()));

    // Act - the next run goes straight to incremental sync
    h.remote.clear_calls();
    h.pull(&sub_id).await;

    // Assert
    assert_eq!(h.remote.calls(), vec![Call::SyncCollection(h.remote.token())]);
}
