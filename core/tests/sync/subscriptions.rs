// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Connection tests, subscription management and sync-log reads.

use crmdav_core::{ConnectionParams, ErrorKind, PageMeta, Pager, SyncAction, SyncError, SyncWay};

use crate::common::{
    ACCOUNT, BOOK, HOST, Harness, PASSWORD, USER, VAULT, draft, new_subscription, vcard,
};

fn params() -> ConnectionParams {
    ConnectionParams {
        uri: HOST.to_string(),
        username: "jane".to_string(),
        password: PASSWORD.to_string(),
    }
}

#[tokio::test]
async fn test_connection_lists_address_books() {
    let h = Harness::new().await;

    let result = h.sync.test_connection(&params()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.error, None);
    let books: Vec<_> = result
        .address_books
        .iter()
        .map(|b| (b.uri.as_str(), b.name.as_str()))
        .collect();
    assert_eq!(
        books,
        vec![
            (BOOK, "Contacts"),
            ("https://dav.example.com/addressbooks/jane/work/", "work"),
        ]
    );
    assert_eq!(
        h.factory.credentials(),
        vec![(HOST.to_string(), "jane".to_string(), PASSWORD.to_string())]
    );
}

#[tokio::test]
async fn test_connection_reports_rejected_credentials() {
    let h = Harness::new().await;
    h.remote.set_reject_credentials(true);

    let result = h.sync.test_connection(&params()).await;

    assert!(!result.success);
    assert!(result.address_books.is_empty());
    assert!(result.error.unwrap().contains("authentication"));
}

#[tokio::test]
async fn test_connection_reports_client_failure() {
    let h = Harness::new().await;
    h.factory.set_reject(true);

    let result = h.sync.test_connection(&params()).await;

    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn create_subscription_seals_password_and_applies_defaults() {
    let h = Harness::new().await;

    let id = h.subscribe(SyncWay::Both).await;

    let record = h.db.subscriptions.get(&id).await.unwrap().unwrap();
    assert_ne!(record.password_ciphertext, PASSWORD);
    assert!(!record.password_ciphertext.contains(PASSWORD));

    let sub = h.sync.get_subscription(&id, VAULT).await.unwrap();
    assert_eq!(sub.account_id, ACCOUNT);
    assert_eq!(sub.user_id, USER);
    assert_eq!(sub.uri, BOOK);
    assert_eq!(sub.sync_way, SyncWay::Both);
    assert_eq!(sub.frequency_minutes, 180);
    assert!(sub.active);
    assert_eq!(sub.distant_sync_token, None);
    assert_eq!(sub.last_synchronized_at, None);

    // nothing is contacted on creation
    assert!(h.factory.credentials().is_empty());
}

#[tokio::test]
async fn create_subscription_keeps_explicit_frequency() {
    let h = Harness::new().await;
    let mut new = new_subscription(SyncWay::Pull);
    new.frequency_minutes = Some(15);

    let id = h.sync.create_subscription(&new).await.unwrap();

    let sub = h.sync.get_subscription(&id, VAULT).await.unwrap();
    assert_eq!(sub.frequency_minutes, 15);
}

#[tokio::test]
async fn create_subscription_rejects_invalid_uri() {
    let h = Harness::new().await;
    for uri in ["dav.example.com/book", "ftp://dav.example.com/", "https://"] {
        let mut new = new_subscription(SyncWay::Pull);
        new.uri = uri.to_string();

        let err = h.sync.create_subscription(&new).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{uri}");
    }
    assert!(h.sync.list_subscriptions(VAULT).await.unwrap().is_empty());
}

#[tokio::test]
async fn subscriptions_are_scoped_to_their_vault() {
    let h = Harness::new().await;
    let id = h.subscribe(SyncWay::Pull).await;

    assert_eq!(h.sync.list_subscriptions(VAULT).await.unwrap().len(), 1);
    assert!(h.sync.list_subscriptions("other").await.unwrap().is_empty());

    for err in [
        h.sync.get_subscription(&id, "other").await.unwrap_err(),
        h.sync
            .set_subscription_active(&id, "other", false)
            .await
            .unwrap_err(),
        h.sync.delete_subscription(&id, "other").await.unwrap_err(),
        h.sync
            .get_sync_logs(&id, "other", &Pager::default())
            .await
            .unwrap_err(),
    ] {
        assert!(matches!(err, SyncError::SubscriptionNotFound(_)), "{err:?}");
    }
    assert!(h.sync.get_subscription(&id, VAULT).await.unwrap().active);
}

#[tokio::test]
async fn set_subscription_active_toggles() {
    let h = Harness::new().await;
    let id = h.subscribe(SyncWay::Pull).await;

    h.sync.set_subscription_active(&id, VAULT, false).await.unwrap();
    assert!(!h.sync.get_subscription(&id, VAULT).await.unwrap().active);

    h.sync.set_subscription_active(&id, VAULT, true).await.unwrap();
    assert!(h.sync.get_subscription(&id, VAULT).await.unwrap().active);
}

#[tokio::test]
async fn delete_subscription_drops_states_and_logs() {
    let h = Harness::new().await;
    let id = h.subscribe(SyncWay::Push).await;
    let contact = h
        .contacts
        .create(ACCOUNT, VAULT, USER, &draft("Carol", "Danvers"))
        .await
        .unwrap();
    assert!(h.state(&contact.id, &id).await.is_some());

    h.sync.delete_subscription(&id, VAULT).await.unwrap();

    assert!(h.db.states.list_for_contact(&contact.id).await.unwrap().is_empty());
    assert_eq!(h.db.sync_logs.count(&id).await.unwrap(), 0);
    assert!(matches!(
        h.sync.get_subscription(&id, VAULT).await,
        Err(SyncError::SubscriptionNotFound(_))
    ));
    // the contact itself stays
    assert!(h.contacts.get(&contact.id, VAULT).await.is_ok());
}

#[tokio::test]
async fn sync_logs_are_paged_newest_first() {
    let h = Harness::new().await;
    h.remote.set_sync_supported(false);
    for (i, name) in ["Ann", "Ben", "Cid", "Dee", "Eve"].iter().enumerate() {
        h.remote
            .upsert_card(&format!("{i}.vcf"), &vcard(&i.to_string(), name, "Doe"));
    }
    let id = h.subscribe(SyncWay::Pull).await;
    h.pull(&id).await;

    let (page, meta) = h
        .sync
        .get_sync_logs(&id, VAULT, &Pager::from((2, 2)))
        .await
        .unwrap();

    assert_eq!(
        meta,
        PageMeta {
            total: 5,
            page: 2,
            per_page: 2,
            last_page: 3,
        }
    );
    assert_eq!(page.len(), 2);
    assert!(page.iter().all(|l| l.action == SyncAction::Created));

    let (all, _) = h
        .sync
        .get_sync_logs(&id, VAULT, &Pager::from((1, 10)))
        .await
        .unwrap();
    assert!(all.windows(2).all(|w| w[0].id > w[1].id));
    assert_eq!(page[0].id, all[2].id);
}
