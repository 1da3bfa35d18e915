// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Pull and push through the real CardDAV client against a wiremock server.

use std::sync::Arc;

use crmdav_core::localdb::LocalDb;
use crmdav_core::{
    CancellationToken, CardDavClientFactory, ContactService, DavSync, NewSubscription, Pager,
    SyncAction, SyncLog, SyncWay,
};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{ACCOUNT, PASSWORD, USER, VAULT, draft, test_config};

struct WireHarness {
    server: MockServer,
    sync: Arc<DavSync>,
    contacts: ContactService,
    db: LocalDb,
}

impl WireHarness {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let db = LocalDb::open(None).await.unwrap();
        let factory = Arc::new(CardDavClientFactory::new("crmdav-test"));
        let sync = Arc::new(DavSync::with_factory(&test_config(), db.clone(), factory));
        let contacts = ContactService::new(db.clone(), sync.clone());
        Self {
            server,
            sync,
            contacts,
            db,
        }
    }

    async fn subscribe(&self, path: &str, sync_way: SyncWay) -> String {
        let new = NewSubscription {
            account_id: ACCOUNT.to_string(),
            vault_id: VAULT.to_string(),
            user_id: USER.to_string(),
            uri: format!("{}{path}", self.server.uri()),
            username: "alice".to_string(),
            password: PASSWORD.to_string(),
            sync_way,
            frequency_minutes: None,
        };
        self.sync.create_subscription(&new).await.unwrap()
    }

    async fn report(&self, body_fragment: &str, response: ResponseTemplate) {
        Mock::given(method("REPORT"))
            .and(body_string_contains(body_fragment))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    async fn logs(&self, subscription_id: &str) -> Vec<SyncLog> {
        let (logs, _) = self
            .sync
            .get_sync_logs(subscription_id, VAULT, &Pager::from((1, 100)))
            .await
            .unwrap();
        logs
    }

    async fn requests_with_method(&self, name: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == name)
            .count()
    }
}

fn multistatus(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(207)
        .insert_header("Content-Type", "application/xml; charset=utf-8")
        .set_body_string(format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
{body}
</d:multistatus>"#
        ))
}

fn card_response(href: &str, etag: &str, card: &str) -> String {
    format!(
        r#"<d:response>
  <d:href>{href}</d:href>
  <d:propstat>
    <d:prop>
      <d:getetag>"{etag}"</d:getetag>
      <card:address-data>{card}</card:address-data>
    </d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"#
    )
}

fn listing_response(href: &str, etag: &str) -> String {
    format!(
        r#"<d:response>
  <d:href>{href}</d:href>
  <d:propstat>
    <d:prop><d:getetag>"{etag}"</d:getetag></d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"#
    )
}

#[tokio::test]
async fn wire_pulled_contact_is_not_pushed_back_to_encoded_origin() {
    // Arrange
    let h = WireHarness::new().await;
    h.report("sync-collection", ResponseTemplate::new(403)).await;
    let card = "BEGIN:VCARD\nVERSION:3.0\nUID:x\nN:Smith;Alice;;;\nFN:Alice Smith\n\
NOTE:keep me\nEND:VCARD\n";
    h.report(
        "addressbook-query",
        multistatus(&card_response("/alice%40example.com/contacts/x.vcf", "e1", card)),
    )
    .await;
    let sub_id = h.subscribe("/alice@example.com/contacts/", SyncWay::Both).await;

    // Act
    let result = h
        .sync
        .sync_subscription(&CancellationToken::new(), &sub_id, VAULT)
        .await
        .unwrap();
    let contacts = h.db.contacts.list(VAULT).await.unwrap();
    let contact = contacts.first().expect("the card should be pulled");
    h.contacts
        .update(&contact.id, VAULT, &draft("Alicia", "Smith"))
        .await
        .unwrap();

    // Assert
    assert_eq!(result.created, 1);
    assert_eq!(
        contact.distant_uri.as_deref(),
        Some(format!("{}/alice@example.com/contacts/x.vcf", h.server.uri()).as_str())
    );
    assert_eq!(h.requests_with_method("PUT").await, 0);

    let actions: Vec<_> = h.logs(&sub_id).await.into_iter().map(|l| l.action).collect();
    assert_eq!(actions, vec![SyncAction::SkippedPushOrigin, SyncAction::Created]);
}

#[tokio::test]
async fn wire_failed_multiget_member_holds_back_token() {
    // Arrange
    let h = WireHarness::new().await;
    let listing = format!(
        "{}\n{}\n<d:sync-token>T2</d:sync-token>",
        listing_response("/book/a.vcf", "a1"),
        listing_response("/book/b.vcf", "b1"),
    );
    h.report("sync-collection", multistatus(&listing)).await;
    let failed = r#"<d:response>
  <d:href>/book/b.vcf</d:href>
  <d:status>HTTP/1.1 503 Service Unavailable</d:status>
</d:response>"#;
    let card = "BEGIN:VCARD\nVERSION:3.0\nUID:a\nN:Smith;Alice;;;\nEND:VCARD\n";
    h.report(
        "addressbook-multiget",
        multistatus(&format!("{}\n{failed}", card_response("/book/a.vcf", "a1", card))),
    )
    .await;
    let sub_id = h.subscribe("/book/", SyncWay::Pull).await;

    // Act
    let result = h
        .sync
        .sync_subscription(&CancellationToken::new(), &sub_id, VAULT)
        .await
        .unwrap();

    // Assert
    assert_eq!(result.created, 1);
    assert_eq!(result.errors, 1);

    let sub = h.sync.get_subscription(&sub_id, VAULT).await.unwrap();
    assert_eq!(sub.distant_sync_token, None);

    let b = format!("{}/book/b.vcf", h.server.uri());
    let logs = h.logs(&sub_id).await;
    assert!(
        logs.iter()
            .any(|l| l.action == SyncAction::Error && l.distant_uri.as_deref() == Some(b.as_str())),
        "{logs:?}"
    );
}
