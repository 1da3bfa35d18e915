// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The seam between the sync engines and remote address books.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crmdav_carddav::{
    AddressBook, AddressObject, CardDavClient, CardDavConfig, Href, PutResponse, SyncCollection,
};

use crate::error::SyncError;

/// Operations the sync engines need from a remote address book server.
///
/// Every href handed out is an absolute URL.
#[async_trait]
pub trait AddressBookClient: Send + Sync {
    /// Finds the principal of the authenticated user, `None` when not reported.
    async fn find_current_user_principal(&self) -> Result<Option<Href>, SyncError>;

    /// Finds the address book home set of a principal.
    async fn find_address_book_home_set(&self, principal: &Href) -> Result<Href, SyncError>;

    /// Lists the address books below a home set.
    async fn find_address_books(&self, home_set: &Href) -> Result<Vec<AddressBook>, SyncError>;

    /// Reports changes since `sync_token`; an empty token lists everything.
    async fn sync_collection(
        &self,
        address_book: &Href,
        sync_token: &str,
    ) -> Result<SyncCollection, SyncError>;

    /// Fetches the given members of an address book.
    async fn multi_get_address_book(
        &self,
        address_book: &Href,
        hrefs: &[Href],
    ) -> Result<Vec<AddressObject>, SyncError>;

    /// Fetches every card of an address book.
    async fn query_address_book(&self, address_book: &Href)
    -> Result<Vec<AddressObject>, SyncError>;

    /// Fetches one card.
    async fn get_address_object(&self, href: &Href) -> Result<AddressObject, SyncError>;

    /// Stores a card; the server may place it elsewhere.
    async fn put_address_object(&self, href: &Href, card: &str)
    -> Result<PutResponse, SyncError>;

    /// Deletes a resource.
    async fn remove_all(&self, href: &Href) -> Result<(), SyncError>;
}

/// Builds clients for a remote.
pub trait ClientFactory: Send + Sync {
    /// Creates a client for `uri`; each remote operation is bounded by `timeout`.
    fn create(
        &self,
        uri: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn AddressBookClient>, SyncError>;
}

/// Builds [`CardDavClient`]s.
#[derive(Debug, Clone)]
pub struct CardDavClientFactory {
    user_agent: String,
}

impl CardDavClientFactory {
    /// Creates a factory whose clients send `user_agent`.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl ClientFactory for CardDavClientFactory {
    fn create(
        &self,
        uri: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn AddressBookClient>, SyncError> {
        let mut config = CardDavConfig::with_credentials(uri, username, password);
        config.timeout_secs = timeout.as_secs().max(1);
        config.user_agent.clone_from(&self.user_agent);

        let inner = CardDavClient::new(config).map_err(|e| SyncError::ClientCreate(e.to_string()))?;
        Ok(Arc::new(TimedClient { inner, timeout }))
    }
}

/// A [`CardDavClient`] with a hard deadline on every operation.
#[derive(Debug)]
struct TimedClient {
    inner: CardDavClient,
    timeout: Duration,
}

impl TimedClient {
    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, crmdav_carddav::CardDavError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::RemoteNetwork(format!(
                "{op} timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl AddressBookClient for TimedClient {
    async fn find_current_user_principal(&self) -> Result<Option<Href>, SyncError> {
        self.bounded("PROPFIND", self.inner.find_current_user_principal())
            .await
    }

    async fn find_address_book_home_set(&self, principal: &Href) -> Result<Href, SyncError> {
        self.bounded("PROPFIND", self.inner.find_address_book_home_set(principal))
            .await
    }

    async fn find_address_books(&self, home_set: &Href) -> Result<Vec<AddressBook>, SyncError> {
        self.bounded("PROPFIND", self.inner.find_address_books(home_set))
            .await
    }

    async fn sync_collection(
        &self,
        address_book: &Href,
        sync_token: &str,
    ) -> Result<SyncCollection, SyncError> {
        self.bounded(
            "sync-collection",
            self.inner.sync_collection(address_book, sync_token),
        )
        .await
    }

    async fn multi_get_address_book(
        &self,
        address_book: &Href,
        hrefs: &[Href],
    ) -> Result<Vec<AddressObject>, SyncError> {
        self.bounded(
            "addressbook-multiget",
            self.inner.multi_get_address_book(address_book, hrefs),
        )
        .await
    }

    async fn query_address_book(
        &self,
        address_book: &Href,
    ) -> Result<Vec<AddressObject>, SyncError> {
        self.bounded(
            "addressbook-query",
            self.inner.query_address_book(address_book),
        )
        .await
    }

    async fn get_address_object(&self, href: &Href) -> Result<AddressObject, SyncError> {
        self.bounded("GET", self.inner.get_address_object(href)).await
    }

    async fn put_address_object(&self, href: &Href, card: &str) -> Result<PutResponse, SyncError> {
        self.bounded("PUT", self.inner.put_address_object(href, card))
            .await
    }

    async fn remove_all(&self, href: &Href) -> Result<(), SyncError> {
        self.bounded("DELETE", self.inner.remove_all(href)).await
    }
}

/// Walks principal, home set and address books, starting from `uri`.
///
/// When the server reports no principal, `uri` itself is listed as a home set.
pub(crate) async fn discover_address_books(
    client: &dyn AddressBookClient,
    uri: &str,
) -> Result<Vec<AddressBook>, SyncError> {
    let home_set = match client.find_current_user_principal().await? {
        Some(principal) => client.find_address_book_home_set(&principal).await?,
        None => Href::from(uri),
    };
    client.find_address_books(&home_set).await
}
