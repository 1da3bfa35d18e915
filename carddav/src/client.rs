// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CardDAV` client for address book operations.

use std::sync::Arc;

use reqwest::{Method, Response, Url};

use crate::config::CardDavConfig;
use crate::error::CardDavError;
use crate::http::HttpClient;
use crate::request::{
    AddressBookMultiGetRequest, AddressBookQueryRequest, Prop, PropFindRequest,
    SyncCollectionRequest,
};
use crate::response::MultiStatusResponse;
use crate::types::{AddressBook, AddressObject, Href, PutResponse, SyncCollection, normalize_url};

/// `CardDAV` client for accessing and managing address books on `CardDAV` servers.
///
/// Every href handed out by the client is an absolute URL resolved against
/// [`CardDavConfig::base_url`] and normalized with [`Href::normalize`], so the
/// same resource is always spelled the same way. Hrefs passed in may be
/// absolute or relative.
///
/// # Example
///
/// ```ignore
/// use crmdav_carddav::{CardDavClient, CardDavConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CardDavConfig::with_credentials(
///     "https://dav.example.com/addressbooks/jane/contacts/",
///     "jane",
///     "secret",
/// );
///
/// let client = CardDavClient::new(config)?;
/// let principal = client.find_current_user_principal().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CardDavClient {
    http: Arc<HttpClient>,
    base: Url,
}

impl CardDavClient {
    /// Creates a new `CardDAV` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or HTTP client initialization fails.
    pub fn new(config: CardDavConfig) -> Result<Self, CardDavError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| CardDavError::Config(format!("Invalid base URL: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(CardDavError::Config(format!(
                "Unsupported URL scheme: {}",
                base.scheme()
            )));
        }

        let http = HttpClient::new(config)?;
        Ok(Self {
            http: Arc::new(http),
            base,
        })
    }

    /// Returns the base URL of this client.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Whether this client switched to Digest authentication after a challenge.
    #[must_use]
    pub fn uses_digest(&self) -> bool {
        self.http.uses_digest()
    }

    /// Finds the principal of the authenticated user.
    ///
    /// Returns `None` when the server does not report one.
    ///
    /// # Errors
    ///
    /// Returns an error if the PROPFIND fails.
    pub async fn find_current_user_principal(&self) -> Result<Option<Href>, CardDavError> {
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::CurrentUserPrincipal);

        let multistatus = self
            .propfind(self.base.as_str(), "0", propfind.build()?)
            .await?;
        Ok(multistatus
            .current_user_principal()
            .filter(|href| !href.is_empty())
            .map(|href| self.resolve(&href)))
    }

    /// Finds the address book home set of a principal.
    ///
    /// # Errors
    ///
    /// Returns [`CardDavError::UnreachableCollection`] if the server does not
    /// advertise a home set, or an error if the PROPFIND fails.
    pub async fn find_address_book_home_set(
        &self,
        principal: &Href,
    ) -> Result<Href, CardDavError> {
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::AddressBookHomeSet);

        let url = self.full_url(principal.as_str());
        let multistatus = self.propfind(&url, "0", propfind.build()?).await?;
        multistatus
            .addressbook_home_set()
            .filter(|href| !href.is_empty())
            .map(|href| self.resolve(&href))
            .ok_or_else(|| {
                CardDavError::UnreachableCollection(format!(
                    "{principal} does not advertise an address book home set"
                ))
            })
    }

    /// Lists the address books directly under a home set.
    ///
    /// # Errors
    ///
    /// Returns an error if the PROPFIND fails.
    pub async fn find_address_books(
        &self,
        home_set: &Href,
    ) -> Result<Vec<AddressBook>, CardDavError> {
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::ResourceType);
        propfind.add_property(Prop::DisplayName);
        propfind.add_property(Prop::AddressBookDescription);

        let url = self.full_url(home_set.as_str());
        let multistatus = self.propfind(&url, "1", propfind.build()?).await?;
        Ok(multistatus
            .into_address_books()
            .into_iter()
            .map(|mut book| {
                book.href = self.resolve(&book.href);
                book
            })
            .collect())
    }

    /// Runs a sync-collection report (RFC 6578) against an address book.
    ///
    /// An empty `sync_token` asks for the full listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the report (e.g. an invalid token
    /// or no sync support) or the response is malformed.
    pub async fn sync_collection(
        &self,
        address_book: &Href,
        sync_token: &str,
    ) -> Result<SyncCollection, CardDavError> {
        let body = SyncCollectionRequest::new(sync_token).build()?;
        let url = self.full_url(address_book.as_str());
        let multistatus = self.report(&url, "0", body).await?;

        let base = Href::new(url);
        let mut sync = multistatus.into_sync_collection();
        sync.updated.retain_mut(|item| {
            item.href = self.resolve(&item.href);
            !same_resource(&item.href, &base)
        });
        for href in &mut sync.deleted {
            *href = self.resolve(href);
        }

        tracing::debug!(
            href = %address_book,
            updated = sync.updated.len(),
            deleted = sync.deleted.len(),
            "sync-collection report"
        );
        Ok(sync)
    }

    /// Fetches several address objects of an address book at once.
    ///
    /// Callers keep batches small. Members the server cannot return (a `404`
    /// or any other failed status) are missing from the result, so callers
    /// compare it with the requested hrefs.
    ///
    /// # Errors
    ///
    /// Returns an error if the report fails.
    pub async fn multi_get_address_book(
        &self,
        address_book: &Href,
        hrefs: &[Href],
    ) -> Result<Vec<AddressObject>, CardDavError> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }

        let mut multiget = AddressBookMultiGetRequest::new();
        for href in hrefs {
            multiget.add_href(self.request_path(href));
        }

        let url = self.full_url(address_book.as_str());
        let multistatus = self.report(&url, "1", multiget.build()?).await?;
        Ok(self.resolve_objects(multistatus.into_address_objects()))
    }

    /// Fetches every address object of an address book.
    ///
    /// # Errors
    ///
    /// Returns an error if the report fails.
    pub async fn query_address_book(
        &self,
        address_book: &Href,
    ) -> Result<Vec<AddressObject>, CardDavError> {
        let body = AddressBookQueryRequest::new().build()?;
        let url = self.full_url(address_book.as_str());
        let multistatus = self.report(&url, "1", body).await?;
        Ok(self.resolve_objects(multistatus.into_address_objects()))
    }

    /// Gets a single address object by href.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist.
    pub async fn get_address_object(&self, href: &Href) -> Result<AddressObject, CardDavError> {
        let url = self.full_url(href.as_str());
        let resp = self
            .http
            .execute(self.http.build_request(Method::GET, &url))
            .await?;

        let etag = HttpClient::extract_etag(&resp);
        let card = resp.text().await?;
        Ok(AddressObject::new(self.resolve(href), etag, card))
    }

    /// Stores a vCard at the given href, creating or replacing it.
    ///
    /// The returned href is where the server actually stored the object: the
    /// `Location` header when present, otherwise the requested href.
    ///
    /// # Errors
    ///
    /// Returns an error if the PUT is rejected.
    pub async fn put_address_object(
        &self,
        href: &Href,
        card: &str,
    ) -> Result<PutResponse, CardDavError> {
        let url = self.full_url(href.as_str());
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(Method::PUT, &url)
                    .header("Content-Type", "text/vcard; charset=utf-8")
                    .body(card.to_string()),
            )
            .await?;

        Ok(self.put_response(href, &resp))
    }

    /// Deletes the resource at the given href.
    ///
    /// A resource that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the DELETE is rejected.
    pub async fn remove_all(&self, href: &Href) -> Result<(), CardDavError> {
        let url = self.full_url(href.as_str());
        match self
            .http
            .execute(self.http.build_request(Method::DELETE, &url))
            .await
        {
            Ok(_) => Ok(()),
            Err(CardDavError::NotFound(_)) => {
                tracing::debug!(%href, "resource already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn propfind(
        &self,
        url: &str,
        depth: &str,
        body: String,
    ) -> Result<MultiStatusResponse, CardDavError> {
        self.xml_request(b"PROPFIND", url, depth, body).await
    }

    async fn report(
        &self,
        url: &str,
        depth: &str,
        body: String,
    ) -> Result<MultiStatusResponse, CardDavError> {
        self.xml_request(b"REPORT", url, depth, body).await
    }

    async fn xml_request(
        &self,
        method: &[u8],
        url: &str,
        depth: &str,
        body: String,
    ) -> Result<MultiStatusResponse, CardDavError> {
        let method = Method::from_bytes(method)
            .map_err(|e| CardDavError::Http(format!("Invalid method: {e}")))?;
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(method, url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .header("Depth", depth)
                    .body(body),
            )
            .await?;

        let xml = resp.text().await?;
        MultiStatusResponse::from_xml(&xml)
    }

    fn put_response(&self, requested: &Href, resp: &Response) -> PutResponse {
        let href = HttpClient::extract_location(resp)
            .filter(|location| !location.is_empty())
            .map_or_else(|| self.resolve(requested), |location| self.resolve(&location));
        PutResponse {
            href,
            etag: HttpClient::extract_etag(resp),
        }
    }

    fn resolve_objects(&self, objects: Vec<AddressObject>) -> Vec<AddressObject> {
        objects
            .into_iter()
            .map(|mut object| {
                object.href = self.resolve(&object.href);
                object
            })
            .collect()
    }

    /// Resolves an href against the base URL into a normalized absolute URL.
    fn resolve(&self, href: &str) -> Href {
        match self.base.join(href) {
            Ok(url) => Href::new(normalize_url(url)),
            Err(_) => Href::new(href.to_string()),
        }
    }

    /// Builds full URL from href.
    fn full_url(&self, href: &str) -> String {
        self.resolve(href).into_string()
    }

    /// Returns the path form of an href on this server, as used in report bodies.
    fn request_path(&self, href: &str) -> String {
        match self.base.join(href) {
            Ok(url) if url.origin() == self.base.origin() => match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            },
            Ok(url) => url.to_string(),
            Err(_) => href.to_string(),
        }
    }
}

fn same_resource(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
