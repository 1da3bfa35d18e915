// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

use reqwest::Url;

/// Address object or collection href.
///
/// Hrefs returned by [`CardDavClient`](crate::CardDavClient) are absolute URLs,
/// resolved against the configured base URL, such as
/// `https://dav.example.com/addressbooks/user/contacts/alice.vcf`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Href(String);

impl Href {
    /// Creates a new `Href` from a string.
    #[must_use]
    pub const fn new(href: String) -> Self {
        Self(href)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Href`, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Normalizes an absolute URL so that equivalent spellings compare equal.
    ///
    /// Scheme and host are lowercased, a default port is dropped, and percent
    /// escapes of characters a path may carry verbatim (`%40` for `@`, `%7E`
    /// for `~`) are decoded. Other escapes are kept, with uppercase hex digits.
    /// Anything that is not an absolute URL is returned unchanged.
    #[must_use]
    pub fn normalize(href: &str) -> Self {
        match Url::parse(href) {
            Ok(url) => Self(normalize_url(url)),
            Err(_) => Self(href.to_string()),
        }
    }
}

pub(crate) fn normalize_url(mut url: Url) -> String {
    let path = decode_path(url.path());
    url.set_path(&path);
    url.into()
}

fn decode_path(path: &str) -> String {
    fn from_hex(byte: u8) -> Option<u8> {
        match byte {
            b'0'..=b'9' => Some(byte - b'0'),
            b'a'..=b'f' => Some(byte - b'a' + 10),
            b'A'..=b'F' => Some(byte - b'A' + 10),
            _ => None,
        }
    }

    // unreserved characters, sub-delims, ':' and '@' (RFC 3986 pchar)
    fn is_pchar(byte: u8) -> bool {
        byte.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&byte)
    }

    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while let Some(&byte) = bytes.get(i) {
        let escaped = match byte {
            b'%' => bytes
                .get(i + 1)
                .and_then(|&hi| from_hex(hi))
                .zip(bytes.get(i + 2).and_then(|&lo| from_hex(lo)))
                .map(|(hi, lo)| (hi << 4) | lo),
            _ => None,
        };

        match escaped {
            Some(decoded) if is_pchar(decoded) => out.push(char::from(decoded)),
            Some(decoded) => out.push_str(&format!("%{decoded:02X}")),
            None => {
                out.push(char::from(byte));
                i += 1;
                continue;
            }
        }
        i += 3;
    }
    out
}

impl Deref for Href {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Href {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Href {
    fn from(href: String) -> Self {
        Self(href)
    }
}

impl From<&str> for Href {
    fn from(href: &str) -> Self {
        Self(href.to_string())
    }
}

/// Entity tag for change detection.
///
/// An `ETag` is opaque; two tags are compared for equality only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ETag(String);

impl ETag {
    /// Creates a new `ETag` from a string.
    #[must_use]
    pub const fn new(etag: String) -> Self {
        Self(etag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ETag`, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for ETag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ETag {
    fn from(etag: String) -> Self {
        Self(etag)
    }
}

impl From<&str> for ETag {
    fn from(etag: &str) -> Self {
        Self(etag.to_string())
    }
}

/// An address object resource: one vCard stored in an address book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressObject {
    /// The href of the resource.
    pub href: Href,
    /// The entity tag of the resource, empty when the server sent none.
    pub etag: ETag,
    /// The raw vCard data.
    pub card: String,
}

impl AddressObject {
    /// Creates a new `AddressObject`.
    #[must_use]
    pub const fn new(href: Href, etag: ETag, card: String) -> Self {
        Self { href, etag, card }
    }
}

/// Address book collection metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBook {
    /// The href of the address book collection.
    pub href: Href,
    /// The display name of the address book.
    pub display_name: Option<String>,
    /// The description of the address book.
    pub description: Option<String>,
}

impl AddressBook {
    /// Creates a new `AddressBook`.
    #[must_use]
    pub const fn new(href: Href) -> Self {
        Self {
            href,
            display_name: None,
            description: None,
        }
    }

    /// Returns the display name, falling back to the last path segment of the href.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.display_name {
            Some(name) if !name.is_empty() => name,
            _ => self
                .href
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default(),
        }
    }
}

/// A member reported as changed by a sync-collection report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItem {
    /// The href of the changed member.
    pub href: Href,
    /// Its current entity tag.
    pub etag: ETag,
}

/// Result of a sync-collection report (RFC 6578).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCollection {
    /// The token to present on the next report, empty if the server sent none.
    pub sync_token: String,
    /// Members created or modified since the presented token.
    pub updated: Vec<SyncItem>,
    /// Members removed since the presented token.
    pub deleted: Vec<Href>,
}

/// Outcome of storing an address object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    /// Where the server stored the object; differs from the request target when
    /// the server rewrote the path.
    pub href: Href,
    /// The new entity tag, empty when the server sent none.
    pub etag: ETag,
}
