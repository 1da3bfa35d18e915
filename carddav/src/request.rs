// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CardDAV` operations.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::CardDavError;
use crate::xml::ns;

/// PROPFIND request builder.
#[derive(Debug)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Principal of the authenticated user.
    CurrentUserPrincipal,
    /// Address book home set.
    AddressBookHomeSet,
    /// Address book description.
    AddressBookDescription,
    /// Address data (vCard).
    AddressData,
}

impl Prop {
    const fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "displayname",
            Self::ResourceType => "resourcetype",
            Self::GetETag => "getetag",
            Self::CurrentUserPrincipal => "current-user-principal",
            Self::AddressBookHomeSet => "addressbook-home-set",
            Self::AddressBookDescription => "addressbook-description",
            Self::AddressData => "address-data",
        }
    }

    const fn namespace(self) -> Option<&'static str> {
        match self {
            Self::DisplayName
            | Self::ResourceType
            | Self::GetETag
            | Self::CurrentUserPrincipal => None,
            Self::AddressBookHomeSet | Self::AddressBookDescription | Self::AddressData => {
                Some(ns::CARDDAV)
            }
        }
    }
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:propfind xmlns:D="DAV:">
        let mut propfind = BytesStart::new("D:propfind");
        propfind.push_attribute(("xmlns:D", ns::DAV));
        if self.props.iter().any(|p| p.namespace().is_some()) {
            propfind.push_attribute(("xmlns:C", ns::CARDDAV));
        }
        writer.write_event(Event::Start(propfind))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        for prop in &self.props {
            write_prop(&mut writer, *prop)?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;

        finish(writer)
    }
}

impl Default for PropFindRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Address book query request builder.
///
/// Asks for every address object in the collection together with its `ETag`
/// and vCard data.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressBookQueryRequest;

impl AddressBookQueryRequest {
    /// Creates a new address book query request.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the XML body for the address book query request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <C:addressbook-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
        let mut query = BytesStart::new("C:addressbook-query");
        query.push_attribute(("xmlns:D", ns::DAV));
        query.push_attribute(("xmlns:C", ns::CARDDAV));
        writer.write_event(Event::Start(query))?;

        write_object_props(&mut writer)?;

        // An empty filter matches every object; some servers reject a missing one.
        writer.write_event(Event::Empty(BytesStart::new("C:filter")))?;

        writer.write_event(Event::End(BytesEnd::new("C:addressbook-query")))?;

        finish(writer)
    }
}

/// Address book multiget request builder.
#[derive(Debug)]
pub struct AddressBookMultiGetRequest {
    hrefs: Vec<String>,
}

impl AddressBookMultiGetRequest {
    /// Creates a new address book multiget request.
    #[must_use]
    pub fn new() -> Self {
        Self { hrefs: Vec::new() }
    }

    /// Adds an href to the request.
    pub fn add_href(&mut self, href: String) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the XML body for the address book multiget request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <C:addressbook-multiget xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
        let mut multiget = BytesStart::new("C:addressbook-multiget");
        multiget.push_attribute(("xmlns:D", ns::DAV));
        multiget.push_attribute(("xmlns:C", ns::CARDDAV));
        writer.write_event(Event::Start(multiget))?;

        write_object_props(&mut writer)?;

        for href in &self.hrefs {
            writer.write_event(Event::Start(BytesStart::new("D:href")))?;
            writer.write_event(Event::Text(BytesText::new(href.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("D:href")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("C:addressbook-multiget")))?;

        finish(writer)
    }
}

impl Default for AddressBookMultiGetRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Sync-collection report builder (RFC 6578).
#[derive(Debug)]
pub struct SyncCollectionRequest {
    sync_token: String,
}

impl SyncCollectionRequest {
    /// Creates a sync-collection request. An empty token asks for a full listing.
    #[must_use]
    pub fn new(sync_token: &str) -> Self {
        Self {
            sync_token: sync_token.to_string(),
        }
    }

    /// Builds the XML body for the sync-collection report.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:sync-collection xmlns:D="DAV:">
        let mut sync = BytesStart::new("D:sync-collection");
        sync.push_attribute(("xmlns:D", ns::DAV));
        writer.write_event(Event::Start(sync))?;

        if self.sync_token.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("D:sync-token")))?;
        } else {
            writer.write_event(Event::Start(BytesStart::new("D:sync-token")))?;
            writer.write_event(Event::Text(BytesText::new(&self.sync_token)))?;
            writer.write_event(Event::End(BytesEnd::new("D:sync-token")))?;
        }

        writer.write_event(Event::Start(BytesStart::new("D:sync-level")))?;
        writer.write_event(Event::Text(BytesText::new("1")))?;
        writer.write_event(Event::End(BytesEnd::new("D:sync-level")))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        write_prop(&mut writer, Prop::GetETag)?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        writer.write_event(Event::End(BytesEnd::new("D:sync-collection")))?;

        finish(writer)
    }
}

/// Writes `<D:prop><D:getetag/><C:address-data/></D:prop>`.
fn write_object_props(writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<(), CardDavError> {
    writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
    write_prop(writer, Prop::GetETag)?;
    write_prop(writer, Prop::AddressData)?;
    writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
    Ok(())
}

fn write_prop(writer: &mut Writer<Cursor<Vec<u8>>>, prop: Prop) -> Result<(), CardDavError> {
    let prefix = if prop.namespace().is_some() { "C" } else { "D" };
    let name = format!("{prefix}:{}", prop.name());
    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    Ok(())
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, CardDavError> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))
}
