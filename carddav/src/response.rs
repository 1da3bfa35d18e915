// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CardDAV operations.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::CardDavError;
use crate::types::{AddressBook, AddressObject, ETag, Href, SyncCollection, SyncItem};
use crate::xml::{read_element_text, read_nested_href};

/// `WebDAV` multistatus response.
#[derive(Debug, Clone, Default)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
    /// The `sync-token` of a sync-collection report, if present.
    pub sync_token: Option<String>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// The href the response is about, as sent by the server.
    pub href: Href,
    /// Property groups with their status.
    pub prop_stats: Vec<PropStat>,
    /// Response-level status, used for members removed from a collection.
    pub status: Option<String>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    /// Properties reported under this status.
    pub props: Properties,
    /// HTTP status line, e.g. `HTTP/1.1 200 OK`.
    pub status: String,
}

impl PropStat {
    fn is_ok(&self) -> bool {
        status_code(&self.status).is_some_and(|code| (200..300).contains(&code))
    }
}

/// WebDAV/CardDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// `DAV:displayname`.
    pub display_name: Option<String>,
    /// `DAV:getetag`.
    pub get_etag: Option<ETag>,
    /// `CARDDAV:address-data`.
    pub address_data: Option<String>,
    /// `CARDDAV:addressbook-home-set`.
    pub addressbook_home_set: Option<Href>,
    /// `DAV:current-user-principal`.
    pub current_user_principal: Option<Href>,
    /// `CARDDAV:addressbook-description`.
    pub addressbook_description: Option<String>,
    /// Resource type contains `DAV:collection`.
    pub is_collection: bool,
    /// Resource type contains `CARDDAV:addressbook`.
    pub is_addressbook: bool,
}

impl MultiStatusResponse {
    /// Parses multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    pub fn from_xml(xml: &str) -> Result<Self, CardDavError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = true;

        let mut result = Self::default();
        let mut current_response: Option<ResponseItem> = None;
        let mut current_props: Option<Properties> = None;
        let mut in_prop = false;

        let mut buf = Vec::new();
        let mut inner = Vec::new();

        loop {
            let (name, is_start) = match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(ref e) => (e.name().local_name().into_inner().to_vec(), true),
                Event::Empty(ref e) => (e.name().local_name().into_inner().to_vec(), false),
                Event::End(ref e) => {
                    match e.name().local_name().into_inner() {
                        b"response" => {
                            if let Some(resp) = current_response.take() {
                                result.responses.push(resp);
                            }
                        }
                        b"propstat" => current_props = None,
                        b"prop" => in_prop = false,
                        _ => {}
                    }
                    buf.clear();
                    continue;
                }
                _ => {
                    buf.clear();
                    continue;
                }
            };
            buf.clear();

            if !is_start {
                continue;
            }

            match name.as_slice() {
                b"response" => {
                    current_response = Some(ResponseItem {
                        href: Href::new(String::new()),
                        prop_stats: Vec::new(),
                        status: None,
                    });
                }
                b"propstat" if current_response.is_some() => {
                    current_props = Some(Properties::default());
                }
                b"prop" if current_props.is_some() => in_prop = true,
                b"sync-token" if current_response.is_none() => {
                    let token = read_element_text(&mut reader, &mut inner)?;
                    result.sync_token = Some(token.trim().to_string());
                }
                b"href" if !in_prop => {
                    let href = read_element_text(&mut reader, &mut inner)?;
                    if let Some(resp) = current_response.as_mut() {
                        resp.href = Href::new(href.trim().to_string());
                    }
                }
                b"status" => {
                    let status = read_element_text(&mut reader, &mut inner)?
                        .trim()
                        .to_string();
                    match (current_props.take(), current_response.as_mut()) {
                        (Some(props), Some(resp)) => {
                            resp.prop_stats.push(PropStat { props, status });
                        }
                        (None, Some(resp)) => resp.status = Some(status),
                        _ => {}
                    }
                }
                _ if in_prop => {
                    if let Some(props) = current_props.as_mut() {
                        read_property(&mut reader, &mut inner, &name, props)?;
                    }
                }
                _ => {}
            }
        }

        Ok(result)
    }

    /// Converts the response of a sync-collection report.
    ///
    /// Members reported with a `404` status are deletions; members with a
    /// successful propstat are updates. The collection itself is skipped.
    #[must_use]
    pub fn into_sync_collection(self) -> SyncCollection {
        let mut sync = SyncCollection {
            sync_token: self.sync_token.unwrap_or_default(),
            ..Default::default()
        };

        for response in self.responses {
            if response
                .status
                .as_deref()
                .and_then(status_code)
                .is_some_and(|code| code == 404)
            {
                sync.deleted.push(response.href);
                continue;
            }

            let ok = response.prop_stats.iter().find(|p| p.is_ok());
            if let Some(prop_stat) = ok {
                if prop_stat.props.is_collection {
                    continue;
                }
                sync.updated.push(SyncItem {
                    href: response.href,
                    etag: prop_stat.props.get_etag.clone().unwrap_or_default(),
                });
            }
        }

        sync
    }

    /// Converts multistatus response to address objects.
    ///
    /// Members without address data (e.g. `404` entries of a multiget) are skipped.
    #[must_use]
    pub fn into_address_objects(self) -> Vec<AddressObject> {
        let mut objects = Vec::new();

        for response in self.responses {
            for prop_stat in &response.prop_stats {
                if !prop_stat.is_ok() {
                    continue;
                }
                if let Some(data) = &prop_stat.props.address_data {
                    objects.push(AddressObject::new(
                        response.href.clone(),
                        prop_stat.props.get_etag.clone().unwrap_or_default(),
                        data.clone(),
                    ));
                }
            }
        }

        objects
    }

    /// Converts multistatus response to address book collections.
    #[must_use]
    pub fn into_address_books(self) -> Vec<AddressBook> {
        let mut books = Vec::new();

        for response in self.responses {
            for prop_stat in &response.prop_stats {
                if prop_stat.is_ok() && prop_stat.props.is_addressbook {
                    let mut book = AddressBook::new(response.href.clone());
                    book.display_name.clone_from(&prop_stat.props.display_name);
                    book.description
                        .clone_from(&prop_stat.props.addressbook_description);
                    books.push(book);
                }
            }
        }

        books
    }

    /// Returns the first reported `current-user-principal`.
    #[must_use]
    pub fn current_user_principal(&self) -> Option<Href> {
        self.find_prop(|p| p.current_user_principal.clone())
    }

    /// Returns the first reported `addressbook-home-set`.
    #[must_use]
    pub fn addressbook_home_set(&self) -> Option<Href> {
        self.find_prop(|p| p.addressbook_home_set.clone())
    }

    fn find_prop<T>(&self, f: impl Fn(&Properties) -> Option<T>) -> Option<T> {
        self.responses
            .iter()
            .flat_map(|r| r.prop_stats.iter())
            .filter(|p| p.is_ok())
            .find_map(|p| f(&p.props))
    }
}

fn read_property(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
    name: &[u8],
    props: &mut Properties,
) -> Result<(), CardDavError> {
    match name {
        b"displayname" => props.display_name = Some(read_element_text(reader, buf)?),
        b"getetag" => {
            props.get_etag = Some(ETag::new(read_element_text(reader, buf)?.trim().to_string()));
        }
        b"address-data" => props.address_data = Some(read_element_text(reader, buf)?),
        b"addressbook-description" => {
            props.addressbook_description = Some(read_element_text(reader, buf)?);
        }
        b"current-user-principal" => {
            props.current_user_principal = read_nested_href(reader, buf)?.map(Href::new);
        }
        b"addressbook-home-set" => {
            props.addressbook_home_set = read_nested_href(reader, buf)?.map(Href::new);
        }
        b"resourcetype" => read_resource_type(reader, buf, props)?,
        _ => {
            // unknown property, skip its content
            read_element_text(reader, buf)?;
        }
    }
    Ok(())
}

fn read_resource_type(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
    props: &mut Properties,
) -> Result<(), CardDavError> {
    let mut depth = 0_usize;
    loop {
        match reader.read_event_into(buf)? {
            Event::Start(ref e) => {
                mark_resource_type(e.name().local_name().into_inner(), props);
                depth += 1;
            }
            Event::Empty(ref e) => mark_resource_type(e.name().local_name().into_inner(), props),
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Eof => return Err(CardDavError::Xml("Unexpected EOF".to_string())),
            _ => {}
        }
        buf.clear();
    }
    buf.clear();
    Ok(())
}

fn mark_resource_type(name: &[u8], props: &mut Properties) {
    match name {
        b"collection" => props.is_collection = true,
        b"addressbook" => props.is_addressbook = true,
        _ => {}
    }
}

fn status_code(status: &str) -> Option<u16> {
    status.split_whitespace().nth(1)?.parse().ok()
}
