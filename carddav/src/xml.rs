// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML utilities for WebDAV/CardDAV processing.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::CardDavError;

/// XML namespaces used in `CardDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CardDAV` namespace.
    pub const CARDDAV: &str = "urn:ietf:params:xml:ns:carddav";
}

/// Reads the text content of the element whose start tag was just consumed,
/// up to and including its end tag.
///
/// Text split by entity references or CDATA sections is joined back together.
/// Nested elements are skipped, their text is kept.
pub fn read_element_text(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
) -> Result<String, CardDavError> {
    let mut text = String::new();
    let mut depth = 0_usize;

    loop {
        match reader.read_event_into(buf)? {
            Event::Text(e) => text.push_str(&e.decode().map_err(quick_xml::Error::from)?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::GeneralRef(e) => push_entity(&mut text, &String::from_utf8_lossy(&e)),
            Event::Start(_) => depth += 1,
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
    Ok(text)
}

/// Reads the first `<href>` nested in the element whose start tag was just consumed,
/// consuming everything up to and including its end tag.
pub fn read_nested_href(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
) -> Result<Option<String>, CardDavError> {
    let mut href = None;
    let mut depth = 0_usize;
    let mut inner = Vec::new();

    loop {
        let is_href = match reader.read_event_into(buf)? {
            Event::Start(ref e) => {
                depth += 1;
                e.name().local_name().into_inner() == b"href"
            }
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                false
            }
            Event::Eof => return Err(CardDavError::Xml("Unexpected EOF".to_string())),
            _ => false,
        };
        buf.clear();

        if is_href {
            let text = read_element_text(reader, &mut inner)?;
            depth -= 1;
            if href.is_none() {
                href = Some(text.trim().to_string());
            }
        }
    }

    buf.clear();
    Ok(href)
}

/// Appends the text an entity reference (`amp`, `#13`, `#x0D`, ...) stands for.
fn push_entity(text: &mut String, name: &str) {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name.strip_prefix('#').and_then(|code| {
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse().ok(),
            };
            value.and_then(char::from_u32)
        }),
    };

    match resolved {
        Some(c) => text.push(c),
        None => {
            text.push('&');
            text.push_str(name);
            text.push(';');
        }
    }
}
