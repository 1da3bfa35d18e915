// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! A small vCard reader and writer.
//!
//! Reads vCard 3.0 and 4.0 content lines (unfolding, groups, parameters,
//! quoted parameter values) and keeps property values in their escaped wire
//! form; the accessors on [`Property`] unescape on demand. Writing folds lines
//! at 75 octets and ends them with CRLF.

use std::fmt;

use crate::error::SyncError;

const MAX_LINE_OCTETS: usize = 75;

/// A parsed vCard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VCard {
    properties: Vec<Property>,
}

impl VCard {
    /// An empty card.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the first card in `text`.
    ///
    /// Content lines that cannot be read are skipped; only a card without
    /// `BEGIN:VCARD` and `END:VCARD` is rejected.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let mut properties = Vec::new();
        let mut started = false;
        for line in unfold(text) {
            if line.trim().is_empty() {
                continue;
            }

            let prop = match Property::parse(&line) {
                Ok(prop) => prop,
                Err(e) => {
                    tracing::debug!(err = %e, "skipping malformed content line");
                    continue;
                }
            };
            match prop.name.as_str() {
                "BEGIN" if prop.value.eq_ignore_ascii_case("VCARD") => {
                    if started {
                        return Err(invalid("nested BEGIN:VCARD"));
                    }
                    started = true;
                }
                "END" if prop.value.eq_ignore_ascii_case("VCARD") => {
                    if !started {
                        return Err(invalid("END:VCARD before BEGIN:VCARD"));
                    }
                    return Ok(VCard { properties });
                }
                _ if started => properties.push(prop),
                _ => {}
            }
        }

        Err(invalid(if started {
            "missing END:VCARD"
        } else {
            "missing BEGIN:VCARD"
        }))
    }

    /// Appends a property.
    pub fn push(&mut self, prop: Property) -> &mut Self {
        self.properties.push(prop);
        self
    }

    /// All properties, in order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Properties with the given name, case-insensitively.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Property> + 'a {
        self.properties
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    /// The first property with the given name.
    pub fn first<'a>(&'a self, name: &'a str) -> Option<&'a Property> {
        self.all(name).next()
    }
}

impl fmt::Display for VCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        fold("BEGIN:VCARD", &mut out);
        for prop in &self.properties {
            fold(&prop.to_string(), &mut out);
        }
        fold("END:VCARD", &mut out);
        f.write_str(&out)
    }
}

/// One content line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Optional group prefix, such as `item1`.
    pub group: Option<String>,
    /// Property name, upper-cased.
    pub name: String,
    /// Parameters, in order.
    pub params: Vec<Param>,
    /// The escaped value.
    pub value: String,
}

/// A property parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, upper-cased.
    pub name: String,
    /// Parameter values, unquoted.
    pub values: Vec<String>,
}

impl Property {
    /// A property holding an already escaped value.
    pub fn raw(name: &str, value: impl Into<String>) -> Self {
        Self {
            group: None,
            name: name.to_ascii_uppercase(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// A property holding a single text value.
    pub fn text(name: &str, value: &str) -> Self {
        Self::raw(name, escape(value))
    }

    /// A property holding `;`-separated components.
    pub fn structured(name: &str, components: &[&str]) -> Self {
        let value = components
            .iter()
            .map(|c| escape(c))
            .collect::<Vec<_>>()
            .join(";");
        Self::raw(name, value)
    }

    /// Adds a parameter.
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push(Param {
            name: name.to_ascii_uppercase(),
            values: vec![value.to_string()],
        });
        self
    }

    /// The unescaped value.
    pub fn text_value(&self) -> String {
        unescape(&self.value)
    }

    /// The unescaped `;`-separated components.
    pub fn components(&self) -> Vec<String> {
        split_escaped(&self.value, ';')
            .into_iter()
            .map(unescape)
            .collect()
    }

    /// The unescaped `,`-separated values.
    pub fn values(&self) -> Vec<String> {
        split_escaped(&self.value, ',')
            .into_iter()
            .map(unescape)
            .collect()
    }

    fn parse(line: &str) -> Result<Self, SyncError> {
        let mut in_quotes = false;
        let colon = line
            .char_indices()
            .find(|&(_, c)| {
                if c == '"' {
                    in_quotes = !in_quotes;
                }
                c == ':' && !in_quotes
            })
            .map(|(i, _)| i)
            .ok_or_else(|| invalid(&format!("content line without value: {line}")))?;

        let (head, value) = line.split_at(colon);
        let value = value.strip_prefix(':').unwrap_or(value);

        let mut parts = split_unquoted(head, ';').into_iter();
        let full_name = parts.next().unwrap_or_default().trim();
        let (group, name) = match full_name.rsplit_once('.') {
            Some((group, name)) => (Some(group.to_string()), name),
            None => (None, full_name),
        };
        if name.is_empty() {
            return Err(invalid(&format!("content line without name: {line}")));
        }

        let params = parts
            .filter(|p| !p.trim().is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => Param {
                    name: k.trim().to_ascii_uppercase(),
                    values: split_unquoted(v, ',')
                        .into_iter()
                        .map(|v| v.trim().trim_matches('"').to_string())
                        .collect(),
                },
                // vCard 2.1 style bare type, e.g. `TEL;CELL:`
                None => Param {
                    name: "TYPE".to_string(),
                    values: vec![p.trim().to_string()],
                },
            })
            .collect();

        Ok(Property {
            group,
            name: name.to_ascii_uppercase(),
            params,
            value: value.to_string(),
        })
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = &self.group {
            write!(f, "{group}.")?;
        }
        f.write_str(&self.name)?;
        for param in &self.params {
            write!(f, ";{}=", param.name)?;
            for (i, value) in param.values.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                if value.contains([':', ';', ',']) {
                    write!(f, "\"{value}\"")?;
                } else {
                    f.write_str(value)?;
                }
            }
        }
        write!(f, ":{}", self.value)
    }
}

/// Escapes a text value.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Unescapes a text value.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(c) => out.push(c),
            None => out.push('\\'),
        }
    }
    out
}

fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

fn fold(line: &str, out: &mut String) {
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

/// Splits on `sep` outside double quotes.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(s.get(start..i).unwrap_or_default());
            start = i + c.len_utf8();
        }
    }
    parts.push(s.get(start..).unwrap_or_default());
    parts
}

/// Splits on `sep` unless it is backslash-escaped.
fn split_escaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(s.get(start..i).unwrap_or_default());
            start = i + c.len_utf8();
        }
    }
    parts.push(s.get(start..).unwrap_or_default());
    parts
}

fn invalid(msg: &str) -> SyncError {
    SyncError::InvalidVCard(msg.to_string())
}
