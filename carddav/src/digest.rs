// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP Digest access authentication (RFC 7616, RFC 2617).

use md5::Md5;
use sha2::{Digest, Sha256};

/// Hash algorithm requested by a Digest challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// `MD5`, the default when the challenge names none.
    Md5,
    /// `MD5-sess`.
    Md5Sess,
    /// `SHA-256`.
    Sha256,
}

impl DigestAlgorithm {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "MD5-SESS" => Some(Self::Md5Sess),
            "SHA-256" => Some(Self::Sha256),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
        }
    }

    fn hash(self, data: &str) -> String {
        match self {
            Self::Md5 | Self::Md5Sess => hex::encode(Md5::digest(data.as_bytes())),
            Self::Sha256 => hex::encode(Sha256::digest(data.as_bytes())),
        }
    }
}

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection space.
    pub realm: String,
    /// Server nonce.
    pub nonce: String,
    /// Opaque value to echo back.
    pub opaque: Option<String>,
    /// Whether the server offered `qop=auth`.
    pub qop_auth: bool,
    /// Hash algorithm.
    pub algorithm: DigestAlgorithm,
    /// Whether the previous nonce was rejected only for being stale.
    pub stale: bool,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Returns `None` unless the value is a Digest challenge carrying at least a
    /// realm and a nonce, with an algorithm this client implements.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim_start();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop_auth = false;
        let mut qop_present = false;
        let mut algorithm = DigestAlgorithm::Md5;
        let mut stale = false;

        for (key, value) in parse_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => {
                    qop_present = true;
                    qop_auth = value
                        .split(',')
                        .any(|q| q.trim().eq_ignore_ascii_case("auth"));
                }
                "algorithm" => algorithm = DigestAlgorithm::parse(&value)?,
                "stale" => stale = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        // only auth-int was offered, which needs the request body hashed
        if qop_present && !qop_auth {
            return None;
        }

        Some(Self {
            realm: realm?,
            nonce: nonce?,
            opaque,
            qop_auth,
            algorithm,
            stale,
        })
    }
}

/// Sticky Digest state: the current challenge and the nonce count used with it.
#[derive(Debug, Clone)]
pub struct DigestState {
    challenge: DigestChallenge,
    nonce_count: u32,
}

impl DigestState {
    pub fn new(challenge: DigestChallenge) -> Self {
        Self {
            challenge,
            nonce_count: 0,
        }
    }

    /// Replaces the challenge, e.g. after the server marked the nonce stale.
    pub fn renew(&mut self, challenge: DigestChallenge) {
        self.challenge = challenge;
        self.nonce_count = 0;
    }

    /// Builds the `Authorization` header value for one request.
    pub fn authorization(
        &mut self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
    ) -> String {
        self.nonce_count += 1;
        let cnonce = uuid::Uuid::new_v4().simple().to_string();
        compute_authorization(
            &self.challenge,
            username,
            password,
            method,
            uri,
            self.nonce_count,
            &cnonce,
        )
    }
}

fn compute_authorization(
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    nonce_count: u32,
    cnonce: &str,
) -> String {
    let algorithm = challenge.algorithm;
    let nc = format!("{nonce_count:08x}");

    let mut ha1 = algorithm.hash(&format!("{username}:{}:{password}", challenge.realm));
    if algorithm == DigestAlgorithm::Md5Sess {
        ha1 = algorithm.hash(&format!("{ha1}:{}:{cnonce}", challenge.nonce));
    }
    let ha2 = algorithm.hash(&format!("{method}:{uri}"));

    let response = if challenge.qop_auth {
        algorithm.hash(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", challenge.nonce))
    } else {
        algorithm.hash(&format!("{ha1}:{}:{ha2}", challenge.nonce))
    };

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", algorithm={}, response="{}""#,
        quote(username),
        quote(&challenge.realm),
        quote(&challenge.nonce),
        quote(uri),
        algorithm.name(),
        response,
    );
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(r#", opaque="{}""#, quote(opaque)));
    }
    if challenge.qop_auth {
        header.push_str(&format!(r#", qop=auth, nc={nc}, cnonce="{cnonce}""#));
    }
    header
}

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Splits `key=value, key="quoted, value"` pairs.
fn parse_params(s: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '"' => break,
                        c => value.push(c),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }

        params.push((key.trim().to_string(), value.trim().to_string()));
    }

    params
}
