// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with authentication fallback and `ETag` handling.

use std::sync::{Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use reqwest::{Client, Request, RequestBuilder, Response, StatusCode};

use crate::config::{AuthMethod, CardDavConfig};
use crate::digest::{DigestChallenge, DigestState};
use crate::error::CardDavError;
use crate::types::{ETag, Href};

/// HTTP client for `CardDAV` operations.
///
/// With [`AuthMethod::Basic`] the first request carries Basic credentials. If the
/// server rejects it with a Digest challenge, the request is replayed with Digest
/// and every later request made through this instance goes straight to Digest.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: CardDavConfig,
    digest: Mutex<Option<DigestState>>,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: CardDavConfig) -> Result<Self, CardDavError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            config,
            digest: Mutex::new(None),
        })
    }

    /// Builds a request without authentication; credentials are attached on send.
    pub fn build_request(&self, method: reqwest::Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Whether this client has switched to Digest authentication.
    pub fn uses_digest(&self) -> bool {
        self.digest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Executes a request and checks for HTTP errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or returns an error status code.
    pub async fn execute(&self, req: RequestBuilder) -> Result<Response, CardDavError> {
        let request = req.build()?;
        let resp = self.send(request).await?;

        match resp.status() {
            StatusCode::OK
            | StatusCode::CREATED
            | StatusCode::NO_CONTENT
            | StatusCode::MULTI_STATUS => Ok(resp),
            StatusCode::UNAUTHORIZED => Err(CardDavError::Auth(format!(
                "{} rejected the credentials",
                resp.url()
            ))),
            StatusCode::NOT_FOUND => Err(CardDavError::NotFound(Href::new(
                resp.url().to_string(),
            ))),
            StatusCode::PRECONDITION_FAILED => Err(CardDavError::PreconditionFailed(
                resp.headers()
                    .get("ETag")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string(),
            )),
            status => {
                let text = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read response".to_string());
                Err(CardDavError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
        }
    }

    /// Sends a request with the configured credentials, handling the Digest switch.
    async fn send(&self, mut request: Request) -> Result<Response, CardDavError> {
        let (username, password) = match &self.config.auth {
            AuthMethod::None => return Ok(self.client.execute(request).await?),
            AuthMethod::Basic { username, password } => (username, password),
        };

        if self.uses_digest() {
            return self.send_digest(request, username, password).await;
        }

        let retry = request.try_clone();
        let basic = STANDARD.encode(format!("{username}:{password}"));
        request
            .headers_mut()
            .insert(AUTHORIZATION, header_value(&format!("Basic {basic}"))?);

        let resp = self.client.execute(request).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let Some(challenge) = digest_challenge(&resp) else {
            return Ok(resp);
        };
        let Some(retry) = retry else {
            tracing::warn!("request body cannot be replayed, not retrying with digest");
            return Ok(resp);
        };
        drop(resp);

        tracing::debug!(realm = %challenge.realm, "server requested digest authentication");
        *self.digest.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(DigestState::new(challenge));

        self.send_digest(retry, username, password).await
    }

    /// Sends with Digest credentials, renewing the nonce once if the server reports it stale.
    async fn send_digest(
        &self,
        mut request: Request,
        username: &str,
        password: &str,
    ) -> Result<Response, CardDavError> {
        let retry = request.try_clone();
        let value = self.digest_authorization(&request, username, password)?;
        request.headers_mut().insert(AUTHORIZATION, value);

        let resp = self.client.execute(request).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        match (digest_challenge(&resp), retry) {
            (Some(challenge), Some(mut retry)) if challenge.stale => {
                drop(resp);
                tracing::debug!("digest nonce is stale, renewing");
                if let Some(state) = self
                    .digest
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                {
                    state.renew(challenge);
                }
                let value = self.digest_authorization(&retry, username, password)?;
                retry.headers_mut().insert(AUTHORIZATION, value);
                Ok(self.client.execute(retry).await?)
            }
            _ => Ok(resp),
        }
    }

    fn digest_authorization(
        &self,
        request: &Request,
        username: &str,
        password: &str,
    ) -> Result<HeaderValue, CardDavError> {
        let url = request.url();
        let uri = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };

        let mut guard = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
        let state = guard
            .as_mut()
            .ok_or_else(|| CardDavError::Auth("no digest challenge received".to_string()))?;
        let value = state.authorization(username, password, request.method().as_str(), &uri);
        header_value(&value)
    }

    /// Extracts `ETag` from response headers, empty when the server sent none.
    pub fn extract_etag(resp: &Response) -> ETag {
        resp.headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|s| ETag::new(s.to_string()))
            .unwrap_or_default()
    }

    /// Extracts the `Location` header, if any.
    pub fn extract_location(resp: &Response) -> Option<String> {
        resp.headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

fn digest_challenge(resp: &Response) -> Option<DigestChallenge> {
    resp.headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(DigestChallenge::parse)
}

fn header_value(value: &str) -> Result<HeaderValue, CardDavError> {
    HeaderValue::from_str(value)
        .map_err(|e| CardDavError::Config(format!("Invalid authorization header: {e}")))
}
