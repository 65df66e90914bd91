//! HTTP transport client for the role chat endpoints.
//!
//! One `POST {base}/chat/{role}` per user message. Every failure mode
//! (network, status, decode) comes back as a [`TransportError`]; nothing
//! here retries.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;

use super::ChatTransport;
use super::types::{ChatReply, ChatRequest, HealthStatus, Role, TransportError};
use crate::config::ChatConfig;

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport rooted at `base_url` (e.g. `http://localhost:8001/v1`).
    ///
    /// `request_timeout` of `None` leaves reqwest's default (no overall timeout).
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not absolute http(s) or the HTTP
    /// client fails to build.
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self, TransportError> {
        let base_url = normalize_base_url(base_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// Build a transport from parsed config.
    ///
    /// # Errors
    ///
    /// Same as [`HttpTransport::new`].
    pub fn from_config(config: &ChatConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, config.request_timeout)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the backend's `GET /health` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status, or a
    /// malformed body.
    pub async fn health(&self) -> Result<HealthStatus, TransportError> {
        let url = health_endpoint(&self.base_url)?;
        tracing::debug!(%url, "probing backend health");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        decode_body(status, &text)
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn chat(&self, role: Role, message: &str, user_id: Option<&str>) -> Result<ChatReply, TransportError> {
        let url = chat_endpoint(&self.base_url, role);
        let body = ChatRequest { role, message, user_id };
        tracing::debug!(%role, %url, "sending chat request");

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        decode_body(status, &text)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, TransportError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| TransportError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TransportError::InvalidBaseUrl(trimmed.to_owned()));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn chat_endpoint(base_url: &str, role: Role) -> String {
    format!("{base_url}/chat/{role}")
}

/// Health lives at the server root, outside any API prefix in the base URL.
pub(crate) fn health_endpoint(base_url: &str) -> Result<String, TransportError> {
    let mut url = Url::parse(base_url).map_err(|e| TransportError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
    url.set_path("/health");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

pub(crate) fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, TransportError> {
    if !(200..300).contains(&status) {
        return Err(TransportError::Status { status, body: body.to_owned() });
    }
    serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))
}
