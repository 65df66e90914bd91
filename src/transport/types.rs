//! Transport types — roles, wire DTOs, and errors.
//!
//! DESIGN
//! ======
//! The role appears both as the `/chat/{role}` path segment and as a body
//! field. Both are derived from the same [`Role`] value so they cannot
//! disagree on the wire.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// ROLE
// =============================================================================

/// Persona context of a chat exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dispatch / HQ persona.
    Core,
    /// Assigned vehicle persona.
    Personal,
}

impl Role {
    /// Wire name, used for both the path segment and the body field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Personal => "personal",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names neither `core` nor `personal`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected 'core' or 'personal')")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "personal" => Ok(Self::Personal),
            _ => Err(ParseRoleError(raw.to_owned())),
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Request body for `POST /chat/{role}`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub role: Role,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
}

/// Explicit handover signal a backend may attach to a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    /// The exchange continues with the current persona.
    Conversing,
    /// A vehicle has been dispatched; the session should hand over.
    Dispatched,
}

/// Decoded response from `POST /chat/{role}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Persona that authored the reply.
    pub role: Role,
    /// Reply text shown to the user.
    pub reply: String,
    /// Backend model identifier.
    pub model: String,
    /// Backend environment name (e.g. `"dev"`).
    pub env: String,
    /// Whether the backend grounded the reply with web search.
    #[serde(default)]
    pub used_web_search: bool,
    /// Structured handover signal. Absent on backends that only speak text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReplyStatus>,
}

/// Response from the backend `GET /health` probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub model_core: String,
    #[serde(default)]
    pub model_personal: String,
    #[serde(default)]
    pub web_search_enabled: bool,
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured base URL is not an absolute http(s) URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (connect, DNS, timeout, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected schema.
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl TransportError {
    /// Stable machine-readable code for log fields.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBaseUrl(_) => "E_INVALID_BASE_URL",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Request(_) => "E_REQUEST",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
        }
    }
}
