//! Transport — typed client for the backend role endpoints.
//!
//! DESIGN
//! ======
//! `ChatTransport` is the seam between conversation state and the network.
//! The session only ever sees the trait object, so tests swap in scripted
//! transports and the binary plugs in [`HttpTransport`].

pub mod http;
pub mod types;

pub use http::HttpTransport;
pub use types::{ChatReply, ChatRequest, HealthStatus, ParseRoleError, ReplyStatus, Role, TransportError};

/// One request per user message; independent calls, no caching or retry.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, role: Role, message: &str, user_id: Option<&str>) -> Result<ChatReply, TransportError>;
}
