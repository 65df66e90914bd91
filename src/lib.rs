//! Valemain — rider chat client for the autonomous fleet service.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` talks to the backend role endpoints, `conversation` holds
//! the message log and active persona, `handover` decides when dispatch
//! passes the rider to their vehicle, `session` wires those together
//! asynchronously, and `view` renders the log for a terminal.

pub mod config;
pub mod conversation;
pub mod handover;
pub mod session;
pub mod transport;
pub mod view;

pub use config::{ChatConfig, ConfigError};
pub use conversation::{Conversation, Message, MessageId, MessageKind};
pub use session::{ChatSession, SendOutcome, SessionOptions};
pub use transport::{ChatReply, ChatTransport, HttpTransport, Role, TransportError};
