//! Handover — deciding when dispatch hands the rider to their vehicle.
//!
//! DESIGN
//! ======
//! A reply's `status` field is authoritative when the backend sends one.
//! Backends that only return free-form text fall back to keyword matching
//! on the reply, which keeps the observable transition identical for them.

#[cfg(test)]
#[path = "handover_test.rs"]
mod handover_test;

use std::time::Duration;

use crate::transport::{ChatReply, ReplyStatus};

/// Lower-case substrings in a core reply that mean a vehicle is on its way.
pub const TRIGGER_KEYWORDS: [&str; 4] = ["assign", "deploy", "en route", "dispatch"];

pub const TRANSFER_NOTICE: &str = "🔄 TRANSFERRING TO VEHICLE NODE...";

pub const PERSONAL_GREETING: &str =
    "Good day! I am your Personal Valemain. I've received your coordinates. ready to go?";

/// Delays for the two handover steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverTimings {
    /// From the triggering reply to the transfer notice.
    pub announce_delay: Duration,
    /// From the transfer notice to the personal greeting.
    pub greeting_delay: Duration,
}

impl Default for HandoverTimings {
    fn default() -> Self {
        Self { announce_delay: Duration::from_millis(1000), greeting_delay: Duration::from_millis(1500) }
    }
}

/// Case-insensitive keyword check over free-form reply text.
#[must_use]
pub fn mentions_dispatch(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    TRIGGER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Whether a reply asks for a handover, preferring the structured signal.
#[must_use]
pub fn signals_handover(reply: &ChatReply) -> bool {
    match reply.status {
        Some(ReplyStatus::Dispatched) => true,
        Some(ReplyStatus::Conversing) => false,
        None => mentions_dispatch(&reply.reply),
    }
}
