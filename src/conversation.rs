//! Conversation state — the message log and the active persona.
//!
//! DESIGN
//! ======
//! `Conversation` is a plain, synchronous state machine. Async concerns
//! (network calls, timers) live in `session`, which drives these methods
//! under a single lock so every append happens in one place.
//!
//! The log is append-only. Message fields are private, so nothing outside
//! this module can rewrite text or ids after insertion.
//!
//! HANDOVER TOKENS
//! ===============
//! Scheduling a handover and changing the active role both advance
//! `generation`. A delayed step carries the token it was issued with and
//! is dropped if the generation has moved on, so overlapping handovers
//! can never produce duplicate notices or greetings.

#[cfg(test)]
#[path = "conversation_test.rs"]
mod conversation_test;

use std::fmt;

use crate::handover::{self, PERSONAL_GREETING, TRANSFER_NOTICE};
use crate::transport::{ChatReply, Role};

pub const CORE_GREETING: &str = "Greetings. I am Core Valemain. Would you like to book a ride today?";

pub const CONNECTION_INTERRUPTED: &str = "Connection interruption.";

// =============================================================================
// MESSAGES
// =============================================================================

/// Creation-ordered message identifier. Never reused within a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who a log entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Text the rider typed.
    User,
    /// A persona reply (or a fallback authored on its behalf).
    Ai { role: Role },
    /// Transition narration, never attributed to a persona.
    System,
}

/// A single chat log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    kind: MessageKind,
    text: String,
}

impl Message {
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Persona for `Ai` messages, `None` otherwise.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self.kind {
            MessageKind::Ai { role } => Some(role),
            MessageKind::User | MessageKind::System => None,
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

// =============================================================================
// SEND / HANDOVER HANDLES
// =============================================================================

/// A send accepted by [`Conversation::begin_send`]: the role snapshot taken
/// before the network call, plus the text to forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    pub role: Role,
    pub text: String,
}

/// Ticket for the next pending handover step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandoverToken(u64);

// =============================================================================
// CONVERSATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct Conversation {
    active_role: Role,
    messages: Vec<Message>,
    pending: bool,
    next_id: u64,
    generation: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Fresh session state: core persona, one seeded greeting.
    #[must_use]
    pub fn new() -> Self {
        let mut conversation =
            Self { active_role: Role::Core, messages: Vec::new(), pending: false, next_id: 1, generation: 0 };
        conversation.push(MessageKind::Ai { role: Role::Core }, CORE_GREETING.to_owned());
        conversation
    }

    #[must_use]
    pub fn active_role(&self) -> Role {
        self.active_role
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Accept user input, or return `None` for blank input or while a
    /// request is already in flight.
    pub fn begin_send(&mut self, input: &str) -> Option<Outgoing> {
        if input.trim().is_empty() || self.pending {
            return None;
        }
        self.push(MessageKind::User, input.to_owned());
        self.pending = true;
        Some(Outgoing { role: self.active_role, text: input.to_owned() })
    }

    /// Record a successful reply and evaluate the handover rule.
    ///
    /// The rule only runs when the request went to `core` and the session is
    /// still on `core`; replies arriving after the transfer never re-trigger.
    pub fn receive_reply(&mut self, sent_as: Role, reply: &ChatReply) -> Option<HandoverToken> {
        self.push(MessageKind::Ai { role: reply.role }, reply.reply.clone());
        self.pending = false;

        if sent_as != Role::Core || self.active_role != Role::Core {
            return None;
        }
        if !handover::signals_handover(reply) {
            return None;
        }
        Some(self.advance_generation())
    }

    /// Record a transport failure as a single fallback message.
    pub fn receive_failure(&mut self, sent_as: Role) {
        self.push(MessageKind::Ai { role: sent_as }, CONNECTION_INTERRUPTED.to_owned());
        self.pending = false;
    }

    /// First handover step: post the transfer notice and switch to `personal`.
    ///
    /// Returns the token for the greeting step, or `None` if `token` is stale.
    pub fn announce_transfer(&mut self, token: HandoverToken) -> Option<HandoverToken> {
        if !self.is_current(token) || self.active_role != Role::Core {
            return None;
        }
        self.push(MessageKind::System, TRANSFER_NOTICE.to_owned());
        self.active_role = Role::Personal;
        Some(self.advance_generation())
    }

    /// Second handover step: the personal persona introduces itself.
    ///
    /// Returns `false` and leaves the log untouched if `token` is stale.
    pub fn greet_personal(&mut self, token: HandoverToken) -> bool {
        if !self.is_current(token) || self.active_role != Role::Personal {
            return false;
        }
        self.push(MessageKind::Ai { role: Role::Personal }, PERSONAL_GREETING.to_owned());
        true
    }

    fn is_current(&self, token: HandoverToken) -> bool {
        token.0 == self.generation
    }

    fn advance_generation(&mut self) -> HandoverToken {
        self.generation = self.generation.wrapping_add(1);
        HandoverToken(self.generation)
    }

    fn push(&mut self, kind: MessageKind, text: String) {
        let id = MessageId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.messages.push(Message { id, kind, text });
    }
}
