//! Terminal presentation over conversation state.
//!
//! Rendering is derived purely from [`Conversation`]. `TerminalView` only
//! remembers how much it has already printed, so each refresh emits just
//! the new lines (the terminal version of scrolling to the newest message).

#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;

use tokio::sync::oneshot;

use crate::conversation::{Conversation, Message, MessageKind};
use crate::session::ChatSession;
use crate::transport::Role;

/// Label printed above a message, `None` for system notices.
#[must_use]
pub fn speaker_label(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::User => Some("YOU"),
        MessageKind::Ai { role } => Some(persona_label(role)),
        MessageKind::System => None,
    }
}

#[must_use]
pub fn persona_label(role: Role) -> &'static str {
    match role {
        Role::Core => "CORE HQ",
        Role::Personal => "VALEMAIN",
    }
}

/// Input hint for the active persona.
#[must_use]
pub fn placeholder(role: Role) -> &'static str {
    match role {
        Role::Core => "Speak to Dispatch...",
        Role::Personal => "Speak to your Driver...",
    }
}

#[must_use]
pub fn render_message(message: &Message) -> String {
    match speaker_label(message.kind()) {
        Some(label) => format!("{label}: {}", message.text()),
        None => format!("        -- {} --", message.text()),
    }
}

#[must_use]
pub fn typing_indicator(role: Role) -> String {
    format!("{} ...", persona_label(role))
}

/// Incremental renderer for a single terminal.
#[derive(Debug, Clone)]
pub struct TerminalView {
    shown: usize,
    was_pending: bool,
    role: Option<Role>,
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalView {
    #[must_use]
    pub fn new() -> Self {
        Self { shown: 0, was_pending: false, role: None }
    }

    /// Lines not yet printed for the current conversation state.
    pub fn refresh(&mut self, conversation: &Conversation) -> Vec<String> {
        let messages = conversation.messages();
        let mut lines: Vec<String> = messages
            .get(self.shown..)
            .unwrap_or_default()
            .iter()
            .map(render_message)
            .collect();
        self.shown = messages.len();

        let pending = conversation.is_pending();
        if pending && !self.was_pending {
            lines.push(typing_indicator(conversation.active_role()));
        }
        self.was_pending = pending;

        let role = conversation.active_role();
        if self.role != Some(role) {
            lines.push(format!("({})", placeholder(role)));
            self.role = Some(role);
        }
        lines
    }
}

/// Feed every new line of `session` to `emit` until `stop` resolves.
///
/// Resolving `stop` (sending or dropping the sender) triggers one last
/// refresh, so a reply that landed just before shutdown is still emitted.
pub async fn render_until(session: ChatSession, mut stop: oneshot::Receiver<()>, mut emit: impl FnMut(String)) {
    let mut revisions = session.subscribe();
    let mut view = TerminalView::new();
    loop {
        for line in session.view(|conversation| view.refresh(conversation)).await {
            emit(line);
        }
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut stop => {
                for line in session.view(|conversation| view.refresh(conversation)).await {
                    emit(line);
                }
                break;
            }
        }
    }
}
