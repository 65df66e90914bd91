//! Chat session — the async send flow and handover timers.
//!
//! ARCHITECTURE
//! ============
//! `ChatSession` is the single ownership boundary around a
//! [`Conversation`]. Every mutation (user send, reply, failure, timer step)
//! takes the same mutex, and the lock is never held across the network
//! call or a sleep. After each mutation the revision channel is bumped so
//! the presentation layer can redraw.
//!
//! Each request runs on its own spawned task, so cancelling the caller
//! never strands the pending flag.
//!
//! Handover steps run on a spawned task. They are fire-and-forget: the
//! send that triggered them returns immediately, and each step only
//! applies if its [`HandoverToken`] is still current.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::conversation::{Conversation, HandoverToken, Outgoing};
use crate::handover::HandoverTimings;
use crate::transport::ChatTransport;

/// Result of one [`ChatSession::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, or a request was already in flight. Nothing changed.
    Ignored,
    /// A reply was appended; `handover` is true when a transfer was scheduled.
    Replied { handover: bool },
    /// The transport failed and the fallback message was appended.
    Failed,
}

/// Per-session options that are not transport concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub user_id: Option<String>,
    pub timings: HandoverTimings,
}

impl From<&ChatConfig> for SessionOptions {
    fn from(config: &ChatConfig) -> Self {
        Self { user_id: config.user_id.clone(), timings: config.handover }
    }
}

#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Uuid,
    transport: Arc<dyn ChatTransport>,
    options: SessionOptions,
    state: Mutex<Conversation>,
    revision: watch::Sender<u64>,
}

impl ChatSession {
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, options: SessionOptions) -> Self {
        let (revision, _) = watch::channel(0);
        let id = Uuid::new_v4();
        tracing::debug!(session_id = %id, "chat session started");
        Self {
            inner: Arc::new(SessionInner {
                id,
                transport,
                options,
                state: Mutex::new(Conversation::new()),
                revision,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Receiver that changes after every conversation mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Read the conversation under the session lock.
    pub async fn view<R>(&self, f: impl FnOnce(&Conversation) -> R) -> R {
        let conversation = self.inner.state.lock().await;
        f(&*conversation)
    }

    /// Send one user message to the active persona.
    ///
    /// The user message is appended before the request goes out, and the
    /// reply (or fallback) is appended before the handover rule runs.
    ///
    /// The request and its completion run on a spawned task, so dropping
    /// this future early still clears the pending flag once the transport
    /// answers.
    pub async fn send(&self, input: &str) -> SendOutcome {
        let outgoing = {
            let mut conversation = self.inner.state.lock().await;
            conversation.begin_send(input)
        };
        let Some(outgoing) = outgoing else {
            tracing::debug!(session_id = %self.inner.id, "send ignored");
            return SendOutcome::Ignored;
        };
        self.bump();

        let role = outgoing.role;
        let session = self.clone();
        let exchange = tokio::spawn(async move { session.exchange(outgoing).await });
        match exchange.await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(session_id = %self.inner.id, %role, %error, "chat exchange task failed");
                let mut conversation = self.inner.state.lock().await;
                if conversation.is_pending() {
                    conversation.receive_failure(role);
                }
                drop(conversation);
                self.bump();
                SendOutcome::Failed
            }
        }
    }

    async fn exchange(&self, outgoing: Outgoing) -> SendOutcome {
        let result = self
            .inner
            .transport
            .chat(outgoing.role, &outgoing.text, self.inner.options.user_id.as_deref())
            .await;

        let outcome = {
            let mut conversation = self.inner.state.lock().await;
            match result {
                Ok(reply) => {
                    let token = conversation.receive_reply(outgoing.role, &reply);
                    tracing::info!(
                        session_id = %self.inner.id,
                        role = %reply.role,
                        model = %reply.model,
                        handover = token.is_some(),
                        "reply received"
                    );
                    if let Some(token) = token {
                        self.spawn_handover(token);
                    }
                    SendOutcome::Replied { handover: token.is_some() }
                }
                Err(error) => {
                    tracing::warn!(
                        session_id = %self.inner.id,
                        role = %outgoing.role,
                        code = error.error_code(),
                        %error,
                        "chat request failed"
                    );
                    conversation.receive_failure(outgoing.role);
                    SendOutcome::Failed
                }
            }
        };
        self.bump();
        outcome
    }

    fn spawn_handover(&self, token: HandoverToken) {
        let session = self.clone();
        tokio::spawn(async move {
            session.run_handover(token).await;
        });
    }

    async fn run_handover(&self, token: HandoverToken) {
        let timings = self.inner.options.timings;

        tokio::time::sleep(timings.announce_delay).await;
        let next = {
            let mut conversation = self.inner.state.lock().await;
            conversation.announce_transfer(token)
        };
        let Some(next) = next else {
            tracing::debug!(session_id = %self.inner.id, "stale handover dropped before transfer notice");
            return;
        };
        tracing::info!(session_id = %self.inner.id, "handed over to personal persona");
        self.bump();

        tokio::time::sleep(timings.greeting_delay).await;
        let greeted = {
            let mut conversation = self.inner.state.lock().await;
            conversation.greet_personal(next)
        };
        if greeted {
            self.bump();
        } else {
            tracing::debug!(session_id = %self.inner.id, "stale handover dropped before greeting");
        }
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}
