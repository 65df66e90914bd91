use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Notify;

use super::*;
use crate::conversation::{CONNECTION_INTERRUPTED, MessageKind};
use crate::handover::{PERSONAL_GREETING, TRANSFER_NOTICE};
use crate::transport::{ChatReply, Role, TransportError};

// =============================================================
// Mock transports
// =============================================================

type Scripted = Result<ChatReply, TransportError>;

struct ScriptedTransport {
    responses: StdMutex<VecDeque<Scripted>>,
    calls: StdMutex<Vec<(Role, String, Option<String>)>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self { responses: StdMutex::new(responses.into()), calls: StdMutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<(Role, String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn chat(&self, role: Role, message: &str, user_id: Option<&str>) -> Result<ChatReply, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((role, message.to_owned(), user_id.map(ToOwned::to_owned)));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reply(role, "Noted.")))
    }
}

/// Holds every request until `release` is notified.
struct GatedTransport {
    release: Notify,
}

#[async_trait::async_trait]
impl ChatTransport for GatedTransport {
    async fn chat(&self, role: Role, _message: &str, _user_id: Option<&str>) -> Result<ChatReply, TransportError> {
        self.release.notified().await;
        Ok(reply(role, "Finally here."))
    }
}

/// Answers each request after its scripted delay.
struct DelayedTransport {
    responses: StdMutex<VecDeque<(Duration, Scripted)>>,
}

impl DelayedTransport {
    fn new(responses: Vec<(Duration, Scripted)>) -> Arc<Self> {
        Arc::new(Self { responses: StdMutex::new(responses.into()) })
    }
}

#[async_trait::async_trait]
impl ChatTransport for DelayedTransport {
    async fn chat(&self, role: Role, _message: &str, _user_id: Option<&str>) -> Result<ChatReply, TransportError> {
        let next = self.responses.lock().unwrap().pop_front();
        let (delay, response) = next.unwrap_or_else(|| (Duration::ZERO, Ok(reply(role, "Noted."))));
        tokio::time::sleep(delay).await;
        response
    }
}

// =============================================================
// Helpers
// =============================================================

fn reply(role: Role, text: &str) -> ChatReply {
    ChatReply {
        role,
        reply: text.to_owned(),
        model: "mock".into(),
        env: "test".into(),
        used_web_search: false,
        status: None,
    }
}

fn session_with(transport: Arc<dyn ChatTransport>) -> ChatSession {
    ChatSession::new(transport, SessionOptions::default())
}

async fn texts(session: &ChatSession) -> Vec<String> {
    session
        .view(|c| c.messages().iter().map(|m| m.text().to_owned()).collect())
        .await
}

async fn kinds(session: &ChatSession) -> Vec<MessageKind> {
    session
        .view(|c| c.messages().iter().map(|m| m.kind()).collect())
        .await
}

async fn count_text(session: &ChatSession, needle: &str) -> usize {
    texts(session).await.iter().filter(|t| t.as_str() == needle).count()
}

// =============================================================
// Handover timing
// =============================================================

#[tokio::test(start_paused = true)]
async fn dispatch_reply_hands_over_after_delays() {
    let transport = ScriptedTransport::new(vec![Ok(reply(Role::Core, "A unit will dispatch shortly."))]);
    let session = session_with(transport);

    let outcome = session.send("escalate now").await;
    assert_eq!(outcome, SendOutcome::Replied { handover: true });
    assert_eq!(session.view(Conversation::active_role).await, Role::Core);
    assert_eq!(texts(&session).await.len(), 3);

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(session.view(Conversation::active_role).await, Role::Core);
    assert_eq!(texts(&session).await.len(), 3);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(session.view(Conversation::active_role).await, Role::Personal);
    assert_eq!(texts(&session).await.last().unwrap(), TRANSFER_NOTICE);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(kinds(&session).await, vec![
        MessageKind::Ai { role: Role::Core },
        MessageKind::User,
        MessageKind::Ai { role: Role::Core },
        MessageKind::System,
        MessageKind::Ai { role: Role::Personal },
    ]);
    assert_eq!(texts(&session).await[1], "escalate now");
    assert_eq!(texts(&session).await.last().unwrap(), PERSONAL_GREETING);
}

#[tokio::test(start_paused = true)]
async fn plain_reply_never_hands_over() {
    let transport = ScriptedTransport::new(vec![Ok(reply(Role::Core, "Your ride is confirmed for 5pm."))]);
    let session = session_with(transport);

    assert_eq!(session.send("book 5pm").await, SendOutcome::Replied { handover: false });
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(session.view(Conversation::active_role).await, Role::Core);
    assert_eq!(texts(&session).await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn multiple_keywords_hand_over_once() {
    let transport = ScriptedTransport::new(vec![Ok(reply(Role::Core, "I will assign a car and dispatch it en route."))]);
    let session = session_with(transport);

    session.send("go").await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(count_text(&session, TRANSFER_NOTICE).await, 1);
    assert_eq!(count_text(&session, PERSONAL_GREETING).await, 1);
}

#[tokio::test(start_paused = true)]
async fn personal_replies_do_not_trigger_again() {
    let transport = ScriptedTransport::new(vec![
        Ok(reply(Role::Core, "Deploying a vehicle.")),
        Ok(reply(Role::Personal, "HQ says they can dispatch a second car.")),
    ]);
    let session = session_with(transport.clone());

    session.send("need a ride").await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(session.send("any backup?").await, SendOutcome::Replied { handover: false });
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(count_text(&session, TRANSFER_NOTICE).await, 1);
    assert_eq!(count_text(&session, PERSONAL_GREETING).await, 1);
    assert_eq!(transport.calls()[1].0, Role::Personal);
}

#[tokio::test(start_paused = true)]
async fn overlapping_handovers_collapse_to_one() {
    let transport = ScriptedTransport::new(vec![
        Ok(reply(Role::Core, "Assigning a car.")),
        Ok(reply(Role::Core, "Dispatch confirmed.")),
    ]);
    let session = session_with(transport);

    assert_eq!(session.send("first").await, SendOutcome::Replied { handover: true });
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.send("second").await, SendOutcome::Replied { handover: true });
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(count_text(&session, TRANSFER_NOTICE).await, 1);
    assert_eq!(count_text(&session, PERSONAL_GREETING).await, 1);
    assert_eq!(session.view(Conversation::active_role).await, Role::Personal);
}

#[tokio::test(start_paused = true)]
async fn custom_timings_are_honored() {
    let transport = ScriptedTransport::new(vec![Ok(reply(Role::Core, "en route"))]);
    let options = SessionOptions {
        user_id: None,
        timings: HandoverTimings {
            announce_delay: Duration::from_millis(10),
            greeting_delay: Duration::from_millis(20),
        },
    };
    let session = ChatSession::new(transport, options);

    session.send("go").await;
    tokio::time::sleep(Duration::from_millis(31)).await;
    assert_eq!(texts(&session).await.last().unwrap(), PERSONAL_GREETING);
}

// =============================================================
// Send flow
// =============================================================

#[tokio::test]
async fn transport_failure_appends_single_fallback() {
    let transport = ScriptedTransport::new(vec![Err(TransportError::Request("connection refused".into()))]);
    let session = session_with(transport);

    assert_eq!(session.send("hello?").await, SendOutcome::Failed);

    let (last_kind, last_text, pending) = session
        .view(|c| {
            let last = c.messages().last().unwrap();
            (last.kind(), last.text().to_owned(), c.is_pending())
        })
        .await;
    assert_eq!(last_kind, MessageKind::Ai { role: Role::Core });
    assert_eq!(last_text, CONNECTION_INTERRUPTED);
    assert!(!pending);
    assert_eq!(count_text(&session, CONNECTION_INTERRUPTED).await, 1);
    assert_eq!(texts(&session).await[1], "hello?");
}

#[tokio::test(start_paused = true)]
async fn failure_after_handover_is_tagged_personal() {
    let transport = ScriptedTransport::new(vec![
        Ok(reply(Role::Core, "Dispatching.")),
        Err(TransportError::Status { status: 502, body: "bad gateway".into() }),
    ]);
    let session = session_with(transport);

    session.send("ride please").await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.send("hello driver").await, SendOutcome::Failed);

    let last_kind = session.view(|c| c.messages().last().unwrap().kind()).await;
    assert_eq!(last_kind, MessageKind::Ai { role: Role::Personal });
}

#[tokio::test]
async fn blank_input_changes_nothing() {
    let transport = ScriptedTransport::new(Vec::new());
    let session = session_with(transport.clone());
    let rx = session.subscribe();

    assert_eq!(session.send("").await, SendOutcome::Ignored);
    assert_eq!(session.send("   \t").await, SendOutcome::Ignored);

    assert!(transport.calls().is_empty());
    assert_eq!(texts(&session).await.len(), 1);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn send_while_pending_is_ignored() {
    let transport = Arc::new(GatedTransport { release: Notify::new() });
    let session = session_with(transport.clone());

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.send("first").await }
    });
    while !session.view(Conversation::is_pending).await {
        tokio::task::yield_now().await;
    }

    assert_eq!(session.send("second").await, SendOutcome::Ignored);
    assert_eq!(texts(&session).await, vec![crate::conversation::CORE_GREETING.to_owned(), "first".to_owned()]);

    transport.release.notify_one();
    assert_eq!(first.await.unwrap(), SendOutcome::Replied { handover: false });
    assert!(!session.view(Conversation::is_pending).await);
}

#[tokio::test]
async fn user_id_and_role_are_forwarded() {
    let transport = ScriptedTransport::new(Vec::new());
    let options = SessionOptions { user_id: Some("rider-1".into()), timings: HandoverTimings::default() };
    let session = ChatSession::new(transport.clone(), options);

    session.send("where is my car").await;

    assert_eq!(transport.calls(), vec![(Role::Core, "where is my car".to_owned(), Some("rider-1".to_owned()))]);
}

#[tokio::test]
async fn mutations_bump_revision() {
    let transport = ScriptedTransport::new(Vec::new());
    let session = session_with(transport);
    let mut rx = session.subscribe();

    session.send("ping").await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), 2);
}

#[test]
fn options_from_config() {
    let config = ChatConfig { user_id: Some("cfg-user".into()), ..ChatConfig::default() };
    let options = SessionOptions::from(&config);
    assert_eq!(options.user_id.as_deref(), Some("cfg-user"));
    assert_eq!(options.timings, HandoverTimings::default());
}

#[test]
fn sessions_get_distinct_ids() {
    let a = session_with(ScriptedTransport::new(Vec::new()));
    let b = session_with(ScriptedTransport::new(Vec::new()));
    assert_ne!(a.id(), b.id());
}

#[tokio::test(start_paused = true)]
async fn dropped_send_still_clears_pending() {
    let transport = Arc::new(GatedTransport { release: Notify::new() });
    let session = session_with(transport.clone());

    let timed_out = tokio::time::timeout(Duration::from_millis(50), session.send("first")).await;
    assert!(timed_out.is_err());
    assert!(session.view(Conversation::is_pending).await);

    transport.release.notify_one();
    while session.view(Conversation::is_pending).await {
        tokio::task::yield_now().await;
    }
    assert_eq!(texts(&session).await.last().unwrap(), "Finally here.");

    transport.release.notify_one();
    assert_eq!(session.send("second").await, SendOutcome::Replied { handover: false });
}

// =============================================================
// Requests in flight across a handover
// =============================================================

#[tokio::test(start_paused = true)]
async fn late_core_reply_after_handover_does_not_retrigger() {
    let transport = DelayedTransport::new(vec![
        (Duration::ZERO, Ok(reply(Role::Core, "Dispatching."))),
        (Duration::from_secs(2), Ok(reply(Role::Core, "Dispatching."))),
    ]);
    let session = session_with(transport);

    assert_eq!(session.send("first").await, SendOutcome::Replied { handover: true });
    // Sent while still on core; the reply lands after the transfer notice at 1 s.
    assert_eq!(session.send("second").await, SendOutcome::Replied { handover: false });
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(count_text(&session, TRANSFER_NOTICE).await, 1);
    assert_eq!(count_text(&session, PERSONAL_GREETING).await, 1);
    assert_eq!(kinds(&session).await, vec![
        MessageKind::Ai { role: Role::Core },
        MessageKind::User,
        MessageKind::Ai { role: Role::Core },
        MessageKind::User,
        MessageKind::System,
        MessageKind::Ai { role: Role::Core },
        MessageKind::Ai { role: Role::Personal },
    ]);
    assert_eq!(session.view(Conversation::active_role).await, Role::Personal);
}

#[tokio::test(start_paused = true)]
async fn late_core_failure_after_handover_keeps_call_time_role() {
    let transport = DelayedTransport::new(vec![
        (Duration::ZERO, Ok(reply(Role::Core, "Dispatching."))),
        (Duration::from_secs(2), Err(TransportError::Request("connection reset".into()))),
    ]);
    let session = session_with(transport);

    session.send("first").await;
    assert_eq!(session.send("second").await, SendOutcome::Failed);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let messages = session
        .view(|c| c.messages().iter().map(|m| (m.kind(), m.text().to_owned())).collect::<Vec<_>>())
        .await;
    assert_eq!(messages[4].0, MessageKind::System);
    assert_eq!(messages[5], (MessageKind::Ai { role: Role::Core }, CONNECTION_INTERRUPTED.to_owned()));
    assert_eq!(messages[6].0, MessageKind::Ai { role: Role::Personal });
    assert_eq!(count_text(&session, TRANSFER_NOTICE).await, 1);
}
