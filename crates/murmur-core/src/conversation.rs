//! The conversation handle: dispatches turns to the backend and feeds
//! replies into the message log.
//!
//! All log mutations happen under one mutex. Network round trips run as
//! spawned tasks tagged with the session generation they were issued for;
//! a reply that arrives after a reset finds a newer generation and is
//! dropped without touching the log or the busy flag.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::client::{ChatBackend, ChatRequest};
use crate::normalize::normalize_reply;
use crate::notice::Notice;
use crate::reveal::{RevealEngine, RevealSettings, RevealSink, RunId};
use crate::session::{InitState, Session};
use crate::types::{Message, MessageId, SessionId};

/// Behaviour knobs of a conversation
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Sent on the opening turn in place of user text
    pub greeting: String,
    /// Revealed when the backend answers an ordinary turn with nothing
    pub fallback_reply: String,
    pub reveal: RevealSettings,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
            fallback_reply: "Sorry, I didn't get a valid reply.".to_string(),
            reveal: RevealSettings::default(),
        }
    }
}

/// Change notifications for the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Messages were appended or cleared
    LogChanged,
    /// A reveal tick wrote into `message_id`
    Revealed { message_id: MessageId, done: bool },
    BusyChanged(bool),
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Greeting committed as a completed assistant message
    Greeted(MessageId),
    /// Backend answered with nothing; transcript left empty
    Empty,
    /// Transport failure; transcript left empty, nothing shown to the user
    Failed,
    /// The session was reset while the request was in flight
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply is being revealed into `message_id`
    Revealing { message_id: MessageId, fallback: bool },
    /// Transport failure; a notice was raised
    Failed,
    /// The session was reset while the request was in flight
    Discarded,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Message is blank")]
    Blank,

    #[error("A request is already in flight")]
    Busy,
}

/// Point-in-time copy of the conversation for rendering
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub session_id: SessionId,
    pub messages: Vec<Message>,
    pub busy: bool,
    pub init: InitState,
}

struct ChatState {
    session: Session,
    busy: bool,
    /// Bumped on every reset; fences replies of discarded sessions
    generation: u64,
    reveal: RevealEngine,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ChatState {
    fn emit(&self, event: ChatEvent) {
        // The view may already be gone during shutdown.
        let _ = self.events.send(event);
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            self.emit(ChatEvent::BusyChanged(busy));
        }
    }

    /// Stop whatever is revealing and start revealing `text` into `target`
    fn begin_reveal(&mut self, shared: Weak<Mutex<ChatState>>, target: MessageId, text: String) {
        self.reveal.cancel();
        self.session.settle_reveals();

        let sink = LogSink {
            state: shared,
            generation: self.generation,
            target,
        };
        match self.reveal.start(text, sink) {
            Some(run) => {
                if let Some(msg) = self.session.message_mut(target) {
                    msg.revealing = true;
                }
                debug!("Revealing into message {} (run {})", target, run);
            }
            None => self.emit(ChatEvent::Revealed {
                message_id: target,
                done: true,
            }),
        }
    }
}

/// Writes reveal chunks into a message addressed by id
struct LogSink {
    state: Weak<Mutex<ChatState>>,
    generation: u64,
    target: MessageId,
}

impl RevealSink for LogSink {
    fn write(&self, run: RunId, chunk: &str, done: bool) -> bool {
        let Some(shared) = self.state.upgrade() else {
            return false;
        };
        let mut state = shared.lock();
        if state.generation != self.generation || state.reveal.current_run() != Some(run) {
            return false;
        }
        let Some(msg) = state.session.message_mut(self.target) else {
            return false;
        };
        msg.text.push_str(chunk);
        if done {
            msg.revealing = false;
            state.reveal.finish(run);
        }
        state.emit(ChatEvent::Revealed {
            message_id: self.target,
            done,
        });
        true
    }
}

/// Cloneable handle to the single active conversation
#[derive(Clone)]
pub struct Conversation {
    state: Arc<Mutex<ChatState>>,
    backend: Arc<dyn ChatBackend>,
    settings: Arc<ChatSettings>,
}

impl Conversation {
    /// Create a conversation with a fresh session. Events for the view are
    /// delivered on the returned receiver.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        settings: ChatSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        Self::with_session(backend, settings, Session::new())
    }

    pub fn with_session(
        backend: Arc<dyn ChatBackend>,
        settings: ChatSettings,
        session: Session,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let state = ChatState {
            session,
            busy: false,
            generation: 0,
            reveal: RevealEngine::new(settings.reveal),
            events,
        };
        let conversation = Self {
            state: Arc::new(Mutex::new(state)),
            backend,
            settings: Arc::new(settings),
        };
        (conversation, rx)
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn session_id(&self) -> SessionId {
        self.state.lock().session.id()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    pub fn is_revealing(&self) -> bool {
        self.state.lock().reveal.is_active()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.state.lock();
        ChatSnapshot {
            session_id: state.session.id(),
            messages: state.session.messages().to_vec(),
            busy: state.busy,
            init: state.session.init_state(),
        }
    }

    /// Run the opening exchange unless this session already has.
    ///
    /// Returns `None` when initialization was already claimed.
    pub fn start(&self) -> Option<JoinHandle<InitOutcome>> {
        let (generation, request) = {
            let mut state = self.state.lock();
            if !state.session.begin_initialization() {
                debug!("Session {} already initialized", state.session.id());
                return None;
            }
            state.set_busy(true);
            let request = ChatRequest::new(state.session.id(), self.settings.greeting.clone());
            (state.generation, request)
        };

        info!("Starting conversation {}", request.session_id);
        let span = info_span!("session", session_id = %request.session_id);
        let this = self.clone();
        Some(tokio::spawn(
            async move { this.run_initialization(generation, request).await }.instrument(span),
        ))
    }

    async fn run_initialization(self, generation: u64, request: ChatRequest) -> InitOutcome {
        let result = self.backend.send(&request).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("Dropping greeting for discarded session {}", request.session_id);
            return InitOutcome::Discarded;
        }
        state.session.finish_initialization();
        state.set_busy(false);

        match result {
            Ok(body) => {
                let reply = normalize_reply(&body);
                if reply.is_empty() {
                    info!("Backend sent an empty greeting");
                    return InitOutcome::Empty;
                }
                debug!("Greeting taken from {:?}", reply.source);
                let id = state.session.commit_assistant_message(reply.text);
                state.emit(ChatEvent::LogChanged);
                InitOutcome::Greeted(id)
            }
            Err(e) => {
                warn!("Failed to initialize conversation: {}", e);
                InitOutcome::Failed
            }
        }
    }

    /// Send one user turn.
    ///
    /// The user message is in the log before this returns; the backend
    /// round trip and the reveal of its reply continue on the returned task.
    pub fn submit(&self, text: &str) -> Result<JoinHandle<TurnOutcome>, SubmitError> {
        let (generation, request) = {
            let mut state = self.state.lock();
            if state.busy {
                return Err(SubmitError::Busy);
            }
            state
                .session
                .append_user_message(text)
                .ok_or(SubmitError::Blank)?;
            state.emit(ChatEvent::LogChanged);
            state.set_busy(true);
            (state.generation, ChatRequest::new(state.session.id(), text))
        };

        debug!("Sending turn for session {}", request.session_id);
        let span = info_span!("session", session_id = %request.session_id);
        let this = self.clone();
        Ok(tokio::spawn(
            async move { this.run_turn(generation, request).await }.instrument(span),
        ))
    }

    async fn run_turn(self, generation: u64, request: ChatRequest) -> TurnOutcome {
        let result = self.backend.send(&request).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("Dropping reply for discarded session {}", request.session_id);
            return TurnOutcome::Discarded;
        }
        state.set_busy(false);

        match result {
            Ok(body) => {
                let reply = normalize_reply(&body);
                debug!("Reply taken from {:?}", reply.source);
                let fallback = reply.is_empty();
                let text = if fallback {
                    self.settings.fallback_reply.clone()
                } else {
                    reply.text
                };

                let message_id = state.session.append_assistant_placeholder();
                state.emit(ChatEvent::LogChanged);
                state.begin_reveal(Arc::downgrade(&self.state), message_id, text);
                TurnOutcome::Revealing { message_id, fallback }
            }
            Err(e) => {
                warn!("Failed to send message: {}", e);
                state.emit(ChatEvent::Notice(Notice::send_failed()));
                TurnOutcome::Failed
            }
        }
    }

    /// Discard the current conversation and open a new one.
    ///
    /// The active reveal and any in-flight reply are invalidated before the
    /// new opening exchange is dispatched.
    pub fn reset(&self) -> Option<JoinHandle<InitOutcome>> {
        {
            let mut state = self.state.lock();
            state.reveal.cancel();
            state.generation += 1;
            state.session.reset();
            state.set_busy(false);
            state.emit(ChatEvent::LogChanged);
        }
        self.start()
    }

    /// Stop the active reveal. Called when the view goes away.
    pub fn teardown(&self) {
        self.state.lock().reveal.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BackendError, BackendResult};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl ChatBackend for Echo {
        async fn send(&self, request: &ChatRequest) -> BackendResult<String> {
            Ok(format!(r#"{{"message": "echo: {}"}}"#, request.message))
        }
    }

    struct Down;

    #[async_trait]
    impl ChatBackend for Down {
        async fn send(&self, _request: &ChatRequest) -> BackendResult<String> {
            Err(BackendError::Status {
                status: 503,
                body: String::new(),
            })
        }
    }

    fn conversation(backend: impl ChatBackend + 'static) -> (Conversation, mpsc::UnboundedReceiver<ChatEvent>) {
        Conversation::new(Arc::new(backend), ChatSettings::default())
    }

    #[tokio::test]
    async fn test_start_runs_once() {
        let (chat, _rx) = conversation(Echo);
        let first = chat.start().expect("first start dispatches");
        assert!(chat.start().is_none());
        assert!(chat.is_busy());

        assert_eq!(first.await.unwrap(), InitOutcome::Greeted(1));
        assert!(chat.start().is_none());
        assert!(!chat.is_busy());
        assert_eq!(chat.snapshot().messages[0].text, "echo: Hello");
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_and_busy() {
        let (chat, _rx) = conversation(Echo);
        assert_eq!(chat.submit("   ").unwrap_err(), SubmitError::Blank);

        let turn = chat.submit("first").unwrap();
        assert_eq!(chat.submit("second").unwrap_err(), SubmitError::Busy);
        turn.await.unwrap();

        let users: Vec<_> = chat
            .snapshot()
            .messages
            .into_iter()
            .filter(|m| m.is_user())
            .map(|m| m.text)
            .collect();
        assert_eq!(users, vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_greeting_is_silent() {
        let (chat, mut rx) = conversation(Down);
        assert_eq!(chat.start().unwrap().await.unwrap(), InitOutcome::Failed);

        let snapshot = chat.snapshot();
        assert!(snapshot.messages.is_empty());
        assert_eq!(snapshot.init, InitState::Done);
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, ChatEvent::Notice(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_freezes_reveal() {
        let (chat, _rx) = conversation(Echo);
        let TurnOutcome::Revealing { message_id, .. } = chat.submit("a long enough question").unwrap().await.unwrap() else {
            panic!("expected a reveal");
        };
        tokio::time::sleep(Duration::from_millis(70)).await;
        chat.teardown();
        let frozen = chat.snapshot().messages[message_id as usize - 1].clone();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let after = &chat.snapshot().messages[message_id as usize - 1];
        assert_eq!(after.text, frozen.text);
        assert!(after.revealing);
        assert!(!chat.is_revealing());
    }
}
