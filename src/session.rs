//! The chat session controller.
//!
//! `ChatSession` owns everything a turn touches: the rendered messages, the
//! in-flight guard, the store, the API client and the typing timer. It is
//! driven from one event loop. Background work (the HTTP request and the
//! typing timer) reports back as [`SessionEvent`]s sent over a channel, and
//! the loop feeds them into [`ChatSession::handle_event`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::animator::{ScheduledTask, Typewriter};
use crate::error::ChatError;
use crate::gemini::GeminiClient;
use crate::state::{ChatMessage, Theme};
use crate::store::ChatStore;

/// Where the current turn is. Anything but `Idle` means a response is in
/// flight and new submissions are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingResponse,
    Typing,
}

#[derive(Debug)]
pub enum SessionEvent {
    Reply { turn: u64, result: Result<String, ChatError> },
    TypingTick { turn: u64 },
}

struct Typing {
    typewriter: Typewriter,
    _timer: ScheduledTask,
}

pub struct ChatSession {
    store: ChatStore,
    client: Option<GeminiClient>,
    events: mpsc::UnboundedSender<SessionEvent>,
    typing_interval: Duration,

    messages: Vec<ChatMessage>,
    theme: Theme,
    header_hidden: bool,

    phase: TurnPhase,
    turn: u64,
    pending: Option<usize>,
    request: Option<CancellationToken>,
    typing: Option<Typing>,
    scroll_requested: bool,
}

impl ChatSession {
    /// Create a session and restore whatever the store holds.
    pub fn new(
        store: ChatStore,
        client: Option<GeminiClient>,
        events: mpsc::UnboundedSender<SessionEvent>,
        typing_interval: Duration,
    ) -> Self {
        let mut session = Self {
            store,
            client,
            events,
            typing_interval,
            messages: Vec::new(),
            theme: Theme::default(),
            header_hidden: false,
            phase: TurnPhase::Idle,
            turn: 0,
            pending: None,
            request: None,
            typing: None,
            scroll_requested: false,
        };
        session.load();
        session
    }

    /// Replace in-memory state with the stored transcript and theme.
    pub fn load(&mut self) {
        let snapshot = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read saved chats, starting empty");
            Default::default()
        });

        self.messages = snapshot.transcript.unwrap_or_default();
        self.header_hidden = !self.messages.is_empty();
        self.theme = snapshot.theme;
        self.scroll_requested = true;
        info!(messages = self.messages.len(), theme = self.theme.as_str(), "session loaded");
    }

    pub fn set_client(&mut self, client: GeminiClient) {
        self.client = Some(client);
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn header_hidden(&self) -> bool {
        self.header_hidden
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// True while `idx` is the message being revealed.
    pub fn is_typing(&self, idx: usize) -> bool {
        self.typing.as_ref().is_some_and(|t| t.typewriter.target() == idx)
    }

    /// Returns whether the chat list should jump to its end, and resets it.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Start a turn. Returns `false` without touching anything when the
    /// trimmed input is empty or a response is already in flight.
    pub fn submit(&mut self, input: &str) -> bool {
        let prompt = input.trim();
        if prompt.is_empty() || self.is_busy() {
            return false;
        }

        self.turn += 1;
        self.phase = TurnPhase::AwaitingResponse;
        self.messages.push(ChatMessage::outgoing(prompt));
        self.messages.push(ChatMessage::incoming_placeholder());
        self.pending = Some(self.messages.len() - 1);
        self.header_hidden = true;
        self.scroll_requested = true;

        let Some(client) = self.client.clone() else {
            self.fail_turn(ChatError::MissingApiKey);
            return true;
        };

        info!(turn = self.turn, chars = prompt.len(), model = client.model(), "dispatching turn");

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let events = self.events.clone();
        let turn = self.turn;
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                result = client.generate(&prompt) => {
                    let _ = events.send(SessionEvent::Reply { turn, result });
                }
            }
        });
        self.request = Some(token);

        true
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Reply { turn, result } if turn == self.turn => {
                self.request = None;
                match result {
                    Ok(text) => self.begin_typing(&text),
                    Err(e) => self.fail_turn(e),
                }
            }
            SessionEvent::TypingTick { turn } if turn == self.turn => self.typing_tick(),
            _ => {}
        }
    }

    fn fail_turn(&mut self, err: ChatError) {
        warn!(turn = self.turn, error = %err, "turn failed");
        if let Some(msg) = self.pending.take().and_then(|i| self.messages.get_mut(i)) {
            msg.text = err.to_string();
            msg.error = true;
            msg.loading = false;
        }
        self.phase = TurnPhase::Idle;
        self.scroll_requested = true;
    }

    fn begin_typing(&mut self, text: &str) {
        let Some(target) = self.pending.take() else {
            return;
        };
        if let Some(msg) = self.messages.get_mut(target) {
            msg.loading = false;
        }

        let events = self.events.clone();
        let turn = self.turn;
        let timer = ScheduledTask::every(self.typing_interval, move || {
            events.send(SessionEvent::TypingTick { turn }).is_ok()
        });

        self.typing = Some(Typing {
            typewriter: Typewriter::new(text, target),
            _timer: timer,
        });
        self.phase = TurnPhase::Typing;
    }

    fn typing_tick(&mut self) {
        let Some(typing) = self.typing.as_mut() else {
            return;
        };
        let target = typing.typewriter.target();
        let finished = match self.messages.get_mut(target) {
            Some(msg) => typing.typewriter.step(&mut msg.text),
            None => true,
        };
        self.scroll_requested = true;

        if finished {
            // Dropping the timer stops it.
            self.typing = None;
            self.phase = TurnPhase::Idle;
            info!(turn = self.turn, "answer revealed");
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.messages) {
            warn!(error = %e, "failed to save chats");
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(e) = self.store.set_theme(self.theme) {
            warn!(error = %e, "failed to save theme");
        }
    }

    /// Stored theme string, for display and tests.
    pub fn stored_theme(&self) -> Option<String> {
        self.store.stored_theme_value().ok().flatten()
    }

    /// Drop the stored transcript and reload. Any request or reveal still
    /// running for the current turn is cancelled.
    pub fn delete_all(&mut self) {
        if let Some(token) = self.request.take() {
            token.cancel();
        }
        self.typing = None;
        self.pending = None;
        self.phase = TurnPhase::Idle;
        // Late events from the cancelled turn no longer match.
        self.turn += 1;

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear saved chats");
        }
        info!("transcript deleted");
        self.load();
    }

    /// Snapshot of what is persisted right now.
    pub fn stored_transcript(&self) -> Option<Vec<ChatMessage>> {
        self.store.load().ok().and_then(|s| s.transcript)
    }

    pub fn message_text(&self, idx: usize) -> Option<&str> {
        self.messages.get(idx).map(|m| m.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;
    use crate::store::KvStore;

    fn session_with_client() -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = ChatStore::new(KvStore::open_in_memory().unwrap());
        // Nothing listens here; tests feed replies by hand.
        let client = GeminiClient::new("http://127.0.0.1:9", "test-model", "key", 1).unwrap();
        let session = ChatSession::new(store, Some(client), tx, Duration::from_secs(3600));
        (session, rx)
    }

    fn reveal(session: &mut ChatSession) {
        while session.phase() == TurnPhase::Typing {
            session.handle_event(SessionEvent::TypingTick { turn: session.turn() });
        }
    }

    #[tokio::test]
    async fn test_submit_creates_one_placeholder() {
        let (mut session, _rx) = session_with_client();
        assert!(!session.header_hidden());

        assert!(session.submit("  hello  "));
        assert_eq!(session.phase(), TurnPhase::AwaitingResponse);
        assert!(session.header_hidden());

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::outgoing("hello"));
        assert_eq!(messages[1].role, ChatRole::Agent);
        assert!(messages[1].loading);
        assert_eq!(messages.iter().filter(|m| m.loading).count(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let (mut session, _rx) = session_with_client();
        assert!(!session.submit("   \n\t"));
        assert!(session.messages().is_empty());
        assert_eq!(session.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_noop() {
        let (mut session, _rx) = session_with_client();
        assert!(session.submit("first"));
        assert!(!session.submit("second"));
        assert_eq!(session.messages().len(), 2);

        session.handle_event(SessionEvent::Reply {
            turn: session.turn(),
            result: Ok("one two".to_string()),
        });
        assert_eq!(session.phase(), TurnPhase::Typing);
        assert!(!session.submit("third"));
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_success_reveals_and_persists() {
        let (mut session, _rx) = session_with_client();
        session.submit("hi");
        session.handle_event(SessionEvent::Reply {
            turn: session.turn(),
            result: Ok("Hello world".to_string()),
        });

        assert!(!session.messages()[1].loading);
        assert!(session.is_typing(1));
        assert_eq!(session.stored_transcript(), None);

        session.handle_event(SessionEvent::TypingTick { turn: session.turn() });
        assert_eq!(session.message_text(1), Some("Hello"));
        assert!(session.take_scroll_request());
        assert_eq!(session.stored_transcript(), None);

        reveal(&mut session);
        assert_eq!(session.message_text(1), Some("Hello world"));
        assert_eq!(session.phase(), TurnPhase::Idle);
        assert!(!session.is_typing(1));
        assert_eq!(session.stored_transcript().as_deref(), Some(session.messages()));
    }

    #[tokio::test]
    async fn test_failure_shows_error_and_clears_guard() {
        let (mut session, _rx) = session_with_client();
        session.submit("hi");
        session.handle_event(SessionEvent::Reply {
            turn: session.turn(),
            result: Err(ChatError::Api {
                status: 429,
                message: "quota exceeded".to_string(),
            }),
        });

        let reply = &session.messages()[1];
        assert_eq!(reply.text, "quota exceeded");
        assert!(reply.error);
        assert!(!reply.loading);
        assert_eq!(session.phase(), TurnPhase::Idle);
        assert!(session.submit("again"));
    }

    #[tokio::test]
    async fn test_missing_client_fails_turn() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = ChatStore::new(KvStore::open_in_memory().unwrap());
        let mut session = ChatSession::new(store, None, tx, Duration::from_millis(75));

        assert!(session.submit("hello"));
        let reply = &session.messages()[1];
        assert!(reply.error);
        assert_eq!(reply.text, ChatError::MissingApiKey.to_string());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_stale_events_are_ignored() {
        let (mut session, _rx) = session_with_client();
        session.submit("hi");
        let old_turn = session.turn();
        session.delete_all();

        session.handle_event(SessionEvent::Reply {
            turn: old_turn,
            result: Ok("late".to_string()),
        });
        assert!(session.messages().is_empty());
        assert_eq!(session.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_delete_mid_typing_cancels_reveal() {
        let (mut session, _rx) = session_with_client();
        session.submit("hi");
        session.handle_event(SessionEvent::Reply {
            turn: session.turn(),
            result: Ok("a b c".to_string()),
        });
        session.handle_event(SessionEvent::TypingTick { turn: session.turn() });

        session.delete_all();
        assert_eq!(session.phase(), TurnPhase::Idle);
        assert!(session.messages().is_empty());
        assert!(!session.header_hidden());
        assert_eq!(session.stored_transcript(), None);
    }

    #[tokio::test]
    async fn test_toggle_theme_twice() {
        let (mut session, _rx) = session_with_client();
        let label = session.theme().toggle_label();

        session.toggle_theme();
        assert_eq!(session.theme(), Theme::Light);
        assert_eq!(session.stored_theme().as_deref(), Some("light_mode"));

        session.toggle_theme();
        assert_eq!(session.theme(), Theme::Dark);
        assert_eq!(session.theme().toggle_label(), label);
        assert_eq!(session.stored_theme().as_deref(), Some("dark_mode"));
    }
}
