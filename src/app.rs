use std::time::{Duration, Instant};

use ratatui::layout::Rect;

use gemini_chat::{ChatSession, Config, GeminiClient};

use crate::ui;

const COPIED_INDICATOR: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub config: Config,
    pub session: ChatSession,

    // Prompt input
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat list
    pub selected_message: Option<usize>,
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat pane
    pub chat_width: u16,  // inner width of the chat pane, for wrap calculations
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub copied: Option<(usize, Instant)>,

    // Popups
    pub show_delete_confirm: bool,
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub status: Option<String>,
}

impl App {
    pub fn new(config: Config, session: ChatSession) -> Self {
        let show_api_key_input = !session.has_client();
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            config,
            session,

            input: String::new(),
            cursor: 0,

            selected_message: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,
            copied: None,

            show_delete_confirm: false,
            show_api_key_input,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            status: None,
        };
        app.sync_scroll();
        app
    }

    /// Submit whatever is in the input box. The box is only cleared when the
    /// session accepted the turn.
    pub fn submit_input(&mut self) {
        let text = self.input.clone();
        if self.session.submit(&text) {
            self.input.clear();
            self.cursor = 0;
            self.selected_message = None;
        }
        self.sync_scroll();
    }

    /// Suggestions behave exactly like typed input.
    pub fn submit_suggestion(&mut self, idx: usize) {
        if self.session.header_hidden() {
            return;
        }
        if let Some(text) = self.config.suggestions.get(idx).cloned() {
            if self.session.submit(&text) {
                self.selected_message = None;
            }
            self.sync_scroll();
        }
    }

    pub fn toggle_theme(&mut self) {
        self.session.toggle_theme();
    }

    pub fn confirm_delete(&mut self) {
        self.show_delete_confirm = false;
        self.session.delete_all();
        self.selected_message = None;
        self.copied = None;
        self.chat_scroll = 0;
        self.sync_scroll();
    }

    /// Install a key typed into the API key popup.
    pub fn apply_api_key(&mut self, key: &str) -> anyhow::Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(());
        }
        self.config.api_key = Some(key.to_string());
        if let Some(client) = GeminiClient::from_config(&self.config)? {
            self.session.set_client(client);
        }
        Config::save_api_key(key)?;
        self.status = Some("API key saved".to_string());
        Ok(())
    }

    /// Follow the end of the chat if the session asked for it.
    pub fn sync_scroll(&mut self) {
        if self.session.take_scroll_request() {
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.messages().iter().any(|m| m.loading) {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some((_, at)) = self.copied {
            if at.elapsed() >= COPIED_INDICATOR {
                self.copied = None;
            }
        }
    }

    pub fn mark_copied(&mut self, idx: usize) {
        self.copied = Some((idx, Instant::now()));
    }

    pub fn is_copied(&self, idx: usize) -> bool {
        self.copied
            .is_some_and(|(i, at)| i == idx && at.elapsed() < COPIED_INDICATOR)
    }

    /// Message the copy action applies to: the selected one if it is not still
    /// loading or being typed.
    pub fn copy_target(&self) -> Option<(usize, &str)> {
        let idx = self.selected_message?;
        let msg = self.session.messages().get(idx)?;
        if msg.loading || self.session.is_typing(idx) {
            return None;
        }
        Some((idx, msg.text.as_str()))
    }

    // Message selection
    pub fn select_next_message(&mut self) {
        let len = self.session.messages().len();
        if len > 0 {
            let next = self.selected_message.map_or(0, |i| (i + 1).min(len - 1));
            self.selected_message = Some(next);
        }
    }

    pub fn select_prev_message(&mut self) {
        let len = self.session.messages().len();
        if len > 0 {
            let prev = self.selected_message.map_or(len - 1, |i| i.saturating_sub(1));
            self.selected_message = Some(prev);
        }
    }

    // Chat scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.total_chat_lines().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rendered line count of the chat pane, matching what `ui` draws.
    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.session.messages() {
            total_lines += 1; // Role line
            if msg.loading {
                total_lines += 1;
            } else {
                total_lines += ui::wrap_message(&msg.text, wrap_width).len();
            }
            total_lines += 1; // Blank line after message
        }
        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_chat::{ChatStore, KvStore};
    use tokio::sync::mpsc;

    fn offline_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = ChatStore::new(KvStore::open_in_memory().unwrap());
        let session = ChatSession::new(store, None, tx, Duration::from_millis(75));
        App::new(Config::new(), session)
    }

    #[test]
    fn test_missing_key_opens_prompt() {
        let app = offline_app();
        assert!(app.show_api_key_input);
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[tokio::test]
    async fn test_submit_clears_input_only_when_accepted() {
        let mut app = offline_app();
        app.input = "   ".to_string();
        app.cursor = 3;
        app.submit_input();
        assert_eq!(app.input, "   ");
        assert!(app.session.messages().is_empty());

        app.input = "hello".to_string();
        app.submit_input();
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert_eq!(app.session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_suggestions_only_while_header_visible() {
        let mut app = offline_app();
        app.submit_suggestion(0);
        assert_eq!(app.session.messages()[0].text, app.config.suggestions[0]);

        app.submit_suggestion(1);
        assert_eq!(app.session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_selection_and_copy_target() {
        let mut app = offline_app();
        assert!(app.copy_target().is_none());
        app.submit_input_text("question");

        app.select_prev_message();
        assert_eq!(app.selected_message, Some(1));
        let (idx, text) = app.copy_target().unwrap();
        assert_eq!(idx, 1);
        assert!(!text.is_empty());

        app.select_prev_message();
        app.select_prev_message();
        assert_eq!(app.selected_message, Some(0));
        app.select_next_message();
        app.select_next_message();
        assert_eq!(app.selected_message, Some(1));
    }

    #[test]
    fn test_copied_indicator_is_per_message() {
        let mut app = offline_app();
        app.mark_copied(2);
        assert!(app.is_copied(2));
        assert!(!app.is_copied(1));

        app.copied = Some((2, Instant::now() - Duration::from_secs(2)));
        assert!(!app.is_copied(2));
        app.tick_animation();
        assert!(app.copied.is_none());
    }

    #[tokio::test]
    async fn test_scroll_follows_new_messages() {
        let mut app = offline_app();
        app.chat_height = 2;
        app.chat_width = 10;
        // 23 chars, but four lines once wrapped at word boundaries
        app.submit_input_text("aaaa bbbbbb cccc dddddd");
        // 1 + 4 + 1 for the question, 1 + 5 + 1 for the error reply
        assert_eq!(app.total_chat_lines(), 13);
        assert_eq!(app.chat_scroll, 11);

        app.scroll_up(20);
        assert_eq!(app.chat_scroll, 0);
        app.scroll_down(50);
        assert_eq!(app.chat_scroll, 11);
    }

    impl App {
        fn submit_input_text(&mut self, text: &str) {
            self.input = text.to_string();
            self.submit_input();
        }
    }
}
