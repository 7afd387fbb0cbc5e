use std::time::{Duration, Instant};

use murmur_config::UiConfig;
use murmur_core::{ChatEvent, ChatSnapshot, Conversation, Notice, SubmitError};
use tracing::{debug, info};

/// How long a toast stays on screen
const TOAST_TTL: Duration = Duration::from_secs(4);

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

#[derive(Debug, Clone)]
pub struct Toast {
    pub notice: Notice,
    pub shown_at: Instant,
}

pub struct App {
    conversation: Conversation,
    pub snapshot: ChatSnapshot,
    pub input: String,
    /// Lines scrolled up from the bottom of the transcript
    pub scroll_offset: usize,
    /// Largest useful `scroll_offset`, set by the renderer
    max_scroll: usize,
    pub toasts: Vec<Toast>,
    pub ui: UiConfig,
    spinner_frame: usize,
}

impl App {
    pub fn new(conversation: Conversation, ui: UiConfig) -> Self {
        let snapshot = conversation.snapshot();
        Self {
            conversation,
            snapshot,
            input: String::new(),
            scroll_offset: 0,
            max_scroll: 0,
            toasts: Vec::new(),
            ui,
            spinner_frame: 0,
        }
    }

    /// Kick off the opening exchange for the current session
    pub fn start(&mut self) {
        if self.conversation.start().is_some() {
            info!("Opening conversation {}", self.conversation.session_id());
        }
        self.refresh();
    }

    /// Re-read the conversation state for rendering
    pub fn refresh(&mut self) {
        self.snapshot = self.conversation.snapshot();
    }

    pub fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::LogChanged => self.scroll_to_bottom(),
            ChatEvent::Notice(notice) => self.show_notice(notice),
            ChatEvent::Revealed { .. } | ChatEvent::BusyChanged(_) => {}
        }
    }

    pub fn on_tick(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER.len();
        self.expire_toasts(Instant::now());
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[self.spinner_frame]
    }

    pub fn is_busy(&self) -> bool {
        self.snapshot.busy
    }

    pub fn is_revealing(&self) -> bool {
        self.snapshot.messages.iter().any(|m| m.revealing)
    }

    pub fn send_message(&mut self) {
        // Submission is disabled while a request is in flight.
        if self.is_busy() {
            return;
        }

        match self.conversation.submit(&self.input) {
            Ok(_turn) => {
                self.input.clear();
                self.scroll_to_bottom();
            }
            Err(SubmitError::Blank) => {}
            Err(SubmitError::Busy) => debug!("Submit rejected: request in flight"),
        }
        self.refresh();
    }

    pub fn new_conversation(&mut self) {
        self.conversation.reset();
        self.input.clear();
        self.scroll_offset = 0;
        self.refresh();
        self.show_notice(Notice::info(
            "New conversation",
            format!("Session {}", self.snapshot.session_id),
        ));
    }

    pub fn show_notice(&mut self, notice: Notice) {
        self.toasts.push(Toast {
            notice,
            shown_at: Instant::now(),
        });
    }

    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts
            .retain(|toast| now.saturating_duration_since(toast.shown_at) < TOAST_TTL);
    }

    pub fn push_input(&mut self, c: char) {
        if !self.is_busy() {
            self.input.push(c);
        }
    }

    pub fn pop_input(&mut self) {
        if !self.is_busy() {
            self.input.pop();
        }
    }

    /// Record how many lines the transcript overflows its pane by
    pub fn set_scroll_limit(&mut self, max_scroll: usize) {
        self.max_scroll = max_scroll;
        self.scroll_offset = self.scroll_offset.min(max_scroll);
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = (self.scroll_offset + 1).min(self.max_scroll);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_offset = (self.scroll_offset + 10).min(self.max_scroll);
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(10);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Stop any running reveal before the view goes away
    pub fn teardown(&self) {
        self.conversation.teardown();
    }
}
