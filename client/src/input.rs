//! Mouse and keyboard handling for the board window

use crate::rendering::BoardLayout;
use macroquad::prelude::*;
use shared::Square;

/// Longest chat message the input box accepts.
pub const MAX_CHAT_LEN: usize = 200;

/// A user action the rest of the client cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    SquareClicked(Square),
    ResetRequested,
    ReconnectRequested,
    ChatSubmitted(String),
}

/// Text being typed into the chat box
#[derive(Debug, Default)]
pub struct ChatInput {
    buffer: String,
    active: bool,
}

impl ChatInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn open(&mut self) {
        self.active = true;
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.buffer.clear();
    }

    pub fn push(&mut self, ch: char) {
        if self.active && !ch.is_control() && self.buffer.chars().count() < MAX_CHAT_LEN {
            self.buffer.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Closes the box and returns the message, unless it is blank.
    pub fn submit(&mut self) -> Option<String> {
        self.active = false;
        let message = self.buffer.trim().to_string();
        self.buffer.clear();
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

/// Turns raw macroquad input into [`InputEvent`]s, one frame at a time
pub struct InputManager {
    chat: ChatInput,

    // Previous frame key states for edge detection
    prev_key_f5: bool,
    prev_key_r: bool,
    prev_key_enter: bool,
    prev_key_escape: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            chat: ChatInput::new(),
            prev_key_f5: false,
            prev_key_r: false,
            prev_key_enter: false,
            prev_key_escape: false,
        }
    }

    pub fn chat(&self) -> &ChatInput {
        &self.chat
    }

    /// Samples this frame's input.
    ///
    /// While the chat box is open every typed character goes into it and the
    /// board ignores the keyboard.
    pub fn update(&mut self, layout: &BoardLayout) -> Vec<InputEvent> {
        let mut events = Vec::new();

        let key_f5 = is_key_down(KeyCode::F5);
        let key_r = is_key_down(KeyCode::R);
        let key_enter = is_key_down(KeyCode::Enter) || is_key_down(KeyCode::KpEnter);
        let key_escape = is_key_down(KeyCode::Escape);

        let enter_pressed = key_enter && !self.prev_key_enter;

        if self.chat.is_active() {
            while let Some(ch) = get_char_pressed() {
                self.chat.push(ch);
            }
            if is_key_pressed(KeyCode::Backspace) {
                self.chat.backspace();
            }
            if key_escape && !self.prev_key_escape {
                self.chat.cancel();
            } else if enter_pressed {
                if let Some(message) = self.chat.submit() {
                    events.push(InputEvent::ChatSubmitted(message));
                }
            }
        } else {
            // Drain so keys typed before opening the box don't leak into it
            while get_char_pressed().is_some() {}

            if enter_pressed {
                self.chat.open();
            }
            if key_f5 && !self.prev_key_f5 {
                events.push(InputEvent::ResetRequested);
            }
            if key_r && !self.prev_key_r {
                events.push(InputEvent::ReconnectRequested);
            }
        }

        if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = mouse_position();
            if let Some(square) = layout.square_at(x, y) {
                events.push(InputEvent::SquareClicked(square));
            }
        }

        self.prev_key_f5 = key_f5;
        self.prev_key_r = key_r;
        self.prev_key_enter = key_enter;
        self.prev_key_escape = key_escape;

        events
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_ignores_typing_while_closed() {
        let mut chat = ChatInput::new();
        chat.push('a');
        assert_eq!(chat.text(), "");
    }

    #[test]
    fn test_chat_submit_trims_and_closes() {
        let mut chat = ChatInput::new();
        chat.open();
        for ch in "  hello ".chars() {
            chat.push(ch);
        }

        assert_eq!(chat.submit(), Some("hello".to_string()));
        assert!(!chat.is_active());
        assert_eq!(chat.text(), "");
    }

    #[test]
    fn test_blank_chat_is_not_sent() {
        let mut chat = ChatInput::new();
        chat.open();
        chat.push(' ');
        assert_eq!(chat.submit(), None);
    }

    #[test]
    fn test_chat_backspace_and_limit() {
        let mut chat = ChatInput::new();
        chat.open();
        for _ in 0..(MAX_CHAT_LEN + 10) {
            chat.push('x');
        }
        assert_eq!(chat.text().len(), MAX_CHAT_LEN);

        chat.backspace();
        assert_eq!(chat.text().len(), MAX_CHAT_LEN - 1);

        chat.push('\n');
        assert_eq!(chat.text().len(), MAX_CHAT_LEN - 1);
    }

    #[test]
    fn test_cancel_discards_text() {
        let mut chat = ChatInput::new();
        chat.open();
        chat.push('h');
        chat.cancel();

        assert!(!chat.is_active());
        assert_eq!(chat.text(), "");
    }
}
