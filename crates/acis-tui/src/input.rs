use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Actions produced by key input handling.
#[derive(Debug, PartialEq)]
pub enum InputAction {
    /// Submit the current input buffer as a chat message.
    Submit(String),
    /// Quit the application.
    Quit,
    /// Clear the message pane.
    Clear,
    /// Reset the session on the server.
    Reset,
    /// Reload the session state from the server.
    RefreshState,
    /// Unrecognised slash command.
    Unknown(String),
    ScrollUp,
    ScrollDown,
    /// No-op (key was handled internally).
    None,
}

/// Map a submitted line to an action.
pub fn parse_command(line: &str) -> InputAction {
    let trimmed = line.trim();
    match trimmed {
        "" => InputAction::None,
        "/quit" | "/exit" | "/q" => InputAction::Quit,
        "/clear" => InputAction::Clear,
        "/reset" => InputAction::Reset,
        "/state" => InputAction::RefreshState,
        cmd if cmd.starts_with('/') => InputAction::Unknown(cmd.to_string()),
        text => InputAction::Submit(text.to_string()),
    }
}

/// Single-line input buffer. `cursor` counts characters, not bytes.
#[derive(Default)]
pub struct InputHandler {
    pub buffer: String,
    pub cursor: usize,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }

    fn char_len(&self) -> usize {
        self.buffer.chars().count()
    }

    /// Handle a key event, returning an action.
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                parse_command(&text)
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                InputAction::Quit
            }
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.buffer.insert(at, c);
                self.cursor += 1;
                InputAction::None
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index(self.cursor);
                    self.buffer.remove(at);
                }
                InputAction::None
            }
            KeyCode::Delete => {
                if self.cursor < self.char_len() {
                    let at = self.byte_index(self.cursor);
                    self.buffer.remove(at);
                }
                InputAction::None
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::None
            }
            KeyCode::Right => {
                if self.cursor < self.char_len() {
                    self.cursor += 1;
                }
                InputAction::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::End => {
                self.cursor = self.char_len();
                InputAction::None
            }
            KeyCode::PageUp => InputAction::ScrollUp,
            KeyCode::PageDown => InputAction::ScrollDown,
            _ => InputAction::None,
        }
    }
}
