use crate::transport::{ConnectionError, Outbound};
use tracing::{debug, warn};

/// The single line the user types into. Cursor positions are in chars.
#[derive(Debug, Clone, Default)]
pub struct InputField {
    value: String,
    cursor: usize,
    focused: bool,
    max_chars: Option<usize>,
}

impl InputField {
    pub fn new(max_chars: Option<usize>) -> Self {
        Self {
            value: String::new(),
            cursor: 0,
            focused: true,
            max_chars,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    pub fn max_chars(&self) -> Option<usize> {
        self.max_chars
    }

    /// Returns false when the character limit is already reached.
    pub fn insert(&mut self, ch: char) -> bool {
        if self
            .max_chars
            .is_some_and(|limit| self.char_count() >= limit)
        {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.value.insert(at, ch);
        self.cursor += 1;
        true
    }

    /// Inserts as much of `text` as the limit allows; returns the number of
    /// chars taken.
    pub fn insert_str(&mut self, text: &str) -> usize {
        text.chars()
            .filter(|ch| !ch.is_control())
            .take_while(|ch| self.insert(*ch))
            .count()
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.char_count() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.value.remove(at);
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Whether `text` fits under the character limit as a whole line.
    pub fn fits(&self, text: &str) -> bool {
        self.max_chars.is_none_or(|limit| text.chars().count() <= limit)
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.char_count();
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_pos)
            .map(|(index, _)| index)
            .unwrap_or(self.value.len())
    }
}

/// What happened to a submit. The triggering key is consumed in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing typed; nothing touched.
    Empty,
    Sent,
    /// The connection is not open; the typed text stays in the field.
    NotConnected,
}

/// Send the field's value as one raw text frame, then clear and refocus the
/// field. Leaves everything untouched when the field is empty or the
/// connection cannot take the frame.
pub fn submit<O: Outbound + ?Sized>(field: &mut InputField, outbound: Option<&O>) -> SubmitOutcome {
    if field.value().is_empty() {
        return SubmitOutcome::Empty;
    }
    let Some(outbound) = outbound.filter(|outbound| outbound.is_open()) else {
        debug!(target: "webchat::input", "submit while not connected");
        return SubmitOutcome::NotConnected;
    };
    match outbound.send_text(field.value().to_string()) {
        Ok(()) => {
            field.clear();
            field.focus();
            SubmitOutcome::Sent
        }
        Err(ConnectionError::NotConnected) => {
            warn!(target: "webchat::input", "connection closed while sending");
            SubmitOutcome::NotConnected
        }
        Err(err) => {
            warn!(target: "webchat::input", error = %err, "send failed");
            SubmitOutcome::NotConnected
        }
    }
}
