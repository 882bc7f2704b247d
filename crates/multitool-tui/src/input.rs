use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text field with a character cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    #[cfg(test)]
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Take the text out, leaving the field empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
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

    /// Apply an editing key. Returns false for keys the field does not use
    /// (Enter, Esc, Tab...), so the caller can handle them.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => self.clear(),
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            _ => return false,
        }
        true
    }

    /// First visible character when the field is `width` columns wide, so the
    /// cursor always stays on screen.
    pub fn scroll_offset(&self, width: usize) -> usize {
        if width == 0 || self.cursor < width {
            0
        } else {
            self.cursor - width + 1
        }
    }

    pub fn visible(&self, width: usize) -> String {
        self.value
            .chars()
            .skip(self.scroll_offset(width))
            .take(width)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_cursor_moves() {
        let mut input = TextInput::new();
        for c in "helo".chars() {
            input.handle_key(&key(KeyCode::Char(c)));
        }
        input.move_left();
        input.insert('l');
        assert_eq!(input.value(), "hello");
        assert_eq!(input.cursor(), 4);

        input.move_home();
        input.delete();
        assert_eq!(input.value(), "ello");
        input.move_end();
        input.backspace();
        assert_eq!(input.value(), "ell");
    }

    #[test]
    fn multibyte_characters_are_safe() {
        let mut input = TextInput::new();
        input.set("úkol");
        input.move_home();
        input.move_right();
        input.backspace();
        assert_eq!(input.value(), "kol");
        input.insert('č');
        assert_eq!(input.value(), "čkol");
    }

    #[test]
    fn take_empties_the_field() {
        let mut input = TextInput::new();
        input.set("Buy milk");
        assert_eq!(input.take(), "Buy milk");
        assert!(input.is_empty());
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn enter_and_esc_are_not_consumed() {
        let mut input = TextInput::new();
        assert!(!input.handle_key(&key(KeyCode::Enter)));
        assert!(!input.handle_key(&key(KeyCode::Esc)));
        assert!(input.handle_key(&KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn visible_window_follows_cursor() {
        let mut input = TextInput::new();
        input.set("abcdefghij");
        assert_eq!(input.visible(4), "hij");
        input.move_home();
        assert_eq!(input.visible(4), "abcd");
    }
}
