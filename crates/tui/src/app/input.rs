use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const MAX_INPUT_LEN: usize = 256;

/// Single-line text field with a cursor measured in characters.
#[derive(Debug, Clone, Default)]
pub(crate) struct TextInput {
    value: String,
    cursor: usize,
    masked: bool,
}

/// What a key did to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputOutcome {
    Edited,
    Submit,
    Cancel,
    Ignored,
}

impl TextInput {
    pub(crate) fn masked() -> Self {
        Self {
            masked: true,
            ..Self::default()
        }
    }

    pub(crate) fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn set(&mut self, value: &str) {
        self.value = value.chars().take(MAX_INPUT_LEN).collect();
        self.cursor = self.value.chars().count();
    }

    pub(crate) fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Text to draw; masked fields show one bullet per character.
    pub(crate) fn display(&self) -> String {
        if self.masked {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> InputOutcome {
        match key.code {
            KeyCode::Enter => InputOutcome::Submit,
            KeyCode::Esc => InputOutcome::Cancel,
            KeyCode::Left => self.move_cursor(-1),
            KeyCode::Right => self.move_cursor(1),
            KeyCode::Home => {
                self.cursor = 0;
                InputOutcome::Edited
            }
            KeyCode::End => {
                self.cursor = self.value.chars().count();
                InputOutcome::Edited
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.remove_at(self.cursor);
                }
                InputOutcome::Edited
            }
            KeyCode::Delete => {
                self.remove_at(self.cursor);
                InputOutcome::Edited
            }
            KeyCode::Char(ch)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.insert(ch);
                InputOutcome::Edited
            }
            _ => InputOutcome::Ignored,
        }
    }

    fn move_cursor(&mut self, delta: isize) -> InputOutcome {
        let len = self.value.chars().count() as isize;
        self.cursor = (self.cursor as isize + delta).clamp(0, len) as usize;
        InputOutcome::Edited
    }

    fn insert(&mut self, ch: char) {
        if ch.is_control() || self.value.chars().count() >= MAX_INPUT_LEN {
            return;
        }
        let at = self.byte_offset(self.cursor);
        self.value.insert(at, ch);
        self.cursor += 1;
    }

    fn remove_at(&mut self, index: usize) {
        if index < self.value.chars().count() {
            let at = self.byte_offset(index);
            self.value.remove(at);
        }
    }

    fn byte_offset(&self, index: usize) -> usize {
        self.value
            .char_indices()
            .nth(index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut TextInput, text: &str) {
        for ch in text.chars() {
            input.handle_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn edits_at_the_cursor() {
        let mut input = TextInput::default();
        type_str(&mut input, "dta.csv");
        input.handle_key(key(KeyCode::Home));
        input.handle_key(key(KeyCode::Right));
        type_str(&mut input, "a");
        assert_eq!(input.value(), "data.csv");

        input.handle_key(key(KeyCode::End));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.value(), "data.cs");
        assert_eq!(input.cursor(), 7);
    }

    #[test]
    fn handles_multibyte_text() {
        let mut input = TextInput::default();
        type_str(&mut input, "città.csv");
        input.handle_key(key(KeyCode::Home));
        for _ in 0..5 {
            input.handle_key(key(KeyCode::Right));
        }
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.value(), "citt.csv");
    }

    #[test]
    fn masked_field_hides_value() {
        let mut input = TextInput::masked();
        input.set("demo");
        assert_eq!(input.display(), "••••");
        assert_eq!(input.value(), "demo");
    }

    #[test]
    fn control_keys_are_reported() {
        let mut input = TextInput::default();
        assert_eq!(input.handle_key(key(KeyCode::Enter)), InputOutcome::Submit);
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputOutcome::Cancel);
        assert_eq!(
            input.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            InputOutcome::Ignored
        );
        assert!(input.value().is_empty());
    }
}
