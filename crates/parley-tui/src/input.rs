use parley_core::PendingImage;

/// Prompts offered while the transcript is still empty: (label, prefill)
pub const QUICK_PROMPTS: [(&str, &str); 5] = [
    ("Analyze images", "Help me analyze this image "),
    ("Summarize text", "Summarize "),
    ("Surprise me", "Surprise me "),
    ("Brainstorm", "Brainstorm ideas "),
    ("Get advice", "Get advice "),
];

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// The message box: a single line of text plus an optional attachment
#[derive(Debug, Default)]
pub struct ChatInput {
    text: String,
    cursor: usize, // in chars
    image: Option<PendingImage>,
}

impl ChatInput {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn image(&self) -> Option<&PendingImage> {
        self.image.as_ref()
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    /// Replace the text and put the cursor at the end (quick prompts)
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.move_end();
    }

    pub fn attach(&mut self, image: PendingImage) {
        self.image = Some(image);
    }

    pub fn remove_image(&mut self) -> Option<PendingImage> {
        self.image.take()
    }

    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.image.is_some()
    }

    pub fn can_send(&self, busy: bool) -> bool {
        !busy && self.has_content()
    }

    pub fn hint(&self, busy: bool) -> &'static str {
        if self.can_send(busy) {
            "Send message"
        } else {
            "Message is empty"
        }
    }

    /// Hand over the text and attachment, leaving the box empty
    pub fn take(&mut self) -> (String, Option<PendingImage>) {
        self.cursor = 0;
        (std::mem::take(&mut self.text), self.image.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ImageRef;

    fn typed(s: &str) -> ChatInput {
        let mut input = ChatInput::default();
        for c in s.chars() {
            input.insert(c);
        }
        input
    }

    fn image() -> PendingImage {
        PendingImage::new(vec![1, 2, 3], None, ImageRef::new("shot.png", None, 3))
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let mut input = typed("héllo");
        input.move_left();
        input.move_left();
        input.backspace();
        assert_eq!(input.text(), "hélo");
        input.move_home();
        input.delete();
        assert_eq!(input.text(), "élo");
        input.insert('ü');
        assert_eq!(input.text(), "üélo");
        assert_eq!(input.cursor(), 1);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut input = typed("ab");
        input.move_right();
        assert_eq!(input.cursor(), 2);
        input.move_home();
        input.move_left();
        assert_eq!(input.cursor(), 0);
        input.backspace();
        assert_eq!(input.text(), "ab");
    }

    #[test]
    fn test_can_send_needs_content_and_idle() {
        let mut input = typed("   ");
        assert!(!input.can_send(false));
        assert_eq!(input.hint(false), "Message is empty");

        input.attach(image());
        assert!(input.can_send(false));
        assert!(!input.can_send(true));
        assert_eq!(input.hint(false), "Send message");
        assert_eq!(input.hint(true), "Message is empty");
    }

    #[test]
    fn test_take_clears_text_and_image() {
        let mut input = typed("look");
        input.attach(image());

        let (text, img) = input.take();
        assert_eq!(text, "look");
        assert!(img.is_some());
        assert_eq!(input.text(), "");
        assert_eq!(input.cursor(), 0);
        assert!(input.image().is_none());
    }

    #[test]
    fn test_quick_prompt_prefill() {
        let mut input = ChatInput::default();
        input.set_text(QUICK_PROMPTS[0].1);
        assert_eq!(input.text(), "Help me analyze this image ");
        assert_eq!(input.cursor(), input.text().chars().count());
    }
}
