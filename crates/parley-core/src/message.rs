//! Transcript entry types
//!
//! These are shared between the pipeline and any UI that renders a session.
//! They don't depend on a specific UI framework.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of a transcript entry, unique within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// The id that follows this one (an assistant reply follows its user turn)
    pub fn next(self) -> Self {
        MessageId(self.0 + 1)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Preview reference to an image the user attached.
///
/// This is what the transcript keeps. The raw bytes live in
/// [`PendingImage`](crate::image::PendingImage) and are gone after the send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub path: Option<PathBuf>,
    pub size: usize,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, path: Option<PathBuf>, size: usize) -> Self {
        Self {
            name: name.into(),
            path,
            size,
        }
    }

    /// Human readable size, e.g. "512 B", "12 KB", "1.4 MB"
    pub fn display_size(&self) -> String {
        const KB: usize = 1024;
        const MB: usize = 1024 * 1024;
        if self.size >= MB {
            format!("{:.1} MB", self.size as f64 / MB as f64)
        } else if self.size >= KB {
            format!("{} KB", self.size / KB)
        } else {
            format!("{} B", self.size)
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[image: {} ({})]", self.name, self.display_size())
    }
}

/// A chat message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub text: Option<String>,
    pub image: Option<ImageRef>,
}

impl ChatMessage {
    pub fn user(id: MessageId, text: Option<String>, image: Option<ImageRef>) -> Self {
        Self {
            id,
            role: ChatRole::User,
            text,
            image,
        }
    }

    pub fn assistant(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            role: ChatRole::Assistant,
            text: Some(text.into()),
            image: None,
        }
    }

    /// User messages carry text, an image, or both; assistant messages always carry text.
    pub fn is_valid(&self) -> bool {
        match self.role {
            ChatRole::User => self.text.is_some() || self.image.is_some(),
            ChatRole::Assistant => self.text.is_some(),
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_needs_text_or_image() {
        let empty = ChatMessage::user(MessageId(1), None, None);
        assert!(!empty.is_valid());

        let image_only = ChatMessage::user(
            MessageId(1),
            None,
            Some(ImageRef::new("cat.png", None, 10)),
        );
        assert!(image_only.is_valid());

        let text_only = ChatMessage::user(MessageId(1), Some("hi".to_string()), None);
        assert!(text_only.is_valid());
    }

    #[test]
    fn test_assistant_message_always_has_text() {
        let msg = ChatMessage::assistant(MessageId(2), "");
        assert!(msg.is_valid());
        assert_eq!(msg.role, ChatRole::Assistant);
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_image_ref_display() {
        assert_eq!(ImageRef::new("a.png", None, 300).to_string(), "[image: a.png (300 B)]");
        assert_eq!(ImageRef::new("b.jpg", None, 12 * 1024).to_string(), "[image: b.jpg (12 KB)]");
        assert_eq!(
            ImageRef::new("c.webp", None, 3 * 1024 * 1024 / 2).display_size(),
            "1.5 MB"
        );
    }

    #[test]
    fn test_message_id_next() {
        assert_eq!(MessageId(41).next(), MessageId(42));
    }
}
