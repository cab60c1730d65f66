//! The external model capability consumed by the message pipeline

use anyhow::Result;
use async_trait::async_trait;

/// Media type assumed when an attachment doesn't declare one
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// An image ready to be sent inline with a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub media_type: String,
    /// Base64 encoded image bytes (no `data:` prefix)
    pub data: String,
}

/// A hosted model a chat session can talk to.
///
/// Implementations own the conversation history used by `continue_chat`.
/// `generate_content` must not read or extend that history.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `text` as the next user turn of the running chat
    async fn continue_chat(&self, text: &str) -> Result<String>;

    /// One-off generation from `text` and an inline image, outside the chat
    async fn generate_content(&self, text: &str, image: &InlineImage) -> Result<String>;
}
