pub mod ai;
pub mod config;
pub mod format;
pub mod image;
pub mod message;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod session;

// Re-export main types for convenience
pub use ai::{GeminiChat, GeminiClient, OllamaChat, OllamaClient};
pub use config::{Config, Settings};
pub use format::{parse_reply, Block, Inline};
pub use image::PendingImage;
pub use message::{ChatMessage, ChatRole, ImageRef, MessageId};
pub use model::{ChatModel, InlineImage};
pub use pipeline::{MessagePipeline, Rejection, SendOutcome, ERROR_NOTICE};
pub use provider::{build_model, list_models, Provider};
pub use session::{Session, SessionSnapshot, SharedSession};
