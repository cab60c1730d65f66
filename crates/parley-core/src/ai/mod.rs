pub mod gemini;
pub mod ollama;

pub use gemini::{GeminiChat, GeminiClient};
pub use ollama::{OllamaChat, OllamaClient};
