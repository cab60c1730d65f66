use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::ai::{GeminiChat, GeminiClient, OllamaChat, OllamaClient};
use crate::config::Settings;
use crate::model::ChatModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Gemini, Provider::Ollama]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini (Google)",
            Provider::Ollama => "Ollama (Local)",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::Ollama => "llama3.2:latest",
        }
    }
}

/// Start a fresh chat with whichever provider the settings select
pub fn build_model(settings: &Settings) -> Arc<dyn ChatModel> {
    match settings.provider {
        Provider::Gemini => {
            let api_key = settings.gemini_api_key.clone().unwrap_or_else(|| {
                warn!("API key is missing; set GEMINI_API_KEY or gemini_api_key in the config file");
                String::new()
            });
            let client = GeminiClient::new(&api_key);
            Arc::new(GeminiChat::new(client, &settings.model, settings.max_output_tokens))
        }
        Provider::Ollama => {
            let client = OllamaClient::new(&settings.ollama_url);
            Arc::new(OllamaChat::new(client, &settings.model, settings.max_output_tokens))
        }
    }
}

/// How long the model picker waits on a model listing
pub const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(5);

/// Models the user can switch to for the configured provider
pub async fn list_models(settings: &Settings) -> Result<Vec<String>> {
    list_models_within(settings, LIST_MODELS_TIMEOUT).await
}

async fn list_models_within(settings: &Settings, limit: Duration) -> Result<Vec<String>> {
    match settings.provider {
        Provider::Gemini => Ok(GeminiClient::list_models()),
        Provider::Ollama => {
            let client = OllamaClient::new(&settings.ollama_url);
            tokio::time::timeout(limit, client.list_models())
                .await
                .map_err(|_| anyhow!("Timed out listing models at {}", settings.ollama_url))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_from_str_round_trips() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_str(provider.as_str()), Some(provider));
        }
    }

    #[test]
    fn test_from_str_is_lenient() {
        assert_eq!(Provider::from_str(" Gemini "), Some(Provider::Gemini));
        assert_eq!(Provider::from_str("OLLAMA"), Some(Provider::Ollama));
        assert_eq!(Provider::from_str("claude"), None);
    }

    #[tokio::test]
    async fn test_gemini_models_are_listed_offline() {
        let settings = Config::new().resolve_with(|_| None);
        let models = list_models(&settings).await.unwrap();
        assert!(models.contains(&settings.model));
    }

    #[tokio::test]
    async fn test_stalled_ollama_listing_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"models": []}"#)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let settings = Config {
            provider: Some("ollama".to_string()),
            ollama_url: Some(server.uri()),
            ..Config::default()
        }
        .resolve_with(|_| None);

        let err = list_models_within(&settings, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }
}
