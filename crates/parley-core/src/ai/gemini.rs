use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ChatModel, InlineImage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<String> {
        let url = format!("{}/{}:generateContent", self.base_url, model);
        debug!(%url, contents = request.contents.len(), "gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Gemini API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, error_message(status, &body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        extract_text(parsed)
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-1.5-flash".to_string(),
            "gemini-1.5-pro".to_string(),
            "gemini-2.0-flash".to_string(),
            "gemini-2.5-flash".to_string(),
        ]
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(anyhow!("Gemini API returned no text in the response candidates"));
    }
    Ok(text)
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorWrapper>(body) {
        Ok(wrapper) => {
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(code) if !code.is_empty() => format!("{code}: {message}"),
                _ => message,
            }
        }
        Err(_) if body.is_empty() => status.canonical_reason().unwrap_or("no body").to_string(),
        Err(_) => body.to_string(),
    }
}

/// A running Gemini conversation.
///
/// History only grows when a chat turn succeeds, so a failed call can simply be retried.
pub struct GeminiChat {
    client: GeminiClient,
    model: String,
    max_output_tokens: u32,
    history: Mutex<Vec<Content>>,
}

impl GeminiChat {
    pub fn new(client: GeminiClient, model: &str, max_output_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            max_output_tokens,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Number of turns (user and model) remembered so far
    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn continue_chat(&self, text: &str) -> Result<String> {
        let user_turn = Content::user(vec![Part::Text {
            text: text.to_string(),
        }]);

        let mut contents = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        contents.push(user_turn.clone());

        let request = GenerateContentRequest {
            contents,
            generation_config: Some(GenerationConfig {
                max_output_tokens: self.max_output_tokens,
            }),
        };
        let reply = self.client.generate(&self.model, &request).await?;

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(user_turn);
        history.push(Content::model(&reply));
        Ok(reply)
    }

    async fn generate_content(&self, text: &str, image: &InlineImage) -> Result<String> {
        let mut parts = Vec::new();
        if !text.trim().is_empty() {
            parts.push(Part::Text {
                text: text.to_string(),
            });
        }
        parts.push(Part::InlineData {
            inline_data: InlineDataPayload {
                mime_type: image.media_type.clone(),
                data: image.data.clone(),
            },
        });

        let request = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            generation_config: None,
        };
        self.client.generate(&self.model, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply_body(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    async fn chat_against(server: &MockServer) -> GeminiChat {
        let client = GeminiClient::new("test-key").with_base_url(&server.uri());
        GeminiChat::new(client, "gemini-1.5-flash", 2000)
    }

    async fn request_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.body_json::<Value>().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_continue_chat_carries_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Hi there!")))
            .mount(&server)
            .await;

        let chat = chat_against(&server).await;
        assert_eq!(chat.continue_chat("Hello").await.unwrap(), "Hi there!");
        assert_eq!(chat.continue_chat("Again").await.unwrap(), "Hi there!");
        assert_eq!(chat.history_len(), 4);

        let bodies = request_bodies(&server).await;
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["generationConfig"]["maxOutputTokens"], 2000);

        let second = bodies[1]["contents"].as_array().unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(second[0]["role"], "user");
        assert_eq!(second[0]["parts"][0]["text"], "Hello");
        assert_eq!(second[1]["role"], "model");
        assert_eq!(second[1]["parts"][0]["text"], "Hi there!");
        assert_eq!(second[2]["parts"][0]["text"], "Again");
    }

    #[tokio::test]
    async fn test_generate_content_sends_inline_image_without_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("A cat.")))
            .mount(&server)
            .await;

        let chat = chat_against(&server).await;
        chat.continue_chat("Hello").await.unwrap();

        let image = InlineImage {
            media_type: "image/png".to_string(),
            data: "iVBORw0=".to_string(),
        };
        assert_eq!(chat.generate_content("What is this?", &image).await.unwrap(), "A cat.");
        assert_eq!(chat.history_len(), 2);

        let bodies = request_bodies(&server).await;
        let contents = bodies[1]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["parts"][0]["text"], "What is this?");
        assert_eq!(contents[0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(contents[0]["parts"][1]["inlineData"]["data"], "iVBORw0=");
        assert!(bodies[1].get("generationConfig").is_none());
    }

    #[tokio::test]
    async fn test_generate_content_omits_blank_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("ok")))
            .mount(&server)
            .await;

        let chat = chat_against(&server).await;
        let image = InlineImage {
            media_type: "image/jpeg".to_string(),
            data: "/9j/".to_string(),
        };
        chat.generate_content("  ", &image).await.unwrap();

        let bodies = request_bodies(&server).await;
        let parts = bodies[0]["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].get("inlineData").is_some());
    }

    #[tokio::test]
    async fn test_api_error_leaves_history_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
            })))
            .mount(&server)
            .await;

        let chat = chat_against(&server).await;
        let err = chat.continue_chat("Hello").await.unwrap_err();
        assert!(err.to_string().contains("INVALID_ARGUMENT: API key not valid."));
        assert_eq!(chat.history_len(), 0);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Hello, world");
    }

    #[test]
    fn test_extract_text_without_candidates_fails() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(extract_text(response).is_err());
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }
}
