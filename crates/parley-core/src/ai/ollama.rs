use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::model::{ChatModel, InlineImage};

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn chat(&self, request: &OllamaChatRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        let ollama_response: OllamaChatResponse = response.json().await?;
        Ok(ollama_response.message.content)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}

/// A running conversation with a local Ollama model
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
    num_predict: u32,
    history: Mutex<Vec<OllamaMessage>>,
}

impl OllamaChat {
    pub fn new(client: OllamaClient, model: &str, num_predict: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            num_predict,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn request(&self, messages: Vec<OllamaMessage>) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: Some(OllamaOptions {
                num_predict: self.num_predict,
            }),
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn continue_chat(&self, text: &str) -> Result<String> {
        let user_turn = OllamaMessage {
            role: "user".to_string(),
            content: text.to_string(),
            images: Vec::new(),
        };

        let mut messages = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        messages.push(user_turn.clone());

        let reply = self.client.chat(&self.request(messages)).await?;

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(user_turn);
        history.push(OllamaMessage {
            role: "assistant".to_string(),
            content: reply.clone(),
            images: Vec::new(),
        });
        Ok(reply)
    }

    async fn generate_content(&self, text: &str, image: &InlineImage) -> Result<String> {
        // Ollama infers the format from the bytes, so the media type isn't sent
        let message = OllamaMessage {
            role: "user".to_string(),
            content: text.to_string(),
            images: vec![image.data.clone()],
        };
        self.client.chat(&self.request(vec![message])).await
    }
}
