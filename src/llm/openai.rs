// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! OpenAI-compatible chat backend
//!
//! Talks to the chat-completions API over reqwest. The API key is injected
//! at construction; nothing in this module reads the process environment.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatBackend, ChatRequest, ChatResponse};
use crate::errors::EvalflowError;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible generation backend
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl OpenAiBackend {
    /// Create a backend with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
        }
    }

    /// Override the model name
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point at an alternative OpenAI-compatible endpoint
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EvalflowError> {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": request.messages,
        });

        if request.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EvalflowError::BackendTimedOut {
                        message: e.to_string(),
                    }
                } else {
                    EvalflowError::BackendUnavailable {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => EvalflowError::BackendRateLimited {
                    message: format!("{status}: {detail}"),
                },
                500..=599 => EvalflowError::BackendUnavailable {
                    message: format!("{status}: {detail}"),
                },
                _ => EvalflowError::BackendRejected {
                    message: format!("{status}: {detail}"),
                },
            });
        }

        let completion: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| EvalflowError::BackendMalformed {
                    message: e.to_string(),
                })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EvalflowError::BackendMalformed {
                message: "completion contained no message content".to_string(),
            })?;

        Ok(ChatResponse { text })
    }
}
