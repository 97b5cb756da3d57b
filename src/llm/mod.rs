// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Generation backend
//!
//! Narrow interface over the external LLM provider. Agents build a
//! [`ChatRequest`] and receive raw text back; transient transport failures
//! map onto retryable error variants so the pipeline executor can spend its
//! attempt budget on them.

mod openai;

pub use openai::OpenAiBackend;

use async_trait::async_trait;

use crate::errors::EvalflowError;

/// A single chat message
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request to the generation backend
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Ask the backend for a strict-JSON completion
    pub json_output: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            json_output: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Completion returned by the generation backend
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
}

/// Trait for generation backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce a completion for the request
    ///
    /// Unavailability, rate limiting, and timeouts surface as their dedicated
    /// retryable error variants; anything else is fatal to the caller.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EvalflowError>;
}
