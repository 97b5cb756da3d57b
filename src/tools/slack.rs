// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Slack delivery tool
//!
//! Posts messages through the Slack Web API. The bot token is passed in at
//! construction time; a failed delivery (`ok: false`) is an error, never a
//! silent success.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{DeliveryReceipt, Messaging};
use crate::errors::EvalflowError;

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Slack messaging client
pub struct SlackMessenger {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

impl SlackMessenger {
    /// Create a client with the given bot token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_url: SLACK_POST_MESSAGE_URL.to_string(),
            bot_token: bot_token.into(),
        }
    }

    /// Point at an alternative endpoint
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl Messaging for SlackMessenger {
    async fn send(&self, recipient: &str, body: &str) -> Result<DeliveryReceipt, EvalflowError> {
        let payload = json!({
            "channel": recipient,
            "text": body,
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| EvalflowError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvalflowError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let parsed: PostMessageResponse =
            response
                .json()
                .await
                .map_err(|e| EvalflowError::DeliveryFailed {
                    recipient: recipient.to_string(),
                    reason: format!("malformed response: {e}"),
                })?;

        if !parsed.ok {
            return Err(EvalflowError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(DeliveryReceipt {
            recipient: recipient.to_string(),
            timestamp: parsed.ts.unwrap_or_default(),
        })
    }
}
