// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Exa web search tool
//!
//! Calls the Exa search API and returns text snippets with source
//! attribution. An empty result set is returned as-is; callers decide what
//! sparse evidence means.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{Snippet, WebResearch};
use crate::errors::EvalflowError;

const EXA_API_URL: &str = "https://api.exa.ai/search";
const EXA_CONTENTS_URL: &str = "https://api.exa.ai/contents";
const DEFAULT_NUM_RESULTS: u32 = 8;

/// Exa search client
pub struct ExaSearch {
    client: reqwest::Client,
    api_url: String,
    contents_url: String,
    api_key: String,
    num_results: u32,
}

impl ExaSearch {
    /// Create a client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_url: EXA_API_URL.to_string(),
            contents_url: EXA_CONTENTS_URL.to_string(),
            api_key: api_key.into(),
            num_results: DEFAULT_NUM_RESULTS,
        }
    }

    /// Limit the number of results per query
    pub fn with_num_results(mut self, num_results: u32) -> Self {
        self.num_results = num_results;
        self
    }

    /// Point at an alternative search endpoint
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// Point at an alternative contents endpoint
    pub fn with_contents_url(mut self, contents_url: &str) -> Self {
        self.contents_url = contents_url.to_string();
        self
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl WebResearch for ExaSearch {
    async fn search(&self, query: &str) -> Result<Vec<Snippet>, EvalflowError> {
        let body = json!({
            "query": query,
            "numResults": self.num_results,
            "contents": { "text": true },
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvalflowError::ToolFailed {
                tool: "exa-search".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EvalflowError::ToolFailed {
                tool: "exa-search".to_string(),
                message: format!("{status}: {detail}"),
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| EvalflowError::ToolFailed {
                    tool: "exa-search".to_string(),
                    message: format!("malformed response: {e}"),
                })?;

        let snippets = parsed
            .results
            .into_iter()
            .filter_map(|r| {
                r.text.map(|text| Snippet {
                    text,
                    source_url: r.url,
                    title: r.title,
                })
            })
            .collect();

        Ok(snippets)
    }

    async fn fetch(&self, url: &str) -> Result<Option<Snippet>, EvalflowError> {
        let body = json!({
            "urls": [url],
            "text": true,
        });

        let response = self
            .client
            .post(&self.contents_url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvalflowError::ToolFailed {
                tool: "exa-contents".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EvalflowError::ToolFailed {
                tool: "exa-contents".to_string(),
                message: format!("{status}: {detail}"),
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| EvalflowError::ToolFailed {
                    tool: "exa-contents".to_string(),
                    message: format!("malformed response: {e}"),
                })?;

        Ok(parsed.results.into_iter().next().and_then(|r| {
            r.text.map(|text| Snippet {
                text,
                source_url: r.url,
                title: r.title,
            })
        }))
    }
}
