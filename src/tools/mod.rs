// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! External tool collaborators
//!
//! Narrow interfaces for the web research and messaging side-channels.
//! Credentials are injected at construction; core logic never performs
//! implicit process-wide lookups.

mod slack;
mod web;

pub use slack::SlackMessenger;
pub use web::ExaSearch;

use async_trait::async_trait;

use crate::errors::EvalflowError;

/// One piece of evidence retrieved from the web
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snippet {
    /// Extracted text
    pub text: String,

    /// Where the text came from
    pub source_url: String,

    /// Page or document title, when known
    pub title: Option<String>,
}

/// Trait for web research tools
#[async_trait]
pub trait WebResearch: Send + Sync {
    /// Search the web for a query
    ///
    /// Empty results are a valid outcome, not an error; evaluation stages
    /// must tolerate sparse evidence.
    async fn search(&self, query: &str) -> Result<Vec<Snippet>, EvalflowError>;

    /// Fetch the page content at a URL
    ///
    /// Returns `Ok(None)` when the page yields no usable text.
    async fn fetch(&self, url: &str) -> Result<Option<Snippet>, EvalflowError>;
}

/// Receipt for a delivered message
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub recipient: String,
    pub timestamp: String,
}

/// Trait for messaging delivery tools
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Deliver a message body to a recipient
    ///
    /// Delivery failure is surfaced as an error, never swallowed.
    async fn send(&self, recipient: &str, body: &str) -> Result<DeliveryReceipt, EvalflowError>;
}
