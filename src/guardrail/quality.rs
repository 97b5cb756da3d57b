// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Quality guardrail
//!
//! Compares stage output against a reference answer using an external
//! relevance scorer. The verdict maps a score at or above the failure
//! threshold to rejection and anything below it to acceptance.

use async_trait::async_trait;
use std::sync::Arc;

use super::GuardrailVerdict;
use crate::errors::EvalflowError;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};

/// External collaborator that scores output relevance against a reference
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score how far `output` deviates from `reference`, on a 0-10 scale
    async fn score(&self, output: &str, reference: &str) -> Result<f64, EvalflowError>;
}

/// Quality check configuration
pub struct QualityCheck {
    scorer: Arc<dyn RelevanceScorer>,
    reference: String,
    failure_threshold: f64,
}

impl QualityCheck {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, reference: String, failure_threshold: f64) -> Self {
        Self {
            scorer,
            reference,
            failure_threshold,
        }
    }

    /// Evaluate the check over raw output text
    pub async fn check(&self, text: &str) -> Result<GuardrailVerdict, EvalflowError> {
        let score = self.scorer.score(text, &self.reference).await?;

        // Scores at or above the threshold are treated as failures; scores
        // below it pass.
        if score >= self.failure_threshold {
            Ok(GuardrailVerdict::reject(format!(
                "relevance score {score:.1} reached failure threshold {:.1}",
                self.failure_threshold
            )))
        } else {
            Ok(GuardrailVerdict::accept(format!(
                "relevance score {score:.1} below failure threshold {:.1}",
                self.failure_threshold
            )))
        }
    }
}

/// Relevance scorer backed by the generation backend
///
/// Asks the backend to grade the output against the reference and parses a
/// bare number from the reply.
pub struct BackendScorer {
    backend: Arc<dyn ChatBackend>,
}

impl BackendScorer {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RelevanceScorer for BackendScorer {
    async fn score(&self, output: &str, reference: &str) -> Result<f64, EvalflowError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(
                "You grade how far a candidate answer deviates from a reference answer. \
                 Reply with a single number from 0 to 10, where 0 means the candidate \
                 matches the reference and 10 means it bears no relation to it. \
                 Reply with the number only.",
            ),
            ChatMessage::user(format!(
                "Reference answer:\n{reference}\n\nCandidate answer:\n{output}"
            )),
        ]);

        let response = self.backend.complete(request).await?;
        let text = response.text.trim();

        text.parse::<f64>()
            .map_err(|_| EvalflowError::BackendMalformed {
                message: format!("expected a numeric relevance score, got: {text}"),
            })
    }
}
