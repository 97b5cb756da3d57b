// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Report agent
//!
//! Renders the accepted rubric scores into a human-readable markdown report,
//! preserving every evidence citation.

use async_trait::async_trait;
use std::sync::Arc;

use super::{system_prompt, StageAgent, StageInput, StageOutput};
use crate::errors::EvalflowError;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};
use crate::pipeline::{Role, Stage};

/// Report agent
pub struct ReportAgent {
    backend: Arc<dyn ChatBackend>,
}

impl ReportAgent {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl StageAgent for ReportAgent {
    async fn execute(
        &self,
        stage: &Stage,
        input: &StageInput,
    ) -> Result<StageOutput, EvalflowError> {
        // Prefer the predecessor's structured rubric; fall back to its text
        let scores = match input.prior.as_ref().and_then(|p| p.structured.as_ref()) {
            Some(value) => serde_json::to_string_pretty(value)?,
            None => input.bound_text().to_string(),
        };

        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt(stage)),
            ChatMessage::user(format!(
                "{}\n\nSubject:\n{}\n\nScored rubric:\n{}",
                stage.prompt.instructions, input.subject, scores
            )),
        ]);

        let response = self.backend.complete(request).await?;
        Ok(StageOutput::text(response.text))
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), EvalflowError> {
        if stage.role != Role::Report {
            return Err(EvalflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Expected a report stage".to_string(),
            });
        }
        Ok(())
    }
}
