// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Evaluator agent
//!
//! Scores the subject against the rubric using the research brief as sole
//! evidence. Output is requested as strict JSON; the executor's schema
//! validation decides whether it is accepted. When the brief offers nothing
//! for a dimension, the prompt contract requires a conservative score citing
//! "insufficient evidence" rather than an omission.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{system_prompt, StageAgent, StageInput, StageOutput};
use crate::errors::EvalflowError;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};
use crate::pipeline::{Role, Stage};
use crate::schema::{INSUFFICIENT_EVIDENCE, RUBRIC_DIMENSIONS};

/// Evaluator agent
pub struct EvaluatorAgent {
    backend: Arc<dyn ChatBackend>,
}

impl EvaluatorAgent {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    fn rubric_contract() -> String {
        format!(
            "Score each of these dimensions: {}.\n\
             Reply with a JSON object keyed by dimension name. Every dimension \
             requires: \"score\" (integer 1-10), \"reasoning\" (text), and \
             \"evidence\" (non-empty list of citation strings from the brief). \
             If the brief offers no evidence for a dimension, score it \
             conservatively and use [\"{}\"] as its evidence list. \
             Do not add dimensions beyond the rubric.",
            RUBRIC_DIMENSIONS.join(", "),
            INSUFFICIENT_EVIDENCE
        )
    }

    /// Extract a JSON value from the completion text.
    ///
    /// Backends occasionally wrap JSON in a markdown fence even when asked
    /// not to; strip it before parsing.
    fn parse_structured(text: &str) -> Option<serde_json::Value> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(trimmed);

        serde_json::from_str(inner.trim()).ok()
    }
}

#[async_trait]
impl StageAgent for EvaluatorAgent {
    async fn execute(
        &self,
        stage: &Stage,
        input: &StageInput,
    ) -> Result<StageOutput, EvalflowError> {
        let brief = input.bound_text();

        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt(stage)),
            ChatMessage::user(format!(
                "{}\n\n{}\n\nSubject:\n{}\n\nEvidence brief:\n{}",
                stage.prompt.instructions,
                Self::rubric_contract(),
                input.subject,
                brief
            )),
        ])
        .json();

        let response = self.backend.complete(request).await?;
        let structured = Self::parse_structured(&response.text);

        debug!(
            stage = %stage.name,
            parsed = structured.is_some(),
            "evaluation completion received"
        );

        // An unparsable completion is left unstructured; the executor's
        // schema validation rejects it and spends an attempt on the retry.
        Ok(match structured {
            Some(value) => StageOutput::structured(response.text, value),
            None => StageOutput::text(response.text),
        })
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), EvalflowError> {
        if stage.role != Role::Evaluate {
            return Err(EvalflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Expected an evaluate stage".to_string(),
            });
        }
        Ok(())
    }
}
