// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Guardrails
//!
//! A guardrail is a validation check applied to a stage's output before it is
//! accepted downstream. Two kinds exist: structural checks over the surface
//! form of the output, and quality checks that consult an external relevance
//! scorer. The executor dispatches both uniformly and only ever sees the
//! verdict.

mod quality;
mod structural;

pub use quality::{BackendScorer, QualityCheck, RelevanceScorer};
pub use structural::StructuralCheck;

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::StageOutput;
use crate::errors::EvalflowError;
use crate::pipeline::{GuardrailSpec, Pipeline};

/// Accept/reject decision for one stage output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailVerdict {
    pub accepted: bool,
    pub message: String,
}

impl GuardrailVerdict {
    pub fn accept(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// A resolved guardrail, dispatched uniformly by the executor
pub enum Guardrail {
    /// Deterministic check over the output's surface form
    Structural(StructuralCheck),
    /// Relevance comparison against a reference answer
    Quality(QualityCheck),
}

impl std::fmt::Debug for Guardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural(_) => f.write_str("Guardrail::Structural"),
            Self::Quality(_) => f.write_str("Guardrail::Quality"),
        }
    }
}

impl Guardrail {
    /// Evaluate the guardrail over a stage output
    pub async fn check(&self, output: &StageOutput) -> Result<GuardrailVerdict, EvalflowError> {
        match self {
            Self::Structural(check) => Ok(check.check(&output.text)),
            Self::Quality(check) => check.check(&output.text).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Structural(_) => "structural",
            Self::Quality(_) => "quality",
        }
    }
}

/// Resolve every declared guardrail in a pipeline.
///
/// Resolution happens once, at pipeline-construction time; specs are not
/// re-inspected per call. A quality guardrail requires a scorer collaborator.
pub fn resolve_guardrails(
    pipeline: &Pipeline,
    scorer: Option<Arc<dyn RelevanceScorer>>,
) -> Result<HashMap<String, Guardrail>, EvalflowError> {
    let mut guardrails = HashMap::new();

    for stage in &pipeline.stages {
        let Some(spec) = &stage.guardrail else {
            continue;
        };

        let guardrail = match spec {
            GuardrailSpec::Structural {
                recipient,
                require_evidence_links,
            } => Guardrail::Structural(StructuralCheck::new(
                recipient.clone(),
                *require_evidence_links,
            )),
            GuardrailSpec::Quality {
                reference,
                failure_threshold,
            } => {
                let scorer = scorer.clone().ok_or_else(|| EvalflowError::InvalidStage {
                    stage: stage.name.clone(),
                    reason: "quality guardrail declared but no relevance scorer configured".into(),
                })?;
                Guardrail::Quality(QualityCheck::new(scorer, reference.clone(), *failure_threshold))
            }
        };

        guardrails.insert(stage.name.clone(), guardrail);
    }

    Ok(guardrails)
}
