// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Stage agents
//!
//! This module provides the agent trait and the implementations for the four
//! pipeline roles (research, evaluate, report, notify). Agents are the opaque
//! execution units the pipeline executor invokes; each produces raw output
//! that is then schema-validated and guardrailed before being accepted.

mod evaluator;
mod notifier;
mod reporter;
mod research;

pub use evaluator::EvaluatorAgent;
pub use notifier::NotifierAgent;
pub use reporter::ReportAgent;
pub use research::ResearchAgent;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::EvalflowError;
use crate::llm::ChatBackend;
use crate::pipeline::{Role, Stage};
use crate::tools::{Messaging, WebResearch};

/// Input handed to a stage agent
///
/// Carries the run's subject and, for every stage after the first, the
/// accepted output of the immediately preceding stage. No other stage output
/// is ever visible.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// Free-form description of the subject under evaluation
    pub subject: String,

    /// Accepted output of the immediately preceding stage
    pub prior: Option<StageOutput>,
}

impl StageInput {
    /// Input for the first stage of a run
    pub fn initial(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            prior: None,
        }
    }

    /// Input for a downstream stage, bound to its predecessor's output
    pub fn from_prior(subject: &str, prior: StageOutput) -> Self {
        Self {
            subject: subject.to_string(),
            prior: Some(prior),
        }
    }

    /// Text of the predecessor's output, or the subject for the first stage
    pub fn bound_text(&self) -> &str {
        match &self.prior {
            Some(output) => &output.text,
            None => &self.subject,
        }
    }
}

/// Raw result of one stage execution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    /// Textual output
    pub text: String,

    /// Structured output, when the stage produces one
    pub structured: Option<Value>,
}

impl StageOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    pub fn structured(text: impl Into<String>, value: Value) -> Self {
        Self {
            text: text.into(),
            structured: Some(value),
        }
    }
}

/// Trait for stage agents
#[async_trait]
pub trait StageAgent: Send + Sync {
    /// Execute one attempt of a stage
    ///
    /// # Arguments
    /// * `stage` - The stage configuration
    /// * `input` - The subject plus the predecessor's accepted output (if any)
    async fn execute(&self, stage: &Stage, input: &StageInput)
        -> Result<StageOutput, EvalflowError>;

    /// Validate stage configuration against this agent's requirements
    fn validate_stage(&self, stage: &Stage) -> Result<(), EvalflowError>;
}

/// Build the system prompt for a stage from its prompt spec.
///
/// The current date is injected so agents can judge recency of evidence.
pub(crate) fn system_prompt(stage: &Stage) -> String {
    let mut prompt = format!(
        "{}\nCurrent date: {}.",
        stage.prompt.persona,
        chrono::Utc::now().format("%Y-%m-%d")
    );

    if let Some(expected) = &stage.prompt.expected_output {
        prompt.push_str(&format!("\nExpected output: {expected}"));
    }

    prompt
}

/// Create the standard agent set for the speaker-evaluation pipeline
pub fn create_default_agents(
    backend: Arc<dyn ChatBackend>,
    research_tool: Arc<dyn WebResearch>,
    messaging: Arc<dyn Messaging>,
) -> HashMap<Role, Box<dyn StageAgent>> {
    let mut agents: HashMap<Role, Box<dyn StageAgent>> = HashMap::new();

    agents.insert(
        Role::Research,
        Box::new(ResearchAgent::new(backend.clone(), research_tool)),
    );
    agents.insert(Role::Evaluate, Box::new(EvaluatorAgent::new(backend.clone())));
    agents.insert(Role::Report, Box::new(ReportAgent::new(backend.clone())));
    agents.insert(Role::Notify, Box::new(NotifierAgent::new(backend, messaging)));

    agents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_text_uses_subject_for_first_stage() {
        let input = StageInput::initial("Dr. Jane Doe, ML researcher");
        assert_eq!(input.bound_text(), "Dr. Jane Doe, ML researcher");
    }

    #[test]
    fn test_bound_text_uses_predecessor_output() {
        let prior = StageOutput::text("research brief");
        let input = StageInput::from_prior("Dr. Jane Doe", prior);
        assert_eq!(input.bound_text(), "research brief");
    }
}
