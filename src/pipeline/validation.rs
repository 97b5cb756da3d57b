// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before execution. Stage order is the
//! execution order; validation enforces the strictly sequential contract at
//! construction time so the executor never has to re-check it.

use std::collections::HashSet;

use crate::errors::EvalflowError;
use crate::pipeline::{GuardrailSpec, Pipeline, Role, Stage};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> Result<ValidationResult, EvalflowError> {
        let mut result = ValidationResult::new();

        // Check for empty stages
        if pipeline.stages.is_empty() {
            result.add_error("Pipeline has no stages defined");
        }

        // Check for duplicate stage names
        let mut seen_names = HashSet::new();
        for stage in &pipeline.stages {
            if !seen_names.insert(&stage.name) {
                result.add_error(&format!("Duplicate stage name: '{}'", stage.name));
            }
        }

        // Validate each stage against its position in the sequence
        for (idx, stage) in pipeline.stages.iter().enumerate() {
            Self::validate_stage(stage, idx, pipeline, &mut result);
        }

        Ok(result)
    }

    /// Validate a single stage
    fn validate_stage(
        stage: &Stage,
        idx: usize,
        pipeline: &Pipeline,
        result: &mut ValidationResult,
    ) {
        // Input binding must respect the sequential contract
        match stage.input.references_stage() {
            Some(from_stage) => {
                if idx == 0 {
                    result.add_error(&format!(
                        "Stage '{}': first stage must bind 'subject', not a prior stage",
                        stage.name
                    ));
                } else {
                    let predecessor = &pipeline.stages[idx - 1].name;
                    if from_stage != predecessor {
                        result.add_error(&format!(
                            "Stage '{}': consumes output of '{}', but its predecessor is '{}'. \
                             A stage may only consume its immediate predecessor's output.",
                            stage.name, from_stage, predecessor
                        ));
                    }
                }

                if pipeline.get_stage(from_stage).is_none() {
                    result.add_error(&format!(
                        "Stage '{}': input references unknown stage '{}'",
                        stage.name, from_stage
                    ));
                }
            }
            None => {
                if !stage.input.is_subject() {
                    result.add_error(&format!(
                        "Stage '{}': unrecognized input binding (expected 'subject' or from_stage)",
                        stage.name
                    ));
                } else if idx > 0 {
                    result.add_warning(&format!(
                        "Stage '{}': binds the run subject instead of its predecessor's output",
                        stage.name
                    ));
                }
            }
        }

        // Prompt must not be empty
        if stage.prompt.instructions.trim().is_empty() {
            result.add_error(&format!("Stage '{}': prompt instructions are empty", stage.name));
        }

        // Guardrail configuration
        match &stage.guardrail {
            Some(GuardrailSpec::Structural { recipient, .. }) => {
                if recipient.trim().is_empty() {
                    result.add_error(&format!(
                        "Stage '{}': structural guardrail has an empty recipient",
                        stage.name
                    ));
                }
            }
            Some(GuardrailSpec::Quality {
                reference,
                failure_threshold,
            }) => {
                if reference.trim().is_empty() {
                    result.add_error(&format!(
                        "Stage '{}': quality guardrail has an empty reference answer",
                        stage.name
                    ));
                }
                if *failure_threshold <= 0.0 {
                    result.add_warning(&format!(
                        "Stage '{}': quality guardrail failure threshold {} rejects every output",
                        stage.name, failure_threshold
                    ));
                }
            }
            None => {}
        }

        // Role-specific expectations
        match stage.role {
            Role::Evaluate => {
                if stage.output_schema.is_none() {
                    result.add_warning(&format!(
                        "Stage '{}': evaluate stage without an output schema - rubric \
                         completeness will not be enforced",
                        stage.name
                    ));
                }
            }
            Role::Notify => {
                if !stage.side_effecting {
                    result.add_warning(&format!(
                        "Stage '{}': notify stage not marked side_effecting - a committed \
                         delivery could be re-invoked",
                        stage.name
                    ));
                }
                if stage.guardrail.is_none() {
                    result.add_warning(&format!(
                        "Stage '{}': notify stage without a guardrail - delivery will not be \
                         verified",
                        stage.name
                    ));
                }
            }
            _ => {}
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
