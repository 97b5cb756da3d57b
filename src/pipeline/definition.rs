// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for .evalflow.yaml files. A pipeline is a declarative
//! descriptor: an ordered stage list with input bindings, prompts, optional
//! output schemas, and optional guardrails. Parsing stays out of the
//! executor; once loaded, the descriptor is immutable.

use serde::{Deserialize, Serialize};

/// Pipeline definition from .evalflow.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Stages in execution order
    pub stages: Vec<Stage>,

    /// Retry policy applied to every stage unless overridden
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_version() -> String {
    "1".to_string()
}

impl Pipeline {
    /// Load pipeline from a YAML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::EvalflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::EvalflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            }
        })?;

        Self::from_yaml(&content)
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, crate::EvalflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> Result<String, crate::EvalflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get all stage names
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Attempt budget for a stage, falling back to the pipeline-wide policy
    pub fn attempts_for(&self, stage: &Stage) -> u32 {
        stage.max_attempts.unwrap_or(self.retry.max_attempts).max(1)
    }

    /// The standard four-stage speaker-evaluation pipeline
    pub fn speaker_evaluation_template(name: &str, recipient: &str) -> Self {
        Self {
            version: default_version(),
            name: name.to_string(),
            description: Some("Research, evaluate, and report on a candidate speaker".into()),
            stages: vec![
                Stage {
                    name: "research".into(),
                    description: Some("Gather evidence about the subject from web sources".into()),
                    role: Role::Research,
                    input: InputBinding::subject(),
                    prompt: PromptSpec {
                        persona: "You are a meticulous web research specialist.".into(),
                        instructions: "Research the subject's professional background, talks, \
                                       publications, and community presence. Compile a brief of \
                                       findings, quoting sources with their URLs."
                            .into(),
                        expected_output: Some(
                            "A sourced evidence brief with one section per finding".into(),
                        ),
                    },
                    output_schema: None,
                    guardrail: None,
                    side_effecting: false,
                    max_attempts: None,
                },
                Stage {
                    name: "evaluate".into(),
                    description: Some("Score the subject against the speaker rubric".into()),
                    role: Role::Evaluate,
                    input: InputBinding::from_stage("research"),
                    prompt: PromptSpec {
                        persona: "You are a conference program committee evaluator.".into(),
                        instructions: "Score the candidate on each rubric dimension using only \
                                       the evidence brief. Where the brief offers nothing for a \
                                       dimension, score it conservatively and cite 'insufficient \
                                       evidence'."
                            .into(),
                        expected_output: Some("Strict JSON keyed by rubric dimension".into()),
                    },
                    output_schema: Some(OutputSchemaSpec::Rubric),
                    guardrail: None,
                    side_effecting: false,
                    max_attempts: None,
                },
                Stage {
                    name: "report".into(),
                    description: Some("Render the scored rubric into a readable report".into()),
                    role: Role::Report,
                    input: InputBinding::from_stage("evaluate"),
                    prompt: PromptSpec {
                        persona: "You are a technical writer for a conference committee.".into(),
                        instructions: "Turn the scored rubric into a markdown report with one \
                                       section per dimension, keeping every evidence citation."
                            .into(),
                        expected_output: Some("A markdown evaluation report".into()),
                    },
                    output_schema: None,
                    guardrail: None,
                    side_effecting: false,
                    max_attempts: None,
                },
                Stage {
                    name: "notify".into(),
                    description: Some("Deliver the report to the review channel".into()),
                    role: Role::Notify,
                    input: InputBinding::from_stage("report"),
                    prompt: PromptSpec {
                        persona: "You are a concise team assistant.".into(),
                        instructions: "Condense the report into a message for the review \
                                       channel. Name the recipient, keep one evidence link per \
                                       dimension, and confirm delivery."
                            .into(),
                        expected_output: Some("A delivery confirmation naming the recipient".into()),
                    },
                    output_schema: None,
                    guardrail: Some(GuardrailSpec::Structural {
                        recipient: recipient.to_string(),
                        require_evidence_links: true,
                    }),
                    side_effecting: true,
                    max_attempts: None,
                },
            ],
            retry: RetryPolicy::default(),
        }
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (must be unique within pipeline)
    pub name: String,

    /// Stage description
    #[serde(default)]
    pub description: Option<String>,

    /// Which agent executes this stage
    pub role: Role,

    /// Input binding (the run subject, or the preceding stage's output)
    pub input: InputBinding,

    /// Prompt configuration for the agent
    pub prompt: PromptSpec,

    /// Schema the raw output must conform to, if any
    #[serde(default)]
    pub output_schema: Option<OutputSchemaSpec>,

    /// Guardrail applied to the (schema-validated) output, if any
    #[serde(default)]
    pub guardrail: Option<GuardrailSpec>,

    /// Stage performs an externally visible, non-idempotent action
    #[serde(default)]
    pub side_effecting: bool,

    /// Per-stage attempt budget override
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Agent roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Research,
    Evaluate,
    Report,
    Notify,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Research => write!(f, "research"),
            Self::Evaluate => write!(f, "evaluate"),
            Self::Report => write!(f, "report"),
            Self::Notify => write!(f, "notify"),
        }
    }
}

/// Input binding for a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBinding {
    /// From previous stage output
    FromStage {
        /// Name of the stage to consume output from
        from_stage: String,
    },

    /// Keyword binding; only "subject" is recognized
    Keyword(String),
}

impl InputBinding {
    /// Binding to the run's subject (first stage)
    pub fn subject() -> Self {
        Self::Keyword("subject".to_string())
    }

    /// Binding to a predecessor's output
    pub fn from_stage(name: &str) -> Self {
        Self::FromStage {
            from_stage: name.to_string(),
        }
    }

    /// Check if this binding references another stage
    pub fn references_stage(&self) -> Option<&str> {
        match self {
            Self::FromStage { from_stage } => Some(from_stage),
            Self::Keyword(_) => None,
        }
    }

    /// True when bound to the run subject
    pub fn is_subject(&self) -> bool {
        matches!(self, Self::Keyword(k) if k == "subject")
    }
}

/// Prompt configuration for a stage agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    /// Who the agent is
    pub persona: String,

    /// What the agent must do with its input
    pub instructions: String,

    /// Shape of the output the agent should produce
    #[serde(default)]
    pub expected_output: Option<String>,
}

/// Output schema declarations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputSchemaSpec {
    /// The five-dimension evaluation rubric
    Rubric,
}

/// Guardrail declarations, resolved once at pipeline construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GuardrailSpec {
    /// Deterministic surface-form check
    Structural {
        /// Recipient the output must name
        recipient: String,

        /// Require at least one evidence link per rubric dimension mentioned
        #[serde(default)]
        require_evidence_links: bool,
    },

    /// Relevance comparison against a reference answer
    Quality {
        /// Reference answer to compare against
        reference: String,

        /// Scores at or above this value reject the output
        failure_threshold: f64,
    },
}

/// Pipeline-wide retry policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum execution attempts per stage
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}
