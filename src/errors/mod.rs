// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Error types for pipeline orchestration
//!
//! Errors carry enough context to report the failing stage, the number of
//! attempts made, and the last rejection reason without exposing raw
//! collaborator internals.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for evalflow operations
pub type EvalflowResult<T> = Result<T, EvalflowError>;

/// Main error type for evalflow
#[derive(Error, Debug, Diagnostic)]
pub enum EvalflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(evalflow::pipeline_not_found),
        help("Create a pipeline with 'evalflow init' or create .evalflow.yaml manually")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(evalflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Stage '{stage}' is invalid: {reason}")]
    #[diagnostic(code(evalflow::invalid_stage))]
    InvalidStage { stage: String, reason: String },

    #[error("No agent registered for role: {role}")]
    #[diagnostic(
        code(evalflow::agent_not_found),
        help("Available roles: research, evaluate, report, notify")
    )]
    AgentNotFound { role: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Validation / Guardrail Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Stage '{stage}' output failed schema validation")]
    #[diagnostic(code(evalflow::schema_mismatch))]
    SchemaMismatch {
        stage: String,
        /// Every violation found, not just the first
        violations: Vec<String>,
    },

    #[error("Stage '{stage}' output rejected by guardrail: {reason}")]
    #[diagnostic(code(evalflow::guardrail_rejected))]
    GuardrailRejected { stage: String, reason: String },

    #[error("Stage '{stage}' failed after {attempts} attempt(s): {reason}")]
    #[diagnostic(
        code(evalflow::retry_exhausted),
        help("Increase the attempt budget or inspect the stage's prompt and guardrail configuration")
    )]
    RetryExhausted {
        stage: String,
        attempts: u32,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Generation backend unavailable: {message}")]
    #[diagnostic(code(evalflow::backend_unavailable))]
    BackendUnavailable { message: String },

    #[error("Generation backend rate limited: {message}")]
    #[diagnostic(
        code(evalflow::backend_rate_limited),
        help("The request will be retried within the stage's attempt budget")
    )]
    BackendRateLimited { message: String },

    #[error("Generation backend timed out: {message}")]
    #[diagnostic(code(evalflow::backend_timed_out))]
    BackendTimedOut { message: String },

    #[error("Generation backend returned a malformed response: {message}")]
    #[diagnostic(code(evalflow::backend_malformed))]
    BackendMalformed { message: String },

    #[error("Generation backend rejected the request: {message}")]
    #[diagnostic(code(evalflow::backend_rejected))]
    BackendRejected { message: String },

    #[error("Tool '{tool}' failed: {message}")]
    #[diagnostic(code(evalflow::tool_failed))]
    ToolFailed { tool: String, message: String },

    #[error("Delivery to '{recipient}' failed: {reason}")]
    #[diagnostic(code(evalflow::delivery_failed))]
    DeliveryFailed { recipient: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File / IO Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(evalflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(evalflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(evalflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(evalflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(evalflow::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for EvalflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for EvalflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for EvalflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl EvalflowError {
    /// True when the error is worth another attempt within a stage's budget.
    ///
    /// Schema mismatches and guardrail rejections are recovered locally by
    /// re-running the stage; transient collaborator failures likewise consume
    /// an attempt. Everything else escalates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. }
                | Self::GuardrailRejected { .. }
                | Self::BackendUnavailable { .. }
                | Self::BackendRateLimited { .. }
                | Self::BackendTimedOut { .. }
                | Self::ToolFailed { .. }
                | Self::DeliveryFailed { .. }
        )
    }

    /// Short reason string used in retry-exhausted reports.
    pub fn rejection_reason(&self) -> String {
        match self {
            Self::SchemaMismatch { violations, .. } => {
                format!("schema mismatch: {}", violations.join("; "))
            }
            Self::GuardrailRejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Create a schema-mismatch rejection for a stage.
    pub fn schema_mismatch(stage: &str, violations: Vec<String>) -> Self {
        Self::SchemaMismatch {
            stage: stage.to_string(),
            violations,
        }
    }
}
