// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! # evalflow - Sequential Agent Pipeline Orchestrator
//!
//! `evalflow` runs a fixed research → evaluate → report → notify pipeline
//! over an external generation backend, with per-stage schema validation and
//! guardrails.
//!
//! ## Features
//!
//! - **Strictly sequential execution** - each stage consumes only its
//!   immediate predecessor's accepted output
//! - **Typed outputs** - evaluation output is validated against a fixed
//!   five-dimension rubric, with exhaustive diagnostics
//! - **Guardrails** - structural and quality checks gate stage outputs, with
//!   a bounded retry budget per stage
//! - **Narrow collaborator interfaces** - LLM, web research, and messaging
//!   are trait objects with credentials injected at construction
//!
//! ## Quick Start
//!
//! ```bash
//! # Initialize a new project
//! evalflow init my-pipeline
//!
//! # Validate the pipeline file
//! evalflow validate
//!
//! # Evaluate a subject
//! evalflow run --subject "Dr. Jane Doe, ML researcher"
//! ```

pub mod agents;
pub mod cli;
pub mod errors;
pub mod guardrail;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use errors::{EvalflowError, EvalflowResult};
pub use pipeline::{Pipeline, PipelineExecutor, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
