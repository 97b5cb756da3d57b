// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Pipeline definition and execution

mod definition;
mod executor;
mod validation;

pub use definition::{
    GuardrailSpec, InputBinding, OutputSchemaSpec, Pipeline, PromptSpec, RetryPolicy, Role, Stage,
};
pub use executor::{ExecutionOptions, PipelineExecutor, RunReport, StageReport};
pub use validation::{PipelineValidator, ValidationResult};
