// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Typed output schemas
//!
//! This module provides the rubric schema that evaluation-stage output must
//! conform to, and the validator that checks raw stage output against it.

mod rubric;
mod validator;

pub use rubric::{DimensionScore, RubricScores, INSUFFICIENT_EVIDENCE, RUBRIC_DIMENSIONS};
pub use validator::{RubricSchema, SchemaViolations};
