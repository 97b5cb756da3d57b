// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Rubric types
//!
//! The evaluation rubric is a fixed contract: five named dimensions, each
//! requiring an integer score, a written justification, and supporting
//! evidence citations. Downstream stages depend on all five being present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The five rubric dimensions.
///
/// This set is part of the external contract; the report and notify stages
/// assume every dimension appears in accepted evaluation output. Serialized
/// [`RubricScores`] are keyed by dimension name, so their order is
/// alphabetical, not this one.
pub const RUBRIC_DIMENSIONS: [&str; 5] = [
    "subject_expertise",
    "thought_leadership",
    "speaking_experience",
    "community_engagement",
    "topic_relevance",
];

/// Marker used in place of a citation when research produced nothing usable.
///
/// Sparse evidence is a valid rubric finding, not an error.
pub const INSUFFICIENT_EVIDENCE: &str = "insufficient evidence";

/// Score for a single rubric dimension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DimensionScore {
    /// Integer score (1-10 in the default rubric)
    pub score: i64,

    /// Free-text justification for the score
    pub reasoning: String,

    /// Supporting citations (links or quotes); never empty in accepted output
    pub evidence: Vec<String>,
}

impl DimensionScore {
    /// True when this dimension was scored without usable citations.
    pub fn is_insufficient(&self) -> bool {
        self.evidence.iter().all(|e| e == INSUFFICIENT_EVIDENCE)
    }
}

/// A complete, schema-validated evaluation
///
/// Keyed by dimension name. Uses a `BTreeMap` so serialized output is stable
/// across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RubricScores {
    pub dimensions: BTreeMap<String, DimensionScore>,
}

impl RubricScores {
    /// Get a dimension's score by name
    pub fn get(&self, dimension: &str) -> Option<&DimensionScore> {
        self.dimensions.get(dimension)
    }

    /// Sum of all dimension scores
    pub fn total(&self) -> i64 {
        self.dimensions.values().map(|d| d.score).sum()
    }

    /// Dimensions scored without usable evidence
    pub fn insufficient_dimensions(&self) -> Vec<&str> {
        self.dimensions
            .iter()
            .filter(|(_, d)| d.is_insufficient())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
