// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Schema validation
//!
//! Checks raw stage output against the rubric schema. Validation is
//! exhaustive: every missing or mistyped field is reported, not just the
//! first, so guardrail messages and retry prompts can name everything that
//! needs fixing. Validation is pure; re-validating an accepted value always
//! accepts.

use serde_json::Value;

use super::rubric::{DimensionScore, RubricScores, RUBRIC_DIMENSIONS};

/// All violations found in a single validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolations {
    pub violations: Vec<String>,
}

impl SchemaViolations {
    pub fn into_messages(self) -> Vec<String> {
        self.violations
    }
}

impl std::fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.violations.join("; "))
    }
}

/// The rubric schema against which evaluation output is validated
#[derive(Debug, Clone)]
pub struct RubricSchema {
    dimensions: Vec<String>,
}

impl RubricSchema {
    /// Schema with the standard five dimensions
    pub fn standard() -> Self {
        Self {
            dimensions: RUBRIC_DIMENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Schema with custom dimension names (dimension set is fixed per pipeline)
    pub fn with_dimensions(dimensions: Vec<String>) -> Self {
        Self { dimensions }
    }

    pub fn dimension_names(&self) -> &[String] {
        &self.dimensions
    }

    /// Validate raw stage output against the rubric.
    ///
    /// No coercion is attempted: a float score, a string score, or a missing
    /// field are all violations. Returns the typed scores on success.
    pub fn validate(&self, raw: &Value) -> Result<RubricScores, SchemaViolations> {
        let mut violations = Vec::new();

        let Some(map) = raw.as_object() else {
            return Err(SchemaViolations {
                violations: vec!["output is not a JSON object".to_string()],
            });
        };

        let mut dimensions = std::collections::BTreeMap::new();

        for name in &self.dimensions {
            let Some(entry) = map.get(name) else {
                violations.push(format!("missing dimension '{name}'"));
                continue;
            };

            match self.validate_dimension(name, entry) {
                Ok(score) => {
                    dimensions.insert(name.clone(), score);
                }
                Err(mut errs) => violations.append(&mut errs),
            }
        }

        for key in map.keys() {
            if !self.dimensions.iter().any(|d| d == key) {
                violations.push(format!("unexpected dimension '{key}'"));
            }
        }

        if violations.is_empty() {
            Ok(RubricScores { dimensions })
        } else {
            Err(SchemaViolations { violations })
        }
    }

    fn validate_dimension(&self, name: &str, entry: &Value) -> Result<DimensionScore, Vec<String>> {
        let mut errs = Vec::new();

        let Some(obj) = entry.as_object() else {
            return Err(vec![format!("dimension '{name}' is not an object")]);
        };

        let score = match obj.get("score") {
            Some(v) => match v.as_i64() {
                Some(n) => Some(n),
                None => {
                    errs.push(format!("dimension '{name}': 'score' must be an integer"));
                    None
                }
            },
            None => {
                errs.push(format!("dimension '{name}': missing 'score'"));
                None
            }
        };

        let reasoning = match obj.get("reasoning") {
            Some(v) => match v.as_str() {
                Some(s) if !s.trim().is_empty() => Some(s.to_string()),
                Some(_) => {
                    errs.push(format!("dimension '{name}': 'reasoning' is empty"));
                    None
                }
                None => {
                    errs.push(format!("dimension '{name}': 'reasoning' must be a string"));
                    None
                }
            },
            None => {
                errs.push(format!("dimension '{name}': missing 'reasoning'"));
                None
            }
        };

        let evidence = match obj.get("evidence") {
            Some(v) => match v.as_array() {
                Some(items) => {
                    let mut citations = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        match item.as_str() {
                            Some(s) => citations.push(s.to_string()),
                            None => errs.push(format!(
                                "dimension '{name}': evidence[{i}] must be a string"
                            )),
                        }
                    }
                    if citations.is_empty() && errs.iter().all(|e| !e.contains("evidence[")) {
                        errs.push(format!("dimension '{name}': 'evidence' must not be empty"));
                    }
                    Some(citations)
                }
                None => {
                    errs.push(format!("dimension '{name}': 'evidence' must be a list"));
                    None
                }
            },
            None => {
                errs.push(format!("dimension '{name}': missing 'evidence'"));
                None
            }
        };

        match (score, reasoning, evidence) {
            (Some(score), Some(reasoning), Some(evidence)) if errs.is_empty() => Ok(DimensionScore {
                score,
                reasoning,
                evidence,
            }),
            _ => Err(errs),
        }
    }
}

impl Default for RubricSchema {
    fn default() -> Self {
        Self::standard()
    }
}
