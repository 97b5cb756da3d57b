// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Structural guardrail
//!
//! Deterministic checks over the surface form of a stage's output. No
//! external calls; the verdict depends only on the output text. Used to gate
//! the notify stage: the message must confirm delivery to the named
//! recipient and, when configured, carry supporting evidence links.

use regex::Regex;

use super::GuardrailVerdict;
use crate::schema::RUBRIC_DIMENSIONS;

/// Markers a delivery confirmation is expected to contain
const DELIVERY_MARKERS: [&str; 4] = ["delivered", "sent", "posted", "notified"];

/// Structural check configuration
pub struct StructuralCheck {
    recipient: String,
    require_evidence_links: bool,
    link_pattern: Regex,
}

impl StructuralCheck {
    pub fn new(recipient: String, require_evidence_links: bool) -> Self {
        Self {
            recipient,
            require_evidence_links,
            // Anything that looks like a web citation
            link_pattern: Regex::new(r"https?://[^\s)>\]]+").expect("invalid link pattern"),
        }
    }

    /// Evaluate the check over raw output text
    pub fn check(&self, text: &str) -> GuardrailVerdict {
        let lowered = text.to_lowercase();
        let mut problems = Vec::new();

        if !lowered.contains(&self.recipient.to_lowercase()) {
            problems.push(format!("output does not name the recipient '{}'", self.recipient));
        }

        if !DELIVERY_MARKERS.iter().any(|m| lowered.contains(m)) {
            problems.push("output contains no delivery confirmation".to_string());
        }

        if self.require_evidence_links {
            if !self.link_pattern.is_match(text) {
                problems.push("output references no supporting evidence links".to_string());
            } else {
                for section in self.dimension_sections_without_links(text) {
                    problems.push(format!("no evidence link under dimension '{section}'"));
                }
            }
        }

        if problems.is_empty() {
            GuardrailVerdict::accept(format!("message confirmed delivered to {}", self.recipient))
        } else {
            GuardrailVerdict::reject(problems.join("; "))
        }
    }

    /// Dimension headings present in the text whose section carries no link.
    ///
    /// Only dimensions the output actually mentions are checked; the schema
    /// validator, not this guardrail, enforces that all five exist upstream.
    fn dimension_sections_without_links(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();

        let mut headings: Vec<(usize, String)> = RUBRIC_DIMENSIONS
            .iter()
            .filter_map(|name| {
                let heading = name.replace('_', " ");
                lowered.find(&heading).map(|pos| (pos, heading))
            })
            .collect();
        headings.sort_by_key(|(pos, _)| *pos);

        let mut missing = Vec::new();
        for (i, (start, heading)) in headings.iter().enumerate() {
            let end = headings
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(lowered.len());
            let section = &lowered[*start..end];
            if !self.link_pattern.is_match(section) {
                missing.push(heading.clone());
            }
        }

        missing
    }
}
