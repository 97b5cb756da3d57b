// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{Pipeline, PipelineValidator};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    // Check pipeline exists
    if !pipeline_path.exists() {
        return Err(crate::errors::EvalflowError::PipelineNotFound {
            path: pipeline_path,
        }
        .into());
    }

    // Load pipeline
    let pipeline = match Pipeline::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(miette::miette!("Parse error: {}", e));
        }
    };

    println!("  {} Pipeline file is valid YAML", "✓".green());

    // Validate pipeline structure
    let validation = PipelineValidator::validate(&pipeline)
        .map_err(|e| miette::miette!("Validation error: {}", e))?;

    let mut has_issues = false;

    if !validation.errors.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Stages: {}", pipeline.stages.len());
        println!("  Attempt budget: {}", pipeline.retry.max_attempts);
        for stage in &pipeline.stages {
            let input = match stage.input.references_stage() {
                Some(from) => format!(" [input: {from}]"),
                None => " [input: subject]".to_string(),
            };
            println!("    - {} ({}){}", stage.name, stage.role, input.dimmed());
        }
    }

    println!();

    if has_issues {
        if validation.is_valid() {
            println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
            Ok(())
        } else {
            Err(miette::miette!("Pipeline validation failed"))
        }
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
