// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Init command - create a new evalflow project

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::pipeline::Pipeline;

/// Run the init command
pub async fn run(name: Option<String>, recipient: String, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-pipeline".to_string())
    });

    println!("{}", "Initializing evalflow project...".bold());
    println!();

    // Check if .evalflow.yaml already exists
    if Path::new(".evalflow.yaml").exists() {
        return Err(miette::miette!(
            ".evalflow.yaml already exists. Remove it first to re-initialize."
        ));
    }

    let pipeline = Pipeline::speaker_evaluation_template(&pipeline_name, &recipient);
    let pipeline_content = pipeline
        .to_yaml()
        .map_err(|e| miette::miette!("Failed to serialize pipeline template: {}", e))?;

    std::fs::write(".evalflow.yaml", &pipeline_content).map_err(|e| {
        crate::errors::EvalflowError::FileWriteError {
            path: ".evalflow.yaml".into(),
            error: e.to_string(),
        }
    })?;

    println!("  {} Created .evalflow.yaml", "✓".green());

    println!();
    println!("{}", "Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to adjust prompts and guardrails", ".evalflow.yaml".cyan());
    println!(
        "  2. Export {}, {}, and {}",
        "OPENAI_API_KEY".cyan(),
        "EXA_API_KEY".cyan(),
        "SLACK_BOT_TOKEN".cyan()
    );
    println!(
        "  3. Run {} to evaluate a subject",
        "evalflow run --subject \"...\"".cyan()
    );
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", pipeline_content.dimmed());
    }

    Ok(())
}
