// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Run command - execute the pipeline for a subject

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::agents::create_default_agents;
use crate::errors::EvalflowError;
use crate::guardrail::{resolve_guardrails, BackendScorer};
use crate::llm::OpenAiBackend;
use crate::pipeline::{ExecutionOptions, Pipeline, PipelineExecutor, PipelineValidator};
use crate::tools::{ExaSearch, SlackMessenger};

/// Credentials for the external collaborators, collected at the CLI boundary
pub struct Credentials {
    pub openai_api_key: String,
    pub exa_api_key: String,
    pub slack_bot_token: String,
}

/// Run the pipeline
#[allow(clippy::too_many_arguments)]
pub async fn run(
    subject: String,
    pipeline_path: PathBuf,
    max_attempts: Option<u32>,
    dry_run: bool,
    credentials: Credentials,
    model: String,
    verbose: bool,
) -> Result<()> {
    // Check pipeline exists
    if !pipeline_path.exists() {
        return Err(EvalflowError::PipelineNotFound {
            path: pipeline_path,
        }
        .into());
    }

    // Load pipeline
    let mut pipeline = Pipeline::from_file(&pipeline_path)
        .map_err(|e| miette::miette!("Failed to load pipeline: {}", e))?;

    if let Some(attempts) = max_attempts {
        pipeline.retry.max_attempts = attempts;
    }

    // Validate pipeline
    let validation = PipelineValidator::validate(&pipeline)
        .map_err(|e| miette::miette!("Validation error: {}", e))?;

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(EvalflowError::InvalidPipeline {
            reason: format!("{} validation error(s)", validation.errors.len()),
            help: Some("Run 'evalflow validate' for the full list".to_string()),
        }
        .into());
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    // Wire up collaborators; credentials are injected here, never read from
    // the environment inside core logic
    let backend = Arc::new(OpenAiBackend::new(credentials.openai_api_key).with_model(&model));
    let research_tool = Arc::new(ExaSearch::new(credentials.exa_api_key));
    let messaging = Arc::new(SlackMessenger::new(credentials.slack_bot_token));
    let scorer = Arc::new(BackendScorer::new(backend.clone()));

    // Guardrails resolve once, at pipeline-construction time
    let guardrails = resolve_guardrails(&pipeline, Some(scorer))
        .map_err(|e| miette::miette!("Guardrail configuration error: {}", e))?;

    let mut executor = PipelineExecutor::new().with_guardrails(guardrails);
    for (role, agent) in create_default_agents(backend, research_tool, messaging) {
        executor.register_agent(role, agent);
    }

    let missing = executor.check_agents(&pipeline);
    if !missing.is_empty() {
        let roles: Vec<_> = missing.iter().map(|r| r.to_string()).collect();
        return Err(miette::miette!(
            "No agent registered for role(s): {}",
            roles.join(", ")
        ));
    }

    let options = ExecutionOptions {
        dry_run,
        verbose,
        quiet: false,
    };

    match executor.execute(&pipeline, &subject, &options).await {
        Ok(run) => {
            println!();
            println!(
                "{}",
                format!(
                    "Pipeline completed successfully in {:.2}s",
                    run.duration.as_secs_f64()
                )
                .green()
            );

            if let Some(output) = run.final_output {
                println!();
                println!("{}:", "Final output".bold());
                println!("{}", output.text);
            }

            Ok(())
        }
        Err(EvalflowError::RetryExhausted {
            stage,
            attempts,
            reason,
        }) => {
            println!();
            eprintln!(
                "{}",
                format!("Stage '{stage}' failed after {attempts} attempt(s)").red().bold()
            );
            eprintln!("  Last rejection: {}", reason.dimmed());
            Err(miette::miette!(
                "Pipeline failed at stage '{stage}' ({attempts} attempts): {reason}"
            ))
        }
        Err(e) => {
            println!();
            Err(miette::miette!("Pipeline execution failed: {}", e))
        }
    }
}
