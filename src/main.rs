// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! evalflow - Sequential Agent Pipeline Orchestrator
//!
//! Research, evaluate, report, and deliver - with per-stage guardrails.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evalflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evalflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init { name, recipient } => {
            evalflow::cli::init::run(name, recipient, cli.verbose).await
        }
        Commands::Validate { pipeline } => {
            evalflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Run {
            subject,
            pipeline,
            max_attempts,
            dry_run,
            openai_api_key,
            exa_api_key,
            slack_bot_token,
            model,
        } => {
            evalflow::cli::run::run(
                subject,
                pipeline,
                max_attempts,
                dry_run,
                evalflow::cli::run::Credentials {
                    openai_api_key,
                    exa_api_key,
                    slack_bot_token,
                },
                model,
                cli.verbose,
            )
            .await
        }
    }
}
