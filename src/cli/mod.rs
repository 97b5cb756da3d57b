// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for evalflow. Credentials are accepted
//! here (flags with environment fallback) and injected into collaborator
//! constructors; nothing below the CLI reads the process environment.

pub mod init;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sequential agent-pipeline orchestrator
///
/// Research, evaluate, report, and deliver - with guardrails.
#[derive(Parser, Debug)]
#[clap(
    name = "evalflow",
    version,
    about = "Sequential agent pipeline for subject research, evaluation, and report delivery",
    long_about = None,
    after_help = "Examples:\n\
        evalflow init                        Initialize a new project\n\
        evalflow validate                    Check the pipeline file\n\
        evalflow run --subject \"Jane Doe\"    Execute the pipeline\n\n\
        See 'evalflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new evalflow project
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Recipient the notify stage delivers to
        #[clap(short, long, default_value = "#speaker-review")]
        recipient: String,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = ".evalflow.yaml")]
        pipeline: PathBuf,
    },

    /// Run the pipeline for a subject
    Run {
        /// Subject to research and evaluate
        #[clap(short, long)]
        subject: String,

        /// Pipeline file
        #[clap(short, long, default_value = ".evalflow.yaml")]
        pipeline: PathBuf,

        /// Override the attempt budget for every stage
        #[clap(long)]
        max_attempts: Option<u32>,

        /// Dry run (show the execution plan only)
        #[clap(long)]
        dry_run: bool,

        /// OpenAI-compatible API key
        #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_api_key: String,

        /// Exa search API key
        #[clap(long, env = "EXA_API_KEY", hide_env_values = true)]
        exa_api_key: String,

        /// Slack bot token for the notify stage
        #[clap(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
        slack_bot_token: String,

        /// Model name for the generation backend
        #[clap(long, default_value = "gpt-4.1-mini")]
        model: String,
    },
}
