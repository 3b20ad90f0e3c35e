// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # rigwatch
//!
//! The `rigwatch` binary hosts the advice hook service and the presence
//! tracker, and exposes the subscription matcher for inspection.
//!
//! ## Commands
//!
//! - `rigwatch subscriptions <AGENT_ID>` - Print the labels an agent listens for
//! - `rigwatch match <AGENT_ID> <LABEL>...` - Check whether advice applies to an agent
//! - `rigwatch eval --agent A --trigger T` - Evaluate one session event and print the decision
//! - `rigwatch serve` - Run the subscriber loop and presence reaper until Ctrl-C

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::{EvalArgs, MatchArgs, ServeArgs, SubscriptionsArgs};

/// rigwatch - Advice hooks and presence for agent rigs
#[derive(Parser)]
#[command(name = "rigwatch")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "RIGWATCH_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RIGWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the subscription labels of an agent
    #[command(name = "subscriptions")]
    Subscriptions(SubscriptionsArgs),

    /// Check whether advice carrying the given labels applies to an agent
    #[command(name = "match")]
    Match(MatchArgs),

    /// Evaluate advice hooks for one session event
    #[command(name = "eval")]
    Eval(EvalArgs),

    /// Run the advice subscriber loop and presence reaper
    #[command(name = "serve")]
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Subscriptions(args) => commands::subscriptions::list(args),
        Commands::Match(args) => commands::subscriptions::check(args),
        Commands::Eval(args) => commands::eval::execute(args, cli.config).await,
        Commands::Serve(args) => commands::serve::execute(args, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
