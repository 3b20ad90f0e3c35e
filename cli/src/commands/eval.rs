// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! One-shot advice hook evaluation
//!
//! Builds a session event from the command line, runs every applicable hook
//! and prints the resulting `HookResponse` as JSON. Exits 2 when blocked.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rigwatch_core::application::AdviceHookService;
use rigwatch_core::domain::advice::HookTrigger;
use rigwatch_core::domain::events::SessionEvent;
use rigwatch_core::domain::node_config::NodeConfig;
use rigwatch_core::infrastructure::ShellHookExecutor;

use super::load_advice_store;

/// Exit status reported when a hook blocked the session.
const BLOCKED_EXIT_CODE: u8 = 2;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Agent identity, e.g. gastown/polecats/nux
    #[arg(long = "agent", value_name = "AGENT_ID")]
    agent: String,

    /// Lifecycle point (session-end, before-commit, before-push, before-handoff)
    #[arg(long, value_name = "TRIGGER")]
    trigger: String,

    /// Working directory for the hooks
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Advice file (overrides advice.advice_file from config)
    #[arg(long, value_name = "FILE")]
    advice_file: Option<PathBuf>,
}

pub async fn execute(args: EvalArgs, config_override: Option<PathBuf>) -> Result<ExitCode> {
    let config =
        NodeConfig::load_or_default(config_override).context("Failed to load configuration")?;

    if args.trigger.parse::<HookTrigger>().is_err() {
        eprintln!(
            "{} unknown trigger '{}', no advice will fire",
            "warning:".yellow().bold(),
            args.trigger
        );
    }

    let advice_file = args.advice_file.or(config.advice.advice_file);
    let store = load_advice_store(advice_file.as_deref())?;
    let service = AdviceHookService::new(Arc::new(store), Arc::new(ShellHookExecutor::new()));

    let mut event = SessionEvent::new(args.agent, args.trigger);
    if let Some(cwd) = args.cwd {
        event = event.with_cwd(cwd.display().to_string());
    }

    // Ctrl-C kills the in-flight hook instead of the whole process.
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, cancelling running hook");
                cancel.cancel();
            }
        })
    };

    let response = service.handle_session_event(&cancel, &event).await;
    interrupt.abort();

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize hook response")?
    );

    if response.block {
        Ok(ExitCode::from(BLOCKED_EXIT_CODE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
