// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Subscription inspection commands
//!
//! Commands: subscriptions, match

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::process::ExitCode;

use rigwatch_core::domain::subscription::{
    build_subscriptions, matches, SubscriptionOverrides, SubscriptionSet,
};

/// Extra labels layered on top of the derived ones
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Additional label to subscribe to (repeatable)
    #[arg(long = "include", value_name = "LABEL")]
    include: Vec<String>,

    /// Label to drop from the subscription set (repeatable)
    #[arg(long = "exclude", value_name = "LABEL")]
    exclude: Vec<String>,
}

impl OverrideArgs {
    fn subscriptions_for(&self, agent_id: &str) -> SubscriptionSet {
        if self.include.is_empty() && self.exclude.is_empty() {
            return build_subscriptions(agent_id, None);
        }
        let overrides = SubscriptionOverrides {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        };
        build_subscriptions(agent_id, Some(&overrides))
    }
}

#[derive(Args, Debug)]
pub struct SubscriptionsArgs {
    /// Agent identity, e.g. gastown/polecats/nux
    #[arg(value_name = "AGENT_ID")]
    agent_id: String,

    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Agent identity, e.g. gastown/polecats/nux
    #[arg(value_name = "AGENT_ID")]
    agent_id: String,

    /// Labels carried by the advice record
    #[arg(value_name = "LABEL", required = true)]
    labels: Vec<String>,

    #[command(flatten)]
    overrides: OverrideArgs,
}

pub fn list(args: SubscriptionsArgs) -> Result<ExitCode> {
    for label in args.overrides.subscriptions_for(&args.agent_id).iter() {
        println!("{label}");
    }
    Ok(ExitCode::SUCCESS)
}

pub fn check(args: MatchArgs) -> Result<ExitCode> {
    let subscriptions = args.overrides.subscriptions_for(&args.agent_id);

    if matches(&args.labels, &subscriptions) {
        println!("{} {}", "match".green().bold(), args.agent_id);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} {}", "no match".red().bold(), args.agent_id);
        println!("  subscriptions: {}", subscriptions.to_string().dimmed());
        Ok(ExitCode::from(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_are_applied() {
        let args = OverrideArgs {
            include: vec!["team:infra".to_string()],
            exclude: vec!["global".to_string()],
        };
        let subs = args.subscriptions_for("gastown/polecats/nux");
        assert!(subs.contains("team:infra"));
        assert!(!subs.contains("global"));
        assert!(subs.contains("role:polecat"));
    }

    #[test]
    fn test_no_overrides_matches_derived_set() {
        let subs = OverrideArgs::default().subscriptions_for("gastown/crew/joe");
        assert_eq!(subs, build_subscriptions("gastown/crew/joe", None));
    }
}
