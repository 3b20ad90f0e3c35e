// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Advice Subscriptions
//!
//! Decides which advice records an agent is "listening" for.
//!
//! An agent identity of the form `<rig>/<rolePlural>/<name>` is expanded into a
//! [`SubscriptionSet`], and each advice record's labels are tested against it
//! with [`matches`].
//!
//! ## Label Grammar
//!
//! | Label | Meaning |
//! |-------|---------|
//! | `global` | Every agent subscribes to it |
//! | `rig:<rig>` | Scoped to one rig; must match explicitly |
//! | `role:<role>` | Scoped to a role (plural or singular form) |
//! | `agent:<id>` | Scoped to one agent; must match explicitly |
//! | `g<N>:<label>` | Member of AND-group `N`; groups are OR-ed together |
//!
//! Labels without a group prefix each form their own single-member group.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure label derivation and matching, no I/O

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Label every agent subscribes to.
pub const GLOBAL_LABEL: &str = "global";

/// Scoping prefixes that must be present verbatim in the subscription set.
const REQUIRED_PREFIXES: [&str; 2] = ["rig:", "agent:"];

/// Parsed view of an agent identity string (`<rig>/<rolePlural>/<name>`).
///
/// Identities are not stored anywhere; they are parsed on demand whenever
/// subscription labels need to be derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity<'a> {
    full: &'a str,
    rig: Option<&'a str>,
    role: Option<&'a str>,
}

impl<'a> AgentIdentity<'a> {
    pub fn parse(full: &'a str) -> Self {
        let mut segments = full.split('/');
        let rig = segments.next().filter(|s| !s.is_empty());
        let role = segments.next().filter(|s| !s.is_empty());
        Self { full, rig, role }
    }

    pub fn full(&self) -> &'a str {
        self.full
    }

    pub fn rig(&self) -> Option<&'a str> {
        self.rig
    }

    /// Role segment as written in the identity (usually plural, e.g. `polecats`).
    pub fn role(&self) -> Option<&'a str> {
        self.role
    }

    /// Singular role form, present only when stripping a trailing `s` changes it.
    pub fn singular_role(&self) -> Option<&'a str> {
        self.role
            .and_then(|role| role.strip_suffix('s'))
            .filter(|singular| !singular.is_empty())
    }
}

/// Additive and subtractive label sets layered on top of the derived labels.
///
/// Mirrors the `advice_subscriptions` / `advice_subscriptions_exclude` fields
/// an agent record may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOverrides {
    #[serde(default, rename = "advice_subscriptions")]
    pub include: Vec<String>,
    #[serde(default, rename = "advice_subscriptions_exclude")]
    pub exclude: Vec<String>,
}

/// The set of labels an agent is listening for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionSet(BTreeSet<String>);

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        self.0.insert(label.into())
    }

    pub fn remove(&mut self, label: &str) -> bool {
        self.0.remove(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", labels.join(", "))
    }
}

/// Compute the subscription labels for an agent.
///
/// Always includes `global` and `agent:<id>`. A non-empty first path segment
/// adds `rig:<rig>`; a non-empty second segment adds `role:<role>` and, when a
/// trailing `s` can be stripped, `role:<singular>` as well.
///
/// `overrides.include` is unioned in before the derived labels and
/// `overrides.exclude` is removed from the final set.
pub fn build_subscriptions(
    agent_id: &str,
    overrides: Option<&SubscriptionOverrides>,
) -> SubscriptionSet {
    let mut subs = SubscriptionSet::new();

    if let Some(overrides) = overrides {
        for label in &overrides.include {
            subs.insert(label.as_str());
        }
    }

    let identity = AgentIdentity::parse(agent_id);
    subs.insert(GLOBAL_LABEL);
    subs.insert(format!("agent:{}", identity.full()));

    if let Some(rig) = identity.rig() {
        subs.insert(format!("rig:{rig}"));
    }
    if let Some(role) = identity.role() {
        subs.insert(format!("role:{role}"));
        if let Some(singular) = identity.singular_role() {
            subs.insert(format!("role:{singular}"));
        }
    }

    if let Some(overrides) = overrides {
        for label in &overrides.exclude {
            subs.remove(label);
        }
    }

    subs
}

/// Split `g<digits>:<rest>` into `(digits, rest)`.
fn split_group_label(label: &str) -> Option<(&str, &str)> {
    let after_g = label.strip_prefix('g')?;
    let (digits, rest) = after_g.split_once(':')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits, rest))
}

/// Strip a `g<N>:` group prefix from a label, if present.
///
/// `"g0:role:polecat"` becomes `"role:polecat"`; `"global"` and `"g:bad"` are
/// returned unchanged.
pub fn strip_group_prefix(label: &str) -> &str {
    match split_group_label(label) {
        Some((_, rest)) => rest,
        None => label,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    /// Explicit `g<N>:` group, keyed by its number with leading zeros removed.
    Explicit(&'a str),
    /// An unprefixed label evaluated on its own.
    Singleton(usize),
}

/// Synthetic ids for unprefixed labels start here.
const SINGLETON_GROUP_BASE: usize = 1000;

/// Test whether advice with `advice_labels` applies to `subscriptions`.
///
/// 1. Every `rig:` or `agent:` label (after stripping any group prefix) must
///    be subscribed to, otherwise the advice is rejected outright.
/// 2. Labels are partitioned into groups; a group matches when all of its
///    members are subscribed to, and the advice matches when any group does.
///
/// Advice with no labels never matches.
pub fn matches<S: AsRef<str>>(advice_labels: &[S], subscriptions: &SubscriptionSet) -> bool {
    if advice_labels.is_empty() {
        return false;
    }

    for label in advice_labels {
        let stripped = strip_group_prefix(label.as_ref());
        let required = REQUIRED_PREFIXES.iter().any(|p| stripped.starts_with(p));
        if required && !subscriptions.contains(stripped) {
            return false;
        }
    }

    let mut groups: HashMap<GroupKey<'_>, Vec<&str>> = HashMap::new();
    let mut next_singleton = SINGLETON_GROUP_BASE;
    for label in advice_labels {
        let label = label.as_ref();
        match split_group_label(label) {
            Some((digits, rest)) => {
                let number = digits.trim_start_matches('0');
                let key = GroupKey::Explicit(if number.is_empty() { "0" } else { number });
                groups.entry(key).or_default().push(rest);
            }
            None => {
                groups.insert(GroupKey::Singleton(next_singleton), vec![label]);
                next_singleton += 1;
            }
        }
    }

    groups
        .values()
        .any(|members| members.iter().all(|member| subscriptions.contains(member)))
}
