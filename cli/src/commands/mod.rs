// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for rigwatch CLI

pub mod eval;
pub mod serve;
pub mod subscriptions;

pub use self::eval::EvalArgs;
pub use self::serve::ServeArgs;
pub use self::subscriptions::{MatchArgs, SubscriptionsArgs};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use rigwatch_core::infrastructure::InMemoryAdviceStore;

/// Seed the in-memory advice store from a YAML file, or start empty.
pub(crate) fn load_advice_store(path: Option<&Path>) -> Result<InMemoryAdviceStore> {
    let Some(path) = path else {
        warn!("No advice file configured, advice store is empty");
        return Ok(InMemoryAdviceStore::new());
    };

    let store = InMemoryAdviceStore::from_yaml_file(path)
        .with_context(|| format!("Failed to load advice file {}", path.display()))?;
    info!(path = %path.display(), records = store.len(), "Loaded advice file");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_advice_store_without_file_is_empty() {
        let store = load_advice_store(None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_advice_store_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- id: gt-1
  title: Run tests
  labels: [global]
  fields:
    hook_command: "make test"
    hook_trigger: before-push
"#
        )
        .unwrap();

        let store = load_advice_store(Some(file.path())).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_advice_store_missing_file_names_path() {
        let err = load_advice_store(Some(Path::new("/nonexistent/advice.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/advice.yaml"));
    }
}
