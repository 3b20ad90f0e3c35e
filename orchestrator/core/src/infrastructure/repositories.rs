// Copyright (c) 2026 Rigwatch Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

use crate::domain::advice::Bead;
use crate::domain::repository::{AdviceStore, RepositoryError};

/// Advice store held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdviceStore {
    beads: Arc<RwLock<Vec<Bead>>>,
}

impl InMemoryAdviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_beads(beads: Vec<Bead>) -> Self {
        Self {
            beads: Arc::new(RwLock::new(beads)),
        }
    }

    /// Load a YAML list of beads.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let beads: Vec<Bead> = serde_yaml::from_str(yaml)?;
        Ok(Self::with_beads(beads))
    }

    /// Insert or replace a bead by id. Replacements keep their position.
    pub fn upsert(&self, bead: Bead) {
        let mut beads = self.beads.write();
        match beads.iter_mut().find(|b| b.id == bead.id) {
            Some(existing) => *existing = bead,
            None => beads.push(bead),
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut beads = self.beads.write();
        let before = beads.len();
        beads.retain(|b| b.id != id);
        beads.len() != before
    }

    pub fn len(&self) -> usize {
        self.beads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.beads.read().is_empty()
    }
}

#[async_trait]
impl AdviceStore for InMemoryAdviceStore {
    async fn list_candidates(
        &self,
        category: &str,
        status: &str,
    ) -> Result<Vec<Bead>, RepositoryError> {
        let beads = self.beads.read();
        Ok(beads
            .iter()
            .filter(|b| b.category == category && b.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advice::{ADVICE_CATEGORY, OPEN_STATUS};

    const SEED: &str = r#"
- id: gt-1
  title: Run tests
  labels: [global]
  fields:
    hook_command: make test
    hook_trigger: before-push
    hook_on_failure: block
- id: gt-2
  title: Closed advice
  status: closed
  labels: [global]
- id: gt-3
  title: An agent record
  category: agent
  labels: []
"#;

    #[tokio::test]
    async fn test_list_candidates_filters_and_keeps_order() {
        let store = InMemoryAdviceStore::from_yaml_str(SEED).unwrap();
        store.upsert(Bead {
            id: "gt-4".to_string(),
            title: "Later".to_string(),
            category: ADVICE_CATEGORY.to_string(),
            status: OPEN_STATUS.to_string(),
            labels: vec![],
            fields: serde_json::Value::Null,
        });

        let beads = store.list_candidates(ADVICE_CATEGORY, OPEN_STATUS).await.unwrap();
        let ids: Vec<&str> = beads.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["gt-1", "gt-4"]);
        assert_eq!(beads[0].fields["hook_command"], "make test");
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place_and_remove() {
        let store = InMemoryAdviceStore::from_yaml_str(SEED).unwrap();
        let mut replacement = store
            .list_candidates(ADVICE_CATEGORY, OPEN_STATUS)
            .await
            .unwrap()[0]
            .clone();
        replacement.title = "Run all tests".to_string();
        store.upsert(replacement);
        assert_eq!(store.len(), 3);

        let beads = store.list_candidates(ADVICE_CATEGORY, OPEN_STATUS).await.unwrap();
        assert_eq!(beads[0].title, "Run all tests");

        assert!(store.remove("gt-1"));
        assert!(!store.remove("gt-1"));
        assert!(store.list_candidates(ADVICE_CATEGORY, OPEN_STATUS).await.unwrap().is_empty());
    }
}
