//! In-memory snapshot of the `tag_groups`/`tags` tables.
//!
//! Loaded once per pipeline run per SPEC_FULL.md §4.1 ("snapshotted once
//! per pipeline run for determinism") and handed to the
//! [`super::condition::ConditionEvaluator`].

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::schema::{tag_groups, tags};
use crate::db::DbPool;
use crate::error::OrchestratorError;
use crate::normalize::{TagEntry, TagMode};

#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    by_group_name: HashMap<String, Vec<TagEntry>>,
}

impl TagRegistry {
    pub fn load(conn: &mut SqliteConnection) -> Result<Self, OrchestratorError> {
        let groups: Vec<(i32, String)> = tag_groups::table
            .select((tag_groups::id, tag_groups::name))
            .load(conn)?;
        let all_tags: Vec<(i32, String, String)> = tags::table
            .select((tags::tag_group_id, tags::value, tags::mode))
            .load(conn)?;

        let mut by_group_name: HashMap<String, Vec<TagEntry>> = HashMap::new();
        for (group_id, group_name) in groups {
            let entries = all_tags
                .iter()
                .filter(|(gid, _, _)| *gid == group_id)
                .filter_map(|(_, value, mode)| {
                    TagMode::parse(mode).map(|mode| TagEntry { value: value.clone(), mode })
                })
                .collect();
            by_group_name.insert(group_name, entries);
        }

        Ok(Self { by_group_name })
    }

    pub fn group_tags(&self, group_name: &str) -> &[TagEntry] {
        self.by_group_name.get(group_name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_returns_empty_slice() {
        let registry = TagRegistry::default();
        assert!(registry.group_tags("missing").is_empty());
    }
}
