//! Probe run history, persisted as JSON on disk (spec.md §4.4).
//!
//! The teacher persists its scheduler run log the same way, one JSON file
//! under the config directory rewritten wholesale on every change rather
//! than a database table, because this is operational history a user
//! inspects directly, not data other subsystems query.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::OrchestratorError;

const MAX_RUNS_KEPT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRunHistoryEntry {
    pub started_at: String,
    pub duration_seconds: u64,
    pub total: u32,
    pub success_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    pub status: String,
    pub success_streams: Vec<i64>,
    pub failed_streams: Vec<i64>,
    pub skipped_streams: Vec<i64>,
    pub reordered_channels: Vec<i64>,
    pub sort_config: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    runs: Vec<ProbeRunHistoryEntry>,
}

pub async fn load_history(path: &Path) -> Result<Vec<ProbeRunHistoryEntry>, OrchestratorError> {
    match fs::read_to_string(path).await {
        Ok(raw) => {
            let file: HistoryFile = serde_json::from_str(&raw)?;
            Ok(file.runs)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Prepends `entry` and truncates to the last [`MAX_RUNS_KEPT`] runs.
pub async fn append_history(path: &Path, entry: ProbeRunHistoryEntry) -> Result<(), OrchestratorError> {
    let mut runs = load_history(path).await?;
    runs.insert(0, entry);
    runs.truncate(MAX_RUNS_KEPT);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let serialized = serde_json::to_string_pretty(&HistoryFile { runs })?;
    fs::write(path, serialized).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_for_tests::temp_path;

    mod tempfile_for_tests {
        use std::path::PathBuf;

        pub fn temp_path(name: &str) -> PathBuf {
            std::env::temp_dir().join(format!("iptv-orchestrator-test-{}-{}", std::process::id(), name))
        }
    }

    fn entry(started_at: &str) -> ProbeRunHistoryEntry {
        ProbeRunHistoryEntry {
            started_at: started_at.to_string(),
            duration_seconds: 12,
            total: 5,
            success_count: 4,
            failed_count: 1,
            skipped_count: 0,
            status: "completed".into(),
            success_streams: vec![1, 2, 3, 4],
            failed_streams: vec![5],
            skipped_streams: vec![],
            reordered_channels: vec![10],
            sort_config: Some("quality".into()),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let path = temp_path("missing.json");
        let _ = fs::remove_file(&path).await;
        let runs = load_history(&path).await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let path = temp_path("roundtrip.json");
        let _ = fs::remove_file(&path).await;
        append_history(&path, entry("2026-01-01T00:00:00Z")).await.unwrap();
        let runs = load_history(&path).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].started_at, "2026-01-01T00:00:00Z");
        fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn keeps_only_the_last_five_runs_newest_first() {
        let path = temp_path("truncate.json");
        let _ = fs::remove_file(&path).await;
        for i in 0..8 {
            append_history(&path, entry(&format!("run-{i}"))).await.unwrap();
        }
        let runs = load_history(&path).await.unwrap();
        assert_eq!(runs.len(), MAX_RUNS_KEPT);
        assert_eq!(runs[0].started_at, "run-7");
        fs::remove_file(&path).await.ok();
    }
}
