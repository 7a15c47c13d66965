//! Request/response shapes and the execution-log entity records that
//! make rollback possible.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OrchestratorError;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub rule_id: Option<i32>,
    pub provider_id: Option<i64>,
    pub dry_run: bool,
    pub triggered_by: String,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self { rule_id: None, provider_id: None, dry_run: false, triggered_by: "manual".to_string() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    pub execution_id: i32,
    pub dry_run: bool,
    pub streams_evaluated: i32,
    pub streams_matched: i32,
    pub channels_created: i32,
    pub channels_updated: i32,
    pub groups_created: i32,
    pub streams_merged: i32,
    pub streams_skipped: i32,
    pub conflicts: i32,
}

/// One entity this execution created or modified, recorded so
/// [`super::AutoCreationEngine::rollback`] can reverse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: String,
    pub entity_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<Value>,
}

/// One entry of the per-stream action log persisted as
/// `execution_log_json`/`dry_run_results_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamLogEntry {
    pub stream_id: i64,
    pub stream_name: String,
    pub rule_id: Option<i32>,
    pub rule_name: Option<String>,
    pub actions: Vec<ActionLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub action_type: String,
    pub success: bool,
    pub description: String,
    pub created: bool,
    pub modified: bool,
    pub skipped: bool,
    pub error: Option<String>,
}

impl From<&crate::actions::ActionResult> for ActionLogEntry {
    fn from(result: &crate::actions::ActionResult) -> Self {
        Self {
            action_type: result.action_type.clone(),
            success: result.success,
            description: result.description.clone(),
            created: result.created,
            modified: result.modified,
            skipped: result.skipped,
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("execution {0} is not eligible for rollback (must be mode=execute, status=completed)")]
    NotRollbackEligible(i32),
}
