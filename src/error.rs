//! Crate-wide error types.
//!
//! Most subsystems share the same failure causes (upstream I/O, database
//! I/O, serialization) so they converge on [`OrchestratorError`]. A few
//! subsystems have failure modes that never need to propagate past their
//! own boundary (condition evaluation never fails, for instance) and so
//! have no dedicated error type at all.

use thiserror::Error;

/// Top-level error type returned by the engine, prober, and tracker.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule '{rule}' failed: {cause}")]
    Executor { rule: String, cause: ExecutorError },

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid normalization rule: {0}")]
    InvalidNormalizationRule(String),
}

/// Errors surfaced by [`crate::upstream::UpstreamClient`] implementations.
///
/// A 404 on delete is deliberately not an error variant — clients treat it
/// as success at the call site, per the idempotent-delete contract.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned status {status} for {operation}")]
    Status { status: u16, operation: String },

    #[error("upstream returned an unparseable response for {0}")]
    InvalidResponse(String),

    #[error("entity not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("duplicate entity on create: {kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// `true` for overload-classified failures (HTTP 429 or 5xx), which the
    /// [`crate::prober`] ramp controller treats differently from other
    /// failures.
    pub fn is_overload(&self) -> bool {
        match self {
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::Network(e) => e.is_status() && e.status().map(|s| s.as_u16() >= 500).unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound { .. })
            || matches!(self, UpstreamError::Status { status: 404, .. })
    }
}

/// Errors from a single [`crate::actions::ActionExecutor`] action.
///
/// These are recorded on the per-stream action log rather than aborting a
/// pipeline run; the engine continues with the stream's remaining actions
/// (`stop_processing` excepted).
#[derive(Debug, Error, Clone)]
pub enum ExecutorError {
    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("invalid name_template: {0}")]
    InvalidTemplate(String),

    #[error("invalid channel number spec: {0}")]
    InvalidChannelNumber(String),

    #[error("no channel number available in configured range")]
    NoChannelNumberAvailable,

    #[error("no target channel found for merge")]
    NoMergeTarget,

    #[error("provider stream cap reached for channel {channel_id}")]
    StreamCapReached { channel_id: i64 },

    #[error("referenced entity not yet created in this action chain")]
    NoActiveEntity,

    #[error("epg source has no matching data entry")]
    NoEpgMatch,
}

impl From<UpstreamError> for ExecutorError {
    fn from(e: UpstreamError) -> Self {
        ExecutorError::Upstream(e.to_string())
    }
}
