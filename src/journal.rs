//! Structured audit events.
//!
//! Per spec.md §1 the journal/audit writer itself is out of scope; this
//! module defines the event shape and an in-process emission trait so
//! the engine, prober, and tracker can record state transitions without
//! depending on a concrete storage backend. [`SqliteJournalSink`] is the
//! one implementation this crate ships, since the `journal_entries` table
//! is listed in spec.md §6.

use async_trait::async_trait;
use serde_json::Value;

use crate::db::models::NewJournalEntry;
use crate::db::schema::journal_entries::table as journal_entries;
use crate::db::DbPool;
use diesel::prelude::*;

/// One audit event. `occurred_at` is filled in by the sink at emission
/// time so that insertion order and timestamp order always agree
/// (spec.md §3's monotonic invariant).
#[derive(Debug)]
pub struct JournalEvent {
    pub event_type: String,
    pub source: String,
    pub source_id: Option<String>,
    pub summary: String,
    pub metadata: Option<Value>,
}

impl JournalEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            source_id: None,
            summary: summary.into(),
            metadata: None,
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[async_trait]
pub trait JournalSink: Send + Sync {
    async fn record(&self, event: JournalEvent) -> Result<(), crate::error::OrchestratorError>;
}

pub struct SqliteJournalSink {
    pool: DbPool,
}

impl SqliteJournalSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JournalSink for SqliteJournalSink {
    async fn record(&self, event: JournalEvent) -> Result<(), crate::error::OrchestratorError> {
        let pool = self.pool.clone();
        let now = crate::time::now_rfc3339();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let row = NewJournalEntry {
                occurred_at: now,
                event_type: event.event_type,
                source: event.source,
                source_id: event.source_id,
                summary: event.summary,
                metadata_json: event.metadata.map(|m| m.to_string()),
            };
            diesel::insert_into(journal_entries)
                .values(&row)
                .execute(&mut conn)?;
            Ok::<_, crate::error::OrchestratorError>(())
        })
        .await
        .map_err(|e| crate::error::OrchestratorError::Config(e.to_string()))??;
        Ok(())
    }
}

/// An in-memory sink used by tests, keeping every recorded event in
/// order for assertion.
/// An in-memory sink used by tests, keeping every recorded event in
/// order for assertion. Not behind `#[cfg(test)]`: integration tests in
/// `tests/` compile the library as an ordinary dependency, so anything
/// test-only needs to be a normal public item, the same way `upstream::fake`
/// ships unconditionally.
pub struct MemoryJournalSink {
    events: std::sync::Mutex<Vec<JournalEvent>>,
}

impl Default for MemoryJournalSink {
    fn default() -> Self {
        Self { events: std::sync::Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl JournalSink for MemoryJournalSink {
    async fn record(&self, event: JournalEvent) -> Result<(), crate::error::OrchestratorError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl MemoryJournalSink {
    pub fn events(&self) -> Vec<JournalEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Clone for JournalEvent {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type.clone(),
            source: self.source.clone(),
            source_id: self.source_id.clone(),
            summary: self.summary.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_records_events_in_order() {
        let sink = MemoryJournalSink::default();
        sink.record(JournalEvent::new("watch:start", "tracker", "c1 started")).await.unwrap();
        sink.record(JournalEvent::new("watch:stop", "tracker", "c1 stopped")).await.unwrap();
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "watch:start");
        assert_eq!(events[1].event_type, "watch:stop");
    }
}
