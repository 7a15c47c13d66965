//! The outbound notification contract.
//!
//! spec.md §6 specifies only the dispatch contract; delivery channels
//! (email/Discord/Telegram) are out of scope. [`JournalNotificationSink`]
//! is the one concrete implementation this crate ships: it writes every
//! notification through to the journal and rate-limits per source,
//! resolving the "per-source or global" open question in DESIGN.md.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OrchestratorError;
use crate::journal::{JournalEvent, JournalSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        source: &str,
        source_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<i64, OrchestratorError>;

    async fn update(
        &self,
        id: i64,
        notification_type: NotificationType,
        message: &str,
        metadata: Option<Value>,
    ) -> Result<(), OrchestratorError>;

    async fn delete_by_source(&self, source: &str) -> Result<u32, OrchestratorError>;
}

struct RateLimitState {
    next_id: i64,
    last_emitted: HashMap<String, Instant>,
    live: HashMap<i64, String>,
}

/// Rate-limited per `source` (not globally): each subsystem — prober,
/// tracker, engine — is its own notification source per spec.md §6, so a
/// noisy prober run must not suppress the tracker's notifications.
pub struct JournalNotificationSink<J: JournalSink> {
    journal: J,
    min_interval: Duration,
    state: Mutex<RateLimitState>,
}

impl<J: JournalSink> JournalNotificationSink<J> {
    pub fn new(journal: J, min_interval: Duration) -> Self {
        Self {
            journal,
            min_interval,
            state: Mutex::new(RateLimitState {
                next_id: 1,
                last_emitted: HashMap::new(),
                live: HashMap::new(),
            }),
        }
    }

    fn rate_limited(&self, source: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        if let Some(last) = state.last_emitted.get(source) {
            if now.duration_since(*last) < self.min_interval {
                return true;
            }
        }
        state.last_emitted.insert(source.to_string(), now);
        false
    }
}

#[async_trait]
impl<J: JournalSink> NotificationSink for JournalNotificationSink<J> {
    async fn create(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        source: &str,
        source_id: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<i64, OrchestratorError> {
        if self.rate_limited(source) {
            return Ok(-1);
        }

        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.live.insert(id, source.to_string());
            id
        };

        let mut event = JournalEvent::new(
            format!("notify:{}", notification_type.as_str()),
            source,
            format!("{title}: {message}"),
        );
        if let Some(sid) = source_id {
            event = event.with_source_id(sid);
        }
        if let Some(m) = metadata {
            event = event.with_metadata(m);
        }
        self.journal.record(event).await?;
        Ok(id)
    }

    async fn update(
        &self,
        id: i64,
        notification_type: NotificationType,
        message: &str,
        metadata: Option<Value>,
    ) -> Result<(), OrchestratorError> {
        let source = {
            let state = self.state.lock().unwrap();
            state.live.get(&id).cloned()
        };
        let Some(source) = source else {
            return Ok(());
        };

        let mut event = JournalEvent::new(
            format!("notify:{}", notification_type.as_str()),
            source,
            message.to_string(),
        )
        .with_source_id(id.to_string());
        if let Some(m) = metadata {
            event = event.with_metadata(m);
        }
        self.journal.record(event).await
    }

    async fn delete_by_source(&self, source: &str) -> Result<u32, OrchestratorError> {
        let mut state = self.state.lock().unwrap();
        let before = state.live.len();
        state.live.retain(|_, s| s != source);
        Ok((before - state.live.len()) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournalSink;

    #[tokio::test]
    async fn first_notification_always_emits() {
        let sink = JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(5));
        let id = sink
            .create(NotificationType::Info, "Probe started", "8 streams", "prober", None, None)
            .await
            .unwrap();
        assert!(id > 0);
    }

    #[tokio::test]
    async fn rapid_repeats_from_same_source_are_rate_limited() {
        let sink = JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(60));
        let first = sink.create(NotificationType::Info, "a", "a", "prober", None, None).await.unwrap();
        let second = sink.create(NotificationType::Info, "b", "b", "prober", None, None).await.unwrap();
        assert!(first > 0);
        assert_eq!(second, -1);
    }

    #[tokio::test]
    async fn different_sources_are_independent() {
        let sink = JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(60));
        let prober_id = sink.create(NotificationType::Info, "a", "a", "prober", None, None).await.unwrap();
        let tracker_id = sink.create(NotificationType::Info, "b", "b", "tracker", None, None).await.unwrap();
        assert!(prober_id > 0);
        assert!(tracker_id > 0);
    }

    #[tokio::test]
    async fn delete_by_source_counts_removed() {
        let sink = JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(60));
        sink.create(NotificationType::Info, "a", "a", "prober", None, None).await.unwrap();
        let removed = sink.delete_by_source("prober").await.unwrap();
        assert_eq!(removed, 1);
    }
}
