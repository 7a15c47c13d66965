//! The bandwidth and watch tracker (spec.md §4.5).
//!
//! Supervision mirrors the teacher's `scheduler::EpgScheduler`: a handle
//! holding an optional `JoinHandle` behind a lock, `start`/`stop` that are
//! safe to call repeatedly, and a `tokio::time::interval` loop inside the
//! spawned task rather than a cron expression, since this job runs on a
//! short fixed cadence instead of a daily schedule.

pub mod repo;
pub mod sample;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::SharedConfig;
use crate::db::models::{
    BandwidthDailyUpsert, ChannelBandwidthUpdate, ChannelWatchStatsUpsert, NewChannelBandwidth,
    NewUniqueClientConnection, UniqueClientConnectionUpdate,
};
use crate::db::DbPool;
use crate::error::OrchestratorError;
use crate::journal::{JournalEvent, JournalSink};
use crate::notify::{NotificationSink, NotificationType};
use crate::upstream::UpstreamClient;

use repo::{BandwidthDailyRepo, ChannelBandwidthRepo, ConnectionRepo, WatchStatsRepo};
use sample::{diff, ConnectionChange, PollSnapshot};

const NAME_CACHE_REFRESH: Duration = Duration::from_secs(5 * 60);

struct NameCache {
    names: HashMap<i64, String>,
    last_refreshed: tokio::time::Instant,
}

/// Long-lived polling loop. Constructed once and shared via `Arc`; `start`
/// spawns the loop, `stop` aborts it, both are idempotent.
pub struct BandwidthTracker {
    client: Arc<dyn UpstreamClient>,
    pool: DbPool,
    config: SharedConfig,
    journal: Arc<dyn JournalSink>,
    notifier: Arc<dyn NotificationSink>,
    last_snapshot: Mutex<PollSnapshot>,
    name_cache: Mutex<NameCache>,
    handle: RwLock<Option<JoinHandle<()>>>,
}

impl BandwidthTracker {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        pool: DbPool,
        config: SharedConfig,
        journal: Arc<dyn JournalSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            client,
            pool,
            config,
            journal,
            notifier,
            last_snapshot: Mutex::new(PollSnapshot::default()),
            name_cache: Mutex::new(NameCache { names: HashMap::new(), last_refreshed: tokio::time::Instant::now() - NAME_CACHE_REFRESH }),
            handle: RwLock::new(None),
        }
    }

    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.handle.write().await;
        if guard.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { this.run_loop().await }));
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.handle.write().await.take() {
            handle.abort();
        }
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let poll_interval = self.config.read().await.poll_interval_secs;
            if let Err(e) = self.tick().await {
                tracing::warn!("bandwidth tracker tick failed: {e}");
            }
            tokio::time::sleep(Duration::from_secs(poll_interval)).await;
        }
    }

    async fn refresh_name_cache_if_stale(&self) {
        let mut cache = self.name_cache.lock().await;
        if cache.last_refreshed.elapsed() < NAME_CACHE_REFRESH {
            return;
        }
        let mut page = 1;
        let mut names = HashMap::new();
        loop {
            let Ok(batch) = self.client.list_channels(page, 200, None, None).await else { break };
            if batch.results.is_empty() {
                break;
            }
            for channel in &batch.results {
                names.insert(channel.id, channel.name.clone());
            }
            if (page as i64) * 200 >= batch.count {
                break;
            }
            page += 1;
        }
        if !names.is_empty() {
            cache.names = names;
        }
        cache.last_refreshed = tokio::time::Instant::now();
    }

    /// Runs one full sample-processing cycle (spec.md §4.5's six steps):
    /// resolve names, diff against the last snapshot, upsert the daily and
    /// per-channel bandwidth rows, emit watch events, and reconcile
    /// per-IP connections.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<(), OrchestratorError> {
        self.refresh_name_cache_if_stale().await;

        let response = self.client.get_channel_stats().await?;
        let name_cache = self.name_cache.lock().await.names.clone();
        let current = PollSnapshot::from_response(&response, &name_cache);

        let mut previous_guard = self.last_snapshot.lock().await;
        let delta = diff(&previous_guard, &current);
        *previous_guard = current;
        drop(previous_guard);

        let date_key = crate::time::local_date_key();
        let poll_interval = self.config.read().await.poll_interval_secs;

        self.upsert_daily(&date_key, &delta).await?;
        for channel_delta in &delta.channel_deltas {
            self.upsert_channel_bandwidth(&date_key, channel_delta, poll_interval).await?;
            self.reconcile_connections(&date_key, channel_delta).await?;
        }
        for (channel_id, channel_name) in &delta.watch_started {
            tracing::info!(channel_id, channel = %channel_name, "watch started");
            self.emit_watch_event("watch:start", *channel_id, channel_name).await?;
            self.bump_watch_view(*channel_id, channel_name).await?;
        }
        for (channel_id, channel_name) in &delta.watch_stopped {
            tracing::info!(channel_id, channel = %channel_name, "watch stopped");
            self.emit_watch_event("watch:stop", *channel_id, channel_name).await?;
        }

        self.purge_old_daily_rows().await?;
        Ok(())
    }

    async fn upsert_daily(&self, date_key: &str, delta: &sample::PollDiff) -> Result<(), OrchestratorError> {
        let pool = self.pool.clone();
        let date_key = date_key.to_string();
        let in_delta = delta.total_bytes_in_delta;
        let out_delta = delta.total_bytes_out_delta;
        let peak_channels = delta.peak_channels;
        let peak_clients = delta.peak_clients;
        let peak_bitrate = delta.peak_bitrate_kbps;
        tokio::task::spawn_blocking(move || -> Result<(), OrchestratorError> {
            let mut conn = pool.get()?;
            let existing = BandwidthDailyRepo::get(&mut conn, &date_key)?;
            let bytes_in = existing.as_ref().map(|e| e.bytes_in).unwrap_or(0) + in_delta;
            let bytes_out = existing.as_ref().map(|e| e.bytes_out).unwrap_or(0) + out_delta;
            let row = BandwidthDailyUpsert {
                date: date_key,
                bytes_transferred: bytes_in + bytes_out,
                bytes_in,
                bytes_out,
                peak_channels: existing.as_ref().map(|e| e.peak_channels).unwrap_or(0).max(peak_channels),
                peak_clients: existing.as_ref().map(|e| e.peak_clients).unwrap_or(0).max(peak_clients),
                peak_bitrate_in: existing.as_ref().map(|e| e.peak_bitrate_in).unwrap_or(0).max(peak_bitrate),
                peak_bitrate_out: existing.as_ref().map(|e| e.peak_bitrate_out).unwrap_or(0).max(peak_bitrate),
            };
            BandwidthDailyRepo::upsert(&mut conn, row)?;
            Ok(())
        })
        .await
        .map_err(|e| OrchestratorError::Config(e.to_string()))??;
        Ok(())
    }

    async fn upsert_channel_bandwidth(
        &self,
        date_key: &str,
        delta: &sample::ChannelDelta,
        poll_interval_secs: u64,
    ) -> Result<(), OrchestratorError> {
        let pool = self.pool.clone();
        let date_key = date_key.to_string();
        let delta = delta.clone();
        tokio::task::spawn_blocking(move || -> Result<(), OrchestratorError> {
            let mut conn = pool.get()?;
            let watch_seconds_this_tick = poll_interval_secs as i64 * delta.client_count as i64;
            match ChannelBandwidthRepo::get(&mut conn, delta.channel_id, &date_key)? {
                Some(existing) => {
                    ChannelBandwidthRepo::update(
                        &mut conn,
                        existing.id,
                        ChannelBandwidthUpdate {
                            bytes_transferred: Some(existing.bytes_transferred + delta.bytes_delta),
                            peak_clients: Some(existing.peak_clients.max(delta.client_count as i32)),
                            total_watch_seconds: Some(existing.total_watch_seconds + watch_seconds_this_tick),
                            connection_count: None,
                        },
                    )?;
                }
                None => {
                    ChannelBandwidthRepo::insert(
                        &mut conn,
                        NewChannelBandwidth {
                            channel_id: delta.channel_id,
                            channel_name: delta.channel_name.clone(),
                            date: date_key,
                            bytes_transferred: delta.bytes_delta,
                            peak_clients: delta.client_count as i32,
                            total_watch_seconds: watch_seconds_this_tick,
                            connection_count: 0,
                        },
                    )?;
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| OrchestratorError::Config(e.to_string()))??;
        Ok(())
    }

    async fn reconcile_connections(&self, date_key: &str, delta: &sample::ChannelDelta) -> Result<(), OrchestratorError> {
        if delta.connection_changes.is_empty() {
            return Ok(());
        }
        let pool = self.pool.clone();
        let date_key = date_key.to_string();
        let channel_id = delta.channel_id;
        let channel_name = delta.channel_name.clone();
        let changes = delta.connection_changes.clone();
        let now = crate::time::now_rfc3339();
        tokio::task::spawn_blocking(move || -> Result<(), OrchestratorError> {
            let mut conn = pool.get()?;
            for change in changes {
                match change {
                    ConnectionChange::Opened(ip) => {
                        ConnectionRepo::open(
                            &mut conn,
                            NewUniqueClientConnection {
                                ip_address: ip,
                                channel_id,
                                channel_name: channel_name.clone(),
                                date: date_key.clone(),
                                connected_at: now.clone(),
                                watch_seconds: 0,
                            },
                        )?;
                    }
                    ConnectionChange::Closed(ip) => {
                        if let Some(open) = ConnectionRepo::find_open(&mut conn, &ip, channel_id, &date_key)? {
                            let opened_at = chrono::DateTime::parse_from_rfc3339(&open.connected_at)
                                .map(|t| t.timestamp())
                                .unwrap_or(0);
                            let closed_at = chrono::DateTime::parse_from_rfc3339(&now)
                                .map(|t| t.timestamp())
                                .unwrap_or(opened_at);
                            let watch_seconds = (closed_at - opened_at).max(0);
                            ConnectionRepo::close(
                                &mut conn,
                                open.id,
                                UniqueClientConnectionUpdate { disconnected_at: Some(Some(now.clone())), watch_seconds: Some(watch_seconds) },
                            )?;
                        }
                    }
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| OrchestratorError::Config(e.to_string()))??;
        Ok(())
    }

    async fn emit_watch_event(&self, event_type: &str, channel_id: i64, channel_name: &str) -> Result<(), OrchestratorError> {
        let event = JournalEvent::new(event_type, "tracker", format!("{channel_name} {}", &event_type[6..]))
            .with_source_id(channel_id.to_string());
        self.journal.record(event).await?;
        if event_type == "watch:start" {
            let _ = self
                .notifier
                .create(NotificationType::Info, "Channel started", channel_name, "tracker", Some(&channel_id.to_string()), None)
                .await;
        }
        Ok(())
    }

    async fn bump_watch_view(&self, channel_id: i64, channel_name: &str) -> Result<(), OrchestratorError> {
        let pool = self.pool.clone();
        let channel_name = channel_name.to_string();
        let now = crate::time::now_rfc3339();
        tokio::task::spawn_blocking(move || -> Result<(), OrchestratorError> {
            let mut conn = pool.get()?;
            let existing = WatchStatsRepo::get(&mut conn, channel_id)?;
            let row = ChannelWatchStatsUpsert {
                channel_id,
                channel_name,
                total_watch_seconds_lifetime: existing.as_ref().map(|e| e.total_watch_seconds_lifetime).unwrap_or(0),
                total_views: existing.as_ref().map(|e| e.total_views).unwrap_or(0) + 1,
                last_watched_at: Some(now),
            };
            WatchStatsRepo::upsert(&mut conn, row)?;
            Ok(())
        })
        .await
        .map_err(|e| OrchestratorError::Config(e.to_string()))??;
        Ok(())
    }

    async fn purge_old_daily_rows(&self) -> Result<(), OrchestratorError> {
        let retention_days = self.config.read().await.bandwidth_retention_days;
        let cutoff = (chrono::Local::now() - chrono::Duration::days(retention_days as i64))
            .format("%Y-%m-%d")
            .to_string();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, diesel::result::Error> {
            let mut conn = pool.get().map_err(|_| diesel::result::Error::NotFound)?;
            BandwidthDailyRepo::purge_older_than(&mut conn, &cutoff)
        })
        .await
        .map_err(|e| OrchestratorError::Config(e.to_string()))??;
        Ok(())
    }
}
