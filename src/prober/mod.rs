//! The stream prober: concurrent ffprobe/bitrate sampling across every
//! provider account, with ramp-up, retry, and auto-reorder (spec.md §4.4).
//!
//! Supervision follows the teacher's `scheduler::EpgScheduler` shape — a
//! handle type holding a `JoinHandle` behind a lock so `start`/`stop`/
//! `restart` are idempotent and cheap to call from a cron tick or a
//! manual trigger alike — generalized from one EPG refresh job into a
//! cooperative-cancellation probe sweep over every eligible stream.

pub mod history;
pub mod probe;
pub mod profile;
pub mod ramp;
pub mod reorder;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, Semaphore};

use crate::config::SharedConfig;
use crate::db::models::StreamStatsUpsert;
use crate::db::DbPool;
use crate::engine::probe_source::QualityProbe;
use crate::engine::repo::StatsRepo;
use crate::error::OrchestratorError;
use crate::notify::{NotificationSink, NotificationType};
use crate::upstream::{Stream, UpstreamClient};

use history::{append_history, ProbeRunHistoryEntry};
use probe::{probe_codec_facts, sample_bitrate_kbps, ProbeError, ProbeOutcome};
use profile::{ProfileLoad, ProfileStrategy};
use ramp::RampController;

const HDHOMERUN_CONCURRENCY_CAP: usize = 2;
const NOTIFICATION_STREAM_INTERVAL: u32 = 10;
const NOTIFICATION_TIME_INTERVAL: Duration = Duration::from_secs(5);
const PENDING_SCAN_INTERVAL: Duration = Duration::from_millis(50);

fn is_hdhomerun(url: &str) -> bool {
    url.contains(":5004/") || url.to_lowercase().contains("hdhomerun")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Idle,
    Running,
    Cancelling,
}

impl ProbeStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
        }
    }
}

/// A live snapshot of an in-progress (or just-finished) probe run,
/// cloned out to callers rather than handed out by reference so the
/// HTTP/IPC layer never holds the prober's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeProgress {
    pub total: u32,
    pub current: u32,
    pub success_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    pub current_stream: Option<String>,
    pub status: String,
    pub rate_limited: bool,
    pub rate_limited_hosts: Vec<String>,
    pub max_backoff_remaining: u64,
}

impl Default for ProbeProgress {
    fn default() -> Self {
        Self {
            total: 0,
            current: 0,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            current_stream: None,
            status: ProbeStatus::Idle.as_str().to_string(),
            rate_limited: false,
            rate_limited_hosts: Vec::new(),
            max_backoff_remaining: 0,
        }
    }
}

struct RunState {
    progress: ProbeProgress,
    success_streams: Vec<i64>,
    failed_streams: Vec<i64>,
    skipped_streams: Vec<i64>,
    reordered_channels: Vec<i64>,
    notification_id: Option<i64>,
    last_notified: Instant,
    last_notified_count: u32,
    started_at: String,
    run_started: Instant,
}

impl RunState {
    fn new(total: u32, started_at: String) -> Self {
        Self {
            progress: ProbeProgress { total, status: ProbeStatus::Running.as_str().to_string(), ..Default::default() },
            success_streams: Vec::new(),
            failed_streams: Vec::new(),
            skipped_streams: Vec::new(),
            reordered_channels: Vec::new(),
            notification_id: None,
            last_notified: Instant::now() - NOTIFICATION_TIME_INTERVAL,
            last_notified_count: 0,
            started_at,
            run_started: Instant::now(),
        }
    }
}

/// Coordinates concurrent probing across every account, honoring
/// per-account ramp-up, profile caps, and the global concurrency ceiling.
pub struct StreamProber {
    client: Arc<dyn UpstreamClient>,
    http: reqwest::Client,
    config: SharedConfig,
    pool: DbPool,
    notifier: Arc<dyn NotificationSink>,
    ramp: RampController,
    profiles: ProfileLoad,
    semaphore: Arc<Semaphore>,
    hdhomerun_semaphores: Mutex<HashMap<i64, Arc<Semaphore>>>,
    state: RwLock<Option<RunState>>,
    cancel_requested: AtomicBool,
}

impl StreamProber {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        config: SharedConfig,
        pool: DbPool,
        notifier: Arc<dyn NotificationSink>,
        max_concurrent_probes: usize,
    ) -> Self {
        let clamped = max_concurrent_probes.clamp(1, 16);
        Self {
            client,
            http: reqwest::Client::builder().build().unwrap_or_default(),
            config,
            pool,
            notifier,
            ramp: RampController::new(),
            profiles: ProfileLoad::new(),
            semaphore: Arc::new(Semaphore::new(clamped)),
            hdhomerun_semaphores: Mutex::new(HashMap::new()),
            state: RwLock::new(None),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Rebuilds ramp state and history without dropping the `Arc` handle
    /// other subsystems hold onto.
    pub async fn restart(&self) {
        self.ramp.reset();
        *self.state.write().await = None;
        self.cancel_requested.store(false, AtomicOrdering::SeqCst);
    }

    pub async fn progress(&self) -> ProbeProgress {
        self.state.read().await.as_ref().map(|s| s.progress.clone()).unwrap_or_default()
    }

    pub fn cancel(&self) {
        self.cancel_requested.store(true, AtomicOrdering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(AtomicOrdering::SeqCst)
    }

    async fn hdhomerun_gate(&self, provider_id: i64) -> Arc<Semaphore> {
        let mut gates = self.hdhomerun_semaphores.lock().await;
        gates
            .entry(provider_id)
            .or_insert_with(|| Arc::new(Semaphore::new(HDHOMERUN_CONCURRENCY_CAP)))
            .clone()
    }

    /// Runs one probe sweep over `streams`, respecting per-provider ramp
    /// ceilings, profile caps, the HDHomeRun cap, and the global
    /// semaphore. Returns once every stream has been probed or the run
    /// is cancelled.
    #[tracing::instrument(skip(self, streams), fields(total = streams.len()))]
    pub async fn run_sweep(self: &Arc<Self>, streams: Vec<Stream>) -> Result<(), OrchestratorError> {
        self.cancel_requested.store(false, AtomicOrdering::SeqCst);
        let total = streams.len() as u32;
        tracing::info!("starting probe sweep over {total} stream(s)");
        let started_at = crate::time::now_rfc3339();
        *self.state.write().await = Some(RunState::new(total, started_at.clone()));

        let title = format!("Probing {total} streams");
        let id = self
            .notifier
            .create(NotificationType::Info, "Probe started", &title, "prober", None, None)
            .await?;
        if let Some(state) = self.state.write().await.as_mut() {
            state.notification_id = Some(id);
        }

        let config = self.config.read().await.clone_settings();
        let providers = self.client.list_providers().await.ok().unwrap_or_default();
        let provider_by_id: HashMap<i64, crate::upstream::Provider> =
            providers.into_iter().map(|p| (p.id, p)).collect();

        // Scan-and-dispatch loop (spec.md §4.4): a stream is only handed to
        // `dispatch_one` once its provider account has a free in-flight
        // slot under the current ramp limit, so per-account concurrency
        // never exceeds that limit even though the global semaphore would
        // otherwise let every stream run at once.
        let probed_stream_ids: Vec<i64> = streams.iter().map(|s| s.id).collect();
        let mut pending: VecDeque<Stream> = streams.into();
        let mut handles = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            if self.is_cancelled() {
                break;
            }
            let mut dispatched_this_scan = false;
            let mut index = 0;
            while index < pending.len() {
                let provider = provider_by_id.get(&pending[index].provider_id).cloned();
                let has_slot = match &provider {
                    Some(p) => self.ramp.try_acquire(p.id),
                    None => true,
                };
                if has_slot {
                    let stream = pending.remove(index).expect("index in bounds");
                    handles.push(self.dispatch_one(stream, provider, config.clone()).await);
                    dispatched_this_scan = true;
                } else {
                    index += 1;
                }
            }
            if !pending.is_empty() && !dispatched_this_scan {
                tokio::time::sleep(PENDING_SCAN_INTERVAL).await;
            }
        }
        for leftover in pending {
            tracing::info!(stream_id = leftover.id, "probe sweep cancelled before this stream was dispatched");
            self.record_skip(leftover.id).await;
        }
        futures::future::join_all(handles).await;

        if !self.is_cancelled() {
            self.reorder_after_sweep(&probed_stream_ids).await;
        }

        let cancelled = self.is_cancelled();
        if cancelled {
            tracing::info!("probe sweep cancelled before completion");
        } else {
            tracing::info!("probe sweep finished");
        }
        self.finalize(cancelled).await?;
        Ok(())
    }

    /// Re-sorts every channel that contains at least one just-probed
    /// stream, best quality first, persisting the new order upstream
    /// when it actually changed.
    async fn reorder_after_sweep(&self, probed_stream_ids: &[i64]) {
        use std::collections::HashSet;
        let probed: HashSet<i64> = probed_stream_ids.iter().copied().collect();
        if probed.is_empty() {
            return;
        }

        let pool = self.pool.clone();
        let stats_rows = tokio::task::spawn_blocking(move || -> diesel::result::QueryResult<Vec<crate::db::models::StreamStats>> {
            let mut conn = pool.get().map_err(|_| diesel::result::Error::NotFound)?;
            StatsRepo::load_all(&mut conn)
        })
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_default();
        let stats_by_id: HashMap<i64, crate::db::models::StreamStats> =
            stats_rows.into_iter().map(|s| (s.stream_id, s)).collect();

        let mut page = 1;
        loop {
            let Ok(batch) = self.client.list_channels(page, 200, None, None).await else { break };
            if batch.results.is_empty() {
                break;
            }
            for channel in &batch.results {
                if !channel.streams.iter().any(|id| probed.contains(id)) {
                    continue;
                }
                let ordered = reorder::reorder_streams(
                    &channel.streams,
                    |_| 0,
                    |id| stats_by_id.get(&id).cloned(),
                    true,
                );
                if ordered == channel.streams {
                    continue;
                }
                let write = crate::upstream::ChannelWrite { streams: Some(ordered), ..Default::default() };
                if self.client.update_channel(channel.id, write).await.is_ok() {
                    if let Some(state) = self.state.write().await.as_mut() {
                        state.reordered_channels.push(channel.id);
                    }
                }
            }
            if (page as i64) * 200 >= batch.count {
                break;
            }
            page += 1;
        }
    }

    async fn dispatch_one(
        self: &Arc<Self>,
        stream: Stream,
        provider: Option<crate::upstream::Provider>,
        settings: ProbeRunSettings,
    ) -> tokio::task::JoinHandle<()> {
        let permit = self.semaphore.clone().acquire_owned().await.ok();
        let hd_gate = if is_hdhomerun(&stream.url) {
            Some(self.hdhomerun_gate(stream.provider_id).await)
        } else {
            None
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let _hd_permit = if let Some(gate) = &hd_gate { gate.acquire().await.ok() } else { None };
            this.probe_one(stream, provider, settings).await;
        })
    }

    async fn probe_one(&self, stream: Stream, provider: Option<crate::upstream::Provider>, settings: ProbeRunSettings) {
        if let Some(state) = self.state.write().await.as_mut() {
            state.progress.current_stream = Some(stream.name.clone());
        }

        // The scan-and-dispatch loop in `run_sweep` already confirmed (via
        // `RampController::try_acquire`) that this account is not held and
        // has a free in-flight slot, so no further ramp gating happens here
        // — only releasing the slot this probe claimed.

        let profile_id = provider
            .as_ref()
            .and_then(|p| self.profiles.reserve(p.id, &p.profiles, ProfileStrategy::FillFirst));

        let outcome = self.probe_with_retry(&stream, &settings).await;

        if let Some(id) = profile_id {
            self.profiles.release(id);
        }

        match outcome {
            Ok(probe_outcome) => {
                if let Some(p) = &provider {
                    self.ramp.record_success(p.id, p.max_streams);
                }
                self.persist_success(&stream, probe_outcome, profile_id).await;
                self.record_success(stream.id).await;
            }
            Err(e) => {
                tracing::warn!(stream_id = stream.id, stream = %stream.name, error = %e.message, "probe failed");
                if let Some(p) = &provider {
                    self.ramp.record_failure(p.id, e.is_retryable());
                }
                self.persist_failure(&stream, &e).await;
                self.record_failure(stream.id).await;
            }
        }

        if let Some(p) = &provider {
            self.ramp.release(p.id);
        }

        self.maybe_notify_progress().await;
    }

    async fn probe_with_retry(&self, stream: &Stream, settings: &ProbeRunSettings) -> Result<ProbeOutcome, ProbeError> {
        let mut attempt = 0;
        loop {
            let codec_facts = probe_codec_facts(&stream.url, settings.probe_timeout_secs).await;
            match codec_facts {
                Ok(mut outcome) => {
                    if let Ok(kbps) = sample_bitrate_kbps(&self.http, &stream.url, settings.bitrate_sample_duration_secs).await {
                        outcome.video_bitrate = outcome.video_bitrate.or(Some(kbps * 1000));
                    }
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && attempt < settings.probe_retry_count => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_secs(settings.probe_retry_delay_secs)).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn persist_success(&self, stream: &Stream, outcome: ProbeOutcome, _profile_id: Option<i64>) {
        let pool = self.pool.clone();
        let row = StreamStatsUpsert {
            stream_id: stream.id,
            stream_name: stream.name.clone(),
            probe_status: "success".to_string(),
            last_probed: Some(crate::time::now_rfc3339()),
            resolution: outcome.resolution,
            resolution_height: outcome.resolution_height,
            video_codec: outcome.video_codec,
            audio_codec: outcome.audio_codec,
            audio_channels: outcome.audio_channels,
            fps: outcome.fps,
            bitrate: outcome.video_bitrate,
            video_bitrate: outcome.video_bitrate,
            stream_type: outcome.stream_type,
            error_message: None,
            consecutive_failures: 0,
        };
        let _ = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|_| diesel::result::Error::NotFound)?;
            StatsRepo::upsert(&mut conn, row)
        })
        .await;
    }

    async fn persist_failure(&self, stream: &Stream, error: &ProbeError) {
        let pool = self.pool.clone();
        let stream_id = stream.id;
        let stream_name = stream.name.clone();
        let message = error.message.clone();
        let previous_failures = tokio::task::spawn_blocking({
            let pool = pool.clone();
            move || -> diesel::result::QueryResult<i32> {
                let mut conn = pool.get().map_err(|_| diesel::result::Error::NotFound)?;
                Ok(StatsRepo::get(&mut conn, stream_id)?.map(|s| s.consecutive_failures).unwrap_or(0))
            }
        })
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or(0);

        let row = StreamStatsUpsert {
            stream_id,
            stream_name,
            probe_status: "failed".to_string(),
            last_probed: Some(crate::time::now_rfc3339()),
            resolution: None,
            resolution_height: None,
            video_codec: None,
            audio_codec: None,
            audio_channels: None,
            fps: None,
            bitrate: None,
            video_bitrate: None,
            stream_type: None,
            error_message: Some(message),
            consecutive_failures: previous_failures + 1,
        };
        let _ = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|_| diesel::result::Error::NotFound)?;
            StatsRepo::upsert(&mut conn, row)
        })
        .await;
    }

    async fn record_success(&self, stream_id: i64) {
        if let Some(state) = self.state.write().await.as_mut() {
            state.progress.current += 1;
            state.progress.success_count += 1;
            state.success_streams.push(stream_id);
        }
    }

    async fn record_failure(&self, stream_id: i64) {
        if let Some(state) = self.state.write().await.as_mut() {
            state.progress.current += 1;
            state.progress.failed_count += 1;
            state.failed_streams.push(stream_id);
        }
    }

    async fn record_skip(&self, stream_id: i64) {
        if let Some(state) = self.state.write().await.as_mut() {
            state.progress.current += 1;
            state.progress.skipped_count += 1;
            state.skipped_streams.push(stream_id);
        }
    }

    async fn maybe_notify_progress(&self) {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else { return };
        let elapsed_enough = state.last_notified.elapsed() >= NOTIFICATION_TIME_INTERVAL;
        let count_enough = state.progress.current.saturating_sub(state.last_notified_count) >= NOTIFICATION_STREAM_INTERVAL;
        if !elapsed_enough && !count_enough {
            return;
        }
        state.last_notified = Instant::now();
        state.last_notified_count = state.progress.current;
        let Some(id) = state.notification_id else { return };
        let message = format!(
            "{}/{} probed ({} ok, {} failed, {} skipped)",
            state.progress.current, state.progress.total, state.progress.success_count, state.progress.failed_count, state.progress.skipped_count
        );
        drop(guard);
        let _ = self.notifier.update(id, NotificationType::Info, &message, None).await;
    }

    async fn finalize(&self, cancelled: bool) -> Result<(), OrchestratorError> {
        let mut guard = self.state.write().await;
        let Some(state) = guard.as_mut() else { return Ok(()) };
        state.progress.status = ProbeStatus::Idle.as_str().to_string();

        tracing::info!(
            success = state.progress.success_count,
            failed = state.progress.failed_count,
            skipped = state.progress.skipped_count,
            "probe sweep finalized"
        );

        let entry = ProbeRunHistoryEntry {
            started_at: state.started_at.clone(),
            duration_seconds: state.run_started.elapsed().as_secs(),
            total: state.progress.total,
            success_count: state.progress.success_count,
            failed_count: state.progress.failed_count,
            skipped_count: state.progress.skipped_count,
            status: if cancelled { "cancelled".to_string() } else { "completed".to_string() },
            success_streams: state.success_streams.clone(),
            failed_streams: state.failed_streams.clone(),
            skipped_streams: state.skipped_streams.clone(),
            reordered_channels: state.reordered_channels.clone(),
            sort_config: Some("quality".to_string()),
        };

        let notification_id = state.notification_id;
        let path = self.config.read().await.probe_history_path();
        drop(guard);

        append_history(&path, entry).await?;

        if cancelled {
            let _ = self.notifier.delete_by_source("prober").await;
        } else if let Some(id) = notification_id {
            let message = "Probe run finished".to_string();
            let _ = self.notifier.update(id, NotificationType::Success, &message, None).await;
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ProbeRunSettings {
    probe_timeout_secs: u64,
    probe_retry_count: u32,
    probe_retry_delay_secs: u64,
    bitrate_sample_duration_secs: u64,
}

trait SettingsSnapshot {
    fn clone_settings(&self) -> ProbeRunSettings;
}

impl SettingsSnapshot for crate::config::AppConfig {
    fn clone_settings(&self) -> ProbeRunSettings {
        ProbeRunSettings {
            probe_timeout_secs: self.probe_timeout_secs,
            probe_retry_count: self.probe_retry_count,
            probe_retry_delay_secs: self.probe_retry_delay_secs,
            bitrate_sample_duration_secs: self.bitrate_sample_duration_secs,
        }
    }
}

#[async_trait]
impl QualityProbe for StreamProber {
    async fn probe_resolution(&self, stream: &Stream) -> Option<u32> {
        let settings = self.config.read().await.clone_settings();
        probe_codec_facts(&stream.url, settings.probe_timeout_secs)
            .await
            .ok()
            .and_then(|o| o.resolution_height)
            .map(|h| h as u32)
    }
}
