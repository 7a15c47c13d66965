//! Integration tests for [`orchestrator::prober::StreamProber`].
//!
//! `ffprobe` is not expected to be installed in this environment, so every
//! probe here exercises the real subprocess-not-found path: that failure is
//! transient and retryable per spec.md, so it drives the same retry/ramp/
//! notification/history machinery a flaky upstream would. Setting
//! `probe_retry_count` to zero keeps the run fast and deterministic.

use std::sync::Arc;
use std::time::Duration;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;

use orchestrator::config::{self, AppConfig};
use orchestrator::journal::MemoryJournalSink;
use orchestrator::notify::JournalNotificationSink;
use orchestrator::prober::StreamProber;
use orchestrator::upstream::{FakeUpstreamClient, Provider, Stream};

fn memory_pool() -> orchestrator::db::DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
    let pool = Pool::builder().max_size(1).build(manager).expect("build pool");
    let mut conn = pool.get().expect("get conn");
    orchestrator::db::connection::run_migrations(&mut conn).expect("run migrations");
    pool
}

fn test_provider(id: i64) -> Provider {
    Provider { id, name: format!("Provider {id}"), max_streams: 5, priority: 0, profiles: vec![], updated_at: None }
}

fn test_stream(id: i64, provider_id: i64) -> Stream {
    Stream {
        id,
        name: format!("Stream {id}"),
        url: format!("http://127.0.0.1:9/never-resolves/{id}.m3u8"),
        group_name: None,
        tvg_id: None,
        tvg_name: None,
        logo_url: None,
        provider_id,
        provider_name: "Provider One".to_string(),
        resolution_height: None,
        normalized_name: None,
    }
}

#[tokio::test]
async fn sweep_with_unreachable_streams_records_failures_and_history() {
    let tempdir = std::env::temp_dir().join(format!("orchestrator-prober-test-{}", std::process::id()));
    let config = AppConfig { probe_retry_count: 0, config_dir: tempdir.clone(), ..AppConfig::default() };
    let shared_config = config::shared(config);

    let pool = memory_pool();
    let client = Arc::new(FakeUpstreamClient::new());
    let notifier = Arc::new(JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(0)));

    client.seed_provider(test_provider(1));
    client.seed_provider(test_provider(2));
    let prober = Arc::new(StreamProber::new(client.clone(), shared_config, pool, notifier, 4));

    // Distinct provider ids: a retryable failure ramps that provider's
    // account down and holds it (spec.md §4.4), which would make the second
    // probe racily land as "skipped" instead of "failed" if they shared one.
    let streams = vec![test_stream(1, 1), test_stream(2, 2)];
    prober.run_sweep(streams).await.expect("sweep completes even when every probe fails");

    let progress = prober.progress().await;
    assert_eq!(progress.total, 2);
    assert_eq!(progress.current, 2);
    assert_eq!(progress.failed_count, 2, "missing ffprobe binary is a transient, retryable failure, not a panic");
    assert_eq!(progress.success_count, 0);
    assert_eq!(progress.status, "idle", "finalize resets status once the sweep is done");

    let history = orchestrator::prober::history::load_history(&config_path(&tempdir)).await.expect("load history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].failed_count, 2);
    assert_eq!(history[0].status, "completed");

    let _ = std::fs::remove_dir_all(&tempdir);
}

#[tokio::test]
async fn restart_clears_progress_and_ramp_state_between_runs() {
    let tempdir = std::env::temp_dir().join(format!("orchestrator-prober-test-restart-{}", std::process::id()));
    let config = AppConfig { probe_retry_count: 0, config_dir: tempdir.clone(), ..AppConfig::default() };
    let shared_config = config::shared(config);

    let pool = memory_pool();
    let client = Arc::new(FakeUpstreamClient::new());
    let notifier = Arc::new(JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(0)));

    let prober = Arc::new(StreamProber::new(client.clone(), shared_config, pool, notifier, 4));

    prober.run_sweep(vec![test_stream(1, 1)]).await.expect("first sweep");
    assert_eq!(prober.progress().await.failed_count, 1);

    prober.restart().await;
    let progress = prober.progress().await;
    assert_eq!(progress.failed_count, 0, "restart drops the previous run's progress entirely");
    assert_eq!(progress.total, 0);

    let _ = std::fs::remove_dir_all(&tempdir);
}

fn config_path(dir: &std::path::Path) -> std::path::PathBuf {
    dir.join("probe_history.json")
}
