//! Process entrypoint: loads configuration, opens the connection pool,
//! runs migrations, constructs the upstream client and the three
//! subsystems, wires the cron-scheduled pipeline and probe sweeps, spawns
//! the tracker loop, and waits for a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};

use orchestrator::config::{self, AppConfig};
use orchestrator::db::DbConnection;
use orchestrator::engine::{AutoCreationEngine, QualityProbe, RunRequest};
use orchestrator::journal::SqliteJournalSink;
use orchestrator::logging;
use orchestrator::notify::JournalNotificationSink;
use orchestrator::prober::StreamProber;
use orchestrator::tracker::BandwidthTracker;
use orchestrator::upstream::{HttpUpstreamClient, UpstreamClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init();
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("CONFIG_DIR").map(std::path::PathBuf::from).unwrap_or_else(|_| AppConfig::default().config_dir);
    let resolved_path = orchestrator::db::resolve_db_path(&config_dir)?;
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| resolved_path.to_string_lossy().to_string());

    let db = DbConnection::new(&database_url)?;
    let pool = db.pool();

    let config = config::shared(AppConfig::load(&pool).await?);
    tracing::info!("configuration loaded, database at {database_url}");

    let upstream_base_url = std::env::var("UPSTREAM_BASE_URL").unwrap_or_else(|_| "http://localhost:9191/api".to_string());
    let upstream_api_key = std::env::var("UPSTREAM_API_KEY").ok();
    let client: Arc<dyn UpstreamClient> = Arc::new(HttpUpstreamClient::new(&upstream_base_url, upstream_api_key)?);

    let journal: Arc<dyn orchestrator::journal::JournalSink> = Arc::new(SqliteJournalSink::new(pool.clone()));
    let notification_interval = Duration::from_secs(config.read().await.notification_min_interval_secs);
    let notifier: Arc<dyn orchestrator::notify::NotificationSink> =
        Arc::new(JournalNotificationSink::new(SqliteJournalSink::new(pool.clone()), notification_interval));

    let max_concurrent_probes = config.read().await.max_concurrent_probes;
    let prober = Arc::new(StreamProber::new(
        Arc::clone(&client),
        Arc::clone(&config),
        pool.clone(),
        notifier.clone(),
        max_concurrent_probes,
    ));

    let engine = Arc::new(AutoCreationEngine::new(
        pool.clone(),
        Arc::clone(&client),
        Some(Arc::clone(&prober) as Arc<dyn QualityProbe>),
    ));

    let tracker = Arc::new(BandwidthTracker::new(
        Arc::clone(&client),
        pool.clone(),
        Arc::clone(&config),
        journal.clone(),
        notifier.clone(),
    ));
    tracker.start().await;
    tracing::info!("bandwidth tracker started");

    let scheduler = JobScheduler::new().await?;

    let pipeline_cron = config.read().await.pipeline_cron_schedule.clone();
    let pipeline_engine = Arc::clone(&engine);
    let pipeline_job = Job::new_async(pipeline_cron.as_str(), move |_uuid, _lock| {
        let engine = Arc::clone(&pipeline_engine);
        Box::pin(async move {
            tracing::info!("scheduled pipeline run starting");
            match engine.run(RunRequest { triggered_by: "scheduler".to_string(), ..Default::default() }).await {
                Ok(summary) => tracing::info!(
                    "scheduled pipeline run finished: {} matched, {} created, {} merged",
                    summary.streams_matched,
                    summary.channels_created,
                    summary.streams_merged
                ),
                Err(e) => tracing::error!("scheduled pipeline run failed: {e}"),
            }
        })
    })?;
    scheduler.add(pipeline_job).await?;

    let probe_cron = "0 30 */6 * * *";
    let probe_client = Arc::clone(&client);
    let probe_prober = Arc::clone(&prober);
    let probe_job = Job::new_async(probe_cron, move |_uuid, _lock| {
        let client = Arc::clone(&probe_client);
        let prober = Arc::clone(&probe_prober);
        Box::pin(async move {
            tracing::info!("scheduled probe sweep starting");
            match collect_all_streams(client.as_ref()).await {
                Ok(streams) => {
                    if let Err(e) = prober.run_sweep(streams).await {
                        tracing::error!("scheduled probe sweep failed: {e}");
                    }
                }
                Err(e) => tracing::error!("failed to list streams for probe sweep: {e}"),
            }
        })
    })?;
    scheduler.add(probe_job).await?;

    scheduler.start().await?;
    tracing::info!("scheduler started: pipeline={pipeline_cron}, probe={probe_cron}");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    tracker.stop().await;

    Ok(())
}

async fn collect_all_streams(
    client: &dyn UpstreamClient,
) -> Result<Vec<orchestrator::upstream::Stream>, orchestrator::error::UpstreamError> {
    const PAGE_SIZE: u32 = 200;
    let mut streams = Vec::new();
    let mut page = 1;
    loop {
        let batch = client.list_streams(page, PAGE_SIZE, None).await?;
        let got = batch.results.len();
        streams.extend(batch.results);
        if got < PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }
    Ok(streams)
}
