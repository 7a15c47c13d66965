//! Integration test for [`orchestrator::tracker::BandwidthTracker`], driving
//! one full watch-started → watch-stopped cycle across two ticks against an
//! in-memory upstream double (spec.md §4.5, §8).

use std::sync::Arc;
use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;

use orchestrator::config::{self, AppConfig};
use orchestrator::db::schema::{bandwidth_daily, channel_bandwidth, channel_watch_stats, unique_client_connections};
use orchestrator::db::DbPool;
use orchestrator::journal::MemoryJournalSink;
use orchestrator::notify::JournalNotificationSink;
use orchestrator::tracker::BandwidthTracker;
use orchestrator::upstream::{
    Channel, ChannelStatsResponse, ChannelStatsSample, ClientSample, FakeUpstreamClient,
};

fn memory_pool() -> DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
    let pool = Pool::builder().max_size(1).build(manager).expect("build pool");
    let mut conn = pool.get().expect("get conn");
    orchestrator::db::connection::run_migrations(&mut conn).expect("run migrations");
    pool
}

fn stats_with_client(ip: &str) -> ChannelStatsResponse {
    ChannelStatsResponse {
        channels: vec![ChannelStatsSample {
            channel_id: 42,
            channel_number: Some(101),
            channel_name: Some("ESPN".to_string()),
            total_bytes: 10_000,
            client_count: 1,
            avg_bitrate_kbps: Some(4_500),
            m3u_profile_id: None,
            clients: vec![ClientSample { ip_address: ip.to_string() }],
        }],
    }
}

fn stats_with_no_clients() -> ChannelStatsResponse {
    ChannelStatsResponse {
        channels: vec![ChannelStatsSample {
            channel_id: 42,
            channel_number: Some(101),
            channel_name: Some("ESPN".to_string()),
            total_bytes: 25_000,
            client_count: 0,
            avg_bitrate_kbps: Some(0),
            m3u_profile_id: None,
            clients: vec![],
        }],
    }
}

#[tokio::test]
async fn a_full_watch_cycle_persists_bandwidth_and_connection_rows() {
    let pool = memory_pool();
    let client = Arc::new(FakeUpstreamClient::new());
    client.seed_channel(Channel {
        id: 42,
        name: "ESPN".to_string(),
        channel_number: 101,
        group_id: None,
        streams: vec![1],
        tvg_id: None,
        logo_id: None,
        epg_data_id: None,
        auto_created: true,
        auto_created_by: None,
    });

    let config = config::shared(AppConfig::default());
    let journal = Arc::new(MemoryJournalSink::default());
    let notifier = Arc::new(JournalNotificationSink::new(MemoryJournalSink::default(), Duration::from_secs(0)));

    let tracker = BandwidthTracker::new(client.clone(), pool.clone(), config, journal.clone(), notifier);

    // Tick 1: a client connects.
    client.set_stats(stats_with_client("203.0.113.7"));
    tracker.tick().await.expect("first tick");

    let watch_events = journal.events();
    assert_eq!(watch_events.len(), 1);
    assert_eq!(watch_events[0].event_type, "watch:start");
    assert_eq!(watch_events[0].source_id.as_deref(), Some("42"));

    {
        let mut conn = pool.get().unwrap();
        let open_connections: i64 = unique_client_connections::table
            .filter(unique_client_connections::channel_id.eq(42))
            .filter(unique_client_connections::disconnected_at.is_null())
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(open_connections, 1);

        let total_views: i32 = channel_watch_stats::table
            .filter(channel_watch_stats::channel_id.eq(42))
            .select(channel_watch_stats::total_views)
            .first(&mut conn)
            .unwrap();
        assert_eq!(total_views, 1);

        let bytes_day1: i64 = channel_bandwidth::table
            .filter(channel_bandwidth::channel_id.eq(42))
            .select(channel_bandwidth::bytes_transferred)
            .first(&mut conn)
            .unwrap();
        assert_eq!(bytes_day1, 10_000, "first tick's delta is the full counter value (nothing polled before it)");

        let (daily_transferred, daily_in, daily_out): (i64, i64, i64) = bandwidth_daily::table
            .select((bandwidth_daily::bytes_transferred, bandwidth_daily::bytes_in, bandwidth_daily::bytes_out))
            .first(&mut conn)
            .unwrap();
        assert_eq!(daily_in, 10_000, "one client means the inbound share is the full delta");
        assert_eq!(daily_out, 10_000, "outbound is always the full delta, regardless of client count");
        assert_eq!(daily_transferred, daily_in + daily_out, "bytes_transferred must equal bytes_in + bytes_out");
    }

    // Tick 2: the same client disconnects; more bytes accumulate.
    client.set_stats(stats_with_no_clients());
    tracker.tick().await.expect("second tick");

    let watch_events = journal.events();
    assert_eq!(watch_events.len(), 2);
    assert_eq!(watch_events[1].event_type, "watch:stop");

    let mut conn = pool.get().unwrap();
    let open_connections: i64 = unique_client_connections::table
        .filter(unique_client_connections::channel_id.eq(42))
        .filter(unique_client_connections::disconnected_at.is_null())
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(open_connections, 0, "the connection closed on tick 2");

    let closed_watch_seconds: i64 = unique_client_connections::table
        .filter(unique_client_connections::channel_id.eq(42))
        .select(unique_client_connections::watch_seconds)
        .first(&mut conn)
        .unwrap();
    assert!(closed_watch_seconds >= 0);

    let bytes_total: i64 = channel_bandwidth::table
        .filter(channel_bandwidth::channel_id.eq(42))
        .select(channel_bandwidth::bytes_transferred)
        .first(&mut conn)
        .unwrap();
    assert_eq!(bytes_total, 25_000, "bandwidth accumulates across ticks rather than resetting");
}
