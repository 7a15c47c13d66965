//! Diesel repositories for the bandwidth/watch-tracking tables.
//!
//! Same shape as [`crate::engine::repo`]: one struct per aggregate, hand
//! written upserts rather than a generic repository trait.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::models::{
    BandwidthDaily, BandwidthDailyUpsert, ChannelBandwidth, ChannelBandwidthUpdate, ChannelWatchStats,
    ChannelWatchStatsUpsert, NewChannelBandwidth, NewUniqueClientConnection, UniqueClientConnection,
    UniqueClientConnectionUpdate,
};
use crate::db::schema::{bandwidth_daily, channel_bandwidth, channel_watch_stats, unique_client_connections};

pub struct BandwidthDailyRepo;

impl BandwidthDailyRepo {
    pub fn get(conn: &mut SqliteConnection, date_key: &str) -> QueryResult<Option<BandwidthDaily>> {
        bandwidth_daily::table.filter(bandwidth_daily::date.eq(date_key)).first(conn).optional()
    }

    pub fn upsert(conn: &mut SqliteConnection, row: BandwidthDailyUpsert) -> QueryResult<()> {
        diesel::insert_into(bandwidth_daily::table)
            .values(&row)
            .on_conflict(bandwidth_daily::date)
            .do_update()
            .set(&row)
            .execute(conn)?;
        Ok(())
    }

    /// Deletes daily rows older than `retain_from` (inclusive lower bound
    /// kept), per spec.md §4.5's retention window.
    pub fn purge_older_than(conn: &mut SqliteConnection, retain_from: &str) -> QueryResult<usize> {
        diesel::delete(bandwidth_daily::table.filter(bandwidth_daily::date.lt(retain_from))).execute(conn)
    }
}

pub struct ChannelBandwidthRepo;

impl ChannelBandwidthRepo {
    pub fn get(conn: &mut SqliteConnection, channel: i64, date_key: &str) -> QueryResult<Option<ChannelBandwidth>> {
        channel_bandwidth::table
            .filter(channel_bandwidth::channel_id.eq(channel))
            .filter(channel_bandwidth::date.eq(date_key))
            .first(conn)
            .optional()
    }

    pub fn insert(conn: &mut SqliteConnection, row: NewChannelBandwidth) -> QueryResult<()> {
        diesel::insert_into(channel_bandwidth::table).values(&row).execute(conn)?;
        Ok(())
    }

    pub fn update(conn: &mut SqliteConnection, id: i32, update: ChannelBandwidthUpdate) -> QueryResult<()> {
        diesel::update(channel_bandwidth::table.filter(channel_bandwidth::id.eq(id)))
            .set(&update)
            .execute(conn)?;
        Ok(())
    }
}

pub struct WatchStatsRepo;

impl WatchStatsRepo {
    pub fn get(conn: &mut SqliteConnection, channel: i64) -> QueryResult<Option<ChannelWatchStats>> {
        channel_watch_stats::table.filter(channel_watch_stats::channel_id.eq(channel)).first(conn).optional()
    }

    pub fn upsert(conn: &mut SqliteConnection, row: ChannelWatchStatsUpsert) -> QueryResult<()> {
        diesel::insert_into(channel_watch_stats::table)
            .values(&row)
            .on_conflict(channel_watch_stats::channel_id)
            .do_update()
            .set(&row)
            .execute(conn)?;
        Ok(())
    }
}

pub struct ConnectionRepo;

impl ConnectionRepo {
    pub fn open(conn: &mut SqliteConnection, row: NewUniqueClientConnection) -> QueryResult<()> {
        diesel::insert_into(unique_client_connections::table).values(&row).execute(conn)?;
        Ok(())
    }

    /// Finds the still-open connection row for `ip` on `channel` today, if
    /// any — there is at most one per (ip, channel, date) since a close
    /// always sets `disconnected_at`.
    pub fn find_open(
        conn: &mut SqliteConnection,
        ip: &str,
        channel: i64,
        date_key: &str,
    ) -> QueryResult<Option<UniqueClientConnection>> {
        unique_client_connections::table
            .filter(unique_client_connections::ip_address.eq(ip))
            .filter(unique_client_connections::channel_id.eq(channel))
            .filter(unique_client_connections::date.eq(date_key))
            .filter(unique_client_connections::disconnected_at.is_null())
            .first(conn)
            .optional()
    }

    pub fn close(conn: &mut SqliteConnection, id: i32, update: UniqueClientConnectionUpdate) -> QueryResult<()> {
        diesel::update(unique_client_connections::table.filter(unique_client_connections::id.eq(id)))
            .set(&update)
            .execute(conn)?;
        Ok(())
    }
}
