//! Pure per-tick diffing: turns two consecutive
//! [`ChannelStatsResponse`](crate::upstream::ChannelStatsResponse) snapshots
//! into the deltas and watch events the tracker needs to persist.
//!
//! Kept free of diesel/tokio so the six-step algorithm in spec.md §4.5 can
//! be unit tested without a database, the same separation the teacher
//! draws between `matcher::scorer` (pure) and `matcher::mod` (I/O).

use std::collections::{HashMap, HashSet};

use crate::upstream::ChannelStatsResponse;

#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub channel_name: String,
    pub total_bytes: i64,
    pub avg_bitrate_kbps: i64,
    pub client_ips: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    pub channels: HashMap<i64, ChannelSnapshot>,
}

impl PollSnapshot {
    pub fn from_response(response: &ChannelStatsResponse, name_cache: &HashMap<i64, String>) -> Self {
        let mut channels = HashMap::new();
        for sample in &response.channels {
            let channel_name = sample
                .channel_name
                .clone()
                .or_else(|| name_cache.get(&sample.channel_id).cloned())
                .unwrap_or_else(|| format!("channel-{}", sample.channel_id));
            channels.insert(
                sample.channel_id,
                ChannelSnapshot {
                    channel_name,
                    total_bytes: sample.total_bytes,
                    avg_bitrate_kbps: sample.avg_bitrate_kbps.unwrap_or(0),
                    client_ips: sample.clients.iter().map(|c| c.ip_address.clone()).collect(),
                },
            );
        }
        Self { channels }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChange {
    Opened(String),
    Closed(String),
}

#[derive(Debug, Clone)]
pub struct ChannelDelta {
    pub channel_id: i64,
    pub channel_name: String,
    pub bytes_delta: i64,
    pub client_count: usize,
    pub avg_bitrate_kbps: i64,
    pub connection_changes: Vec<ConnectionChange>,
}

#[derive(Debug, Clone, Default)]
pub struct PollDiff {
    pub channel_deltas: Vec<ChannelDelta>,
    /// Channels with a client now but none last tick.
    pub watch_started: Vec<(i64, String)>,
    /// Channels with no client now but at least one last tick.
    pub watch_stopped: Vec<(i64, String)>,
    pub total_bytes_delta: i64,
    /// Sum of every channel's inbound share of its byte delta
    /// (`bytes_delta / max(client_count, 1)`), per spec.md §4.5 step 2.
    pub total_bytes_in_delta: i64,
    /// Sum of every channel's outbound share, which is the full
    /// `bytes_delta` (one upstream pull, fanned out to every client).
    pub total_bytes_out_delta: i64,
    pub peak_channels: i32,
    pub peak_clients: i32,
    pub peak_bitrate_kbps: i64,
}

/// Computes every delta between `previous` and `current`, clamping a
/// negative byte delta to zero (an upstream counter reset, not a real
/// decrease — spec.md §4.5 treats this as a restart, not negative traffic).
pub fn diff(previous: &PollSnapshot, current: &PollSnapshot) -> PollDiff {
    let mut out = PollDiff::default();

    for (channel_id, snapshot) in &current.channels {
        let prev = previous.channels.get(channel_id);
        let prev_bytes = prev.map(|p| p.total_bytes).unwrap_or(0);
        let bytes_delta = (snapshot.total_bytes - prev_bytes).max(0);

        let prev_ips: HashSet<&String> = prev.map(|p| p.client_ips.iter().collect()).unwrap_or_default();
        let mut changes = Vec::new();
        for ip in &snapshot.client_ips {
            if !prev_ips.contains(ip) {
                changes.push(ConnectionChange::Opened(ip.clone()));
            }
        }
        for ip in &prev_ips {
            if !snapshot.client_ips.contains(*ip) {
                changes.push(ConnectionChange::Closed((*ip).clone()));
            }
        }

        let was_active = prev.map(|p| !p.client_ips.is_empty()).unwrap_or(false);
        let is_active = !snapshot.client_ips.is_empty();
        if is_active && !was_active {
            out.watch_started.push((*channel_id, snapshot.channel_name.clone()));
        }

        let client_count = snapshot.client_ips.len();
        out.total_bytes_delta += bytes_delta;
        out.total_bytes_in_delta += bytes_delta / (client_count.max(1) as i64);
        out.total_bytes_out_delta += bytes_delta;
        out.peak_clients += client_count as i32;
        out.peak_bitrate_kbps = out.peak_bitrate_kbps.max(snapshot.avg_bitrate_kbps);
        if is_active {
            out.peak_channels += 1;
        }

        out.channel_deltas.push(ChannelDelta {
            channel_id: *channel_id,
            channel_name: snapshot.channel_name.clone(),
            bytes_delta,
            client_count,
            avg_bitrate_kbps: snapshot.avg_bitrate_kbps,
            connection_changes: changes,
        });
    }

    for (channel_id, prev_snapshot) in &previous.channels {
        let still_present = current.channels.contains_key(channel_id);
        let was_active = !prev_snapshot.client_ips.is_empty();
        if was_active && (!still_present || current.channels[channel_id].client_ips.is_empty()) {
            out.watch_stopped.push((*channel_id, prev_snapshot.channel_name.clone()));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ChannelStatsSample, ClientSample};

    fn sample(channel_id: i64, total_bytes: i64, ips: &[&str]) -> ChannelStatsSample {
        ChannelStatsSample {
            channel_id,
            channel_number: None,
            channel_name: Some(format!("ch{channel_id}")),
            total_bytes,
            client_count: ips.len() as i64,
            avg_bitrate_kbps: Some(4000),
            m3u_profile_id: None,
            clients: ips.iter().map(|ip| ClientSample { ip_address: ip.to_string() }).collect(),
        }
    }

    fn snapshot(samples: Vec<ChannelStatsSample>) -> PollSnapshot {
        let response = ChannelStatsResponse { channels: samples };
        PollSnapshot::from_response(&response, &HashMap::new())
    }

    #[test]
    fn new_channel_with_clients_emits_watch_start() {
        let previous = snapshot(vec![]);
        let current = snapshot(vec![sample(1, 1000, &["1.1.1.1"])]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.watch_started, vec![(1, "ch1".to_string())]);
        assert!(diff.watch_stopped.is_empty());
    }

    #[test]
    fn channel_losing_all_clients_emits_watch_stop() {
        let previous = snapshot(vec![sample(1, 1000, &["1.1.1.1"])]);
        let current = snapshot(vec![sample(1, 2000, &[])]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.watch_stopped, vec![(1, "ch1".to_string())]);
    }

    #[test]
    fn disappearing_channel_emits_watch_stop() {
        let previous = snapshot(vec![sample(1, 1000, &["1.1.1.1"])]);
        let current = snapshot(vec![]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.watch_stopped, vec![(1, "ch1".to_string())]);
    }

    #[test]
    fn byte_counter_reset_clamps_delta_to_zero() {
        let previous = snapshot(vec![sample(1, 5000, &["1.1.1.1"])]);
        let current = snapshot(vec![sample(1, 100, &["1.1.1.1"])]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.channel_deltas[0].bytes_delta, 0);
    }

    #[test]
    fn new_and_departed_ips_are_both_reported() {
        let previous = snapshot(vec![sample(1, 1000, &["1.1.1.1", "2.2.2.2"])]);
        let current = snapshot(vec![sample(1, 2000, &["2.2.2.2", "3.3.3.3"])]);
        let diff = diff(&previous, &current);
        let changes = &diff.channel_deltas[0].connection_changes;
        assert!(changes.contains(&ConnectionChange::Opened("3.3.3.3".to_string())));
        assert!(changes.contains(&ConnectionChange::Closed("1.1.1.1".to_string())));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn missing_channel_name_falls_back_to_cache_then_placeholder() {
        let mut cache = HashMap::new();
        cache.insert(2, "Cached Name".to_string());
        let mut raw = sample(2, 100, &[]);
        raw.channel_name = None;
        let response = ChannelStatsResponse { channels: vec![raw] };
        let snap = PollSnapshot::from_response(&response, &cache);
        assert_eq!(snap.channels[&2].channel_name, "Cached Name");
    }

    #[test]
    fn totals_aggregate_across_channels() {
        let previous = snapshot(vec![]);
        let current = snapshot(vec![sample(1, 1000, &["1.1.1.1"]), sample(2, 2000, &["2.2.2.2", "3.3.3.3"])]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.total_bytes_delta, 3000);
        assert_eq!(diff.peak_clients, 3);
        assert_eq!(diff.peak_channels, 2);
    }

    #[test]
    fn in_delta_splits_the_byte_delta_across_clients_out_delta_does_not() {
        let previous = snapshot(vec![]);
        // Channel 1: one client, the whole delta is its inbound share.
        // Channel 2: two clients, each absorbs half; outbound is unsplit.
        let current = snapshot(vec![sample(1, 1000, &["1.1.1.1"]), sample(2, 2000, &["2.2.2.2", "3.3.3.3"])]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.total_bytes_in_delta, 1000 + 1000, "2000 split across 2 clients is 1000 each");
        assert_eq!(diff.total_bytes_out_delta, 1000 + 2000, "outbound is always the full per-channel delta");
    }

    #[test]
    fn in_delta_falls_back_to_the_full_delta_with_no_clients() {
        let previous = snapshot(vec![sample(1, 1000, &[])]);
        let current = snapshot(vec![sample(1, 1500, &[])]);
        let diff = diff(&previous, &current);
        assert_eq!(diff.channel_deltas[0].client_count, 0);
        assert_eq!(diff.total_bytes_in_delta, 500, "max(client_count, 1) avoids dividing by zero");
        assert_eq!(diff.total_bytes_out_delta, 500);
    }
}
