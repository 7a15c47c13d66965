//! Auto-reorder-after-probe: ranks the streams attached to one channel by
//! the quality facts the probe just collected (spec.md §4.4).

use crate::db::models::StreamStats;

/// Sort key tuple, compared element-by-element, each as a descending
/// preference (higher is better, probed-but-failed streams sink to the
/// bottom when `deprioritize_failed_streams` is set).
fn sort_key(stats: Option<&StreamStats>, deprioritize_failed: bool) -> (i32, i32, i64, i64, i32, i32) {
    let failed = deprioritize_failed && stats.map(|s| s.probe_status != "success").unwrap_or(true);
    let resolution_height = stats.and_then(|s| s.resolution_height).unwrap_or(0);
    let fps = stats.and_then(|s| s.fps).map(|f| (f * 100.0) as i32).unwrap_or(0);
    let bitrate = stats.and_then(|s| s.bitrate).unwrap_or(0);
    let audio_channels = stats.and_then(|s| s.audio_channels).unwrap_or(0);
    (
        if failed { 0 } else { 1 },
        resolution_height,
        bitrate,
        fps as i64,
        audio_channels,
        0,
    )
}

/// Orders `stream_ids` best-first using each stream's latest probe result
/// (`resolution_height desc, bitrate desc, fps desc, m3u_priority desc,
/// audio_channels desc`), falling back to the existing position for
/// streams with no probe data so an un-probed stream never jumps ahead of
/// one with real evidence.
pub fn reorder_streams(
    stream_ids: &[i64],
    m3u_priority: impl Fn(i64) -> i64,
    stats_for: impl Fn(i64) -> Option<StreamStats>,
    deprioritize_failed_streams: bool,
) -> Vec<i64> {
    let mut indexed: Vec<(usize, i64)> = stream_ids.iter().copied().enumerate().collect();
    indexed.sort_by(|(idx_a, a), (idx_b, b)| {
        let stats_a = stats_for(*a);
        let stats_b = stats_for(*b);
        let key_a = sort_key(stats_a.as_ref(), deprioritize_failed_streams);
        let key_b = sort_key(stats_b.as_ref(), deprioritize_failed_streams);
        key_b
            .0
            .cmp(&key_a.0)
            .then(key_b.1.cmp(&key_a.1))
            .then(key_b.2.cmp(&key_a.2))
            .then(key_b.3.cmp(&key_a.3))
            .then(m3u_priority(*b).cmp(&m3u_priority(*a)))
            .then(key_b.4.cmp(&key_a.4))
            .then(idx_a.cmp(idx_b))
    });
    indexed.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(id: i64, resolution_height: i32, bitrate: i64, success: bool) -> StreamStats {
        StreamStats {
            stream_id: id,
            stream_name: format!("s{id}"),
            probe_status: if success { "success".into() } else { "failed".into() },
            last_probed: None,
            resolution: None,
            resolution_height: Some(resolution_height),
            video_codec: None,
            audio_codec: None,
            audio_channels: Some(2),
            fps: Some(30.0),
            bitrate: Some(bitrate),
            video_bitrate: None,
            stream_type: None,
            error_message: None,
            consecutive_failures: 0,
            dismissed_at: None,
        }
    }

    #[test]
    fn orders_by_resolution_then_bitrate_descending() {
        let rows = std::collections::HashMap::from([
            (1, stats(1, 720, 3000, true)),
            (2, stats(2, 1080, 2000, true)),
            (3, stats(3, 1080, 5000, true)),
        ]);
        let ordered = reorder_streams(&[1, 2, 3], |_| 0, |id| rows.get(&id).cloned(), true);
        assert_eq!(ordered, vec![3, 2, 1]);
    }

    #[test]
    fn deprioritizes_failed_streams_when_enabled() {
        let rows = std::collections::HashMap::from([
            (1, stats(1, 1080, 5000, false)),
            (2, stats(2, 480, 1000, true)),
        ]);
        let ordered = reorder_streams(&[1, 2], |_| 0, |id| rows.get(&id).cloned(), true);
        assert_eq!(ordered, vec![2, 1]);
    }

    #[test]
    fn keeps_failed_streams_ranked_by_quality_when_disabled() {
        let rows = std::collections::HashMap::from([
            (1, stats(1, 1080, 5000, false)),
            (2, stats(2, 480, 1000, true)),
        ]);
        let ordered = reorder_streams(&[1, 2], |_| 0, |id| rows.get(&id).cloned(), false);
        assert_eq!(ordered, vec![1, 2]);
    }

    #[test]
    fn unprobed_streams_fall_back_to_original_order() {
        let ordered = reorder_streams(&[5, 6, 7], |_| 0, |_| None, true);
        assert_eq!(ordered, vec![5, 6, 7]);
    }
}
