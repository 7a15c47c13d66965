//! Stream probing: invoke `ffprobe` for codec/resolution facts, then
//! sample the stream itself over the wire for real-world bitrate.
//!
//! The subprocess half has no analogue in the teacher (it never shells
//! out), so it is grounded in the common `tokio::process::Command` +
//! JSON-stdout idiom; the throughput half reuses the teacher's own
//! `server::handlers::try_connect_stream` pattern of a `reqwest::Client`
//! pulling a `bytes_stream()` and accumulating lengths rather than
//! buffering the whole body.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub resolution: Option<String>,
    pub resolution_height: Option<i32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<i32>,
    pub fps: Option<f32>,
    pub video_bitrate: Option<i64>,
    pub stream_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailureKind {
    /// Timed out, connection refused, 5xx, malformed ffprobe output — worth
    /// retrying per spec.md §4.4's retry policy.
    Transient,
    /// 404 from the stream itself — retrying is pointless.
    NotFound,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("probe failed: {message}")]
pub struct ProbeError {
    pub kind: ProbeFailureKind,
    pub message: String,
}

impl ProbeError {
    fn transient(message: impl Into<String>) -> Self {
        Self { kind: ProbeFailureKind::Transient, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { kind: ProbeFailureKind::NotFound, message: message.into() }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ProbeFailureKind::Transient
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
    channels: Option<i32>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
}

fn parse_frame_rate(raw: &str) -> Option<f32> {
    let (num, den) = raw.split_once('/')?;
    let num: f32 = num.parse().ok()?;
    let den: f32 = den.parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

/// Runs `ffprobe -print_format json -show_streams <url>` with `timeout_secs`
/// as a hard wall-clock bound, parsing the resulting stream facts.
pub async fn probe_codec_facts(url: &str, timeout_secs: u64) -> Result<ProbeOutcome, ProbeError> {
    let run = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg(url)
        .output();

    let output = timeout(Duration::from_secs(timeout_secs), run)
        .await
        .map_err(|_| ProbeError::transient("ffprobe timed out"))?
        .map_err(|e| ProbeError::transient(format!("failed to spawn ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("404") || stderr.to_lowercase().contains("not found") {
            return Err(ProbeError::not_found(stderr.to_string()));
        }
        return Err(ProbeError::transient(format!("ffprobe exited with {}: {stderr}", output.status)));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| ProbeError::transient(format!("unparseable ffprobe output: {e}")))?;

    let video = parsed.streams.iter().find(|s| s.codec_type == "video");
    let audio = parsed.streams.iter().find(|s| s.codec_type == "audio");

    let resolution_height = video.and_then(|v| v.height);
    let resolution = match (video.and_then(|v| v.width), resolution_height) {
        (Some(w), Some(h)) => Some(format!("{w}x{h}")),
        _ => None,
    };

    Ok(ProbeOutcome {
        resolution,
        resolution_height,
        video_codec: video.and_then(|v| v.codec_name.clone()),
        audio_codec: audio.and_then(|a| a.codec_name.clone()),
        audio_channels: audio.and_then(|a| a.channels),
        fps: video.and_then(|v| v.avg_frame_rate.as_deref()).and_then(parse_frame_rate),
        video_bitrate: video.and_then(|v| v.bit_rate.as_deref()).and_then(|b| b.parse().ok()),
        stream_type: video.map(|_| "video".to_string()),
    })
}

/// Pulls real bytes from `url` for `duration_secs` and returns the
/// observed bitrate in kbps, rather than trusting a provider-reported
/// number. Any byte transferred at all counts as a live stream even if
/// the window closes early.
pub async fn sample_bitrate_kbps(client: &reqwest::Client, url: &str, duration_secs: u64) -> Result<i64, ProbeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| {
            if e.status().map(|s| s.as_u16()) == Some(404) {
                ProbeError::not_found(e.to_string())
            } else {
                ProbeError::transient(e.to_string())
            }
        })?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ProbeError::not_found("stream returned 404"));
    }
    if !response.status().is_success() {
        return Err(ProbeError::transient(format!("stream returned {}", response.status())));
    }

    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration_secs);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, stream.next()).await {
            Ok(Some(Ok(chunk))) => total_bytes += chunk.len() as u64,
            Ok(Some(Err(e))) => return Err(ProbeError::transient(e.to_string())),
            Ok(None) => break,
            Err(_) => break,
        }
    }

    if total_bytes == 0 {
        return Err(ProbeError::transient("no bytes received during sample window"));
    }

    let bits = total_bytes.saturating_mul(8);
    Ok((bits / duration_secs.max(1) / 1000) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_frame_rate() {
        let fps = parse_frame_rate("30000/1001").unwrap();
        assert!((fps - 29.970_03).abs() < 0.001);
    }

    #[test]
    fn rejects_zero_denominator() {
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[test]
    fn probe_error_transient_is_retryable() {
        let err = ProbeError::transient("boom");
        assert!(err.is_retryable());
    }

    #[test]
    fn probe_error_not_found_is_not_retryable() {
        let err = ProbeError::not_found("gone");
        assert!(!err.is_retryable());
    }
}
