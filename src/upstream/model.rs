//! Types shared with the upstream IPTV backend.
//!
//! These mirror spec.md §3's Stream/Channel/Group/Provider shapes. Streams,
//! channels, and groups are owned by the upstream; this crate only reads and
//! mutates them through [`super::UpstreamClient`].

use serde::{Deserialize, Serialize};

/// An immutable snapshot of one provider stream, taken at the start of a
/// pipeline run. Never mutated during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stream {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub group_name: Option<String>,
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub logo_url: Option<String>,
    pub provider_id: i64,
    pub provider_name: String,
    pub resolution_height: Option<u32>,
    pub normalized_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub channel_number: i64,
    pub group_id: Option<i64>,
    pub streams: Vec<i64>,
    pub tvg_id: Option<String>,
    pub logo_id: Option<i64>,
    pub epg_data_id: Option<i64>,
    pub auto_created: bool,
    pub auto_created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub max_streams: i64,
    pub search_pattern: Option<String>,
    pub replace_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub max_streams: i64,
    pub priority: i64,
    pub profiles: Vec<Profile>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgSource {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpgDataEntry {
    pub id: i64,
    pub tvg_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSample {
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStatsSample {
    pub channel_id: i64,
    pub channel_number: Option<i64>,
    pub channel_name: Option<String>,
    pub total_bytes: i64,
    pub client_count: i64,
    pub avg_bitrate_kbps: Option<i64>,
    pub m3u_profile_id: Option<i64>,
    pub clients: Vec<ClientSample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelStatsResponse {
    pub channels: Vec<ChannelStatsSample>,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

/// Fields accepted by `create_channel` / `update_channel`. `None` means
/// "leave unchanged" on update and "use the upstream default" on create.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_number: Option<i64>,
    /// `None` leaves the group unchanged; `Some(None)` clears it
    /// (uncategorized) and `Some(Some(id))` reassigns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvg_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epg_data_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_created_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_ids: Option<Vec<i64>>,
}
