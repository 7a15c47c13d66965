//! The upstream IPTV backend interface.
//!
//! spec.md §1 treats the upstream REST client as an interface we adapt to,
//! not something this crate owns end-to-end. [`UpstreamClient`] is that
//! interface; [`client::HttpUpstreamClient`] is the one production
//! implementation, and [`fake::FakeUpstreamClient`] is the in-memory double
//! every other subsystem's tests are written against.

pub mod client;
pub mod fake;
pub mod model;

use async_trait::async_trait;

pub use client::HttpUpstreamClient;
pub use fake::FakeUpstreamClient;
pub use model::*;

use crate::error::UpstreamError;

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn list_channels(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
        group: Option<i64>,
    ) -> Result<Page<Channel>, UpstreamError>;

    async fn get_channel(&self, id: i64) -> Result<Channel, UpstreamError>;
    async fn create_channel(&self, data: ChannelWrite) -> Result<Channel, UpstreamError>;
    async fn update_channel(&self, id: i64, data: ChannelWrite) -> Result<Channel, UpstreamError>;
    async fn delete_channel(&self, id: i64) -> Result<(), UpstreamError>;
    async fn assign_channel_numbers(&self, ids: &[i64], starting: i64) -> Result<(), UpstreamError>;

    async fn list_channel_groups(&self) -> Result<Vec<Group>, UpstreamError>;
    async fn create_channel_group(&self, name: &str) -> Result<Group, UpstreamError>;
    async fn update_channel_group(&self, id: i64, name: &str) -> Result<Group, UpstreamError>;
    async fn delete_channel_group(&self, id: i64) -> Result<(), UpstreamError>;

    async fn list_streams(
        &self,
        page: u32,
        page_size: u32,
        provider_id: Option<i64>,
    ) -> Result<Page<Stream>, UpstreamError>;

    async fn list_providers(&self) -> Result<Vec<Provider>, UpstreamError>;
    async fn get_provider(&self, id: i64) -> Result<Provider, UpstreamError>;
    async fn refresh_provider(&self, id: i64) -> Result<(), UpstreamError>;

    async fn create_logo(&self, url: &str) -> Result<i64, UpstreamError>;
    async fn find_logo_by_url(&self, url: &str) -> Result<Option<i64>, UpstreamError>;

    async fn list_epg_sources(&self) -> Result<Vec<EpgSource>, UpstreamError>;
    async fn get_epg_data(&self, source_id: i64) -> Result<Vec<EpgDataEntry>, UpstreamError>;

    async fn get_channel_stats(&self) -> Result<ChannelStatsResponse, UpstreamError>;
}

/// Delete an entity, treating a 404 as success per spec.md §7's idempotent-delete contract.
pub async fn delete_channel_idempotent(
    client: &dyn UpstreamClient,
    id: i64,
) -> Result<(), UpstreamError> {
    match client.delete_channel(id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn delete_group_idempotent(
    client: &dyn UpstreamClient,
    id: i64,
) -> Result<(), UpstreamError> {
    match client.delete_channel_group(id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}
