//! In-memory [`UpstreamClient`] double used by every subsystem's test suite.
//!
//! Mirrors the teacher's approach of seeding fixtures directly rather than
//! standing up a real backend (`commands/test_data.rs`), generalized from a
//! one-shot DB seed into a reusable fake that the engine, executor, prober,
//! and tracker tests all construct and mutate freely.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::UpstreamError;

use super::model::*;
use super::UpstreamClient;

#[derive(Default)]
struct State {
    channels: Vec<Channel>,
    groups: Vec<Group>,
    streams: Vec<Stream>,
    providers: Vec<Provider>,
    logos: Vec<(i64, String)>,
    epg_sources: Vec<EpgSource>,
    epg_data: std::collections::HashMap<i64, Vec<EpgDataEntry>>,
    stats: ChannelStatsResponse,
    next_id: i64,
    refreshed_providers: Vec<i64>,
}

/// An in-memory stand-in for the upstream backend, seeded directly by tests.
pub struct FakeUpstreamClient {
    state: Mutex<State>,
}

impl Default for FakeUpstreamClient {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                stats: ChannelStatsResponse { channels: vec![] },
                ..Default::default()
            }),
        }
    }
}

impl FakeUpstreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(state: &mut State) -> i64 {
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    pub fn seed_channel(&self, channel: Channel) {
        self.state.lock().unwrap().channels.push(channel);
    }

    pub fn seed_group(&self, group: Group) {
        self.state.lock().unwrap().groups.push(group);
    }

    pub fn seed_stream(&self, stream: Stream) {
        self.state.lock().unwrap().streams.push(stream);
    }

    pub fn seed_provider(&self, provider: Provider) {
        self.state.lock().unwrap().providers.push(provider);
    }

    pub fn seed_epg(&self, source: EpgSource, entries: Vec<EpgDataEntry>) {
        let mut state = self.state.lock().unwrap();
        state.epg_data.insert(source.id, entries);
        state.epg_sources.push(source);
    }

    pub fn set_stats(&self, stats: ChannelStatsResponse) {
        self.state.lock().unwrap().stats = stats;
    }

    pub fn remove_stream(&self, id: i64) {
        self.state.lock().unwrap().streams.retain(|s| s.id != id);
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.state.lock().unwrap().channels.clone()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state.lock().unwrap().groups.clone()
    }

    pub fn refreshed_providers(&self) -> Vec<i64> {
        self.state.lock().unwrap().refreshed_providers.clone()
    }

    fn apply_write(channel: &mut Channel, data: &ChannelWrite) {
        if let Some(name) = &data.name {
            channel.name = name.clone();
        }
        if let Some(n) = data.channel_number {
            channel.channel_number = n;
        }
        if let Some(g) = data.group_id {
            channel.group_id = g;
        }
        if let Some(streams) = &data.streams {
            channel.streams = streams.clone();
        }
        if let Some(tvg) = &data.tvg_id {
            channel.tvg_id = Some(tvg.clone());
        }
        if let Some(logo) = data.logo_id {
            channel.logo_id = Some(logo);
        }
        if let Some(epg) = data.epg_data_id {
            channel.epg_data_id = Some(epg);
        }
        if let Some(ac) = data.auto_created {
            channel.auto_created = ac;
        }
        if let Some(by) = data.auto_created_by {
            channel.auto_created_by = Some(by);
        }
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstreamClient {
    async fn list_channels(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
        group: Option<i64>,
    ) -> Result<Page<Channel>, UpstreamError> {
        let state = self.state.lock().unwrap();
        let mut filtered: Vec<Channel> = state
            .channels
            .iter()
            .filter(|c| search.map(|s| c.name.contains(s)).unwrap_or(true))
            .filter(|c| group.map(|g| c.group_id == Some(g)).unwrap_or(true))
            .cloned()
            .collect();
        filtered.sort_by_key(|c| c.id);
        let count = filtered.len() as i64;
        let start = ((page.saturating_sub(1)) * page_size) as usize;
        let end = (start + page_size as usize).min(filtered.len());
        let results = if start < filtered.len() {
            filtered[start..end].to_vec()
        } else {
            vec![]
        };
        Ok(Page { count, results })
    }

    async fn get_channel(&self, id: i64) -> Result<Channel, UpstreamError> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(UpstreamError::NotFound { kind: "channel", id: id.to_string() })
    }

    async fn create_channel(&self, data: ChannelWrite) -> Result<Channel, UpstreamError> {
        let mut state = self.state.lock().unwrap();
        if let Some(name) = &data.name {
            if state.channels.iter().any(|c| &c.name == name) {
                return Err(UpstreamError::Duplicate { kind: "channel", name: name.clone() });
            }
        }
        let id = Self::next_id(&mut state);
        let mut channel = Channel {
            id,
            name: data.name.clone().unwrap_or_default(),
            channel_number: data.channel_number.unwrap_or(0),
            group_id: data.group_id.flatten(),
            streams: data.streams.clone().unwrap_or_default(),
            tvg_id: data.tvg_id.clone(),
            logo_id: data.logo_id,
            epg_data_id: data.epg_data_id,
            auto_created: data.auto_created.unwrap_or(false),
            auto_created_by: data.auto_created_by,
        };
        Self::apply_write(&mut channel, &data);
        state.channels.push(channel.clone());
        Ok(channel)
    }

    async fn update_channel(&self, id: i64, data: ChannelWrite) -> Result<Channel, UpstreamError> {
        let mut state = self.state.lock().unwrap();
        let channel = state
            .channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(UpstreamError::NotFound { kind: "channel", id: id.to_string() })?;
        Self::apply_write(channel, &data);
        Ok(channel.clone())
    }

    async fn delete_channel(&self, id: i64) -> Result<(), UpstreamError> {
        let mut state = self.state.lock().unwrap();
        let before = state.channels.len();
        state.channels.retain(|c| c.id != id);
        if state.channels.len() == before {
            return Err(UpstreamError::NotFound { kind: "channel", id: id.to_string() });
        }
        Ok(())
    }

    async fn assign_channel_numbers(&self, ids: &[i64], starting: i64) -> Result<(), UpstreamError> {
        let mut state = self.state.lock().unwrap();
        for (offset, id) in ids.iter().enumerate() {
            if let Some(c) = state.channels.iter_mut().find(|c| c.id == *id) {
                c.channel_number = starting + offset as i64;
            }
        }
        Ok(())
    }

    async fn list_channel_groups(&self) -> Result<Vec<Group>, UpstreamError> {
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn create_channel_group(&self, name: &str) -> Result<Group, UpstreamError> {
        let mut state = self.state.lock().unwrap();
        if state.groups.iter().any(|g| g.name == name) {
            return Err(UpstreamError::Duplicate { kind: "group", name: name.to_string() });
        }
        let id = Self::next_id(&mut state);
        let group = Group { id, name: name.to_string() };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn update_channel_group(&self, id: i64, name: &str) -> Result<Group, UpstreamError> {
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(UpstreamError::NotFound { kind: "group", id: id.to_string() })?;
        group.name = name.to_string();
        Ok(group.clone())
    }

    async fn delete_channel_group(&self, id: i64) -> Result<(), UpstreamError> {
        let mut state = self.state.lock().unwrap();
        let before = state.groups.len();
        state.groups.retain(|g| g.id != id);
        if state.groups.len() == before {
            return Err(UpstreamError::NotFound { kind: "group", id: id.to_string() });
        }
        Ok(())
    }

    async fn list_streams(
        &self,
        page: u32,
        page_size: u32,
        provider_id: Option<i64>,
    ) -> Result<Page<Stream>, UpstreamError> {
        let state = self.state.lock().unwrap();
        let filtered: Vec<Stream> = state
            .streams
            .iter()
            .filter(|s| provider_id.map(|p| s.provider_id == p).unwrap_or(true))
            .cloned()
            .collect();
        let count = filtered.len() as i64;
        let start = ((page.saturating_sub(1)) * page_size) as usize;
        let end = (start + page_size as usize).min(filtered.len());
        let results = if start < filtered.len() {
            filtered[start..end].to_vec()
        } else {
            vec![]
        };
        Ok(Page { count, results })
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, UpstreamError> {
        Ok(self.state.lock().unwrap().providers.clone())
    }

    async fn get_provider(&self, id: i64) -> Result<Provider, UpstreamError> {
        self.state
            .lock()
            .unwrap()
            .providers
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(UpstreamError::NotFound { kind: "provider", id: id.to_string() })
    }

    async fn refresh_provider(&self, id: i64) -> Result<(), UpstreamError> {
        self.state.lock().unwrap().refreshed_providers.push(id);
        Ok(())
    }

    async fn create_logo(&self, url: &str) -> Result<i64, UpstreamError> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state);
        state.logos.push((id, url.to_string()));
        Ok(id)
    }

    async fn find_logo_by_url(&self, url: &str) -> Result<Option<i64>, UpstreamError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .logos
            .iter()
            .find(|(_, u)| u == url)
            .map(|(id, _)| *id))
    }

    async fn list_epg_sources(&self) -> Result<Vec<EpgSource>, UpstreamError> {
        Ok(self.state.lock().unwrap().epg_sources.clone())
    }

    async fn get_epg_data(&self, source_id: i64) -> Result<Vec<EpgDataEntry>, UpstreamError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .epg_data
            .get(&source_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_channel_stats(&self) -> Result<ChannelStatsResponse, UpstreamError> {
        Ok(self.state.lock().unwrap().stats.clone())
    }
}
