//! Channel/group lookup indices maintained by the [`super::ActionExecutor`].
//!
//! spec.md §9 calls for separate hash maps keyed by each lookup string,
//! populated once from the channel/group lists and updated in place
//! whenever `create_channel`/`create_group` succeeds — no cycles, since
//! channels only reference streams by id.

use std::collections::{BTreeSet, HashMap};

use crate::normalize::{base_name, deparenthesize, extract_call_sign, normalize_name};
use crate::upstream::{Channel, Group};

#[derive(Debug, Default)]
pub struct ChannelIndex {
    pub by_id: HashMap<i64, Channel>,
    by_lower_name: HashMap<String, i64>,
    by_base_name: HashMap<String, i64>,
    by_normalized_name: HashMap<String, i64>,
    by_call_sign: HashMap<String, i64>,
    by_deparenthesized: HashMap<String, i64>,
    used_numbers: BTreeSet<i64>,
}

impl ChannelIndex {
    pub fn build(channels: Vec<Channel>) -> Self {
        let mut index = Self::default();
        for channel in channels {
            index.insert(channel);
        }
        index
    }

    pub fn insert(&mut self, channel: Channel) {
        let id = channel.id;
        self.used_numbers.insert(channel.channel_number);
        self.by_lower_name.insert(channel.name.to_lowercase(), id);
        self.by_base_name.insert(base_name(&channel.name).to_lowercase(), id);
        self.by_normalized_name.insert(normalize_name(&channel.name), id);
        self.by_deparenthesized.insert(deparenthesize(&channel.name).to_lowercase(), id);
        if let Some(call_sign) = extract_call_sign(&channel.name) {
            self.by_call_sign.insert(call_sign, id);
        }
        self.by_id.insert(id, channel);
    }

    pub fn remove(&mut self, id: i64) {
        if let Some(channel) = self.by_id.remove(&id) {
            self.used_numbers.remove(&channel.channel_number);
            self.by_lower_name.remove(&channel.name.to_lowercase());
            self.by_base_name.remove(&base_name(&channel.name).to_lowercase());
            self.by_normalized_name.remove(&normalize_name(&channel.name));
            self.by_deparenthesized.remove(&deparenthesize(&channel.name).to_lowercase());
            if let Some(call_sign) = extract_call_sign(&channel.name) {
                self.by_call_sign.remove(&call_sign);
            }
        }
    }

    pub fn get(&self, id: i64) -> Option<&Channel> {
        self.by_id.get(&id)
    }

    pub fn by_exact_name(&self, name: &str) -> Option<&Channel> {
        self.by_lower_name.get(&name.to_lowercase()).and_then(|id| self.by_id.get(id))
    }

    pub fn by_base_name(&self, name: &str) -> Option<&Channel> {
        self.by_base_name.get(&base_name(name).to_lowercase()).and_then(|id| self.by_id.get(id))
    }

    pub fn by_normalized_name(&self, name: &str) -> Option<&Channel> {
        self.by_normalized_name.get(&normalize_name(name)).and_then(|id| self.by_id.get(id))
    }

    pub fn by_deparenthesized(&self, name: &str) -> Option<&Channel> {
        self.by_deparenthesized.get(&deparenthesize(name).to_lowercase()).and_then(|id| self.by_id.get(id))
    }

    pub fn by_call_sign(&self, name: &str) -> Option<&Channel> {
        extract_call_sign(name).and_then(|cs| self.by_call_sign.get(&cs)).and_then(|id| self.by_id.get(id))
    }

    /// Single-candidate word-prefix containment: a channel whose
    /// normalized name starts with the query's first word, but only if
    /// exactly one such channel exists (an ambiguous match is no match).
    pub fn by_word_prefix(&self, name: &str) -> Option<&Channel> {
        let normalized = normalize_name(name);
        let first_word = normalized.split_whitespace().next()?;
        if first_word.len() < 3 {
            return None;
        }
        let mut candidates = self
            .by_normalized_name
            .iter()
            .filter(|(candidate, _)| candidate.starts_with(first_word));
        let (_, id) = candidates.next()?;
        if candidates.next().is_some() {
            return None;
        }
        self.by_id.get(id)
    }

    pub fn used_numbers(&self) -> &BTreeSet<i64> {
        &self.used_numbers
    }

    pub fn all(&self) -> impl Iterator<Item = &Channel> {
        self.by_id.values()
    }
}

#[derive(Debug, Default)]
pub struct GroupIndex {
    pub by_id: HashMap<i64, Group>,
    by_lower_name: HashMap<String, i64>,
}

impl GroupIndex {
    pub fn build(groups: Vec<Group>) -> Self {
        let mut index = Self::default();
        for group in groups {
            index.insert(group);
        }
        index
    }

    pub fn insert(&mut self, group: Group) {
        self.by_lower_name.insert(group.name.to_lowercase(), group.id);
        self.by_id.insert(group.id, group);
    }

    pub fn remove(&mut self, id: i64) {
        if let Some(group) = self.by_id.remove(&id) {
            self.by_lower_name.remove(&group.name.to_lowercase());
        }
    }

    pub fn by_name(&self, name: &str) -> Option<&Group> {
        self.by_lower_name.get(&name.to_lowercase()).and_then(|id| self.by_id.get(id))
    }

    pub fn get(&self, id: i64) -> Option<&Group> {
        self.by_id.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: i64, name: &str, number: i64) -> Channel {
        Channel {
            id,
            name: name.to_string(),
            channel_number: number,
            group_id: None,
            streams: vec![],
            tvg_id: None,
            logo_id: None,
            epg_data_id: None,
            auto_created: true,
            auto_created_by: None,
        }
    }

    #[test]
    fn finds_by_all_lookup_keys() {
        let index = ChannelIndex::build(vec![channel(1, "105 | ESPN (East) HD", 105)]);
        assert!(index.by_exact_name("105 | ESPN (East) HD").is_some());
        assert!(index.by_base_name("ESPN (East) HD").is_some());
        assert!(index.by_normalized_name("ESPN East").is_some());
    }

    #[test]
    fn call_sign_lookup() {
        let index = ChannelIndex::build(vec![channel(1, "ABC 7 New York (WABC)", 7)]);
        assert!(index.by_call_sign("WABC New York HD").is_some());
    }

    #[test]
    fn word_prefix_requires_unique_candidate() {
        let index = ChannelIndex::build(vec![
            channel(1, "Sports Network One", 1),
            channel(2, "Sports Network Two", 2),
        ]);
        assert!(index.by_word_prefix("Sports Channel").is_none());

        let unique = ChannelIndex::build(vec![channel(1, "UniqueNetwork Feed", 1)]);
        assert!(unique.by_word_prefix("UniqueNetwork Alt Feed").is_some());
    }

    #[test]
    fn remove_clears_all_indices() {
        let mut index = ChannelIndex::build(vec![channel(1, "ESPN HD", 10)]);
        index.remove(1);
        assert!(index.by_exact_name("ESPN HD").is_none());
        assert!(!index.used_numbers().contains(&10));
    }
}
