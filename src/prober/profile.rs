//! Per-provider profile selection for outbound probe connections.
//!
//! A provider account offers multiple [`Profile`](crate::upstream::Profile)
//! entries, each with its own `max_streams` ceiling. The prober must pick
//! one profile per dispatched probe without exceeding any profile's cap,
//! the same bin-packing problem the teacher solves for playback sessions
//! in `matcher::assign_profile`, generalized here to three selectable
//! strategies instead of one fixed rule.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::upstream::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStrategy {
    FillFirst,
    RoundRobin,
    LeastLoaded,
}

impl ProfileStrategy {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "round_robin" => Self::RoundRobin,
            "least_loaded" => Self::LeastLoaded,
            _ => Self::FillFirst,
        }
    }
}

/// Tracks in-flight probe reservations per profile so concurrent dispatch
/// decisions never oversubscribe a profile's `max_streams`.
#[derive(Default)]
pub struct ProfileLoad {
    in_flight: Mutex<HashMap<i64, i64>>,
    round_robin_cursor: Mutex<HashMap<i64, usize>>,
}

impl ProfileLoad {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self, profile_id: i64) -> i64 {
        *self.in_flight.lock().unwrap().get(&profile_id).unwrap_or(&0)
    }

    /// Picks an eligible profile for `provider_id`'s next probe and
    /// reserves a slot on it. Returns `None` when every profile is full.
    pub fn reserve(&self, provider_id: i64, profiles: &[Profile], strategy: ProfileStrategy) -> Option<i64> {
        let eligible: Vec<&Profile> = profiles
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| p.max_streams <= 0 || self.current(p.id) < p.max_streams)
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let chosen = match strategy {
            ProfileStrategy::FillFirst => eligible[0],
            ProfileStrategy::LeastLoaded => eligible
                .iter()
                .min_by_key(|p| self.current(p.id))
                .copied()
                .unwrap(),
            ProfileStrategy::RoundRobin => {
                let mut cursors = self.round_robin_cursor.lock().unwrap();
                let cursor = cursors.entry(provider_id).or_insert(0);
                let chosen = eligible[*cursor % eligible.len()];
                *cursor = (*cursor + 1) % eligible.len();
                chosen
            }
        };

        *self.in_flight.lock().unwrap().entry(chosen.id).or_insert(0) += 1;
        Some(chosen.id)
    }

    pub fn release(&self, profile_id: i64) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(count) = in_flight.get_mut(&profile_id) {
            *count = (*count - 1).max(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: i64, max_streams: i64) -> Profile {
        Profile { id, name: format!("p{id}"), is_default: false, is_active: true, max_streams, search_pattern: None, replace_pattern: None }
    }

    #[test]
    fn fill_first_always_picks_first_eligible() {
        let load = ProfileLoad::new();
        let profiles = vec![profile(1, 2), profile(2, 2)];
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), Some(1));
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), Some(1));
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), Some(2));
    }

    #[test]
    fn round_robin_alternates() {
        let load = ProfileLoad::new();
        let profiles = vec![profile(1, 10), profile(2, 10)];
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::RoundRobin), Some(1));
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::RoundRobin), Some(2));
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::RoundRobin), Some(1));
    }

    #[test]
    fn least_loaded_prefers_emptiest_profile() {
        let load = ProfileLoad::new();
        let profiles = vec![profile(1, 10), profile(2, 10)];
        load.reserve(1, &profiles, ProfileStrategy::FillFirst);
        load.reserve(1, &profiles, ProfileStrategy::FillFirst);
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::LeastLoaded), Some(2));
    }

    #[test]
    fn full_profiles_return_none() {
        let load = ProfileLoad::new();
        let profiles = vec![profile(1, 1)];
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), Some(1));
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), None);
        load.release(1);
        assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), Some(1));
    }

    #[test]
    fn unlimited_profile_is_always_eligible() {
        let load = ProfileLoad::new();
        let profiles = vec![profile(1, 0)];
        for _ in 0..50 {
            assert_eq!(load.reserve(1, &profiles, ProfileStrategy::FillFirst), Some(1));
        }
    }
}
