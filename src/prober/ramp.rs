//! Per-account ramp-up/ramp-down control (spec.md §4.4).
//!
//! State lives in a [`dashmap::DashMap`] rather than behind a single mutex
//! so that completions for different accounts never contend with each
//! other, the same concurrent-map pattern the teacher uses for its
//! stream-session tracking.

use std::time::{Duration, Instant};

use dashmap::DashMap;

pub const RAMP_SUCCESS_WINDOW: u32 = 3;
pub const RAMP_UNLIMITED_CAP: i64 = 4;
pub const RAMP_FAILURE_HOLD_SECONDS: u64 = 10;

#[derive(Debug, Clone)]
struct RampState {
    current_limit: i64,
    consecutive_successes: u32,
    held_until: Option<Instant>,
    in_flight: i64,
}

impl RampState {
    fn new() -> Self {
        Self { current_limit: 1, consecutive_successes: 0, held_until: None, in_flight: 0 }
    }

    fn is_held(&self) -> bool {
        self.held_until.map(|until| Instant::now() < until).unwrap_or(false)
    }
}

/// Tracks the concurrent-probe ceiling for every provider account.
#[derive(Default)]
pub struct RampController {
    accounts: DashMap<i64, RampState>,
}

impl RampController {
    pub fn new() -> Self {
        Self { accounts: DashMap::new() }
    }

    /// Current ceiling for `provider_id`, seeding a fresh account at 1.
    pub fn current_limit(&self, provider_id: i64) -> i64 {
        self.accounts.entry(provider_id).or_insert_with(RampState::new).current_limit
    }

    /// `true` when the account is within its post-overload hold window and
    /// should not receive new probe dispatches.
    pub fn is_held(&self, provider_id: i64) -> bool {
        self.accounts.get(&provider_id).map(|s| s.is_held()).unwrap_or(false)
    }

    /// Attempts to claim one of the account's in-flight dispatch slots,
    /// atomically with the hold check so a scan-and-dispatch loop never
    /// races a concurrent completion past the ramp limit. Returns `false`
    /// when the account is held or already at its current ramp ceiling;
    /// the caller must call [`Self::release`] once the claimed probe
    /// finishes.
    pub fn try_acquire(&self, provider_id: i64) -> bool {
        let mut entry = self.accounts.entry(provider_id).or_insert_with(RampState::new);
        if entry.is_held() || entry.in_flight >= entry.current_limit {
            return false;
        }
        entry.in_flight += 1;
        true
    }

    /// Releases a slot claimed by [`Self::try_acquire`].
    pub fn release(&self, provider_id: i64) {
        if let Some(mut entry) = self.accounts.get_mut(&provider_id) {
            entry.in_flight = (entry.in_flight - 1).max(0);
        }
    }

    pub fn record_success(&self, provider_id: i64, provider_max_streams: i64) {
        let mut entry = self.accounts.entry(provider_id).or_insert_with(RampState::new);
        entry.consecutive_successes += 1;
        if entry.consecutive_successes >= RAMP_SUCCESS_WINDOW {
            entry.consecutive_successes = 0;
            let cap = if provider_max_streams <= 0 { RAMP_UNLIMITED_CAP } else { provider_max_streams };
            entry.current_limit = (entry.current_limit + 1).min(cap);
        }
    }

    /// `overload` distinguishes a 429/5xx failure (ramps down and holds)
    /// from a dead-stream failure (only resets the success streak).
    pub fn record_failure(&self, provider_id: i64, overload: bool) {
        let mut entry = self.accounts.entry(provider_id).or_insert_with(RampState::new);
        entry.consecutive_successes = 0;
        if overload {
            entry.current_limit = (entry.current_limit - 1).max(1);
            entry.held_until = Some(Instant::now() + Duration::from_secs(RAMP_FAILURE_HOLD_SECONDS));
        }
    }

    pub fn reset(&self) {
        self.accounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_ramps_up_after_window() {
        let ramp = RampController::new();
        assert_eq!(ramp.current_limit(1), 1);
        for _ in 0..RAMP_SUCCESS_WINDOW {
            ramp.record_success(1, 10);
        }
        assert_eq!(ramp.current_limit(1), 2);
    }

    #[test]
    fn caps_at_unlimited_ceiling_for_zero_max_streams() {
        let ramp = RampController::new();
        for _ in 0..(RAMP_SUCCESS_WINDOW * 10) {
            ramp.record_success(1, 0);
        }
        assert_eq!(ramp.current_limit(1), RAMP_UNLIMITED_CAP);
    }

    #[test]
    fn overload_failure_ramps_down_and_holds() {
        let ramp = RampController::new();
        for _ in 0..RAMP_SUCCESS_WINDOW {
            ramp.record_success(1, 10);
        }
        assert_eq!(ramp.current_limit(1), 2);
        ramp.record_failure(1, true);
        assert_eq!(ramp.current_limit(1), 1);
        assert!(ramp.is_held(1));
    }

    #[test]
    fn non_overload_failure_resets_streak_without_ramping_down() {
        let ramp = RampController::new();
        ramp.record_success(1, 10);
        ramp.record_success(1, 10);
        ramp.record_failure(1, false);
        assert_eq!(ramp.current_limit(1), 1);
        assert!(!ramp.is_held(1));
        ramp.record_success(1, 10);
        assert_eq!(ramp.current_limit(1), 1);
    }

    #[test]
    fn current_limit_never_drops_below_one() {
        let ramp = RampController::new();
        ramp.record_failure(1, true);
        ramp.record_failure(1, true);
        assert_eq!(ramp.current_limit(1), 1);
    }

    #[test]
    fn try_acquire_refuses_once_in_flight_reaches_the_current_limit() {
        let ramp = RampController::new();
        assert!(ramp.try_acquire(1), "limit starts at 1, first slot is free");
        assert!(!ramp.try_acquire(1), "second slot exceeds the ramp limit");
        ramp.release(1);
        assert!(ramp.try_acquire(1), "releasing a slot frees it back up");
    }

    #[test]
    fn try_acquire_refuses_while_held() {
        let ramp = RampController::new();
        ramp.record_failure(1, true);
        assert!(ramp.is_held(1));
        assert!(!ramp.try_acquire(1), "a held account must not accept new dispatches");
    }
}
