//! Channel number allocation for `create_channel` and `set_channel_number`.
//!
//! `"auto"` picks the lowest unused number; an integer literal is taken
//! as-is (collisions are the rule author's problem, per spec.md §4.2);
//! `"N-M"` picks the lowest unused number inside the inclusive range.

use std::collections::BTreeSet;

use crate::error::ExecutorError;

pub fn allocate(spec: &str, used: &BTreeSet<i64>) -> Result<i64, ExecutorError> {
    let spec = spec.trim();

    if spec.eq_ignore_ascii_case("auto") {
        return Ok(lowest_unused(used, 1));
    }

    if let Some((lo, hi)) = spec.split_once('-') {
        let lo: i64 = lo.trim().parse().map_err(|_| invalid(spec))?;
        let hi: i64 = hi.trim().parse().map_err(|_| invalid(spec))?;
        if lo > hi {
            return Err(invalid(spec));
        }
        for candidate in lo..=hi {
            if !used.contains(&candidate) {
                return Ok(candidate);
            }
        }
        return Err(ExecutorError::NoChannelNumberAvailable);
    }

    spec.parse::<i64>().map_err(|_| invalid(spec))
}

fn lowest_unused(used: &BTreeSet<i64>, start: i64) -> i64 {
    let mut candidate = start;
    while used.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

fn invalid(spec: &str) -> ExecutorError {
    ExecutorError::InvalidChannelNumber(spec.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_picks_lowest_unused() {
        let used = BTreeSet::from([1, 2, 4]);
        assert_eq!(allocate("auto", &used).unwrap(), 3);
    }

    #[test]
    fn auto_starts_at_one_when_empty() {
        assert_eq!(allocate("auto", &BTreeSet::new()).unwrap(), 1);
    }

    #[test]
    fn integer_literal_is_taken_as_is() {
        assert_eq!(allocate("105", &BTreeSet::from([1, 2])).unwrap(), 105);
    }

    #[test]
    fn range_picks_lowest_unused_in_range() {
        let used = BTreeSet::from([100, 101]);
        assert_eq!(allocate("100-110", &used).unwrap(), 102);
    }

    #[test]
    fn range_exhausted_errors() {
        let used = BTreeSet::from([100, 101]);
        assert!(matches!(
            allocate("100-101", &used),
            Err(ExecutorError::NoChannelNumberAvailable)
        ));
    }

    #[test]
    fn malformed_spec_errors() {
        assert!(allocate("not-a-number", &BTreeSet::new()).is_err());
    }
}
