//! Timestamp helpers shared by the engine, journal, and tracker.
//!
//! Everything persisted as a timestamp uses RFC 3339 in UTC; the one
//! exception is `BandwidthDaily`'s date bucket, which spec.md §4.5
//! requires to follow the local timezone so a day boundary lines up with
//! what an operator actually observes.

use chrono::{Local, Utc};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Today's date in the local timezone, `YYYY-MM-DD`, used as the
/// `BandwidthDaily` primary key.
pub fn local_date_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_is_parseable() {
        let ts = now_rfc3339();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn local_date_key_has_expected_shape() {
        let key = local_date_key();
        assert_eq!(key.len(), 10);
        assert_eq!(key.chars().nth(4), Some('-'));
    }
}
