//! Bucket key derivation.
//!
//! Keys are `account_` followed by either the occurrence id
//! (`block_index`) or the UTC calendar fields of the timestamp. Months are
//! zero-based and nothing is padded, so March 2023 is `A_2023_2` and
//! 15 March 2023 is `A_2023_2_15`.

use chrono::{DateTime, Datelike, Utc};
use stakeledger_core::{BlockNumber, Granularity, OccurrenceId};

/// Derive the record id for `account` at `granularity`.
///
/// `occurrence` is only used for [`Granularity::Occurrence`]; `timestamp` only
/// for the calendar granularities.
pub fn derive_key(
    account: &str,
    occurrence: OccurrenceId,
    timestamp: DateTime<Utc>,
    granularity: Granularity,
) -> String {
    match granularity {
        Granularity::Occurrence => occurrence_key(account, occurrence),
        Granularity::Year => year_key(account, timestamp),
        Granularity::Month => month_key(account, timestamp),
        Granularity::Day => day_key(account, timestamp),
    }
}

pub fn occurrence_key(account: &str, occurrence: OccurrenceId) -> String {
    format!("{account}_{occurrence}")
}

pub fn year_key(account: &str, timestamp: DateTime<Utc>) -> String {
    format!("{account}_{}", timestamp.year())
}

pub fn month_key(account: &str, timestamp: DateTime<Utc>) -> String {
    format!("{account}_{}_{}", timestamp.year(), timestamp.month0())
}

pub fn day_key(account: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{account}_{}_{}_{}",
        timestamp.year(),
        timestamp.month0(),
        timestamp.day()
    )
}

/// Replay marker id: block number and the event's position in the block.
/// Not account-scoped; one position holds exactly one event.
pub fn seen_key(block_number: BlockNumber, position: u32) -> String {
    format!("{block_number}_{position}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_calendar_keys() {
        let t = ts(2023, 3, 15, 10);
        let occ = OccurrenceId::new(1, 0);
        assert_eq!(derive_key("A", occ, t, Granularity::Year), "A_2023");
        assert_eq!(derive_key("A", occ, t, Granularity::Month), "A_2023_2");
        assert_eq!(derive_key("A", occ, t, Granularity::Day), "A_2023_2_15");
    }

    #[test]
    fn test_seen_key_uses_event_position() {
        assert_eq!(seen_key(100, 7), "100_7");
        assert_ne!(seen_key(100, 1), seen_key(100, 2));
    }

    #[test]
    fn test_occurrence_key_ignores_timestamp() {
        let occ = OccurrenceId::new(100, 4);
        assert_eq!(
            derive_key("X", occ, ts(2023, 6, 1, 0), Granularity::Occurrence),
            "X_100_4"
        );
        assert_eq!(
            derive_key("X", occ, ts(1999, 1, 1, 0), Granularity::Occurrence),
            "X_100_4"
        );
    }

    #[test]
    fn test_month_boundaries_unpadded() {
        assert_eq!(month_key("A", ts(2023, 1, 1, 0)), "A_2023_0");
        assert_eq!(month_key("A", ts(2023, 12, 31, 23)), "A_2023_11");
        assert_eq!(day_key("A", ts(2023, 1, 5, 0)), "A_2023_0_5");
    }

    #[test]
    fn test_keys_use_utc_fields() {
        // 2023-03-15T23:30:00-05:00 is already the 16th in UTC.
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2023, 3, 15, 23, 30, 0).unwrap();
        let utc = local.with_timezone(&Utc);
        assert_eq!(day_key("A", utc), "A_2023_2_16");

        // New year's eve in UTC+9 is still the previous year in UTC.
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = tokyo.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        assert_eq!(year_key("A", local.with_timezone(&Utc)), "A_2023");
    }

    #[test]
    fn test_same_period_collides() {
        let morning = ts(2023, 3, 15, 0);
        let night = Utc.with_ymd_and_hms(2023, 3, 15, 23, 59, 59).unwrap();
        assert_eq!(day_key("A", morning), day_key("A", night));
        assert_ne!(day_key("A", morning), day_key("B", morning));
    }
}
