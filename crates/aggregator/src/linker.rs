//! Period linking for day aggregates.
//!
//! A day aggregate points at the month and year aggregates enclosing it and
//! at the month and year aggregates one calendar unit earlier. Links are
//! only set to aggregates that already exist; the linker never creates them.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use stakeledger_core::{EventKind, Granularity};
use stakeledger_store::{Entity, PeriodLinks};
use tracing::trace;

use crate::accessor::StoreAccessor;
use crate::keys;
use crate::AggregatorError;

/// Shift a timestamp by whole calendar months, keeping day-of-month and
/// time-of-day.
///
/// A day that does not exist in the target month rolls forward into the
/// next one: 31 March minus one month is 3 March (2 March in leap years).
/// Returns `None` only outside chrono's representable range.
pub fn shift_months(timestamp: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let total = timestamp.year().checked_mul(12)? + timestamp.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_days(Days::new(u64::from(timestamp.day() - 1)))?;
    Some(Utc.from_utc_datetime(&date.and_time(timestamp.time())))
}

/// Shift a timestamp by whole calendar years with the same rollover rule
/// (29 February minus one year is 1 March).
pub fn shift_years(timestamp: DateTime<Utc>, years: i32) -> Option<DateTime<Utc>> {
    shift_months(timestamp, years.checked_mul(12)?)
}

/// Resolves the four cross-granularity links for a timestamp.
#[derive(Clone)]
pub struct PeriodLinker {
    accessor: StoreAccessor,
}

impl PeriodLinker {
    pub fn new(accessor: StoreAccessor) -> Self {
        Self { accessor }
    }

    /// Look up the enclosing and previous month/year aggregates of `kind`
    /// for `account` at `timestamp`. Missing aggregates leave the link unset.
    pub async fn resolve(
        &self,
        kind: EventKind,
        account: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<PeriodLinks, AggregatorError> {
        let month_ago = shift_months(timestamp, -1);
        let year_ago = shift_years(timestamp, -1);

        let links = PeriodLinks {
            month_id: self
                .existing(kind, Granularity::Month, Some(keys::month_key(account, timestamp)))
                .await?,
            year_id: self
                .existing(kind, Granularity::Year, Some(keys::year_key(account, timestamp)))
                .await?,
            previous_month_id: self
                .existing(kind, Granularity::Month, month_ago.map(|t| keys::month_key(account, t)))
                .await?,
            previous_year_id: self
                .existing(kind, Granularity::Year, year_ago.map(|t| keys::year_key(account, t)))
                .await?,
        };
        trace!(account, ?links, "resolved period links");
        Ok(links)
    }

    async fn existing(
        &self,
        kind: EventKind,
        granularity: Granularity,
        id: Option<String>,
    ) -> Result<Option<String>, AggregatorError> {
        let (Some(entity), Some(id)) = (Entity::aggregate(kind, granularity), id) else {
            return Ok(None);
        };
        if self.accessor.exists(entity, &id).await? {
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use stakeledger_store::{EntityStore, MemoryStore};

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_shift_months_plain() {
        assert_eq!(shift_months(ts(2023, 3, 15), -1), Some(ts(2023, 2, 15)));
        assert_eq!(shift_months(ts(2023, 1, 15), -1), Some(ts(2022, 12, 15)));
        assert_eq!(shift_months(ts(2023, 12, 1), 1), Some(ts(2024, 1, 1)));
    }

    #[test]
    fn test_shift_months_rolls_over_missing_days() {
        assert_eq!(shift_months(ts(2023, 3, 31), -1), Some(ts(2023, 3, 3)));
        assert_eq!(shift_months(ts(2024, 3, 31), -1), Some(ts(2024, 3, 2)));
        assert_eq!(shift_months(ts(2023, 5, 31), -1), Some(ts(2023, 5, 1)));
    }

    #[test]
    fn test_shift_years() {
        assert_eq!(shift_years(ts(2023, 6, 1), -1), Some(ts(2022, 6, 1)));
        assert_eq!(shift_years(ts(2024, 2, 29), -1), Some(ts(2023, 3, 1)));
    }

    #[test]
    fn test_shift_keeps_time_of_day() {
        let t = Utc.with_ymd_and_hms(2023, 3, 15, 23, 59, 59).unwrap();
        let shifted = shift_months(t, -1).unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2023, 2, 15, 23, 59, 59).unwrap());
    }

    #[tokio::test]
    async fn test_resolve_only_links_existing() {
        let store = Arc::new(MemoryStore::new());
        let linker = PeriodLinker::new(StoreAccessor::new(store.clone()));

        let links = linker.resolve(EventKind::Reward, "A", ts(2023, 3, 15)).await.unwrap();
        assert_eq!(links, PeriodLinks::default());

        store.save(Entity::SumRewardMonth, "A_2023_2", json!({})).await.unwrap();
        store.save(Entity::SumRewardYear, "A_2023", json!({})).await.unwrap();
        store.save(Entity::SumRewardMonth, "A_2023_1", json!({})).await.unwrap();

        let links = linker.resolve(EventKind::Reward, "A", ts(2023, 3, 15)).await.unwrap();
        assert_eq!(links.month_id.as_deref(), Some("A_2023_2"));
        assert_eq!(links.year_id.as_deref(), Some("A_2023"));
        assert_eq!(links.previous_month_id.as_deref(), Some("A_2023_1"));
        assert_eq!(links.previous_year_id, None);
    }

    #[tokio::test]
    async fn test_previous_month_uses_rollover() {
        let store = Arc::new(MemoryStore::new());
        let linker = PeriodLinker::new(StoreAccessor::new(store.clone()));

        // 31 March minus a month lands on 3 March, so the "previous month"
        // link resolves to March itself.
        store.save(Entity::SumRewardMonth, "A_2023_2", json!({})).await.unwrap();
        store.save(Entity::SumRewardMonth, "A_2023_1", json!({})).await.unwrap();
        let links = linker.resolve(EventKind::Reward, "A", ts(2023, 3, 31)).await.unwrap();
        assert_eq!(links.previous_month_id.as_deref(), Some("A_2023_2"));
    }

    #[tokio::test]
    async fn test_kinds_without_year_aggregates() {
        let store = Arc::new(MemoryStore::new());
        store.save(Entity::SumBondedMonth, "A_2023_2", json!({})).await.unwrap();
        let linker = PeriodLinker::new(StoreAccessor::new(store));

        let links = linker.resolve(EventKind::Bonded, "A", ts(2023, 3, 15)).await.unwrap();
        assert_eq!(links.month_id.as_deref(), Some("A_2023_2"));
        assert_eq!(links.year_id, None);
        assert_eq!(links.previous_year_id, None);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads_for(Entity::SumRewardYear);
        let linker = PeriodLinker::new(StoreAccessor::new(store));
        assert!(linker.resolve(EventKind::Reward, "A", ts(2023, 3, 15)).await.is_err());
    }
}
