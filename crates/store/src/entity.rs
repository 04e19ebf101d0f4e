//! Catalogue of the stored record types: five period aggregates, three raw
//! occurrence tables and the replay markers.

use std::fmt;

use serde::{Deserialize, Serialize};
use stakeledger_core::{EventKind, Granularity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Entity {
    SumRewardYear,
    SumRewardMonth,
    SumRewardDay,
    SumBondedMonth,
    SumUnbondedMonth,
    Reward,
    Bonded,
    Unbonded,
    /// Marker for an event already applied, keyed by block and position.
    SeenEvent,
}

impl Entity {
    /// Period aggregate entity for a kind at a granularity, if one is kept.
    pub fn aggregate(kind: EventKind, granularity: Granularity) -> Option<Self> {
        match (kind, granularity) {
            (EventKind::Reward, Granularity::Year) => Some(Self::SumRewardYear),
            (EventKind::Reward, Granularity::Month) => Some(Self::SumRewardMonth),
            (EventKind::Reward, Granularity::Day) => Some(Self::SumRewardDay),
            (EventKind::Bonded, Granularity::Month) => Some(Self::SumBondedMonth),
            (EventKind::Unbonded, Granularity::Month) => Some(Self::SumUnbondedMonth),
            _ => None,
        }
    }

    /// Raw per-event entity for a kind.
    pub fn occurrence(kind: EventKind) -> Self {
        match kind {
            EventKind::Reward => Self::Reward,
            EventKind::Bonded => Self::Bonded,
            EventKind::Unbonded => Self::Unbonded,
        }
    }

    /// Table name used by persistent backends.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::SumRewardYear => "sum_reward_year",
            Self::SumRewardMonth => "sum_reward_month",
            Self::SumRewardDay => "sum_reward_day",
            Self::SumBondedMonth => "sum_bonded_month",
            Self::SumUnbondedMonth => "sum_unbonded_month",
            Self::Reward => "reward",
            Self::Bonded => "bonded",
            Self::Unbonded => "unbonded",
            Self::SeenEvent => "seen_event",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_catalogue() {
        assert_eq!(
            Entity::aggregate(EventKind::Reward, Granularity::Day),
            Some(Entity::SumRewardDay)
        );
        assert_eq!(
            Entity::aggregate(EventKind::Bonded, Granularity::Month),
            Some(Entity::SumBondedMonth)
        );
        assert_eq!(Entity::aggregate(EventKind::Bonded, Granularity::Year), None);
        assert_eq!(Entity::aggregate(EventKind::Unbonded, Granularity::Day), None);
        assert_eq!(Entity::aggregate(EventKind::Reward, Granularity::Occurrence), None);
    }

    #[test]
    fn test_every_kind_granularity_pair_is_catalogued() {
        for kind in [EventKind::Reward, EventKind::Bonded, EventKind::Unbonded] {
            for g in kind.granularities() {
                assert!(Entity::aggregate(kind, *g).is_some(), "{kind} {g:?}");
            }
        }
        assert_eq!(Entity::occurrence(EventKind::Bonded), Entity::Bonded);
    }

    #[test]
    fn test_table_names_unique() {
        let all = [
            Entity::SumRewardYear,
            Entity::SumRewardMonth,
            Entity::SumRewardDay,
            Entity::SumBondedMonth,
            Entity::SumUnbondedMonth,
            Entity::Reward,
            Entity::Bonded,
            Entity::Unbonded,
            Entity::SeenEvent,
        ];
        let names: std::collections::HashSet<_> = all.iter().map(Entity::table_name).collect();
        assert_eq!(names.len(), all.len());
    }
}
