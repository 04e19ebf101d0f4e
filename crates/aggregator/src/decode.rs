//! Validated decoding of raw chain events into staking events.

use serde_json::Value;
use stakeledger_core::amount::parse_balance;
use stakeledger_core::{AccountId, Balance, CoreError, RawEvent};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{method}: unexpected payload shape: {payload}")]
    PayloadShape { method: String, payload: String },
    #[error("{method}: account is not a string: {value}")]
    Account { method: String, value: String },
    #[error("{method}: {source}")]
    Amount { method: String, source: CoreError },
    #[error("{method}: event not emitted by an extrinsic")]
    Phase { method: String },
}

/// Fields shared by every staking event of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingPayload {
    pub account: AccountId,
    pub amount: Balance,
    /// Index of the emitting extrinsic within the block.
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    Rewarded(StakingPayload),
    Bonded(StakingPayload),
    Unbonded(StakingPayload),
    /// Anything the indexer does not keep records for.
    Other,
}

/// Decode a raw event by its method name. The section is not inspected here.
///
/// Payloads are accepted as `[account, amount]`, `[account, destination,
/// amount]` (newer reward events) or `{"stash": .., "amount": ..}`.
pub fn decode(event: &RawEvent) -> Result<StakingEvent, DecodeError> {
    let wrap: fn(StakingPayload) -> StakingEvent = match event.method.as_str() {
        "Rewarded" | "Reward" => StakingEvent::Rewarded,
        "Bonded" => StakingEvent::Bonded,
        "Unbonded" => StakingEvent::Unbonded,
        _ => return Ok(StakingEvent::Other),
    };
    decode_payload(event).map(wrap)
}

fn decode_payload(event: &RawEvent) -> Result<StakingPayload, DecodeError> {
    let method = &event.method;
    let (account, amount) = match &event.data {
        Value::Array(fields) if fields.len() == 2 || fields.len() == 3 => {
            (&fields[0], &fields[fields.len() - 1])
        }
        Value::Object(map) => match (map.get("stash"), map.get("amount")) {
            (Some(account), Some(amount)) => (account, amount),
            _ => return Err(shape_error(event)),
        },
        _ => return Err(shape_error(event)),
    };

    let account = match account {
        Value::String(s) if !s.is_empty() => s.clone(),
        other => {
            return Err(DecodeError::Account {
                method: method.clone(),
                value: other.to_string(),
            })
        }
    };
    let amount = parse_balance(amount).map_err(|source| DecodeError::Amount {
        method: method.clone(),
        source,
    })?;
    let index = event
        .phase
        .extrinsic_index()
        .ok_or_else(|| DecodeError::Phase {
            method: method.clone(),
        })?;

    Ok(StakingPayload {
        account,
        amount,
        index,
    })
}

fn shape_error(event: &RawEvent) -> DecodeError {
    DecodeError::PayloadShape {
        method: event.method.clone(),
        payload: event.data.to_string(),
    }
}
