//! Balance parsing and string serialization.

use serde::{Deserialize, Deserializer, Serializer};

use crate::{Balance, CoreError};

/// Parse a balance from its JSON rendering: an unsigned integer, a decimal
/// string, or a `0x`-prefixed hex string. Strings may exceed any fixed width.
pub fn parse_balance(value: &serde_json::Value) -> Result<Balance, CoreError> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(Balance::from)
            .ok_or_else(|| CoreError::InvalidAmount(n.to_string())),
        serde_json::Value::String(s) => parse_balance_str(s),
        other => Err(CoreError::InvalidAmount(other.to_string())),
    }
}

pub fn parse_balance_str(s: &str) -> Result<Balance, CoreError> {
    let trimmed = s.trim();
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };
    // BigUint's own parser tolerates `+` and `_`; chain amounts carry neither.
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(CoreError::InvalidAmount(s.to_string()));
    }
    Balance::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| CoreError::InvalidAmount(s.to_string()))
}

/// Serde adapter storing a `Balance` as a decimal string.
///
/// Use with `#[serde(with = "stakeledger_core::amount::as_string")]`.
pub mod as_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Balance, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Balance, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_balance_str(&s).map_err(serde::de::Error::custom)
    }
}
