use alloy_primitives::{
    utils::{format_ether, parse_ether},
    U256,
};
use thiserror::Error;

pub const ETHER_DECIMALS: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount has more than {ETHER_DECIMALS} decimal places: {0}")]
    TooPrecise(String),
    #[error("amount is not a decimal number: {0}")]
    Malformed(String),
}

/// Parses a decimal ether amount ("0.05") into its 18-decimal smallest-unit value.
pub fn parse_ether_amount(input: &str) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative(trimmed.to_string()));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits_only(whole) || !digits_only(fraction)
    {
        return Err(AmountError::Malformed(trimmed.to_string()));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(AmountError::TooPrecise(trimmed.to_string()));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    };
    parse_ether(&normalized).map_err(|_| AmountError::Malformed(trimmed.to_string()))
}

/// Formats a smallest-unit value as a decimal ether amount without trailing zeros.
pub fn format_ether_amount(value: U256) -> String {
    let formatted = format_ether(value);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
