//! Conversion between decimal token strings and fixed-point amounts.
use thiserror::Error;

use crate::escrow::{Amount, Decimals, MAX_DECIMALS};

/// Errors that can occur while parsing a decimal token amount.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Amount is empty")]
    Empty,
    #[error("Invalid character {0:?} in amount")]
    InvalidCharacter(char),
    #[error("Amount has more than {0} decimal places")]
    TooManyDecimals(Decimals),
    #[error("Amount does not fit in 128 bits")]
    Overflow,
    #[error("Precision of {0} decimals is not supported")]
    UnsupportedPrecision(Decimals),
}

fn scale(decimals: Decimals) -> Result<Amount, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedPrecision(decimals));
    }
    Ok(10u128.pow(decimals as u32))
}

fn parse_digits(digits: &str) -> Result<Amount, UnitsError> {
    digits.chars().try_fold(0, |value: Amount, c| {
        let digit = c.to_digit(10).ok_or(UnitsError::InvalidCharacter(c))?;
        value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit as Amount))
            .ok_or(UnitsError::Overflow)
    })
}

/// Parses a decimal string such as `"12.5"` into an amount scaled by `10^decimals`.
pub fn parse_units(text: &str, decimals: Decimals) -> Result<Amount, UnitsError> {
    let scale = scale(decimals)?;
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::Empty);
    }
    if fraction.len() > decimals as usize {
        // Validate the characters first so "1.x" reports the bad character.
        parse_digits(fraction)?;
        return Err(UnitsError::TooManyDecimals(decimals));
    }

    let whole = parse_digits(whole)?;
    let padded = format!("{fraction:0<width$}", width = decimals as usize);
    let fraction = parse_digits(&padded)?;
    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction))
        .ok_or(UnitsError::Overflow)
}

/// Renders an amount scaled by `10^decimals` as a decimal string.
///
/// Trailing fractional zeros are dropped but one fractional digit is always
/// kept when `decimals > 0`, so one token renders as `"1.0"`.
pub fn format_units(amount: Amount, decimals: Decimals) -> String {
    let Ok(scale) = scale(decimals) else {
        return amount.to_string();
    };
    if decimals == 0 {
        return amount.to_string();
    }
    let whole = amount / scale;
    let fraction = format!("{:0>width$}", amount % scale, width = decimals as usize);
    let trimmed = fraction.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{trimmed}")
    }
}
