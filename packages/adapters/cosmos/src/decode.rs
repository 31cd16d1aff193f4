//! Numeric fields of Cosmos REST responses.
//!
//! Chains disagree on whether integers travel as JSON strings or numbers, so
//! both are accepted. Values that parse but make no sense for a counter
//! (negative, wider than 64 bits) are reported as partial data rather than
//! as a decoding failure.

use serde_json::Value;
use services::{Error, Result};

// cosmos `Dec` carries at most 18 fractional digits
const MAX_FRACTION_DIGITS: usize = 18;

fn field<'a>(body: &'a Value, pointer: &str) -> Result<&'a Value> {
    body.pointer(pointer)
        .ok_or_else(|| Error::Decode(format!("missing field '{pointer}'")))
}

pub(crate) fn integer(body: &Value, pointer: &str) -> Result<u64> {
    match field(body, pointer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_u64() {
                Ok(value)
            } else if number.as_i64().is_some() {
                Err(Error::PartialData(format!(
                    "'{pointer}' is negative: {number}"
                )))
            } else {
                Err(Error::Decode(format!(
                    "'{pointer}' is not an integer: {number}"
                )))
            }
        }
        Value::String(raw) => parse_integer(raw.trim(), pointer),
        other => Err(Error::Decode(format!(
            "'{pointer}' has unexpected type: {other}"
        ))),
    }
}

/// First of `pointers` present in the body.
pub(crate) fn first_integer(body: &Value, pointers: &[&str]) -> Result<u64> {
    pointers
        .iter()
        .find(|pointer| body.pointer(pointer).is_some())
        .map(|pointer| integer(body, pointer))
        .unwrap_or_else(|| Err(Error::Decode(format!("none of {pointers:?} present"))))
}

/// Valid votes a validator needs per vote window.
///
/// A decimal is read as the fraction of the vote window that has to be
/// valid and converted to a vote count, rounding up. A plain integer is
/// already a count.
pub(crate) fn min_valid_per_window(body: &Value, pointer: &str, vote_window: u64) -> Result<u64> {
    let raw = match field(body, pointer)? {
        Value::String(raw) => raw.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        other => {
            return Err(Error::Decode(format!(
                "'{pointer}' has unexpected type: {other}"
            )));
        }
    };

    if raw.starts_with('-') {
        return Err(Error::PartialData(format!("'{pointer}' is negative: {raw}")));
    }

    let Some((whole, fraction)) = raw.split_once('.') else {
        return parse_integer(&raw, pointer);
    };

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !is_digits(fraction) || fraction.len() > MAX_FRACTION_DIGITS {
        return Err(Error::Decode(format!("'{pointer}' is not a decimal: {raw}")));
    }

    let scale = 10u128.pow(fraction.len() as u32);
    let mantissa = whole
        .parse::<u128>()
        .ok()
        .and_then(|whole| whole.checked_mul(scale))
        .and_then(|whole| fraction.parse::<u128>().ok().map(|frac| whole + frac))
        .ok_or_else(|| Error::Decode(format!("'{pointer}' is not a decimal: {raw}")))?;

    if mantissa > scale {
        return Err(Error::PartialData(format!(
            "'{pointer}' is a fraction above 1: {raw}"
        )));
    }

    let required = (mantissa * u128::from(vote_window)).div_ceil(scale);
    u64::try_from(required)
        .map_err(|_| Error::PartialData(format!("'{pointer}' does not fit in 64 bits: {raw}")))
}

fn parse_integer(raw: &str, pointer: &str) -> Result<u64> {
    if let Ok(value) = raw.parse::<u64>() {
        return Ok(value);
    }

    match raw.parse::<i128>() {
        Ok(value) if value < 0 => Err(Error::PartialData(format!(
            "'{pointer}' is negative: {raw}"
        ))),
        Ok(_) => Err(Error::PartialData(format!(
            "'{pointer}' does not fit in 64 bits: {raw}"
        ))),
        Err(_) => Err(Error::Decode(format!(
            "'{pointer}' is not an integer: {raw}"
        ))),
    }
}
