//! Scientific-notation decoding.
//!
//! Survey exports write frequencies like `6.00E+12` and small fluxes like
//! `2.5E-3`. Going through a binary float first would turn an exact integer
//! frequency into a rounded one, so the literal is decoded from its digits:
//!
//! - the mantissa digits are collected as an integer, counting fractional digits
//!   (trailing zeros of the fraction are dropped first)
//! - the effective shift is `exponent - fractional_digits`
//! - a non-negative shift (with a non-negative exponent) yields an exact integer
//! - anything else yields the correctly rounded float of `digits × 10^shift`

use std::fmt;

use crate::error::SedError;

/// Marker separating mantissa and exponent.
pub const EXPONENT_MARKER: char = 'E';

/// A decoded literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SciNumber {
    Integer(i64),
    Float(f64),
}

impl SciNumber {
    pub fn as_f64(self) -> f64 {
        match self {
            SciNumber::Integer(i) => i as f64,
            SciNumber::Float(v) => v,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, SciNumber::Integer(_))
    }
}

impl fmt::Display for SciNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SciNumber::Integer(i) => write!(f, "{i}"),
            SciNumber::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Decode a `<mantissa>E<exponent>` literal.
pub fn decode_scientific(literal: &str) -> Result<SciNumber, SedError> {
    let s = literal.trim();
    let fail = |reason: &str| SedError::MalformedScientificLiteral {
        literal: literal.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = s.split(EXPONENT_MARKER);
    let (Some(mantissa), Some(exponent), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(fail("expected exactly one 'E' marker"));
    };
    if exponent.contains('.') {
        return Err(fail("decimal point after the 'E' marker"));
    }

    let (negative, mantissa) = split_sign(mantissa);
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(fail("empty mantissa"));
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err(fail("mantissa is not a decimal number"));
    }

    let (exp_negative, exp_digits) = split_sign(exponent);
    if exp_digits.is_empty() || !exp_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(fail("exponent is not an integer"));
    }
    let exp_abs: i64 = exp_digits
        .parse()
        .map_err(|_| fail("exponent out of range"))?;
    let exponent = if exp_negative { -exp_abs } else { exp_abs };

    let frac_part = frac_part.trim_end_matches('0');
    let digits: String = format!("{int_part}{frac_part}");
    let digits = digits.trim_start_matches('0');
    let shift = exponent - frac_part.len() as i64;

    if exponent >= 0 && shift >= 0 {
        if let Some(value) = scaled_integer(digits, shift, negative) {
            return Ok(SciNumber::Integer(value));
        }
    }

    let sign = if negative { "-" } else { "" };
    let digits = if digits.is_empty() { "0" } else { digits };
    let value: f64 = format!("{sign}{digits}e{shift}")
        .parse()
        .map_err(|_| fail("value out of range"))?;
    if value.is_finite() {
        Ok(SciNumber::Float(value))
    } else {
        Err(fail("value out of range"))
    }
}

/// Parse a numeric field that may be plain decimal or scientific notation.
pub fn parse_numeric(field: &str) -> Result<f64, SedError> {
    let s = field.trim();
    if s.contains(EXPONENT_MARKER) {
        return decode_scientific(s).map(SciNumber::as_f64);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SedError::malformed_record(
            None,
            format!("'{field}' is not a number"),
        )),
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

fn scaled_integer(digits: &str, shift: i64, negative: bool) -> Option<i64> {
    if digits.is_empty() {
        return Some(0);
    }
    let mantissa: i128 = digits.parse().ok()?;
    let scale = 10_i128.checked_pow(u32::try_from(shift).ok()?)?;
    let value = mantissa.checked_mul(scale)?;
    let value = if negative { -value } else { value };
    i64::try_from(value).ok()
}
