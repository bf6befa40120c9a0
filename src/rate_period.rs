// src/rate_period.rs
//! Conversion between human "amount per period" rates and the contract's
//! 18-decimal per-second rates.

use std::fmt;
use std::str::FromStr;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::error::RateError;
use crate::utils;

/// Fractional digits kept from a human amount.
pub const AMOUNT_DECIMALS: usize = 6;
/// Extra digits applied on top of the human scale, giving 18 in total.
pub const INTERNAL_DECIMALS: usize = 12;
pub const RATE_DECIMALS: u8 = (AMOUNT_DECIMALS + INTERNAL_DECIMALS) as u8;

pub const DEFAULT_CURRENCY: &str = "USDC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatePeriod {
    Second,
    Hour,
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl RatePeriod {
    pub const ALL: [RatePeriod; 6] = [
        RatePeriod::Second,
        RatePeriod::Hour,
        RatePeriod::Day,
        RatePeriod::Week,
        RatePeriod::Month,
        RatePeriod::Year,
    ];

    /// Fixed length of the period. A month is 365 / 12 days.
    pub const fn seconds(self) -> u64 {
        match self {
            RatePeriod::Second => 1,
            RatePeriod::Hour => 3_600,
            RatePeriod::Day => 86_400,
            RatePeriod::Week => 604_800,
            RatePeriod::Month => 2_628_000,
            RatePeriod::Year => 31_536_000,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RatePeriod::Second => "second",
            RatePeriod::Hour => "hour",
            RatePeriod::Day => "day",
            RatePeriod::Week => "week",
            RatePeriod::Month => "month",
            RatePeriod::Year => "year",
        }
    }
}

impl fmt::Display for RatePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RatePeriod::ALL
            .into_iter()
            .find(|period| period.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown rate period: {}", s))
    }
}

/// How a human amount string is turned into 6-decimal fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmountParsing {
    /// Digits are scaled with integer arithmetic; digits past the sixth
    /// decimal are dropped.
    #[default]
    Decimal,
    /// Parse as `f64` and floor `amount * 1e6`. Reproduces the rounding of
    /// rates created by earlier clients, e.g. `"2.01"` becomes `2009999`.
    LegacyFloat,
}

/// Per-second rate, scaled by `10^18`, for `amount` spread over `period`.
pub fn convert_rate_per_second(amount: &str, period: RatePeriod) -> Result<U256, RateError> {
    convert_rate_per_second_with(amount, period, AmountParsing::Decimal)
}

pub fn convert_rate_per_second_with(
    amount: &str,
    period: RatePeriod,
    parsing: AmountParsing,
) -> Result<U256, RateError> {
    let micros = match parsing {
        AmountParsing::Decimal => parse_decimal_micros(amount)?,
        AmountParsing::LegacyFloat => parse_float_micros(amount)?,
    };
    let scaled = micros
        .checked_mul(U256::exp10(INTERNAL_DECIMALS))
        .ok_or_else(|| RateError::InvalidAmount(amount.to_string()))?;
    Ok(scaled / U256::from(period.seconds()))
}

/// Inverse of [`convert_rate_per_second`], up to the truncation of its final
/// division. Saturates at `U256::MAX`; any 96-bit rate is exact.
pub fn convert_rate_to_period(rate_per_second: U256, period: RatePeriod) -> U256 {
    rate_per_second.saturating_mul(U256::from(period.seconds()))
}

/// Human amount per `period` for an on-chain per-second rate.
pub fn rate_to_human(rate_per_second: U256, period: RatePeriod) -> String {
    utils::u256_to_human(convert_rate_to_period(rate_per_second, period), RATE_DECIMALS)
}

pub fn format_rate(amount: impl fmt::Display, period: RatePeriod, currency: &str) -> String {
    format!("{} {}/{}", amount, currency, period)
}

fn parse_decimal_micros(amount: &str) -> Result<U256, RateError> {
    let invalid = || RateError::InvalidAmount(amount.to_string());
    let trimmed = amount.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| invalid())?
    };
    let kept = &fraction[..fraction.len().min(AMOUNT_DECIMALS)];
    let fraction = format!("{:0<width$}", kept, width = AMOUNT_DECIMALS);
    let fraction = U256::from_dec_str(&fraction).map_err(|_| invalid())?;

    whole
        .checked_mul(U256::exp10(AMOUNT_DECIMALS))
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(invalid)
}

fn parse_float_micros(amount: &str) -> Result<U256, RateError> {
    let invalid = || RateError::InvalidAmount(amount.to_string());
    let value: f64 = amount.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    let micros = (value * 1e6).floor();
    if micros >= u128::MAX as f64 {
        return Err(invalid());
    }
    Ok(U256::from(micros as u128))
}
