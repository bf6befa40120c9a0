// src/codec.rs
//! Packing of subscription rates into the contract's `encodedRates` word.
//!
//! Layout, low bits first: `incomeRate` in `[0, 96)`, `outgoingRate` in
//! `[96, 192)`, `projectId` in `[192, 256)`.

use ethers::types::U256;

use crate::error::{Lane, RateError};

pub const RATE_BITS: u32 = 96;
pub const PROJECT_ID_BITS: u32 = 64;

/// Largest value a rate lane can hold, `2^96 - 1`.
pub const MAX_RATE: u128 = (1u128 << RATE_BITS) - 1;

/// Largest integer an `f64` represents exactly.
const MAX_EXACT_F64: u128 = 1u128 << 53;

const OUTGOING_SHIFT: usize = RATE_BITS as usize;
const PROJECT_ID_SHIFT: usize = 2 * RATE_BITS as usize;

/// The three fields of an encoded rate word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLanes {
    pub income_rate: u128,
    pub outgoing_rate: u128,
    pub project_id: u64,
}

impl RateLanes {
    pub fn new(income_rate: u128, outgoing_rate: u128, project_id: u64) -> Self {
        Self {
            income_rate,
            outgoing_rate,
            project_id,
        }
    }

    pub fn encode(&self) -> Result<U256, RateError> {
        encode_rates(self.income_rate, self.outgoing_rate, self.project_id)
    }

    /// Converts every lane to `f64`, failing instead of rounding once a lane
    /// goes past `2^53`.
    pub fn to_f64_lanes(&self) -> Result<(f64, f64, f64), RateError> {
        Ok((
            exact_f64(self.income_rate, Lane::IncomeRate)?,
            exact_f64(self.outgoing_rate, Lane::OutgoingRate)?,
            exact_f64(u128::from(self.project_id), Lane::ProjectId)?,
        ))
    }
}

fn exact_f64(value: u128, lane: Lane) -> Result<f64, RateError> {
    if value > MAX_EXACT_F64 {
        return Err(RateError::PrecisionLoss { lane, value });
    }
    Ok(value as f64)
}

fn check_rate(value: u128, lane: Lane) -> Result<U256, RateError> {
    if value > MAX_RATE {
        return Err(RateError::FieldOverflow {
            lane,
            bits: RATE_BITS,
        });
    }
    Ok(U256::from(value))
}

fn lane_mask(bits: u32) -> U256 {
    (U256::one() << bits as usize) - U256::one()
}

/// Packs both rates and the project id into one word.
pub fn encode_rates(income_rate: u128, outgoing_rate: u128, project_id: u64) -> Result<U256, RateError> {
    let rates = encode_subscription_rate(income_rate, outgoing_rate)?;
    Ok(rates | (U256::from(project_id) << PROJECT_ID_SHIFT))
}

/// Packs only the two rate lanes; the project lane stays zero.
pub fn encode_subscription_rate(income_rate: u128, outgoing_rate: u128) -> Result<U256, RateError> {
    let income = check_rate(income_rate, Lane::IncomeRate)?;
    let outgoing = check_rate(outgoing_rate, Lane::OutgoingRate)?;
    Ok(income | (outgoing << OUTGOING_SHIFT))
}

/// Splits any word into its lanes. Total: every `U256` decodes.
pub fn decode_rates(encoded: U256) -> RateLanes {
    let rate_mask = lane_mask(RATE_BITS);
    RateLanes {
        income_rate: (encoded & rate_mask).low_u128(),
        outgoing_rate: ((encoded >> OUTGOING_SHIFT) & rate_mask).low_u128(),
        project_id: (encoded >> PROJECT_ID_SHIFT).low_u64(),
    }
}
