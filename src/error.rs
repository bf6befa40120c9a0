// src/error.rs
use std::fmt;

use thiserror::Error;

/// One of the three fields packed into an encoded rate word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    IncomeRate,
    OutgoingRate,
    ProjectId,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lane::IncomeRate => "incomeRate",
            Lane::OutgoingRate => "outgoingRate",
            Lane::ProjectId => "projectId",
        };
        f.write_str(name)
    }
}

/// Local validation failures of the rate helpers. None of these are retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("{lane} does not fit in its {bits}-bit lane")]
    FieldOverflow { lane: Lane, bits: u32 },
    #[error("{lane} value {value} cannot be represented exactly as f64")]
    PrecisionLoss { lane: Lane, value: u128 },
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error("network {0} is not supported")]
    UnsupportedNetwork(String),
    #[error("token {token} is not supported on network {network}")]
    UnsupportedToken { network: String, token: String },
    #[error("version {version} is not supported for token {token} on network {network}")]
    UnsupportedVersion {
        network: String,
        token: String,
        version: String,
    },
    #[error("no tokens supported on network {0}")]
    NoTokens(String),
    #[error("signer is required for {0}")]
    SignerRequired(&'static str),
    #[error("account address is required")]
    AccountRequired,
    #[error("invalid bySig traits: {0}")]
    InvalidBySig(&'static str),
    #[error("contract call failed: {0}")]
    Contract(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("provider request failed: {0}")]
    Provider(String),
}
