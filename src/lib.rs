// src/lib.rs
use ethers::contract::abigen;

abigen!(Papaya, "abi/papaya_abi.json");

pub mod by_sig;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod rate_period;
pub mod server;
pub mod utils;

pub use client::{ClientOptions, PapayaClient};
pub use codec::{RateLanes, decode_rates, encode_rates, encode_subscription_rate};
pub use error::{RateError, SdkError};
pub use rate_period::{RatePeriod, convert_rate_per_second, convert_rate_to_period, format_rate};
