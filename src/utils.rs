// src/utils.rs
use ethers::types::U256;

/// Renders a fixed-point integer with `decimals` fractional digits, trailing
/// zeros trimmed.
pub fn u256_to_human(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let divisor = U256::exp10(decimals as usize);
    let integer = value / divisor;
    let fraction = format!("{:0>width$}", (value % divisor).to_string(), width = decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// Parses a decimal or `0x`-prefixed hex integer.
pub fn parse_u256(input: &str) -> Option<U256> {
    let input = input.trim();
    match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => U256::from_dec_str(input).ok(),
    }
}
