// src/config.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::SdkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkName {
    #[default]
    Polygon,
    Bsc,
    Avalanche,
    Base,
    Scroll,
    Arbitrum,
    Mainnet,
    Sei,
    Zksync,
}

impl NetworkName {
    pub const fn as_str(self) -> &'static str {
        match self {
            NetworkName::Polygon => "polygon",
            NetworkName::Bsc => "bsc",
            NetworkName::Avalanche => "avalanche",
            NetworkName::Base => "base",
            NetworkName::Scroll => "scroll",
            NetworkName::Arbitrum => "arbitrum",
            NetworkName::Mainnet => "mainnet",
            NetworkName::Sei => "sei",
            NetworkName::Zksync => "zksync",
        }
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkName {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NETWORKS
            .keys()
            .copied()
            .find(|network| network.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SdkError::UnsupportedNetwork(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenSymbol {
    #[default]
    Usdt,
    Usdc,
    Pyusd,
}

impl TokenSymbol {
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenSymbol::Usdt => "USDT",
            TokenSymbol::Usdc => "USDC",
            TokenSymbol::Pyusd => "PYUSD",
        }
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenSymbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [TokenSymbol::Usdt, TokenSymbol::Usdc, TokenSymbol::Pyusd]
            .into_iter()
            .find(|token| token.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown token symbol: {}", s))
    }
}

/// One deployed version of the contract for a given network and token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub version: String,
    pub contract_address: Address,
    pub token_address: Address,
    pub token_price_feed: Address,
    pub coin_price_feed: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub default_version: String,
    pub tokens: BTreeMap<TokenSymbol, Vec<Deployment>>,
}

/// Outcome of [`resolve`], after any fallbacks were applied.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDeployment {
    pub network: NetworkName,
    pub token: TokenSymbol,
    pub deployment: &'static Deployment,
}

static NETWORKS: LazyLock<BTreeMap<NetworkName, NetworkEntry>> = LazyLock::new(|| {
    let content = include_str!("../config/networks.json");
    serde_json::from_str(content).expect("Failed to parse network deployment list")
});

pub fn networks() -> &'static BTreeMap<NetworkName, NetworkEntry> {
    &NETWORKS
}

pub fn available_networks() -> Vec<NetworkName> {
    NETWORKS.keys().copied().collect()
}

pub fn available_tokens(network: NetworkName) -> Vec<TokenSymbol> {
    NETWORKS
        .get(&network)
        .map(|entry| entry.tokens.keys().copied().collect())
        .unwrap_or_default()
}

fn entry(network: NetworkName) -> Result<&'static NetworkEntry, SdkError> {
    NETWORKS
        .get(&network)
        .ok_or_else(|| SdkError::UnsupportedNetwork(network.to_string()))
}

pub fn default_version(network: NetworkName) -> Result<&'static str, SdkError> {
    Ok(entry(network)?.default_version.as_str())
}

/// Exact lookup, no fallbacks.
pub fn deployment(network: NetworkName, token: TokenSymbol, version: &str) -> Result<&'static Deployment, SdkError> {
    let deployments = entry(network)?
        .tokens
        .get(&token)
        .ok_or_else(|| SdkError::UnsupportedToken {
            network: network.to_string(),
            token: token.to_string(),
        })?;
    deployments
        .iter()
        .find(|d| d.version == version)
        .ok_or_else(|| SdkError::UnsupportedVersion {
            network: network.to_string(),
            token: token.to_string(),
            version: version.to_string(),
        })
}

/// Picks a deployment, falling back the way clients expect: an unknown token
/// becomes USDT, then USDC, then the first listed token; an unknown version
/// becomes the latest listed one.
pub fn resolve(network: NetworkName, token: TokenSymbol, version: Option<&str>) -> Result<ResolvedDeployment, SdkError> {
    let entry = entry(network)?;

    let token = if entry.tokens.contains_key(&token) {
        token
    } else {
        let fallback = [TokenSymbol::Usdt, TokenSymbol::Usdc]
            .into_iter()
            .find(|t| entry.tokens.contains_key(t))
            .or_else(|| entry.tokens.keys().next().copied())
            .ok_or_else(|| SdkError::NoTokens(network.to_string()))?;
        tracing::warn!(%network, requested = %token, using = %fallback, "token not supported, falling back");
        fallback
    };

    let deployments = &entry.tokens[&token];
    let version = version.unwrap_or(&entry.default_version);
    let deployment = match deployments.iter().find(|d| d.version == version) {
        Some(deployment) => deployment,
        None => {
            let latest = deployments
                .last()
                .ok_or_else(|| SdkError::NoTokens(network.to_string()))?;
            tracing::warn!(%network, %token, requested = version, using = %latest.version, "version not supported, using latest");
            latest
        }
    };

    Ok(ResolvedDeployment {
        network,
        token,
        deployment,
    })
}

/// Checks the embedded table: every token lists at least one deployment and
/// every network's default version exists for some token.
pub fn validate_networks() -> Result<(), String> {
    let mut problems = Vec::new();

    for (network, entry) in NETWORKS.iter() {
        if entry.tokens.is_empty() {
            problems.push(format!("{}: no tokens listed", network));
        }
        for (token, deployments) in &entry.tokens {
            if deployments.is_empty() {
                problems.push(format!("{}/{}: no deployments listed", network, token));
            }
        }
        let has_default = entry
            .tokens
            .values()
            .flatten()
            .any(|d| d.version == entry.default_version);
        if !has_default {
            problems.push(format!(
                "{}: default version {} is not deployed for any token",
                network, entry.default_version
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("invalid network deployment list:\n{}", problems.join("\n")))
    }
}
