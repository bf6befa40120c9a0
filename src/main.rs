// src/main.rs
use anyhow::Result as AnyhowResult;
use dotenvy::dotenv;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use papaya_sdk::config::{self, NetworkName, TokenSymbol};
use papaya_sdk::server::{self, AppState};
use papaya_sdk::{ClientOptions, PapayaClient};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn network_from_env() -> NetworkName {
    match env::var("PAPAYA_NETWORK") {
        Ok(name) => name.parse().unwrap_or_else(|_| {
            tracing::warn!(requested = %name, "network not supported, falling back to polygon");
            NetworkName::Polygon
        }),
        Err(_) => NetworkName::default(),
    }
}

fn token_from_env() -> TokenSymbol {
    match env::var("PAPAYA_TOKEN") {
        Ok(symbol) => symbol.parse().unwrap_or_else(|_| {
            tracing::warn!(requested = %symbol, "unknown token symbol, using USDT");
            TokenSymbol::Usdt
        }),
        Err(_) => TokenSymbol::default(),
    }
}

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,papaya_sdk=debug")),
        )
        .init();

    config::validate_networks().map_err(anyhow::Error::msg)?;

    let rpc_url = env::var("RPC_URL")?;
    let provider = Arc::new(Provider::<Http>::try_from(rpc_url)?);

    let contract_address = match env::var("PAPAYA_CONTRACT") {
        Ok(address) => Some(address.parse::<Address>()?),
        Err(_) => None,
    };

    let options = ClientOptions {
        network: network_from_env(),
        token: token_from_env(),
        version: env::var("PAPAYA_VERSION").ok(),
        contract_address,
        token_address: None,
    };
    let client = PapayaClient::new(provider, options)?;

    tracing::info!(
        contract = ?client.address(),
        network = ?client.network(),
        token = ?client.token_symbol(),
        "papaya client ready"
    );

    let state = Arc::new(AppState { client });
    let app = server::create_app(state);

    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    tracing::info!("Starting API server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
