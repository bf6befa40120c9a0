// src/server.rs
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::PapayaClient;
use crate::codec;
use crate::config::{self, NetworkName, TokenSymbol};
use crate::error::{RateError, SdkError};
use crate::rate_period::{self, AmountParsing, DEFAULT_CURRENCY, RatePeriod};
use crate::utils;

pub struct AppState {
    pub client: PapayaClient<Provider<Http>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<RateError> for ApiError {
    fn from(err: RateError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<SdkError> for ApiError {
    fn from(err: SdkError) -> Self {
        let status = match err {
            SdkError::Contract(_) | SdkError::Provider(_) | SdkError::Signing(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct EncodeQuery {
    income_rate: String,
    outgoing_rate: String,
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EncodedResponse {
    encoded: String,
    hex: String,
}

#[derive(Debug, Serialize)]
pub struct LanesResponse {
    income_rate: String,
    outgoing_rate: String,
    project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PerSecondQuery {
    amount: String,
    #[serde(default)]
    period: RatePeriod,
    #[serde(default)]
    legacy: bool,
    currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PerSecondResponse {
    rate_per_second: String,
    per_period: String,
    formatted: String,
}

#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    network: NetworkName,
    default_version: String,
    tokens: Vec<TokenSymbol>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    address: Address,
    balance: String,
    deposited: String,
    income_rate: String,
    outgoing_rate: String,
    updated: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    recipient: Address,
    income_rate: String,
    outgoing_rate: String,
    project_id: String,
}

fn parse_lane<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{} is not a valid integer: {:?}", name, value)))
}

async fn encode_rates(Query(query): Query<EncodeQuery>) -> Result<Json<EncodedResponse>, ApiError> {
    let income_rate: u128 = parse_lane("income_rate", &query.income_rate)?;
    let outgoing_rate: u128 = parse_lane("outgoing_rate", &query.outgoing_rate)?;
    let encoded = match query.project_id.as_deref() {
        Some(project_id) => {
            let project_id: u64 = parse_lane("project_id", project_id)?;
            codec::encode_rates(income_rate, outgoing_rate, project_id)?
        }
        None => codec::encode_subscription_rate(income_rate, outgoing_rate)?,
    };
    Ok(Json(EncodedResponse {
        encoded: encoded.to_string(),
        hex: format!("{:#x}", encoded),
    }))
}

async fn decode_rates(Path(encoded): Path<String>) -> Result<Json<LanesResponse>, ApiError> {
    let encoded = utils::parse_u256(&encoded)
        .ok_or_else(|| ApiError::bad_request(format!("not a 256-bit integer: {:?}", encoded)))?;
    let lanes = codec::decode_rates(encoded);
    Ok(Json(LanesResponse {
        income_rate: lanes.income_rate.to_string(),
        outgoing_rate: lanes.outgoing_rate.to_string(),
        project_id: lanes.project_id.to_string(),
    }))
}

async fn rate_per_second(Query(query): Query<PerSecondQuery>) -> Result<Json<PerSecondResponse>, ApiError> {
    let parsing = if query.legacy {
        AmountParsing::LegacyFloat
    } else {
        AmountParsing::Decimal
    };
    let rate = rate_period::convert_rate_per_second_with(&query.amount, query.period, parsing)?;
    let currency = query.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
    Ok(Json(PerSecondResponse {
        rate_per_second: rate.to_string(),
        per_period: rate_period::rate_to_human(rate, query.period),
        formatted: rate_period::format_rate(query.amount.trim(), query.period, currency),
    }))
}

async fn list_networks() -> Json<Vec<NetworkResponse>> {
    let networks = config::networks()
        .iter()
        .map(|(network, entry)| NetworkResponse {
            network: *network,
            default_version: entry.default_version.clone(),
            tokens: entry.tokens.keys().copied().collect(),
        })
        .collect();
    Json(networks)
}

fn parse_address(address: &str) -> Result<Address, ApiError> {
    address
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid address: {:?}", address)))
}

async fn user_info(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let address = parse_address(&address)?;
    let info = state.client.user_info(Some(address)).await?;
    let deposited = state.client.balance_of(Some(address)).await?;
    Ok(Json(UserResponse {
        address,
        balance: info.balance.to_string(),
        deposited: deposited.to_string(),
        income_rate: info.income_rate.to_string(),
        outgoing_rate: info.outgoing_rate.to_string(),
        updated: info.updated.to_string(),
    }))
}

async fn subscriptions(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let address = parse_address(&address)?;
    let subs = state.client.subscriptions(Some(address)).await?;
    Ok(Json(
        subs.into_iter()
            .map(|sub| SubscriptionResponse {
                recipient: sub.recipient,
                income_rate: sub.income_rate.to_string(),
                outgoing_rate: sub.outgoing_rate.to_string(),
                project_id: sub.project_id.to_string(),
            })
            .collect(),
    ))
}

/// Routes that need no node connection.
pub fn rates_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/rates/encode", get(encode_rates))
        .route("/rates/decode/{encoded}", get(decode_rates))
        .route("/rates/per-second", get(rate_per_second))
        .route("/networks", get(list_networks))
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users/{address}", get(user_info))
        .route("/subscriptions/{address}", get(subscriptions))
        .merge(rates_router())
        .with_state(state)
}
