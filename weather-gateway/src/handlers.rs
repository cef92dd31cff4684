use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use common::errors::AppError;
use common::models::WeatherResponse;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::api_client::ForecastProvider;
use crate::cache::{CacheStats, ForecastCache};
use crate::cache_key::CacheKey;
use crate::clock::Clock;
use crate::validator::Validator;

pub const X_CACHED: &str = "x-cached";

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ForecastCache>,
    pub provider: Arc<dyn ForecastProvider>,
    pub validator: Arc<Validator>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub provider: &'static str,
    pub cache: CacheStats,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health and cache counters", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "weather-gateway",
        provider: state.provider.name(),
        cache: state.cache.stats(),
    })
}

#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeatherParams {
    /// Free-text location, e.g. `Noblesville, IN`
    pub l: Option<String>,
    /// Epoch milliseconds or RFC 3339 timestamp
    pub d: Option<String>,
}

impl WeatherParams {
    /// Repeated parameters keep their first value, so a duplicated `l` or `d`
    /// still reaches the validator instead of failing extraction.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "l" if params.l.is_none() => params.l = Some(value),
                "d" if params.d.is_none() => params.d = Some(value),
                _ => {}
            }
        }
        params
    }
}

#[utoipa::path(
    get,
    path = "/weather",
    params(WeatherParams),
    responses(
        (status = 200, description = "24 hourly records for the requested day", body = WeatherResponse,
            headers(("x-cached" = String, description = "1 when served from cache, 0 otherwise"))),
        (status = 400, description = "Invalid location or date", body = common::errors::ErrorResponse),
        (status = 502, description = "Upstream provider failed", body = common::errors::ErrorResponse)
    ),
    tag = "weather"
)]
#[instrument(skip_all)]
pub async fn get_weather(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let params = WeatherParams::from_pairs(pairs);
    info!(location = ?params.l, date = ?params.d, "Weather request received");

    let query = state
        .validator
        .validate(params.l.as_deref(), params.d.as_deref(), state.clock.now())
        .inspect_err(|e| info!(error = %e, "Rejected weather request"))?;

    let key = CacheKey::from_query(&query);
    let provider = state.provider.clone();

    let (entry, was_cached) = state
        .cache
        .get_or_fetch(key.clone(), move || async move { provider.fetch(&query).await })
        .await?;

    info!(key = %key, was_cached, "Serving forecast");

    Ok((
        [(X_CACHED, if was_cached { "1" } else { "0" })],
        Json(WeatherResponse::from(entry.hours.clone())),
    ))
}
