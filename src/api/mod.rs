pub mod fills;
pub mod health;
pub mod pnl;
pub mod positions;

use crate::config::Config;
use crate::domain::{Asset, Pair};
use crate::engine::{PositionController, PositionKey};
use crate::error::AppError;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<PositionController>,
    pub config: Config,
}

impl AppState {
    pub fn new(controller: Arc<PositionController>, config: Config) -> Self {
        Self { controller, config }
    }
}

/// Query parameters naming one position key.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub exchange: String,
    pub asset: String,
    pub pair: String,
}

impl KeyQuery {
    pub fn to_key(&self) -> Result<PositionKey, AppError> {
        parse_key(&self.exchange, &self.asset, &self.pair)
    }
}

pub(crate) fn parse_key(exchange: &str, asset: &str, pair: &str) -> Result<PositionKey, AppError> {
    let exchange = exchange.trim();
    if exchange.is_empty() {
        return Err(AppError::BadRequest("exchange is required".to_string()));
    }
    let asset: Asset = asset
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{}", e)))?;
    let pair: Pair = pair
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{}", e)))?;
    if pair.is_empty() {
        return Err(AppError::BadRequest("pair is required".to_string()));
    }
    Ok(PositionKey::new(exchange, asset, pair))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/fills", post(fills::post_fill))
        .route("/v1/marks", post(fills::post_mark))
        .route("/v1/funding", post(fills::post_funding))
        .route("/v1/positions", get(positions::get_positions))
        .route("/v1/positions/open", get(positions::get_open_positions))
        .route("/v1/pnl", get(pnl::get_pnl))
        .layer(cors)
        .with_state(state)
}
