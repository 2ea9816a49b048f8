use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::positions::PositionsResponse;
use crate::api::{parse_key, AppState};
use crate::domain::{Decimal, Fill, TimeNs};
use crate::engine::{FundingRates, Position, PositionKey};
use crate::error::AppError;

pub async fn post_fill(
    State(state): State<AppState>,
    Json(fill): Json<Fill>,
) -> Result<Json<Position>, AppError> {
    state.controller.track(&fill)?;

    let key = PositionKey::from(&fill);
    let position = state
        .controller
        .positions_for(&key)?
        .into_iter()
        .rev()
        .find(|p| p.orders.iter().any(|o| o.order_id == fill.order_id))
        .ok_or_else(|| AppError::Internal(format!("fill {} not recorded", fill.order_id)))?;
    Ok(Json(position))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    pub exchange: String,
    pub asset: String,
    pub pair: String,
    pub price: Decimal,
    pub time_ns: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub key: String,
    pub price: Decimal,
    pub time_ns: i64,
    pub unrealised_pnl: Decimal,
}

/// Mark the key's open position to a price. Time defaults to now.
pub async fn post_mark(
    State(state): State<AppState>,
    Json(request): Json<MarkRequest>,
) -> Result<Json<MarkResponse>, AppError> {
    let key = parse_key(&request.exchange, &request.asset, &request.pair)?;
    if !request.price.is_positive() {
        return Err(AppError::BadRequest("price must be positive".to_string()));
    }
    let time = request.time_ns.map(TimeNs::new).unwrap_or_else(TimeNs::now);

    let unrealised_pnl =
        state
            .controller
            .update_open_position_unrealised_pnl(&key, request.price, time)?;

    Ok(Json(MarkResponse {
        key: key.to_string(),
        price: request.price,
        time_ns: time.as_i64(),
        unrealised_pnl,
    }))
}

/// Attach funding rates to the position opened inside their window and return
/// the key's positions.
pub async fn post_funding(
    State(state): State<AppState>,
    Json(details): Json<FundingRates>,
) -> Result<Json<PositionsResponse>, AppError> {
    state.controller.track_funding_details(&details)?;

    let key = PositionKey::new(&details.exchange, details.asset, details.pair.clone());
    let positions = state.controller.positions_for(&key)?;
    Ok(Json(PositionsResponse {
        key: key.to_string(),
        positions,
    }))
}
