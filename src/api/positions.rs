use crate::api::{AppState, KeyQuery};
use crate::engine::{Position, TrackerError};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub key: String,
    pub positions: Vec<Position>,
}

pub async fn get_positions(
    Query(params): Query<KeyQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let key = params.to_key()?;
    let positions = state.controller.positions_for(&key)?;
    Ok(Json(PositionsResponse {
        key: key.to_string(),
        positions,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionsResponse {
    pub positions: Vec<Position>,
}

/// Every open position. An empty registry is not an error here.
pub async fn get_open_positions(
    State(state): State<AppState>,
) -> Result<Json<OpenPositionsResponse>, AppError> {
    let positions = match state.controller.all_open_positions() {
        Ok(positions) => positions,
        Err(TrackerError::NoPositionsFound) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(OpenPositionsResponse { positions }))
}
