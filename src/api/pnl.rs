use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

use crate::api::{AppState, KeyQuery};
use crate::config::PnlMode;
use crate::domain::Decimal;
use crate::engine::funding::total_funding;
use crate::engine::{PnlResult, PositionFilter, TrackerError};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResponse {
    pub key: String,
    pub mode: &'static str,
    pub realised_pnl: Decimal,
    pub unrealised_pnl: Decimal,
    /// Funding paid (negative) or received across the key's positions.
    pub funding_pnl: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<PnlResult>,
}

pub async fn get_pnl(
    Query(params): Query<KeyQuery>,
    State(state): State<AppState>,
) -> Result<Json<PnlResponse>, AppError> {
    let key = params.to_key()?;

    let (mode, realised_pnl) = match state.config.pnl_mode {
        PnlMode::Gross => ("gross", state.controller.realised_pnl_before_fees(&key)?),
        PnlMode::Net => ("net", state.controller.realised_pnl(&key)?),
    };

    let latest = match state.controller.latest_pnl_snapshot(&key) {
        Ok(snapshot) => Some(snapshot),
        Err(TrackerError::PositionsNotLoaded(_)) | Err(TrackerError::NoPnlHistory(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let unrealised_pnl = state
        .controller
        .open_position(&PositionFilter {
            exchange: Some(key.exchange.clone()),
            asset: Some(key.asset),
            pair: Some(key.pair.clone()),
        })
        .map(|p| p.unrealised_pnl)
        .unwrap_or_default();

    let funding_pnl: Decimal = state
        .controller
        .positions_for(&key)?
        .iter()
        .map(|p| total_funding(&p.funding_rates))
        .sum();

    Ok(Json(PnlResponse {
        key: key.to_string(),
        mode,
        realised_pnl,
        unrealised_pnl,
        funding_pnl,
        latest,
    }))
}
