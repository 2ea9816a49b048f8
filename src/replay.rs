//! CSV fill replay.
//!
//! Loads fills from a CSV file, orders them by (time, order id) and feeds
//! them through a `PositionController`.

use crate::domain::{sort_fills_deterministic, Asset, Decimal, Fill, Pair, Side, TimeNs};
use crate::engine::{PositionController, TrackerError};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read fills file: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid fill on row {row}: {message}")]
    InvalidRow { row: usize, message: String },
    #[error("replay aborted: {0}")]
    Tracker(#[from] TrackerError),
}

/// Counts from one replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub total: usize,
    pub tracked: usize,
    pub rejected: usize,
    pub keys: usize,
}

#[derive(Debug, serde::Deserialize)]
struct Row {
    exchange: String,
    asset: String,
    pair: String,
    side: String,
    order_id: String,
    price: String,
    amount: String,
    fee: Option<String>,
    leverage: Option<String>,
    time_ns: i64,
}

impl Row {
    fn into_fill(self) -> Result<Fill, String> {
        let asset: Asset = self.asset.parse().map_err(|e| format!("{}", e))?;
        let pair: Pair = self.pair.parse().map_err(|e| format!("{}", e))?;
        let side: Side = self.side.parse().map_err(|e| format!("{}", e))?;
        let price = parse_decimal("price", &self.price)?;
        let amount = parse_decimal("amount", &self.amount)?;
        let fee = optional_decimal("fee", self.fee.as_deref())?.unwrap_or_default();
        let leverage = optional_decimal("leverage", self.leverage.as_deref())?.unwrap_or(Decimal::ONE);

        Ok(Fill::new(
            self.exchange,
            asset,
            pair,
            side,
            self.order_id,
            price,
            amount,
            fee,
            TimeNs::new(self.time_ns),
        )
        .with_leverage(leverage))
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str_canonical(value).map_err(|e| format!("invalid {}: {}", field, e))
}

fn optional_decimal(field: &str, value: Option<&str>) -> Result<Option<Decimal>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_decimal(field, v).map(Some),
        None => Ok(None),
    }
}

/// Parse fills from CSV with header
/// `exchange,asset,pair,side,order_id,price,amount,fee,leverage,time_ns`.
pub fn parse_fills<R: Read>(reader: R) -> Result<Vec<Fill>, ReplayError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut fills = Vec::new();
    for (idx, record) in reader.deserialize::<Row>().enumerate() {
        let row = record?;
        let fill = row
            .into_fill()
            .map_err(|message| ReplayError::InvalidRow { row: idx + 1, message })?;
        fills.push(fill);
    }
    Ok(fills)
}

pub fn load_fills(path: impl AsRef<Path>) -> Result<Vec<Fill>, ReplayError> {
    let file = std::fs::File::open(path)?;
    parse_fills(file)
}

/// Track fills in deterministic order.
///
/// Fills the engine rejects are logged and counted. A position discrepancy
/// means the ledger is corrupt and aborts the replay.
pub fn replay_fills(
    controller: &PositionController,
    mut fills: Vec<Fill>,
) -> Result<ReplaySummary, ReplayError> {
    sort_fills_deterministic(&mut fills);

    let mut summary = ReplaySummary {
        total: fills.len(),
        ..ReplaySummary::default()
    };
    let mut keys = BTreeSet::new();
    for fill in &fills {
        match controller.track(fill) {
            Ok(()) => {
                summary.tracked += 1;
                keys.insert((fill.exchange_key(), fill.asset, fill.pair.clone()));
            }
            Err(e @ TrackerError::PositionDiscrepancy { .. }) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    exchange = %fill.exchange,
                    pair = %fill.pair,
                    order_id = %fill.order_id,
                    error = %e,
                    "Rejected fill during replay"
                );
                summary.rejected += 1;
            }
        }
    }
    summary.keys = keys.len();

    tracing::info!(
        total = summary.total,
        tracked = summary.tracked,
        rejected = summary.rejected,
        keys = summary.keys,
        "Replay complete"
    );
    Ok(summary)
}

pub fn replay_file(
    controller: &PositionController,
    path: impl AsRef<Path>,
) -> Result<ReplaySummary, ReplayError> {
    let path = path.as_ref();
    tracing::info!(path = %path.display(), "Replaying fills");
    let fills = load_fills(path)?;
    replay_fills(controller, fills)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "exchange,asset,pair,side,order_id,price,amount,fee,leverage,time_ns\n";

    #[test]
    fn test_parse_valid_rows() {
        let csv = format!(
            "{}binance,perpetual_swap,BTC-USDT,buy,1,100,1,0.5,10,1000\nokx,futures,ETH/USDT,sell,2,10,3,,,2000\n",
            HEADER
        );
        let fills = parse_fills(csv.as_bytes()).unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].fee, Decimal::from_str_canonical("0.5").unwrap());
        assert_eq!(fills[0].leverage, Decimal::from(10));
        assert_eq!(fills[1].pair, Pair::new("ETH", "USDT"));
        assert_eq!(fills[1].fee, Decimal::ZERO);
        assert_eq!(fills[1].leverage, Decimal::ONE);
    }

    #[test]
    fn test_invalid_side_reports_row() {
        let csv = format!(
            "{}binance,futures,BTC-USDT,buy,1,100,1,0,1,1000\nbinance,futures,BTC-USDT,wat,2,100,1,0,1,2000\n",
            HEADER
        );
        match parse_fills(csv.as_bytes()) {
            Err(ReplayError::InvalidRow { row, .. }) => assert_eq!(row, 2),
            other => panic!("Expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_price() {
        let csv = format!("{}binance,futures,BTC-USDT,buy,1,abc,1,0,1,1000\n", HEADER);
        assert!(matches!(
            parse_fills(csv.as_bytes()),
            Err(ReplayError::InvalidRow { .. })
        ));
    }

    #[test]
    fn test_replay_sorts_and_counts_rejections() {
        let csv = format!(
            "{}binance,futures,BTC-USDT,sell,2,110,1,0,1,2000\nbinance,futures,BTC-USDT,buy,1,100,1,0,1,1000\nbinance,spot,BTC-USDT,buy,3,100,1,0,1,3000\n",
            HEADER
        );
        let controller = PositionController::new();
        let fills = parse_fills(csv.as_bytes()).unwrap();
        let summary = replay_fills(&controller, fills).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                total: 3,
                tracked: 2,
                rejected: 1,
                keys: 1,
            }
        );
        let key = crate::engine::PositionKey::new("binance", Asset::Futures, Pair::new("BTC", "USDT"));
        assert_eq!(controller.realised_pnl(&key).unwrap(), Decimal::from(10));
    }
}
