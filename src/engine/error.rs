use crate::domain::{Asset, Direction, Side, TimeNs};
use thiserror::Error;

/// Errors raised by the position engine.
///
/// `PositionClosed` is a routing signal rather than a failure: the caller
/// starts a new tracker for the next fill.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("asset {0} is not a futures asset")]
    NotFuturesAsset(Asset),
    #[error("exchange name is empty")]
    ExchangeNameEmpty,
    #[error("contract pair is empty")]
    PairEmpty,
    #[error("underlying asset is empty")]
    UnderlyingEmpty,
    #[error("exchange PNL calculation requested without a PNL source")]
    MissingPnlSource,
    #[error("asset mismatch: tracker {tracker} received {received}")]
    AssetMismatch { tracker: Asset, received: Asset },
    #[error("fill does not match tracker {field}: tracker '{tracker}' received '{received}'")]
    FillMismatch {
        field: &'static str,
        tracker: String,
        received: String,
    },
    #[error("fill {order_id} has no side")]
    SideUnset { order_id: String },
    #[error("fill order id is empty")]
    OrderIdUnset,
    #[error("time unset for order {order_id}")]
    TimeUnset { order_id: String },
    #[error("time out of range for order {order_id}")]
    TimeOutOfRange { order_id: String },
    #[error("PNL entry time unset")]
    EntryTimeUnset,
    #[error("position is closed")]
    PositionClosed,
    #[error("position discrepancy: open position at index {index} of {count}, only the last may be open")]
    PositionDiscrepancy { index: usize, count: usize },
    #[error("position liquidated")]
    PositionLiquidated,
    #[error("cannot calculate unrealised PNL: opening direction {opening}, current direction {current}, order side {side}")]
    CannotCalculateUnrealisedPnl {
        opening: Direction,
        current: Direction,
        side: Side,
    },
    #[error("no PNL history for {0}")]
    NoPnlHistory(String),
    #[error("positions not loaded for {0}")]
    PositionsNotLoaded(String),
    #[error("no open position for {0}")]
    PositionNotFound(String),
    #[error("no positions found")]
    NoPositionsFound,
    #[error("cannot liquidate at {requested}: latest PNL snapshot is at {latest}")]
    CannotLiquidate { latest: TimeNs, requested: TimeNs },
    #[error("funding rates do not match tracker {field}: tracker '{tracker}' received '{received}'")]
    FundingMismatch {
        field: &'static str,
        tracker: String,
        received: String,
    },
    #[error("invalid time range {start} to {end}")]
    InvalidTimeRange { start: TimeNs, end: TimeNs },
    #[error("funding rates fall outside the position's lifetime")]
    FundingRateOutOfRange,
    #[error("exchange PNL source failed: {0}")]
    ExchangePnl(String),
}

impl TrackerError {
    /// Errors caused by the caller's input rather than engine state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrackerError::NotFuturesAsset(_)
                | TrackerError::ExchangeNameEmpty
                | TrackerError::PairEmpty
                | TrackerError::UnderlyingEmpty
                | TrackerError::MissingPnlSource
                | TrackerError::AssetMismatch { .. }
                | TrackerError::FillMismatch { .. }
                | TrackerError::SideUnset { .. }
                | TrackerError::OrderIdUnset
                | TrackerError::TimeUnset { .. }
                | TrackerError::TimeOutOfRange { .. }
                | TrackerError::EntryTimeUnset
                | TrackerError::FundingMismatch { .. }
                | TrackerError::InvalidTimeRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TrackerError::NotFuturesAsset(Asset::Spot).to_string(),
            "asset spot is not a futures asset"
        );
        assert_eq!(
            TrackerError::PositionDiscrepancy { index: 0, count: 2 }.to_string(),
            "position discrepancy: open position at index 0 of 2, only the last may be open"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(TrackerError::OrderIdUnset.is_validation());
        assert!(TrackerError::PairEmpty.is_validation());
        assert!(TrackerError::TimeOutOfRange {
            order_id: "1".to_string()
        }
        .is_validation());
        assert!(!TrackerError::FundingRateOutOfRange.is_validation());
        assert!(!TrackerError::PositionClosed.is_validation());
        assert!(!TrackerError::NoPositionsFound.is_validation());
    }
}
