use crate::domain::{Asset, Decimal, Fill, Pair, TimeNs};
use std::collections::HashMap;
use std::sync::Arc;

use super::funding::FundingRates;
use super::pnl::{PnlResult, PnlSource, PnlStrategy};
use super::position_tracker::{Position, PositionTracker, PositionTrackerSetup};
use super::TrackerError;

/// Parameters for a multi-position tracker.
#[derive(Debug, Clone)]
pub struct MultiPositionTrackerSetup {
    pub exchange: String,
    pub asset: Asset,
    pub pair: Pair,
    pub underlying: String,
    pub use_exchange_pnl: bool,
    pub pnl_source: Option<Arc<dyn PnlSource>>,
    pub collateral_currency: Option<String>,
}

/// The sequence of positions held on one (exchange, asset, pair).
///
/// Only the last tracker may be open; every earlier one is closed history.
#[derive(Debug, Clone)]
pub struct MultiPositionTracker {
    exchange: String,
    asset: Asset,
    pair: Pair,
    underlying: String,
    collateral_currency: Option<String>,
    strategy: PnlStrategy,
    /// Order id -> index into `positions`.
    order_positions: HashMap<String, usize>,
    positions: Vec<PositionTracker>,
}

impl MultiPositionTracker {
    pub fn new(setup: MultiPositionTrackerSetup) -> Result<Self, TrackerError> {
        if setup.exchange.is_empty() {
            return Err(TrackerError::ExchangeNameEmpty);
        }
        if !setup.asset.is_futures() {
            return Err(TrackerError::NotFuturesAsset(setup.asset));
        }
        if setup.pair.is_empty() {
            return Err(TrackerError::PairEmpty);
        }
        if setup.underlying.is_empty() {
            return Err(TrackerError::UnderlyingEmpty);
        }
        let strategy = match (setup.use_exchange_pnl, setup.pnl_source) {
            (true, Some(source)) => PnlStrategy::ExchangeReported(source),
            (true, None) => return Err(TrackerError::MissingPnlSource),
            (false, _) => PnlStrategy::Calculated,
        };

        Ok(Self {
            exchange: setup.exchange.to_lowercase(),
            asset: setup.asset,
            pair: setup.pair,
            underlying: setup.underlying,
            collateral_currency: setup.collateral_currency,
            strategy,
            order_positions: HashMap::new(),
            positions: Vec::new(),
        })
    }

    /// Route a fill to the position it belongs to, opening a new position
    /// when none is open.
    pub fn track(&mut self, fill: &Fill) -> Result<(), TrackerError> {
        if fill.asset != self.asset {
            return Err(TrackerError::AssetMismatch {
                tracker: self.asset,
                received: fill.asset,
            });
        }

        if let Some(&idx) = self.order_positions.get(&fill.order_id) {
            return self.positions[idx].track(fill);
        }

        if let Some(last_idx) = self.positions.len().checked_sub(1) {
            if let Some(index) = self.positions[..last_idx]
                .iter()
                .position(PositionTracker::is_open)
            {
                tracing::error!(
                    exchange = %self.exchange,
                    asset = %self.asset,
                    pair = %self.pair,
                    index,
                    count = self.positions.len(),
                    "Open position found before the latest position"
                );
                return Err(TrackerError::PositionDiscrepancy {
                    index,
                    count: self.positions.len(),
                });
            }

            if self.positions[last_idx].is_open() {
                match self.positions[last_idx].track(fill) {
                    Ok(()) | Err(TrackerError::PositionClosed) => {}
                    Err(e) => return Err(e),
                }
                self.order_positions
                    .insert(fill.order_id.clone(), last_idx);
                return Ok(());
            }
        }

        let mut tracker = PositionTracker::new(PositionTrackerSetup {
            exchange: self.exchange.clone(),
            asset: fill.asset,
            pair: fill.pair.clone(),
            underlying: self.underlying.clone(),
            entry_price: fill.price,
            side: fill.side,
            strategy: self.strategy.clone(),
            collateral_currency: self.collateral_currency.clone(),
        })?;
        tracker.track(fill)?;
        tracing::debug!(
            exchange = %self.exchange,
            asset = %self.asset,
            pair = %self.pair,
            order_id = %fill.order_id,
            "Opened new position"
        );
        self.positions.push(tracker);
        self.order_positions
            .insert(fill.order_id.clone(), self.positions.len() - 1);
        Ok(())
    }

    /// Attach funding rates to the position whose first entry falls inside the
    /// rates' window.
    pub fn track_funding_details(&mut self, details: &FundingRates) -> Result<(), TrackerError> {
        if details.asset != self.asset {
            return Err(TrackerError::AssetMismatch {
                tracker: self.asset,
                received: details.asset,
            });
        }
        details.check_range()?;
        if self.positions.is_empty() {
            return Err(TrackerError::PositionsNotLoaded(self.describe()));
        }
        self.positions
            .iter_mut()
            .find(|p| p.first_entry_time().map_or(false, |t| details.covers(t)))
            .ok_or(TrackerError::NoPositionsFound)?
            .track_funding_details(details)
    }

    /// Mark the open position to `price`; returns its new unrealised PNL.
    pub fn update_open_position_unrealised_pnl(
        &mut self,
        price: Decimal,
        time: TimeNs,
    ) -> Result<Decimal, TrackerError> {
        let describe = self.describe();
        let latest = self
            .positions
            .last_mut()
            .ok_or(TrackerError::PositionsNotLoaded(describe))?;
        if !latest.is_open() {
            return Err(TrackerError::PositionClosed);
        }
        latest.track_pnl_by_time(time, price)?;
        Ok(latest.unrealised_pnl())
    }

    pub fn liquidate(&mut self, price: Decimal, time: TimeNs) -> Result<(), TrackerError> {
        let describe = self.describe();
        self.positions
            .last_mut()
            .ok_or(TrackerError::PositionsNotLoaded(describe))?
            .liquidate(price, time)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.positions.iter().map(PositionTracker::stats).collect()
    }

    pub fn open_position(&self) -> Option<Position> {
        self.positions
            .last()
            .filter(|p| p.is_open())
            .map(PositionTracker::stats)
    }

    pub fn latest_pnl_snapshot(&self) -> Result<PnlResult, TrackerError> {
        self.positions
            .last()
            .ok_or_else(|| TrackerError::PositionsNotLoaded(self.describe()))?
            .latest_pnl_snapshot()
    }

    /// Realised PNL summed over every position on this contract.
    pub fn realised_pnl(&self) -> Decimal {
        self.positions.iter().map(PositionTracker::realised_pnl).sum()
    }

    pub fn realised_pnl_before_fees(&self) -> Decimal {
        self.positions
            .iter()
            .map(PositionTracker::realised_pnl_before_fees)
            .sum()
    }

    pub fn set_collateral_currency(&mut self, currency: Option<String>) {
        for position in &mut self.positions {
            position.set_collateral_currency(currency.clone());
        }
        self.collateral_currency = currency;
    }

    /// A fresh, empty tracker with the same configuration.
    pub fn cleared(&self) -> Self {
        Self {
            exchange: self.exchange.clone(),
            asset: self.asset,
            pair: self.pair.clone(),
            underlying: self.underlying.clone(),
            collateral_currency: self.collateral_currency.clone(),
            strategy: self.strategy.clone(),
            order_positions: HashMap::new(),
            positions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn describe(&self) -> String {
        format!("{} {} {}", self.exchange, self.asset, self.pair)
    }
}
