use crate::domain::{Asset, Decimal, Fill, Pair, TimeNs};
use std::collections::HashMap;
use std::fmt;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use super::funding::FundingRates;
use super::multi_tracker::{MultiPositionTracker, MultiPositionTrackerSetup};
use super::pnl::{PnlResult, PnlSource};
use super::position_tracker::Position;
use super::TrackerError;

/// Registry key: one entry per (exchange, asset, contract pair).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub exchange: String,
    pub asset: Asset,
    pub pair: Pair,
}

impl PositionKey {
    pub fn new(exchange: &str, asset: Asset, pair: Pair) -> Self {
        Self {
            exchange: exchange.to_lowercase(),
            asset,
            pair,
        }
    }
}

impl From<&Fill> for PositionKey {
    fn from(fill: &Fill) -> Self {
        Self::new(&fill.exchange, fill.asset, fill.pair.clone())
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.asset, self.pair)
    }
}

/// Optional filters for open-position lookups. `None` matches anything.
#[derive(Debug, Clone, Default)]
pub struct PositionFilter {
    pub exchange: Option<String>,
    pub asset: Option<Asset>,
    pub pair: Option<Pair>,
}

impl PositionFilter {
    fn matches(&self, key: &PositionKey) -> bool {
        self.exchange
            .as_deref()
            .map_or(true, |e| e.eq_ignore_ascii_case(&key.exchange))
            && self.asset.map_or(true, |a| a == key.asset)
            && self.pair.as_ref().map_or(true, |p| *p == key.pair)
    }
}

impl fmt::Display for PositionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exchange = self.exchange.as_deref().unwrap_or("*");
        let asset = self
            .asset
            .map(|a| a.to_string())
            .unwrap_or_else(|| "*".to_string());
        let pair = self
            .pair
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "*".to_string());
        write!(f, "{}:{}:{}", exchange, asset, pair)
    }
}

type SharedTracker = Arc<Mutex<MultiPositionTracker>>;

/// Routes fills to the multi-position tracker for their key, creating
/// trackers on first sight.
///
/// Each key has its own lock, so fills on unrelated contracts never wait on
/// each other. The registry lock is only held to find or insert an entry.
#[derive(Debug, Default)]
pub struct PositionController {
    trackers: RwLock<HashMap<PositionKey, SharedTracker>>,
    pnl_source: Option<Arc<dyn PnlSource>>,
    collateral_currency: Option<String>,
}

impl PositionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Price positions with exchange-reported PNL instead of calculating it.
    pub fn with_pnl_source(mut self, source: Arc<dyn PnlSource>) -> Self {
        self.pnl_source = Some(source);
        self
    }

    /// Collateral currency stamped on every tracker created from now on.
    pub fn with_collateral_currency(mut self, currency: impl Into<String>) -> Self {
        self.collateral_currency = Some(currency.into());
        self
    }

    pub fn track(&self, fill: &Fill) -> Result<(), TrackerError> {
        if !fill.asset.is_futures() {
            return Err(TrackerError::NotFuturesAsset(fill.asset));
        }
        let tracker = self.get_or_create(PositionKey::from(fill))?;
        let result = tracker.lock().track(fill);
        result
    }

    /// Attach funding rates to the matching position, creating the key's
    /// tracker if it has not been seen yet.
    pub fn track_funding_details(&self, details: &FundingRates) -> Result<(), TrackerError> {
        if !details.asset.is_futures() {
            return Err(TrackerError::NotFuturesAsset(details.asset));
        }
        let key = PositionKey::new(&details.exchange, details.asset, details.pair.clone());
        let tracker = self.get_or_create(key)?;
        let result = tracker.lock().track_funding_details(details);
        result
    }

    pub fn positions_for(&self, key: &PositionKey) -> Result<Vec<Position>, TrackerError> {
        let tracker = self.require(key)?;
        let positions = tracker.lock().positions();
        Ok(positions)
    }

    /// First open position, in key order, that matches `filter`.
    pub fn open_position(&self, filter: &PositionFilter) -> Result<Position, TrackerError> {
        self.sorted_entries()
            .into_iter()
            .filter(|(key, _)| filter.matches(key))
            .find_map(|(_, tracker)| tracker.lock().open_position())
            .ok_or_else(|| TrackerError::PositionNotFound(filter.to_string()))
    }

    pub fn all_open_positions(&self) -> Result<Vec<Position>, TrackerError> {
        let open: Vec<Position> = self
            .sorted_entries()
            .into_iter()
            .filter_map(|(_, tracker)| tracker.lock().open_position())
            .collect();
        if open.is_empty() {
            return Err(TrackerError::NoPositionsFound);
        }
        Ok(open)
    }

    /// Mark the key's open position to `price`; returns its unrealised PNL.
    pub fn update_open_position_unrealised_pnl(
        &self,
        key: &PositionKey,
        price: Decimal,
        time: TimeNs,
    ) -> Result<Decimal, TrackerError> {
        let tracker = self.require(key)?;
        let result = tracker.lock().update_open_position_unrealised_pnl(price, time);
        result
    }

    pub fn latest_pnl_snapshot(&self, key: &PositionKey) -> Result<PnlResult, TrackerError> {
        let tracker = self.require(key)?;
        let result = tracker.lock().latest_pnl_snapshot();
        result
    }

    /// Fee-netted realised PNL across every position on the key.
    pub fn realised_pnl(&self, key: &PositionKey) -> Result<Decimal, TrackerError> {
        let tracker = self.require(key)?;
        let pnl = tracker.lock().realised_pnl();
        Ok(pnl)
    }

    pub fn realised_pnl_before_fees(&self, key: &PositionKey) -> Result<Decimal, TrackerError> {
        let tracker = self.require(key)?;
        let pnl = tracker.lock().realised_pnl_before_fees();
        Ok(pnl)
    }

    pub fn liquidate(
        &self,
        key: &PositionKey,
        price: Decimal,
        time: TimeNs,
    ) -> Result<(), TrackerError> {
        let tracker = self.require(key)?;
        let result = tracker.lock().liquidate(price, time);
        result
    }

    /// Drop every position on the key, keeping its configuration.
    pub fn clear_positions(&self, key: &PositionKey) -> Result<(), TrackerError> {
        let tracker = self.require(key)?;
        let mut guard = tracker.lock();
        let fresh = guard.cleared();
        *guard = fresh;
        tracing::info!(key = %key, "Cleared positions");
        Ok(())
    }

    pub fn set_collateral_currency(
        &self,
        key: &PositionKey,
        currency: impl Into<String>,
    ) -> Result<(), TrackerError> {
        let tracker = self.require(key)?;
        tracker.lock().set_collateral_currency(Some(currency.into()));
        Ok(())
    }

    pub fn keys(&self) -> Vec<PositionKey> {
        let mut keys: Vec<PositionKey> = self.trackers.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn get_or_create(&self, key: PositionKey) -> Result<SharedTracker, TrackerError> {
        if let Some(tracker) = self.trackers.read().get(&key) {
            return Ok(Arc::clone(tracker));
        }

        let tracker = MultiPositionTracker::new(MultiPositionTrackerSetup {
            exchange: key.exchange.clone(),
            asset: key.asset,
            pair: key.pair.clone(),
            underlying: key.pair.base.clone(),
            use_exchange_pnl: self.pnl_source.is_some(),
            pnl_source: self.pnl_source.clone(),
            collateral_currency: self.collateral_currency.clone(),
        })?;

        let mut map = self.trackers.write();
        let entry = map.entry(key).or_insert_with_key(|key| {
            tracing::debug!(key = %key, "Created position tracker");
            Arc::new(Mutex::new(tracker))
        });
        Ok(Arc::clone(entry))
    }

    fn require(&self, key: &PositionKey) -> Result<SharedTracker, TrackerError> {
        self.trackers
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::PositionsNotLoaded(key.to_string()))
    }

    fn sorted_entries(&self) -> Vec<(PositionKey, SharedTracker)> {
        let mut entries: Vec<_> = self
            .trackers
            .read()
            .iter()
            .map(|(key, tracker)| (key.clone(), Arc::clone(tracker)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
