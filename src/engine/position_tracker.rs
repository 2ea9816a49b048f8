use crate::domain::{Asset, Decimal, Direction, Fill, Pair, Side, TimeNs};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::funding::{merge_funding_rates, FundingRate, FundingRates};
use super::pnl::{
    calculate_realised_pnl, upsert_pnl_entry, ExchangePnlRequest, OrderPnlRequest, PnlRequest,
    PnlResult, PnlState, PnlStrategy, TimePnlRequest,
};
use super::TrackerError;

/// Lifecycle status of a tracked position. `Closed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    #[default]
    Open,
    Closed,
}

/// Parameters for a new position tracker.
#[derive(Debug, Clone)]
pub struct PositionTrackerSetup {
    pub exchange: String,
    pub asset: Asset,
    pub pair: Pair,
    pub underlying: String,
    pub entry_price: Decimal,
    pub side: Side,
    pub strategy: PnlStrategy,
    pub collateral_currency: Option<String>,
}

/// Read-only snapshot of a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub exchange: String,
    pub asset: Asset,
    pub pair: Pair,
    pub underlying: String,
    pub collateral_currency: Option<String>,
    pub status: PositionStatus,
    pub opening_date: TimeNs,
    pub opening_price: Decimal,
    pub opening_size: Decimal,
    pub opening_direction: Direction,
    pub entry_price: Decimal,
    pub latest_price: Decimal,
    pub latest_size: Decimal,
    pub latest_direction: Direction,
    pub leverage: Decimal,
    pub realised_pnl: Decimal,
    pub unrealised_pnl: Decimal,
    pub closing_price: Option<Decimal>,
    pub closing_date: Option<TimeNs>,
    /// Long and short legs merged in time order.
    pub orders: Vec<Fill>,
    pub pnl_history: Vec<PnlResult>,
    pub funding_rates: Vec<FundingRate>,
}

/// Tracks one continuous position on a futures contract, from its first fill
/// until exposure returns to zero.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    exchange: String,
    asset: Asset,
    contract_pair: Pair,
    underlying: String,
    collateral_currency: Option<String>,
    status: PositionStatus,

    opening_price: Decimal,
    opening_size: Decimal,
    opening_date: TimeNs,
    opening_direction: Direction,
    /// Price the current leg of the position was entered at; moves on a flip.
    entry_price: Decimal,
    current_direction: Direction,
    exposure: Decimal,
    leverage: Decimal,
    latest_price: Decimal,

    unrealised_pnl: Decimal,
    realised_pnl: Decimal,
    closing_price: Option<Decimal>,
    closing_date: Option<TimeNs>,

    long_positions: Vec<Fill>,
    short_positions: Vec<Fill>,
    pnl_history: Vec<PnlResult>,
    funding_rates: Vec<FundingRate>,
    strategy: PnlStrategy,
}

impl PositionTracker {
    pub fn new(setup: PositionTrackerSetup) -> Result<Self, TrackerError> {
        if setup.exchange.is_empty() {
            return Err(TrackerError::ExchangeNameEmpty);
        }
        if !setup.asset.is_futures() {
            return Err(TrackerError::NotFuturesAsset(setup.asset));
        }
        if setup.pair.is_empty() {
            return Err(TrackerError::PairEmpty);
        }

        let direction = setup.side.direction();
        Ok(Self {
            exchange: setup.exchange.to_lowercase(),
            asset: setup.asset,
            contract_pair: setup.pair,
            underlying: setup.underlying,
            collateral_currency: setup.collateral_currency,
            status: PositionStatus::Open,
            opening_price: setup.entry_price,
            opening_size: Decimal::ZERO,
            opening_date: TimeNs::default(),
            opening_direction: direction,
            entry_price: setup.entry_price,
            current_direction: direction,
            exposure: Decimal::ZERO,
            leverage: Decimal::ZERO,
            latest_price: setup.entry_price,
            unrealised_pnl: Decimal::ZERO,
            realised_pnl: Decimal::ZERO,
            closing_price: None,
            closing_date: None,
            long_positions: Vec::new(),
            short_positions: Vec::new(),
            pnl_history: Vec::new(),
            funding_rates: Vec::new(),
            strategy: setup.strategy,
        })
    }

    /// Apply a fill to the position, updating legs, PNL history, direction,
    /// exposure and status.
    ///
    /// Returns `PositionClosed` without touching state once the position is
    /// closed; callers route the fill to a new tracker. Any other error also
    /// leaves the tracker as it was.
    pub fn track(&mut self, fill: &Fill) -> Result<(), TrackerError> {
        if self.status == PositionStatus::Closed {
            return Err(TrackerError::PositionClosed);
        }
        self.validate(fill)?;

        // Work on locals until the PNL calculation has succeeded.
        let is_initial = self.long_positions.is_empty() && self.short_positions.is_empty();
        let (mut opening_direction, mut entry_price) = if is_initial {
            (fill.side.direction(), fill.price)
        } else {
            (self.opening_direction, self.entry_price)
        };
        let (long_side, short_side, leverage) = self.leg_totals(fill);
        let current_direction = if self.current_direction.is_unknown() {
            fill.side.direction()
        } else {
            self.current_direction
        };

        let request = match &self.strategy {
            PnlStrategy::Calculated => PnlRequest::Order(OrderPnlRequest {
                time: fill.time,
                side: fill.side,
                amount: fill.amount,
                price: fill.price,
                fee: fill.fee,
                is_initial,
            }),
            PnlStrategy::ExchangeReported(_) => {
                PnlRequest::Exchange(self.exchange_request(fill, leverage, entry_price))
            }
        };
        let state = PnlState {
            history: &mut self.pnl_history,
            opening_direction: &mut opening_direction,
            entry_price: &mut entry_price,
            current_direction,
            exposure: self.exposure,
        };

        let (result, liquidated) = match self.strategy.calculate(request, state) {
            Ok(result) => (result, false),
            Err(TrackerError::PositionLiquidated) => {
                tracing::warn!(
                    exchange = %self.exchange,
                    asset = %self.asset,
                    pair = %self.contract_pair,
                    order_id = %fill.order_id,
                    "Position liquidated"
                );
                let result = PnlResult {
                    time: fill.time,
                    price: fill.price,
                    fee: fill.fee,
                    direction: current_direction,
                    is_order: true,
                    is_liquidated: true,
                    ..PnlResult::default()
                };
                (result, true)
            }
            Err(e) => return Err(e),
        };
        let unrealised_pnl = result.unrealised_pnl;
        upsert_pnl_entry(&mut self.pnl_history, result)?;

        self.upsert_leg(fill);
        self.leverage = leverage;
        if is_initial {
            self.opening_price = fill.price;
            self.opening_size = fill.amount;
            self.opening_date = fill.time;
        }
        self.opening_direction = opening_direction;
        self.entry_price = entry_price;
        self.unrealised_pnl = unrealised_pnl;

        self.current_direction = match long_side.cmp(&short_side) {
            Ordering::Greater => Direction::Long,
            Ordering::Less => Direction::Short,
            Ordering::Equal => Direction::Unknown,
        };
        let exposure = if self.current_direction.is_long() {
            long_side - short_side
        } else {
            short_side - long_side
        };
        if exposure.is_negative() {
            self.current_direction = self.current_direction.opposite();
        }
        self.exposure = exposure.abs();

        if liquidated {
            self.status = PositionStatus::Closed;
            self.closing_price = Some(fill.price);
            self.closing_date = Some(fill.time);
            self.exposure = Decimal::ZERO;
            self.realised_pnl = Decimal::ZERO;
            self.unrealised_pnl = Decimal::ZERO;
            return Ok(());
        }

        if self.exposure.is_zero() {
            self.close(fill.price, fill.time);
        }
        Ok(())
    }

    /// Mark the open position to `price` at `time` without a fill.
    ///
    /// The latest price is recorded even if the calculation fails.
    pub fn track_pnl_by_time(&mut self, time: TimeNs, price: Decimal) -> Result<(), TrackerError> {
        self.latest_price = price;
        if self.status == PositionStatus::Closed {
            return Err(TrackerError::PositionClosed);
        }
        if time.is_unset() {
            return Err(TrackerError::EntryTimeUnset);
        }

        let state = PnlState {
            history: &mut self.pnl_history,
            opening_direction: &mut self.opening_direction,
            entry_price: &mut self.entry_price,
            current_direction: self.current_direction,
            exposure: self.exposure,
        };
        let mut result = self
            .strategy
            .calculate(PnlRequest::Time(TimePnlRequest { time, price }), state)?;

        // A mark landing on a fill's timestamp keeps that fill's realised figures.
        if let Some(fill_entry) = self
            .pnl_history
            .iter()
            .find(|entry| entry.time == time && entry.is_order)
        {
            result.realised_pnl_before_fees = fill_entry.realised_pnl_before_fees;
            result.realised_pnl = fill_entry.realised_pnl;
            result.fee = fill_entry.fee;
            result.exposure = fill_entry.exposure;
            result.is_order = true;
            result.is_liquidated = fill_entry.is_liquidated;
        }

        self.unrealised_pnl = result.unrealised_pnl;
        upsert_pnl_entry(&mut self.pnl_history, result)
    }

    /// Force-close the position after an exchange liquidation.
    ///
    /// `time` must match the latest PNL snapshot.
    pub fn liquidate(&mut self, price: Decimal, time: TimeNs) -> Result<(), TrackerError> {
        if self.status == PositionStatus::Closed {
            return Err(TrackerError::PositionClosed);
        }
        let latest = self.latest_pnl_snapshot()?;
        if latest.time != time {
            return Err(TrackerError::CannotLiquidate {
                latest: latest.time,
                requested: time,
            });
        }

        tracing::warn!(
            exchange = %self.exchange,
            asset = %self.asset,
            pair = %self.contract_pair,
            price = %price,
            "Liquidating position"
        );
        self.status = PositionStatus::Closed;
        self.current_direction = Direction::Unknown;
        self.exposure = Decimal::ZERO;
        self.realised_pnl = Decimal::ZERO;
        self.unrealised_pnl = Decimal::ZERO;
        self.closing_price = Some(price);
        self.closing_date = Some(time);
        upsert_pnl_entry(
            &mut self.pnl_history,
            PnlResult {
                time,
                price,
                direction: Direction::Unknown,
                is_order: true,
                is_liquidated: true,
                ..PnlResult::default()
            },
        )
    }

    /// Attach funding rates paid over the position's lifetime. Rates at an
    /// already recorded time replace the old figure.
    pub fn track_funding_details(&mut self, details: &FundingRates) -> Result<(), TrackerError> {
        if !details.exchange.eq_ignore_ascii_case(&self.exchange) {
            return Err(TrackerError::FundingMismatch {
                field: "exchange",
                tracker: self.exchange.clone(),
                received: details.exchange.clone(),
            });
        }
        if details.asset != self.asset {
            return Err(TrackerError::FundingMismatch {
                field: "asset",
                tracker: self.asset.to_string(),
                received: details.asset.to_string(),
            });
        }
        if details.pair != self.contract_pair {
            return Err(TrackerError::FundingMismatch {
                field: "pair",
                tracker: self.contract_pair.to_string(),
                received: details.pair.to_string(),
            });
        }
        details.check_range()?;
        if self.pnl_history.is_empty() {
            return Err(TrackerError::NoPositionsFound);
        }
        let ends_after_close = self.status == PositionStatus::Closed
            && self
                .closing_date
                .map_or(false, |closed| details.end_date > closed);
        if details.start_date < self.opening_date || ends_after_close {
            return Err(TrackerError::FundingRateOutOfRange);
        }

        merge_funding_rates(&mut self.funding_rates, &details.rates);
        tracing::debug!(
            exchange = %self.exchange,
            asset = %self.asset,
            pair = %self.contract_pair,
            rates = details.rates.len(),
            "Tracked funding rates"
        );
        Ok(())
    }

    pub fn latest_pnl_snapshot(&self) -> Result<PnlResult, TrackerError> {
        self.pnl_history
            .last()
            .cloned()
            .ok_or_else(|| TrackerError::NoPnlHistory(self.describe()))
    }

    /// Realised PNL: final once closed, running total from history while open.
    pub fn realised_pnl(&self) -> Decimal {
        match self.status {
            PositionStatus::Closed => self.realised_pnl,
            PositionStatus::Open => calculate_realised_pnl(&self.pnl_history),
        }
    }

    /// Realised PNL before fees, summed over the whole history.
    pub fn realised_pnl_before_fees(&self) -> Decimal {
        self.pnl_history
            .iter()
            .map(|entry| entry.realised_pnl_before_fees)
            .sum()
    }

    pub fn stats(&self) -> Position {
        let mut orders: Vec<Fill> = self
            .long_positions
            .iter()
            .chain(self.short_positions.iter())
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.time);

        Position {
            exchange: self.exchange.clone(),
            asset: self.asset,
            pair: self.contract_pair.clone(),
            underlying: self.underlying.clone(),
            collateral_currency: self.collateral_currency.clone(),
            status: self.status,
            opening_date: self.opening_date,
            opening_price: self.opening_price,
            opening_size: self.opening_size,
            opening_direction: self.opening_direction,
            entry_price: self.entry_price,
            latest_price: self.latest_price,
            latest_size: self.exposure,
            latest_direction: self.current_direction,
            leverage: self.leverage,
            realised_pnl: self.realised_pnl(),
            unrealised_pnl: self.unrealised_pnl,
            closing_price: self.closing_price,
            closing_date: self.closing_date,
            orders,
            pnl_history: self.pnl_history.clone(),
            funding_rates: self.funding_rates.clone(),
        }
    }

    pub fn funding_rates(&self) -> &[FundingRate] {
        &self.funding_rates
    }

    /// Time of the first PNL entry, if any.
    pub fn first_entry_time(&self) -> Option<TimeNs> {
        self.pnl_history.first().map(|entry| entry.time)
    }

    pub fn status(&self) -> PositionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn exposure(&self) -> Decimal {
        self.exposure
    }

    pub fn current_direction(&self) -> Direction {
        self.current_direction
    }

    pub fn opening_direction(&self) -> Direction {
        self.opening_direction
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn latest_price(&self) -> Decimal {
        self.latest_price
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    pub fn unrealised_pnl(&self) -> Decimal {
        self.unrealised_pnl
    }

    pub fn closing_price(&self) -> Option<Decimal> {
        self.closing_price
    }

    pub fn pnl_history(&self) -> &[PnlResult] {
        &self.pnl_history
    }

    pub fn set_collateral_currency(&mut self, currency: Option<String>) {
        self.collateral_currency = currency;
    }

    fn validate(&self, fill: &Fill) -> Result<(), TrackerError> {
        if fill.pair != self.contract_pair {
            return Err(TrackerError::FillMismatch {
                field: "pair",
                tracker: self.contract_pair.to_string(),
                received: fill.pair.to_string(),
            });
        }
        if !fill.exchange.eq_ignore_ascii_case(&self.exchange) {
            return Err(TrackerError::FillMismatch {
                field: "exchange",
                tracker: self.exchange.clone(),
                received: fill.exchange.clone(),
            });
        }
        if fill.asset != self.asset {
            return Err(TrackerError::FillMismatch {
                field: "asset",
                tracker: self.asset.to_string(),
                received: fill.asset.to_string(),
            });
        }
        if fill.side == Side::Unknown {
            return Err(TrackerError::SideUnset {
                order_id: fill.order_id.clone(),
            });
        }
        if fill.order_id.is_empty() {
            return Err(TrackerError::OrderIdUnset);
        }
        if fill.time.is_unset() {
            return Err(TrackerError::TimeUnset {
                order_id: fill.order_id.clone(),
            });
        }
        if fill.time.as_i64() < 0 || fill.time == TimeNs::MAX {
            return Err(TrackerError::TimeOutOfRange {
                order_id: fill.order_id.clone(),
            });
        }
        Ok(())
    }

    /// Replace the leg with the same order id, otherwise append by side.
    fn upsert_leg(&mut self, fill: &Fill) {
        if let Some(leg) = self
            .short_positions
            .iter_mut()
            .chain(self.long_positions.iter_mut())
            .find(|leg| leg.order_id == fill.order_id)
        {
            *leg = fill.clone();
            return;
        }
        if fill.side.is_short() {
            self.short_positions.push(fill.clone());
        } else {
            self.long_positions.push(fill.clone());
        }
    }

    /// Leg totals per side as they stand once `fill` is applied, plus the
    /// resulting leverage: the last visited leg's, short legs first.
    fn leg_totals(&self, fill: &Fill) -> (Decimal, Decimal, Decimal) {
        let replaces = self
            .short_positions
            .iter()
            .chain(self.long_positions.iter())
            .any(|leg| leg.order_id == fill.order_id);
        let appended = (!replaces).then_some(fill);
        let current = |leg: &Fill| -> (Decimal, Decimal) {
            if leg.order_id == fill.order_id {
                (fill.amount, fill.leverage)
            } else {
                (leg.amount, leg.leverage)
            }
        };

        let mut leverage = self.leverage;
        let mut short_side = Decimal::ZERO;
        for leg in self
            .short_positions
            .iter()
            .chain(appended.filter(|f| f.side.is_short()))
        {
            let (amount, leg_leverage) = current(leg);
            short_side += amount;
            leverage = leg_leverage;
        }
        let mut long_side = Decimal::ZERO;
        for leg in self
            .long_positions
            .iter()
            .chain(appended.filter(|f| !f.side.is_short()))
        {
            let (amount, leg_leverage) = current(leg);
            long_side += amount;
            leverage = leg_leverage;
        }
        (long_side, short_side, leverage)
    }

    fn exchange_request(
        &self,
        fill: &Fill,
        leverage: Decimal,
        entry_price: Decimal,
    ) -> ExchangePnlRequest {
        ExchangePnlRequest {
            underlying: self.underlying.clone(),
            asset: self.asset,
            side: fill.side,
            leverage,
            entry_price,
            amount: fill.amount,
            current_price: fill.price,
            pair: self.contract_pair.clone(),
            time: fill.time,
            previous_price: self.pnl_history.last().map(|entry| entry.price),
        }
    }

    fn close(&mut self, price: Decimal, time: TimeNs) {
        self.status = PositionStatus::Closed;
        self.closing_price = Some(price);
        self.closing_date = Some(time);
        self.realised_pnl = calculate_realised_pnl(&self.pnl_history);
        self.unrealised_pnl = Decimal::ZERO;
        if let Some(last) = self.pnl_history.last_mut() {
            *last = PnlResult {
                realised_pnl: self.realised_pnl,
                unrealised_pnl: Decimal::ZERO,
                direction: Direction::Unknown,
                ..last.clone()
            };
        }
        tracing::info!(
            exchange = %self.exchange,
            asset = %self.asset,
            pair = %self.contract_pair,
            realised_pnl = %self.realised_pnl,
            "Position closed"
        );
    }

    fn describe(&self) -> String {
        format!("{} {} {}", self.exchange, self.asset, self.contract_pair)
    }
}
