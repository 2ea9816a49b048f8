//! PNL calculation for futures positions.
//!
//! Calculations are pure: every input comes from the request and the
//! `PnlState` the tracker hands over. The only write is the closing leg of a
//! direction flip, which must land in history before the reopening leg is
//! priced against it. It is taken back out if the reopening leg fails.

use crate::domain::{Asset, Decimal, Direction, Pair, Side, TimeNs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::TrackerError;

/// One entry of a position's PNL history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResult {
    pub time: TimeNs,
    pub unrealised_pnl: Decimal,
    pub realised_pnl_before_fees: Decimal,
    /// Fee-netted realised PNL, stamped on the entry that closes the position.
    pub realised_pnl: Decimal,
    pub price: Decimal,
    pub exposure: Decimal,
    pub fee: Decimal,
    pub direction: Direction,
    /// False for mark-to-market entries.
    pub is_order: bool,
    pub is_liquidated: bool,
}

/// A fill to price against the tracker's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPnlRequest {
    pub time: TimeNs,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    /// First fill of the tracker.
    pub is_initial: bool,
}

/// A mark price update with no fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePnlRequest {
    pub time: TimeNs,
    pub price: Decimal,
}

/// Input handed to an exchange-reported PNL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangePnlRequest {
    pub underlying: String,
    pub asset: Asset,
    pub side: Side,
    pub leverage: Decimal,
    pub entry_price: Decimal,
    pub amount: Decimal,
    pub current_price: Decimal,
    pub pair: Pair,
    pub time: TimeNs,
    pub previous_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PnlRequest {
    Order(OrderPnlRequest),
    Time(TimePnlRequest),
    Exchange(ExchangePnlRequest),
}

/// Exchange-side PNL calculation plugged into a tracker.
pub trait PnlSource: Send + Sync + fmt::Debug {
    fn calculate_pnl(&self, request: &ExchangePnlRequest) -> Result<PnlResult, TrackerError>;
}

/// Where a tracker gets its PNL from. Chosen once when the tracker is built.
#[derive(Debug, Clone, Default)]
pub enum PnlStrategy {
    #[default]
    Calculated,
    ExchangeReported(Arc<dyn PnlSource>),
}

impl PnlStrategy {
    pub fn is_exchange_reported(&self) -> bool {
        matches!(self, PnlStrategy::ExchangeReported(_))
    }

    pub fn calculate(
        &self,
        request: PnlRequest,
        state: PnlState<'_>,
    ) -> Result<PnlResult, TrackerError> {
        match request {
            PnlRequest::Order(order) => order_pnl(&order, state),
            PnlRequest::Time(mark) => Ok(time_pnl(&mark, &state)),
            PnlRequest::Exchange(request) => match self {
                PnlStrategy::ExchangeReported(source) => source.calculate_pnl(&request),
                PnlStrategy::Calculated => Err(TrackerError::MissingPnlSource),
            },
        }
    }
}

/// Tracker state lent to the calculator for one calculation.
pub struct PnlState<'a> {
    pub history: &'a mut Vec<PnlResult>,
    pub opening_direction: &'a mut Direction,
    pub entry_price: &'a mut Decimal,
    pub current_direction: Direction,
    pub exposure: Decimal,
}

fn order_pnl(order: &OrderPnlRequest, state: PnlState<'_>) -> Result<PnlResult, TrackerError> {
    if order.is_initial {
        return Ok(PnlResult {
            time: order.time,
            unrealised_pnl: -order.fee,
            price: order.price,
            exposure: order.amount,
            fee: order.fee,
            direction: order.side.direction(),
            is_order: true,
            ..PnlResult::default()
        });
    }

    let flips =
        state.current_direction.is_opposed_by(order.side) && order.amount > state.exposure;
    if !flips {
        return leg_pnl(
            &state,
            order.side,
            order.time,
            order.amount,
            order.price,
            order.fee,
        );
    }

    // Close the held exposure, then reopen the remainder the other way.
    let closing_amount = state.exposure;
    let reopening_amount = order.amount - state.exposure;
    let leg_fee = order.fee / Decimal::TWO;

    let closing = leg_pnl(
        &state,
        order.side,
        order.time,
        closing_amount,
        order.price,
        leg_fee,
    )?;
    let displaced = state
        .history
        .iter()
        .find(|entry| entry.time == closing.time)
        .cloned();
    upsert_pnl_entry(state.history, closing)?;

    let opening_direction = *state.opening_direction;
    *state.opening_direction = opening_direction.opposite();
    let working_side = if order.side.is_long() {
        Side::Short
    } else {
        Side::Long
    };

    let reopening = leg_pnl(
        &state,
        working_side,
        order.time.next(),
        reopening_amount,
        order.price,
        leg_fee,
    );
    match reopening {
        Ok(mut reopening) => {
            *state.entry_price = order.price;
            reopening.direction = order.side.direction();
            Ok(reopening)
        }
        Err(e) => {
            *state.opening_direction = opening_direction;
            restore_pnl_entry(state.history, order.time, displaced);
            Err(e)
        }
    }
}

/// Undo an upsert at `time`, putting back the entry it displaced.
fn restore_pnl_entry(history: &mut Vec<PnlResult>, time: TimeNs, displaced: Option<PnlResult>) {
    if let Ok(idx) = history.binary_search_by_key(&time, |e| e.time) {
        match displaced {
            Some(entry) => history[idx] = entry,
            None => {
                history.remove(idx);
            }
        }
    }
}

/// Prices one leg of an order against the latest order-driven history entry.
fn leg_pnl(
    state: &PnlState<'_>,
    side: Side,
    time: TimeNs,
    amount: Decimal,
    price: Decimal,
    fee: Decimal,
) -> Result<PnlResult, TrackerError> {
    let previous = state
        .history
        .iter()
        .rev()
        .find(|entry| entry.is_order && entry.time != time);
    let prev_exposure = previous.map(|p| p.exposure).unwrap_or_default();
    let prev_price = previous.map(|p| p.price).unwrap_or(price);

    let (first, second) = match *state.opening_direction {
        Direction::Long => (price, prev_price),
        Direction::Short => (prev_price, price),
        Direction::Unknown => (price, price),
    };
    let diff = first - second;

    let current = state.current_direction;
    let (exposure, mut unrealised, realised) = if !current.is_unknown()
        && side.direction() == current
    {
        let exposure = prev_exposure + amount;
        (exposure, exposure * diff, Decimal::ZERO)
    } else if current.is_opposed_by(side) {
        let exposure = prev_exposure - amount;
        (exposure, exposure * diff, amount * diff)
    } else {
        return Err(TrackerError::CannotCalculateUnrealisedPnl {
            opening: *state.opening_direction,
            current,
            side,
        });
    };

    if !unrealised.is_zero() {
        let total_fees: Decimal = fee + state.history.iter().map(|entry| entry.fee).sum::<Decimal>();
        unrealised -= total_fees;
    }

    Ok(PnlResult {
        time,
        unrealised_pnl: unrealised,
        realised_pnl_before_fees: realised,
        price,
        exposure,
        fee,
        direction: current,
        is_order: true,
        ..PnlResult::default()
    })
}

fn time_pnl(mark: &TimePnlRequest, state: &PnlState<'_>) -> PnlResult {
    let entry = *state.entry_price;
    let unrealised = match state.current_direction {
        Direction::Long => state.exposure * (mark.price - entry),
        Direction::Short => state.exposure * (entry - mark.price),
        Direction::Unknown => Decimal::ZERO,
    };
    PnlResult {
        time: mark.time,
        unrealised_pnl: unrealised,
        price: mark.price,
        exposure: state.exposure,
        direction: state.current_direction,
        ..PnlResult::default()
    }
}

/// Fee-netted realised PNL over a history.
///
/// Returns zero when the gross realised sum is zero, even if fees were paid.
pub fn calculate_realised_pnl(history: &[PnlResult]) -> Decimal {
    let gross: Decimal = history.iter().map(|e| e.realised_pnl_before_fees).sum();
    if gross.is_zero() {
        return Decimal::ZERO;
    }
    let fees: Decimal = history.iter().map(|e| e.fee).sum();
    gross - fees
}

/// Replaces the entry with the same timestamp, otherwise inserts in time order.
pub fn upsert_pnl_entry(history: &mut Vec<PnlResult>, entry: PnlResult) -> Result<(), TrackerError> {
    if entry.time.is_unset() {
        return Err(TrackerError::EntryTimeUnset);
    }
    match history.binary_search_by_key(&entry.time, |e| e.time) {
        Ok(idx) => history[idx] = entry,
        Err(idx) => history.insert(idx, entry),
    }
    Ok(())
}
