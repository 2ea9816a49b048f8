//! Stable fill ordering for deterministic replay.

use crate::domain::Fill;

/// Stable ordering key for fills.
///
/// Ordering: time -> order id. Fills for one contract must reach the tracker
/// in this order for PNL history to be reproducible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FillOrderingKey {
    pub time_ns: i64,
    pub order_id: String,
}

impl FillOrderingKey {
    pub fn from_fill(fill: &Fill) -> Self {
        FillOrderingKey {
            time_ns: fill.time.as_i64(),
            order_id: fill.order_id.clone(),
        }
    }
}

/// Sort fills deterministically. The sort is stable, so updates to the same
/// order at the same instant keep their arrival order.
pub fn sort_fills_deterministic(fills: &mut [Fill]) {
    fills.sort_by_cached_key(FillOrderingKey::from_fill);
}
