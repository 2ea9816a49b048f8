//! Fill type representing a confirmed futures order execution.

use crate::domain::{Asset, Decimal, Pair, Side, TimeNs};
use serde::{Deserialize, Serialize};

/// A confirmed order fill handed over by the order-execution subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    /// Exchange name (compared case-insensitively).
    pub exchange: String,
    pub asset: Asset,
    /// Contract pair traded.
    pub pair: Pair,
    pub side: Side,
    /// Exchange order id. Repeated ids update the existing leg in place.
    pub order_id: String,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    /// Fill time in nanoseconds since Unix epoch.
    #[serde(rename = "timeNs")]
    pub time: TimeNs,
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

impl Fill {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: impl Into<String>,
        asset: Asset,
        pair: Pair,
        side: Side,
        order_id: impl Into<String>,
        price: Decimal,
        amount: Decimal,
        fee: Decimal,
        time: TimeNs,
    ) -> Self {
        Fill {
            exchange: exchange.into(),
            asset,
            pair,
            side,
            order_id: order_id.into(),
            price,
            amount,
            fee,
            leverage: Decimal::ONE,
            time,
        }
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    /// Lower-cased exchange name used for keying.
    pub fn exchange_key(&self) -> String {
        self.exchange.to_lowercase()
    }
}
