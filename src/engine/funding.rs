//! Funding rate payments attached to perpetual positions.

use crate::domain::{Asset, Decimal, Pair, TimeNs};
use serde::{Deserialize, Serialize};

use super::TrackerError;

/// One funding interval's rate and the payment it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRate {
    #[serde(rename = "timeNs")]
    pub time: TimeNs,
    pub rate: Decimal,
    #[serde(default)]
    pub payment: Decimal,
}

/// Funding rates reported for a contract over `[start_date, end_date]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRates {
    pub exchange: String,
    pub asset: Asset,
    pub pair: Pair,
    pub start_date: TimeNs,
    pub end_date: TimeNs,
    pub rates: Vec<FundingRate>,
}

impl FundingRates {
    /// Both ends set and `start_date <= end_date`. A single-rate window has
    /// equal ends.
    pub fn check_range(&self) -> Result<(), TrackerError> {
        if self.start_date.is_unset() || self.end_date.is_unset() || self.start_date > self.end_date
        {
            return Err(TrackerError::InvalidTimeRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// True when `time` falls inside the window, ends included.
    pub fn covers(&self, time: TimeNs) -> bool {
        self.start_date <= time && time <= self.end_date
    }
}

/// Merge `incoming` into `rates`: a rate at an existing time replaces it, the
/// rest are inserted in time order.
pub fn merge_funding_rates(rates: &mut Vec<FundingRate>, incoming: &[FundingRate]) {
    for rate in incoming {
        match rates.binary_search_by_key(&rate.time, |r| r.time) {
            Ok(idx) => rates[idx] = rate.clone(),
            Err(idx) => rates.insert(idx, rate.clone()),
        }
    }
}

/// Total funding paid or received over `rates`.
pub fn total_funding(rates: &[FundingRate]) -> Decimal {
    rates.iter().map(|r| r.payment).sum()
}
