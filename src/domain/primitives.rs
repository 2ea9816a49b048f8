//! Domain primitives: TimeNs, Side, Direction, Asset, Pair.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time in nanoseconds since Unix epoch. Zero means unset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeNs(pub i64);

impl TimeNs {
    pub fn new(ns: i64) -> Self {
        TimeNs(ns)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        TimeNs(dt.timestamp_nanos_opt().unwrap_or_default())
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }

    /// Latest representable instant. A fill at this time has no room for the
    /// reopening leg of a flip.
    pub const MAX: TimeNs = TimeNs(i64::MAX);

    /// The instant one nanosecond later. Used to order the reopening leg of a
    /// direction flip after its closing leg. Saturates at `TimeNs::MAX`.
    pub fn next(&self) -> Self {
        TimeNs(self.0.saturating_add(1))
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }
}

impl fmt::Display for TimeNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

/// Order side as reported by an exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
    Bid,
    Ask,
    Long,
    Short,
    #[default]
    Unknown,
}

impl Side {
    pub fn is_long(&self) -> bool {
        matches!(self, Side::Buy | Side::Bid | Side::Long)
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Side::Sell | Side::Ask | Side::Short)
    }

    /// The position direction this side builds.
    pub fn direction(&self) -> Direction {
        if self.is_long() {
            Direction::Long
        } else if self.is_short() {
            Direction::Short
        } else {
            Direction::Unknown
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
            Side::Bid => "bid",
            Side::Ask => "ask",
            Side::Long => "long",
            Side::Short => "short",
            Side::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    #[default]
    Unknown,
}

impl Direction {
    pub fn is_long(&self) -> bool {
        *self == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        *self == Direction::Short
    }

    pub fn is_unknown(&self) -> bool {
        *self == Direction::Unknown
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
            Direction::Unknown => Direction::Unknown,
        }
    }

    /// True when `side` reduces a position held in this direction.
    pub fn is_opposed_by(&self, side: Side) -> bool {
        (self.is_long() && side.is_short()) || (self.is_short() && side.is_long())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
            Direction::Unknown => f.write_str("unknown"),
        }
    }
}

/// Asset class of a traded instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Spot,
    Margin,
    Futures,
    PerpetualSwap,
    PerpetualContract,
    CoinMarginedFutures,
    UsdtMarginedFutures,
    UsdcMarginedFutures,
}

impl Asset {
    pub fn is_futures(&self) -> bool {
        !matches!(self, Asset::Spot | Asset::Margin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Asset::Spot => "spot",
            Asset::Margin => "margin",
            Asset::Futures => "futures",
            Asset::PerpetualSwap => "perpetual_swap",
            Asset::PerpetualContract => "perpetual_contract",
            Asset::CoinMarginedFutures => "coin_margined_futures",
            Asset::UsdtMarginedFutures => "usdt_margined_futures",
            Asset::UsdcMarginedFutures => "usdc_margined_futures",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveParseError {
    #[error("unrecognised side '{0}'")]
    Side(String),
    #[error("unrecognised asset '{0}'")]
    Asset(String),
    #[error("pair '{0}' must be BASE-QUOTE, BASE/QUOTE or BASE_QUOTE")]
    Pair(String),
}

impl FromStr for Side {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let side = match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Side::Buy,
            "sell" => Side::Sell,
            "bid" => Side::Bid,
            "ask" => Side::Ask,
            "long" => Side::Long,
            "short" => Side::Short,
            _ => return Err(PrimitiveParseError::Side(s.to_string())),
        };
        Ok(side)
    }
}

impl FromStr for Asset {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let asset = match s.trim().to_ascii_lowercase().as_str() {
            "spot" => Asset::Spot,
            "margin" => Asset::Margin,
            "futures" => Asset::Futures,
            "perpetual_swap" | "perpetualswap" => Asset::PerpetualSwap,
            "perpetual_contract" | "perpetualcontract" => Asset::PerpetualContract,
            "coin_margined_futures" | "coinmarginedfutures" => Asset::CoinMarginedFutures,
            "usdt_margined_futures" | "usdtmarginedfutures" => Asset::UsdtMarginedFutures,
            "usdc_margined_futures" | "usdcmarginedfutures" => Asset::UsdcMarginedFutures,
            _ => return Err(PrimitiveParseError::Asset(s.to_string())),
        };
        Ok(asset)
    }
}

/// Contract pair (e.g. "BTC-USDT"). The base is the contract's underlying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Pair {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.quote.is_empty()
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = PrimitiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Pair::default());
        }
        let (base, quote) = s
            .split_once(['-', '/', '_'])
            .ok_or_else(|| PrimitiveParseError::Pair(s.to_string()))?;
        if base.is_empty() || quote.is_empty() {
            return Err(PrimitiveParseError::Pair(s.to_string()));
        }
        Ok(Pair::new(base, quote))
    }
}

impl TryFrom<String> for Pair {
    type Error = PrimitiveParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        if pair.is_empty() {
            String::new()
        } else {
            pair.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_classification() {
        for side in [Side::Buy, Side::Bid, Side::Long] {
            assert!(side.is_long());
            assert_eq!(side.direction(), Direction::Long);
        }
        for side in [Side::Sell, Side::Ask, Side::Short] {
            assert!(side.is_short());
            assert_eq!(side.direction(), Direction::Short);
        }
        assert!(!Side::Unknown.is_long());
        assert!(!Side::Unknown.is_short());
        assert_eq!(Side::Unknown.direction(), Direction::Unknown);
    }

    #[test]
    fn test_side_from_str() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" ask ".parse::<Side>().unwrap(), Side::Ask);
        assert!(matches!(
            "unknown".parse::<Side>(),
            Err(PrimitiveParseError::Side(_))
        ));
    }

    #[test]
    fn test_direction_opposition() {
        assert!(Direction::Long.is_opposed_by(Side::Sell));
        assert!(Direction::Short.is_opposed_by(Side::Buy));
        assert!(!Direction::Long.is_opposed_by(Side::Buy));
        assert!(!Direction::Unknown.is_opposed_by(Side::Sell));
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Unknown.opposite(), Direction::Unknown);
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
        let side: Side = serde_json::from_str("\"long\"").unwrap();
        assert_eq!(side, Side::Long);
    }

    #[test]
    fn test_asset_is_futures() {
        assert!(!Asset::Spot.is_futures());
        assert!(!Asset::Margin.is_futures());
        assert!(Asset::Futures.is_futures());
        assert!(Asset::PerpetualSwap.is_futures());
        assert!(Asset::UsdtMarginedFutures.is_futures());
    }

    #[test]
    fn test_asset_parse_roundtrips_display() {
        let asset: Asset = "usdt_margined_futures".parse().unwrap();
        assert_eq!(asset, Asset::UsdtMarginedFutures);
        assert_eq!(asset.to_string().parse::<Asset>().unwrap(), asset);
        assert!("options".parse::<Asset>().is_err());
    }

    #[test]
    fn test_pair_parsing() {
        let pair: Pair = "btc-usdt".parse().unwrap();
        assert_eq!(pair, Pair::new("BTC", "USDT"));
        assert_eq!("BTC/USDT".parse::<Pair>().unwrap(), pair);
        assert_eq!("BTC_USDT".parse::<Pair>().unwrap(), pair);
        assert_eq!(pair.to_string(), "BTC-USDT");
        assert!("BTCUSDT".parse::<Pair>().is_err());
        assert!("".parse::<Pair>().unwrap().is_empty());
    }

    #[test]
    fn test_pair_serde_as_string() {
        let pair = Pair::new("ETH", "PERP");
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"ETH-PERP\"");
        let back: Pair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }

    #[test]
    fn test_time_ns_next_and_unset() {
        let t = TimeNs::new(1_000);
        assert_eq!(t.next(), TimeNs::new(1_001));
        assert!(t < t.next());
        assert!(TimeNs::default().is_unset());
        assert!(!t.is_unset());
        assert_eq!(TimeNs::MAX.next(), TimeNs::MAX);
    }

    #[test]
    fn test_time_ns_datetime_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let t = TimeNs::from_datetime(dt);
        assert_eq!(t.to_datetime(), dt);
        assert_eq!(t.to_string(), "2024-01-02T03:04:05+00:00");
    }
}
