//! Position tracking and PNL engine.
//!
//! Pure, synchronous computation. Locking lives only in the controller.

pub mod controller;
pub mod error;
pub mod funding;
pub mod multi_tracker;
pub mod pnl;
pub mod position_tracker;

pub use controller::{PositionController, PositionFilter, PositionKey};
pub use error::TrackerError;
pub use funding::{FundingRate, FundingRates};
pub use multi_tracker::{MultiPositionTracker, MultiPositionTrackerSetup};
pub use pnl::{
    ExchangePnlRequest, OrderPnlRequest, PnlRequest, PnlResult, PnlSource, PnlStrategy,
    TimePnlRequest,
};
pub use position_tracker::{Position, PositionStatus, PositionTracker, PositionTrackerSetup};
