//! Domain types for the futures position ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeNs, Side, Direction, Asset, Pair
//! - The Fill record consumed by the engine
//! - Stable fill ordering for deterministic replay

pub mod decimal;
pub mod fill;
pub mod ordering;
pub mod primitives;

pub use decimal::Decimal;
pub use fill::Fill;
pub use ordering::{sort_fills_deterministic, FillOrderingKey};
pub use primitives::{Asset, Direction, Pair, PrimitiveParseError, Side, TimeNs};
