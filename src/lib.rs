pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod replay;

pub use config::Config;
pub use domain::{Asset, Decimal, Direction, Fill, Pair, Side, TimeNs};
pub use engine::{PositionController, PositionKey, TrackerError};
pub use error::AppError;
