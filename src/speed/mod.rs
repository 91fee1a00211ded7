mod calculator;
mod store;
mod types;

pub use calculator::SpeedCalculator;
pub use store::PositionStore;
pub use types::{GeoFix, SpeedReading};
