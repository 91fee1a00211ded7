pub mod engine;
pub mod error;
pub mod fixes;
pub mod speed;
