pub mod config;
pub mod types;

pub use config::ShipgateConfig;
pub use types::*;
