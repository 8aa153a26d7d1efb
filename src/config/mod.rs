//! Configuration modules for the trading engine

pub mod timeout;

pub use timeout::TimeoutConfig;
