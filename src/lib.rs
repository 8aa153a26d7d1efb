//! Peer-to-peer escrow trading engine.
//!
//! Lets one user sell an asset directly to another for fiat, with the
//! platform holding the asset in escrow for the duration of the trade:
//! offer book, price-locked orders, timed payment/confirmation windows,
//! dispute arbitration and a per-order evidence channel.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod schema;
pub mod services;
pub mod validation;
