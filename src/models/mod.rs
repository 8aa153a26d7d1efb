//! Database models, one module per table.
//!
//! Model functions take `&mut SqliteConnection` so callers can compose
//! them inside a single transaction; services own transaction scope.

pub mod balance;
pub mod deadline;
pub mod dispute;
pub mod escrow_hold;
pub mod notification;
pub mod offer;
pub mod order;
pub mod payment_method;
pub mod trade_message;
pub mod user;

/// Atomic units per whole asset unit (1.0 BTC == 100_000_000 units).
pub const ATOMIC_UNITS_PER_ASSET: i64 = 100_000_000;
