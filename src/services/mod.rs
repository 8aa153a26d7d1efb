//! Business logic services.
//!
//! Service functions take `&mut SqliteConnection` and run inside the
//! caller-owned transaction; the HTTP handlers and the deadline monitor
//! wrap them in `immediate_transaction` + `spawn_blocking`.

pub mod chat;
pub mod deadline_monitor;
pub mod dispute;
pub mod ledger;
pub mod notifier;
pub mod offer_book;
pub mod order_engine;
