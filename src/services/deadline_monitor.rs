//! Deadline monitoring service for time-boxed order windows.
//!
//! Runs in the background and periodically claims due deadlines from
//! the durable `deadlines` table. Because deadlines are rows, a crash
//! loses nothing: the first poll after restart picks up everything
//! that came due in the meantime. Each firing re-checks the order's
//! current status inside the claiming transaction, so a deadline whose
//! order already moved on is a logged no-op.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::TimeoutConfig;
use crate::db::DbPool;
use crate::error::TradeError;
use crate::models::deadline::{Deadline, DeadlineKind};
use crate::models::notification::EventKind;
use crate::models::order::{Order, OrderStatus};
use crate::services::notifier::Notifier;
use crate::services::order_engine;

/// What a claimed deadline actually did.
enum FiringOutcome {
    /// Order already left the state the deadline applied to.
    Stale,
    Expired(Order),
    Escalated(Order),
}

pub struct DeadlineMonitor {
    db: DbPool,
    notifier: Arc<Notifier>,
    config: TimeoutConfig,
}

impl DeadlineMonitor {
    pub fn new(db: DbPool, notifier: Arc<Notifier>, config: TimeoutConfig) -> Self {
        info!(
            "DeadlineMonitor initialized with poll_interval={}s",
            config.poll_interval_secs
        );
        Self {
            db,
            notifier,
            config,
        }
    }

    /// Start monitoring in background (call via tokio::spawn). The
    /// first tick fires immediately, which doubles as the restart
    /// recovery pass over past-due deadlines.
    pub async fn start_monitoring(self: Arc<Self>) {
        let mut poll_timer = interval(self.config.poll_interval());

        info!("Starting deadline monitoring loop");

        loop {
            poll_timer.tick().await;

            if let Err(e) = self.fire_due_deadlines().await {
                error!("Error firing due deadlines: {e:#}");
            }

            if let Err(e) = self.warn_expiring_payment_windows().await {
                error!("Error sending expiry warnings: {e:#}");
            }
        }
    }

    /// Claim and process every deadline that is due.
    async fn fire_due_deadlines(&self) -> Result<()> {
        let mut conn = self.db.get().context("Failed to get DB connection")?;

        let due = tokio::task::spawn_blocking(move || {
            Deadline::find_due(&mut conn, chrono::Utc::now().naive_utc())
        })
        .await
        .context("Task join error")??;

        if due.is_empty() {
            return Ok(());
        }

        info!("Found {} due deadlines", due.len());

        for deadline in due {
            if let Err(e) = self.process_deadline(deadline).await {
                // One bad row must not stall the rest of the queue.
                error!("Error processing deadline: {e:#}");
            }
        }

        Ok(())
    }

    /// Fire one deadline: claim the row and apply the transition in a
    /// single transaction, then notify outside of it.
    async fn process_deadline(&self, deadline: Deadline) -> Result<()> {
        let Some(kind) = deadline.kind() else {
            warn!(
                deadline_id = %deadline.id,
                kind = %deadline.kind,
                "skipping deadline with unknown kind"
            );
            return Ok(());
        };

        let mut conn = self.db.get().context("Failed to get DB connection")?;
        let deadline_id = deadline.id.clone();
        let order_id = deadline.order_id.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            conn.immediate_transaction::<_, TradeError, _>(|conn| {
                if !Deadline::try_claim(conn, &deadline_id)? {
                    // Another monitor instance claimed it first.
                    return Ok(FiringOutcome::Stale);
                }
                match kind {
                    DeadlineKind::PaymentWindow => {
                        match order_engine::expire_payment_window(conn, &order_id)? {
                            Some(order) => Ok(FiringOutcome::Expired(order)),
                            None => Ok(FiringOutcome::Stale),
                        }
                    }
                    DeadlineKind::SellerConfirmation => {
                        match order_engine::escalate_confirmation_timeout(conn, &order_id)? {
                            Some((order, _dispute)) => Ok(FiringOutcome::Escalated(order)),
                            None => Ok(FiringOutcome::Stale),
                        }
                    }
                }
            })
        })
        .await
        .context("Task join error")??;

        match outcome {
            FiringOutcome::Stale => {
                info!(
                    order_id = %deadline.order_id,
                    kind = %deadline.kind,
                    "deadline fired after order moved on, discarded"
                );
            }
            FiringOutcome::Expired(order) => {
                self.notifier.notify_parties(
                    &order.buyer_id,
                    &order.seller_id,
                    EventKind::OrderExpired,
                    "Order expired",
                    "The payment window lapsed without payment; the order was unwound.",
                    Some(serde_json::json!({ "order_id": order.id })),
                );
            }
            FiringOutcome::Escalated(order) => {
                self.notifier.notify_parties(
                    &order.buyer_id,
                    &order.seller_id,
                    EventKind::DisputeOpened,
                    "Dispute opened",
                    "The seller did not confirm receipt in time; the trade went to arbitration.",
                    Some(serde_json::json!({ "order_id": order.id })),
                );
            }
        }

        Ok(())
    }

    /// Warn buyers whose payment window is about to close.
    async fn warn_expiring_payment_windows(&self) -> Result<()> {
        let threshold = self.config.warning_threshold_secs;
        let mut conn = self.db.get().context("Failed to get DB connection")?;

        let expiring = tokio::task::spawn_blocking(move || {
            Deadline::find_expiring_soon(&mut conn, chrono::Utc::now().naive_utc(), threshold)
        })
        .await
        .context("Task join error")??;

        for deadline in expiring {
            let mut conn = self.db.get().context("Failed to get DB connection")?;
            let order_id = deadline.order_id.clone();
            let order = tokio::task::spawn_blocking(move || Order::find_by_id(&mut conn, &order_id))
                .await
                .context("Task join error")??;

            let Some(order) = order else { continue };
            if order.status() != Some(OrderStatus::PendingPayment) {
                continue;
            }

            let remaining = (deadline.fires_at - chrono::Utc::now().naive_utc()).num_seconds();
            self.notifier.notify(
                &order.buyer_id,
                EventKind::PaymentWindowExpiring,
                "Payment window closing",
                &format!("Mark your payment within the next {remaining} seconds or the order expires."),
                Some(serde_json::json!({
                    "order_id": order.id,
                    "expires_in_secs": remaining,
                })),
            );
        }

        Ok(())
    }
}
