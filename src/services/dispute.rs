//! Dispute resolver.
//!
//! The only path that moves funds out of a disputed order. Resolution
//! claims the dispute row first, so a second resolve attempt fails with
//! AlreadyResolved regardless of how the first one settled the funds.

use diesel::prelude::*;
use tracing::{info, warn};

use crate::config::TimeoutConfig;
use crate::error::{TradeError, TradeResult};
use crate::models::dispute::{Dispute, DisputeResolution, NewDispute};
use crate::models::escrow_hold::EscrowHold;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::User;
use crate::services::ledger;

/// A buyer or seller escalates a payment_sent order to arbitration.
pub fn open_dispute(
    conn: &mut SqliteConnection,
    order_id: &str,
    raised_by: &str,
    reason: &str,
) -> TradeResult<(Order, Dispute)> {
    if reason.trim().is_empty() {
        return Err(TradeError::Validation(
            "a dispute reason is required".to_string(),
        ));
    }

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if !order.is_participant(raised_by) {
        return Err(TradeError::Forbidden(
            "only the buyer or seller can open a dispute".to_string(),
        ));
    }
    if order.status() != Some(OrderStatus::PaymentSent) {
        return Err(TradeError::InvalidState(format!(
            "disputes can only be opened from payment_sent, order is {}",
            order.status
        )));
    }

    if !Order::try_mark_disputed(conn, order_id)? {
        return Err(TradeError::InvalidState(
            "order left payment_sent concurrently".to_string(),
        ));
    }

    let dispute = Dispute::create(conn, NewDispute::new(order_id, Some(raised_by), reason))?;

    info!(
        order_id = %order_id,
        dispute_id = %dispute.id,
        raised_by = %raised_by,
        "dispute opened"
    );

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok((order, dispute))
}

/// Execute the arbiter's decision and settle the escrow exactly once.
pub fn resolve_dispute(
    conn: &mut SqliteConnection,
    config: &TimeoutConfig,
    dispute_id: &str,
    arbiter_id: &str,
    resolution: DisputeResolution,
    split_buyer_bps: Option<i32>,
) -> TradeResult<(Order, Dispute)> {
    if !User::is_arbiter(conn, arbiter_id)? {
        return Err(TradeError::Forbidden(
            "only arbiters can resolve disputes".to_string(),
        ));
    }

    let dispute =
        Dispute::find_by_id(conn, dispute_id)?.ok_or(TradeError::NotFound("dispute"))?;
    if dispute.is_resolved() {
        return Err(TradeError::AlreadyResolved);
    }

    let order =
        Order::find_by_id(conn, &dispute.order_id)?.ok_or(TradeError::NotFound("order"))?;
    if order.status() != Some(OrderStatus::Disputed) {
        warn!(
            order_id = %order.id,
            status = %order.status,
            "dispute resolution attempted on non-disputed order"
        );
        return Err(TradeError::InvalidState(format!(
            "order is {} rather than disputed",
            order.status
        )));
    }

    let split_bps = match resolution {
        DisputeResolution::Split => {
            let bps = split_buyer_bps.unwrap_or(config.default_split_buyer_bps);
            if !(0..=10_000).contains(&bps) {
                return Err(TradeError::Validation(format!(
                    "split_buyer_bps must be within 0..=10000, got {bps}"
                )));
            }
            Some(bps)
        }
        _ => None,
    };

    // Claim the dispute before touching funds; a concurrent resolver
    // loses here and reports AlreadyResolved.
    if !Dispute::try_resolve(conn, dispute_id, resolution, split_bps, arbiter_id)? {
        return Err(TradeError::AlreadyResolved);
    }

    let hold = EscrowHold::find_active_by_order(conn, &order.id)?
        .ok_or_else(|| anyhow::anyhow!("disputed order {} has no active escrow hold", order.id))?;

    let final_status = match resolution {
        DisputeResolution::ReleaseToBuyer => {
            ledger::release_funds(conn, &hold.id, &order.buyer_id)?;
            OrderStatus::Completed
        }
        DisputeResolution::RefundToSeller => {
            ledger::release_funds(conn, &hold.id, &order.seller_id)?;
            OrderStatus::Refunded
        }
        DisputeResolution::Split => {
            let bps = split_bps
                .ok_or_else(|| anyhow::anyhow!("split resolution recorded without a ratio"))?;
            let buyer_amount =
                ((hold.amount as i128 * bps as i128) / 10_000) as i64;
            ledger::release_split(conn, &hold.id, &order.buyer_id, buyer_amount, &order.seller_id)?;
            OrderStatus::Completed
        }
    };

    if !Order::try_transition(conn, &order.id, OrderStatus::Disputed, final_status)? {
        return Err(TradeError::InvalidState(
            "order left disputed concurrently".to_string(),
        ));
    }

    info!(
        dispute_id = %dispute_id,
        order_id = %order.id,
        resolution = resolution.as_str(),
        arbiter_id = %arbiter_id,
        "dispute resolved"
    );

    let order = Order::find_by_id(conn, &order.id)?.ok_or(TradeError::NotFound("order"))?;
    let dispute =
        Dispute::find_by_id(conn, dispute_id)?.ok_or(TradeError::NotFound("dispute"))?;
    Ok((order, dispute))
}
