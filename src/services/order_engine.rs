//! Order lifecycle engine.
//!
//! Sole writer of order status. Every transition is a compare-and-set
//! on the expected current status, executed in the same transaction as
//! the escrow movement it implies, so a user call and a deadline firing
//! racing on the same order resolve to exactly one winner.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::config::TimeoutConfig;
use crate::error::{TradeError, TradeResult};
use crate::models::deadline::{Deadline, DeadlineKind};
use crate::models::dispute::{Dispute, NewDispute};
use crate::models::escrow_hold::{EscrowHold, HoldReason, NewEscrowHold};
use crate::models::offer::{Offer, OfferSide};
use crate::models::order::{NewOrder, Order, OrderStatus};
use crate::models::user::User;
use crate::services::{ledger, offer_book};

/// Reason recorded on auto-escalated disputes.
const CONFIRMATION_TIMEOUT_REASON: &str =
    "seller did not confirm fiat receipt within the confirmation window";

/// Accept an offer: price-lock, reserve inventory, escrow the seller's
/// asset and open the payment window - all or nothing.
pub fn create_order(
    conn: &mut SqliteConnection,
    offer_id: &str,
    counterparty_id: &str,
    quantity: i64,
    payment_method_id: &str,
) -> TradeResult<Order> {
    let offer = Offer::find_by_id(conn, offer_id)?.ok_or(TradeError::NotFound("offer"))?;

    if !offer.is_active {
        return Err(TradeError::OfferUnavailable);
    }
    if offer.owner_id == counterparty_id {
        return Err(TradeError::Forbidden(
            "cannot take your own offer".to_string(),
        ));
    }
    if !User::is_verified(conn, counterparty_id)? {
        return Err(TradeError::Forbidden(
            "identity verification required to trade".to_string(),
        ));
    }
    if quantity < offer.min_order_quantity || quantity > offer.max_order_quantity {
        return Err(TradeError::Validation(format!(
            "quantity {quantity} outside offer bounds [{}, {}]",
            offer.min_order_quantity, offer.max_order_quantity
        )));
    }
    if !offer.accepts_method(payment_method_id) {
        return Err(TradeError::Validation(format!(
            "payment method {payment_method_id} is not accepted by this offer"
        )));
    }

    let side = offer
        .side()
        .ok_or_else(|| anyhow::anyhow!("offer {} has malformed side {:?}", offer.id, offer.side))?;

    // Price lock: fiat amount is fixed now and never re-evaluated.
    let fiat_amount = offer
        .fiat_cost(quantity)
        .ok_or_else(|| TradeError::Validation("order value overflows fiat range".to_string()))?;
    if fiat_amount <= 0 {
        return Err(TradeError::Validation(
            "order value rounds to zero in fiat".to_string(),
        ));
    }

    offer_book::reserve_for_order(conn, offer_id, quantity)?;

    let (buyer_id, seller_id) = match side {
        OfferSide::Sell => (counterparty_id.to_string(), offer.owner_id.clone()),
        OfferSide::Buy => (offer.owner_id.clone(), counterparty_id.to_string()),
    };

    let order_id = Uuid::new_v4().to_string();

    // Order escrow: carve out of the SELL offer's reserve pool, or
    // lock the counterparty-seller's free balance for BUY offers.
    match side {
        OfferSide::Sell => {
            let pool_id = offer.escrow_hold_id.as_deref().ok_or_else(|| {
                anyhow::anyhow!("sell offer {} has no reserve hold", offer.id)
            })?;
            if !EscrowHold::try_decrease(conn, pool_id, quantity)? {
                return Err(anyhow::anyhow!(
                    "reserve pool of offer {} cannot cover reserved quantity",
                    offer.id
                )
                .into());
            }
            EscrowHold::create(
                conn,
                NewEscrowHold::new(
                    &seller_id,
                    &offer.asset,
                    quantity,
                    HoldReason::OrderEscrow,
                    Some(&offer.id),
                    Some(&order_id),
                ),
            )?;
        }
        OfferSide::Buy => {
            ledger::lock_funds(
                conn,
                &seller_id,
                &offer.asset,
                quantity,
                HoldReason::OrderEscrow,
                Some(&offer.id),
                Some(&order_id),
            )?;
        }
    }

    let now = Utc::now().naive_utc();
    let expires_at = now + chrono::Duration::seconds(offer.payment_time_limit_secs);

    let order = Order::create(
        conn,
        NewOrder {
            id: order_id,
            offer_id: offer.id.clone(),
            buyer_id,
            seller_id,
            asset: offer.asset.clone(),
            crypto_amount: quantity,
            fiat_amount,
            fiat_currency: offer.fiat_currency.clone(),
            payment_method_id: payment_method_id.to_string(),
            status: OrderStatus::PendingPayment.as_str().to_string(),
            created_at: now,
            updated_at: now,
            payment_window_expires_at: expires_at,
        },
    )?;

    Deadline::schedule(conn, &order.id, DeadlineKind::PaymentWindow, expires_at)?;

    info!(
        order_id = %order.id,
        offer_id = %offer.id,
        buyer_id = %order.buyer_id,
        seller_id = %order.seller_id,
        crypto_amount = order.crypto_amount,
        fiat_amount = order.fiat_amount,
        "order created, payment window open"
    );
    Ok(order)
}

/// Buyer declares the fiat payment sent.
pub fn mark_payment_sent(
    conn: &mut SqliteConnection,
    config: &TimeoutConfig,
    order_id: &str,
    caller_id: &str,
) -> TradeResult<Order> {
    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if order.buyer_id != caller_id {
        return Err(TradeError::Forbidden(
            "only the buyer can mark payment sent".to_string(),
        ));
    }
    if order.status() != Some(OrderStatus::PendingPayment) {
        return Err(TradeError::InvalidState(format!(
            "cannot mark payment from status {}",
            order.status
        )));
    }
    let now = Utc::now().naive_utc();
    if now >= order.payment_window_expires_at {
        return Err(TradeError::InvalidState(
            "payment window has expired".to_string(),
        ));
    }

    if !Order::try_mark_payment_sent(conn, order_id)? {
        // Lost the race against expiry or cancellation.
        return Err(TradeError::InvalidState(
            "order left pending_payment concurrently".to_string(),
        ));
    }

    let confirm_by = now + chrono::Duration::seconds(config.confirmation_window_secs);
    Deadline::schedule(conn, order_id, DeadlineKind::SellerConfirmation, confirm_by)?;

    info!(order_id = %order_id, "buyer marked payment sent");

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok(order)
}

/// Seller confirms fiat receipt; the escrowed asset moves to the buyer.
/// The single point where funds change beneficial ownership.
pub fn confirm_receipt_and_release(
    conn: &mut SqliteConnection,
    order_id: &str,
    caller_id: &str,
) -> TradeResult<Order> {
    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if order.seller_id != caller_id {
        return Err(TradeError::Forbidden(
            "only the seller can confirm receipt".to_string(),
        ));
    }
    if order.status() != Some(OrderStatus::PaymentSent) {
        return Err(TradeError::InvalidState(format!(
            "cannot confirm receipt from status {}",
            order.status
        )));
    }

    if !Order::try_transition(conn, order_id, OrderStatus::PaymentSent, OrderStatus::Completed)? {
        return Err(TradeError::InvalidState(
            "order left payment_sent concurrently".to_string(),
        ));
    }

    let hold = EscrowHold::find_active_by_order(conn, order_id)?
        .ok_or_else(|| anyhow::anyhow!("order {order_id} has no active escrow hold"))?;
    ledger::release_funds(conn, &hold.id, &order.buyer_id)?;

    info!(
        order_id = %order_id,
        buyer_id = %order.buyer_id,
        amount = order.crypto_amount,
        "receipt confirmed, escrow released to buyer"
    );

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok(order)
}

/// Either party backs out before payment is marked.
pub fn cancel_order(
    conn: &mut SqliteConnection,
    order_id: &str,
    caller_id: &str,
) -> TradeResult<Order> {
    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if !order.is_participant(caller_id) {
        return Err(TradeError::Forbidden(
            "only the buyer or seller can cancel".to_string(),
        ));
    }
    if order.status() != Some(OrderStatus::PendingPayment) {
        return Err(TradeError::InvalidState(format!(
            "cannot cancel from status {}",
            order.status
        )));
    }

    if !Order::try_transition(conn, order_id, OrderStatus::PendingPayment, OrderStatus::Cancelled)?
    {
        return Err(TradeError::InvalidState(
            "order left pending_payment concurrently".to_string(),
        ));
    }

    unwind_order_escrow(conn, &order)?;

    info!(order_id = %order_id, caller_id = %caller_id, "order cancelled before payment");

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok(order)
}

/// Payment window lapsed without the buyer marking paid. Driven only by
/// the deadline monitor. Returns None when the order already moved on
/// (idempotent no-op).
pub fn expire_payment_window(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> TradeResult<Option<Order>> {
    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if order.status() != Some(OrderStatus::PendingPayment) {
        return Ok(None);
    }
    if Utc::now().naive_utc() < order.payment_window_expires_at {
        return Ok(None);
    }

    if !Order::try_transition(conn, order_id, OrderStatus::PendingPayment, OrderStatus::Expired)? {
        return Ok(None);
    }

    unwind_order_escrow(conn, &order)?;

    info!(order_id = %order_id, "payment window expired, order unwound");

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok(Some(order))
}

/// Seller sat on a payment_sent order past the confirmation window.
/// The buyer already claims to have paid, so funds must not silently
/// return to the seller - escalate to dispute instead. Returns None
/// when the order already moved on.
pub fn escalate_confirmation_timeout(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> TradeResult<Option<(Order, Dispute)>> {
    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if order.status() != Some(OrderStatus::PaymentSent) {
        return Ok(None);
    }

    if !Order::try_mark_disputed(conn, order_id)? {
        return Ok(None);
    }

    let dispute = Dispute::create(
        conn,
        NewDispute::new(order_id, None, CONFIRMATION_TIMEOUT_REASON),
    )?;

    info!(
        order_id = %order_id,
        dispute_id = %dispute.id,
        "confirmation window lapsed, auto-escalated to dispute"
    );

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok(Some((order, dispute)))
}

/// Set-once structured rating on a completed order.
pub fn leave_review(
    conn: &mut SqliteConnection,
    order_id: &str,
    caller_id: &str,
    rating: i32,
    comment: Option<&str>,
) -> TradeResult<Order> {
    if !(1..=5).contains(&rating) {
        return Err(TradeError::Validation(format!(
            "rating must be between 1 and 5, got {rating}"
        )));
    }

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if !order.is_participant(caller_id) {
        return Err(TradeError::Forbidden(
            "only trade participants can leave a review".to_string(),
        ));
    }
    if order.status() != Some(OrderStatus::Completed) {
        return Err(TradeError::InvalidState(
            "reviews are only accepted on completed orders".to_string(),
        ));
    }
    if order.review_rating.is_some() {
        return Err(TradeError::InvalidState(
            "review already recorded".to_string(),
        ));
    }

    if !Order::try_set_review(conn, order_id, caller_id, rating, comment)? {
        return Err(TradeError::InvalidState(
            "review already recorded".to_string(),
        ));
    }

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;
    Ok(order)
}

/// Shared release path for cancellation and expiry: the order hold
/// folds back into the offer's reserve pool while the offer lives, or
/// settles to the seller's free balance once the offer is gone.
fn unwind_order_escrow(conn: &mut SqliteConnection, order: &Order) -> TradeResult<()> {
    let hold = EscrowHold::find_active_by_order(conn, &order.id)?
        .ok_or_else(|| anyhow::anyhow!("order {} has no active escrow hold", order.id))?;

    let offer =
        Offer::find_by_id(conn, &order.offer_id)?.ok_or(TradeError::NotFound("offer"))?;

    let restored =
        offer_book::release_reservation(conn, &order.offer_id, order.crypto_amount)?;

    let pool_id = offer.escrow_hold_id.as_deref();
    if restored && offer.side() == Some(OfferSide::Sell) {
        let pool_id =
            pool_id.ok_or_else(|| anyhow::anyhow!("sell offer {} has no reserve hold", offer.id))?;
        if !EscrowHold::try_increase(conn, pool_id, hold.amount)? {
            return Err(anyhow::anyhow!(
                "reserve hold of offer {} is no longer open",
                offer.id
            )
            .into());
        }
        if !EscrowHold::try_mark_returned(conn, &hold.id)? {
            return Err(TradeError::InvalidState(
                "escrow hold already released".to_string(),
            ));
        }
    } else {
        ledger::release_funds(conn, &hold.id, &order.seller_id)?;
    }

    Ok(())
}
