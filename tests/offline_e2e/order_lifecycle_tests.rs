//! Order lifecycle tests: the happy path, expiry unwinding, permission
//! and state guards, price locking and reviews.

use p2p_escrow::error::TradeError;
use p2p_escrow::models::deadline::{Deadline, DeadlineKind};
use p2p_escrow::models::escrow_hold::EscrowHold;
use p2p_escrow::models::offer::{Offer, OfferSide};
use p2p_escrow::models::order::OrderStatus;
use p2p_escrow::services::offer_book::{self, OfferSpec};
use p2p_escrow::services::order_engine;

use crate::fixtures::*;

/// Scenario: SELL offer for 1.0 BTC at $68,500, buyer orders 0.1 BTC,
/// pays inside the window, seller confirms.
#[test]
fn test_happy_path_sell_offer() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();

    let order = place_order(&mut conn, &world, COIN / 10);

    assert_eq!(order.status, OrderStatus::PendingPayment.as_str());
    assert_eq!(order.crypto_amount, COIN / 10);
    // 0.1 BTC at $68,500.00 => $6,850.00
    assert_eq!(order.fiat_amount, 685_000);
    assert_eq!(order.buyer_id, world.buyer_id);
    assert_eq!(order.seller_id, world.seller_id);

    let offer = Offer::find_by_id(&mut conn, &world.offer.id).unwrap().unwrap();
    assert_eq!(offer.available_quantity, COIN - COIN / 10);

    // Order-specific hold exists alongside the shrunken reserve pool.
    let hold = EscrowHold::find_active_by_order(&mut conn, &order.id)
        .unwrap()
        .expect("order escrow hold");
    assert_eq!(hold.amount, COIN / 10);
    assert_eq!(
        EscrowHold::total_held(&mut conn, &world.seller_id, BTC).unwrap(),
        COIN
    );

    // Payment window deadline persisted.
    let due_later = Deadline::find_due(&mut conn, order.payment_window_expires_at).unwrap();
    assert_eq!(due_later.len(), 1);
    assert_eq!(due_later[0].kind, DeadlineKind::PaymentWindow.as_str());

    let order = tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentSent.as_str());
    assert!(order.payment_sent_at.is_some());

    let order = tx(&mut conn, |conn| {
        order_engine::confirm_receipt_and_release(conn, &order.id, &world.seller_id)
    })
    .unwrap();
    assert_eq!(order.status, OrderStatus::Completed.as_str());

    // Funds changed beneficial ownership exactly once.
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), COIN / 10);
    assert_eq!(
        EscrowHold::total_held(&mut conn, &world.seller_id, BTC).unwrap(),
        COIN - COIN / 10
    );
    let hold = EscrowHold::find_by_id(&mut conn, &hold.id).unwrap().unwrap();
    assert!(hold.released_at.is_some());
    assert_eq!(hold.released_to.as_deref(), Some(world.buyer_id.as_str()));
}

/// Scenario: buyer never pays; the window lapses and the order unwinds.
#[test]
fn test_payment_window_expiry_restores_offer() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);

    let order = place_order(&mut conn, &world, COIN / 10);
    backdate_payment_window(&mut conn, &order.id);

    let expired = tx(&mut conn, |conn| {
        order_engine::expire_payment_window(conn, &order.id)
    })
    .unwrap()
    .expect("order should expire");

    assert_eq!(expired.status, OrderStatus::Expired.as_str());

    // Availability and reserve pool are whole again; nothing reached
    // anyone's spendable balance.
    let offer = Offer::find_by_id(&mut conn, &world.offer.id).unwrap().unwrap();
    assert_eq!(offer.available_quantity, COIN);
    assert_eq!(
        EscrowHold::total_held(&mut conn, &world.seller_id, BTC).unwrap(),
        COIN
    );
    assert_eq!(available(&mut conn, &world.seller_id, BTC), 0);
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), 0);
    assert!(EscrowHold::find_active_by_order(&mut conn, &order.id)
        .unwrap()
        .is_none());
}

#[test]
fn test_expiry_is_idempotent_noop_after_payment() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();

    let order = place_order(&mut conn, &world, COIN / 10);
    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();

    backdate_payment_window(&mut conn, &order.id);

    // The deadline fires late, finds payment_sent, and discards.
    let outcome = tx(&mut conn, |conn| {
        order_engine::expire_payment_window(conn, &order.id)
    })
    .unwrap();
    assert!(outcome.is_none());

    let order = p2p_escrow::models::order::Order::find_by_id(&mut conn, &order.id)
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentSent.as_str());
}

#[test]
fn test_cancel_before_payment() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);

    let order = place_order(&mut conn, &world, COIN / 10);

    // Seller can cancel too, not just the buyer.
    let cancelled = tx(&mut conn, |conn| {
        order_engine::cancel_order(conn, &order.id, &world.seller_id)
    })
    .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled.as_str());

    let offer = Offer::find_by_id(&mut conn, &world.offer.id).unwrap().unwrap();
    assert_eq!(offer.available_quantity, COIN);
}

#[test]
fn test_cancel_rejected_after_payment_sent() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();

    let order = place_order(&mut conn, &world, COIN / 10);
    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();

    // Once payment is claimed the trade can only complete or dispute.
    for caller in [&world.buyer_id, &world.seller_id] {
        assert!(matches!(
            tx(&mut conn, |conn| order_engine::cancel_order(conn, &order.id, caller)),
            Err(TradeError::InvalidState(_))
        ));
    }
}

#[test]
fn test_permission_guards() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    seed_user(&mut conn, "stranger", true);

    let order = place_order(&mut conn, &world, COIN / 10);

    // Only the buyer marks paid.
    for caller in [world.seller_id.as_str(), "stranger"] {
        assert!(matches!(
            tx(&mut conn, |conn| order_engine::mark_payment_sent(
                conn, &config, &order.id, caller
            )),
            Err(TradeError::Forbidden(_))
        ));
    }

    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();

    // Only the seller confirms receipt.
    for caller in [world.buyer_id.as_str(), "stranger"] {
        assert!(matches!(
            tx(&mut conn, |conn| order_engine::confirm_receipt_and_release(
                conn, &order.id, caller
            )),
            Err(TradeError::Forbidden(_))
        ));
    }

    // Strangers cannot cancel either.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::cancel_order(conn, &order.id, "stranger")),
        Err(TradeError::InvalidState(_) | TradeError::Forbidden(_))
    ));
}

#[test]
fn test_mark_paid_after_window_rejected() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();

    let order = place_order(&mut conn, &world, COIN / 10);
    backdate_payment_window(&mut conn, &order.id);

    assert!(matches!(
        tx(&mut conn, |conn| order_engine::mark_payment_sent(
            conn, &config, &order.id, &world.buyer_id
        )),
        Err(TradeError::InvalidState(_))
    ));
}

#[test]
fn test_order_validation() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);

    // Below minimum.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::create_order(
            conn, &world.offer.id, &world.buyer_id, 1, &world.method_id
        )),
        Err(TradeError::Validation(_))
    ));

    // Above maximum.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::create_order(
            conn, &world.offer.id, &world.buyer_id, COIN * 2, &world.method_id
        )),
        Err(TradeError::Validation(_))
    ));

    // Unknown payment method.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::create_order(
            conn, &world.offer.id, &world.buyer_id, COIN / 10, "pm-unknown"
        )),
        Err(TradeError::Validation(_))
    ));

    // Owner taking their own offer.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::create_order(
            conn, &world.offer.id, &world.seller_id, COIN / 10, &world.method_id
        )),
        Err(TradeError::Forbidden(_))
    ));

    // Unverified counterparty.
    seed_user(&mut conn, "unverified", false);
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::create_order(
            conn, &world.offer.id, "unverified", COIN / 10, &world.method_id
        )),
        Err(TradeError::Forbidden(_))
    ));
}

/// BUY offers lock the counterparty-seller's asset at order creation;
/// a shortfall rolls the whole creation back, reservation included.
#[test]
fn test_buy_offer_order_locks_counterparty() {
    let mut conn = setup_conn();
    seed_user(&mut conn, "maker", true);
    seed_user(&mut conn, "taker", true);
    seed_method(&mut conn, "pm-maker", "maker");
    fund(&mut conn, "taker", BTC, COIN / 10);

    let offer = tx(&mut conn, |conn| {
        offer_book::create_offer(
            conn,
            "maker",
            OfferSpec {
                side: OfferSide::Buy,
                asset: BTC.to_string(),
                fiat_currency: USD.to_string(),
                unit_price: PRICE_68500,
                available_quantity: COIN,
                min_order_quantity: COIN / 100,
                max_order_quantity: COIN,
                payment_time_limit_secs: 900,
                payment_method_ids: vec!["pm-maker".to_string()],
                terms: None,
            },
        )
    })
    .unwrap();

    // Too big for the taker's balance: whole creation rolls back.
    let result = tx(&mut conn, |conn| {
        order_engine::create_order(conn, &offer.id, "taker", COIN / 2, "pm-maker")
    });
    assert!(matches!(result, Err(TradeError::InsufficientBalance { .. })));
    let reloaded = Offer::find_by_id(&mut conn, &offer.id).unwrap().unwrap();
    assert_eq!(reloaded.available_quantity, COIN);

    // Within balance: taker is the seller, their asset gets escrowed.
    let order = tx(&mut conn, |conn| {
        order_engine::create_order(conn, &offer.id, "taker", COIN / 10, "pm-maker")
    })
    .unwrap();
    assert_eq!(order.buyer_id, "maker");
    assert_eq!(order.seller_id, "taker");
    assert_eq!(available(&mut conn, "taker", BTC), 0);
    assert_eq!(EscrowHold::total_held(&mut conn, "taker", BTC).unwrap(), COIN / 10);
}

#[test]
fn test_review_set_once_on_completed() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();

    let order = place_order(&mut conn, &world, COIN / 10);

    // Not accepted while the trade is live.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::leave_review(
            conn, &order.id, &world.buyer_id, 5, None
        )),
        Err(TradeError::InvalidState(_))
    ));

    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();
    tx(&mut conn, |conn| {
        order_engine::confirm_receipt_and_release(conn, &order.id, &world.seller_id)
    })
    .unwrap();

    // Rating range enforced.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::leave_review(
            conn, &order.id, &world.buyer_id, 6, None
        )),
        Err(TradeError::Validation(_))
    ));

    let order = tx(&mut conn, |conn| {
        order_engine::leave_review(conn, &order.id, &world.buyer_id, 5, Some("smooth trade"))
    })
    .unwrap();
    assert_eq!(order.review_rating, Some(5));
    assert_eq!(order.reviewed_by.as_deref(), Some(world.buyer_id.as_str()));

    // Second review bounces.
    assert!(matches!(
        tx(&mut conn, |conn| order_engine::leave_review(
            conn, &order.id, &world.seller_id, 1, None
        )),
        Err(TradeError::InvalidState(_))
    ));
}
