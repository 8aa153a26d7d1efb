//! Dispute tests: opening guards, arbiter resolutions, split math and
//! exactly-once settlement.

use p2p_escrow::error::TradeError;
use p2p_escrow::models::dispute::{Dispute, DisputeResolution};
use p2p_escrow::models::escrow_hold::EscrowHold;
use p2p_escrow::models::order::{Order, OrderStatus};
use p2p_escrow::services::{dispute, order_engine};

use crate::fixtures::*;

/// Drive a fresh order to payment_sent and open a dispute from it.
fn disputed_order(
    conn: &mut diesel::SqliteConnection,
    world: &TradeWorld,
) -> (Order, Dispute) {
    let config = test_config();
    let order = place_order(conn, world, COIN / 10);
    tx(conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();
    tx(conn, |conn| {
        dispute::open_dispute(conn, &order.id, &world.buyer_id, "seller unreachable")
    })
    .unwrap()
}

#[test]
fn test_open_dispute_guards() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    seed_user(&mut conn, "stranger", true);

    let order = place_order(&mut conn, &world, COIN / 10);

    // Not from pending_payment.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::open_dispute(
            conn, &order.id, &world.buyer_id, "too slow"
        )),
        Err(TradeError::InvalidState(_))
    ));

    let config = test_config();
    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();

    // Not by outsiders.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::open_dispute(
            conn, &order.id, "stranger", "I disagree"
        )),
        Err(TradeError::Forbidden(_))
    ));

    // Empty reason rejected.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::open_dispute(conn, &order.id, &world.buyer_id, "  ")),
        Err(TradeError::Validation(_))
    ));

    let (order, dispute_rec) = tx(&mut conn, |conn| {
        dispute::open_dispute(conn, &order.id, &world.seller_id, "payment not visible")
    })
    .unwrap();
    assert_eq!(order.status, OrderStatus::Disputed.as_str());
    assert!(order.dispute_opened_at.is_some());
    assert_eq!(dispute_rec.raised_by.as_deref(), Some(world.seller_id.as_str()));

    // A second dispute on the same order cannot be opened.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::open_dispute(
            conn, &order.id, &world.buyer_id, "me too"
        )),
        Err(TradeError::InvalidState(_))
    ));
}

/// Scenario: seller never confirms, auto-escalation, arbiter releases
/// to buyer; a second resolution fails with AlreadyResolved.
#[test]
fn test_auto_escalation_then_release_to_buyer() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();

    let order = place_order(&mut conn, &world, COIN / 10);
    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();

    // Confirmation window lapses: Disputed, not Expired.
    let (order, dispute_rec) = tx(&mut conn, |conn| {
        order_engine::escalate_confirmation_timeout(conn, &order.id)
    })
    .unwrap()
    .expect("should escalate");
    assert_eq!(order.status, OrderStatus::Disputed.as_str());
    assert!(dispute_rec.raised_by.is_none());

    let (order, dispute_rec) = tx(&mut conn, |conn| {
        dispute::resolve_dispute(
            conn,
            &config,
            &dispute_rec.id,
            &world.arbiter_id,
            DisputeResolution::ReleaseToBuyer,
            None,
        )
    })
    .unwrap();
    assert_eq!(order.status, OrderStatus::Completed.as_str());
    assert_eq!(dispute_rec.resolution.as_deref(), Some("release_to_buyer"));
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), COIN / 10);

    // Exactly once.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::resolve_dispute(
            conn,
            &config,
            &dispute_rec.id,
            &world.arbiter_id,
            DisputeResolution::RefundToSeller,
            None,
        )),
        Err(TradeError::AlreadyResolved)
    ));
    // And the funds did not move twice.
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), COIN / 10);
    assert_eq!(available(&mut conn, &world.seller_id, BTC), 0);
}

#[test]
fn test_refund_to_seller() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let (order, dispute_rec) = disputed_order(&mut conn, &world);

    let (order, _) = tx(&mut conn, |conn| {
        dispute::resolve_dispute(
            conn,
            &config,
            &dispute_rec.id,
            &world.arbiter_id,
            DisputeResolution::RefundToSeller,
            None,
        )
    })
    .unwrap();

    assert_eq!(order.status, OrderStatus::Refunded.as_str());
    assert_eq!(available(&mut conn, &world.seller_id, BTC), COIN / 10);
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), 0);
    assert!(EscrowHold::find_active_by_order(&mut conn, &order.id)
        .unwrap()
        .is_none());
}

#[test]
fn test_split_resolution() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let (_order, dispute_rec) = disputed_order(&mut conn, &world);

    // 70/30 in the buyer's favour.
    let (order, dispute_rec) = tx(&mut conn, |conn| {
        dispute::resolve_dispute(
            conn,
            &config,
            &dispute_rec.id,
            &world.arbiter_id,
            DisputeResolution::Split,
            Some(7000),
        )
    })
    .unwrap();

    assert_eq!(order.status, OrderStatus::Completed.as_str());
    assert_eq!(dispute_rec.split_buyer_bps, Some(7000));
    let amount = COIN / 10;
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), amount * 7 / 10);
    assert_eq!(available(&mut conn, &world.seller_id, BTC), amount * 3 / 10);
}

#[test]
fn test_split_defaults_to_config_ratio() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let (_order, dispute_rec) = disputed_order(&mut conn, &world);

    let (_, dispute_rec) = tx(&mut conn, |conn| {
        dispute::resolve_dispute(
            conn,
            &config,
            &dispute_rec.id,
            &world.arbiter_id,
            DisputeResolution::Split,
            None,
        )
    })
    .unwrap();

    assert_eq!(dispute_rec.split_buyer_bps, Some(5000));
    let amount = COIN / 10;
    assert_eq!(available(&mut conn, &world.buyer_id, BTC), amount / 2);
    assert_eq!(available(&mut conn, &world.seller_id, BTC), amount / 2);
}

#[test]
fn test_resolution_guards() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let (_order, dispute_rec) = disputed_order(&mut conn, &world);

    // Participants cannot arbitrate their own trade.
    for caller in [&world.buyer_id, &world.seller_id] {
        assert!(matches!(
            tx(&mut conn, |conn| dispute::resolve_dispute(
                conn,
                &config,
                &dispute_rec.id,
                caller,
                DisputeResolution::ReleaseToBuyer,
                None,
            )),
            Err(TradeError::Forbidden(_))
        ));
    }

    // Ratio out of range.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::resolve_dispute(
            conn,
            &config,
            &dispute_rec.id,
            &world.arbiter_id,
            DisputeResolution::Split,
            Some(10_001),
        )),
        Err(TradeError::Validation(_))
    ));

    // Unknown dispute id.
    assert!(matches!(
        tx(&mut conn, |conn| dispute::resolve_dispute(
            conn,
            &config,
            "missing",
            &world.arbiter_id,
            DisputeResolution::ReleaseToBuyer,
            None,
        )),
        Err(TradeError::NotFound(_))
    ));
}
