//! Trade channel tests: participant gating, arbiter visibility and the
//! evidence retention window.

use p2p_escrow::error::TradeError;
use p2p_escrow::models::trade_message::TradeMessage;
use p2p_escrow::services::{chat, dispute, order_engine};

use crate::fixtures::*;

#[test]
fn test_participants_exchange_messages_in_order() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let order = place_order(&mut conn, &world, COIN / 10);

    tx(&mut conn, |conn| {
        chat::post_message(conn, &config, &order.id, &world.buyer_id, "sending now", None)
    })
    .unwrap();
    tx(&mut conn, |conn| {
        chat::post_message(
            conn,
            &config,
            &order.id,
            &world.seller_id,
            "will confirm once it lands",
            Some("receipt-123"),
        )
    })
    .unwrap();

    let history = chat::get_history(&mut conn, &order.id, &world.buyer_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_id, world.buyer_id);
    assert_eq!(history[1].sender_id, world.seller_id);
    assert_eq!(history[1].attachment_ref.as_deref(), Some("receipt-123"));
}

#[test]
fn test_outsiders_are_rejected() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    seed_user(&mut conn, "stranger", true);
    let order = place_order(&mut conn, &world, COIN / 10);

    assert!(matches!(
        tx(&mut conn, |conn| chat::post_message(
            conn, &config, &order.id, "stranger", "hello", None
        )),
        Err(TradeError::Forbidden(_))
    ));
    assert!(matches!(
        chat::get_history(&mut conn, &order.id, "stranger"),
        Err(TradeError::Forbidden(_))
    ));
}

#[test]
fn test_arbiter_sees_history_only_once_disputed() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let order = place_order(&mut conn, &world, COIN / 10);

    tx(&mut conn, |conn| {
        chat::post_message(conn, &config, &order.id, &world.buyer_id, "paid", None)
    })
    .unwrap();

    // No dispute yet: the arbiter has no business reading the channel.
    assert!(matches!(
        chat::get_history(&mut conn, &order.id, &world.arbiter_id),
        Err(TradeError::Forbidden(_))
    ));

    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();
    tx(&mut conn, |conn| {
        dispute::open_dispute(conn, &order.id, &world.buyer_id, "no confirmation")
    })
    .unwrap();

    let history = chat::get_history(&mut conn, &order.id, &world.arbiter_id).unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn test_message_validation() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let order = place_order(&mut conn, &world, COIN / 10);

    assert!(matches!(
        tx(&mut conn, |conn| chat::post_message(
            conn, &config, &order.id, &world.buyer_id, "   ", None
        )),
        Err(TradeError::Validation(_))
    ));

    let oversized = "x".repeat(5000);
    assert!(matches!(
        tx(&mut conn, |conn| chat::post_message(
            conn, &config, &order.id, &world.buyer_id, &oversized, None
        )),
        Err(TradeError::Validation(_))
    ));
}

#[test]
fn test_channel_freezes_after_retention_window() {
    let mut conn = setup_conn();
    let world = sell_offer_world(&mut conn);
    let config = test_config();
    let order = place_order(&mut conn, &world, COIN / 10);

    tx(&mut conn, |conn| {
        order_engine::mark_payment_sent(conn, &config, &order.id, &world.buyer_id)
    })
    .unwrap();
    tx(&mut conn, |conn| {
        order_engine::confirm_receipt_and_release(conn, &order.id, &world.seller_id)
    })
    .unwrap();

    // Inside the retention window messages still flow (evidence may
    // need to be discussed post-completion).
    tx(&mut conn, |conn| {
        chat::post_message(conn, &config, &order.id, &world.buyer_id, "thanks!", None)
    })
    .unwrap();

    // Far past the window the channel is read-only.
    backdate_updated_at(&mut conn, &order.id, config.chat_retention_secs + 60);
    assert!(matches!(
        tx(&mut conn, |conn| chat::post_message(
            conn, &config, &order.id, &world.buyer_id, "one more thing", None
        )),
        Err(TradeError::InvalidState(_))
    ));

    // History remains readable for audits.
    let history = chat::get_history(&mut conn, &order.id, &world.seller_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        TradeMessage::count_for_order(&mut conn, &order.id).unwrap(),
        1
    );
}
