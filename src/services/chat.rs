//! Trade channel: per-order message log used as dispute evidence.

use diesel::prelude::*;

use crate::config::TimeoutConfig;
use crate::error::{TradeError, TradeResult};
use crate::models::dispute::Dispute;
use crate::models::order::Order;
use crate::models::trade_message::{NewTradeMessage, TradeMessage};
use crate::models::user::User;

/// Maximum message body length in bytes.
const MAX_BODY_LEN: usize = 4096;

/// Append a message to an order's channel. Participants only; the
/// channel freezes once the order has been terminal for longer than
/// the evidence retention window.
pub fn post_message(
    conn: &mut SqliteConnection,
    config: &TimeoutConfig,
    order_id: &str,
    sender_id: &str,
    body: &str,
    attachment_ref: Option<&str>,
) -> TradeResult<TradeMessage> {
    if body.trim().is_empty() {
        return Err(TradeError::Validation("message body is empty".to_string()));
    }
    if body.len() > MAX_BODY_LEN {
        return Err(TradeError::Validation(format!(
            "message body exceeds {MAX_BODY_LEN} bytes"
        )));
    }

    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    if !order.is_participant(sender_id) {
        return Err(TradeError::Forbidden(
            "not a participant in this trade".to_string(),
        ));
    }

    if let Some(status) = order.status() {
        if status.is_terminal() {
            let closed_since = chrono::Utc::now().naive_utc() - order.updated_at;
            if closed_since.num_seconds() > config.chat_retention_secs {
                return Err(TradeError::InvalidState(
                    "trade channel is closed".to_string(),
                ));
            }
        }
    }

    let message = TradeMessage::create(
        conn,
        NewTradeMessage::new(order_id, sender_id, body, attachment_ref),
    )?;
    Ok(message)
}

/// Full ordered history. Visible to the two participants, and to
/// arbiters once a dispute exists for the order.
pub fn get_history(
    conn: &mut SqliteConnection,
    order_id: &str,
    caller_id: &str,
) -> TradeResult<Vec<TradeMessage>> {
    let order = Order::find_by_id(conn, order_id)?.ok_or(TradeError::NotFound("order"))?;

    let allowed = order.is_participant(caller_id)
        || (User::is_arbiter(conn, caller_id)?
            && Dispute::find_by_order(conn, order_id)?.is_some());

    if !allowed {
        return Err(TradeError::Forbidden(
            "not a participant in this trade".to_string(),
        ));
    }

    Ok(TradeMessage::find_by_order(conn, order_id)?)
}
