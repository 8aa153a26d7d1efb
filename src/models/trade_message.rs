//! Append-only trade chat bound 1:1 to an order.
//!
//! No update or delete paths exist on this table; messages are retained
//! past order completion as dispute evidence.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::trade_messages;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = trade_messages)]
pub struct TradeMessage {
    pub id: String,
    pub order_id: String,
    pub sender_id: String,
    pub body: String,
    pub attachment_ref: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = trade_messages)]
pub struct NewTradeMessage {
    pub id: String,
    pub order_id: String,
    pub sender_id: String,
    pub body: String,
    pub attachment_ref: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewTradeMessage {
    pub fn new(order_id: &str, sender_id: &str, body: &str, attachment_ref: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            sender_id: sender_id.to_string(),
            body: body.to_string(),
            attachment_ref: attachment_ref.map(str::to_string),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl TradeMessage {
    pub fn create(
        conn: &mut SqliteConnection,
        new_message: NewTradeMessage,
    ) -> QueryResult<TradeMessage> {
        diesel::insert_into(trade_messages::table)
            .values(&new_message)
            .execute(conn)?;
        trade_messages::table
            .filter(trade_messages::id.eq(&new_message.id))
            .first(conn)
    }

    /// Full history in send order.
    pub fn find_by_order(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> QueryResult<Vec<TradeMessage>> {
        trade_messages::table
            .filter(trade_messages::order_id.eq(order_id))
            .order(trade_messages::created_at.asc())
            .load(conn)
    }

    pub fn count_for_order(conn: &mut SqliteConnection, order_id: &str) -> QueryResult<i64> {
        trade_messages::table
            .filter(trade_messages::order_id.eq(order_id))
            .count()
            .get_result(conn)
    }
}
