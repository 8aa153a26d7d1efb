//! Persistent notification records.
//!
//! Delivery (websocket, push, email) is an external concern; the engine
//! records every emitted event here so clients can catch up later.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::notifications;

/// Event kinds emitted on order/offer state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated,
    PaymentMarked,
    PaymentWindowExpiring,
    OrderCompleted,
    OrderCancelled,
    OrderExpired,
    DisputeOpened,
    DisputeResolved,
    OfferDeactivated,
    ChatMessage,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order_created",
            EventKind::PaymentMarked => "payment_marked",
            EventKind::PaymentWindowExpiring => "payment_window_expiring",
            EventKind::OrderCompleted => "order_completed",
            EventKind::OrderCancelled => "order_cancelled",
            EventKind::OrderExpired => "order_expired",
            EventKind::DisputeOpened => "dispute_opened",
            EventKind::DisputeResolved => "dispute_resolved",
            EventKind::OfferDeactivated => "offer_deactivated",
            EventKind::ChatMessage => "chat_message",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub event_kind: String,
    pub title: String,
    pub message: String,
    pub payload: Option<String>,
    pub read: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: String,
    pub user_id: String,
    pub event_kind: String,
    pub title: String,
    pub message: String,
    pub payload: Option<String>,
    pub read: i32,
}

impl NewNotification {
    pub fn new(
        user_id: &str,
        event_kind: EventKind,
        title: &str,
        message: &str,
        payload: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            event_kind: event_kind.as_str().to_string(),
            title: title.to_string(),
            message: message.to_string(),
            payload,
            read: 0,
        }
    }
}

impl Notification {
    pub fn create(
        conn: &mut SqliteConnection,
        new_notification: NewNotification,
    ) -> QueryResult<Notification> {
        diesel::insert_into(notifications::table)
            .values(&new_notification)
            .execute(conn)?;
        notifications::table
            .filter(notifications::id.eq(&new_notification.id))
            .first(conn)
    }

    pub fn find_by_user(
        conn: &mut SqliteConnection,
        user_id: &str,
        limit: i64,
    ) -> QueryResult<Vec<Notification>> {
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.desc())
            .limit(limit)
            .load(conn)
    }
}
