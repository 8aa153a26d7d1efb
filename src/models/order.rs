//! Order model and status state machine.
//!
//! The `orders.status` column is only ever written through the guarded
//! updates below: every transition names the status it expects to move
//! from, so concurrent attempts (user call vs. deadline firing) resolve
//! to exactly one winner.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::orders;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    PaymentSent,
    Disputed,
    Completed,
    Cancelled,
    Expired,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        use OrderStatus::*;
        match self {
            PendingPayment => "pending_payment",
            PaymentSent => "payment_sent",
            Disputed => "disputed",
            Completed => "completed",
            Cancelled => "cancelled",
            Expired => "expired",
            Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        use OrderStatus::*;
        match s {
            "pending_payment" => Some(PendingPayment),
            "payment_sent" => Some(PaymentSent),
            "disputed" => Some(Disputed),
            "completed" => Some(Completed),
            "cancelled" => Some(Cancelled),
            "expired" => Some(Expired),
            "refunded" => Some(Refunded),
            _ => None,
        }
    }

    /// Check if this is a terminal (final) state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::Refunded
        )
    }

    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> Vec<OrderStatus> {
        use OrderStatus::*;
        match self {
            PendingPayment => vec![PaymentSent, Cancelled, Expired],
            PaymentSent => vec![Completed, Disputed],
            Disputed => vec![Completed, Refunded],
            Completed => vec![],
            Cancelled => vec![],
            Expired => vec![],
            Refunded => vec![],
        }
    }

    pub fn can_transition(&self, to: OrderStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: String,
    pub offer_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub asset: String,
    pub crypto_amount: i64,
    pub fiat_amount: i64,
    pub fiat_currency: String,
    pub payment_method_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub payment_window_expires_at: NaiveDateTime,
    pub payment_sent_at: Option<NaiveDateTime>,
    pub dispute_opened_at: Option<NaiveDateTime>,
    pub review_rating: Option<i32>,
    pub review_comment: Option<String>,
    pub reviewed_by: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub id: String,
    pub offer_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub asset: String,
    pub crypto_amount: i64,
    pub fiat_amount: i64,
    pub fiat_currency: String,
    pub payment_method_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub payment_window_expires_at: NaiveDateTime,
}

impl Order {
    pub fn create(conn: &mut SqliteConnection, new_order: NewOrder) -> QueryResult<Order> {
        diesel::insert_into(orders::table)
            .values(&new_order)
            .execute(conn)?;
        orders::table
            .filter(orders::id.eq(&new_order.id))
            .first(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, order_id: &str) -> QueryResult<Option<Order>> {
        orders::table
            .filter(orders::id.eq(order_id))
            .first(conn)
            .optional()
    }

    /// Orders where the user is buyer or seller, newest first.
    pub fn find_for_user(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<Vec<Order>> {
        orders::table
            .filter(
                orders::buyer_id
                    .eq(user_id)
                    .or(orders::seller_id.eq(user_id)),
            )
            .order(orders::created_at.desc())
            .load(conn)
    }

    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// Compare-and-set status transition. Returns false when the order
    /// was not in `from` anymore - the caller lost the race and must
    /// not apply its side effects.
    pub fn try_transition(
        conn: &mut SqliteConnection,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(from.as_str())),
        )
        .set((
            orders::status.eq(to.as_str()),
            orders::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// PendingPayment -> PaymentSent, stamping payment_sent_at.
    pub fn try_mark_payment_sent(conn: &mut SqliteConnection, order_id: &str) -> QueryResult<bool> {
        let now = chrono::Utc::now().naive_utc();
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(OrderStatus::PendingPayment.as_str())),
        )
        .set((
            orders::status.eq(OrderStatus::PaymentSent.as_str()),
            orders::payment_sent_at.eq(now),
            orders::updated_at.eq(now),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// PaymentSent -> Disputed, stamping dispute_opened_at.
    pub fn try_mark_disputed(conn: &mut SqliteConnection, order_id: &str) -> QueryResult<bool> {
        let now = chrono::Utc::now().naive_utc();
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(OrderStatus::PaymentSent.as_str())),
        )
        .set((
            orders::status.eq(OrderStatus::Disputed.as_str()),
            orders::dispute_opened_at.eq(now),
            orders::updated_at.eq(now),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Set-once structured review on a completed order.
    pub fn try_set_review(
        conn: &mut SqliteConnection,
        order_id: &str,
        reviewer_id: &str,
        rating: i32,
        comment: Option<&str>,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(OrderStatus::Completed.as_str()))
                .filter(orders::review_rating.is_null()),
        )
        .set((
            orders::review_rating.eq(rating),
            orders::review_comment.eq(comment),
            orders::reviewed_by.eq(reviewer_id),
            orders::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }
}
