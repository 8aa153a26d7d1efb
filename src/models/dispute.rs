//! Dispute records.
//!
//! A dispute is created at most once per order while it sits in
//! payment_sent, and resolved exactly once: resolution claims the row
//! via the `resolution IS NULL` guard.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::disputes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    ReleaseToBuyer,
    RefundToSeller,
    Split,
}

impl DisputeResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeResolution::ReleaseToBuyer => "release_to_buyer",
            DisputeResolution::RefundToSeller => "refund_to_seller",
            DisputeResolution::Split => "split",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "release_to_buyer" => Some(DisputeResolution::ReleaseToBuyer),
            "refund_to_seller" => Some(DisputeResolution::RefundToSeller),
            "split" => Some(DisputeResolution::Split),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = disputes)]
pub struct Dispute {
    pub id: String,
    pub order_id: String,
    /// None when the scheduler auto-escalated a confirmation timeout.
    pub raised_by: Option<String>,
    pub reason: String,
    pub opened_at: NaiveDateTime,
    pub resolution: Option<String>,
    pub split_buyer_bps: Option<i32>,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = disputes)]
pub struct NewDispute {
    pub id: String,
    pub order_id: String,
    pub raised_by: Option<String>,
    pub reason: String,
    pub opened_at: NaiveDateTime,
}

impl NewDispute {
    pub fn new(order_id: &str, raised_by: Option<&str>, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            raised_by: raised_by.map(str::to_string),
            reason: reason.to_string(),
            opened_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl Dispute {
    pub fn create(conn: &mut SqliteConnection, new_dispute: NewDispute) -> QueryResult<Dispute> {
        diesel::insert_into(disputes::table)
            .values(&new_dispute)
            .execute(conn)?;
        disputes::table
            .filter(disputes::id.eq(&new_dispute.id))
            .first(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, dispute_id: &str) -> QueryResult<Option<Dispute>> {
        disputes::table
            .filter(disputes::id.eq(dispute_id))
            .first(conn)
            .optional()
    }

    pub fn find_by_order(conn: &mut SqliteConnection, order_id: &str) -> QueryResult<Option<Dispute>> {
        disputes::table
            .filter(disputes::order_id.eq(order_id))
            .first(conn)
            .optional()
    }

    /// Record the arbiter's decision. Returns false when the dispute
    /// already carries a resolution (AlreadyResolved to the caller).
    pub fn try_resolve(
        conn: &mut SqliteConnection,
        dispute_id: &str,
        resolution: DisputeResolution,
        split_buyer_bps: Option<i32>,
        arbiter_id: &str,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            disputes::table
                .filter(disputes::id.eq(dispute_id))
                .filter(disputes::resolution.is_null()),
        )
        .set((
            disputes::resolution.eq(resolution.as_str()),
            disputes::split_buyer_bps.eq(split_buyer_bps),
            disputes::resolved_at.eq(chrono::Utc::now().naive_utc()),
            disputes::resolved_by.eq(arbiter_id),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
