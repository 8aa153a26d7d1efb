//! Durable order deadlines.
//!
//! Deadlines are rows, not in-process timers, so they survive restarts;
//! the monitor's first poll after startup is the recovery pass. Firing
//! is exactly-once per (order, kind): the `fired_at IS NULL` guard
//! claims the row, and the unique index prevents duplicate scheduling.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::deadlines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    /// Buyer must mark payment sent before this fires.
    PaymentWindow,
    /// Seller must confirm receipt before this fires (auto-dispute).
    SellerConfirmation,
}

impl DeadlineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineKind::PaymentWindow => "payment_window",
            DeadlineKind::SellerConfirmation => "seller_confirmation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_window" => Some(DeadlineKind::PaymentWindow),
            "seller_confirmation" => Some(DeadlineKind::SellerConfirmation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = deadlines)]
pub struct Deadline {
    pub id: String,
    pub order_id: String,
    pub kind: String,
    pub fires_at: NaiveDateTime,
    pub fired_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = deadlines)]
pub struct NewDeadline {
    pub id: String,
    pub order_id: String,
    pub kind: String,
    pub fires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Deadline {
    /// Persist a deadline for (order, kind). Idempotent: re-scheduling
    /// an existing pair leaves the original row untouched.
    pub fn schedule(
        conn: &mut SqliteConnection,
        order_id: &str,
        kind: DeadlineKind,
        fires_at: NaiveDateTime,
    ) -> QueryResult<()> {
        diesel::insert_into(deadlines::table)
            .values(&NewDeadline {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                kind: kind.as_str().to_string(),
                fires_at,
                created_at: chrono::Utc::now().naive_utc(),
            })
            .on_conflict((deadlines::order_id, deadlines::kind))
            .do_nothing()
            .execute(conn)?;
        Ok(())
    }

    /// All unclaimed deadlines due at `now`, oldest first.
    pub fn find_due(conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<Vec<Deadline>> {
        deadlines::table
            .filter(deadlines::fired_at.is_null())
            .filter(deadlines::fires_at.le(now))
            .order(deadlines::fires_at.asc())
            .load(conn)
    }

    /// Unclaimed payment-window deadlines that fire within the warning
    /// threshold, for expiring-soon notifications.
    pub fn find_expiring_soon(
        conn: &mut SqliteConnection,
        now: NaiveDateTime,
        threshold_secs: i64,
    ) -> QueryResult<Vec<Deadline>> {
        let horizon = now + chrono::Duration::seconds(threshold_secs);
        deadlines::table
            .filter(deadlines::fired_at.is_null())
            .filter(deadlines::kind.eq(DeadlineKind::PaymentWindow.as_str()))
            .filter(deadlines::fires_at.gt(now))
            .filter(deadlines::fires_at.le(horizon))
            .load(conn)
    }

    /// Claim this deadline for firing. Exactly one claimant wins even
    /// with concurrent monitors; losers see false and skip.
    pub fn try_claim(conn: &mut SqliteConnection, deadline_id: &str) -> QueryResult<bool> {
        let updated = diesel::update(
            deadlines::table
                .filter(deadlines::id.eq(deadline_id))
                .filter(deadlines::fired_at.is_null()),
        )
        .set(deadlines::fired_at.eq(chrono::Utc::now().naive_utc()))
        .execute(conn)?;
        Ok(updated == 1)
    }

    pub fn kind(&self) -> Option<DeadlineKind> {
        DeadlineKind::parse(&self.kind)
    }
}
