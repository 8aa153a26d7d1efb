//! Explicit escrow hold records.
//!
//! Each lock of funds produces its own auditable row tied to the offer
//! or order it secures. Release is exactly-once: the `released_at IS
//! NULL` guard makes a second release attempt a no-op the caller can
//! detect.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::escrow_holds;

/// Why the funds are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Inventory backing an active SELL offer, not yet order-specific.
    OfferReserve,
    /// Funds locked for one specific order.
    OrderEscrow,
}

impl HoldReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldReason::OfferReserve => "offer_reserve",
            HoldReason::OrderEscrow => "order_escrow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = escrow_holds)]
pub struct EscrowHold {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub amount: i64,
    pub reason: String,
    pub offer_id: Option<String>,
    pub order_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub released_at: Option<NaiveDateTime>,
    pub released_to: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = escrow_holds)]
pub struct NewEscrowHold {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub amount: i64,
    pub reason: String,
    pub offer_id: Option<String>,
    pub order_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewEscrowHold {
    pub fn new(
        user_id: &str,
        asset: &str,
        amount: i64,
        reason: HoldReason,
        offer_id: Option<&str>,
        order_id: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            asset: asset.to_string(),
            amount,
            reason: reason.as_str().to_string(),
            offer_id: offer_id.map(str::to_string),
            order_id: order_id.map(str::to_string),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl EscrowHold {
    pub fn create(conn: &mut SqliteConnection, new_hold: NewEscrowHold) -> QueryResult<EscrowHold> {
        diesel::insert_into(escrow_holds::table)
            .values(&new_hold)
            .execute(conn)?;
        escrow_holds::table
            .filter(escrow_holds::id.eq(&new_hold.id))
            .first(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, hold_id: &str) -> QueryResult<Option<EscrowHold>> {
        escrow_holds::table
            .filter(escrow_holds::id.eq(hold_id))
            .first(conn)
            .optional()
    }

    /// The unreleased order-escrow hold for an order, if any.
    pub fn find_active_by_order(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> QueryResult<Option<EscrowHold>> {
        escrow_holds::table
            .filter(escrow_holds::order_id.eq(order_id))
            .filter(escrow_holds::reason.eq(HoldReason::OrderEscrow.as_str()))
            .filter(escrow_holds::released_at.is_null())
            .first(conn)
            .optional()
    }

    /// Carve `amount` out of an unreleased hold (offer reserve pool).
    /// Returns false when the hold cannot cover it.
    pub fn try_decrease(
        conn: &mut SqliteConnection,
        hold_id: &str,
        amount: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            escrow_holds::table
                .filter(escrow_holds::id.eq(hold_id))
                .filter(escrow_holds::released_at.is_null())
                .filter(escrow_holds::amount.ge(amount)),
        )
        .set(escrow_holds::amount.eq(escrow_holds::amount - amount))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Fold `amount` back into an unreleased hold (order cancellation
    /// returning inventory to the offer reserve).
    pub fn try_increase(
        conn: &mut SqliteConnection,
        hold_id: &str,
        amount: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            escrow_holds::table
                .filter(escrow_holds::id.eq(hold_id))
                .filter(escrow_holds::released_at.is_null()),
        )
        .set(escrow_holds::amount.eq(escrow_holds::amount + amount))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Claim the release of a hold. Exactly one caller wins; the loser
    /// sees false and must treat the hold as already settled.
    pub fn try_mark_released(
        conn: &mut SqliteConnection,
        hold_id: &str,
        destination_user_id: &str,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            escrow_holds::table
                .filter(escrow_holds::id.eq(hold_id))
                .filter(escrow_holds::released_at.is_null()),
        )
        .set((
            escrow_holds::released_at.eq(chrono::Utc::now().naive_utc()),
            escrow_holds::released_to.eq(destination_user_id),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Close a hold whose funds went back into an offer reserve pool
    /// rather than to a user's free balance; released_to stays NULL so
    /// the audit trail distinguishes the two paths.
    pub fn try_mark_returned(conn: &mut SqliteConnection, hold_id: &str) -> QueryResult<bool> {
        let updated = diesel::update(
            escrow_holds::table
                .filter(escrow_holds::id.eq(hold_id))
                .filter(escrow_holds::released_at.is_null()),
        )
        .set(escrow_holds::released_at.eq(chrono::Utc::now().naive_utc()))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Sum of a user's unreleased holds for an asset (audit queries).
    pub fn total_held(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset: &str,
    ) -> QueryResult<i64> {
        use diesel::dsl::sql;
        use diesel::sql_types::{BigInt, Nullable};
        let total: Option<i64> = escrow_holds::table
            .filter(escrow_holds::user_id.eq(user_id))
            .filter(escrow_holds::asset.eq(asset))
            .filter(escrow_holds::released_at.is_null())
            .select(sql::<Nullable<BigInt>>("SUM(amount)"))
            .first(conn)?;
        Ok(total.unwrap_or(0))
    }
}
