//! Spendable per-asset balances.
//!
//! Invariant: `available` never goes negative. Debits are guarded
//! UPDATEs (`available >= amount`), so a losing concurrent debit
//! observes zero affected rows instead of overdrawing. Escrowed funds
//! are not represented here at all; they live in `escrow_holds`.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::balances;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = balances)]
pub struct Balance {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub available: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = balances)]
pub struct NewBalance {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub available: i64,
}

impl Balance {
    /// Current spendable balance; absent row reads as zero.
    pub fn get_available(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset: &str,
    ) -> QueryResult<i64> {
        let available = balances::table
            .filter(balances::user_id.eq(user_id))
            .filter(balances::asset.eq(asset))
            .select(balances::available)
            .first::<i64>(conn)
            .optional()?;
        Ok(available.unwrap_or(0))
    }

    /// Credit `amount` to the user's spendable balance, creating the
    /// row on first touch.
    pub fn credit(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset: &str,
        amount: i64,
    ) -> QueryResult<()> {
        diesel::insert_into(balances::table)
            .values(&NewBalance {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                asset: asset.to_string(),
                available: amount,
            })
            .on_conflict((balances::user_id, balances::asset))
            .do_update()
            .set(balances::available.eq(balances::available + amount))
            .execute(conn)?;
        Ok(())
    }

    /// Guarded debit. Returns false when the balance cannot cover
    /// `amount`; the row is left untouched in that case.
    pub fn try_debit(
        conn: &mut SqliteConnection,
        user_id: &str,
        asset: &str,
        amount: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            balances::table
                .filter(balances::user_id.eq(user_id))
                .filter(balances::asset.eq(asset))
                .filter(balances::available.ge(amount)),
        )
        .set(balances::available.eq(balances::available - amount))
        .execute(conn)?;
        Ok(updated == 1)
    }
}
