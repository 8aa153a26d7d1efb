//! Identity/KYC projection.
//!
//! Account management and KYC approval live outside the engine; this
//! table mirrors just the fields trading decisions depend on.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::users;

pub const ROLE_TRADER: &str = "trader";
pub const ROLE_ARBITER: &str = "arbiter";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: String,
    pub kyc_verified: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub role: String,
    pub kyc_verified: bool,
}

impl User {
    pub fn create(conn: &mut SqliteConnection, new_user: NewUser) -> QueryResult<User> {
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)?;
        users::table.filter(users::id.eq(&new_user.id)).first(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::id.eq(user_id))
            .first(conn)
            .optional()
    }

    /// KYC gate consumed by offer and order creation.
    pub fn is_verified(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<bool> {
        let verified = users::table
            .filter(users::id.eq(user_id))
            .select(users::kyc_verified)
            .first::<bool>(conn)
            .optional()?;
        Ok(verified.unwrap_or(false))
    }

    pub fn is_arbiter(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<bool> {
        let role = users::table
            .filter(users::id.eq(user_id))
            .select(users::role)
            .first::<String>(conn)
            .optional()?;
        Ok(role.as_deref() == Some(ROLE_ARBITER))
    }
}
