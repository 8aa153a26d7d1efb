//! Payment method registry projection.
//!
//! The engine never touches fiat rails; it only needs to know which
//! methods exist and who owns them.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::payment_methods;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = payment_methods)]
pub struct PaymentMethod {
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    pub label: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payment_methods)]
pub struct NewPaymentMethod {
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    pub label: String,
}

impl PaymentMethod {
    pub fn create(
        conn: &mut SqliteConnection,
        new_method: NewPaymentMethod,
    ) -> QueryResult<PaymentMethod> {
        diesel::insert_into(payment_methods::table)
            .values(&new_method)
            .execute(conn)?;
        payment_methods::table
            .filter(payment_methods::id.eq(&new_method.id))
            .first(conn)
    }

    pub fn is_owned_by(
        conn: &mut SqliteConnection,
        method_id: &str,
        user_id: &str,
    ) -> QueryResult<bool> {
        let count: i64 = payment_methods::table
            .filter(payment_methods::id.eq(method_id))
            .filter(payment_methods::owner_id.eq(user_id))
            .count()
            .get_result(conn)?;
        Ok(count > 0)
    }
}
