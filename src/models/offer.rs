//! Standing offer model.
//!
//! Column order MUST match schema.rs exactly - Diesel's Queryable trait
//! requires fields in the same order as the table columns.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::ATOMIC_UNITS_PER_ASSET;
use crate::schema::offers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSide {
    Buy,
    Sell,
}

impl OfferSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferSide::Buy => "buy",
            OfferSide::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(OfferSide::Buy),
            "sell" => Some(OfferSide::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = offers)]
pub struct Offer {
    pub id: String,
    pub owner_id: String,
    pub side: String,
    pub asset: String,
    pub fiat_currency: String,
    /// Fiat minor units per whole asset unit, locked per-order at
    /// order creation.
    pub unit_price: i64,
    pub available_quantity: i64,
    pub min_order_quantity: i64,
    pub max_order_quantity: i64,
    pub payment_time_limit_secs: i64,
    /// JSON array of accepted payment method ids.
    pub payment_method_ids: String,
    pub terms: Option<String>,
    pub is_active: bool,
    pub escrow_hold_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = offers)]
pub struct NewOffer {
    pub id: String,
    pub owner_id: String,
    pub side: String,
    pub asset: String,
    pub fiat_currency: String,
    pub unit_price: i64,
    pub available_quantity: i64,
    pub min_order_quantity: i64,
    pub max_order_quantity: i64,
    pub payment_time_limit_secs: i64,
    pub payment_method_ids: String,
    pub terms: Option<String>,
    pub is_active: bool,
    pub escrow_hold_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Filters for the public offer listing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OfferFilter {
    pub side: Option<String>,
    pub asset: Option<String>,
    pub fiat_currency: Option<String>,
    pub payment_method_id: Option<String>,
}

impl Offer {
    pub fn create(conn: &mut SqliteConnection, new_offer: NewOffer) -> QueryResult<Offer> {
        diesel::insert_into(offers::table)
            .values(&new_offer)
            .execute(conn)?;
        offers::table
            .filter(offers::id.eq(&new_offer.id))
            .first(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, offer_id: &str) -> QueryResult<Option<Offer>> {
        offers::table
            .filter(offers::id.eq(offer_id))
            .first(conn)
            .optional()
    }

    /// Active offers matching the filter, excluding the requester's own.
    /// Payment-method filtering happens in Rust because the accepted
    /// set is a JSON column.
    pub fn list_active(
        conn: &mut SqliteConnection,
        filter: &OfferFilter,
        requester_id: &str,
    ) -> QueryResult<Vec<Offer>> {
        let mut query = offers::table
            .filter(offers::is_active.eq(true))
            .filter(offers::owner_id.ne(requester_id))
            .into_boxed();

        if let Some(ref side) = filter.side {
            query = query.filter(offers::side.eq(side.clone()));
        }
        if let Some(ref asset) = filter.asset {
            query = query.filter(offers::asset.eq(asset.clone()));
        }
        if let Some(ref fiat) = filter.fiat_currency {
            query = query.filter(offers::fiat_currency.eq(fiat.clone()));
        }

        let mut results: Vec<Offer> = query.order(offers::created_at.desc()).load(conn)?;

        if let Some(ref method_id) = filter.payment_method_id {
            results.retain(|o| o.accepted_method_ids().iter().any(|m| m == method_id));
        }

        Ok(results)
    }

    /// Reserve `quantity` for a new order. The guard on
    /// `available_quantity >= quantity AND is_active` is the sole
    /// defence against overselling: of two concurrent reservations,
    /// exactly one sees an affected row.
    pub fn try_reserve(
        conn: &mut SqliteConnection,
        offer_id: &str,
        quantity: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            offers::table
                .filter(offers::id.eq(offer_id))
                .filter(offers::is_active.eq(true))
                .filter(offers::available_quantity.ge(quantity)),
        )
        .set((
            offers::available_quantity.eq(offers::available_quantity - quantity),
            offers::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Return a cancelled/expired order's quantity to the offer.
    /// Returns false when the offer is no longer active (its pool has
    /// already been unwound; the caller must settle funds elsewhere).
    pub fn try_restore_quantity(
        conn: &mut SqliteConnection,
        offer_id: &str,
        quantity: i64,
    ) -> QueryResult<bool> {
        let updated = diesel::update(
            offers::table
                .filter(offers::id.eq(offer_id))
                .filter(offers::is_active.eq(true)),
        )
        .set((
            offers::available_quantity.eq(offers::available_quantity + quantity),
            offers::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    /// Deactivate; exactly one caller wins the guard so the reserve
    /// pool is unwound once.
    pub fn try_deactivate(conn: &mut SqliteConnection, offer_id: &str) -> QueryResult<bool> {
        let updated = diesel::update(
            offers::table
                .filter(offers::id.eq(offer_id))
                .filter(offers::is_active.eq(true)),
        )
        .set((
            offers::is_active.eq(false),
            offers::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;
        Ok(updated == 1)
    }

    pub fn side(&self) -> Option<OfferSide> {
        OfferSide::parse(&self.side)
    }

    pub fn accepted_method_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.payment_method_ids).unwrap_or_default()
    }

    pub fn accepts_method(&self, method_id: &str) -> bool {
        self.accepted_method_ids().iter().any(|m| m == method_id)
    }

    /// Fiat cost of `quantity` atomic units at this offer's locked
    /// unit price, in fiat minor units. None on overflow.
    pub fn fiat_cost(&self, quantity: i64) -> Option<i64> {
        let cost = (self.unit_price as i128)
            .checked_mul(quantity as i128)?
            .checked_div(ATOMIC_UNITS_PER_ASSET as i128)?;
        i64::try_from(cost).ok()
    }
}
