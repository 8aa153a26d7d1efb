//! Offer book: standing buy/sell offers and their inventory.
//!
//! SELL offers escrow their full advertised quantity at creation, so
//! `available_quantity` can never exceed what the owner actually set
//! aside. Reservation and restore are single guarded UPDATEs; no two
//! concurrent orders can oversell the same offer.

use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::error::{TradeError, TradeResult};
use crate::models::escrow_hold::{EscrowHold, HoldReason};
use crate::models::offer::{NewOffer, Offer, OfferFilter, OfferSide};
use crate::models::payment_method::PaymentMethod;
use crate::models::user::User;
use crate::services::ledger;
use crate::validation::{validate_asset_ticker, validate_fiat_currency, validate_positive};

/// Parameters for a new offer.
#[derive(Debug, Clone)]
pub struct OfferSpec {
    pub side: OfferSide,
    pub asset: String,
    pub fiat_currency: String,
    pub unit_price: i64,
    pub available_quantity: i64,
    pub min_order_quantity: i64,
    pub max_order_quantity: i64,
    pub payment_time_limit_secs: i64,
    pub payment_method_ids: Vec<String>,
    pub terms: Option<String>,
}

/// Publish a new offer. SELL offers atomically move the advertised
/// quantity into an offer-reserve escrow hold.
pub fn create_offer(
    conn: &mut SqliteConnection,
    owner_id: &str,
    spec: OfferSpec,
) -> TradeResult<Offer> {
    if !User::is_verified(conn, owner_id)? {
        return Err(TradeError::Forbidden(
            "identity verification required to publish offers".to_string(),
        ));
    }

    validate_asset_ticker(&spec.asset)?;
    validate_fiat_currency(&spec.fiat_currency)?;
    validate_positive(spec.unit_price, "unit_price")?;
    validate_positive(spec.available_quantity, "available_quantity")?;
    validate_positive(spec.min_order_quantity, "min_order_quantity")?;
    validate_positive(spec.payment_time_limit_secs, "payment_time_limit_secs")?;

    if spec.min_order_quantity > spec.max_order_quantity
        || spec.max_order_quantity > spec.available_quantity
    {
        return Err(TradeError::Validation(
            "require min_order_quantity <= max_order_quantity <= available_quantity".to_string(),
        ));
    }

    if spec.payment_method_ids.is_empty() {
        return Err(TradeError::Validation(
            "at least one accepted payment method is required".to_string(),
        ));
    }
    for method_id in &spec.payment_method_ids {
        if !PaymentMethod::is_owned_by(conn, method_id, owner_id)? {
            return Err(TradeError::Validation(format!(
                "payment method {method_id} is not owned by the offer owner"
            )));
        }
    }

    let offer_id = Uuid::new_v4().to_string();

    // SELL inventory is escrowed up front; a shortfall aborts before
    // the offer row exists.
    let escrow_hold_id = match spec.side {
        OfferSide::Sell => {
            let hold = ledger::lock_funds(
                conn,
                owner_id,
                &spec.asset,
                spec.available_quantity,
                HoldReason::OfferReserve,
                Some(&offer_id),
                None,
            )?;
            Some(hold.id)
        }
        OfferSide::Buy => None,
    };

    let now = Utc::now().naive_utc();
    let offer = Offer::create(
        conn,
        NewOffer {
            id: offer_id,
            owner_id: owner_id.to_string(),
            side: spec.side.as_str().to_string(),
            asset: spec.asset,
            fiat_currency: spec.fiat_currency,
            unit_price: spec.unit_price,
            available_quantity: spec.available_quantity,
            min_order_quantity: spec.min_order_quantity,
            max_order_quantity: spec.max_order_quantity,
            payment_time_limit_secs: spec.payment_time_limit_secs,
            payment_method_ids: serde_json::to_string(&spec.payment_method_ids)
                .map_err(anyhow::Error::from)?,
            terms: spec.terms,
            is_active: true,
            escrow_hold_id,
            created_at: now,
            updated_at: now,
        },
    )?;

    info!(
        offer_id = %offer.id,
        owner_id = %owner_id,
        side = %offer.side,
        asset = %offer.asset,
        quantity = offer.available_quantity,
        "offer published"
    );
    Ok(offer)
}

/// Active offers matching the filter, excluding the requester's own.
pub fn list_offers(
    conn: &mut SqliteConnection,
    filter: &OfferFilter,
    requester_id: &str,
) -> TradeResult<Vec<Offer>> {
    Ok(Offer::list_active(conn, filter, requester_id)?)
}

/// Decrement offer availability for a new order. The sole mutation
/// path shared with the order engine; serialized per offer by the
/// guarded UPDATE.
pub fn reserve_for_order(
    conn: &mut SqliteConnection,
    offer_id: &str,
    quantity: i64,
) -> TradeResult<()> {
    if Offer::try_reserve(conn, offer_id, quantity)? {
        Ok(())
    } else {
        Err(TradeError::OfferUnavailable)
    }
}

/// Return a reservation to the offer after cancellation/expiry.
/// Returns false when the offer was deactivated in the meantime; the
/// caller then settles the funds directly instead.
pub fn release_reservation(
    conn: &mut SqliteConnection,
    offer_id: &str,
    quantity: i64,
) -> TradeResult<bool> {
    Ok(Offer::try_restore_quantity(conn, offer_id, quantity)?)
}

/// Deactivate an offer and unwind its remaining reserve pool back to
/// the owner's free balance. Order-specific holds are untouched; open
/// orders still resolve through their own lifecycle.
pub fn deactivate_offer(
    conn: &mut SqliteConnection,
    offer_id: &str,
    caller_id: &str,
) -> TradeResult<Offer> {
    let offer = Offer::find_by_id(conn, offer_id)?.ok_or(TradeError::NotFound("offer"))?;

    if offer.owner_id != caller_id {
        return Err(TradeError::Forbidden(
            "only the offer owner can deactivate it".to_string(),
        ));
    }

    if !Offer::try_deactivate(conn, offer_id)? {
        return Err(TradeError::InvalidState("offer is already inactive".to_string()));
    }

    if let Some(ref hold_id) = offer.escrow_hold_id {
        let still_held = EscrowHold::find_by_id(conn, hold_id)?
            .map(|h| h.released_at.is_none())
            .unwrap_or(false);
        if still_held {
            ledger::release_funds(conn, hold_id, &offer.owner_id)?;
        }
    }

    info!(offer_id = %offer_id, owner_id = %caller_id, "offer deactivated");

    let offer = Offer::find_by_id(conn, offer_id)?.ok_or(TradeError::NotFound("offer"))?;
    Ok(offer)
}
