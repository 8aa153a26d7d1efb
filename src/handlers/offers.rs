//! Offer book API handlers.
//!
//! - GET  /api/offers                  - list active offers (filtered)
//! - POST /api/offers                  - publish a new offer
//! - POST /api/offers/{id}/deactivate  - withdraw an offer

use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::db::DbPool;
use crate::error::TradeError;
use crate::handlers::{require_user, run_db, run_tx, ApiResponse};
use crate::models::notification::EventKind;
use crate::models::offer::{OfferFilter, OfferSide};
use crate::services::notifier::Notifier;
use crate::services::offer_book::{self, OfferSpec};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOfferRequest {
    pub side: String,
    pub asset: String,
    pub fiat_currency: String,
    pub unit_price: i64,
    pub available_quantity: i64,
    pub min_order_quantity: i64,
    pub max_order_quantity: i64,
    pub payment_time_limit_secs: i64,
    #[validate(length(min = 1, message = "at least one payment method required"))]
    pub payment_method_ids: Vec<String>,
    #[validate(length(max = 4000, message = "terms too long"))]
    pub terms: Option<String>,
}

pub async fn list_offers(
    pool: web::Data<DbPool>,
    session: Session,
    query: web::Query<OfferFilter>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let filter = query.into_inner();

    let offers = run_db(&pool, move |conn| {
        offer_book::list_offers(conn, &filter, &user_id)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(offers)))
}

pub async fn create_offer(
    pool: web::Data<DbPool>,
    session: Session,
    body: web::Json<CreateOfferRequest>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    body.validate()
        .map_err(|e| TradeError::Validation(e.to_string()))?;
    let body = body.into_inner();

    let side = OfferSide::parse(&body.side)
        .ok_or_else(|| TradeError::Validation(format!("invalid offer side {:?}", body.side)))?;

    let spec = OfferSpec {
        side,
        asset: body.asset,
        fiat_currency: body.fiat_currency,
        unit_price: body.unit_price,
        available_quantity: body.available_quantity,
        min_order_quantity: body.min_order_quantity,
        max_order_quantity: body.max_order_quantity,
        payment_time_limit_secs: body.payment_time_limit_secs,
        payment_method_ids: body.payment_method_ids,
        terms: body.terms,
    };

    let offer = run_tx(&pool, move |conn| {
        offer_book::create_offer(conn, &user_id, spec)
    })
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(offer)))
}

pub async fn deactivate_offer(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let offer_id = path.into_inner();

    let caller = user_id.clone();
    let offer = run_tx(&pool, move |conn| {
        offer_book::deactivate_offer(conn, &offer_id, &caller)
    })
    .await?;

    notifier.notify(
        &user_id,
        EventKind::OfferDeactivated,
        "Offer deactivated",
        "Your offer was deactivated and its remaining inventory returned.",
        Some(serde_json::json!({ "offer_id": offer.id })),
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(offer)))
}

/// Configure offer routes
pub fn configure_offer_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/offers")
            .route(web::get().to(list_offers))
            .route(web::post().to(create_offer)),
    );
    cfg.service(
        web::resource("/offers/{offer_id}/deactivate").route(web::post().to(deactivate_offer)),
    );
}
