//! Dispute API handlers.
//!
//! - POST /api/orders/{id}/dispute     - participant opens a dispute
//! - POST /api/disputes/{id}/resolve   - arbiter executes a decision

use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::TimeoutConfig;
use crate::db::DbPool;
use crate::error::TradeError;
use crate::handlers::{require_user, run_tx, ApiResponse};
use crate::models::dispute::{Dispute, DisputeResolution};
use crate::models::notification::EventKind;
use crate::models::order::Order;
use crate::services::dispute;
use crate::services::notifier::Notifier;

#[derive(Debug, Deserialize, Validate)]
pub struct OpenDisputeRequest {
    #[validate(length(min = 1, max = 4000, message = "reason required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveDisputeRequest {
    pub resolution: String,
    /// Buyer share for split resolutions, in basis points.
    pub split_buyer_bps: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct DisputeResponse {
    pub order: Order,
    pub dispute: Dispute,
}

pub async fn open_dispute(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
    body: web::Json<OpenDisputeRequest>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();
    body.validate()
        .map_err(|e| TradeError::Validation(e.to_string()))?;
    let reason = body.into_inner().reason;

    let (order, dispute_rec) = run_tx(&pool, move |conn| {
        dispute::open_dispute(conn, &order_id, &user_id, &reason)
    })
    .await?;

    notifier.notify_parties(
        &order.buyer_id,
        &order.seller_id,
        EventKind::DisputeOpened,
        "Dispute opened",
        "The trade was escalated to arbitration; escrow stays locked until resolution.",
        Some(serde_json::json!({
            "order_id": order.id,
            "dispute_id": dispute_rec.id,
        })),
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(DisputeResponse {
        order,
        dispute: dispute_rec,
    })))
}

pub async fn resolve_dispute(
    pool: web::Data<DbPool>,
    config: web::Data<TimeoutConfig>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
    body: web::Json<ResolveDisputeRequest>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let dispute_id = path.into_inner();
    let body = body.into_inner();
    let config = config.get_ref().clone();

    let resolution = DisputeResolution::parse(&body.resolution).ok_or_else(|| {
        TradeError::Validation(format!("invalid resolution {:?}", body.resolution))
    })?;

    let (order, dispute_rec) = run_tx(&pool, move |conn| {
        dispute::resolve_dispute(
            conn,
            &config,
            &dispute_id,
            &user_id,
            resolution,
            body.split_buyer_bps,
        )
    })
    .await?;

    notifier.notify_parties(
        &order.buyer_id,
        &order.seller_id,
        EventKind::DisputeResolved,
        "Dispute resolved",
        "An arbiter resolved the dispute and the escrow was settled.",
        Some(serde_json::json!({
            "order_id": order.id,
            "dispute_id": dispute_rec.id,
            "resolution": dispute_rec.resolution,
        })),
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(DisputeResponse {
        order,
        dispute: dispute_rec,
    })))
}

/// Configure dispute routes
pub fn configure_dispute_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/orders/{order_id}/dispute").route(web::post().to(open_dispute)));
    cfg.service(
        web::resource("/disputes/{dispute_id}/resolve").route(web::post().to(resolve_dispute)),
    );
}
