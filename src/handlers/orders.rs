//! Order lifecycle API handlers.
//!
//! - POST /api/orders                       - accept an offer
//! - GET  /api/orders                       - my orders
//! - GET  /api/orders/{id}                  - order snapshot
//! - POST /api/orders/{id}/mark-paid        - buyer marks fiat sent
//! - POST /api/orders/{id}/confirm-receipt  - seller releases escrow
//! - POST /api/orders/{id}/cancel           - pre-payment cancellation
//! - POST /api/orders/{id}/review           - post-completion rating

use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::config::TimeoutConfig;
use crate::db::DbPool;
use crate::error::TradeError;
use crate::handlers::{require_user, run_db, run_tx, ApiResponse};
use crate::models::dispute::Dispute;
use crate::models::notification::EventKind;
use crate::models::order::Order;
use crate::models::user::User;
use crate::services::notifier::Notifier;
use crate::services::order_engine;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub offer_id: String,
    pub quantity: i64,
    pub payment_method_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    pub rating: i32,
    #[validate(length(max = 2000, message = "comment too long"))]
    pub comment: Option<String>,
}

pub async fn create_order(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    session: Session,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let body = body.into_inner();

    let order = run_tx(&pool, move |conn| {
        order_engine::create_order(
            conn,
            &body.offer_id,
            &user_id,
            body.quantity,
            &body.payment_method_id,
        )
    })
    .await?;

    notifier.notify_parties(
        &order.buyer_id,
        &order.seller_id,
        EventKind::OrderCreated,
        "Order created",
        "A new trade has started; the payment window is open.",
        Some(serde_json::json!({
            "order_id": order.id,
            "fiat_amount": order.fiat_amount,
        })),
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(order)))
}

pub async fn list_my_orders(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;

    let orders = run_db(&pool, move |conn| {
        Ok(Order::find_for_user(conn, &user_id)?)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

pub async fn get_order(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();

    let order = run_db(&pool, move |conn| {
        let order =
            Order::find_by_id(conn, &order_id)?.ok_or(TradeError::NotFound("order"))?;
        let allowed = order.is_participant(&user_id)
            || (User::is_arbiter(conn, &user_id)?
                && Dispute::find_by_order(conn, &order_id)?.is_some());
        if !allowed {
            return Err(TradeError::Forbidden(
                "not a participant in this trade".to_string(),
            ));
        }
        Ok(order)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

pub async fn mark_paid(
    pool: web::Data<DbPool>,
    config: web::Data<TimeoutConfig>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();
    let config = config.get_ref().clone();

    let order = run_tx(&pool, move |conn| {
        order_engine::mark_payment_sent(conn, &config, &order_id, &user_id)
    })
    .await?;

    notifier.notify(
        &order.seller_id,
        EventKind::PaymentMarked,
        "Payment marked sent",
        "The buyer marked the fiat payment as sent; confirm receipt to release escrow.",
        Some(serde_json::json!({ "order_id": order.id })),
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

pub async fn confirm_receipt(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();

    let order = run_tx(&pool, move |conn| {
        order_engine::confirm_receipt_and_release(conn, &order_id, &user_id)
    })
    .await?;

    notifier.notify_parties(
        &order.buyer_id,
        &order.seller_id,
        EventKind::OrderCompleted,
        "Trade completed",
        "The seller confirmed receipt; the escrowed asset was released to the buyer.",
        Some(serde_json::json!({ "order_id": order.id })),
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

pub async fn cancel_order(
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();

    let order = run_tx(&pool, move |conn| {
        order_engine::cancel_order(conn, &order_id, &user_id)
    })
    .await?;

    notifier.notify_parties(
        &order.buyer_id,
        &order.seller_id,
        EventKind::OrderCancelled,
        "Order cancelled",
        "The order was cancelled before payment; the escrow was returned.",
        Some(serde_json::json!({ "order_id": order.id })),
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

pub async fn leave_review(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<String>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();
    body.validate()
        .map_err(|e| TradeError::Validation(e.to_string()))?;
    let body = body.into_inner();

    let order = run_tx(&pool, move |conn| {
        order_engine::leave_review(conn, &order_id, &user_id, body.rating, body.comment.as_deref())
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

/// Configure order routes
pub fn configure_order_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/orders")
            .route(web::post().to(create_order))
            .route(web::get().to(list_my_orders)),
    );
    cfg.service(web::resource("/orders/{order_id}").route(web::get().to(get_order)));
    cfg.service(web::resource("/orders/{order_id}/mark-paid").route(web::post().to(mark_paid)));
    cfg.service(
        web::resource("/orders/{order_id}/confirm-receipt").route(web::post().to(confirm_receipt)),
    );
    cfg.service(web::resource("/orders/{order_id}/cancel").route(web::post().to(cancel_order)));
    cfg.service(web::resource("/orders/{order_id}/review").route(web::post().to(leave_review)));
}
