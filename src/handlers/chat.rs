//! Trade channel API handlers.
//!
//! - POST /api/orders/{id}/chat/messages - append a message
//! - GET  /api/orders/{id}/chat/messages - full history

use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::config::TimeoutConfig;
use crate::db::DbPool;
use crate::error::TradeError;
use crate::handlers::{require_user, run_db, run_tx, ApiResponse};
use crate::models::notification::EventKind;
use crate::models::order::Order;
use crate::services::chat;
use crate::services::notifier::Notifier;

#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 4096, message = "body must be 1-4096 bytes"))]
    pub body: String,
    pub attachment_ref: Option<String>,
}

pub async fn post_message(
    pool: web::Data<DbPool>,
    config: web::Data<TimeoutConfig>,
    notifier: web::Data<Notifier>,
    session: Session,
    path: web::Path<String>,
    body: web::Json<PostMessageRequest>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();
    body.validate()
        .map_err(|e| TradeError::Validation(e.to_string()))?;
    let body = body.into_inner();
    let config = config.get_ref().clone();

    let sender = user_id.clone();
    let order_id_for_tx = order_id.clone();
    let message = run_tx(&pool, move |conn| {
        chat::post_message(
            conn,
            &config,
            &order_id_for_tx,
            &sender,
            &body.body,
            body.attachment_ref.as_deref(),
        )
    })
    .await?;

    // Ping the counterparty; message content stays in the channel.
    let order = run_db(&pool, move |conn| {
        Order::find_by_id(conn, &order_id)?.ok_or(TradeError::NotFound("order"))
    })
    .await?;
    let recipient = if order.buyer_id == user_id {
        &order.seller_id
    } else {
        &order.buyer_id
    };
    notifier.notify(
        recipient,
        EventKind::ChatMessage,
        "New trade message",
        "You received a new message in a trade channel.",
        Some(serde_json::json!({
            "order_id": order.id,
            "message_id": message.id,
        })),
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(message)))
}

pub async fn get_messages(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;
    let order_id = path.into_inner();

    let messages = run_db(&pool, move |conn| {
        chat::get_history(conn, &order_id, &user_id)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(messages)))
}

/// Configure trade channel routes
pub fn configure_chat_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/orders/{order_id}/chat/messages")
            .route(web::post().to(post_message))
            .route(web::get().to(get_messages)),
    );
}
