//! Notification feed handler.
//!
//! - GET /api/notifications - recent notifications for the caller

use actix_session::Session;
use actix_web::{web, HttpResponse};

use crate::db::DbPool;
use crate::error::TradeError;
use crate::handlers::{require_user, run_db, ApiResponse};
use crate::models::notification::Notification;

const DEFAULT_LIMIT: i64 = 50;

pub async fn list_notifications(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, TradeError> {
    let user_id = require_user(&session)?;

    let notifications = run_db(&pool, move |conn| {
        Ok(Notification::find_by_user(conn, &user_id, DEFAULT_LIMIT)?)
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

/// Configure notification routes
pub fn configure_notification_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/notifications").route(web::get().to(list_notifications)));
}
