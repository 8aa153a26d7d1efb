//! HTTP handlers.
//!
//! Endpoints map 1:1 to the engine operations. The platform's auth
//! layer populates the session; handlers only read `user_id` from it.

pub mod chat;
pub mod disputes;
pub mod notifications;
pub mod offers;
pub mod orders;

use actix_session::Session;
use diesel::prelude::*;
use serde::Serialize;

use crate::db::DbPool;
use crate::error::TradeError;

/// Standard API response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// Get the authenticated user from the session.
pub(crate) fn require_user(session: &Session) -> Result<String, TradeError> {
    session
        .get::<String>("user_id")
        .map_err(|e| TradeError::Internal(anyhow::anyhow!("session error: {e}")))?
        .ok_or_else(|| TradeError::Forbidden("not authenticated".to_string()))
}

/// Run a read-only database closure on the blocking pool.
pub(crate) async fn run_db<T, F>(pool: &DbPool, f: F) -> Result<T, TradeError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, TradeError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| TradeError::Internal(anyhow::Error::new(e)))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| TradeError::Internal(anyhow::Error::new(e)))?
}

/// Run a mutating closure inside a single immediate transaction, so a
/// failing sub-step rolls the whole operation back.
pub(crate) async fn run_tx<T, F>(pool: &DbPool, f: F) -> Result<T, TradeError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, TradeError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| TradeError::Internal(anyhow::Error::new(e)))?;
        conn.immediate_transaction(f)
    })
    .await
    .map_err(|e| TradeError::Internal(anyhow::Error::new(e)))?
}
