//! Trade engine error taxonomy.
//!
//! Every mutating operation returns a `TradeError` on failure and the
//! HTTP layer maps each variant to a standardized response with a
//! machine-readable `error_code`, so API clients can branch on codes
//! instead of parsing messages.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the trading engine
#[derive(Error, Debug)]
pub enum TradeError {
    /// Bad input shape or range. Local, no state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// The payer does not hold enough of the asset.
    #[error("insufficient balance of {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: i64,
        available: i64,
    },

    /// Offer is inactive or cannot cover the requested quantity.
    #[error("offer unavailable")]
    OfferUnavailable,

    /// Attempted transition is not legal from the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Caller is not a participant, owner, or arbiter.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The dispute already carries a resolution.
    #[error("dispute already resolved")]
    AlreadyResolved,

    /// Entity lookup failed.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Database error (unexpected)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Internal error (unexpected state)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TradeError {
    /// Machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            TradeError::Validation(_) => "VALIDATION_ERROR",
            TradeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            TradeError::OfferUnavailable => "OFFER_UNAVAILABLE",
            TradeError::InvalidState(_) => "INVALID_STATE",
            TradeError::Forbidden(_) => "FORBIDDEN",
            TradeError::AlreadyResolved => "ALREADY_RESOLVED",
            TradeError::NotFound(_) => "NOT_FOUND",
            TradeError::Database(_) => "INTERNAL_ERROR",
            TradeError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the client can retry the same call and expect
    /// it to eventually succeed (transient or state-dependent).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TradeError::OfferUnavailable
                | TradeError::InsufficientBalance { .. }
                | TradeError::Database(_)
                | TradeError::Internal(_)
        )
    }
}

/// Result type for trade engine operations
pub type TradeResult<T> = Result<T, TradeError>;

/// Error response with standardized error code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Operation success (always false for errors)
    pub success: bool,
    /// Machine-readable code (e.g. "OFFER_UNAVAILABLE")
    pub error_code: String,
    /// Human-readable error message
    pub error: String,
    /// Whether the error can be recovered from (client can retry)
    pub recoverable: bool,
}

impl actix_web::ResponseError for TradeError {
    fn status_code(&self) -> StatusCode {
        match self {
            TradeError::Validation(_) => StatusCode::BAD_REQUEST,
            TradeError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            TradeError::OfferUnavailable => StatusCode::CONFLICT,
            TradeError::InvalidState(_) => StatusCode::CONFLICT,
            TradeError::Forbidden(_) => StatusCode::FORBIDDEN,
            TradeError::AlreadyResolved => StatusCode::CONFLICT,
            TradeError::NotFound(_) => StatusCode::NOT_FOUND,
            TradeError::Database(_) | TradeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal detail stays in the logs, not in the response body.
        let message = match self {
            TradeError::Database(_) | TradeError::Internal(_) => {
                tracing::error!("internal error: {self:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error_code: self.code().to_string(),
            error: message,
            recoverable: self.is_recoverable(),
        })
    }
}
