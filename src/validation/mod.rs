//! Input validation helpers shared by services and handlers.

use crate::error::{TradeError, TradeResult};

/// Asset tickers: 2-10 uppercase alphanumerics (BTC, ETH, USDT...).
pub fn validate_asset_ticker(ticker: &str) -> TradeResult<()> {
    let ok = (2..=10).contains(&ticker.len())
        && ticker.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !ok {
        return Err(TradeError::Validation(format!(
            "invalid asset ticker: {ticker:?}"
        )));
    }
    Ok(())
}

/// Fiat currency codes: exactly 3 uppercase letters (ISO 4217 shape).
pub fn validate_fiat_currency(code: &str) -> TradeResult<()> {
    let ok = code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase());
    if !ok {
        return Err(TradeError::Validation(format!(
            "invalid fiat currency: {code:?}"
        )));
    }
    Ok(())
}

pub fn validate_positive(value: i64, field: &str) -> TradeResult<()> {
    if value <= 0 {
        return Err(TradeError::Validation(format!(
            "{field} must be positive, got {value}"
        )));
    }
    Ok(())
}
