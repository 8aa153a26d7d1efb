//! Asset ledger adapter.
//!
//! Atomic "debit available / credit escrow" and "debit escrow / credit
//! available" primitives. Every function here mutates within the
//! caller's transaction, so a hold is never observable without the
//! state change it accompanies.

use diesel::prelude::*;
use tracing::info;

use crate::error::{TradeError, TradeResult};
use crate::models::balance::Balance;
use crate::models::escrow_hold::{EscrowHold, HoldReason, NewEscrowHold};

/// Current spendable balance for a user/asset.
pub fn get_available_balance(
    conn: &mut SqliteConnection,
    user_id: &str,
    asset: &str,
) -> TradeResult<i64> {
    Ok(Balance::get_available(conn, user_id, asset)?)
}

/// Move `amount` from the user's available balance into a new escrow
/// hold. Fails with `InsufficientBalance` and no state change when the
/// balance cannot cover it.
pub fn lock_funds(
    conn: &mut SqliteConnection,
    user_id: &str,
    asset: &str,
    amount: i64,
    reason: HoldReason,
    offer_id: Option<&str>,
    order_id: Option<&str>,
) -> TradeResult<EscrowHold> {
    if !Balance::try_debit(conn, user_id, asset, amount)? {
        let available = Balance::get_available(conn, user_id, asset)?;
        return Err(TradeError::InsufficientBalance {
            asset: asset.to_string(),
            required: amount,
            available,
        });
    }

    let hold = EscrowHold::create(
        conn,
        NewEscrowHold::new(user_id, asset, amount, reason, offer_id, order_id),
    )?;

    info!(
        hold_id = %hold.id,
        user_id = %user_id,
        asset = %asset,
        amount = amount,
        reason = %hold.reason,
        "funds locked into escrow"
    );
    Ok(hold)
}

/// Release a hold in full to `destination_user_id`'s available balance.
/// Exactly-once: a hold that was already released trips `InvalidState`
/// and credits nothing.
pub fn release_funds(
    conn: &mut SqliteConnection,
    hold_id: &str,
    destination_user_id: &str,
) -> TradeResult<()> {
    let hold = EscrowHold::find_by_id(conn, hold_id)?
        .ok_or(TradeError::NotFound("escrow hold"))?;

    if !EscrowHold::try_mark_released(conn, hold_id, destination_user_id)? {
        return Err(TradeError::InvalidState(
            "escrow hold already released".to_string(),
        ));
    }
    Balance::credit(conn, destination_user_id, &hold.asset, hold.amount)?;

    info!(
        hold_id = %hold_id,
        destination = %destination_user_id,
        asset = %hold.asset,
        amount = hold.amount,
        "escrow released"
    );
    Ok(())
}

/// Release a hold proportionally: `buyer_amount` to the buyer, the
/// remainder to the seller. The whole hold settles in one claim.
pub fn release_split(
    conn: &mut SqliteConnection,
    hold_id: &str,
    buyer_id: &str,
    buyer_amount: i64,
    seller_id: &str,
) -> TradeResult<()> {
    let hold = EscrowHold::find_by_id(conn, hold_id)?
        .ok_or(TradeError::NotFound("escrow hold"))?;

    if buyer_amount < 0 || buyer_amount > hold.amount {
        return Err(TradeError::Validation(format!(
            "split amount {buyer_amount} outside held amount {}",
            hold.amount
        )));
    }

    if !EscrowHold::try_mark_released(conn, hold_id, buyer_id)? {
        return Err(TradeError::InvalidState(
            "escrow hold already released".to_string(),
        ));
    }

    let seller_amount = hold.amount - buyer_amount;
    if buyer_amount > 0 {
        Balance::credit(conn, buyer_id, &hold.asset, buyer_amount)?;
    }
    if seller_amount > 0 {
        Balance::credit(conn, seller_id, &hold.asset, seller_amount)?;
    }

    info!(
        hold_id = %hold_id,
        asset = %hold.asset,
        buyer_amount = buyer_amount,
        seller_amount = seller_amount,
        "escrow split-released"
    );
    Ok(())
}
