//! DAO treasury deposits

use portal_common::Amount;
use portal_governance::Dao;
use tracing::info;

use crate::{EconomicError, Result};

/// Credit `amount` of externally received funds to the DAO treasury; returns
/// the new balance
pub fn deposit_treasury(dao: &mut Dao, amount: Amount) -> Result<Amount> {
    if amount.is_zero() {
        return Err(EconomicError::InvalidAmount(
            "deposit must be positive".to_string(),
        ));
    }
    let balance = dao
        .treasury_balance
        .checked_add(amount)
        .ok_or_else(|| EconomicError::InvalidAmount("treasury balance overflows".to_string()))?;
    dao.treasury_balance = balance;
    info!("DAO {} treasury received {} (balance {})", dao.id, amount, balance);
    Ok(balance)
}

/// Move `amount` from the treasury into escrow
pub(crate) fn escrow(dao: &mut Dao, amount: Amount) -> Result<()> {
    dao.treasury_balance = dao.treasury_balance.checked_sub(amount).ok_or(
        EconomicError::InsufficientTreasury {
            requested: amount,
            available: dao.treasury_balance,
        },
    )?;
    Ok(())
}

/// Return escrowed funds to the treasury
pub(crate) fn refund(dao: &mut Dao, amount: Amount) -> Result<()> {
    dao.treasury_balance = dao
        .treasury_balance
        .checked_add(amount)
        .ok_or_else(|| EconomicError::InvalidAmount("treasury balance overflows".to_string()))?;
    Ok(())
}
