//! Cross-market risk computation
//!
//! Values every entered market's collateral and borrows through the price
//! oracle and nets them into a single account liquidity figure. A
//! hypothetical pending change (redeem or borrow) can be folded in so
//! operations pre-flight their solvency check before mutating anything.

use rust_decimal::Decimal;
use std::collections::HashMap;
use types::errors::{EngineError, NumericError, RiskError};
use types::ids::MarketId;
use types::numeric::{mul_truncate, Factor};
use types::position::AccountPosition;
use types::risk::{AccountLiquidity, HypotheticalChange};

use crate::market::Market;
use crate::oracle::PriceOracle;

/// Aggregate an account's liquidity across its entered markets
///
/// For each market the account is a member of:
/// `collateral += receipts × exchange_rate × price × collateral_factor`
/// `borrows    += effective_borrow × price`
///
/// The optional hypothetical change counts a pending redeem or borrow on
/// the borrow side, exactly as if it had already happened. Only member
/// markets are priced, so a broken feed for an unrelated asset cannot
/// block the account.
pub fn account_liquidity<'a>(
    markets: &HashMap<MarketId, Market>,
    positions: impl Iterator<Item = &'a AccountPosition>,
    oracle: &dyn PriceOracle,
    hypothetical: Option<&HypotheticalChange>,
) -> Result<AccountLiquidity, EngineError> {
    let mut collateral_value = Decimal::ZERO;
    let mut borrow_value = Decimal::ZERO;

    for position in positions {
        if !position.membership {
            continue;
        }
        let market =
            markets
                .get(&position.market_id)
                .ok_or_else(|| RiskError::MarketNotListed {
                    market_id: position.market_id.to_string(),
                })?;
        let exchange_rate = market.exchange_rate()?;
        let price = oracle.get_price(&market.market_id)?;

        // Value of one receipt token, discounted by the collateral factor
        let receipt_value = mul_truncate(exchange_rate.as_decimal(), price.as_decimal())?;
        let discounted = mul_truncate(
            receipt_value,
            market.risk.collateral_factor.as_decimal(),
        )?;

        collateral_value = collateral_value
            .checked_add(mul_truncate(
                position.receipt_balance.as_decimal(),
                discounted,
            )?)
            .ok_or(NumericError::Overflow)?;

        let effective_borrow = position.effective_borrow(market.borrow_index)?;
        borrow_value = borrow_value
            .checked_add(mul_truncate(
                effective_borrow.as_decimal(),
                price.as_decimal(),
            )?)
            .ok_or(NumericError::Overflow)?;

        if let Some(change) = hypothetical {
            if change.market_id == position.market_id {
                // A pending redeem removes discounted collateral; a pending
                // borrow adds debt. Both land on the borrow side.
                borrow_value = borrow_value
                    .checked_add(mul_truncate(
                        change.redeem_receipts.as_decimal(),
                        discounted,
                    )?)
                    .ok_or(NumericError::Overflow)?;
                borrow_value = borrow_value
                    .checked_add(mul_truncate(
                        change.borrow_amount.as_decimal(),
                        price.as_decimal(),
                    )?)
                    .ok_or(NumericError::Overflow)?;
            }
        }
    }

    Ok(AccountLiquidity::from_totals(collateral_value, borrow_value))
}

/// Collateral factors must stay strictly below one
pub fn validate_collateral_factor(factor: Factor) -> Result<(), RiskError> {
    if factor.as_decimal() >= Decimal::ONE {
        return Err(RiskError::InvalidParameter {
            name: "collateral_factor".to_string(),
            value: factor.to_string(),
        });
    }
    Ok(())
}

/// Close factors must lie in (0, 1]
pub fn validate_close_factor(factor: Factor) -> Result<(), RiskError> {
    let f = factor.as_decimal();
    if f <= Decimal::ZERO || f > Decimal::ONE {
        return Err(RiskError::InvalidParameter {
            name: "close_factor".to_string(),
            value: factor.to_string(),
        });
    }
    Ok(())
}

/// Liquidation incentive must be at least one
pub fn validate_liquidation_incentive(factor: Factor) -> Result<(), RiskError> {
    if factor.as_decimal() < Decimal::ONE {
        return Err(RiskError::InvalidParameter {
            name: "liquidation_incentive".to_string(),
            value: factor.to_string(),
        });
    }
    Ok(())
}

/// Reserve factors must not exceed one
pub fn validate_reserve_factor(factor: Factor) -> Result<(), RiskError> {
    if factor.as_decimal() > Decimal::ONE {
        return Err(RiskError::InvalidParameter {
            name: "reserve_factor".to_string(),
            value: factor.to_string(),
        });
    }
    Ok(())
}
