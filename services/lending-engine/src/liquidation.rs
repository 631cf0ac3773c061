//! Liquidation settlement calculations
//!
//! Deterministic bounds and seize amounts for liquidating undercollateralized
//! borrowers. A liquidation repays part of the borrower's debt and seizes
//! receipt tokens from one of the borrower's collateral markets, paying the
//! liquidator a configured bonus over the repaid value.

use serde::{Deserialize, Serialize};
use types::errors::NumericError;
use types::numeric::{div_truncate, mul_truncate, Amount, Factor, Price};
use types::risk::AccountLiquidity;

/// Borrower solvency classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorrowerHealth {
    /// No shortfall; liquidation is refused
    Solvent,
    /// Borrow value exceeds discounted collateral; liquidation-eligible
    Shortfall,
}

/// Classify a borrower from its aggregated liquidity
pub fn classify(liquidity: &AccountLiquidity) -> BorrowerHealth {
    if liquidity.is_solvent() {
        BorrowerHealth::Solvent
    } else {
        BorrowerHealth::Shortfall
    }
}

/// Maximum debt repayable in a single liquidation call
///
/// `max_repay = effective_borrow × close_factor`
pub fn max_repay(effective_borrow: Amount, close_factor: Factor) -> Result<Amount, NumericError> {
    Amount::try_from_decimal(mul_truncate(
        effective_borrow.as_decimal(),
        close_factor.as_decimal(),
    )?)
}

/// Receipt tokens seized from the borrower for a given repay amount
///
/// `seize = repay × incentive × price_borrowed / price_collateral / exchange_rate`
///
/// The liquidator receives receipt tokens worth the repaid value plus the
/// incentive bonus, denominated in the seized market's receipt units.
/// Truncation applies at every step, never rounding in the liquidator's
/// favor.
pub fn seize_receipts(
    repay: Amount,
    incentive: Factor,
    price_borrowed: Price,
    price_collateral: Price,
    exchange_rate: Factor,
) -> Result<Amount, NumericError> {
    let with_bonus = mul_truncate(repay.as_decimal(), incentive.as_decimal())?;
    let repaid_value = mul_truncate(with_bonus, price_borrowed.as_decimal())?;
    let collateral_units = div_truncate(repaid_value, price_collateral.as_decimal())?;
    let receipts = div_truncate(collateral_units, exchange_rate.as_decimal())?;
    Amount::try_from_decimal(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn factor(s: &str) -> Factor {
        Factor::from_str(s).unwrap()
    }

    #[test]
    fn test_classify() {
        let solvent = AccountLiquidity::from_totals(Decimal::from(100), Decimal::from(50));
        assert_eq!(classify(&solvent), BorrowerHealth::Solvent);

        let broke = AccountLiquidity::from_totals(Decimal::from(50), Decimal::from(100));
        assert_eq!(classify(&broke), BorrowerHealth::Shortfall);
    }

    #[test]
    fn test_max_repay() {
        // 500 debt at close factor 0.5 → at most 250 per call
        let max = max_repay(Amount::from_u64(500), factor("0.5")).unwrap();
        assert_eq!(max, Amount::from_u64(250));
    }

    #[test]
    fn test_seize_receipts_equal_prices() {
        // repay 50, incentive 1.08, equal prices, rate 1 → 54 receipts
        let seized = seize_receipts(
            Amount::from_u64(50),
            factor("1.08"),
            Price::from_u64(1),
            Price::from_u64(1),
            Factor::one(),
        )
        .unwrap();
        assert_eq!(seized, Amount::from_str("54").unwrap());
    }

    #[test]
    fn test_seize_receipts_cross_price() {
        // repay 50 of a $1 asset against $2 collateral at rate 1:
        // 50 × 1.08 × 1 / 2 / 1 = 27 receipts
        let seized = seize_receipts(
            Amount::from_u64(50),
            factor("1.08"),
            Price::from_u64(1),
            Price::from_u64(2),
            Factor::one(),
        )
        .unwrap();
        assert_eq!(seized, Amount::from_u64(27));
    }

    #[test]
    fn test_seize_receipts_exchange_rate_divides() {
        // Same repaid value, but each receipt is worth 1.25 underlying:
        // 54 / 1.25 = 43.2 receipts
        let seized = seize_receipts(
            Amount::from_u64(50),
            factor("1.08"),
            Price::from_u64(1),
            Price::from_u64(1),
            factor("1.25"),
        )
        .unwrap();
        assert_eq!(seized, Amount::from_str("43.2").unwrap());
    }

    #[test]
    fn test_seize_scales_with_repay() {
        let small = seize_receipts(
            Amount::from_u64(10),
            factor("1.08"),
            Price::from_u64(1),
            Price::from_u64(1),
            Factor::one(),
        )
        .unwrap();
        let large = seize_receipts(
            Amount::from_u64(100),
            factor("1.08"),
            Price::from_u64(1),
            Price::from_u64(1),
            Factor::one(),
        )
        .unwrap();
        assert!(large > small);
    }
}
