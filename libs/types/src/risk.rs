//! Risk parameters and account liquidity types

use crate::ids::MarketId;
use crate::numeric::{Amount, Factor};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-market risk parameters, owned by the risk engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Fraction of collateral value counted toward borrowing power, in [0, 1)
    pub collateral_factor: Factor,
    /// Delisted markets refuse new mints and borrows but keep exit paths open
    pub is_listed: bool,
}

impl RiskParameters {
    /// Create parameters for a freshly listed market
    pub fn new(collateral_factor: Factor) -> Self {
        Self {
            collateral_factor,
            is_listed: true,
        }
    }
}

/// Aggregated account solvency across all entered markets
///
/// At most one side is nonzero: an account has either spare borrowing
/// capacity or a shortfall, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLiquidity {
    /// Collateral value in excess of borrows (borrowing capacity left)
    pub excess: Amount,
    /// Borrow value in excess of collateral (liquidation-eligible)
    pub shortfall: Amount,
}

impl AccountLiquidity {
    /// Build from summed collateral and borrow values
    pub fn from_totals(collateral_value: Decimal, borrow_value: Decimal) -> Self {
        if collateral_value >= borrow_value {
            Self {
                excess: Amount::try_new(collateral_value - borrow_value)
                    .unwrap_or_else(Amount::zero),
                shortfall: Amount::zero(),
            }
        } else {
            Self {
                excess: Amount::zero(),
                shortfall: Amount::try_new(borrow_value - collateral_value)
                    .unwrap_or_else(Amount::zero),
            }
        }
    }

    /// True if the account has no shortfall
    pub fn is_solvent(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// A pending balance change evaluated against account liquidity before it
/// is applied, supporting pre-flight solvency checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypotheticalChange {
    pub market_id: MarketId,
    /// Receipt tokens the account intends to redeem
    pub redeem_receipts: Amount,
    /// Underlying the account intends to borrow
    pub borrow_amount: Amount,
}

impl HypotheticalChange {
    /// A pending redeem of receipt tokens
    pub fn redeem(market_id: MarketId, receipts: Amount) -> Self {
        Self {
            market_id,
            redeem_receipts: receipts,
            borrow_amount: Amount::zero(),
        }
    }

    /// A pending borrow of underlying
    pub fn borrow(market_id: MarketId, amount: Amount) -> Self {
        Self {
            market_id,
            redeem_receipts: Amount::zero(),
            borrow_amount: amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquidity_excess_side() {
        let liquidity = AccountLiquidity::from_totals(Decimal::from(750), Decimal::from(200));
        assert_eq!(liquidity.excess, Amount::from_u64(550));
        assert!(liquidity.shortfall.is_zero());
        assert!(liquidity.is_solvent());
    }

    #[test]
    fn test_liquidity_shortfall_side() {
        let liquidity = AccountLiquidity::from_totals(Decimal::from(300), Decimal::from(450));
        assert!(liquidity.excess.is_zero());
        assert_eq!(liquidity.shortfall, Amount::from_u64(150));
        assert!(!liquidity.is_solvent());
    }

    #[test]
    fn test_liquidity_exact_balance() {
        let liquidity = AccountLiquidity::from_totals(Decimal::from(500), Decimal::from(500));
        assert!(liquidity.excess.is_zero());
        assert!(liquidity.shortfall.is_zero());
        assert!(liquidity.is_solvent());
    }

    #[test]
    fn test_hypothetical_constructors() {
        let market = MarketId::new("DAI");
        let redeem = HypotheticalChange::redeem(market.clone(), Amount::from_u64(10));
        assert_eq!(redeem.redeem_receipts, Amount::from_u64(10));
        assert!(redeem.borrow_amount.is_zero());

        let borrow = HypotheticalChange::borrow(market, Amount::from_u64(25));
        assert!(borrow.redeem_receipts.is_zero());
        assert_eq!(borrow.borrow_amount, Amount::from_u64(25));
    }
}
