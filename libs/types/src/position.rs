//! Per-account, per-market ledger positions
//!
//! One record per (account, market): the account's receipt-token claim on
//! the market's pool, its borrow principal, and the borrow-index snapshot
//! taken at the last borrow interaction.

use crate::ids::{AccountId, MarketId};
use crate::numeric::{div_truncate, mul_truncate, Amount, Factor};
use crate::errors::NumericError;
use serde::{Deserialize, Serialize};

/// An account's ledger entry in a single market
///
/// Created lazily on the account's first interaction with the market and
/// never destroyed; balances may decay to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub account_id: AccountId,
    pub market_id: MarketId,
    /// Receipt tokens held: a claim on underlying at the market exchange rate
    pub receipt_balance: Amount,
    /// Borrow principal at the time of the last borrow interaction
    pub borrow_principal: Amount,
    /// Market borrow index captured at the last borrow interaction
    pub borrow_index_snapshot: Factor,
    /// Whether this market counts toward the account's collateral set
    pub membership: bool,
    pub updated_at_period: u64,
    pub version: u64,
}

impl AccountPosition {
    /// Create an empty position
    pub fn new(account_id: AccountId, market_id: MarketId, period: u64) -> Self {
        Self {
            account_id,
            market_id,
            receipt_balance: Amount::zero(),
            borrow_principal: Amount::zero(),
            borrow_index_snapshot: Factor::zero(),
            membership: false,
            updated_at_period: period,
            version: 0,
        }
    }

    /// Borrow balance including interest accrued since the last interaction
    ///
    /// `effective_borrow = borrow_principal × current_index / index_snapshot`
    ///
    /// Monotonically non-decreasing between interactions absent a repay.
    pub fn effective_borrow(&self, current_index: Factor) -> Result<Amount, NumericError> {
        if self.borrow_principal.is_zero() {
            return Ok(Amount::zero());
        }
        let scaled = mul_truncate(
            self.borrow_principal.as_decimal(),
            current_index.as_decimal(),
        )?;
        let adjusted = div_truncate(scaled, self.borrow_index_snapshot.as_decimal())?;
        Amount::try_from_decimal(adjusted)
    }

    /// True if the position carries no balances at all
    pub fn is_empty(&self) -> bool {
        self.receipt_balance.is_zero() && self.borrow_principal.is_zero()
    }

    /// Stamp a mutation
    pub fn touch(&mut self, period: u64) {
        self.updated_at_period = period;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_position() -> AccountPosition {
        AccountPosition::new(AccountId::new(), MarketId::new("USDT"), 0)
    }

    #[test]
    fn test_new_position_is_empty() {
        let position = make_position();
        assert!(position.is_empty());
        assert!(!position.membership);
        assert_eq!(position.version, 0);
    }

    #[test]
    fn test_effective_borrow_zero_principal() {
        let position = make_position();
        let borrow = position.effective_borrow(Factor::from_str("1.5").unwrap());
        assert_eq!(borrow.unwrap(), Amount::zero());
    }

    #[test]
    fn test_effective_borrow_tracks_index() {
        let mut position = make_position();
        position.borrow_principal = Amount::from_u64(100);
        position.borrow_index_snapshot = Factor::one();

        // Index grew 10% since the snapshot → debt grew 10%
        let borrow = position
            .effective_borrow(Factor::from_str("1.1").unwrap())
            .unwrap();
        assert_eq!(borrow, Amount::from_u64(110));
    }

    #[test]
    fn test_effective_borrow_unchanged_at_snapshot_index() {
        let mut position = make_position();
        position.borrow_principal = Amount::from_u64(250);
        position.borrow_index_snapshot = Factor::from_str("1.25").unwrap();

        let borrow = position
            .effective_borrow(Factor::from_str("1.25").unwrap())
            .unwrap();
        assert_eq!(borrow, Amount::from_u64(250));
    }

    #[test]
    fn test_effective_borrow_monotone_in_index() {
        let mut position = make_position();
        position.borrow_principal = Amount::from_u64(100);
        position.borrow_index_snapshot = Factor::one();

        let at_one = position.effective_borrow(Factor::one()).unwrap();
        let later = position
            .effective_borrow(Factor::from_str("1.000001").unwrap())
            .unwrap();
        assert!(later >= at_one);
    }

    #[test]
    fn test_touch_bumps_version() {
        let mut position = make_position();
        position.touch(5);
        assert_eq!(position.updated_at_period, 5);
        assert_eq!(position.version, 1);
    }

    #[test]
    fn test_position_serialization() {
        let position = make_position();
        let json = serde_json::to_string(&position).unwrap();
        let deserialized: AccountPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(position, deserialized);
    }
}
