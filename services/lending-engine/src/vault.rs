//! Asset transfer seam
//!
//! Underlying and reward tokens move through a narrow balance-transfer
//! contract. The engine validates and computes first, performs the single
//! external transfer, and only then commits its own ledger, so a rejected
//! transfer leaves no internal state behind.

use std::collections::HashMap;
use types::errors::MarketError;
use types::ids::{AccountId, MarketId};
use types::numeric::Amount;

/// Balance-transfer primitive the engine drives for underlying and reward
/// assets
pub trait AssetLedger {
    /// Move `amount` of `asset` from one holder to another
    ///
    /// Fails with `TransferFailed` if the sender's balance is short or the
    /// transfer is otherwise rejected; the engine treats any failure as a
    /// full abort of the surrounding operation.
    fn transfer_from(
        &mut self,
        asset: &MarketId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), MarketError>;

    /// Current balance of a holder
    fn balance_of(&self, asset: &MarketId, holder: AccountId) -> Amount;
}

/// In-memory asset ledger keyed by (asset, holder)
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetLedger {
    balances: HashMap<(MarketId, AccountId), Amount>,
}

impl InMemoryAssetLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a holder out of thin air (test and genesis bootstrap)
    pub fn credit(&mut self, asset: MarketId, holder: AccountId, amount: Amount) {
        let balance = self.balances.entry((asset, holder)).or_default();
        *balance = balance
            .checked_add(amount)
            .expect("bootstrap credit overflow");
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn transfer_from(
        &mut self,
        asset: &MarketId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        if amount.is_zero() {
            return Ok(());
        }
        let sender_balance = self.balance_of(asset, from);
        let remaining =
            sender_balance
                .checked_sub(amount)
                .map_err(|_| MarketError::TransferFailed {
                    reason: format!(
                        "insufficient {} balance: requested {}, held {}",
                        asset, amount, sender_balance
                    ),
                })?;
        let received = self
            .balance_of(asset, to)
            .checked_add(amount)
            .map_err(|_| MarketError::TransferFailed {
                reason: format!("receiver balance overflow for {}", asset),
            })?;

        self.balances.insert((asset.clone(), from), remaining);
        self.balances.insert((asset.clone(), to), received);
        Ok(())
    }

    fn balance_of(&self, asset: &MarketId, holder: AccountId) -> Amount {
        self.balances
            .get(&(asset.clone(), holder))
            .copied()
            .unwrap_or_else(Amount::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_transfer() {
        let mut ledger = InMemoryAssetLedger::new();
        let asset = MarketId::new("USDT");
        let alice = AccountId::new();
        let bob = AccountId::new();

        ledger.credit(asset.clone(), alice, Amount::from_u64(100));
        ledger
            .transfer_from(&asset, alice, bob, Amount::from_u64(40))
            .unwrap();

        assert_eq!(ledger.balance_of(&asset, alice), Amount::from_u64(60));
        assert_eq!(ledger.balance_of(&asset, bob), Amount::from_u64(40));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = InMemoryAssetLedger::new();
        let asset = MarketId::new("USDT");
        let alice = AccountId::new();
        let bob = AccountId::new();

        ledger.credit(asset.clone(), alice, Amount::from_u64(10));
        let result = ledger.transfer_from(&asset, alice, bob, Amount::from_u64(11));
        assert!(matches!(result, Err(MarketError::TransferFailed { .. })));

        // Nothing moved
        assert_eq!(ledger.balance_of(&asset, alice), Amount::from_u64(10));
        assert_eq!(ledger.balance_of(&asset, bob), Amount::zero());
    }

    #[test]
    fn test_zero_transfer_is_noop() {
        let mut ledger = InMemoryAssetLedger::new();
        let asset = MarketId::new("DAI");
        let alice = AccountId::new();
        let bob = AccountId::new();

        ledger
            .transfer_from(&asset, alice, bob, Amount::zero())
            .unwrap();
        assert_eq!(ledger.balance_of(&asset, bob), Amount::zero());
    }

    #[test]
    fn test_balances_are_per_asset() {
        let mut ledger = InMemoryAssetLedger::new();
        let alice = AccountId::new();
        ledger.credit(MarketId::new("USDT"), alice, Amount::from_u64(5));
        assert_eq!(
            ledger.balance_of(&MarketId::new("DAI"), alice),
            Amount::zero()
        );
    }
}
