//! Reward accrual and distribution
//!
//! Each market emits reward tokens at an administratively set speed, split
//! between its supply side and its borrow side. Emissions accumulate into
//! per-market indices; account-level distribution prices the index delta
//! since the account's last snapshot. Claiming moves accrued credits out
//! through the reward asset's transfer primitive and is deliberately
//! decoupled from the accrual bookkeeping.

use std::collections::HashMap;
use tracing::debug;
use types::errors::NumericError;
use types::ids::{AccountId, MarketId};
use types::numeric::{div_truncate, mul_truncate, Amount, Factor};
use types::rewards::{RewardSnapshot, RewardState};

/// Tracks emission indices per market and accrued reward credits per account
#[derive(Debug, Clone, Default)]
pub struct RewardLedger {
    states: HashMap<MarketId, RewardState>,
    snapshots: HashMap<(AccountId, MarketId), RewardSnapshot>,
    accrued: HashMap<AccountId, Amount>,
}

impl RewardLedger {
    /// Create an empty reward ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a market at listing time with emissions off
    pub fn ensure_market(&mut self, market_id: &MarketId, period: u64) {
        self.states
            .entry(market_id.clone())
            .or_insert_with(|| RewardState::new(market_id.clone(), period));
    }

    /// Reward state for a market, if registered
    pub fn state(&self, market_id: &MarketId) -> Option<&RewardState> {
        self.states.get(market_id)
    }

    /// Set a market's emission speeds
    ///
    /// Callers bring the indices current first so the old speeds apply up to
    /// the change and the new speeds only after it.
    pub fn set_speeds(
        &mut self,
        market_id: &MarketId,
        supply_speed: Amount,
        borrow_speed: Amount,
    ) {
        if let Some(state) = self.states.get_mut(market_id) {
            state.supply_speed = supply_speed;
            state.borrow_speed = borrow_speed;
        }
    }

    /// Advance both distribution indices to the given period
    ///
    /// `index += speed × elapsed / total` on each side; a side with an empty
    /// total leaves its index unchanged (those emissions are simply not
    /// distributed). Idempotent within a period.
    pub fn update_indices(
        &mut self,
        market_id: &MarketId,
        total_receipts: Amount,
        total_borrows: Amount,
        period: u64,
    ) -> Result<(), NumericError> {
        let Some(state) = self.states.get_mut(market_id) else {
            return Ok(());
        };
        if period <= state.last_update_period {
            return Ok(());
        }
        let elapsed = rust_decimal::Decimal::from(period - state.last_update_period);

        if !state.supply_speed.is_zero() && !total_receipts.is_zero() {
            let emitted = mul_truncate(state.supply_speed.as_decimal(), elapsed)?;
            let delta = div_truncate(emitted, total_receipts.as_decimal())?;
            state.supply_index = Factor::try_from_decimal(
                state.supply_index.as_decimal() + delta,
            )?;
        }
        if !state.borrow_speed.is_zero() && !total_borrows.is_zero() {
            let emitted = mul_truncate(state.borrow_speed.as_decimal(), elapsed)?;
            let delta = div_truncate(emitted, total_borrows.as_decimal())?;
            state.borrow_index = Factor::try_from_decimal(
                state.borrow_index.as_decimal() + delta,
            )?;
        }
        state.last_update_period = period;
        Ok(())
    }

    /// Credit an account with its share of emissions since its last snapshot
    ///
    /// `delta = share × (current_index − snapshot_index)` on each side.
    /// Returns the total newly accrued amount. Snapshots are created before
    /// the account's first balance change lands, so initializing a missing
    /// snapshot at the current index never forfeits emissions.
    pub fn distribute(
        &mut self,
        market_id: &MarketId,
        account: AccountId,
        receipt_balance: Amount,
        effective_borrow: Amount,
    ) -> Result<Amount, NumericError> {
        let Some(state) = self.states.get(market_id) else {
            return Ok(Amount::zero());
        };
        let snapshot = self
            .snapshots
            .entry((account, market_id.clone()))
            .or_insert_with(|| RewardSnapshot::at(state));

        let supply_delta = state.supply_index.as_decimal() - snapshot.supply_index.as_decimal();
        let borrow_delta = state.borrow_index.as_decimal() - snapshot.borrow_index.as_decimal();

        let supply_share = mul_truncate(receipt_balance.as_decimal(), supply_delta)?;
        let borrow_share = mul_truncate(effective_borrow.as_decimal(), borrow_delta)?;
        let newly_accrued =
            Amount::try_from_decimal(supply_share + borrow_share)?;

        snapshot.supply_index = state.supply_index;
        snapshot.borrow_index = state.borrow_index;

        if !newly_accrued.is_zero() {
            let total = self.accrued.entry(account).or_default();
            *total = total.checked_add(newly_accrued)?;
            debug!(
                market = %market_id,
                account = %account,
                amount = %newly_accrued,
                "Rewards distributed"
            );
        }
        Ok(newly_accrued)
    }

    /// Claimable balance of an account
    pub fn accrued(&self, account: AccountId) -> Amount {
        self.accrued
            .get(&account)
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    /// Zero an account's claimable balance after a successful transfer
    pub fn settle_claim(&mut self, account: AccountId) -> Amount {
        self.accrued
            .remove(&account)
            .unwrap_or_else(Amount::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (RewardLedger, MarketId) {
        let mut ledger = RewardLedger::new();
        let market = MarketId::new("USDT");
        ledger.ensure_market(&market, 0);
        ledger.set_speeds(&market, Amount::from_u64(10), Amount::from_u64(4));
        (ledger, market)
    }

    #[test]
    fn test_index_advances_with_emissions() {
        let (mut ledger, market) = setup();

        // Two periods at 10/period over 1000 receipts: index += 0.02
        ledger
            .update_indices(&market, Amount::from_u64(1000), Amount::from_u64(200), 2)
            .unwrap();
        let state = ledger.state(&market).unwrap();
        assert_eq!(state.supply_index, Factor::from_str("1.02").unwrap());
        // Borrow side: 4 × 2 / 200 = 0.04
        assert_eq!(state.borrow_index, Factor::from_str("1.04").unwrap());
        assert_eq!(state.last_update_period, 2);
    }

    #[test]
    fn test_index_update_idempotent_within_period() {
        let (mut ledger, market) = setup();
        ledger
            .update_indices(&market, Amount::from_u64(1000), Amount::zero(), 2)
            .unwrap();
        let before = ledger.state(&market).unwrap().clone();

        ledger
            .update_indices(&market, Amount::from_u64(1000), Amount::zero(), 2)
            .unwrap();
        assert_eq!(*ledger.state(&market).unwrap(), before);
    }

    #[test]
    fn test_empty_side_skips_distribution() {
        let (mut ledger, market) = setup();
        ledger
            .update_indices(&market, Amount::zero(), Amount::zero(), 5)
            .unwrap();
        let state = ledger.state(&market).unwrap();
        // No holders, no borrowers → emissions for those periods vanish
        assert_eq!(state.supply_index, Factor::one());
        assert_eq!(state.borrow_index, Factor::one());
        assert_eq!(state.last_update_period, 5);
    }

    #[test]
    fn test_distribute_prices_index_delta() {
        let (mut ledger, market) = setup();
        let account = AccountId::new();

        // First touch creates the snapshot at the current index: no credit
        let first = ledger
            .distribute(&market, account, Amount::from_u64(500), Amount::zero())
            .unwrap();
        assert!(first.is_zero());

        // Index grows 0.02; 500 receipts earn 10
        ledger
            .update_indices(&market, Amount::from_u64(1000), Amount::zero(), 2)
            .unwrap();
        let earned = ledger
            .distribute(&market, account, Amount::from_u64(500), Amount::zero())
            .unwrap();
        assert_eq!(earned, Amount::from_u64(10));
        assert_eq!(ledger.accrued(account), Amount::from_u64(10));

        // Same index again: nothing further
        let again = ledger
            .distribute(&market, account, Amount::from_u64(500), Amount::zero())
            .unwrap();
        assert!(again.is_zero());
    }

    #[test]
    fn test_distribute_borrow_side() {
        let (mut ledger, market) = setup();
        let account = AccountId::new();
        ledger
            .distribute(&market, account, Amount::zero(), Amount::from_u64(100))
            .unwrap();

        // Borrow index: 4 × 5 / 200 = 0.1; 100 borrowed earns 10
        ledger
            .update_indices(&market, Amount::from_u64(1000), Amount::from_u64(200), 5)
            .unwrap();
        let earned = ledger
            .distribute(&market, account, Amount::zero(), Amount::from_u64(100))
            .unwrap();
        assert_eq!(earned, Amount::from_u64(10));
    }

    #[test]
    fn test_settle_claim_zeroes_balance() {
        let (mut ledger, market) = setup();
        let account = AccountId::new();
        ledger
            .distribute(&market, account, Amount::from_u64(500), Amount::zero())
            .unwrap();
        ledger
            .update_indices(&market, Amount::from_u64(1000), Amount::zero(), 2)
            .unwrap();
        ledger
            .distribute(&market, account, Amount::from_u64(500), Amount::zero())
            .unwrap();

        let settled = ledger.settle_claim(account);
        assert_eq!(settled, Amount::from_u64(10));
        assert!(ledger.accrued(account).is_zero());
    }

    #[test]
    fn test_unregistered_market_is_inert() {
        let mut ledger = RewardLedger::new();
        let ghost = MarketId::new("GHOST");
        ledger
            .update_indices(&ghost, Amount::from_u64(10), Amount::zero(), 3)
            .unwrap();
        let earned = ledger
            .distribute(&ghost, AccountId::new(), Amount::from_u64(10), Amount::zero())
            .unwrap();
        assert!(earned.is_zero());
        assert!(ledger.state(&ghost).is_none());
    }
}
