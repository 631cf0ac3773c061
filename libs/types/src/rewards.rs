//! Reward distribution ledger records
//!
//! Each market carries an emission speed split between its supply side and
//! its borrow side, plus cumulative distribution indices. Accounts snapshot
//! the indices at each interaction; the delta against the snapshot prices
//! their share of the emissions since then.

use crate::ids::MarketId;
use crate::numeric::{Amount, Factor};
use serde::{Deserialize, Serialize};

/// Per-market reward emission state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardState {
    pub market_id: MarketId,
    /// Reward tokens emitted per period to suppliers
    pub supply_speed: Amount,
    /// Reward tokens emitted per period to borrowers
    pub borrow_speed: Amount,
    /// Cumulative reward per receipt token (distinct from the interest borrow index)
    pub supply_index: Factor,
    /// Cumulative reward per unit of borrows
    pub borrow_index: Factor,
    pub last_update_period: u64,
}

impl RewardState {
    /// Create reward state for a market with emissions off
    pub fn new(market_id: MarketId, period: u64) -> Self {
        Self {
            market_id,
            supply_speed: Amount::zero(),
            borrow_speed: Amount::zero(),
            supply_index: Factor::one(),
            borrow_index: Factor::one(),
            last_update_period: period,
        }
    }
}

/// Per-account index snapshots for one market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSnapshot {
    pub supply_index: Factor,
    pub borrow_index: Factor,
}

impl RewardSnapshot {
    /// Snapshot the current indices of a market
    pub fn at(state: &RewardState) -> Self {
        Self {
            supply_index: state.supply_index,
            borrow_index: state.borrow_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_has_no_emissions() {
        let state = RewardState::new(MarketId::new("USDT"), 7);
        assert!(state.supply_speed.is_zero());
        assert!(state.borrow_speed.is_zero());
        assert_eq!(state.supply_index, Factor::one());
        assert_eq!(state.borrow_index, Factor::one());
        assert_eq!(state.last_update_period, 7);
    }

    #[test]
    fn test_snapshot_captures_indices() {
        let mut state = RewardState::new(MarketId::new("DAI"), 0);
        state.supply_index = Factor::from_str("1.5").unwrap();
        state.borrow_index = Factor::from_str("2.0").unwrap();

        let snapshot = RewardSnapshot::at(&state);
        assert_eq!(snapshot.supply_index, state.supply_index);
        assert_eq!(snapshot.borrow_index, state.borrow_index);
    }

    #[test]
    fn test_state_serialization() {
        let state = RewardState::new(MarketId::new("WETH"), 3);
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: RewardState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
