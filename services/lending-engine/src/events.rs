//! Engine event definitions
//!
//! Every state-changing operation emits typed, serializable events so a host
//! can monitor, index, or replay engine activity.

use serde::{Deserialize, Serialize};
use types::ids::{AccountId, MarketId};
use types::numeric::{Amount, Factor};
use uuid::Uuid;

/// An event emitted by the lending engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingEvent {
    pub event_id: Uuid,
    /// Period in which the event occurred
    pub period: u64,
    pub kind: LendingEventKind,
}

/// Event classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LendingEventKind {
    /// Interest was applied to a market's borrows
    InterestAccrued {
        market_id: MarketId,
        interest_accumulated: Amount,
        borrow_index: Factor,
    },
    /// A market was listed
    MarketListed { market_id: MarketId },
    /// A market was delisted; exit paths remain open
    MarketDelisted { market_id: MarketId },
    /// An account entered a market's collateral set
    MarketEntered {
        market_id: MarketId,
        account_id: AccountId,
    },
    /// Underlying deposited for receipt tokens
    Minted {
        market_id: MarketId,
        minter: AccountId,
        amount: Amount,
        receipts_issued: Amount,
    },
    /// Receipt tokens redeemed for underlying
    Redeemed {
        market_id: MarketId,
        redeemer: AccountId,
        receipts_burned: Amount,
        amount: Amount,
    },
    /// Underlying borrowed against collateral
    Borrowed {
        market_id: MarketId,
        borrower: AccountId,
        amount: Amount,
        total_borrows: Amount,
    },
    /// Debt repaid, possibly by a third party
    Repaid {
        market_id: MarketId,
        payer: AccountId,
        borrower: AccountId,
        amount: Amount,
        remaining_debt: Amount,
    },
    /// A shortfall borrower was partially liquidated
    Liquidated {
        borrowed_market: MarketId,
        collateral_market: MarketId,
        liquidator: AccountId,
        borrower: AccountId,
        amount_repaid: Amount,
        receipts_seized: Amount,
    },
    /// A market's reward emission speeds changed
    RewardSpeedsSet {
        market_id: MarketId,
        supply_speed: Amount,
        borrow_speed: Amount,
    },
    /// Accrued rewards paid out
    RewardsClaimed {
        account_id: AccountId,
        amount: Amount,
    },
}

impl LendingEvent {
    /// Create an event stamped with a fresh uuid-v7 id
    pub fn new(period: u64, kind: LendingEventKind) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            period,
            kind,
        }
    }
}
