//! Lending Market Engine
//!
//! Accounting and risk core for the collateralized lending market:
//! interest accrual and exchange rates, cross-market borrowing capacity,
//! liquidation settlement, and reward distribution.
//!
//! The engine executes as a strictly sequential state machine: operations
//! are totally ordered by a caller-supplied period counter, and each
//! operation either completes all of its state mutations and external
//! transfers or none of them.

pub mod rates;
pub mod market;
pub mod oracle;
pub mod vault;
pub mod risk;
pub mod liquidation;
pub mod rewards;
pub mod events;
pub mod engine;
