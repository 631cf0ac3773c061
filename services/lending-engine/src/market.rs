//! Market ledger and interest accrual
//!
//! One `Market` per underlying asset: receipt-token supply, pooled cash,
//! outstanding borrows, reserves, and the cumulative borrow index. Every
//! operation on a market brings interest current first; accrual is
//! idempotent within a single period so consecutive operations never
//! double-compound.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::errors::{EngineError, MarketError, NumericError, RiskError};
use types::ids::MarketId;
use types::numeric::{div_truncate, mul_truncate, Amount, Factor, SCALE};
use types::risk::RiskParameters;

use crate::rates::InterestRateModel;

/// Configuration for listing a new market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub market_id: MarketId,
    pub underlying_decimals: u32,
    /// Exchange rate used until the first receipts are minted; fixed at
    /// listing time, never implicit
    pub initial_exchange_rate: Factor,
    /// Fraction of accrued interest retained as reserves, in [0, 1]
    pub reserve_factor: Factor,
    /// Fraction of collateral value counted toward borrowing power, in [0, 1)
    pub collateral_factor: Factor,
    pub rate_model: InterestRateModel,
}

impl MarketConfig {
    /// Validate all listing parameters
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.initial_exchange_rate.is_zero() {
            return Err(RiskError::InvalidParameter {
                name: "initial_exchange_rate".to_string(),
                value: self.initial_exchange_rate.to_string(),
            });
        }
        if self.reserve_factor.as_decimal() > Decimal::ONE {
            return Err(RiskError::InvalidParameter {
                name: "reserve_factor".to_string(),
                value: self.reserve_factor.to_string(),
            });
        }
        if self.collateral_factor.as_decimal() >= Decimal::ONE {
            return Err(RiskError::InvalidParameter {
                name: "collateral_factor".to_string(),
                value: self.collateral_factor.to_string(),
            });
        }
        self.rate_model.validate()
    }
}

/// Summary of one interest accrual, for events and reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestAccrual {
    pub elapsed_periods: u64,
    pub borrow_rate: Factor,
    pub interest_accumulated: Amount,
    pub reserves_added: Amount,
    pub borrow_index: Factor,
}

/// A single lending market's ledger
///
/// Invariant at every quiescent point:
/// `total_receipts × exchange_rate == total_cash + total_borrows − total_reserves`
/// within one unit of rounding error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub market_id: MarketId,
    pub underlying_decimals: u32,
    /// Receipt tokens outstanding
    pub total_receipts: Amount,
    /// Underlying held by the pool
    pub total_cash: Amount,
    /// Outstanding borrows, principal plus accrued interest
    pub total_borrows: Amount,
    /// Interest retained for the protocol
    pub total_reserves: Amount,
    /// Cumulative interest multiplier since listing
    pub borrow_index: Factor,
    /// Last period interest was applied
    pub accrual_period: u64,
    pub reserve_factor: Factor,
    pub initial_exchange_rate: Factor,
    pub rate_model: InterestRateModel,
    pub risk: RiskParameters,
    pub version: u64,
}

impl Market {
    /// Create a market from a validated listing configuration
    pub fn new(config: MarketConfig, period: u64) -> Result<Self, RiskError> {
        config.validate()?;
        Ok(Self {
            market_id: config.market_id,
            underlying_decimals: config.underlying_decimals,
            total_receipts: Amount::zero(),
            total_cash: Amount::zero(),
            total_borrows: Amount::zero(),
            total_reserves: Amount::zero(),
            borrow_index: Factor::one(),
            accrual_period: period,
            reserve_factor: config.reserve_factor,
            initial_exchange_rate: config.initial_exchange_rate,
            rate_model: config.rate_model,
            risk: RiskParameters::new(config.collateral_factor),
            version: 0,
        })
    }

    /// Apply interest for the periods elapsed since the last checkpoint
    ///
    /// No-op when called again within the same period, so several
    /// operations in one period compound interest exactly once. Returns the
    /// accrual summary, or `None` if the checkpoint was already current.
    pub fn accrue_interest(
        &mut self,
        current_period: u64,
    ) -> Result<Option<InterestAccrual>, EngineError> {
        if current_period == self.accrual_period {
            return Ok(None);
        }
        if current_period < self.accrual_period {
            return Err(MarketError::NonMonotonicPeriod {
                last: self.accrual_period,
                received: current_period,
            }
            .into());
        }

        let elapsed = current_period - self.accrual_period;
        let borrow_rate =
            self.rate_model
                .borrow_rate(self.total_cash, self.total_borrows, self.total_reserves)?;

        // Simple interest over the elapsed window
        let interest_factor =
            mul_truncate(borrow_rate.as_decimal(), Decimal::from(elapsed))?;
        let interest = Amount::try_from_decimal(mul_truncate(
            self.total_borrows.as_decimal(),
            interest_factor,
        )?)?;
        let reserves_added = Amount::try_from_decimal(mul_truncate(
            interest.as_decimal(),
            self.reserve_factor.as_decimal(),
        )?)?;
        let new_index = Factor::try_from_decimal(mul_truncate(
            self.borrow_index.as_decimal(),
            Decimal::ONE + interest_factor,
        )?)?;

        self.total_borrows = self.total_borrows.checked_add(interest)?;
        self.total_reserves = self.total_reserves.checked_add(reserves_added)?;
        self.borrow_index = new_index;
        self.accrual_period = current_period;
        self.version += 1;

        debug!(
            market = %self.market_id,
            elapsed,
            borrow_rate = %borrow_rate,
            interest = %interest,
            borrow_index = %new_index,
            "Interest accrued"
        );

        Ok(Some(InterestAccrual {
            elapsed_periods: elapsed,
            borrow_rate,
            interest_accumulated: interest,
            reserves_added,
            borrow_index: new_index,
        }))
    }

    /// Underlying-per-receipt conversion factor
    ///
    /// Returns the configured bootstrap rate while no receipts exist, then
    /// `(total_cash + total_borrows − total_reserves) / total_receipts`.
    pub fn exchange_rate(&self) -> Result<Factor, NumericError> {
        if self.total_receipts.is_zero() {
            return Ok(self.initial_exchange_rate);
        }
        let pool_value = self
            .total_cash
            .as_decimal()
            .checked_add(self.total_borrows.as_decimal())
            .ok_or(NumericError::Overflow)?
            .checked_sub(self.total_reserves.as_decimal())
            .ok_or(NumericError::Underflow)?;
        if pool_value < Decimal::ZERO {
            return Err(NumericError::Underflow);
        }
        Factor::try_from_decimal(div_truncate(pool_value, self.total_receipts.as_decimal())?)
    }

    /// Current utilization of the pool
    pub fn utilization(&self) -> Result<Factor, NumericError> {
        InterestRateModel::utilization(self.total_cash, self.total_borrows)
    }

    /// Current per-period borrow rate
    pub fn borrow_rate_per_period(&self) -> Result<Factor, NumericError> {
        self.rate_model
            .borrow_rate(self.total_cash, self.total_borrows, self.total_reserves)
    }

    /// Current per-period supply rate
    pub fn supply_rate_per_period(&self) -> Result<Factor, NumericError> {
        self.rate_model.supply_rate(
            self.total_cash,
            self.total_borrows,
            self.total_reserves,
            self.reserve_factor,
        )
    }

    /// Check the pool-value invariant within rounding tolerance
    ///
    /// The exchange rate truncates at [`SCALE`] places, so the receipt-side
    /// product may undershoot the pool value by up to one rounding unit per
    /// receipt token.
    pub fn check_invariant(&self) -> bool {
        if self.total_receipts.is_zero() {
            return true;
        }
        let Ok(rate) = self.exchange_rate() else {
            return false;
        };
        let receipt_value = self.total_receipts.as_decimal() * rate.as_decimal();
        let pool_value = self.total_cash.as_decimal() + self.total_borrows.as_decimal()
            - self.total_reserves.as_decimal();
        let tolerance =
            self.total_receipts.as_decimal() * Decimal::new(1, SCALE) + Decimal::new(1, SCALE);
        (receipt_value - pool_value).abs() <= tolerance
    }

    /// Stamp a ledger mutation
    pub fn touch(&mut self) {
        self.version += 1;
    }
}
