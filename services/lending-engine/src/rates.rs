//! Interest rate models
//!
//! Pure, deterministic per-period rate curves over market utilization.
//! Two variants: a linear ("white paper") curve, and a kinked ("jump rate")
//! curve that steepens sharply once utilization passes the kink, creating a
//! strong incentive to repay when the pool runs hot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::errors::{NumericError, RiskError};
use types::numeric::{div_truncate, mul_truncate, Amount, Factor};

/// Per-period interest rate curve for one market
///
/// Both variants are monotonic non-decreasing in utilization by
/// construction; parameters are validated when the market is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterestRateModel {
    /// Linear rate: `base + multiplier × utilization`
    WhitePaper { base: Factor, multiplier: Factor },
    /// Linear below the kink, steeper slope above it:
    /// `base + multiplier × kink + jump_multiplier × (utilization − kink)`
    JumpRate {
        base: Factor,
        multiplier: Factor,
        jump_multiplier: Factor,
        kink: Factor,
    },
}

impl InterestRateModel {
    /// Fraction of pooled assets currently borrowed out
    ///
    /// `utilization = borrows / (cash + borrows)`, zero for an empty pool.
    pub fn utilization(cash: Amount, borrows: Amount) -> Result<Factor, NumericError> {
        let pool = cash
            .as_decimal()
            .checked_add(borrows.as_decimal())
            .ok_or(NumericError::Overflow)?;
        if pool.is_zero() {
            return Ok(Factor::zero());
        }
        Factor::try_from_decimal(div_truncate(borrows.as_decimal(), pool)?)
    }

    /// Per-period rate paid by borrowers at the market's current ledger state
    pub fn borrow_rate(
        &self,
        cash: Amount,
        borrows: Amount,
        _reserves: Amount,
    ) -> Result<Factor, NumericError> {
        let utilization = Self::utilization(cash, borrows)?;
        let rate = match self {
            Self::WhitePaper { base, multiplier } => base
                .as_decimal()
                .checked_add(mul_truncate(
                    multiplier.as_decimal(),
                    utilization.as_decimal(),
                )?)
                .ok_or(NumericError::Overflow)?,
            Self::JumpRate {
                base,
                multiplier,
                jump_multiplier,
                kink,
            } => {
                if utilization <= *kink {
                    base.as_decimal()
                        .checked_add(mul_truncate(
                            multiplier.as_decimal(),
                            utilization.as_decimal(),
                        )?)
                        .ok_or(NumericError::Overflow)?
                } else {
                    let normal =
                        mul_truncate(multiplier.as_decimal(), kink.as_decimal())?;
                    let excess = utilization.as_decimal() - kink.as_decimal();
                    let jump = mul_truncate(jump_multiplier.as_decimal(), excess)?;
                    base.as_decimal()
                        .checked_add(normal)
                        .and_then(|r| r.checked_add(jump))
                        .ok_or(NumericError::Overflow)?
                }
            }
        };
        Factor::try_from_decimal(rate)
    }

    /// Per-period rate earned by suppliers
    ///
    /// `supply_rate = borrow_rate × utilization × (1 − reserve_factor)`:
    /// suppliers earn only the borrower-paid interest not retained as
    /// reserves, weighted by how much of the pool is actually lent out.
    pub fn supply_rate(
        &self,
        cash: Amount,
        borrows: Amount,
        reserves: Amount,
        reserve_factor: Factor,
    ) -> Result<Factor, NumericError> {
        let borrow_rate = self.borrow_rate(cash, borrows, reserves)?;
        let utilization = Self::utilization(cash, borrows)?;
        let retained = Decimal::ONE - reserve_factor.as_decimal();
        let earned = mul_truncate(borrow_rate.as_decimal(), utilization.as_decimal())?;
        Factor::try_from_decimal(mul_truncate(earned, retained)?)
    }

    /// Validate model parameters at listing time
    pub fn validate(&self) -> Result<(), RiskError> {
        if let Self::JumpRate { kink, .. } = self {
            let k = kink.as_decimal();
            if k <= Decimal::ZERO || k > Decimal::ONE {
                return Err(RiskError::InvalidParameter {
                    name: "kink".to_string(),
                    value: kink.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Scale a per-period rate up to a yearly figure for display and reporting
pub fn annualized(rate: Factor, periods_per_year: u64) -> Result<Factor, NumericError> {
    Factor::try_from_decimal(mul_truncate(
        rate.as_decimal(),
        Decimal::from(periods_per_year),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(s: &str) -> Factor {
        Factor::from_str(s).unwrap()
    }

    fn white_paper() -> InterestRateModel {
        InterestRateModel::WhitePaper {
            base: factor("0.01"),
            multiplier: factor("0.1"),
        }
    }

    fn jump_rate() -> InterestRateModel {
        InterestRateModel::JumpRate {
            base: Factor::zero(),
            multiplier: factor("0.1"),
            jump_multiplier: factor("1.0"),
            kink: factor("0.8"),
        }
    }

    #[test]
    fn test_utilization_empty_pool() {
        let u = InterestRateModel::utilization(Amount::zero(), Amount::zero()).unwrap();
        assert_eq!(u, Factor::zero());
    }

    #[test]
    fn test_utilization_half() {
        let u = InterestRateModel::utilization(Amount::from_u64(50), Amount::from_u64(50))
            .unwrap();
        assert_eq!(u, factor("0.5"));
    }

    #[test]
    fn test_utilization_three_quarters() {
        let u = InterestRateModel::utilization(Amount::from_u64(25), Amount::from_u64(75))
            .unwrap();
        assert_eq!(u, factor("0.75"));
    }

    #[test]
    fn test_white_paper_rate() {
        // u = 0.5 → rate = 0.01 + 0.1 × 0.5 = 0.06
        let rate = white_paper()
            .borrow_rate(Amount::from_u64(50), Amount::from_u64(50), Amount::zero())
            .unwrap();
        assert_eq!(rate, factor("0.06"));
    }

    #[test]
    fn test_white_paper_rate_at_zero_utilization() {
        let rate = white_paper()
            .borrow_rate(Amount::from_u64(100), Amount::zero(), Amount::zero())
            .unwrap();
        assert_eq!(rate, factor("0.01"));
    }

    #[test]
    fn test_jump_rate_below_kink() {
        // u = 0.5 ≤ kink 0.8 → rate = 0 + 0.1 × 0.5 = 0.05
        let rate = jump_rate()
            .borrow_rate(Amount::from_u64(50), Amount::from_u64(50), Amount::zero())
            .unwrap();
        assert_eq!(rate, factor("0.05"));
    }

    #[test]
    fn test_jump_rate_at_kink_boundary() {
        // u = 0.8 exactly → still on the normal slope: 0.1 × 0.8 = 0.08
        let rate = jump_rate()
            .borrow_rate(Amount::from_u64(20), Amount::from_u64(80), Amount::zero())
            .unwrap();
        assert_eq!(rate, factor("0.08"));
    }

    #[test]
    fn test_jump_rate_above_kink() {
        // u = 0.9 → rate = 0.1 × 0.8 + 1.0 × (0.9 − 0.8) = 0.18
        let rate = jump_rate()
            .borrow_rate(Amount::from_u64(10), Amount::from_u64(90), Amount::zero())
            .unwrap();
        assert_eq!(rate, factor("0.18"));
    }

    #[test]
    fn test_supply_rate() {
        // borrow rate 0.06 at u = 0.5, reserve factor 0.1
        // supply = 0.06 × 0.5 × 0.9 = 0.027
        let rate = white_paper()
            .supply_rate(
                Amount::from_u64(50),
                Amount::from_u64(50),
                Amount::zero(),
                factor("0.1"),
            )
            .unwrap();
        assert_eq!(rate, factor("0.027"));
    }

    #[test]
    fn test_supply_rate_zero_when_nothing_borrowed() {
        let rate = white_paper()
            .supply_rate(
                Amount::from_u64(100),
                Amount::zero(),
                Amount::zero(),
                factor("0.1"),
            )
            .unwrap();
        assert_eq!(rate, Factor::zero());
    }

    #[test]
    fn test_borrow_rate_monotone_in_utilization() {
        for model in [white_paper(), jump_rate()] {
            let mut last = Factor::zero();
            for borrows in [0u64, 10, 25, 50, 75, 80, 85, 95, 100] {
                let rate = model
                    .borrow_rate(
                        Amount::from_u64(100 - borrows),
                        Amount::from_u64(borrows),
                        Amount::zero(),
                    )
                    .unwrap();
                assert!(rate >= last, "rate curve must be non-decreasing");
                last = rate;
            }
        }
    }

    #[test]
    fn test_validate_rejects_bad_kink() {
        let model = InterestRateModel::JumpRate {
            base: Factor::zero(),
            multiplier: factor("0.1"),
            jump_multiplier: factor("1.0"),
            kink: Factor::zero(),
        };
        assert!(matches!(
            model.validate(),
            Err(RiskError::InvalidParameter { .. })
        ));

        let model = InterestRateModel::JumpRate {
            base: Factor::zero(),
            multiplier: factor("0.1"),
            jump_multiplier: factor("1.0"),
            kink: factor("1.5"),
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_annualized() {
        // 0.000001 per period × 2,102,400 periods per year
        let yearly = annualized(factor("0.000001"), 2_102_400).unwrap();
        assert_eq!(yearly, factor("2.1024"));
    }
}
