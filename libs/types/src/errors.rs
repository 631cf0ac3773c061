//! Error types for the lending engine
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Liquidation error: {0}")]
    Liquidation(#[from] LiquidationError),

    #[error("Reward error: {0}")]
    Reward(#[from] RewardError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Numeric error: {0}")]
    Numeric(#[from] NumericError),
}

/// Fixed-point arithmetic errors
///
/// Any of these aborts the triggering operation: they indicate a parameter
/// or scale misconfiguration upstream, not a transient condition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericError {
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Arithmetic underflow")]
    Underflow,

    #[error("Division by zero")]
    DivisionByZero,
}

/// Market ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Insufficient cash: requested {requested}, available {available}")]
    InsufficientCash { requested: String, available: String },

    #[error("Insufficient receipt balance: requested {requested}, held {held}")]
    InsufficientReceipts { requested: String, held: String },

    #[error("Repay amount exceeds outstanding debt: requested {requested}, debt {debt}")]
    RepayExceedsDebt { requested: String, debt: String },

    #[error("Underlying transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("Non-monotonic period: last accrual at {last}, received {received}")]
    NonMonotonicPeriod { last: u64, received: u64 },
}

/// Risk engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Market not listed: {market_id}")]
    MarketNotListed { market_id: String },

    #[error("Market already listed: {market_id}")]
    AlreadyListed { market_id: String },

    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: String, value: String },

    #[error("Insufficient account liquidity: shortfall {shortfall}")]
    InsufficientLiquidity { shortfall: String },
}

/// Liquidation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiquidationError {
    #[error("Borrower is healthy, nothing to liquidate")]
    BorrowerHealthy,

    #[error("Liquidator must differ from borrower")]
    SelfLiquidation,

    #[error("Repay exceeds close factor limit: requested {requested}, max {max_repay}")]
    TooMuchRepay { requested: String, max_repay: String },

    #[error("Seize exceeds borrower collateral: required {required}, held {held}")]
    SeizeTooMuch { required: String, held: String },
}

/// Reward distribution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewardError {
    #[error("Insufficient reward pool: required {required}, available {available}")]
    InsufficientRewardPool { required: String, available: String },
}

/// Price oracle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Price unavailable for asset: {asset}")]
    PriceUnavailable { asset: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_error_display() {
        let err = MarketError::ZeroAmount;
        assert_eq!(err.to_string(), "Amount must be positive");
    }

    #[test]
    fn test_insufficient_cash_display() {
        let err = MarketError::InsufficientCash {
            requested: "100".to_string(),
            available: "40".to_string(),
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("40"));
    }

    #[test]
    fn test_engine_error_from_market_error() {
        let market_err = MarketError::ZeroAmount;
        let engine_err: EngineError = market_err.into();
        assert!(matches!(engine_err, EngineError::Market(_)));
    }

    #[test]
    fn test_engine_error_from_numeric_error() {
        let engine_err: EngineError = NumericError::Overflow.into();
        assert!(matches!(engine_err, EngineError::Numeric(NumericError::Overflow)));
    }

    #[test]
    fn test_oracle_error_display() {
        let err = OracleError::PriceUnavailable {
            asset: "DAI".to_string(),
        };
        assert_eq!(err.to_string(), "Price unavailable for asset: DAI");
    }

    #[test]
    fn test_liquidation_error_display() {
        let err = LiquidationError::BorrowerHealthy;
        assert_eq!(err.to_string(), "Borrower is healthy, nothing to liquidate");
    }
}
