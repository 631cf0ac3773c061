//! Unique identifier types for lending market entities
//!
//! Account identifiers use UUID v7 for time-sortable ordering, enabling
//! efficient chronological queries and replay. Markets are identified by the
//! symbol of their underlying asset.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an account
///
/// Uses UUID v7 for time-based sorting. Accounts can be efficiently
/// queried in creation order using the embedded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Create a new AccountId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Market identifier: the symbol of the market's underlying asset
///
/// Format: a non-empty asset symbol (e.g., "USDT", "DAI", "WETH"). One
/// market exists per underlying asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from an asset symbol
    ///
    /// # Panics
    /// Panics if the symbol is empty
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(!s.is_empty(), "MarketId symbol must be non-empty");
        Self(s)
    }

    /// Try to create a MarketId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_creation() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2, "AccountIds should be unique");
    }

    #[test]
    fn test_account_id_serialization() {
        let id = AccountId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_market_id_creation() {
        let market = MarketId::new("USDT");
        assert_eq!(market.as_str(), "USDT");
    }

    #[test]
    fn test_market_id_try_new() {
        assert!(MarketId::try_new("DAI").is_some());
        assert!(MarketId::try_new("").is_none());
    }

    #[test]
    #[should_panic(expected = "MarketId symbol must be non-empty")]
    fn test_market_id_empty_symbol() {
        MarketId::new("");
    }

    #[test]
    fn test_market_id_serialization() {
        let market = MarketId::new("WETH");
        let json = serde_json::to_string(&market).unwrap();
        assert_eq!(json, "\"WETH\"");

        let deserialized: MarketId = serde_json::from_str(&json).unwrap();
        assert_eq!(market, deserialized);
    }
}
