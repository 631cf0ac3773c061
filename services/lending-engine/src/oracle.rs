//! Price oracle seam
//!
//! The risk engine values collateral and borrows through an external price
//! feed. The engine only ever consumes `get_price`; a missing or zero quote
//! is a hard error, never "worthless collateral", so a broken feed can't
//! trigger spurious liquidations.

use std::collections::HashMap;
use types::errors::OracleError;
use types::ids::MarketId;
use types::numeric::Price;

/// Price source consumed by the risk engine
pub trait PriceOracle {
    /// Quote price of one unit of the market's underlying asset
    fn get_price(&self, asset: &MarketId) -> Result<Price, OracleError>;
}

/// Table-driven oracle with administratively set prices
///
/// Prices are set per underlying asset; unset assets fail with
/// `PriceUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: HashMap<MarketId, Price>,
}

impl StaticPriceOracle {
    /// Create an empty oracle
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the price for an asset
    pub fn set_price(&mut self, asset: MarketId, price: Price) {
        self.prices.insert(asset, price);
    }
}

impl PriceOracle for StaticPriceOracle {
    fn get_price(&self, asset: &MarketId) -> Result<Price, OracleError> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| OracleError::PriceUnavailable {
                asset: asset.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_price() {
        let mut oracle = StaticPriceOracle::new();
        oracle.set_price(MarketId::new("DAI"), Price::from_u64(1));

        let price = oracle.get_price(&MarketId::new("DAI")).unwrap();
        assert_eq!(price, Price::from_u64(1));
    }

    #[test]
    fn test_unset_price_is_an_error() {
        let oracle = StaticPriceOracle::new();
        let result = oracle.get_price(&MarketId::new("WETH"));
        assert!(matches!(
            result,
            Err(OracleError::PriceUnavailable { .. })
        ));
    }

    #[test]
    fn test_price_update_replaces() {
        let mut oracle = StaticPriceOracle::new();
        let asset = MarketId::new("WETH");
        oracle.set_price(asset.clone(), Price::from_u64(2000));
        oracle.set_price(asset.clone(), Price::from_u64(1000));
        assert_eq!(oracle.get_price(&asset).unwrap(), Price::from_u64(1000));
    }
}
