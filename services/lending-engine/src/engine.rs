//! Lending engine — orchestrator
//!
//! Owns the market registry, the position ledger, and the reward ledger, and
//! drives every user-facing operation: mint, redeem, borrow, repay,
//! liquidate, and reward claims. Each operation brings interest current,
//! validates, computes its full outcome, performs the single external
//! transfer, and only then commits the internal ledgers, so a rejected
//! transfer leaves no state behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::errors::{
    EngineError, LiquidationError, MarketError, RewardError, RiskError,
};
use types::ids::{AccountId, MarketId};
use types::numeric::{div_truncate, mul_truncate, Amount, Factor};
use types::position::AccountPosition;
use types::risk::{AccountLiquidity, HypotheticalChange};

use crate::events::{LendingEvent, LendingEventKind};
use crate::liquidation;
use crate::market::{Market, MarketConfig};
use crate::oracle::PriceOracle;
use crate::rates::annualized;
use crate::rewards::RewardLedger;
use crate::risk;
use crate::vault::AssetLedger;

/// Engine-wide configuration
///
/// Close factor and liquidation incentive are global across markets; the
/// reward asset backs claim payouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum fraction of a single borrow repayable per liquidation, in (0, 1]
    pub close_factor: Factor,
    /// Bonus multiplier paid to liquidators, at least 1
    pub liquidation_incentive: Factor,
    /// Asset used for reward emissions and claims
    pub reward_asset: MarketId,
    /// Periods per year, for annualized rate reporting
    pub periods_per_year: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            close_factor: Factor::from_str("0.5").unwrap(),
            liquidation_incentive: Factor::from_str("1.08").unwrap(),
            reward_asset: MarketId::new("RWD"),
            periods_per_year: 2_102_400,
        }
    }
}

/// How much of a borrow to repay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepayAmount {
    /// Repay exactly this much; rejected if it exceeds the outstanding debt
    Exact(Amount),
    /// Repay the full snapshot-adjusted debt
    Full,
}

/// Result of a mint
#[derive(Debug, Clone, PartialEq)]
pub struct MintOutcome {
    pub receipts_issued: Amount,
    pub exchange_rate: Factor,
    pub events: Vec<LendingEvent>,
}

/// Result of a redeem
#[derive(Debug, Clone, PartialEq)]
pub struct RedeemOutcome {
    pub receipts_burned: Amount,
    pub amount_redeemed: Amount,
    pub events: Vec<LendingEvent>,
}

/// Result of a borrow
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowOutcome {
    pub amount_borrowed: Amount,
    /// The borrower's full debt in this market after the borrow
    pub total_debt: Amount,
    pub events: Vec<LendingEvent>,
}

/// Result of a repay
#[derive(Debug, Clone, PartialEq)]
pub struct RepayOutcome {
    pub amount_repaid: Amount,
    pub remaining_debt: Amount,
    pub events: Vec<LendingEvent>,
}

/// Result of a liquidation
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationOutcome {
    pub amount_repaid: Amount,
    pub receipts_seized: Amount,
    pub events: Vec<LendingEvent>,
}

/// Result of a reward claim
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimOutcome {
    pub amount_claimed: Amount,
    pub events: Vec<LendingEvent>,
}

/// Point-in-time view of one market's ledger and rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: MarketId,
    pub total_receipts: Amount,
    pub total_cash: Amount,
    pub total_borrows: Amount,
    pub total_reserves: Amount,
    pub exchange_rate: Factor,
    pub utilization: Factor,
    pub borrow_rate_per_period: Factor,
    pub supply_rate_per_period: Factor,
    pub borrow_rate_per_year: Factor,
    pub supply_rate_per_year: Factor,
    pub borrow_index: Factor,
    pub collateral_factor: Factor,
    pub reserve_factor: Factor,
    pub is_listed: bool,
}

/// The lending engine facade
///
/// Strictly sequential: every operation runs to completion through
/// `&mut self`, so collaborator calls can never re-enter a half-mutated
/// ledger.
pub struct LendingEngine<O: PriceOracle, A: AssetLedger> {
    config: EngineConfig,
    engine_account: AccountId,
    markets: HashMap<MarketId, Market>,
    positions: HashMap<(AccountId, MarketId), AccountPosition>,
    rewards: RewardLedger,
    oracle: O,
    assets: A,
}

impl<O: PriceOracle, A: AssetLedger> LendingEngine<O, A> {
    /// Create an engine with validated configuration
    pub fn new(config: EngineConfig, oracle: O, assets: A) -> Result<Self, EngineError> {
        risk::validate_close_factor(config.close_factor)?;
        risk::validate_liquidation_incentive(config.liquidation_incentive)?;
        Ok(Self {
            config,
            engine_account: AccountId::new(),
            markets: HashMap::new(),
            positions: HashMap::new(),
            rewards: RewardLedger::new(),
            oracle,
            assets,
        })
    }

    /// The engine's own holder account in the asset ledger
    pub fn engine_account(&self) -> AccountId {
        self.engine_account
    }

    /// Current engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Administrative access to the price oracle
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Administrative access to the asset ledger
    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    // ── Market administration ────────────────────────────────────────────

    /// List a new market
    pub fn support_market(
        &mut self,
        config: MarketConfig,
        period: u64,
    ) -> Result<Vec<LendingEvent>, EngineError> {
        if self.markets.contains_key(&config.market_id) {
            return Err(RiskError::AlreadyListed {
                market_id: config.market_id.to_string(),
            }
            .into());
        }
        let market = Market::new(config, period)?;
        let market_id = market.market_id.clone();
        self.rewards.ensure_market(&market_id, period);
        self.markets.insert(market_id.clone(), market);

        info!(market = %market_id, "Market listed");
        Ok(vec![LendingEvent::new(
            period,
            LendingEventKind::MarketListed { market_id },
        )])
    }

    /// Delist a market: refuse new mints and borrows, keep exit paths open
    pub fn delist_market(
        &mut self,
        market_id: &MarketId,
        period: u64,
    ) -> Result<Vec<LendingEvent>, EngineError> {
        let market = self.market_mut(market_id)?;
        if !market.risk.is_listed {
            return Ok(Vec::new());
        }
        market.risk.is_listed = false;
        market.touch();

        warn!(market = %market_id, "Market delisted");
        Ok(vec![LendingEvent::new(
            period,
            LendingEventKind::MarketDelisted {
                market_id: market_id.clone(),
            },
        )])
    }

    /// Enter markets into the account's collateral set
    ///
    /// Purely additive; entering a market twice is a no-op. All requested
    /// markets are validated before any membership changes.
    pub fn enter_markets(
        &mut self,
        account: AccountId,
        market_ids: &[MarketId],
        period: u64,
    ) -> Result<Vec<LendingEvent>, EngineError> {
        for market_id in market_ids {
            self.listed_market(market_id)?;
        }
        let mut events = Vec::new();
        for market_id in market_ids {
            let position = self.position_mut(account, market_id, period);
            if !position.membership {
                position.membership = true;
                position.touch(period);
                events.push(LendingEvent::new(
                    period,
                    LendingEventKind::MarketEntered {
                        market_id: market_id.clone(),
                        account_id: account,
                    },
                ));
            }
        }
        Ok(events)
    }

    /// Set a market's collateral factor; applies from the next valuation
    pub fn set_collateral_factor(
        &mut self,
        market_id: &MarketId,
        factor: Factor,
    ) -> Result<(), EngineError> {
        risk::validate_collateral_factor(factor)?;
        let market = self.market_mut(market_id)?;
        market.risk.collateral_factor = factor;
        market.touch();
        Ok(())
    }

    /// Set a market's reserve factor; applies from the next accrual
    pub fn set_reserve_factor(
        &mut self,
        market_id: &MarketId,
        factor: Factor,
    ) -> Result<(), EngineError> {
        risk::validate_reserve_factor(factor)?;
        let market = self.market_mut(market_id)?;
        market.reserve_factor = factor;
        market.touch();
        Ok(())
    }

    /// Set the global close factor
    pub fn set_close_factor(&mut self, factor: Factor) -> Result<(), EngineError> {
        risk::validate_close_factor(factor)?;
        self.config.close_factor = factor;
        Ok(())
    }

    /// Set the global liquidation incentive
    pub fn set_liquidation_incentive(&mut self, factor: Factor) -> Result<(), EngineError> {
        risk::validate_liquidation_incentive(factor)?;
        self.config.liquidation_incentive = factor;
        Ok(())
    }

    /// Set a market's reward emission speeds
    ///
    /// Indices are brought current first so the old speeds apply up to this
    /// period and the new speeds after it.
    pub fn set_reward_speeds(
        &mut self,
        market_id: &MarketId,
        supply_speed: Amount,
        borrow_speed: Amount,
        period: u64,
    ) -> Result<Vec<LendingEvent>, EngineError> {
        let (total_receipts, total_borrows) = {
            let market = self.market(market_id)?;
            (market.total_receipts, market.total_borrows)
        };
        self.rewards
            .update_indices(market_id, total_receipts, total_borrows, period)?;
        self.rewards
            .set_speeds(market_id, supply_speed, borrow_speed);

        Ok(vec![LendingEvent::new(
            period,
            LendingEventKind::RewardSpeedsSet {
                market_id: market_id.clone(),
                supply_speed,
                borrow_speed,
            },
        )])
    }

    // ── Core operations ──────────────────────────────────────────────────

    /// Bring a market's interest current
    pub fn accrue_interest(
        &mut self,
        market_id: &MarketId,
        period: u64,
    ) -> Result<Vec<LendingEvent>, EngineError> {
        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        Ok(events)
    }

    /// Deposit underlying and receive receipt tokens at the exchange rate
    pub fn mint(
        &mut self,
        minter: AccountId,
        market_id: &MarketId,
        amount: Amount,
        period: u64,
    ) -> Result<MintOutcome, EngineError> {
        if amount.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        self.listed_market(market_id)?;

        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        self.refresh_rewards(market_id, minter, period)?;

        let (exchange_rate, receipts_issued, new_cash, new_total_receipts) = {
            let market = self.market(market_id)?;
            let exchange_rate = market.exchange_rate()?;
            let receipts = Amount::try_from_decimal(div_truncate(
                amount.as_decimal(),
                exchange_rate.as_decimal(),
            )?)?;
            (
                exchange_rate,
                receipts,
                market.total_cash.checked_add(amount)?,
                market.total_receipts.checked_add(receipts)?,
            )
        };
        if receipts_issued.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        let held = self.receipt_balance(minter, market_id);
        let new_held = held.checked_add(receipts_issued)?;

        let engine_account = self.engine_account;
        self.assets
            .transfer_from(market_id, minter, engine_account, amount)?;

        let market = self.market_mut(market_id)?;
        market.total_cash = new_cash;
        market.total_receipts = new_total_receipts;
        market.touch();
        let position = self.position_mut(minter, market_id, period);
        position.receipt_balance = new_held;
        position.touch(period);

        debug!(
            market = %market_id,
            minter = %minter,
            amount = %amount,
            receipts = %receipts_issued,
            "Minted"
        );
        events.push(LendingEvent::new(
            period,
            LendingEventKind::Minted {
                market_id: market_id.clone(),
                minter,
                amount,
                receipts_issued,
            },
        ));
        Ok(MintOutcome {
            receipts_issued,
            exchange_rate,
            events,
        })
    }

    /// Redeem a number of receipt tokens for underlying
    pub fn redeem(
        &mut self,
        redeemer: AccountId,
        market_id: &MarketId,
        receipts: Amount,
        period: u64,
    ) -> Result<RedeemOutcome, EngineError> {
        self.redeem_internal(redeemer, market_id, RedeemRequest::Receipts(receipts), period)
    }

    /// Redeem receipt tokens worth an exact amount of underlying
    pub fn redeem_underlying(
        &mut self,
        redeemer: AccountId,
        market_id: &MarketId,
        amount: Amount,
        period: u64,
    ) -> Result<RedeemOutcome, EngineError> {
        self.redeem_internal(redeemer, market_id, RedeemRequest::Underlying(amount), period)
    }

    fn redeem_internal(
        &mut self,
        redeemer: AccountId,
        market_id: &MarketId,
        request: RedeemRequest,
        period: u64,
    ) -> Result<RedeemOutcome, EngineError> {
        let requested = match request {
            RedeemRequest::Receipts(r) => r,
            RedeemRequest::Underlying(a) => a,
        };
        if requested.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        self.market(market_id)?;

        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        self.accrue_member_markets(redeemer, period, &mut events)?;
        self.refresh_rewards(market_id, redeemer, period)?;

        let (exchange_rate, total_cash, total_receipts) = {
            let market = self.market(market_id)?;
            (
                market.exchange_rate()?,
                market.total_cash,
                market.total_receipts,
            )
        };
        let (receipts_burned, amount_redeemed) = match request {
            RedeemRequest::Receipts(r) => {
                let amount = Amount::try_from_decimal(mul_truncate(
                    r.as_decimal(),
                    exchange_rate.as_decimal(),
                )?)?;
                (r, amount)
            }
            RedeemRequest::Underlying(a) => {
                let receipts = Amount::try_from_decimal(div_truncate(
                    a.as_decimal(),
                    exchange_rate.as_decimal(),
                )?)?;
                (receipts, a)
            }
        };
        if receipts_burned.is_zero() || amount_redeemed.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }

        let held = self.receipt_balance(redeemer, market_id);
        if held < receipts_burned {
            return Err(MarketError::InsufficientReceipts {
                requested: receipts_burned.to_string(),
                held: held.to_string(),
            }
            .into());
        }
        if total_cash < amount_redeemed {
            return Err(MarketError::InsufficientCash {
                requested: amount_redeemed.to_string(),
                available: total_cash.to_string(),
            }
            .into());
        }
        let new_cash = total_cash.checked_sub(amount_redeemed)?;
        let new_total_receipts = total_receipts.checked_sub(receipts_burned)?;
        let new_held = held.checked_sub(receipts_burned)?;

        // Membership makes these receipts collateral; a member redeem must
        // keep the account solvent.
        if self.is_member(redeemer, market_id) {
            let change = HypotheticalChange::redeem(market_id.clone(), receipts_burned);
            let liquidity = self.liquidity_for(redeemer, Some(&change))?;
            if !liquidity.is_solvent() {
                return Err(RiskError::InsufficientLiquidity {
                    shortfall: liquidity.shortfall.to_string(),
                }
                .into());
            }
        }

        let engine_account = self.engine_account;
        self.assets
            .transfer_from(market_id, engine_account, redeemer, amount_redeemed)?;

        let market = self.market_mut(market_id)?;
        market.total_cash = new_cash;
        market.total_receipts = new_total_receipts;
        market.touch();
        let position = self.position_mut(redeemer, market_id, period);
        position.receipt_balance = new_held;
        position.touch(period);

        debug!(
            market = %market_id,
            redeemer = %redeemer,
            receipts = %receipts_burned,
            amount = %amount_redeemed,
            "Redeemed"
        );
        events.push(LendingEvent::new(
            period,
            LendingEventKind::Redeemed {
                market_id: market_id.clone(),
                redeemer,
                receipts_burned,
                amount: amount_redeemed,
            },
        ));
        Ok(RedeemOutcome {
            receipts_burned,
            amount_redeemed,
            events,
        })
    }

    /// Borrow underlying against the account's collateral
    ///
    /// Borrowing enters the account into the borrowed market so the debt is
    /// always visible to liquidity computation.
    pub fn borrow(
        &mut self,
        borrower: AccountId,
        market_id: &MarketId,
        amount: Amount,
        period: u64,
    ) -> Result<BorrowOutcome, EngineError> {
        if amount.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        self.listed_market(market_id)?;

        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        {
            let position = self.position_mut(borrower, market_id, period);
            if !position.membership {
                position.membership = true;
                position.touch(period);
                events.push(LendingEvent::new(
                    period,
                    LendingEventKind::MarketEntered {
                        market_id: market_id.clone(),
                        account_id: borrower,
                    },
                ));
            }
        }
        self.accrue_member_markets(borrower, period, &mut events)?;
        self.refresh_rewards(market_id, borrower, period)?;

        let (borrow_index, total_cash, total_borrows) = {
            let market = self.market(market_id)?;
            (market.borrow_index, market.total_cash, market.total_borrows)
        };
        if total_cash < amount {
            return Err(MarketError::InsufficientCash {
                requested: amount.to_string(),
                available: total_cash.to_string(),
            }
            .into());
        }
        let effective = self.borrow_balance_stored(borrower, market_id)?;
        let new_principal = effective.checked_add(amount)?;
        let new_total_borrows = total_borrows.checked_add(amount)?;
        let new_cash = total_cash.checked_sub(amount)?;

        let change = HypotheticalChange::borrow(market_id.clone(), amount);
        let liquidity = self.liquidity_for(borrower, Some(&change))?;
        if !liquidity.is_solvent() {
            return Err(RiskError::InsufficientLiquidity {
                shortfall: liquidity.shortfall.to_string(),
            }
            .into());
        }

        let engine_account = self.engine_account;
        self.assets
            .transfer_from(market_id, engine_account, borrower, amount)?;

        let market = self.market_mut(market_id)?;
        market.total_cash = new_cash;
        market.total_borrows = new_total_borrows;
        market.touch();
        let position = self.position_mut(borrower, market_id, period);
        position.borrow_principal = new_principal;
        position.borrow_index_snapshot = borrow_index;
        position.touch(period);

        info!(
            market = %market_id,
            borrower = %borrower,
            amount = %amount,
            total_debt = %new_principal,
            "Borrowed"
        );
        events.push(LendingEvent::new(
            period,
            LendingEventKind::Borrowed {
                market_id: market_id.clone(),
                borrower,
                amount,
                total_borrows: new_total_borrows,
            },
        ));
        Ok(BorrowOutcome {
            amount_borrowed: amount,
            total_debt: new_principal,
            events,
        })
    }

    /// Repay the caller's own borrow
    pub fn repay_borrow(
        &mut self,
        account: AccountId,
        market_id: &MarketId,
        amount: RepayAmount,
        period: u64,
    ) -> Result<RepayOutcome, EngineError> {
        self.repay_borrow_behalf(account, account, market_id, amount, period)
    }

    /// Repay a borrower's debt from any payer's balance
    ///
    /// No permission gate beyond the asset transfer succeeding: anyone may
    /// repay on behalf of anyone.
    pub fn repay_borrow_behalf(
        &mut self,
        payer: AccountId,
        borrower: AccountId,
        market_id: &MarketId,
        amount: RepayAmount,
        period: u64,
    ) -> Result<RepayOutcome, EngineError> {
        self.market(market_id)?;

        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        self.refresh_rewards(market_id, borrower, period)?;

        let (borrow_index, total_cash, total_borrows) = {
            let market = self.market(market_id)?;
            (market.borrow_index, market.total_cash, market.total_borrows)
        };
        let effective = self.borrow_balance_stored(borrower, market_id)?;
        if effective.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        let repay = match amount {
            RepayAmount::Exact(requested) => {
                if requested.is_zero() {
                    return Err(MarketError::ZeroAmount.into());
                }
                if requested > effective {
                    return Err(MarketError::RepayExceedsDebt {
                        requested: requested.to_string(),
                        debt: effective.to_string(),
                    }
                    .into());
                }
                requested
            }
            RepayAmount::Full => effective,
        };
        let new_principal = effective.checked_sub(repay)?;
        // Account debt may exceed the pooled total by rounding dust
        let new_total_borrows = total_borrows.saturating_sub(repay);
        let new_cash = total_cash.checked_add(repay)?;

        let engine_account = self.engine_account;
        self.assets
            .transfer_from(market_id, payer, engine_account, repay)?;

        let market = self.market_mut(market_id)?;
        market.total_cash = new_cash;
        market.total_borrows = new_total_borrows;
        market.touch();
        let position = self.position_mut(borrower, market_id, period);
        position.borrow_principal = new_principal;
        position.borrow_index_snapshot = borrow_index;
        position.touch(period);

        debug!(
            market = %market_id,
            payer = %payer,
            borrower = %borrower,
            amount = %repay,
            remaining = %new_principal,
            "Repaid"
        );
        events.push(LendingEvent::new(
            period,
            LendingEventKind::Repaid {
                market_id: market_id.clone(),
                payer,
                borrower,
                amount: repay,
                remaining_debt: new_principal,
            },
        ));
        Ok(RepayOutcome {
            amount_repaid: repay,
            remaining_debt: new_principal,
            events,
        })
    }

    /// Liquidate a shortfall borrower
    ///
    /// The liquidator repays part of the borrower's debt in the borrowed
    /// market and seizes receipt tokens from the borrower's position in the
    /// collateral market, bonus included. All checks precede any state
    /// change; a failure anywhere aborts the whole call.
    pub fn liquidate_borrow(
        &mut self,
        liquidator: AccountId,
        borrower: AccountId,
        borrowed_market: &MarketId,
        repay_amount: Amount,
        collateral_market: &MarketId,
        period: u64,
    ) -> Result<LiquidationOutcome, EngineError> {
        if liquidator == borrower {
            return Err(LiquidationError::SelfLiquidation.into());
        }
        if repay_amount.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        self.market(borrowed_market)?;
        self.market(collateral_market)?;

        let mut events = Vec::new();
        self.accrue_market(borrowed_market, period, &mut events)?;
        self.accrue_market(collateral_market, period, &mut events)?;
        self.accrue_member_markets(borrower, period, &mut events)?;

        let liquidity = self.liquidity_for(borrower, None)?;
        if liquidity.is_solvent() {
            return Err(LiquidationError::BorrowerHealthy.into());
        }

        let (borrow_index, total_cash, total_borrows) = {
            let market = self.market(borrowed_market)?;
            (market.borrow_index, market.total_cash, market.total_borrows)
        };
        let effective = self.borrow_balance_stored(borrower, borrowed_market)?;
        let max_repay = liquidation::max_repay(effective, self.config.close_factor)?;
        if repay_amount > max_repay {
            return Err(LiquidationError::TooMuchRepay {
                requested: repay_amount.to_string(),
                max_repay: max_repay.to_string(),
            }
            .into());
        }

        let price_borrowed = self.oracle.get_price(borrowed_market)?;
        let price_collateral = self.oracle.get_price(collateral_market)?;
        let collateral_rate = self.market(collateral_market)?.exchange_rate()?;
        let receipts_seized = liquidation::seize_receipts(
            repay_amount,
            self.config.liquidation_incentive,
            price_borrowed,
            price_collateral,
            collateral_rate,
        )?;
        let borrower_held = self.receipt_balance(borrower, collateral_market);
        if borrower_held < receipts_seized {
            // Inconsistent price or parameter configuration: reject, never clamp
            return Err(LiquidationError::SeizeTooMuch {
                required: receipts_seized.to_string(),
                held: borrower_held.to_string(),
            }
            .into());
        }

        self.refresh_rewards(borrowed_market, borrower, period)?;
        self.refresh_rewards(collateral_market, borrower, period)?;
        self.refresh_rewards(collateral_market, liquidator, period)?;

        let new_principal = effective.checked_sub(repay_amount)?;
        let new_total_borrows = total_borrows.saturating_sub(repay_amount);
        let new_cash = total_cash.checked_add(repay_amount)?;
        let new_borrower_held = borrower_held.checked_sub(receipts_seized)?;
        let liquidator_held = self.receipt_balance(liquidator, collateral_market);
        let new_liquidator_held = liquidator_held.checked_add(receipts_seized)?;

        let engine_account = self.engine_account;
        self.assets
            .transfer_from(borrowed_market, liquidator, engine_account, repay_amount)?;

        let market = self.market_mut(borrowed_market)?;
        market.total_cash = new_cash;
        market.total_borrows = new_total_borrows;
        market.touch();
        let position = self.position_mut(borrower, borrowed_market, period);
        position.borrow_principal = new_principal;
        position.borrow_index_snapshot = borrow_index;
        position.touch(period);
        let position = self.position_mut(borrower, collateral_market, period);
        position.receipt_balance = new_borrower_held;
        position.touch(period);
        let position = self.position_mut(liquidator, collateral_market, period);
        position.receipt_balance = new_liquidator_held;
        position.touch(period);

        info!(
            borrowed = %borrowed_market,
            collateral = %collateral_market,
            liquidator = %liquidator,
            borrower = %borrower,
            repaid = %repay_amount,
            seized = %receipts_seized,
            "Liquidated"
        );
        events.push(LendingEvent::new(
            period,
            LendingEventKind::Liquidated {
                borrowed_market: borrowed_market.clone(),
                collateral_market: collateral_market.clone(),
                liquidator,
                borrower,
                amount_repaid: repay_amount,
                receipts_seized,
            },
        ));
        Ok(LiquidationOutcome {
            amount_repaid: repay_amount,
            receipts_seized,
            events,
        })
    }

    // ── Rewards ──────────────────────────────────────────────────────────

    /// Move reward tokens into the engine's payout pool
    pub fn fund_reward_pool(
        &mut self,
        from: AccountId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        if amount.is_zero() {
            return Err(MarketError::ZeroAmount.into());
        }
        let reward_asset = self.config.reward_asset.clone();
        let engine_account = self.engine_account;
        self.assets
            .transfer_from(&reward_asset, from, engine_account, amount)?;
        Ok(())
    }

    /// Pay out the account's accrued rewards
    ///
    /// Distribution bookkeeping always persists; only the final transfer can
    /// fail. A short pool fails with `InsufficientRewardPool` and leaves the
    /// accrued balance claimable once the pool is refilled.
    pub fn claim_rewards(
        &mut self,
        account: AccountId,
        period: u64,
    ) -> Result<ClaimOutcome, EngineError> {
        let mut events = Vec::new();
        let market_ids: Vec<MarketId> = self
            .positions
            .keys()
            .filter(|(holder, _)| *holder == account)
            .map(|(_, market_id)| market_id.clone())
            .collect();
        for market_id in &market_ids {
            self.refresh_rewards(market_id, account, period)?;
        }

        let total = self.rewards.accrued(account);
        if total.is_zero() {
            return Ok(ClaimOutcome {
                amount_claimed: Amount::zero(),
                events,
            });
        }
        let reward_asset = self.config.reward_asset.clone();
        let pool = self.assets.balance_of(&reward_asset, self.engine_account);
        if pool < total {
            return Err(RewardError::InsufficientRewardPool {
                required: total.to_string(),
                available: pool.to_string(),
            }
            .into());
        }

        let engine_account = self.engine_account;
        self.assets
            .transfer_from(&reward_asset, engine_account, account, total)?;
        self.rewards.settle_claim(account);

        info!(account = %account, amount = %total, "Rewards claimed");
        events.push(LendingEvent::new(
            period,
            LendingEventKind::RewardsClaimed {
                account_id: account,
                amount: total,
            },
        ));
        Ok(ClaimOutcome {
            amount_claimed: total,
            events,
        })
    }

    /// Claimable reward balance of an account
    pub fn reward_accrued(&self, account: AccountId) -> Amount {
        self.rewards.accrued(account)
    }

    // ── Views ────────────────────────────────────────────────────────────

    /// Exchange rate from stored state, without accruing
    pub fn exchange_rate_stored(&self, market_id: &MarketId) -> Result<Factor, EngineError> {
        Ok(self.market(market_id)?.exchange_rate()?)
    }

    /// Borrow balance from stored state, without accruing
    pub fn borrow_balance_stored(
        &self,
        account: AccountId,
        market_id: &MarketId,
    ) -> Result<Amount, EngineError> {
        let market = self.market(market_id)?;
        match self.position(account, market_id) {
            Some(position) => Ok(position.effective_borrow(market.borrow_index)?),
            None => Ok(Amount::zero()),
        }
    }

    /// Borrow balance after bringing interest current
    pub fn borrow_balance_current(
        &mut self,
        account: AccountId,
        market_id: &MarketId,
        period: u64,
    ) -> Result<Amount, EngineError> {
        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        self.borrow_balance_stored(account, market_id)
    }

    /// Underlying value of the account's receipts after accrual
    pub fn underlying_balance(
        &mut self,
        account: AccountId,
        market_id: &MarketId,
        period: u64,
    ) -> Result<Amount, EngineError> {
        let mut events = Vec::new();
        self.accrue_market(market_id, period, &mut events)?;
        let exchange_rate = self.market(market_id)?.exchange_rate()?;
        let receipts = self.receipt_balance(account, market_id);
        Ok(Amount::try_from_decimal(mul_truncate(
            receipts.as_decimal(),
            exchange_rate.as_decimal(),
        )?)?)
    }

    /// Receipt tokens held by an account in a market
    pub fn receipt_balance(&self, account: AccountId, market_id: &MarketId) -> Amount {
        self.position(account, market_id)
            .map(|position| position.receipt_balance)
            .unwrap_or_else(Amount::zero)
    }

    /// Whether the account has entered a market
    pub fn is_member(&self, account: AccountId, market_id: &MarketId) -> bool {
        self.position(account, market_id)
            .map(|position| position.membership)
            .unwrap_or(false)
    }

    /// Aggregate account liquidity after accruing all member markets
    pub fn account_liquidity(
        &mut self,
        account: AccountId,
        period: u64,
    ) -> Result<AccountLiquidity, EngineError> {
        let mut events = Vec::new();
        self.accrue_member_markets(account, period, &mut events)?;
        self.liquidity_for(account, None)
    }

    /// Account liquidity with a pending change folded in, without applying it
    pub fn hypothetical_liquidity(
        &mut self,
        account: AccountId,
        change: &HypotheticalChange,
        period: u64,
    ) -> Result<AccountLiquidity, EngineError> {
        let mut events = Vec::new();
        self.accrue_member_markets(account, period, &mut events)?;
        self.liquidity_for(account, Some(change))
    }

    /// Point-in-time market view from stored state
    pub fn market_snapshot(&self, market_id: &MarketId) -> Result<MarketSnapshot, EngineError> {
        let market = self.market(market_id)?;
        let borrow_rate = market.borrow_rate_per_period()?;
        let supply_rate = market.supply_rate_per_period()?;
        Ok(MarketSnapshot {
            market_id: market.market_id.clone(),
            total_receipts: market.total_receipts,
            total_cash: market.total_cash,
            total_borrows: market.total_borrows,
            total_reserves: market.total_reserves,
            exchange_rate: market.exchange_rate()?,
            utilization: market.utilization()?,
            borrow_rate_per_period: borrow_rate,
            supply_rate_per_period: supply_rate,
            borrow_rate_per_year: annualized(borrow_rate, self.config.periods_per_year)?,
            supply_rate_per_year: annualized(supply_rate, self.config.periods_per_year)?,
            borrow_index: market.borrow_index,
            collateral_factor: market.risk.collateral_factor,
            reserve_factor: market.reserve_factor,
            is_listed: market.risk.is_listed,
        })
    }

    /// Check the pool-value invariant of every market
    pub fn check_invariants(&self) -> bool {
        self.markets.values().all(Market::check_invariant)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn market(&self, market_id: &MarketId) -> Result<&Market, EngineError> {
        self.markets
            .get(market_id)
            .ok_or_else(|| {
                RiskError::MarketNotListed {
                    market_id: market_id.to_string(),
                }
                .into()
            })
    }

    fn market_mut(&mut self, market_id: &MarketId) -> Result<&mut Market, EngineError> {
        self.markets
            .get_mut(market_id)
            .ok_or_else(|| {
                RiskError::MarketNotListed {
                    market_id: market_id.to_string(),
                }
                .into()
            })
    }

    fn listed_market(&self, market_id: &MarketId) -> Result<&Market, EngineError> {
        let market = self.market(market_id)?;
        if !market.risk.is_listed {
            return Err(RiskError::MarketNotListed {
                market_id: market_id.to_string(),
            }
            .into());
        }
        Ok(market)
    }

    fn position(&self, account: AccountId, market_id: &MarketId) -> Option<&AccountPosition> {
        self.positions.get(&(account, market_id.clone()))
    }

    fn position_mut(
        &mut self,
        account: AccountId,
        market_id: &MarketId,
        period: u64,
    ) -> &mut AccountPosition {
        self.positions
            .entry((account, market_id.clone()))
            .or_insert_with(|| AccountPosition::new(account, market_id.clone(), period))
    }

    fn member_market_ids(&self, account: AccountId) -> Vec<MarketId> {
        self.positions
            .values()
            .filter(|position| position.account_id == account && position.membership)
            .map(|position| position.market_id.clone())
            .collect()
    }

    fn accrue_market(
        &mut self,
        market_id: &MarketId,
        period: u64,
        events: &mut Vec<LendingEvent>,
    ) -> Result<(), EngineError> {
        let market = self.market_mut(market_id)?;
        if let Some(accrual) = market.accrue_interest(period)? {
            events.push(LendingEvent::new(
                period,
                LendingEventKind::InterestAccrued {
                    market_id: market_id.clone(),
                    interest_accumulated: accrual.interest_accumulated,
                    borrow_index: accrual.borrow_index,
                },
            ));
        }
        Ok(())
    }

    fn accrue_member_markets(
        &mut self,
        account: AccountId,
        period: u64,
        events: &mut Vec<LendingEvent>,
    ) -> Result<(), EngineError> {
        for market_id in self.member_market_ids(account) {
            self.accrue_market(&market_id, period, events)?;
        }
        Ok(())
    }

    /// Bring reward indices current for a market and credit the account's
    /// share, using pre-operation balances
    fn refresh_rewards(
        &mut self,
        market_id: &MarketId,
        account: AccountId,
        period: u64,
    ) -> Result<(), EngineError> {
        let (total_receipts, total_borrows, borrow_index) = {
            let market = self.market(market_id)?;
            (market.total_receipts, market.total_borrows, market.borrow_index)
        };
        self.rewards
            .update_indices(market_id, total_receipts, total_borrows, period)?;
        let (receipts, effective) = match self.position(account, market_id) {
            Some(position) => (
                position.receipt_balance,
                position.effective_borrow(borrow_index)?,
            ),
            None => (Amount::zero(), Amount::zero()),
        };
        self.rewards
            .distribute(market_id, account, receipts, effective)?;
        Ok(())
    }

    fn liquidity_for(
        &self,
        account: AccountId,
        hypothetical: Option<&HypotheticalChange>,
    ) -> Result<AccountLiquidity, EngineError> {
        risk::account_liquidity(
            &self.markets,
            self.positions
                .values()
                .filter(|position| position.account_id == account),
            &self.oracle,
            hypothetical,
        )
    }
}

/// Internal redeem request shape
#[derive(Debug, Clone, Copy)]
enum RedeemRequest {
    Receipts(Amount),
    Underlying(Amount),
}
