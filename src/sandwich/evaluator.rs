// src/sandwich/evaluator.rs
//! Opportunity evaluation. Pure: pool state and configuration in, decision
//! out. No clocks, no network, no randomness.

use crate::config::Config;
use crate::dex::math;
use crate::dex::raydium::PoolSnapshot;
use crate::sandwich::types::{OpportunityStatus, PendingSwap, SandwichOpportunity};
use log::debug;

/// Fraction of pool liquidity committed to the front-run leg.
pub const SIZING_FRACTION: f64 = 0.001;

/// Fraction of the induced price movement the bracket is expected to
/// capture after the target trade lands between the two legs.
pub const CAPTURE_FRACTION: f64 = 0.5;

/// Score a pending swap against its pool. Returns `None` when the trade is
/// not worth bracketing at the configured profit threshold.
pub fn evaluate(
    trade: &PendingSwap,
    pool: &PoolSnapshot,
    config: &Config,
) -> Option<SandwichOpportunity> {
    if trade.amount_in == 0 || pool.base_reserve == 0 || pool.quote_reserve == 0 {
        return None;
    }

    let front_run_amount = (pool.liquidity * SIZING_FRACTION).min(config.max_position_size) as u64;
    if front_run_amount == 0 {
        return None;
    }

    let front_quote = math::quote(
        pool.base_reserve,
        pool.quote_reserve,
        front_run_amount,
        pool.fee_rate_bps,
    )
    .ok()?;

    let target_impact = if trade.estimated_price_impact > 0.0 {
        trade.estimated_price_impact
    } else {
        math::quote(
            pool.base_reserve,
            pool.quote_reserve,
            trade.amount_in,
            pool.fee_rate_bps,
        )
        .ok()?
        .price_impact
    };

    // The captured move is bounded by the smaller of the two impacts: a
    // tiny target trade moves the price too little to recover the legs,
    // and a tiny front-run leg rides too little of a large move.
    let captured_impact = front_quote.price_impact.min(target_impact);
    let estimated_profit = front_run_amount as f64 * captured_impact * CAPTURE_FRACTION;
    let fee_cost = 2.0 * config.fee_per_transaction;
    let net = estimated_profit - fee_cost;

    if net <= config.min_profit_threshold {
        debug!(
            "Skipping {}: net {:.6} below threshold {:.6}",
            trade.signature, net, config.min_profit_threshold
        );
        return None;
    }

    let confidence_score =
        (pool.volume_24h / pool.liquidity).min(pool.liquidity / 100_000.0).min(1.0) * 100.0;

    Some(SandwichOpportunity {
        target_signature: trade.signature.clone(),
        pool_id: pool.pool_id.clone(),
        front_run_amount,
        back_run_amount: front_quote.amount_out,
        estimated_profit,
        fee_cost,
        confidence_score,
        status: OpportunityStatus::Accepted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;

    fn test_pool() -> PoolSnapshot {
        PoolSnapshot {
            pool_id: "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2".to_string(),
            base_mint: "So11111111111111111111111111111111111111112".to_string(),
            quote_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            base_symbol: "SOL".to_string(),
            quote_symbol: "USDC".to_string(),
            base_reserve: 1_000_000,
            quote_reserve: 25_000_000,
            liquidity: 1_000_000.0,
            volume_24h: 500_000.0,
            price: 25.0,
            fee_rate_bps: 25,
            last_refreshed: chrono::Utc::now().timestamp() as u64,
        }
    }

    fn test_trade(amount_in: u64) -> PendingSwap {
        PendingSwap {
            signature: "target_sig".to_string(),
            user_wallet: "user_1".to_string(),
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in,
            pool_id: "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2".to_string(),
            estimated_price_impact: 0.0,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn deep_pool_trade_is_accepted_at_low_threshold() {
        let mut config = Config::test_default();
        config.min_profit_threshold = 0.001;
        let opp = evaluate(&test_trade(5_000), &test_pool(), &config)
            .expect("trade should clear the low threshold");

        assert_eq!(opp.front_run_amount, 1_000);
        assert_eq!(opp.status, OpportunityStatus::Accepted);
        assert!(opp.estimated_profit > 0.0);
        assert!(opp.net_profit() > config.min_profit_threshold);
        assert!(opp.back_run_amount > 0);
    }

    #[test]
    fn same_trade_is_rejected_at_extreme_threshold() {
        let mut config = Config::test_default();
        config.min_profit_threshold = 1.0;
        assert_eq!(evaluate(&test_trade(5_000), &test_pool(), &config), None);
    }

    #[test]
    fn dust_trade_is_rejected() {
        let mut config = Config::test_default();
        config.min_profit_threshold = 0.001;
        // One lamport of flow moves the pool by effectively nothing.
        assert_eq!(evaluate(&test_trade(1), &test_pool(), &config), None);
    }

    #[test]
    fn zero_amount_trade_is_rejected() {
        let config = Config::test_default();
        assert_eq!(evaluate(&test_trade(0), &test_pool(), &config), None);
    }

    #[test]
    fn drained_pool_is_rejected() {
        let config = Config::test_default();
        let mut pool = test_pool();
        pool.base_reserve = 0;
        assert_eq!(evaluate(&test_trade(5_000), &pool, &config), None);
    }

    #[test]
    fn sizing_respects_position_cap() {
        let mut config = Config::test_default();
        config.min_profit_threshold = 0.001;
        config.max_position_size = 500.0;
        let opp = evaluate(&test_trade(5_000), &test_pool(), &config);
        if let Some(opp) = opp {
            assert_eq!(opp.front_run_amount, 500);
        }
    }

    #[test]
    fn confidence_is_bounded() {
        let mut config = Config::test_default();
        config.min_profit_threshold = 0.001;
        let opp = evaluate(&test_trade(5_000), &test_pool(), &config).unwrap();
        assert!(opp.confidence_score > 0.0);
        assert!(opp.confidence_score <= 100.0);
    }
}
