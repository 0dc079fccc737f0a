//! Constant-product AMM math.
//!
//! Pure functions only. Output amounts are always rounded down so the
//! trader never gets credited a fractional unit the pool would keep.

use crate::error::{Result, SandwichError};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Result of quoting a single swap against one reserve pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapQuote {
    pub amount_out: u64,
    /// Relative change of the pool's implied price caused by the trade.
    pub price_impact: f64,
}

/// Quote a swap of `amount_in` against a constant-product pool.
///
/// Fee is applied to the input first (`fee_rate_bps` in basis points),
/// then `amount_out = reserve_out * effective_in / (reserve_in + effective_in)`,
/// floored.
pub fn quote(
    reserve_in: u64,
    reserve_out: u64,
    amount_in: u64,
    fee_rate_bps: u32,
) -> Result<SwapQuote> {
    if amount_in == 0 {
        return Err(SandwichError::InvalidInput(
            "amount_in must be > 0".to_string(),
        ));
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(SandwichError::InvalidInput(format!(
            "reserves must be non-zero (in={}, out={})",
            reserve_in, reserve_out
        )));
    }
    if fee_rate_bps >= 10_000 {
        return Err(SandwichError::InvalidInput(format!(
            "fee_rate_bps must be < 10000, got {}",
            fee_rate_bps
        )));
    }

    let fee = Decimal::from(fee_rate_bps) / Decimal::from(10_000u32);
    let effective_in = Decimal::from(amount_in) * (Decimal::ONE - fee);

    let numerator = effective_in * Decimal::from(reserve_out);
    let denominator = Decimal::from(reserve_in) + effective_in;
    let amount_out = (numerator / denominator)
        .floor()
        .to_u64()
        .ok_or_else(|| SandwichError::InvalidInput("output overflows u64".to_string()))?;

    let price_before = reserve_out as f64 / reserve_in as f64;
    let price_after = (reserve_out - amount_out) as f64 / (reserve_in as f64 + amount_in as f64);
    let price_impact = (price_after - price_before).abs() / price_before;

    Ok(SwapQuote {
        amount_out,
        price_impact,
    })
}

/// Reserve pair after a quoted swap has landed. Local projection only;
/// on-chain pool state is never mutated by this crate.
pub fn apply_swap(
    reserve_in: u64,
    reserve_out: u64,
    amount_in: u64,
    amount_out: u64,
) -> (u64, u64) {
    (
        reserve_in.saturating_add(amount_in),
        reserve_out.saturating_sub(amount_out),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn quote_matches_worked_example() {
        // 1M/1M reserves, 1000 in at 25 bps: just under 1000 out, ~0.2% impact
        let q = quote(1_000_000, 1_000_000, 1_000, 25).unwrap();
        assert!(q.amount_out < 1_000);
        assert!(q.amount_out >= 995);
        assert_approx_eq!(q.price_impact, 0.002, 1e-4);
    }

    #[test]
    fn output_always_below_reserve() {
        for amount in [1u64, 500, 10_000, 900_000, 5_000_000] {
            let q = quote(1_000_000, 25_000_000, amount, 25).unwrap();
            assert!(q.amount_out < 25_000_000, "amount_in={}", amount);
            assert!(q.price_impact >= 0.0);
        }
    }

    #[test]
    fn zero_amount_rejected() {
        assert!(matches!(
            quote(1_000_000, 1_000_000, 0, 25),
            Err(SandwichError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_reserves_rejected() {
        assert!(quote(0, 1_000_000, 10, 25).is_err());
        assert!(quote(1_000_000, 0, 10, 25).is_err());
    }

    #[test]
    fn quote_is_deterministic() {
        let a = quote(1_000_000, 25_000_000, 5_000, 25).unwrap();
        let b = quote(1_000_000, 25_000_000, 5_000, 25).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn apply_swap_projects_reserves() {
        let q = quote(1_000_000, 25_000_000, 5_000, 25).unwrap();
        let (rin, rout) = apply_swap(1_000_000, 25_000_000, 5_000, q.amount_out);
        assert_eq!(rin, 1_005_000);
        assert_eq!(rout, 25_000_000 - q.amount_out);
    }
}
