// src/sandwich/builder.rs
//! Bracket simulation and transaction construction.
//!
//! The bracket is simulated as three chained swaps against projected
//! reserves: our front-run leg, the target's trade against the moved pool,
//! then our back-run leg unwinding the front-run output against the pool as
//! the target left it. Only brackets clearing the minimum profit ratio are
//! turned into signed transactions.

use crate::config::Config;
use crate::dex::math;
use crate::dex::raydium::{PoolSnapshot, RAYDIUM_AMM_PROGRAM};
use crate::error::{Result, SandwichError};
use crate::sandwich::types::{PendingSwap, SandwichOpportunity};
use log::{debug, info};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;
use std::sync::Arc;

/// A bracket whose simulated round trip returns less than this fraction of
/// the front-run input is not built.
pub const MIN_BRACKET_PROFIT_RATIO: f64 = 0.01;

/// Raydium swap-base-in instruction tag.
const SWAP_INSTRUCTION_TAG: u8 = 9;

/// Outcome of simulating the full three-swap sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketPlan {
    /// Quote tokens bought by the front-run leg.
    pub front_run_out: u64,
    /// Quote tokens the target receives against the moved pool.
    pub target_out: u64,
    /// Base tokens recovered by unwinding `front_run_out`.
    pub expected_back_run_out: u64,
    /// Base-token surplus of the round trip. Negative when the bracket
    /// would lose tokens.
    pub profit: i128,
    pub profit_ratio: f64,
}

/// Both legs of a bracket, signed over the same recent blockhash.
pub struct SandwichBracket {
    pub front_run: Transaction,
    pub back_run: Transaction,
    pub plan: BracketPlan,
}

pub struct SandwichTxBuilder {
    keypair: Arc<Keypair>,
    max_slippage: f64,
}

/// Chain the three swaps of a bracket over projected reserves.
pub fn simulate_bracket(
    pool: &PoolSnapshot,
    front_run_amount: u64,
    target_amount: u64,
) -> Result<BracketPlan> {
    let front = math::quote(
        pool.base_reserve,
        pool.quote_reserve,
        front_run_amount,
        pool.fee_rate_bps,
    )?;
    let (base_1, quote_1) = math::apply_swap(
        pool.base_reserve,
        pool.quote_reserve,
        front_run_amount,
        front.amount_out,
    );

    let target = math::quote(base_1, quote_1, target_amount, pool.fee_rate_bps)?;
    let (base_2, quote_2) = math::apply_swap(base_1, quote_1, target_amount, target.amount_out);

    // Back-run input is exactly the front-run output, swapped in the
    // opposite direction.
    let back = math::quote(quote_2, base_2, front.amount_out, pool.fee_rate_bps)?;

    let profit = back.amount_out as i128 - front_run_amount as i128;
    let profit_ratio = profit as f64 / front_run_amount as f64;

    Ok(BracketPlan {
        front_run_out: front.amount_out,
        target_out: target.amount_out,
        expected_back_run_out: back.amount_out,
        profit,
        profit_ratio,
    })
}

impl SandwichTxBuilder {
    pub fn new(keypair: Arc<Keypair>, config: &Config) -> Self {
        Self {
            keypair,
            max_slippage: config.max_slippage,
        }
    }

    /// Build both signed legs for an accepted opportunity. Fails with
    /// `Unprofitable` when the simulated round trip does not clear
    /// `MIN_BRACKET_PROFIT_RATIO`.
    pub fn build_bracket(
        &self,
        opportunity: &SandwichOpportunity,
        pool: &PoolSnapshot,
        trade: &PendingSwap,
        recent_blockhash: Hash,
    ) -> Result<SandwichBracket> {
        let plan = simulate_bracket(pool, opportunity.front_run_amount, trade.amount_in)?;
        if plan.profit_ratio < MIN_BRACKET_PROFIT_RATIO {
            return Err(SandwichError::Unprofitable(format!(
                "bracket ratio {:.4} below minimum {:.2} for pool {}",
                plan.profit_ratio,
                MIN_BRACKET_PROFIT_RATIO,
                pool.pair()
            )));
        }

        let pool_key = parse_key("pool", &pool.pool_id)?;
        let base_mint = parse_key("base mint", &pool.base_mint)?;
        let quote_mint = parse_key("quote mint", &pool.quote_mint)?;

        // Front run buys quote with base ahead of the target.
        let front_min_out = apply_slippage(plan.front_run_out, self.max_slippage);
        let front_run = self.build_swap_tx(
            pool_key,
            base_mint,
            quote_mint,
            opportunity.front_run_amount,
            front_min_out,
            recent_blockhash,
        );

        // Back run sells the front-run output back after the target lands.
        let back_min_out = apply_slippage(plan.expected_back_run_out, self.max_slippage);
        let back_run = self.build_swap_tx(
            pool_key,
            quote_mint,
            base_mint,
            plan.front_run_out,
            back_min_out,
            recent_blockhash,
        );

        info!(
            "🔨 Bracket built for {}: front {} in / {} min out, back {} in / {} min out, expected profit {}",
            pool.pair(),
            opportunity.front_run_amount,
            front_min_out,
            plan.front_run_out,
            back_min_out,
            plan.profit
        );

        Ok(SandwichBracket {
            front_run,
            back_run,
            plan,
        })
    }

    fn build_swap_tx(
        &self,
        pool: Pubkey,
        mint_in: Pubkey,
        mint_out: Pubkey,
        amount_in: u64,
        minimum_out: u64,
        recent_blockhash: Hash,
    ) -> Transaction {
        let mut data = Vec::with_capacity(17);
        data.push(SWAP_INSTRUCTION_TAG);
        data.extend_from_slice(&amount_in.to_le_bytes());
        data.extend_from_slice(&minimum_out.to_le_bytes());

        let instruction = Instruction {
            program_id: *RAYDIUM_AMM_PROGRAM,
            accounts: vec![
                AccountMeta::new(self.keypair.pubkey(), true),
                AccountMeta::new(pool, false),
                AccountMeta::new_readonly(mint_in, false),
                AccountMeta::new_readonly(mint_out, false),
                AccountMeta::new_readonly(spl_token::id(), false),
            ],
            data,
        };
        debug!(
            "Swap instruction: {} in, {} min out, payer {}",
            amount_in,
            minimum_out,
            self.keypair.pubkey()
        );

        Transaction::new_signed_with_payer(
            &[instruction],
            Some(&self.keypair.pubkey()),
            &[self.keypair.as_ref()],
            recent_blockhash,
        )
    }
}

fn apply_slippage(expected: u64, max_slippage: f64) -> u64 {
    (expected as f64 * (1.0 - max_slippage)).floor() as u64
}

fn parse_key(label: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| SandwichError::InstructionError(format!("bad {} address {}: {}", label, value, e)))
}
