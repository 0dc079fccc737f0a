// src/sandwich/executor.rs
//! Sequenced bracket execution.
//!
//! The two legs are strictly ordered: the back run is never submitted before
//! the front run is confirmed. A failed or unconfirmed front run ends the
//! attempt as a clean failure; a failed or unconfirmed back run leaves the
//! front-run position open and is reported as a partial failure. Legs are
//! never retried inside an attempt.

use crate::config::Config;
use crate::dex::raydium::PoolSnapshot;
use crate::error::Result;
use crate::sandwich::builder::SandwichBracket;
use crate::sandwich::types::{AttemptOutcome, SandwichAttempt, SandwichOpportunity, SessionStats};
use crate::solana::SolanaRpcClient;
use crate::utils::now_millis;
use async_trait::async_trait;
use log::{error, info, warn};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// The slice of the ledger the executor needs. Kept narrow so execution
/// paths can be driven by a scripted double in tests.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature>;
    async fn confirm_transaction(&self, signature: &Signature, timeout_secs: u64) -> Result<bool>;
    async fn get_balance(&self, pubkey: &Pubkey) -> Result<f64>;
}

#[async_trait]
impl LedgerRpc for SolanaRpcClient {
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        SolanaRpcClient::send_transaction(self, transaction).await
    }

    async fn confirm_transaction(&self, signature: &Signature, timeout_secs: u64) -> Result<bool> {
        SolanaRpcClient::confirm_transaction(self, signature, timeout_secs).await
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<f64> {
        SolanaRpcClient::get_balance(self, pubkey).await
    }
}

pub struct SandwichExecutor {
    rpc: Arc<dyn LedgerRpc>,
    config: Arc<Config>,
    stats: Arc<Mutex<SessionStats>>,
    wallet: Pubkey,
}

impl SandwichExecutor {
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        config: Arc<Config>,
        stats: Arc<Mutex<SessionStats>>,
        wallet: Pubkey,
    ) -> Self {
        Self {
            rpc,
            config,
            stats,
            wallet,
        }
    }

    /// Run one bracket to completion. Every call records exactly one
    /// attempt in the session stats, whatever the outcome.
    pub async fn execute(
        &self,
        bracket: SandwichBracket,
        opportunity: SandwichOpportunity,
        pool: &PoolSnapshot,
    ) -> SandwichAttempt {
        let attempt = if self.config.simulation_mode {
            self.execute_simulated(opportunity, pool).await
        } else {
            self.execute_live(bracket, opportunity, pool).await
        };
        self.stats.lock().await.record_attempt(&attempt);
        attempt
    }

    async fn execute_live(
        &self,
        bracket: SandwichBracket,
        opportunity: SandwichOpportunity,
        pool: &PoolSnapshot,
    ) -> SandwichAttempt {
        let started = Instant::now();
        let balance_before = self.rpc.get_balance(&self.wallet).await.ok();

        info!(
            "🥪 Executing bracket on {} (target {})",
            pool.pair(),
            opportunity.target_signature
        );

        let front_sig = match self.rpc.send_transaction(&bracket.front_run).await {
            Ok(sig) => sig,
            Err(e) => {
                error!("❌ Front-run submission failed: {}", e);
                return SandwichAttempt {
                    opportunity,
                    front_run_signature: None,
                    back_run_signature: None,
                    actual_profit: 0.0,
                    execution_time: started.elapsed(),
                    outcome: AttemptOutcome::Failure,
                    failure_reason: Some(format!("front-run submission failed: {}", e)),
                };
            }
        };
        info!("📤 Front run submitted: {}", front_sig);

        match self
            .rpc
            .confirm_transaction(&front_sig, self.config.front_run_confirm_timeout_secs)
            .await
        {
            Ok(true) => info!("✅ Front run confirmed: {}", front_sig),
            Ok(false) => {
                warn!(
                    "❌ Front run not confirmed within {}s, abandoning bracket",
                    self.config.front_run_confirm_timeout_secs
                );
                return SandwichAttempt {
                    opportunity,
                    front_run_signature: Some(front_sig.to_string()),
                    back_run_signature: None,
                    actual_profit: 0.0,
                    execution_time: started.elapsed(),
                    outcome: AttemptOutcome::Failure,
                    failure_reason: Some("front-run confirmation timed out".to_string()),
                };
            }
            Err(e) => {
                error!("❌ Front-run confirmation failed: {}", e);
                return SandwichAttempt {
                    opportunity,
                    front_run_signature: Some(front_sig.to_string()),
                    back_run_signature: None,
                    actual_profit: 0.0,
                    execution_time: started.elapsed(),
                    outcome: AttemptOutcome::Failure,
                    failure_reason: Some(format!("front-run confirmation failed: {}", e)),
                };
            }
        }

        // Front-run position is now open. Anything going wrong from here
        // is a partial failure carrying that exposure.
        let exposure = -(opportunity.front_run_amount as f64);

        let back_sig = match self.rpc.send_transaction(&bracket.back_run).await {
            Ok(sig) => sig,
            Err(e) => {
                error!("⚠️ Back-run submission failed, position left open: {}", e);
                return SandwichAttempt {
                    opportunity,
                    front_run_signature: Some(front_sig.to_string()),
                    back_run_signature: None,
                    actual_profit: exposure,
                    execution_time: started.elapsed(),
                    outcome: AttemptOutcome::PartialFailure,
                    failure_reason: Some(format!("back-run submission failed: {}", e)),
                };
            }
        };
        info!("📤 Back run submitted: {}", back_sig);

        let back_confirmed = self
            .rpc
            .confirm_transaction(&back_sig, self.config.back_run_confirm_timeout_secs)
            .await;
        match back_confirmed {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                let reason = match back_confirmed {
                    Ok(false) => "back-run confirmation timed out".to_string(),
                    Err(e) => format!("back-run confirmation failed: {}", e),
                    Ok(true) => unreachable!(),
                };
                warn!("⚠️ {}, position left open", reason);
                return SandwichAttempt {
                    opportunity,
                    front_run_signature: Some(front_sig.to_string()),
                    back_run_signature: Some(back_sig.to_string()),
                    actual_profit: exposure,
                    execution_time: started.elapsed(),
                    outcome: AttemptOutcome::PartialFailure,
                    failure_reason: Some(reason),
                };
            }
        }

        // Profit is recorded in input-asset units of the bracketed pool so
        // it stays comparable with the fee and exposure figures. The wallet
        // movement in SOL is logged, never folded into the stats.
        if let (Some(before), Ok(after)) =
            (balance_before, self.rpc.get_balance(&self.wallet).await)
        {
            info!("💳 Wallet moved {:+.6} SOL over the bracket", after - before);
        }
        let actual_profit = bracket.plan.profit as f64;

        info!(
            "🎉 Sandwich complete on {}: profit {:.6} in {:?}",
            pool.pair(),
            actual_profit,
            started.elapsed()
        );

        SandwichAttempt {
            opportunity,
            front_run_signature: Some(front_sig.to_string()),
            back_run_signature: Some(back_sig.to_string()),
            actual_profit,
            execution_time: started.elapsed(),
            outcome: AttemptOutcome::Success,
            failure_reason: None,
        }
    }

    /// Simulated execution path. All randomness in the pipeline lives here,
    /// strictly behind the simulation flag.
    async fn execute_simulated(
        &self,
        opportunity: SandwichOpportunity,
        pool: &PoolSnapshot,
    ) -> SandwichAttempt {
        use rand::Rng;
        let started = Instant::now();
        let stamp = now_millis();

        let (success, variance) = {
            let mut rng = rand::thread_rng();
            (rng.gen::<f64>() < 0.8, rng.gen_range(0.8..1.2))
        };

        if success {
            let actual_profit = opportunity.estimated_profit * variance;
            info!(
                "🎉 [SIM] Sandwich complete on {}: profit {:.6}",
                pool.pair(),
                actual_profit
            );
            SandwichAttempt {
                opportunity,
                front_run_signature: Some(format!("sim_front_{}", stamp)),
                back_run_signature: Some(format!("sim_back_{}", stamp)),
                actual_profit,
                execution_time: started.elapsed(),
                outcome: AttemptOutcome::Success,
                failure_reason: None,
            }
        } else {
            warn!("❌ [SIM] Front run dropped on {}", pool.pair());
            SandwichAttempt {
                opportunity,
                front_run_signature: Some(format!("sim_front_{}", stamp)),
                back_run_signature: None,
                actual_profit: 0.0,
                execution_time: started.elapsed(),
                outcome: AttemptOutcome::Failure,
                failure_reason: Some("simulated front-run drop".to_string()),
            }
        }
    }
}
