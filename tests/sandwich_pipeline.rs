// tests/sandwich_pipeline.rs
//! End-to-end pipeline tests: evaluation through bracket construction and
//! sequenced execution against a scripted ledger.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use solana_sandwich_bot::config::Config;
use solana_sandwich_bot::dex::raydium::PoolSnapshot;
use solana_sandwich_bot::error::{Result, SandwichError};
use solana_sandwich_bot::sandwich::{
    builder::SandwichTxBuilder, evaluator, executor::LedgerRpc, AttemptOutcome, PendingSwap,
    SandwichExecutor, SessionStats,
};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn test_config() -> Config {
    Config {
        rpc_url: "https://api.devnet.solana.com".to_string(),
        rpc_url_backup: None,
        rpc_max_retries: Some(1),
        rpc_retry_delay_ms: Some(10),
        ws_url: "ws://127.0.0.1:9".to_string(),
        solana_network: "devnet".to_string(),
        trader_wallet_keypair_path: String::new(),
        min_profit_threshold: 0.001,
        max_slippage: 0.02,
        max_position_size: 1_000_000.0,
        fee_per_transaction: 0.001,
        subscription_ack_timeout_secs: 1,
        stream_idle_timeout_secs: 2,
        poll_interval_secs: 1,
        front_run_confirm_timeout_secs: 1,
        back_run_confirm_timeout_secs: 1,
        pool_cache_ttl_secs: 300,
        run_duration_secs: 5,
        simulation_mode: false,
    }
}

fn deep_pool() -> PoolSnapshot {
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

fn target_trade(amount_in: u64) -> PendingSwap {
    PendingSwap {
        signature: "victim_sig".to_string(),
        user_wallet: "victim".to_string(),
        token_in: "SOL".to_string(),
        token_out: "USDC".to_string(),
        amount_in,
        pool_id: deep_pool().pool_id,
        estimated_price_impact: 0.0,
        timestamp_ms: 0,
    }
}

// --- Scripted ledger double -------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum LegBehavior {
    Confirm,
    SubmitFails,
    NeverConfirms,
}

struct ScriptedLedger {
    front: LegBehavior,
    back: LegBehavior,
    balance: Option<f64>,
    calls: Mutex<Vec<String>>,
    sends: Mutex<u32>,
}

impl ScriptedLedger {
    fn new(front: LegBehavior, back: LegBehavior) -> Arc<Self> {
        Arc::new(Self {
            front,
            back,
            balance: None,
            calls: Mutex::new(Vec::new()),
            sends: Mutex::new(0),
        })
    }

    fn with_balance(front: LegBehavior, back: LegBehavior, balance: f64) -> Arc<Self> {
        Arc::new(Self {
            front,
            back,
            balance: Some(balance),
            calls: Mutex::new(Vec::new()),
            sends: Mutex::new(0),
        })
    }

    async fn call_log(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LedgerRpc for ScriptedLedger {
    async fn send_transaction(&self, _transaction: &Transaction) -> Result<Signature> {
        let mut sends = self.sends.lock().await;
        *sends += 1;
        let leg = if *sends == 1 { "front" } else { "back" };
        let behavior = if *sends == 1 { self.front } else { self.back };
        self.calls.lock().await.push(format!("send_{}", leg));
        match behavior {
            LegBehavior::SubmitFails => Err(SandwichError::RpcError(format!(
                "{} leg rejected by node",
                leg
            ))),
            _ => Ok(Signature::new_unique()),
        }
    }

    async fn confirm_transaction(&self, _signature: &Signature, _timeout_secs: u64) -> Result<bool> {
        let sends = *self.sends.lock().await;
        let leg = if sends <= 1 { "front" } else { "back" };
        let behavior = if sends <= 1 { self.front } else { self.back };
        self.calls.lock().await.push(format!("confirm_{}", leg));
        match behavior {
            LegBehavior::Confirm => Ok(true),
            LegBehavior::NeverConfirms => Ok(false),
            LegBehavior::SubmitFails => Ok(false),
        }
    }

    async fn get_balance(&self, _pubkey: &Pubkey) -> Result<f64> {
        match self.balance {
            Some(balance) => Ok(balance),
            None => Err(SandwichError::RpcError("no balance in test".to_string())),
        }
    }
}

async fn run_attempt(
    front: LegBehavior,
    back: LegBehavior,
) -> (
    Arc<ScriptedLedger>,
    Arc<Mutex<SessionStats>>,
    solana_sandwich_bot::sandwich::SandwichAttempt,
) {
    let config = Arc::new(test_config());
    let pool = deep_pool();
    // Large enough that the bracket's simulated round trip clears the
    // builder's minimum profit ratio.
    let trade = target_trade(100_000);

    let opportunity =
        evaluator::evaluate(&trade, &pool, &config).expect("scenario trade must be accepted");
    let keypair = Arc::new(Keypair::new());
    let builder = SandwichTxBuilder::new(keypair.clone(), &config);
    let bracket = builder
        .build_bracket(&opportunity, &pool, &trade, Hash::default())
        .expect("bracket must build");

    let ledger = ScriptedLedger::new(front, back);
    let stats = Arc::new(Mutex::new(SessionStats::default()));
    let executor = SandwichExecutor::new(
        ledger.clone(),
        config,
        stats.clone(),
        keypair.pubkey(),
    );
    let attempt = executor.execute(bracket, opportunity, &pool).await;
    (ledger, stats, attempt)
}

// --- Evaluation scenario ----------------------------------------------------

#[test]
fn deep_pool_scenario_is_accepted_at_low_threshold() {
    let config = test_config();
    let opportunity = evaluator::evaluate(&target_trade(5_000), &deep_pool(), &config)
        .expect("net profit clears 0.001");
    assert_eq!(opportunity.front_run_amount, 1_000);
    assert!(opportunity.net_profit() > config.min_profit_threshold);
}

#[test]
fn deep_pool_scenario_is_rejected_at_extreme_threshold() {
    let mut config = test_config();
    config.min_profit_threshold = 1.0;
    assert!(evaluator::evaluate(&target_trade(5_000), &deep_pool(), &config).is_none());
}

#[test]
fn builder_vetoes_modest_target_accepted_by_evaluator() {
    // The evaluator's estimate clears the session threshold, but the full
    // three-swap simulation shows the round trip barely beats the fees, so
    // no transactions are built.
    let config = test_config();
    let pool = deep_pool();
    let trade = target_trade(5_000);
    let opportunity = evaluator::evaluate(&trade, &pool, &config).unwrap();

    let builder = SandwichTxBuilder::new(Arc::new(Keypair::new()), &config);
    let err = builder
        .build_bracket(&opportunity, &pool, &trade, Hash::default())
        .unwrap_err();
    assert!(matches!(err, SandwichError::Unprofitable(_)));
}

// --- Execution state machine ------------------------------------------------

#[tokio::test]
async fn clean_run_confirms_both_legs_in_order() {
    let (ledger, stats, attempt) = run_attempt(LegBehavior::Confirm, LegBehavior::Confirm).await;

    assert_eq!(attempt.outcome, AttemptOutcome::Success);
    assert!(attempt.front_run_signature.is_some());
    assert!(attempt.back_run_signature.is_some());
    assert!(attempt.failure_reason.is_none());
    // Realized profit is the bracket plan's surplus, positive for this
    // scenario.
    assert!(attempt.actual_profit > 0.0);

    let calls = ledger.call_log().await;
    assert_eq!(
        calls,
        vec!["send_front", "confirm_front", "send_back", "confirm_back"]
    );

    let stats = stats.lock().await;
    assert_eq!(stats.sandwiches_attempted, 1);
    assert_eq!(stats.successful_sandwiches, 1);
    assert!(stats.total_fees_spent > 0.0);
}

#[tokio::test]
async fn rejected_front_run_never_submits_back_run() {
    let (ledger, stats, attempt) =
        run_attempt(LegBehavior::SubmitFails, LegBehavior::Confirm).await;

    assert_eq!(attempt.outcome, AttemptOutcome::Failure);
    assert!(attempt.front_run_signature.is_none());
    assert!(attempt.back_run_signature.is_none());
    assert_eq!(attempt.actual_profit, 0.0);

    let calls = ledger.call_log().await;
    assert_eq!(calls, vec!["send_front"]);

    let stats = stats.lock().await;
    assert_eq!(stats.sandwiches_attempted, 1);
    assert_eq!(stats.successful_sandwiches, 0);
    assert_eq!(stats.partial_failures, 0);
    // No leg made it out, so no fee is recorded.
    assert_eq!(stats.total_fees_spent, 0.0);
}

#[tokio::test]
async fn unconfirmed_front_run_abandons_the_bracket() {
    let (ledger, stats, attempt) =
        run_attempt(LegBehavior::NeverConfirms, LegBehavior::Confirm).await;

    assert_eq!(attempt.outcome, AttemptOutcome::Failure);
    assert!(attempt.front_run_signature.is_some());
    assert!(attempt.back_run_signature.is_none());

    let calls = ledger.call_log().await;
    assert_eq!(calls, vec!["send_front", "confirm_front"]);

    let stats = stats.lock().await;
    assert_eq!(stats.sandwiches_attempted, 1);
    assert!(stats.total_fees_spent > 0.0);
}

#[tokio::test]
async fn rejected_back_run_is_a_partial_failure_with_exposure() {
    let (ledger, stats, attempt) =
        run_attempt(LegBehavior::Confirm, LegBehavior::SubmitFails).await;

    assert_eq!(attempt.outcome, AttemptOutcome::PartialFailure);
    assert!(attempt.front_run_signature.is_some());
    assert!(attempt.back_run_signature.is_none());
    // The open position is carried as a loss of at least the front-run size.
    assert!(attempt.actual_profit <= -(attempt.opportunity.front_run_amount as f64));

    let calls = ledger.call_log().await;
    assert_eq!(calls, vec!["send_front", "confirm_front", "send_back"]);

    let stats = stats.lock().await;
    assert_eq!(stats.partial_failures, 1);
    assert!(stats.net_profit() < 0.0);
}

#[tokio::test]
async fn unconfirmed_back_run_is_a_partial_failure() {
    let (ledger, stats, attempt) =
        run_attempt(LegBehavior::Confirm, LegBehavior::NeverConfirms).await;

    assert_eq!(attempt.outcome, AttemptOutcome::PartialFailure);
    assert!(attempt.front_run_signature.is_some());
    assert!(attempt.back_run_signature.is_some());
    assert!(attempt.actual_profit < 0.0);

    let calls = ledger.call_log().await;
    assert_eq!(
        calls,
        vec!["send_front", "confirm_front", "send_back", "confirm_back"]
    );

    let stats = stats.lock().await;
    assert_eq!(stats.partial_failures, 1);
}

#[tokio::test]
async fn recorded_profit_stays_in_pool_units_despite_wallet_delta() {
    // Both legs confirm and balance reads succeed. The recorded profit must
    // still be the plan surplus in pool units, not the SOL balance delta,
    // so it stays comparable with exposure and fee figures in the stats.
    let config = Arc::new(test_config());
    let pool = deep_pool();
    let trade = target_trade(100_000);

    let opportunity = evaluator::evaluate(&trade, &pool, &config).unwrap();
    let keypair = Arc::new(Keypair::new());
    let builder = SandwichTxBuilder::new(keypair.clone(), &config);
    let bracket = builder
        .build_bracket(&opportunity, &pool, &trade, Hash::default())
        .unwrap();
    let plan_profit = bracket.plan.profit as f64;
    assert!(plan_profit > 0.0);

    let ledger = ScriptedLedger::with_balance(LegBehavior::Confirm, LegBehavior::Confirm, 10.0);
    let stats = Arc::new(Mutex::new(SessionStats::default()));
    let executor = SandwichExecutor::new(ledger, config, stats.clone(), keypair.pubkey());
    let attempt = executor.execute(bracket, opportunity, &pool).await;

    assert_eq!(attempt.outcome, AttemptOutcome::Success);
    assert_eq!(attempt.actual_profit, plan_profit);
    assert_eq!(stats.lock().await.total_profit, plan_profit);
}

// --- Simulation path --------------------------------------------------------

#[tokio::test]
async fn simulation_mode_never_touches_the_ledger() {
    let mut config = test_config();
    config.simulation_mode = true;
    let config = Arc::new(config);
    let pool = deep_pool();
    let trade = target_trade(100_000);

    let opportunity = evaluator::evaluate(&trade, &pool, &config).unwrap();
    let keypair = Arc::new(Keypair::new());
    let builder = SandwichTxBuilder::new(keypair.clone(), &config);
    let bracket = builder
        .build_bracket(&opportunity, &pool, &trade, Hash::default())
        .unwrap();

    let ledger = ScriptedLedger::new(LegBehavior::Confirm, LegBehavior::Confirm);
    let stats = Arc::new(Mutex::new(SessionStats::default()));
    let executor = SandwichExecutor::new(ledger.clone(), config, stats.clone(), keypair.pubkey());
    let attempt = executor.execute(bracket, opportunity, &pool).await;

    assert!(ledger.call_log().await.is_empty());
    assert!(attempt.front_run_signature.unwrap().starts_with("sim_front_"));
    assert_eq!(stats.lock().await.sandwiches_attempted, 1);
}

// --- Feed degradation -------------------------------------------------------

#[tokio::test]
async fn unreachable_stream_degrades_to_polling_fallback() {
    use solana_sandwich_bot::dex::RaydiumClient;
    use solana_sandwich_bot::sandwich::{FeedState, MempoolFeed};
    use tokio::sync::{mpsc, watch};

    // Streaming cannot connect; the devnet pool set backs the fallback,
    // and with simulation off candidates are deterministic per tick.
    let config = Arc::new(test_config());
    let pools = Arc::new(RaydiumClient::new(config.clone()));
    pools.get_pools().await.expect("devnet pools load offline");

    let feed = Arc::new(MempoolFeed::new(config, pools));
    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = {
        let feed = feed.clone();
        tokio::spawn(async move { feed.run(tx, shutdown_rx).await })
    };

    let candidate = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("fallback must produce a candidate in time")
        .expect("channel stays open");
    assert!(candidate.amount_in > 0);
    assert!(candidate.signature.starts_with("poll_"));
    assert_eq!(feed.state().await, FeedState::PollingFallback);

    shutdown_tx.send(true).expect("feed still listening");
    let result = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .expect("feed stops on shutdown")
        .expect("feed task must not panic");
    assert!(result.is_ok());
    assert_eq!(feed.state().await, FeedState::Stopped);
}
