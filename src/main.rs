// src/main.rs

use log::{error, info, warn};
use solana_sandwich_bot::config;
use solana_sandwich_bot::dex::RaydiumClient;
use solana_sandwich_bot::sandwich::{
    evaluator, MempoolFeed, SandwichExecutor, SandwichTxBuilder, SessionStats,
};
use solana_sandwich_bot::solana::SolanaRpcClient;
use solana_sandwich_bot::utils::setup_logging;
use solana_sandwich_bot::wallet::WalletManager;
use solana_sdk::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging()?;
    info!("🥪 Solana sandwich bot starting...");

    let config = config::load_config()?;

    let wallet = match WalletManager::load_from_file(&config.trader_wallet_keypair_path) {
        Ok(wallet) => wallet,
        Err(e) if config.simulation_mode => {
            warn!("⚠️ Wallet load failed ({}), using ephemeral keypair for simulation", e);
            WalletManager::ephemeral()
        }
        Err(e) => return Err(e.into()),
    };
    info!("🔑 Trading wallet: {}", wallet.pubkey());

    let rpc = Arc::new(SolanaRpcClient::new(
        &config.rpc_url,
        config.rpc_url_backup.clone().unwrap_or_default(),
        config.rpc_max_retries.unwrap_or(3),
        Duration::from_millis(config.rpc_retry_delay_ms.unwrap_or(500)),
    ));
    if let Err(e) = wallet.check_balance(&rpc).await {
        warn!("⚠️ Balance check failed: {}", e);
    }

    let pools = Arc::new(RaydiumClient::new(config.clone()));
    match pools.get_pools().await {
        Ok(loaded) => info!("🏊 Loaded {} pools", loaded.len()),
        Err(e) => warn!("⚠️ Initial pool load failed: {}", e),
    }
    pools.log_pool_summary().await;

    let stats = Arc::new(Mutex::new(SessionStats::default()));
    let builder = SandwichTxBuilder::new(wallet.keypair(), &config);
    let executor = SandwichExecutor::new(
        rpc.clone(),
        config.clone(),
        stats.clone(),
        wallet.pubkey(),
    );

    let (swap_tx, mut swap_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed = Arc::new(MempoolFeed::new(config.clone(), pools.clone()));
    let feed_handle = {
        let feed = feed.clone();
        tokio::spawn(async move { feed.run(swap_tx, shutdown_rx).await })
    };

    info!("⏱️ Session runs for {}s", config.run_duration_secs);
    let deadline = tokio::time::sleep(Duration::from_secs(config.run_duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("⏱️ Session duration reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Interrupt received");
                break;
            }
            swap = swap_rx.recv() => {
                let swap = match swap {
                    Some(swap) => swap,
                    None => {
                        warn!("Feed channel closed");
                        break;
                    }
                };
                stats.lock().await.record_opportunity();

                let pool = match pools.get_pool(&swap.pool_id).await {
                    Some(pool) => pool,
                    None => {
                        warn!("Pool {} not in cache, skipping {}", swap.pool_id, swap.signature);
                        continue;
                    }
                };

                let opportunity = match evaluator::evaluate(&swap, &pool, &config) {
                    Some(opportunity) => opportunity,
                    None => continue,
                };
                info!(
                    "💰 Opportunity on {}: est profit {:.6}, confidence {:.0}%",
                    pool.pair(),
                    opportunity.estimated_profit,
                    opportunity.confidence_score
                );

                let blockhash = if config.simulation_mode {
                    Hash::default()
                } else {
                    match rpc.get_latest_blockhash().await {
                        Ok(hash) => hash,
                        Err(e) => {
                            error!("❌ Blockhash fetch failed: {}", e);
                            continue;
                        }
                    }
                };

                let bracket = match builder.build_bracket(&opportunity, &pool, &swap, blockhash) {
                    Ok(bracket) => bracket,
                    Err(e) => {
                        info!("Skipping bracket: {}", e);
                        continue;
                    }
                };

                executor.execute(bracket, opportunity, &pool).await;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(Duration::from_secs(3), feed_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Feed ended with error: {}", e),
        Ok(Err(e)) => warn!("Feed task panicked: {}", e),
        Err(_) => warn!("Feed did not stop in time"),
    }

    rpc.log_stats().await;
    stats.lock().await.log_final();
    info!("👋 Session complete");
    Ok(())
}
