// src/solana/rpc.rs
use crate::error::{Result, SandwichError};
use log::{debug, info, warn};
use rand::Rng;
use solana_client::nonblocking::rpc_client::RpcClient as NonBlockingRpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

const DEFAULT_COMMITMENT: CommitmentConfig = CommitmentConfig::confirmed();
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Transport counters kept by the RPC wrapper, reported at session end.
#[derive(Debug, Clone, Default)]
pub struct RpcStats {
    pub transactions_sent: u64,
    pub transactions_confirmed: u64,
    pub transactions_failed: u64,
    pub average_confirmation_time_secs: f64,
}

/// High-availability RPC wrapper with retries and fallback endpoints.
pub struct SolanaRpcClient {
    primary_client: Arc<NonBlockingRpcClient>,
    fallback_clients: Vec<Arc<NonBlockingRpcClient>>,
    max_retries: usize,
    retry_delay: Duration,
    stats: tokio::sync::Mutex<RpcStats>,
}

impl SolanaRpcClient {
    pub fn new(
        primary_endpoint: &str,
        fallback_endpoints: Vec<String>,
        max_retries: usize,
        retry_delay: Duration,
    ) -> Self {
        let primary_client = Arc::new(NonBlockingRpcClient::new_with_commitment(
            primary_endpoint.to_string(),
            DEFAULT_COMMITMENT,
        ));
        let fallback_clients = fallback_endpoints
            .iter()
            .map(|url| {
                Arc::new(NonBlockingRpcClient::new_with_commitment(
                    url.clone(),
                    DEFAULT_COMMITMENT,
                ))
            })
            .collect();

        Self {
            primary_client,
            fallback_clients,
            max_retries,
            retry_delay,
            stats: tokio::sync::Mutex::new(RpcStats::default()),
        }
    }

    async fn execute_with_retry_and_fallback<F, Fut, T>(
        &self,
        operation_name: &str,
        mut rpc_call_fn: F,
    ) -> Result<T>
    where
        F: FnMut(Arc<NonBlockingRpcClient>) -> Fut,
        Fut: std::future::Future<
                Output = std::result::Result<T, solana_client::client_error::ClientError>,
            > + Send,
        T: Send,
    {
        let mut last_error: Option<solana_client::client_error::ClientError> = None;

        for attempt in 0..self.max_retries {
            match rpc_call_fn(Arc::clone(&self.primary_client)).await {
                Ok(result) => {
                    debug!(
                        "[RPC - {}] Primary client succeeded on attempt {}",
                        operation_name,
                        attempt + 1
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "[RPC - {}] Primary client attempt {}/{} failed: {}",
                        operation_name,
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries - 1 {
                        let mut delay_ms = self.retry_delay.as_millis() as u64;
                        if delay_ms > 0 {
                            let jitter = rand::thread_rng().gen_range(0..(delay_ms / 4).max(1));
                            delay_ms += jitter;
                        }
                        sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        for (i, fallback_client) in self.fallback_clients.iter().enumerate() {
            debug!(
                "[RPC - {}] Attempting with fallback client #{}",
                operation_name,
                i + 1
            );
            match rpc_call_fn(Arc::clone(fallback_client)).await {
                Ok(result) => {
                    info!(
                        "[RPC - {}] Fallback client #{} succeeded.",
                        operation_name,
                        i + 1
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "[RPC - {}] Fallback client #{} failed: {}",
                        operation_name,
                        i + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => SandwichError::RpcError(format!(
                "[RPC - {}] All RPC attempts failed: {}",
                operation_name, e
            )),
            None => SandwichError::RpcError(format!(
                "[RPC - {}] All RPC attempts failed.",
                operation_name
            )),
        })
    }

    /// SOL balance of an account, in whole SOL.
    pub async fn get_balance(&self, pubkey: &Pubkey) -> Result<f64> {
        let op_name = format!("get_balance({})", pubkey);
        let lamports = self
            .execute_with_retry_and_fallback(&op_name, |client| {
                let key = *pubkey;
                async move { client.get_balance(&key).await }
            })
            .await?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }

    pub async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.execute_with_retry_and_fallback("get_latest_blockhash", |client| async move {
            client.get_latest_blockhash().await
        })
        .await
    }

    /// Submit a signed transaction. Counting is done here so the coordinator
    /// does not have to remember to update transport stats on every path.
    pub async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        let result = self
            .execute_with_retry_and_fallback("send_transaction", |client| {
                let tx = transaction.clone();
                async move { client.send_transaction(&tx).await }
            })
            .await;

        let mut stats = self.stats.lock().await;
        match &result {
            Ok(signature) => {
                stats.transactions_sent += 1;
                info!("✅ Transaction sent: {}", signature);
            }
            Err(_) => stats.transactions_failed += 1,
        }
        result
    }

    /// Poll signature status until it is confirmed or `timeout_secs` elapses.
    /// A timeout is a normal outcome (`Ok(false)`), not a transport error.
    pub async fn confirm_transaction(
        &self,
        signature: &Signature,
        timeout_secs: u64,
    ) -> Result<bool> {
        let started = Instant::now();
        let deadline = Duration::from_secs(timeout_secs);

        while started.elapsed() < deadline {
            match self
                .primary_client
                .get_signature_statuses(&[*signature])
                .await
            {
                Ok(response) => {
                    if let Some(Some(status)) = response.value.first() {
                        if status.confirmation_status.is_some() {
                            let elapsed = started.elapsed().as_secs_f64();
                            let mut stats = self.stats.lock().await;
                            stats.transactions_confirmed += 1;
                            let n = stats.transactions_confirmed as f64;
                            stats.average_confirmation_time_secs =
                                (stats.average_confirmation_time_secs * (n - 1.0) + elapsed) / n;
                            info!("✅ Transaction confirmed in {:.2}s: {}", elapsed, signature);
                            return Ok(true);
                        }
                    }
                }
                Err(e) => {
                    warn!("Error checking confirmation for {}: {}", signature, e);
                }
            }
            sleep(Duration::from_secs(1)).await;
        }

        warn!("⏰ Confirmation timeout after {}s: {}", timeout_secs, signature);
        Ok(false)
    }

    pub async fn stats(&self) -> RpcStats {
        self.stats.lock().await.clone()
    }

    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        info!("📊 RPC client statistics:");
        info!("   Transactions sent:      {}", stats.transactions_sent);
        info!("   Transactions confirmed: {}", stats.transactions_confirmed);
        info!("   Transactions failed:    {}", stats.transactions_failed);
        info!(
            "   Avg confirmation time:  {:.2}s",
            stats.average_confirmation_time_secs
        );
    }
}
