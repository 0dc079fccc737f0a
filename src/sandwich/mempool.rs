// src/sandwich/mempool.rs
//! Pending-trade feed.
//!
//! Primary mode subscribes to the network's log stream filtered to the
//! Raydium liquidity program. When the subscription is not acknowledged in
//! time, the transport drops, or the stream goes idle, the feed degrades to
//! a polling fallback for the rest of the session; there is no automatic
//! return to streaming. Either mode delivers candidates through the same
//! channel, one send per candidate.

use crate::config::Config;
use crate::dex::raydium::{PoolSnapshot, RaydiumClient, RAYDIUM_LIQUIDITY_PROGRAM_ID};
use crate::error::{Result, SandwichError};
use crate::sandwich::types::PendingSwap;
use crate::utils::now_millis;
use base64::{engine::general_purpose, Engine as _};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    StreamingPrimary,
    PollingFallback,
    Stopped,
}

/// Why the streaming phase ended.
#[derive(Debug)]
enum StreamEnd {
    /// Stop signal observed; no fallback.
    Shutdown,
    /// Idle bound elapsed with no inbound message of any kind.
    Idle,
}

// --- Typed subscription payloads (nothing untyped flows past this file) ---

#[derive(Debug, Deserialize)]
struct LogsNotification {
    method: String,
    params: LogsParams,
}

#[derive(Debug, Deserialize)]
struct LogsParams {
    result: LogsResult,
}

#[derive(Debug, Deserialize)]
struct LogsResult {
    value: LogsValue,
}

#[derive(Debug, Deserialize)]
struct LogsValue {
    signature: String,
    #[serde(default)]
    err: Option<serde_json::Value>,
    #[serde(default)]
    logs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionReply {
    #[serde(default)]
    result: Option<u64>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Decoded `ray_log` swap entry emitted by the Raydium program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayLogSwap {
    pub amount_in: u64,
    pub minimum_out: u64,
}

const RAY_LOG_PREFIX: &str = "ray_log: ";
const RAY_LOG_SWAP_BASE_IN: u8 = 3;

/// Decode the binary `ray_log` payload of a swap-base-in instruction.
pub fn decode_ray_log(data: &[u8]) -> Result<RayLogSwap> {
    if data.len() < 17 {
        return Err(SandwichError::ParseError(format!(
            "ray_log too short: {} bytes",
            data.len()
        )));
    }
    if data[0] != RAY_LOG_SWAP_BASE_IN {
        return Err(SandwichError::ParseError(format!(
            "ray_log type {} is not a swap",
            data[0]
        )));
    }
    let amount_in = u64::from_le_bytes(data[1..9].try_into().unwrap());
    let minimum_out = u64::from_le_bytes(data[9..17].try_into().unwrap());
    if amount_in == 0 {
        return Err(SandwichError::ParseError(
            "ray_log swap with zero amount_in".to_string(),
        ));
    }
    Ok(RayLogSwap {
        amount_in,
        minimum_out,
    })
}

pub struct MempoolFeed {
    config: Arc<Config>,
    pools: Arc<RaydiumClient>,
    state: Mutex<FeedState>,
    fallback_cursor: AtomicUsize,
}

impl MempoolFeed {
    pub fn new(config: Arc<Config>, pools: Arc<RaydiumClient>) -> Self {
        Self {
            config,
            pools,
            state: Mutex::new(FeedState::Idle),
            fallback_cursor: AtomicUsize::new(0),
        }
    }

    pub async fn state(&self) -> FeedState {
        *self.state.lock().await
    }

    async fn set_state(&self, next: FeedState) {
        let mut state = self.state.lock().await;
        debug!("Feed state: {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Run the feed until the shutdown signal fires. Streaming problems are
    /// not fatal; they only force the polling fallback.
    pub async fn run(
        &self,
        tx: mpsc::Sender<PendingSwap>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.set_state(FeedState::StreamingPrimary).await;

        match self.stream_primary(&tx, &mut shutdown).await {
            Ok(StreamEnd::Shutdown) => {
                self.set_state(FeedState::Stopped).await;
                info!("⏹️ Mempool feed stopped");
                return Ok(());
            }
            Ok(StreamEnd::Idle) => {
                warn!(
                    "⚠️ No stream message in {}s, switching to polling fallback",
                    self.config.stream_idle_timeout_secs
                );
            }
            Err(e) => {
                warn!("⚠️ Streaming failed ({}), switching to polling fallback", e);
            }
        }

        if *shutdown.borrow() {
            self.set_state(FeedState::Stopped).await;
            info!("⏹️ Mempool feed stopped");
            return Ok(());
        }

        self.set_state(FeedState::PollingFallback).await;
        self.poll_fallback(&tx, &mut shutdown).await;

        self.set_state(FeedState::Stopped).await;
        info!("⏹️ Mempool feed stopped");
        Ok(())
    }

    async fn stream_primary(
        &self,
        tx: &mpsc::Sender<PendingSwap>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd> {
        info!("🔌 Connecting to log stream at {}...", self.config.ws_url);
        let (ws_stream, _) = connect_async(&self.config.ws_url)
            .await
            .map_err(|e| SandwichError::WebSocketError(format!("failed to connect: {}", e)))?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe_msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [RAYDIUM_LIQUIDITY_PROGRAM_ID] },
                { "commitment": "processed" }
            ]
        });
        write
            .send(Message::Text(subscribe_msg.to_string()))
            .await
            .map_err(|e| SandwichError::WebSocketError(format!("subscribe send failed: {}", e)))?;

        // The subscription must be acknowledged within the configured bound.
        let ack_timeout = Duration::from_secs(self.config.subscription_ack_timeout_secs);
        let ack = tokio::time::timeout(ack_timeout, read.next())
            .await
            .map_err(|_| {
                SandwichError::SubscriptionFailed(format!(
                    "no subscription acknowledgement within {}s",
                    self.config.subscription_ack_timeout_secs
                ))
            })?
            .ok_or_else(|| {
                SandwichError::WebSocketError("stream closed before acknowledgement".to_string())
            })?
            .map_err(|e| SandwichError::WebSocketError(format!("ack read failed: {}", e)))?;

        match &ack {
            Message::Text(text) => {
                let reply: SubscriptionReply = serde_json::from_str(text)?;
                if let Some(err) = reply.error {
                    return Err(SandwichError::SubscriptionFailed(format!(
                        "subscription rejected: {}",
                        err
                    )));
                }
                match reply.result {
                    Some(id) => info!("✅ Subscribed to Raydium log stream (id {})", id),
                    None => {
                        return Err(SandwichError::SubscriptionFailed(
                            "no subscription id in acknowledgement".to_string(),
                        ))
                    }
                }
            }
            other => {
                return Err(SandwichError::SubscriptionFailed(format!(
                    "unexpected acknowledgement frame: {:?}",
                    other
                )));
            }
        }

        let idle_timeout = Duration::from_secs(self.config.stream_idle_timeout_secs);
        let mut message_count = 0u64;
        let mut decoded_count = 0u64;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    // In-flight reads are simply abandoned here.
                    return Ok(StreamEnd::Shutdown);
                }
                next = tokio::time::timeout(idle_timeout, read.next()) => {
                    let frame = match next {
                        Err(_) => return Ok(StreamEnd::Idle),
                        Ok(None) => {
                            return Err(SandwichError::WebSocketError(
                                "log stream closed by server".to_string(),
                            ))
                        }
                        Ok(Some(Err(e))) => {
                            return Err(SandwichError::WebSocketError(format!(
                                "stream read failed: {}",
                                e
                            )))
                        }
                        Ok(Some(Ok(frame))) => frame,
                    };

                    // Any inbound frame resets the idle bound; only text
                    // frames can carry a notification.
                    if let Message::Text(text) = frame {
                        message_count += 1;
                        match self.decode_notification(&text).await {
                            Ok(Some(swap)) => {
                                decoded_count += 1;
                                info!(
                                    "🎯 Pending swap observed: {} -> {} amount {} ({})",
                                    swap.token_in, swap.token_out, swap.amount_in, swap.signature
                                );
                                if tx.send(swap).await.is_err() {
                                    return Ok(StreamEnd::Shutdown);
                                }
                            }
                            Ok(None) => {} // not a swap for our program; discard silently
                            Err(e) => {
                                // A malformed message never aborts the stream.
                                debug!("Skipping undecodable stream message: {}", e);
                            }
                        }
                        if message_count % 100 == 0 {
                            info!(
                                "📨 Stream messages: {} received, {} decoded as swaps",
                                message_count, decoded_count
                            );
                        }
                    }
                }
            }
        }
    }

    /// Decode one stream message into a `PendingSwap`, or `None` when the
    /// message is not a recognizable swap against the Raydium program.
    async fn decode_notification(&self, text: &str) -> Result<Option<PendingSwap>> {
        let notification: LogsNotification = match serde_json::from_str(text) {
            Ok(n) => n,
            // Not a notification at all (keepalive, late ack echo): discard.
            Err(_) => return Ok(None),
        };
        if notification.method != "logsNotification" {
            return Ok(None);
        }

        let value = notification.params.result.value;
        if value.err.as_ref().map_or(false, |e| !e.is_null()) {
            return Ok(None); // transaction already failed, nothing to bracket
        }
        if !value
            .logs
            .iter()
            .any(|l| l.contains(RAYDIUM_LIQUIDITY_PROGRAM_ID))
        {
            return Ok(None);
        }

        let ray_log = match value
            .logs
            .iter()
            .find_map(|l| l.split(RAY_LOG_PREFIX).nth(1))
        {
            Some(encoded) => encoded,
            None => return Ok(None), // mentions the program but carries no swap log
        };
        let raw = general_purpose::STANDARD
            .decode(ray_log.trim())
            .map_err(|e| SandwichError::ParseError(format!("ray_log base64: {}", e)))?;
        let swap = decode_ray_log(&raw)?;

        // The log stream does not carry the pool account, so the swap is
        // attributed to the deepest active target pool.
        let pool = match self.best_target_pool().await {
            Some(pool) => pool,
            None => {
                return Err(SandwichError::PoolNotFound(
                    "no sandwich target pool available for attribution".to_string(),
                ))
            }
        };
        let impact = crate::dex::math::quote(
            pool.base_reserve,
            pool.quote_reserve,
            swap.amount_in,
            pool.fee_rate_bps,
        )?
        .price_impact;

        Ok(Some(PendingSwap {
            signature: value.signature,
            user_wallet: "unknown".to_string(),
            token_in: pool.base_symbol.clone(),
            token_out: pool.quote_symbol.clone(),
            amount_in: swap.amount_in,
            pool_id: pool.pool_id.clone(),
            estimated_price_impact: impact,
            timestamp_ms: now_millis(),
        }))
    }

    async fn best_target_pool(&self) -> Option<PoolSnapshot> {
        self.pools
            .sandwich_targets(100_000.0)
            .await
            .ok()
            .and_then(|mut targets| {
                if targets.is_empty() {
                    None
                } else {
                    Some(targets.remove(0))
                }
            })
    }

    async fn poll_fallback(&self, tx: &mpsc::Sender<PendingSwap>, shutdown: &mut watch::Receiver<bool>) {
        info!(
            "🔄 Polling fallback active ({}s cadence)",
            self.config.poll_interval_secs
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut candidates_found = 0u64;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if let Some(swap) = self.synthesize_candidate().await {
                        candidates_found += 1;
                        info!(
                            "🎯 Fallback candidate #{}: {} -> {} amount {}",
                            candidates_found, swap.token_in, swap.token_out, swap.amount_in
                        );
                        if tx.send(swap).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        info!(
            "📊 Polling fallback done: {} candidates delivered",
            candidates_found
        );
    }

    /// One fallback candidate per tick at most.
    ///
    /// Without simulation mode the candidate is a deterministic projection of
    /// a target pool's observed turnover over one poll window; randomized
    /// synthesis stays strictly behind the simulation flag.
    async fn synthesize_candidate(&self) -> Option<PendingSwap> {
        let targets = self.pools.sandwich_targets(100_000.0).await.ok()?;
        if targets.is_empty() {
            return None;
        }

        if self.config.simulation_mode {
            // Roughly one candidate per three ticks, matching sparse devnet flow.
            let mut rng = rand::thread_rng();
            if rng.gen::<f64>() > 0.3 {
                return None;
            }
            let pool = &targets[rng.gen_range(0..targets.len())];
            let amount_in = rng.gen_range(pool.base_reserve / 2_000..pool.base_reserve / 100).max(1);
            let impact = crate::dex::math::quote(
                pool.base_reserve,
                pool.quote_reserve,
                amount_in,
                pool.fee_rate_bps,
            )
            .ok()?
            .price_impact;
            return Some(PendingSwap {
                signature: format!("sim_{}_{}", now_millis(), rng.gen_range(1000..10_000)),
                user_wallet: format!("user_{}", rng.gen_range(1000..10_000)),
                token_in: pool.base_symbol.clone(),
                token_out: pool.quote_symbol.clone(),
                amount_in,
                pool_id: pool.pool_id.clone(),
                estimated_price_impact: impact,
                timestamp_ms: now_millis(),
            });
        }

        let cursor = self.fallback_cursor.fetch_add(1, Ordering::Relaxed);
        let pool = &targets[cursor % targets.len()];
        let windows_per_day = 86_400 / self.config.poll_interval_secs.max(1);
        let amount_in = (pool.volume_24h / windows_per_day as f64) as u64;
        if amount_in == 0 {
            return None;
        }
        let impact = crate::dex::math::quote(
            pool.base_reserve,
            pool.quote_reserve,
            amount_in,
            pool.fee_rate_bps,
        )
        .ok()?
        .price_impact;
        Some(PendingSwap {
            signature: format!("poll_{}_{}", now_millis(), cursor),
            user_wallet: "unknown".to_string(),
            token_in: pool.base_symbol.clone(),
            token_out: pool.quote_symbol.clone(),
            amount_in,
            pool_id: pool.pool_id.clone(),
            estimated_price_impact: impact,
            timestamp_ms: now_millis(),
        })
    }
}
