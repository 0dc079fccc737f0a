//! Raydium pool-metadata source.
//!
//! Fetches pool listings from Raydium's off-chain liquidity index and keeps
//! them in a hot cache. Snapshots are read-only to the rest of the pipeline;
//! staleness beyond the cache window forces a refresh before a snapshot is
//! handed out for sizing.

use crate::config::Config;
use crate::dex::raydium_models::LiquidityFile;
use crate::error::{Result, SandwichError};
use dashmap::DashMap;
use log::{info, warn};
use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Raydium liquidity pool program (the program the feed filters on).
pub const RAYDIUM_LIQUIDITY_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
/// Raydium AMM program targeted by the swap instruction.
pub const RAYDIUM_AMM_PROGRAM_ID: &str = "5quBtoiQqxF9Jv6KYKctB59NT3gtJD2N1RdgFZRnTMK";

pub static RAYDIUM_LIQUIDITY_PROGRAM: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(RAYDIUM_LIQUIDITY_PROGRAM_ID).unwrap());
pub static RAYDIUM_AMM_PROGRAM: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(RAYDIUM_AMM_PROGRAM_ID).unwrap());

const LIQUIDITY_FILE_URL: &str = "https://api.raydium.io/v2/sdk/liquidity/mainnet.json";
/// Raydium swaps charge 25 bps.
pub const RAYDIUM_FEE_BPS: u32 = 25;

/// AMM reserve snapshot for one trading pair.
///
/// Reserves are derived from the API's liquidity/price proxies when exact
/// vault balances are unavailable; both sides are expressed in base-token
/// units consistent with the liquidity figure.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub pool_id: String,
    pub base_mint: String,
    pub quote_mint: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub liquidity: f64,
    pub volume_24h: f64,
    pub price: f64,
    pub fee_rate_bps: u32,
    /// Unix seconds of the last refresh from the metadata source.
    pub last_refreshed: u64,
}

impl PoolSnapshot {
    pub fn pair(&self) -> String {
        format!("{}/{}", self.base_symbol, self.quote_symbol)
    }

    pub fn is_stale(&self, ttl_secs: u64) -> bool {
        let now = chrono::Utc::now().timestamp() as u64;
        now.saturating_sub(self.last_refreshed) > ttl_secs
    }
}

/// Raydium metadata client with a TTL-guarded hot cache.
pub struct RaydiumClient {
    http: reqwest::Client,
    config: Arc<Config>,
    pools: DashMap<String, PoolSnapshot>,
    last_refresh: AtomicU64,
}

impl RaydiumClient {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            pools: DashMap::new(),
            last_refresh: AtomicU64::new(0),
        }
    }

    fn cache_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp() as u64;
        now.saturating_sub(self.last_refresh.load(Ordering::Relaxed))
            > self.config.pool_cache_ttl_secs
    }

    /// All cached pools, refreshing from the metadata source when the cache
    /// window has elapsed.
    pub async fn get_pools(&self) -> Result<Vec<PoolSnapshot>> {
        if self.pools.is_empty() || self.cache_expired() {
            self.refresh().await?;
        }
        let mut pools: Vec<PoolSnapshot> = self.pools.iter().map(|p| p.value().clone()).collect();
        pools.sort_by(|a, b| b.liquidity.total_cmp(&a.liquidity));
        Ok(pools)
    }

    /// One pool by id. A snapshot past the cache window is refreshed before
    /// it is handed out; when the refresh fails the stale copy is served.
    pub async fn get_pool(&self, pool_id: &str) -> Option<PoolSnapshot> {
        let cached = self.pools.get(pool_id).map(|p| p.value().clone());
        if let Some(pool) = &cached {
            if !pool.is_stale(self.config.pool_cache_ttl_secs) {
                return cached;
            }
        }
        if let Err(e) = self.refresh().await {
            warn!("Pool cache refresh failed, serving cached data: {}", e);
            return cached;
        }
        self.pools.get(pool_id).map(|p| p.value().clone())
    }

    /// Pools liquid and active enough to bracket: liquidity above the floor
    /// and at least 10% daily turnover.
    pub async fn sandwich_targets(&self, min_liquidity: f64) -> Result<Vec<PoolSnapshot>> {
        let pools = self.get_pools().await?;
        Ok(pools
            .into_iter()
            .filter(|p| p.liquidity >= min_liquidity && p.volume_24h > p.liquidity * 0.1)
            .collect())
    }

    async fn refresh(&self) -> Result<()> {
        let snapshots = if self.config.solana_network == "devnet" {
            // The liquidity index only covers mainnet; devnet gets a fixed set.
            devnet_pools()
        } else {
            self.fetch_mainnet_pools().await?
        };

        self.pools.clear();
        for snapshot in snapshots {
            self.pools.insert(snapshot.pool_id.clone(), snapshot);
        }
        self.last_refresh
            .store(chrono::Utc::now().timestamp() as u64, Ordering::Relaxed);
        info!("🏊 Pool cache refreshed: {} pools", self.pools.len());
        Ok(())
    }

    async fn fetch_mainnet_pools(&self) -> Result<Vec<PoolSnapshot>> {
        let response = self
            .http
            .get(LIQUIDITY_FILE_URL)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| SandwichError::RpcError(format!("Raydium API request failed: {}", e)))?;

        let file: LiquidityFile = response
            .json()
            .await
            .map_err(|e| SandwichError::ParseError(format!("Raydium API response: {}", e)))?;

        let now = chrono::Utc::now().timestamp() as u64;
        let mut pools: Vec<PoolSnapshot> = file
            .official
            .into_iter()
            .filter(|p| p.is_valid())
            .map(|p| {
                // Reserve proxies from the aggregate figures: base side is the
                // liquidity figure itself, quote side follows the quoted price.
                let base_reserve = p.liquidity as u64;
                let quote_reserve = (p.liquidity * p.price) as u64;
                PoolSnapshot {
                    pool_id: p.id,
                    base_mint: p.base_mint,
                    quote_mint: p.quote_mint,
                    base_symbol: p.base_symbol.unwrap_or_default(),
                    quote_symbol: p.quote_symbol.unwrap_or_default(),
                    base_reserve,
                    quote_reserve,
                    liquidity: p.liquidity,
                    volume_24h: p.volume_24h,
                    price: p.price,
                    fee_rate_bps: RAYDIUM_FEE_BPS,
                    last_refreshed: now,
                }
            })
            .collect();

        // Deepest books first; keep the top of the list only.
        pools.sort_by(|a, b| b.liquidity.total_cmp(&a.liquidity));
        pools.truncate(20);
        Ok(pools)
    }

    pub async fn log_pool_summary(&self) {
        match self.sandwich_targets(100_000.0).await {
            Ok(targets) => {
                info!("🏊 Raydium pool summary ({} targets found):", targets.len());
                for pool in targets.iter().take(10) {
                    info!(
                        "   {:<12} liquidity ${:>12.0} volume24h ${:>12.0} price ${:.4}",
                        pool.pair(),
                        pool.liquidity,
                        pool.volume_24h,
                        pool.price
                    );
                }
            }
            Err(e) => warn!("Failed to load pool summary: {}", e),
        }
    }
}

/// Fixed pool set for devnet, where the liquidity index has no data.
pub fn devnet_pools() -> Vec<PoolSnapshot> {
    let now = chrono::Utc::now().timestamp() as u64;
    vec![
        PoolSnapshot {
            pool_id: "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2".to_string(),
            base_mint: "So11111111111111111111111111111111111111112".to_string(),
            quote_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            base_symbol: "SOL".to_string(),
            quote_symbol: "USDC".to_string(),
            base_reserve: 1_000_000,
            quote_reserve: 25_500_000,
            liquidity: 1_000_000.0,
            volume_24h: 500_000.0,
            price: 25.50,
            fee_rate_bps: RAYDIUM_FEE_BPS,
            last_refreshed: now,
        },
        PoolSnapshot {
            pool_id: "AVs9TA4nWDzfPJE9gGVNJMVhcQy3V9PGazuz33BfG2RA".to_string(),
            base_mint: "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R".to_string(),
            quote_mint: "So11111111111111111111111111111111111111112".to_string(),
            base_symbol: "RAY".to_string(),
            quote_symbol: "SOL".to_string(),
            base_reserve: 750_000,
            quote_reserve: 93_750,
            liquidity: 750_000.0,
            volume_24h: 300_000.0,
            price: 0.125,
            fee_rate_bps: RAYDIUM_FEE_BPS,
            last_refreshed: now,
        },
        PoolSnapshot {
            pool_id: "2p7nYbtPBgtmY69NsE8DAW6szpRJn7tQvDnqvoEWQvjY".to_string(),
            base_mint: "orcaEKTdK7LKz57vaAYr9QeNsVEPfiu6QeMU1kektZE".to_string(),
            quote_mint: "So11111111111111111111111111111111111111112".to_string(),
            base_symbol: "ORCA".to_string(),
            quote_symbol: "SOL".to_string(),
            base_reserve: 500_000,
            quote_reserve: 425_000,
            liquidity: 500_000.0,
            volume_24h: 200_000.0,
            price: 0.85,
            fee_rate_bps: RAYDIUM_FEE_BPS,
            last_refreshed: now,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devnet_pools_are_all_sandwich_targets() {
        for pool in devnet_pools() {
            assert!(pool.liquidity >= 100_000.0);
            assert!(pool.volume_24h > pool.liquidity * 0.1);
            assert!(!pool.is_stale(300));
        }
    }

    #[test]
    fn program_ids_parse() {
        assert_eq!(
            RAYDIUM_LIQUIDITY_PROGRAM.to_string(),
            RAYDIUM_LIQUIDITY_PROGRAM_ID
        );
        assert_eq!(RAYDIUM_AMM_PROGRAM.to_string(), RAYDIUM_AMM_PROGRAM_ID);
    }

    #[tokio::test]
    async fn stale_snapshot_is_refreshed_before_lookup() {
        let config = Arc::new(crate::config::Config::test_default());
        let client = RaydiumClient::new(config);

        let mut pool = devnet_pools().remove(0);
        pool.last_refreshed = chrono::Utc::now().timestamp() as u64 - 10_000;
        pool.base_reserve = 1; // replaced once the refresh lands
        let id = pool.pool_id.clone();
        client.pools.insert(id.clone(), pool);

        let fresh = client.get_pool(&id).await.expect("pool survives refresh");
        assert!(fresh.base_reserve > 1);
        assert!(!fresh.is_stale(300));
    }

    #[test]
    fn staleness_window() {
        let mut pool = devnet_pools().remove(0);
        pool.last_refreshed = chrono::Utc::now().timestamp() as u64 - 301;
        assert!(pool.is_stale(300));
        assert!(!pool.is_stale(600));
    }
}
