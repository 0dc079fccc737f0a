use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub rpc_url_backup: Option<Vec<String>>,
    pub rpc_max_retries: Option<usize>,
    pub rpc_retry_delay_ms: Option<u64>,
    pub ws_url: String,
    pub solana_network: String,
    pub trader_wallet_keypair_path: String,
    pub min_profit_threshold: f64,
    pub max_slippage: f64,
    pub max_position_size: f64,
    pub fee_per_transaction: f64,
    pub subscription_ack_timeout_secs: u64,
    pub stream_idle_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub front_run_confirm_timeout_secs: u64,
    pub back_run_confirm_timeout_secs: u64,
    pub pool_cache_ttl_secs: u64,
    pub run_duration_secs: u64,
    pub simulation_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            rpc_url: env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string()),
            rpc_url_backup: env::var("SOLANA_RPC_URL_BACKUP")
                .ok()
                .map(|s| s.split(',').map(String::from).collect()),
            rpc_max_retries: env::var("RPC_MAX_RETRIES").ok().and_then(|v| v.parse().ok()),
            rpc_retry_delay_ms: env::var("RPC_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            ws_url: env::var("SOLANA_WS_URL")
                .unwrap_or_else(|_| "wss://api.devnet.solana.com".to_string()),
            solana_network: env::var("SOLANA_NETWORK").unwrap_or_else(|_| "devnet".to_string()),
            trader_wallet_keypair_path: env::var("TRADER_WALLET_KEYPAIR_PATH")
                .unwrap_or_else(|_| ".config/solana/id.json".to_string()),
            min_profit_threshold: env::var("MIN_PROFIT_THRESHOLD")
                .unwrap_or_else(|_| "0.001".to_string())
                .parse()
                .unwrap_or(0.001),
            max_slippage: env::var("MAX_SLIPPAGE")
                .unwrap_or_else(|_| "0.02".to_string())
                .parse()
                .unwrap_or(0.02),
            max_position_size: env::var("MAX_POSITION_SIZE")
                .unwrap_or_else(|_| "1000000.0".to_string())
                .parse()
                .unwrap_or(1_000_000.0),
            fee_per_transaction: env::var("FEE_PER_TRANSACTION")
                .unwrap_or_else(|_| "0.001".to_string())
                .parse()
                .unwrap_or(0.001),
            subscription_ack_timeout_secs: env::var("SUBSCRIPTION_ACK_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            stream_idle_timeout_secs: env::var("STREAM_IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            front_run_confirm_timeout_secs: env::var("FRONT_RUN_CONFIRM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            back_run_confirm_timeout_secs: env::var("BACK_RUN_CONFIRM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            pool_cache_ttl_secs: env::var("POOL_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            run_duration_secs: env::var("RUN_DURATION_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            simulation_mode: env::var("SIMULATION_MODE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    #[cfg(test)]
    pub fn test_default() -> Self {
        Config {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            rpc_url_backup: None,
            rpc_max_retries: Some(2),
            rpc_retry_delay_ms: Some(10),
            ws_url: "wss://api.devnet.solana.com".to_string(),
            solana_network: "devnet".to_string(),
            trader_wallet_keypair_path: String::new(),
            min_profit_threshold: 0.001,
            max_slippage: 0.02,
            max_position_size: 1_000_000.0,
            fee_per_transaction: 0.001,
            subscription_ack_timeout_secs: 5,
            stream_idle_timeout_secs: 30,
            poll_interval_secs: 2,
            front_run_confirm_timeout_secs: 5,
            back_run_confirm_timeout_secs: 10,
            pool_cache_ttl_secs: 300,
            run_duration_secs: 60,
            simulation_mode: true,
        }
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.simulation_mode {
            log::warn!("SIMULATION_MODE is active - no real transactions will be submitted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::from_env();
        assert!(config.min_profit_threshold > 0.0);
        assert!(config.max_slippage > 0.0 && config.max_slippage < 1.0);
        assert!(config.back_run_confirm_timeout_secs >= config.front_run_confirm_timeout_secs);
    }
}
