pub mod settings;

pub use settings::Config;

use crate::error::SandwichError;
use std::sync::Arc;

/// Loads and returns the application configuration as an `Arc<Config>`.
/// Fatal configuration problems are the only errors allowed to stop startup.
pub fn load_config() -> Result<Arc<settings::Config>, SandwichError> {
    dotenv::dotenv().ok(); // Load .env file if present, ignore errors

    let config = settings::Config::from_env();

    if config.rpc_url.is_empty() {
        return Err(SandwichError::ConfigError(
            "SOLANA_RPC_URL cannot be empty".to_string(),
        ));
    }
    if config.ws_url.is_empty() {
        return Err(SandwichError::ConfigError(
            "SOLANA_WS_URL cannot be empty".to_string(),
        ));
    }
    if config.max_slippage <= 0.0 || config.max_slippage >= 1.0 {
        return Err(SandwichError::ConfigError(format!(
            "MAX_SLIPPAGE must be in (0, 1), got {}",
            config.max_slippage
        )));
    }

    config.validate_and_log();

    Ok(Arc::new(config))
}
