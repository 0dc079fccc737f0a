use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SandwichError {
    /// WebSocket connection/data issues - forces the feed into fallback, never fatal
    #[error("WebSocket Error: {0}")]
    WebSocketError(String),

    /// Subscription to the pending-transaction log stream was not acknowledged in time
    #[error("Subscription Failed: {0}")]
    SubscriptionFailed(String),

    /// RPC/Solana network errors
    #[error("RPC Error: {0}")]
    RpcError(String),

    /// Malformed message observed on the stream - skip and continue
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Bad sizing/reserve values handed to the pricing model
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Chained bracket pricing rejected the sandwich
    #[error("Unprofitable: {0}")]
    Unprofitable(String),

    /// Swap instruction building errors
    #[error("Instruction Error: {0}")]
    InstructionError(String),

    /// Pool not found or stale beyond refresh
    #[error("Pool Not Found: {0}")]
    PoolNotFound(String),

    /// Wallet/keypair loading errors - fatal at startup
    #[error("Wallet Error: {0}")]
    WalletError(String),

    /// Configuration errors - fatal at startup
    #[error("Config Error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for SandwichError {
    fn from(err: serde_json::Error) -> Self {
        SandwichError::ParseError(format!("JSON deserialization error: {}", err))
    }
}

impl From<anyhow::Error> for SandwichError {
    fn from(err: anyhow::Error) -> Self {
        SandwichError::RpcError(format!("{:#}", err))
    }
}

impl From<solana_client::client_error::ClientError> for SandwichError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        SandwichError::RpcError(format!("Solana client error: {}", err))
    }
}

impl SandwichError {
    /// Whether the pipeline keeps running after this error. Only wallet and
    /// config problems at startup are allowed to take the process down.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SandwichError::WebSocketError(_) => true,
            SandwichError::SubscriptionFailed(_) => true,
            SandwichError::RpcError(_) => true,
            SandwichError::ParseError(_) => true,
            SandwichError::InvalidInput(_) => true,
            SandwichError::Unprofitable(_) => true,
            SandwichError::InstructionError(_) => true,
            SandwichError::PoolNotFound(_) => true,
            SandwichError::WalletError(_) => false,
            SandwichError::ConfigError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SandwichError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_errors_are_fatal() {
        assert!(SandwichError::WebSocketError("dropped".into()).is_recoverable());
        assert!(SandwichError::SubscriptionFailed("no ack".into()).is_recoverable());
        assert!(SandwichError::Unprofitable("thin bracket".into()).is_recoverable());
        assert!(!SandwichError::WalletError("no keypair".into()).is_recoverable());
        assert!(!SandwichError::ConfigError("bad slippage".into()).is_recoverable());
    }
}
