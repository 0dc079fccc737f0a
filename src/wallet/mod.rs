//! Signing identity for the single configured trading wallet.

use crate::error::{Result, SandwichError};
use crate::solana::SolanaRpcClient;
use log::{info, warn};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair},
    signer::Signer,
};
use std::sync::Arc;

pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    /// Load the keypair from a Solana CLI wallet file. Failing here is fatal:
    /// nothing downstream can run without a signing identity.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded = shellexpand_home(path);
        let keypair = read_keypair_file(&expanded).map_err(|e| {
            SandwichError::WalletError(format!("failed to load keypair from '{}': {}", expanded, e))
        })?;
        info!("✅ Wallet loaded: {}", keypair.pubkey());
        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    /// Ephemeral identity for tests and simulation runs.
    pub fn ephemeral() -> Self {
        Self {
            keypair: Arc::new(Keypair::new()),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> Arc<Keypair> {
        Arc::clone(&self.keypair)
    }

    /// SOL balance of the trading wallet, with a low-balance warning.
    pub async fn check_balance(&self, rpc: &SolanaRpcClient) -> Result<f64> {
        let balance = rpc.get_balance(&self.pubkey()).await?;
        info!("💰 Wallet balance: {} SOL", balance);
        if balance < 0.1 {
            warn!("⚠️ Low SOL balance - consider adding more SOL for trading");
        }
        Ok(balance)
    }
}

fn shellexpand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_wallet_signs_under_its_own_key() {
        let wallet = WalletManager::ephemeral();
        assert_eq!(wallet.pubkey(), wallet.keypair().pubkey());
    }

    #[test]
    fn missing_keypair_file_is_fatal() {
        let err = WalletManager::load_from_file("/nonexistent/wallet.json").unwrap_err();
        assert!(!err.is_recoverable());
    }
}
