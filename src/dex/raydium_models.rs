//! Data models for Raydium API responses

use serde::Deserialize;

/// Root structure for the Raydium liquidity JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityFile {
    /// Official pools list
    #[serde(default)]
    pub official: Vec<ApiPool>,
    /// Unofficial pools list
    #[serde(default, rename = "unOfficial")]
    pub un_official: Vec<ApiPool>,
}

/// One AMM pool as reported by the Raydium API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPool {
    /// Pool ID (address)
    pub id: String,
    #[serde(rename = "baseMint")]
    pub base_mint: String,
    #[serde(rename = "quoteMint")]
    pub quote_mint: String,
    #[serde(rename = "baseSymbol", default)]
    pub base_symbol: Option<String>,
    #[serde(rename = "quoteSymbol", default)]
    pub quote_symbol: Option<String>,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(rename = "volume24h", default)]
    pub volume_24h: f64,
    #[serde(default)]
    pub price: f64,
}

impl ApiPool {
    /// Minimum requirements for a pool to be worth watching at all.
    pub fn is_valid(&self) -> bool {
        self.liquidity > 50_000.0
            && self.volume_24h > 10_000.0
            && self.base_symbol.as_deref().map_or(false, |s| !s.is_empty())
            && self.quote_symbol.as_deref().map_or(false, |s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_pools_are_rejected() {
        let pool = ApiPool {
            id: "x".into(),
            base_mint: "m1".into(),
            quote_mint: "m2".into(),
            base_symbol: Some("SOL".into()),
            quote_symbol: Some("USDC".into()),
            liquidity: 10_000.0,
            volume_24h: 100_000.0,
            price: 25.0,
        };
        assert!(!pool.is_valid());
    }
}
