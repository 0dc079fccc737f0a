pub mod math;
pub mod raydium;
pub mod raydium_models;

pub use raydium::{PoolSnapshot, RaydiumClient};
