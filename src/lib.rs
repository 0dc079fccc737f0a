// src/lib.rs

pub mod config;
pub mod dex;
pub mod error;
pub mod sandwich;
pub mod solana;
pub mod utils;
pub mod wallet;

pub use config::Config;
pub use error::{Result, SandwichError};
