// src/sandwich/mod.rs
//! The sandwich pipeline: feed, evaluation, bracket construction and
//! sequenced execution.

pub mod builder;
pub mod evaluator;
pub mod executor;
pub mod mempool;
pub mod types;

pub use builder::{SandwichBracket, SandwichTxBuilder};
pub use executor::{LedgerRpc, SandwichExecutor};
pub use mempool::{FeedState, MempoolFeed};
pub use types::{
    AttemptOutcome, OpportunityStatus, PendingSwap, SandwichAttempt, SandwichOpportunity,
    SessionStats,
};
