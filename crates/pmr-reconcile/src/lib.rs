//! pmr-reconcile
//!
//! Position reconciliation engine:
//! - Ledger replay folds the ordered trade log into per-(market, wallet)
//!   YES/NO share balances
//! - The reconciler cross-checks every derived position against on-chain
//!   balances with bounded fan-out
//! - Report output is sorted by key, byte-stable across runs
//!
//! Replay and comparison are pure, deterministic logic. The only IO seam is
//! the [`ChainStateFetcher`] trait, implemented outside this crate.

mod engine;
mod fetcher;
mod replay;
mod report;
mod types;

pub use engine::{reconcile, FetchAborted, ReconcileOptions};
pub use fetcher::{ChainReadError, ChainStateFetcher, OnchainBalances};
pub use replay::replay;
pub use report::render;
pub use types::*;
