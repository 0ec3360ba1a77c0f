//! Ledger replay — deterministic fold of the trade log into positions.
//!
//! # Invariants
//!
//! - **Explicit order**: trades are sorted by `(block_number, insertion_id)`
//!   before folding. Correctness never depends on storage arrival order.
//! - **Exact arithmetic**: balances are arbitrary-precision signed integers;
//!   no floating point anywhere in the fold.
//! - **Determinism**: the same trade multiset produces an identical map on
//!   every run. The map is returned whole; no partial state is observable.
//! - **Pure, no IO**: the fold cannot fail. Wire validation (enum values,
//!   amount strings) happens at the read boundary before records exist.

use std::collections::BTreeMap;

use crate::{OutcomeSide, PositionKey, PositionState, TradeRecord};

/// Fold the trade log into derived per-position YES/NO balances.
///
/// Positions are created lazily at zero on first encounter of a key. Each
/// trade applies its signed delta (`+amount` BUY, `-amount` SELL) to the side
/// it names. The per-key fold is plain addition, so any fixed total order
/// yields the same result; sorting internally makes that order explicit.
pub fn replay(mut trades: Vec<TradeRecord>) -> BTreeMap<PositionKey, PositionState> {
    trades.sort_by_key(|t| (t.block_number, t.insertion_id));

    let mut positions: BTreeMap<PositionKey, PositionState> = BTreeMap::new();
    for trade in &trades {
        let state = positions
            .entry(trade.key())
            .or_insert_with(PositionState::zero);
        let delta = trade.signed_delta();
        match trade.side {
            OutcomeSide::Yes => state.yes_shares += delta,
            OutcomeSide::No => state.no_shares += delta,
        }
    }
    positions
}
