//! Reconciler — drive chain reads across derived positions and compare.
//!
//! Fan-out is bounded (`max_in_flight`) so a large position map cannot
//! overwhelm the upstream RPC endpoint. Findings are re-collected into key
//! order before the report is built, so fetch completion order never leaks
//! into the output.

use std::collections::BTreeMap;

use futures_util::{stream, StreamExt};
use num_bigint::BigInt;

use crate::{
    ChainReadError, ChainStateFetcher, FailedCheck, Mismatch, OnchainBalances, PositionKey,
    PositionState, ReconciliationReport,
};

/// Knobs for one reconciliation pass.
#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    /// Maximum positions with chain reads in flight at once. Clamped to >= 1.
    pub max_in_flight: usize,
    /// Abort the whole run on the first failed chain read instead of
    /// recording it as a failed check. Restores strict all-or-nothing
    /// semantics for callers that need them.
    pub fail_fast: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            fail_fast: false,
        }
    }
}

/// Error returned under [`ReconcileOptions::fail_fast`]: a chain read failed
/// and the run was abandoned. No report exists; in-flight reads are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchAborted {
    pub key: PositionKey,
    pub error: ChainReadError,
}

impl std::fmt::Display for FetchAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reconciliation aborted: chain read for {} failed: {}",
            self.key, self.error
        )
    }
}

impl std::error::Error for FetchAborted {}

/// Cross-check every derived position against on-chain state.
///
/// The position map is read-only here; the replayer owns it during the fold
/// and nothing mutates it afterwards. Each position's pair is fetched once;
/// exact integer equality per side decides mismatch. A failed read (after the
/// fetcher's own retries) is recorded as a [`FailedCheck`] and does not stop
/// the remaining positions, unless `fail_fast` is set.
pub async fn reconcile<F>(
    positions: &BTreeMap<PositionKey, PositionState>,
    fetcher: &F,
    options: &ReconcileOptions,
) -> Result<ReconciliationReport, FetchAborted>
where
    F: ChainStateFetcher + ?Sized,
{
    if positions.is_empty() {
        return Ok(ReconciliationReport::clean(0));
    }

    let max_in_flight = options.max_in_flight.max(1);

    let mut checks = stream::iter(positions.iter().map(|(key, expected)| async move {
        let result = fetcher.fetch(key).await;
        (key, expected, result)
    }))
    .buffer_unordered(max_in_flight);

    // BTreeMaps rather than Vecs: completion order is nondeterministic, key
    // order is the contract.
    let mut mismatches: BTreeMap<PositionKey, Mismatch> = BTreeMap::new();
    let mut failed: BTreeMap<PositionKey, FailedCheck> = BTreeMap::new();

    while let Some((key, expected, result)) = checks.next().await {
        match result {
            Ok(onchain) => {
                if let Some(m) = compare_position(key, expected, &onchain) {
                    mismatches.insert(key.clone(), m);
                }
            }
            Err(error) => {
                if options.fail_fast {
                    return Err(FetchAborted {
                        key: key.clone(),
                        error,
                    });
                }
                failed.insert(
                    key.clone(),
                    FailedCheck {
                        key: key.clone(),
                        error: error.to_string(),
                    },
                );
            }
        }
    }

    Ok(ReconciliationReport {
        positions_checked: positions.len(),
        mismatches: mismatches.into_values().collect(),
        failed_checks: failed.into_values().collect(),
    })
}

/// Exact-equality compare of one position; `None` means verified.
fn compare_position(
    key: &PositionKey,
    expected: &PositionState,
    onchain: &OnchainBalances,
) -> Option<Mismatch> {
    let onchain_yes = BigInt::from(onchain.yes.clone());
    let onchain_no = BigInt::from(onchain.no.clone());

    if expected.yes_shares == onchain_yes && expected.no_shares == onchain_no {
        return None;
    }

    Some(Mismatch {
        key: key.clone(),
        expected_yes: expected.yes_shares.clone(),
        expected_no: expected.no_shares.clone(),
        onchain_yes: onchain.yes.clone(),
        onchain_no: onchain.no.clone(),
    })
}
