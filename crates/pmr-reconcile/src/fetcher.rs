//! Chain state fetcher seam.
//!
//! The engine treats on-chain state as a black box behind this trait. The
//! production implementation lives in `pmr-chain`; tests substitute stubs.

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::PositionKey;

/// Authoritative on-chain balances for one position.
///
/// Balances are uint256 on the wire, so non-negative by construction. A
/// position absent on-chain reads as zero on both sides, never as an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnchainBalances {
    pub yes: BigUint,
    pub no: BigUint,
}

/// Read-only access to authoritative on-chain position state.
///
/// Implementations must be safe to call concurrently for distinct keys; the
/// reconciler fans out across positions up to its in-flight limit.
#[async_trait]
pub trait ChainStateFetcher: Send + Sync {
    async fn fetch(&self, key: &PositionKey) -> Result<OnchainBalances, ChainReadError>;
}

/// All errors a chain read can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainReadError {
    /// RPC transport failed (connect, timeout, non-2xx status).
    Transport { detail: String },
    /// The RPC endpoint answered with an error object.
    Rpc { message: String },
    /// An address failed shape validation before any call was made.
    BadAddress { address: String },
    /// The call succeeded but the result was not a hex-encoded uint256.
    BadBalanceHex { raw: String },
}

impl ChainReadError {
    /// Transport failures are worth retrying; the rest are deterministic and
    /// would fail identically on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainReadError::Transport { .. })
    }
}

impl std::fmt::Display for ChainReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { detail } => write!(f, "chain rpc transport failure: {detail}"),
            Self::Rpc { message } => write!(f, "chain rpc error: {message}"),
            Self::BadAddress { address } => {
                write!(f, "malformed chain address '{address}'")
            }
            Self::BadBalanceHex { raw } => {
                write!(f, "chain returned non-uint256 balance payload '{raw}'")
            }
        }
    }
}

impl std::error::Error for ChainReadError {}
