use num_bigint::{BigInt, BigUint};
use serde::{Serialize, Serializer};

/// A trade either adds shares to a position or removes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    /// Parse the wire value. Anything other than BUY/SELL (case-insensitive)
    /// is a hard error; aggregation cannot proceed on guessed intent.
    pub fn parse(raw: &str) -> Result<Self, TradeParseError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            _ => Err(TradeParseError::UnknownAction {
                raw: raw.to_string(),
            }),
        }
    }
}

/// Binary-market outcome side the shares belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutcomeSide {
    Yes,
    No,
}

impl OutcomeSide {
    pub fn parse(raw: &str) -> Result<Self, TradeParseError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(OutcomeSide::Yes),
            "NO" => Ok(OutcomeSide::No),
            _ => Err(TradeParseError::UnknownSide {
                raw: raw.to_string(),
            }),
        }
    }
}

/// Parse a wire amount: a non-negative decimal integer string.
///
/// Negative, fractional, or non-numeric input is rejected rather than coerced;
/// a single bad amount invalidates the whole aggregation.
pub fn parse_amount(raw: &str) -> Result<BigUint, TradeParseError> {
    let t = raw.trim();
    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TradeParseError::BadAmount {
            raw: raw.to_string(),
        });
    }
    BigUint::parse_bytes(t.as_bytes(), 10).ok_or_else(|| TradeParseError::BadAmount {
        raw: raw.to_string(),
    })
}

/// All errors that can occur while validating a wire-level trade record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeParseError {
    /// An `action` string could not be mapped to [`TradeAction`].
    UnknownAction { raw: String },
    /// A `side` string could not be mapped to [`OutcomeSide`].
    UnknownSide { raw: String },
    /// An `amount` string is not a non-negative decimal integer.
    BadAmount { raw: String },
}

impl std::fmt::Display for TradeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAction { raw } => {
                write!(f, "unrecognised trade action '{raw}' (expected BUY | SELL)")
            }
            Self::UnknownSide { raw } => {
                write!(f, "unrecognised outcome side '{raw}' (expected YES | NO)")
            }
            Self::BadAmount { raw } => {
                write!(
                    f,
                    "invalid amount '{raw}' (expected non-negative decimal integer)"
                )
            }
        }
    }
}

impl std::error::Error for TradeParseError {}

/// One ledger entry. Immutable once read; the ledger is append-only and this
/// engine never writes it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeRecord {
    /// Market contract address. Case-insensitive on the wire.
    pub market_address: String,
    /// Wallet address. Case-insensitive on the wire.
    pub wallet_address: String,
    pub action: TradeAction,
    pub side: OutcomeSide,
    /// Share amount. Non-negative by construction ([`parse_amount`]).
    pub amount: BigUint,
    /// Total-order key, major component.
    pub block_number: i64,
    /// Total-order key, minor component (ledger insertion id).
    pub insertion_id: i64,
}

impl TradeRecord {
    /// Canonical position identity for this trade (addresses lower-cased).
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.market_address, &self.wallet_address)
    }

    /// Signed share delta: `+amount` for BUY, `-amount` for SELL.
    pub fn signed_delta(&self) -> BigInt {
        let d = BigInt::from(self.amount.clone());
        match self.action {
            TradeAction::Buy => d,
            TradeAction::Sell => -d,
        }
    }
}

/// Composite position identity `(market, wallet)`.
///
/// Both components are lower-cased by [`PositionKey::new`], so two trades that
/// differ only in address casing fold into the same position. `Ord` gives the
/// deterministic iteration/report order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PositionKey {
    pub market: String,
    pub wallet: String,
}

impl PositionKey {
    pub fn new(market: impl AsRef<str>, wallet: impl AsRef<str>) -> Self {
        Self {
            market: market.as_ref().trim().to_ascii_lowercase(),
            wallet: wallet.as_ref().trim().to_ascii_lowercase(),
        }
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.market, self.wallet)
    }
}

/// Derived share balances for one position. In-memory only, never persisted.
///
/// Invariant: after replaying any prefix of the ordered log, each side equals
/// the sum of signed deltas of the trades for this key processed so far.
/// Balances are signed; an over-sold ledger legitimately derives negative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionState {
    pub yes_shares: BigInt,
    pub no_shares: BigInt,
}

impl PositionState {
    pub fn zero() -> Self {
        Self {
            yes_shares: BigInt::from(0),
            no_shares: BigInt::from(0),
        }
    }
}

/// Divergence between a derived position and its on-chain balances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub key: PositionKey,
    #[serde(serialize_with = "ser_bigint")]
    pub expected_yes: BigInt,
    #[serde(serialize_with = "ser_bigint")]
    pub expected_no: BigInt,
    #[serde(serialize_with = "ser_biguint")]
    pub onchain_yes: BigUint,
    #[serde(serialize_with = "ser_biguint")]
    pub onchain_no: BigUint,
}

/// A position whose on-chain read failed after retries. Distinct from a
/// mismatch: nothing is known about the chain side of this position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedCheck {
    pub key: PositionKey,
    pub error: String,
}

/// Aggregate outcome of one reconciliation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub positions_checked: usize,
    /// Sorted by key, independent of fetch completion order.
    pub mismatches: Vec<Mismatch>,
    /// Sorted by key.
    pub failed_checks: Vec<FailedCheck>,
}

impl ReconciliationReport {
    pub fn clean(positions_checked: usize) -> Self {
        Self {
            positions_checked,
            mismatches: Vec::new(),
            failed_checks: Vec::new(),
        }
    }

    /// `true` when there is nothing to act on: no mismatch and no failed check.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.failed_checks.is_empty()
    }
}

fn ser_bigint<S: Serializer>(v: &BigInt, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

fn ser_biguint<S: Serializer>(v: &BigUint, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}
