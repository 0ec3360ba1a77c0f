//! pmr-chain
//!
//! Authoritative on-chain balance reads. Binary markets are ERC-1155
//! contracts; a wallet's YES/NO share balances are token balances read via
//! JSON-RPC `eth_call` of `balanceOf(address,uint256)`. The two reads that
//! make up one position are independent and issued concurrently.
//!
//! Transient transport failures are retried with fixed backoff before an
//! error is surfaced; deterministic failures (bad address, RPC error object,
//! malformed payload) are not retried.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Deserialize;
use serde_json::json;

use pmr_reconcile::{ChainReadError, ChainStateFetcher, OnchainBalances, PositionKey};

/// ERC-1155 `balanceOf(address,uint256)` function selector.
const BALANCE_OF_SELECTOR: &str = "00fdd58e";

/// Bounded retry with fixed backoff for transient chain read failures.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per read, including the first. Clamped to >= 1.
    pub max_attempts: u32,
    /// Base delay between attempts; attempt N sleeps N * backoff.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Run `op` under the retry policy. Only transient errors are retried;
/// deterministic errors surface immediately.
pub async fn with_retry<T, Fut, F>(policy: &RetryPolicy, mut op: F) -> Result<T, ChainReadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainReadError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %e, "chain read failed, retrying");
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorObject>,
}

/// JSON-RPC backed [`ChainStateFetcher`].
///
/// Stateless between calls apart from the shared HTTP connection pool; safe
/// to call concurrently for distinct keys. The RPC URL is injected so tests
/// can point it at a local stub server.
#[derive(Debug, Clone)]
pub struct RpcChainFetcher {
    http: reqwest::Client,
    rpc_url: String,
    yes_token_id: u64,
    no_token_id: u64,
    retry: RetryPolicy,
}

impl RpcChainFetcher {
    pub fn new(
        rpc_url: impl Into<String>,
        yes_token_id: u64,
        no_token_id: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            yes_token_id,
            no_token_id,
            retry,
        }
    }

    async fn balance_of(
        &self,
        market: &str,
        wallet: &str,
        token_id: u64,
    ) -> Result<BigUint, ChainReadError> {
        let market = validate_contract_address(market)?;
        let data = encode_balance_of(wallet, token_id)?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": market, "data": data },
                "latest"
            ]
        });

        with_retry(&self.retry, || self.call_once(&body)).await
    }

    async fn call_once(&self, body: &serde_json::Value) -> Result<BigUint, ChainReadError> {
        let resp = self
            .http
            .post(&self.rpc_url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainReadError::Transport {
                detail: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChainReadError::Transport {
                detail: format!("rpc endpoint returned http {status}"),
            });
        }

        let rpc: RpcResponse = resp.json().await.map_err(|e| ChainReadError::Transport {
            detail: format!("rpc response body unreadable: {e}"),
        })?;

        if let Some(err) = rpc.error {
            return Err(ChainReadError::Rpc {
                message: err.message.unwrap_or_else(|| "unspecified".to_string()),
            });
        }

        let result = rpc.result.ok_or_else(|| ChainReadError::Rpc {
            message: "response carried neither result nor error".to_string(),
        })?;

        decode_uint256_hex(&result)
    }
}

#[async_trait]
impl ChainStateFetcher for RpcChainFetcher {
    async fn fetch(&self, key: &PositionKey) -> Result<OnchainBalances, ChainReadError> {
        // The YES and NO reads are independent; issue them concurrently.
        let (yes, no) = tokio::join!(
            self.balance_of(&key.market, &key.wallet, self.yes_token_id),
            self.balance_of(&key.market, &key.wallet, self.no_token_id),
        );
        Ok(OnchainBalances { yes: yes?, no: no? })
    }
}

/// Validate a contract address: `0x` + 40 hex chars.
fn validate_contract_address(addr: &str) -> Result<&str, ChainReadError> {
    let t = addr.trim();
    let hex = t.strip_prefix("0x").unwrap_or("");
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ChainReadError::BadAddress {
            address: addr.to_string(),
        });
    }
    Ok(t)
}

/// ABI-encode `balanceOf(wallet, token_id)` calldata.
fn encode_balance_of(wallet: &str, token_id: u64) -> Result<String, ChainReadError> {
    let w = wallet.trim().trim_start_matches("0x").to_ascii_lowercase();
    if w.len() != 40 || !w.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ChainReadError::BadAddress {
            address: wallet.to_string(),
        });
    }
    Ok(format!("0x{BALANCE_OF_SELECTOR}{w:0>64}{token_id:064x}"))
}

/// Decode an `eth_call` result into a uint256.
///
/// An empty `"0x"` result means the position does not exist on-chain; that is
/// a zero balance, not an error.
fn decode_uint256_hex(raw: &str) -> Result<BigUint, ChainReadError> {
    let hex = raw.trim().trim_start_matches("0x");
    if hex.is_empty() {
        return Ok(BigUint::from(0u32));
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ChainReadError::BadBalanceHex {
            raw: raw.to_string(),
        });
    }
    BigUint::parse_bytes(hex.as_bytes(), 16).ok_or_else(|| ChainReadError::BadBalanceHex {
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn encodes_balance_of_calldata() {
        let data =
            encode_balance_of("0x1111111111111111111111111111111111111111", 1).unwrap();
        assert_eq!(
            data,
            "0x00fdd58e\
             0000000000000000000000001111111111111111111111111111111111111111\
             0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn calldata_lowercases_wallet_and_widens_token_id() {
        let data =
            encode_balance_of("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD", 0x2a).unwrap();
        assert!(data.contains("abcdefabcdefabcdefabcdefabcdefabcdefabcd"));
        assert!(data.ends_with(
            "000000000000000000000000000000000000000000000000000000000000002a"
        ));
        // selector + two 32-byte words
        assert_eq!(data.len(), 2 + 8 + 64 + 64);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            encode_balance_of("0x123", 1),
            Err(ChainReadError::BadAddress { .. })
        ));
        assert!(matches!(
            encode_balance_of("not-an-address-at-all-not-an-address-at!", 1),
            Err(ChainReadError::BadAddress { .. })
        ));
        assert!(matches!(
            validate_contract_address("0xZZ11111111111111111111111111111111111111"),
            Err(ChainReadError::BadAddress { .. })
        ));
        assert!(validate_contract_address("0x1111111111111111111111111111111111111111").is_ok());
    }

    #[test]
    fn decodes_uint256_results() {
        assert_eq!(decode_uint256_hex("0x").unwrap(), BigUint::from(0u32));
        assert_eq!(decode_uint256_hex("0x0").unwrap(), BigUint::from(0u32));
        assert_eq!(
            decode_uint256_hex(
                "0x0000000000000000000000000000000000000000000000000000000000000007"
            )
            .unwrap(),
            BigUint::from(7u32)
        );
        assert!(matches!(
            decode_uint256_hex("0xnothex"),
            Err(ChainReadError::BadBalanceHex { .. })
        ));
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };

        let out = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ChainReadError::Transport {
                        detail: "flaky".to_string(),
                    })
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;

        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        };

        let out: Result<u32, _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ChainReadError::Transport {
                    detail: "down".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(out, Err(ChainReadError::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deterministic_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_millis(1),
        };

        let out: Result<u32, _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ChainReadError::Rpc {
                    message: "execution reverted".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(out, Err(ChainReadError::Rpc { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
