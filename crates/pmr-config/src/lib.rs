//! pmr-config
//!
//! Layered YAML configuration for reconciliation runs. Documents are merged
//! in order (base first, overrides later), canonicalized to JSON, and hashed
//! so every run can be attributed to an exact effective config. Literal
//! secret-like values are rejected at load time; credentials belong in the
//! environment, not in config files.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Known secret-like prefixes. If any leaf string in the effective config
/// starts with one of these, the load aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI / Stripe style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

/// Effective configuration for one run.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 of the canonical JSON. Stable run-attribution identity.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Load and merge YAML files in order; later paths override earlier ones.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Merge already-read YAML documents. Split out for tests.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    reject_secret_literals(&merged)?;

    let canonical_json =
        serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Later document wins, recursing into objects so partial overrides work.
fn deep_merge(base: Value, over: Value) -> Value {
    match (base, over) {
        (Value::Object(mut base_map), Value::Object(over_map)) => {
            for (k, over_val) in over_map {
                let base_val = base_map.remove(&k).unwrap_or(Value::Null);
                base_map.insert(k, deep_merge(base_val, over_val));
            }
            Value::Object(base_map)
        }
        (_, over_other) => over_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn reject_secret_literals(v: &Value) -> Result<()> {
    walk_leaf_strings(v, "", &mut |pointer, s| {
        let t = s.trim();
        if t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) {
            bail!("CONFIG_SECRET_DETECTED leaf={pointer} value=REDACTED");
        }
        Ok(())
    })
}

fn walk_leaf_strings(
    v: &Value,
    pointer: &str,
    f: &mut impl FnMut(&str, &str) -> Result<()>,
) -> Result<()> {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                let escaped = k.replace('~', "~0").replace('/', "~1");
                walk_leaf_strings(vv, &format!("{pointer}/{escaped}"), f)?;
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                walk_leaf_strings(vv, &format!("{pointer}/{i}"), f)?;
            }
        }
        Value::String(s) => f(pointer, s)?,
        _ => {}
    }
    Ok(())
}

/// Typed engine settings extracted from the effective config.
///
/// `/chain/rpc_url` is the only required key; everything else has defaults
/// matching a cautious batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub rpc_url: String,
    pub yes_token_id: u64,
    pub no_token_id: u64,
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_in_flight: usize,
    pub fail_fast: bool,
}

impl EngineSettings {
    pub fn from_config(config: &Value) -> Result<Self> {
        let rpc_url = config
            .pointer("/chain/rpc_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .context("missing required config key /chain/rpc_url")?;
        if rpc_url.trim().is_empty() {
            bail!("config key /chain/rpc_url must not be empty");
        }

        let u64_at = |ptr: &str, default: u64| -> Result<u64> {
            match config.pointer(ptr) {
                None | Some(Value::Null) => Ok(default),
                Some(v) => v
                    .as_u64()
                    .with_context(|| format!("config key {ptr} must be a non-negative integer")),
            }
        };

        let fail_fast = match config.pointer("/reconcile/fail_fast") {
            None | Some(Value::Null) => false,
            Some(v) => v
                .as_bool()
                .context("config key /reconcile/fail_fast must be a boolean")?,
        };

        let retry_max_attempts = u32::try_from(u64_at("/chain/retry/max_attempts", 3)?)
            .ok()
            .filter(|n| *n >= 1)
            .with_context(|| {
                format!(
                    "config key /chain/retry/max_attempts must be in 1..={}",
                    u32::MAX
                )
            })?;
        let max_in_flight = u64_at("/reconcile/max_in_flight", 8)?;
        if max_in_flight == 0 {
            bail!("config key /reconcile/max_in_flight must be >= 1");
        }

        Ok(Self {
            rpc_url,
            yes_token_id: u64_at("/chain/yes_token_id", 1)?,
            no_token_id: u64_at("/chain/no_token_id", 2)?,
            retry_max_attempts,
            retry_backoff_ms: u64_at("/chain/retry/backoff_ms", 250)?,
            max_in_flight: max_in_flight as usize,
            fail_fast,
        })
    }
}
