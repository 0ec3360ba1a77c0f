//! pmr-db — read-only access to the off-chain trade ledger.
//!
//! The ledger is append-only and owned elsewhere; this crate only enumerates
//! it. Trades are always requested ordered by the explicit
//! `(block_number, insertion_id)` key, never by storage arrival order.
//! Row validation is strict: a malformed action, side, or amount aborts the
//! read with context rather than being skipped or coerced.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use pmr_reconcile::{parse_amount, OutcomeSide, TradeAction, TradeRecord};

pub const ENV_DB_URL: &str = "PMR_DATABASE_URL";

/// Connect to Postgres using PMR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_trades_table: bool,
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='trades'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_trades_table: exists,
    })
}

/// Enumerate trades for the run scope, ordered by the total-order key.
///
/// `market` optionally restricts the scope to one market (case-insensitive).
/// The amount column is cast to text in SQL so arbitrary-precision values
/// survive the driver untouched; parsing happens in one place, here.
pub async fn fetch_trades(pool: &PgPool, market: Option<&str>) -> Result<Vec<TradeRecord>> {
    let base = r#"
        select
          market_address,
          wallet_address,
          action,
          side,
          amount::text as amount,
          block_number,
          insertion_id
        from trades
    "#;

    let rows = match market {
        Some(m) => {
            let q = format!(
                "{base} where lower(market_address) = lower($1) \
                 order by block_number, insertion_id"
            );
            sqlx::query(&q).bind(m).fetch_all(pool).await
        }
        None => {
            let q = format!("{base} order by block_number, insertion_id");
            sqlx::query(&q).fetch_all(pool).await
        }
    }
    .context("fetch_trades query failed")?;

    let mut trades = Vec::with_capacity(rows.len());
    for row in rows {
        let block_number: i64 = row.try_get("block_number")?;
        let insertion_id: i64 = row.try_get("insertion_id")?;
        let action_raw: String = row.try_get("action")?;
        let side_raw: String = row.try_get("side")?;
        let amount_raw: String = row.try_get("amount")?;

        let at = |field: &str| {
            format!("trade (block={block_number}, insertion={insertion_id}) has invalid {field}")
        };

        trades.push(TradeRecord {
            market_address: row.try_get("market_address")?,
            wallet_address: row.try_get("wallet_address")?,
            action: TradeAction::parse(&action_raw).with_context(|| at("action"))?,
            side: OutcomeSide::parse(&side_raw).with_context(|| at("side"))?,
            amount: parse_amount(&amount_raw).with_context(|| at("amount"))?,
            block_number,
            insertion_id,
        });
    }

    Ok(trades)
}
