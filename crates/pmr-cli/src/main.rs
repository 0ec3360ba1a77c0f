use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use pmr_chain::{RetryPolicy, RpcChainFetcher};
use pmr_config::EngineSettings;
use pmr_reconcile::ReconcileOptions;

#[derive(Parser)]
#[command(name = "pmr")]
#[command(about = "Prediction-market position reconciler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pass: replay the trade ledger, cross-check on-chain, report.
    /// Exits 0 only on a clean run (no mismatches, no failed checks).
    Run {
        /// Layered config paths in merge order (base -> env overrides)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Restrict the pass to one market address
        #[arg(long)]
        market: Option<String>,

        /// Abandon the whole run after this many seconds; no partial report
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Abort on the first failed chain read instead of recording it
        #[arg(long, default_value_t = false)]
        fail_fast: bool,

        /// Emit the report as JSON instead of text lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Replay the ledger and print derived positions (no chain reads)
    Replay {
        /// Restrict the replay to one market address
        #[arg(long)]
        market: Option<String>,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Dev convenience; silent when absent. Production injects env vars.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run {
            config_paths,
            market,
            deadline_secs,
            fail_fast,
            json,
        } => run_reconcile(config_paths, market, deadline_secs, fail_fast, json).await,

        Commands::Replay { market } => {
            let pool = pmr_db::connect_from_env().await?;
            let trades = pmr_db::fetch_trades(&pool, market.as_deref()).await?;
            info!(trades = trades.len(), "ledger read complete");

            let positions = pmr_reconcile::replay(trades);
            println!("positions={}", positions.len());
            for (key, state) in &positions {
                println!(
                    "position market={} wallet={} yes={} no={}",
                    key.market, key.wallet, state.yes_shares, state.no_shares
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Db { cmd } => match cmd {
            DbCmd::Status => {
                let pool = pmr_db::connect_from_env().await?;
                let s = pmr_db::status(&pool).await?;
                println!("db_ok={} has_trades_table={}", s.ok, s.has_trades_table);
                Ok(ExitCode::SUCCESS)
            }
        },

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = pmr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_reconcile(
    config_paths: Vec<String>,
    market: Option<String>,
    deadline_secs: Option<u64>,
    fail_fast_flag: bool,
    json: bool,
) -> Result<ExitCode> {
    // Configuration and locators are validated before any work starts.
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = pmr_config::load_layered_yaml(&path_refs)?;
    let mut settings = EngineSettings::from_config(&loaded.config_json)?;
    if fail_fast_flag {
        settings.fail_fast = true;
    }
    info!(config_hash = %loaded.config_hash, "starting reconciliation run");

    let pool = pmr_db::connect_from_env().await?;
    let trades = pmr_db::fetch_trades(&pool, market.as_deref()).await?;
    info!(trades = trades.len(), "ledger read complete");

    let positions = pmr_reconcile::replay(trades);
    info!(positions = positions.len(), "replay complete");

    let fetcher = RpcChainFetcher::new(
        &settings.rpc_url,
        settings.yes_token_id,
        settings.no_token_id,
        RetryPolicy {
            max_attempts: settings.retry_max_attempts,
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        },
    );
    let options = ReconcileOptions {
        max_in_flight: settings.max_in_flight,
        fail_fast: settings.fail_fast,
    };

    let run = pmr_reconcile::reconcile(&positions, &fetcher, &options);
    let report = match deadline_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run)
            .await
            .map_err(|_| {
                anyhow::anyhow!("run deadline of {secs}s exceeded; no report emitted")
            })?
            .context("reconciliation aborted")?,
        None => run.await.context("reconciliation aborted")?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", pmr_reconcile::render(&report));
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
