use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmon_config::{ConfigConsumer, LoadedConfig, UnusedKeyPolicy};
use cmon_reconcile::{BlockWindow, Layer};
use cmon_runtime::{MessageMatchRegistrar, PgStore, TracingNotifier};

#[derive(Parser)]
#[command(name = "cmon")]
#[command(about = "Cross-chain bridge monitor CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Inspect L2 block confirmations
    Confirm {
        #[command(subcommand)]
        cmd: ConfirmCmd,
    },

    /// Inspect paired message matches
    Match {
        #[command(subcommand)]
        cmd: MatchCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ConfirmCmd {
    /// Print the highest confirmed L2 block number
    Latest,

    /// Print chain_confirm rows for an inclusive block range
    Show {
        #[arg(long)]
        start: u64,

        #[arg(long)]
        end: u64,
    },
}

#[derive(Subcommand)]
enum MatchCmd {
    /// Block number ingestion resumes from on a layer
    LatestBlock {
        /// l1 | l2
        #[arg(long)]
        layer: Layer,

        /// Layered config paths in merge order (supplies the L1 cold-start number)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Print the messenger and gateway rows for one message hash
    Show {
        #[arg(long)]
        msg_hash: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = cmon_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = cmon_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_chain_confirm_table={}",
                        s.ok, s.has_chain_confirm_table
                    );
                }
                DbCmd::Migrate => {
                    cmon_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = load_config(&paths)?;
            loaded.monitor()?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Confirm { cmd } => match cmd {
            ConfirmCmd::Latest => {
                let pool = cmon_db::connect_from_env().await?;
                let n = cmon_db::latest_confirmed_number(&pool).await?;
                println!("last_confirmed={n}");
            }

            ConfirmCmd::Show { start, end } => {
                let window = BlockWindow::new(start, end)
                    .with_context(|| format!("invalid window: start {start} > end {end}"))?;
                let pool = cmon_db::connect_from_env().await?;
                let rows = cmon_db::fetch_chain_confirm(&pool, window).await?;
                for r in &rows {
                    println!(
                        "number={} confirm={} deposit_status={}",
                        r.number, r.confirm, r.deposit_status
                    );
                }
                println!("rows={} window={}", rows.len(), window);
            }
        },

        Commands::Match { cmd } => match cmd {
            MatchCmd::LatestBlock {
                layer,
                config_paths,
            } => {
                let loaded = load_config(&config_paths)?;
                cmon_config::report_unused_keys(
                    ConfigConsumer::Cli,
                    &loaded.config_json,
                    UnusedKeyPolicy::Warn,
                )?;
                let cfg = loaded.monitor()?;

                let pool = cmon_db::connect_from_env().await?;
                let registrar = MessageMatchRegistrar::new(
                    Arc::new(PgStore::new(pool)),
                    Arc::new(TracingNotifier),
                    cfg.l1.start_number,
                );
                let n = registrar.latest_block_number(layer).await?;
                println!("layer={layer} block_number={n}");
            }

            MatchCmd::Show { msg_hash } => {
                let pool = cmon_db::connect_from_env().await?;
                let messenger = cmon_db::fetch_messenger_match(&pool, &msg_hash).await?;
                let gateway = cmon_db::fetch_gateway_match(&pool, &msg_hash).await?;
                let out = serde_json::json!({
                    "msg_hash": msg_hash,
                    "messenger": messenger,
                    "gateway": gateway,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        },
    }

    Ok(())
}

fn init_tracing() {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    cmon_config::load_layered_yaml(&path_refs)
}
