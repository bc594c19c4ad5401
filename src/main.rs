use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use warehouse_ledger as ledger;
use ledger::services::stock_query::{Query, VerifyLedgerQuery};

#[derive(Parser)]
#[command(name = "warehouse-ledger", version, about = "Warehouse stock ledger maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Replay every stocking key and report balances that disagree with the ledger
    VerifyLedger {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Expire active reservations whose expiry has passed
    ExpireReservations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = ledger::config::load_config().context("failed to load configuration")?;
    ledger::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = ledger::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate && !matches!(cli.command, Command::Migrate) {
        ledger::db::run_migrations(&db_pool).await?;
    }

    match cli.command {
        Command::Migrate => {
            ledger::db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        Command::VerifyLedger { json } => {
            let report = VerifyLedgerQuery.execute(&db_pool).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for d in &report.divergences {
                    println!(
                        "{}: balance {} ledger sum {} last entry {} reserved {} outstanding {}",
                        d.stocking_key,
                        d.balance_quantity,
                        d.ledger_sum,
                        d.last_balance_quantity,
                        d.reserved_quantity,
                        d.outstanding_reservations
                    );
                }
            }
            if report.is_consistent() {
                info!(keys_checked = report.keys_checked, "Ledger verified");
            } else {
                warn!(
                    keys_checked = report.keys_checked,
                    divergences = report.divergences.len(),
                    "Ledger verification found divergences"
                );
                std::process::exit(1);
            }
        }
        Command::ExpireReservations => {
            let (event_sender, event_rx) =
                ledger::events::EventSender::channel(cfg.event_channel_capacity);
            let processor = tokio::spawn(ledger::events::process_events(event_rx));

            let factory = ledger::services::factory::ServiceFactory::from_config(
                Arc::new(db_pool),
                Some(event_sender),
                &cfg,
            );
            let closed = factory.reservation_service().expire_due(Utc::now()).await?;
            println!(
                "expired {} reservations, released {}",
                closed.count(),
                closed.released_quantity
            );

            drop(factory);
            if let Err(e) = processor.await {
                warn!("Event processor ended abnormally: {}", e);
            }
        }
    }

    Ok(())
}
