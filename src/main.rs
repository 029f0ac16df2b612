//! pricing-sync operator CLI
//!
//! Every command prints a JSON document on stdout and exits non-zero when
//! the run did not succeed. See `pricing-sync --help` for usage.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use pricing_sync_lib::application::{OperatorActions, PricingSyncEngine, SyncScope, SyncSummary};
use pricing_sync_lib::domain::MarketValueRecord;
use pricing_sync_lib::domain::catalog::{Brand, CatalogProvider};
use pricing_sync_lib::domain::catalog_data::builtin_catalog;
use pricing_sync_lib::infrastructure::logging::log_system_info;
use pricing_sync_lib::infrastructure::{
    AppConfig, DatabaseConnection, SqliteMarketDataRepository, SqlitePriceStore, init_logging_with_config,
};

#[derive(Parser, Debug)]
#[command(name = "pricing-sync")]
#[command(about = "Catalog-driven repair and buyback price synchronization", long_about = None)]
struct Cli {
    /// Config file layered over the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Restrict the run to one brand (apple, samsung, google, ...)
    #[arg(long, global = true)]
    brand: Option<Brand>,

    /// Restrict the run to devices whose id contains this text
    #[arg(long = "device", global = true)]
    device_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Report missing default records without writing
    Analyze,
    /// Create the records reported missing by `analyze`
    FillGaps,
    /// Seed every catalog model
    Seed {
        /// Replace generated prices instead of inserting only
        #[arg(long)]
        overwrite: bool,
    },
    /// Overwrite the models whose device id contains FILTER
    SeedTargeted { filter: String },
    /// Delete drift and ghost records, re-key misplaced ones
    DeepClean,
    /// Delete buyback records for delisted storage capacities
    PruneStorage,
    /// Upsert market values from a JSON array
    ImportMarket { file: PathBuf },
    /// Print the stored market values in scope
    ListMarket,
    /// Remove the market value of one device
    DeleteMarket { device_id: String },
}

impl Cli {
    fn scope(&self) -> SyncScope {
        let scope = self.brand.map_or_else(SyncScope::all, SyncScope::brand);
        match &self.device_filter {
            Some(filter) => scope.with_device_filter(filter.clone()),
            None => scope,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Summary(SyncSummary),
    MarketValues(Vec<MarketValueRecord>),
}

impl Output {
    const fn success(&self) -> bool {
        match self {
            Self::Summary(summary) => summary.success,
            Self::MarketValues(_) => true,
        }
    }
}

fn market_summary(count: usize, message: String) -> SyncSummary {
    SyncSummary {
        success: true,
        processed_count: count,
        updated_count: 0,
        created_count: 0,
        deleted_count: 0,
        errors: Vec::new(),
        warnings: Vec::new(),
        message,
        gap_report: None,
    }
}

async fn import_market(repo: &SqliteMarketDataRepository, path: &Path) -> Result<SyncSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Failed to read {:?}: {}", path, e))?;
    let records: Vec<MarketValueRecord> = serde_json::from_str(&raw)?;
    for record in &records {
        repo.upsert(record).await?;
    }
    info!(count = records.len(), "Imported market values");

    Ok(SyncSummary {
        updated_count: records.len(),
        ..market_summary(records.len(), format!("Imported {} market values", records.len()))
    })
}

async fn delete_market(repo: &SqliteMarketDataRepository, device_id: &str) -> Result<SyncSummary> {
    let removed = repo.delete(device_id).await?;
    info!(device_id, removed, "Deleted market value");

    let message = if removed {
        format!("Deleted market value for {device_id}")
    } else {
        format!("No market value stored for {device_id}")
    };
    Ok(SyncSummary {
        deleted_count: usize::from(removed),
        ..market_summary(1, message)
    })
}

async fn run(cli: Cli) -> Result<Output> {
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging_with_config(&config.logging)?;
    log_system_info();

    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;

    let store = Arc::new(SqlitePriceStore::new(db.pool().clone()));
    let market = Arc::new(SqliteMarketDataRepository::new(db.pool().clone()));
    let scope = cli.scope();

    match &cli.command {
        Command::ImportMarket { file } => return import_market(&market, file).await.map(Output::Summary),
        Command::DeleteMarket { device_id } => return delete_market(&market, device_id).await.map(Output::Summary),
        Command::ListMarket => {
            let records = market.find_all().await?;
            return Ok(Output::MarketValues(
                records.into_iter().filter(|r| scope.includes(&r.device_id)).collect(),
            ));
        }
        _ => {}
    }

    let catalog = Arc::new(builtin_catalog());
    info!(catalog_version = %catalog.version(), "Loaded built-in catalog");

    let engine = PricingSyncEngine::new(catalog, store)
        .with_market_data(market)
        .with_options(config.sync.engine_options());
    let actions = OperatorActions::new(Arc::new(engine));

    let summary = match cli.command {
        Command::Analyze => actions.analyze_gaps(&scope).await,
        Command::FillGaps => actions.generate_defaults_for_gaps(&scope).await,
        Command::Seed { overwrite } => actions.seed_all(overwrite).await,
        Command::SeedTargeted { filter } => actions.seed_targeted(&filter).await,
        Command::DeepClean => actions.deep_clean(&scope).await,
        Command::PruneStorage => actions.prune_storage(&scope).await,
        Command::ImportMarket { .. } | Command::DeleteMarket { .. } | Command::ListMarket => {
            return Err(anyhow!("market commands do not run the sync engine"));
        }
    };
    Ok(Output::Summary(summary))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Failed to serialize output: {}", e),
            }
            if output.success() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(e) => {
            error!("pricing-sync failed: {:#}", e);
            eprintln!("pricing-sync failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pricing-sync").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_options_in_any_position() {
        let cli = parse(&["seed", "--overwrite", "--config", "/tmp/p.toml"]).unwrap();
        assert_eq!(cli.command, Command::Seed { overwrite: true });
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));

        let cli = parse(&["--brand", "google", "analyze"]).unwrap();
        assert_eq!(cli.brand, Some(Brand::Google));
        assert_eq!(cli.command, Command::Analyze);
    }

    #[test]
    fn targeted_seed_requires_a_filter() {
        assert!(parse(&["seed-targeted"]).is_err());
        let cli = parse(&["seed-targeted", "iphone-15"]).unwrap();
        assert_eq!(
            cli.command,
            Command::SeedTargeted {
                filter: "iphone-15".to_string()
            }
        );
    }

    #[test]
    fn market_commands_take_their_arguments() {
        let cli = parse(&["import-market", "values.json"]).unwrap();
        assert_eq!(
            cli.command,
            Command::ImportMarket {
                file: PathBuf::from("values.json")
            }
        );
        let cli = parse(&["delete-market", "google-pixel-8"]).unwrap();
        assert_eq!(
            cli.command,
            Command::DeleteMarket {
                device_id: "google-pixel-8".to_string()
            }
        );
        assert!(parse(&["delete-market"]).is_err());
        assert_eq!(parse(&["--brand", "apple", "list-market"]).unwrap().command, Command::ListMarket);
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["explode"]).is_err());
        assert!(parse(&["analyze", "--fast"]).is_err());
        assert!(parse(&["analyze", "extra"]).is_err());
        assert!(parse(&["--brand", "nokia", "analyze"]).is_err());
        assert!(parse(&["analyze", "--overwrite"]).is_err());
    }

    #[test]
    fn scope_combines_brand_and_device_filter() {
        let cli = parse(&["--brand", "apple", "--device", "iphone-15", "deep-clean"]).unwrap();
        let scope = cli.scope();
        assert!(scope.includes("apple-iphone-15-pro"));
        assert!(!scope.includes("apple-iphone-14"));
    }

    #[test]
    fn market_listing_serializes_as_a_plain_array() {
        let output = Output::MarketValues(Vec::new());
        assert!(output.success());
        assert_eq!(serde_json::to_string(&output).unwrap(), "[]");
    }
}
