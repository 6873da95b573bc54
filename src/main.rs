use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rewardbook::config::ResolvedConfig;
use rewardbook::income::{aggregate, RetryPolicy};
use rewardbook::ledger::LedgerReader;
use rewardbook::prices::{CoinGeckoOracle, JsonlPriceStore, PriceCache};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rewardbook")]
#[command(about = "Staking reward income calculator")]
struct Cli {
    /// Ledger export (CSV) to read rewards from
    ledger: PathBuf,

    /// Path to config file
    #[arg(short, long, default_value = "rewardbook.toml")]
    config: PathBuf,

    /// Fiat currency override (e.g. EUR, USD)
    #[arg(long)]
    currency: Option<String>,

    /// Asset symbol override (e.g. DOT, ETH)
    #[arg(long)]
    asset: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rewardbook=warn")),
        )
        .with(fmt::layer().with_target(false))
        .init();

    let mut config = ResolvedConfig::load_or_default(&cli.config)?;
    if let Some(currency) = &cli.currency {
        config.currency = currency.trim().to_uppercase();
    }
    if let Some(asset) = &cli.asset {
        config.set_asset(asset);
    }

    let store = Arc::new(JsonlPriceStore::new(&config.data_dir, &config.currency));
    let mut oracle = CoinGeckoOracle::new();
    if let Some(id) = &config.asset.coingecko_id {
        oracle = oracle.with_mapping(config.asset.symbol.as_str(), id.as_str());
    }
    let cache = PriceCache::new(store, Arc::new(oracle), &config.currency);

    let rewards = LedgerReader::open(
        &cli.ledger,
        config.layout.clone(),
        config.filter.clone(),
        config.dust_threshold,
    )?;

    let policy = RetryPolicy {
        max_attempts: config.retry.max_attempts,
        backoff: Duration::from_secs(config.retry.backoff_secs),
    };

    let report = aggregate(rewards, &cache, &policy).await?;

    for reward in &report.rewards {
        println!(
            "{} {} ({} {}) received on {}",
            reward.quantity, reward.asset, reward.fiat_value, reward.currency, reward.date
        );
    }
    for (year, total) in &report.totals {
        println!("{year}: {total} {}", config.currency);
    }

    Ok(())
}
