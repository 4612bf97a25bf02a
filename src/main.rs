//! Lens Metrics - pool metrics daemon
//!
//! Run with: cargo run
//!
//! One run per invocation:
//! - Pages through the registry lens and merges reserves + reward tokens
//! - Prices every referenced token
//! - Computes TVL, pool price, APR and boost per pool
//! - Writes prices.json, pools.json, protocol.json (and bribes.json)

use color_eyre::eyre::{eyre, Result};
use console::style;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bribes;
mod config;
mod error;
mod metrics;
mod pipeline;
mod price_feed;
mod registry;
mod storage;
mod summary;
mod types;

use config::Config;
use pipeline::{Pipeline, RunReport, RunSettings};
use price_feed::HttpPriceFeed;
use registry::ChainReader;
use storage::{HttpObjectStore, JsonStore};

/// Pools listed in the console report
const TOP_POOLS: usize = 10;

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 📊 LENS METRICS - Pool TVL / APR / Boost").cyan().bold()
    );
    println!(
        "{}",
        style("    Registry lens | Price feed | JSON artifacts").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config() -> Result<Config> {
    match std::env::var("LENS_METRICS_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            Config::from_file(&path)
        }
        Err(_) => Config::from_env(),
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", style("═══ TOP POOLS BY TVL ═══").green().bold());
    println!();

    for (i, pool) in report.pools.iter().take(TOP_POOLS).enumerate() {
        println!(
            "  {:>2}. {:<28} TVL ${:<18} price ${:<14} boost {} / {}",
            i + 1,
            style(&pool.pool_data.symbol).cyan(),
            pool.total_tvl_usd.as_deref().unwrap_or("0"),
            pool.pool_price.as_deref().unwrap_or("0"),
            pool.boost_ox_dao.as_deref().unwrap_or("-"),
            pool.boost_solidex.as_deref().unwrap_or("-"),
        );
    }

    println!();
    println!("{} Saved {} pools", style("✓").green(), report.summary.pools_count);
    println!("{} Total TVL: ${}", style("✓").green(), report.summary.total_tvl_usd);
    if let Some(bribes) = &report.bribes {
        println!("{} Bribe totals for {} pools", style("✓").green(), bribes.len());
    }
    if report.uploaded > 0 {
        println!("{} Uploaded {} artifacts", style("✓").green(), report.uploaded);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lens_metrics=info".parse()?),
        )
        .init();

    print_banner();

    // Load configuration
    let config = load_config()?;

    // Validate configuration
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Please check your .env file");
        return Err(e);
    }

    // Print configuration summary
    config.print_summary();
    println!();

    let reader = Arc::new(ChainReader::new(
        &config.provider_url,
        config.ox_lens,
        config.solidly_lens,
    )?);
    let price_feed = HttpPriceFeed::new(config.price_feed_url.clone(), config.price_feed_chunk)?;

    let mut pipeline = Pipeline::new(
        reader.clone(),
        reader,
        Arc::new(price_feed),
        JsonStore::new(config.data_dir.clone()),
        RunSettings::from(&config),
    );

    match &config.upload_base_url {
        Some(base_url) => {
            pipeline = pipeline.with_uploader(Arc::new(HttpObjectStore::new(base_url.clone())?));
        }
        None => info!("UPLOAD_BASE_URL not set, artifacts stay local"),
    }

    match pipeline.run().await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            Err(eyre!("metrics run failed: {}", e))
        }
    }
}
