//! One metrics run, end to end
//!
//! fetch -> prices -> timestamp / TVL / APR / boost -> summary -> persist
//! (-> bribes) -> upload
//!
//! A partial registry read ends the run before any price is requested or
//! any artifact is written. Writing and uploading artifacts is best-effort:
//! a run succeeds once its metrics are computed.

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::bribes::{aggregate_bribes, BribeSummary};
use crate::config::{Config, TrackedVoters};
use crate::error::PipelineError;
use crate::metrics::math::parse_fixed;
use crate::metrics::MetricsContext;
use crate::price_feed::{collect_token_addresses, PriceFeed};
use crate::registry::{GaugeSource, PoolFetcher, RegistrySource};
use crate::storage::{upload_artifacts, Artifact, JsonStore, ObjectStore};
use crate::summary::{PartnerApr, ProtocolSummary};
use crate::types::PoolRecord;

pub const PRICES_ARTIFACT: &str = "prices";
pub const POOLS_ARTIFACT: &str = "pools";
pub const PROTOCOL_ARTIFACT: &str = "protocol";
pub const BRIBES_ARTIFACT: &str = "bribes";

/// Knobs of a run, lifted out of [`Config`]
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub page_size: usize,
    pub concurrency: usize,
    pub voters: TrackedVoters,
    pub enable_bribes: bool,
    pub partner_apr: PartnerApr,
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            concurrency: config.max_concurrent_calls,
            voters: config.voters,
            enable_bribes: config.enable_bribes,
            partner_apr: config.partner_apr.clone(),
        }
    }
}

/// What a successful run produced
#[derive(Debug)]
pub struct RunReport {
    /// Annotated pools, in persisted order
    pub pools: Vec<PoolRecord>,
    pub summary: ProtocolSummary,
    pub bribes: Option<Vec<BribeSummary>>,
    pub uploaded: usize,
}

pub struct Pipeline {
    registry: Arc<dyn RegistrySource>,
    gauges: Arc<dyn GaugeSource>,
    price_feed: Arc<dyn PriceFeed>,
    store: JsonStore,
    uploader: Option<Arc<dyn ObjectStore>>,
    settings: RunSettings,
}

impl Pipeline {
    pub fn new(
        registry: Arc<dyn RegistrySource>,
        gauges: Arc<dyn GaugeSource>,
        price_feed: Arc<dyn PriceFeed>,
        store: JsonStore,
        settings: RunSettings,
    ) -> Self {
        Self { registry, gauges, price_feed, store, uploader: None, settings }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn ObjectStore>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Run stamped with the current unix time
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        self.run_at(chrono::Utc::now().timestamp()).await
    }

    pub async fn run_at(&self, timestamp: i64) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut artifacts: Vec<Artifact> = Vec::new();

        // ========== Source Reader ==========
        let fetcher = PoolFetcher::new(self.registry.clone(), self.settings.page_size);
        let pools = match fetcher.fetch_pools().await {
            Ok(pools) => pools,
            Err(e) => {
                error!("Registry read failed, nothing computed or saved: {}", e);
                return Err(e.into());
            }
        };

        // ========== Prices ==========
        let tokens = collect_token_addresses(&pools);
        let prices = self.price_feed.resolve(&tokens).await?;
        self.persist(&mut artifacts, PRICES_ARTIFACT, &prices);

        // ========== Metric chain ==========
        let context = MetricsContext {
            prices: &prices,
            gauges: self.gauges.as_ref(),
            voters: self.settings.voters,
            concurrency: self.settings.concurrency,
        };
        let mut pools = context.annotate(pools, timestamp).await?;

        let summary = ProtocolSummary::from_pools(&pools, timestamp)
            .with_partner_apr(&self.settings.partner_apr);

        sort_by_tvl(&mut pools);
        self.persist(&mut artifacts, POOLS_ARTIFACT, &pools);
        self.persist(&mut artifacts, PROTOCOL_ARTIFACT, &summary);

        // ========== Bribes ==========
        let bribes = if self.settings.enable_bribes {
            match aggregate_bribes(&pools, self.gauges.as_ref(), &prices, self.settings.concurrency)
                .await
            {
                Ok(bribes) => {
                    self.persist(&mut artifacts, BRIBES_ARTIFACT, &bribes);
                    Some(bribes)
                }
                Err(e) => {
                    warn!("Bribe aggregation failed, bribes.json not updated: {}", e);
                    None
                }
            }
        } else {
            None
        };

        // ========== Upload ==========
        let uploaded = match &self.uploader {
            Some(uploader) => upload_artifacts(uploader.as_ref(), artifacts).await,
            None => 0,
        };

        info!(
            "Run complete: {} pools, total TVL ${} in {:?}",
            summary.pools_count,
            summary.total_tvl_usd,
            start.elapsed()
        );

        Ok(RunReport { pools, summary, bribes, uploaded })
    }

    /// Write one artifact; only written artifacts are queued for upload
    fn persist<T>(&self, artifacts: &mut Vec<Artifact>, name: &str, value: &T)
    where
        T: Serialize + ?Sized,
    {
        match self.store.save(name, value) {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => warn!("Could not save {}.json, continuing: {}", name, e),
        }
    }
}

fn tvl_of(pool: &PoolRecord) -> Decimal {
    pool.total_tvl_usd
        .as_deref()
        .and_then(parse_fixed)
        .unwrap_or(Decimal::ZERO)
}

/// Largest wrapper TVL first, ties by wrapper address
pub fn sort_by_tvl(pools: &mut [PoolRecord]) {
    pools.sort_by(|a, b| match tvl_of(b).cmp(&tvl_of(a)) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
}
