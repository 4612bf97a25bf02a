//! Metric calculator chain
//!
//! Ordered full-list passes over the merged pools:
//! timestamp -> TVL / pool price -> APR -> boost.
//! The price map is built once per run and only ever read here.

pub mod apr;
pub mod boost;
pub mod math;
pub mod tvl;

pub use apr::inject_apr;
pub use boost::inject_boost;
pub use tvl::inject_tvl;

use tracing::info;

use crate::config::TrackedVoters;
use crate::error::FetchError;
use crate::registry::GaugeSource;
use crate::types::{PoolRecord, PriceMap};

/// Stamp every pool with the run's unix timestamp
pub fn inject_timestamp(pools: Vec<PoolRecord>, timestamp: i64) -> Vec<PoolRecord> {
    pools
        .into_iter()
        .map(|mut pool| {
            pool.updated = Some(timestamp);
            pool
        })
        .collect()
}

/// Everything the calculator chain reads besides the pools themselves
pub struct MetricsContext<'a> {
    pub prices: &'a PriceMap,
    pub gauges: &'a dyn GaugeSource,
    pub voters: TrackedVoters,
    pub concurrency: usize,
}

impl<'a> MetricsContext<'a> {
    /// Run the whole chain. A failed gauge or supply read fails the run.
    pub async fn annotate(
        &self,
        pools: Vec<PoolRecord>,
        timestamp: i64,
    ) -> Result<Vec<PoolRecord>, FetchError> {
        let pools = inject_timestamp(pools, timestamp);
        let pools = inject_tvl(pools, self.prices);
        let pools = inject_apr(pools, self.gauges, self.prices, self.concurrency).await?;
        let pools = inject_boost(pools, self.gauges, &self.voters, self.concurrency).await?;

        info!("Annotated {} pools", pools.len());
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_timestamp_sets_every_pool() {
        let pools = vec![PoolRecord::default(), PoolRecord::default()];
        let pools = inject_timestamp(pools, 1_650_000_000);
        assert!(pools.iter().all(|p| p.updated == Some(1_650_000_000)));
    }
}
