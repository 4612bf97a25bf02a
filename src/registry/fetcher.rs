//! Paginated pool fetcher
//!
//! Reads the wrapper address list once, then walks it page by page:
//!
//! 1. `oxPoolsData` for the page
//! 2. `poolsReservesInfo` + `rewardTokensDatas` (concurrently, both need step 1)
//! 3. merge into the shared collection
//!
//! Page n+1 is requested only after page n has been merged. A failed call
//! does not stop the walk, but the whole result is rejected at the end.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::source::RegistrySource;
use crate::error::FetchError;
use crate::types::{PoolCollection, PoolRecord, ReserveInfo, RewardToken};

/// Default number of wrappers per lens request
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub struct PoolFetcher {
    source: Arc<dyn RegistrySource>,
    page_size: usize,
}

impl PoolFetcher {
    pub fn new(source: Arc<dyn RegistrySource>, page_size: usize) -> Self {
        Self { source, page_size: page_size.max(1) }
    }

    /// Fetch and merge every pool known to the registry.
    ///
    /// Fails with [`FetchError::PartialFetch`] if any call on any page failed.
    pub async fn fetch_pools(&self) -> Result<Vec<PoolRecord>, FetchError> {
        let start = Instant::now();
        let addresses = self.source.pool_addresses().await?;
        debug!("Registry lists {} pools", addresses.len());

        let mut collection = PoolCollection::default();
        let mut failed_calls = 0;
        let mut current_page = 0;

        loop {
            let page = page_slice(&addresses, current_page, self.page_size);
            if page.is_empty() {
                break;
            }
            current_page += 1;

            match self.fetch_page(page).await {
                Ok(pools) => {
                    debug!("Page {}: merged {} pools", current_page, pools.len());
                    for pool in pools {
                        collection.upsert(pool);
                    }
                }
                Err(failures) => {
                    for err in &failures {
                        warn!("Page {}: {}", current_page, err);
                    }
                    failed_calls += failures.len();
                }
            }
        }

        if failed_calls > 0 {
            return Err(FetchError::PartialFetch { failed_calls, pages: current_page });
        }
        if collection.is_empty() {
            warn!("Registry returned no pools");
        }

        info!(
            "Fetched {} pools in {:?} ({} pages)",
            collection.len(),
            start.elapsed(),
            current_page
        );

        Ok(collection.into_vec())
    }

    /// Read and merge one page. All failures of the page are returned together.
    async fn fetch_page(&self, page: &[Address]) -> Result<Vec<PoolRecord>, Vec<FetchError>> {
        let pools = self.source.pools_data(page).await.map_err(|e| vec![e])?;

        let pool_addresses: Vec<Address> = pools.iter().map(|p| p.pool_data.id).collect();
        let staking_addresses: Vec<Address> = pools.iter().map(|p| p.staking_address).collect();

        let (reserves, rewards) = tokio::join!(
            self.source.reserves_info(&pool_addresses),
            self.source.reward_tokens(&staking_addresses),
        );

        match (reserves, rewards) {
            (Ok(reserves), Ok(rewards)) => merge_page(pools, reserves, rewards),
            (reserves, rewards) => Err([reserves.err(), rewards.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }
}

/// Slice `page` of `addresses`; empty once past the end
fn page_slice(addresses: &[Address], page: usize, page_size: usize) -> &[Address] {
    let start = page.saturating_mul(page_size).min(addresses.len());
    let end = start.saturating_add(page_size).min(addresses.len());
    &addresses[start..end]
}

/// Join reserves by underlying pool address and reward tokens by position
fn merge_page(
    pools: Vec<PoolRecord>,
    reserves: Vec<ReserveInfo>,
    rewards: Vec<Vec<RewardToken>>,
) -> Result<Vec<PoolRecord>, Vec<FetchError>> {
    if rewards.len() != pools.len() {
        let pool = pools.first().map(|p| p.id).unwrap_or(Address::ZERO);
        return Err(vec![FetchError::Merge {
            pool,
            reason: format!(
                "{} reward token lists for {} pools",
                rewards.len(),
                pools.len()
            ),
        }]);
    }

    let reserves_by_pool: HashMap<Address, ReserveInfo> =
        reserves.into_iter().map(|r| (r.id, r)).collect();

    let mut merged = Vec::with_capacity(pools.len());
    let mut failures = Vec::new();

    for (mut pool, reward_tokens) in pools.into_iter().zip(rewards) {
        match reserves_by_pool.get(&pool.pool_data.id) {
            Some(reserve) => {
                pool.pool_data.apply_reserves(reserve);
                pool.reward_tokens = reward_tokens;
                merged.push(pool);
            }
            None => failures.push(FetchError::Merge {
                pool: pool.id,
                reason: format!("no reserve data for {:?}", pool.pool_data.id),
            }),
        }
    }

    if failures.is_empty() {
        Ok(merged)
    } else {
        Err(failures)
    }
}
