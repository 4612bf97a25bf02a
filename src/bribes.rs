//! Bribe Aggregator
//!
//! Sums the incentives still to be paid out by every pool's bribe contract,
//! in USD. Runs beside the metric chain and never writes back into pools.

use alloy_primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FetchError;
use crate::metrics::math::{fixed, normalize, parse_fixed, price_decimal};
use crate::registry::GaugeSource;
use crate::types::{PoolRecord, PriceMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BribeEntry {
    pub bribe_token_address: Address,
    /// Remaining amount normalized by the token's decimals
    pub amount: String,
    pub amount_usd: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BribeSummary {
    pub ox_pool_address: Address,
    pub solid_pool_address: Address,
    pub bribe_address: Address,
    pub bribe_tokens_addresses: Vec<Address>,
    pub bribes: Vec<BribeEntry>,
    pub bribe_total_usd: String,
}

impl BribeSummary {
    fn total(&self) -> Decimal {
        parse_fixed(&self.bribe_total_usd).unwrap_or(Decimal::ZERO)
    }
}

/// Value one remaining bribe amount. `None` when nothing is left.
pub fn bribe_entry(token: Address, left: U256, decimals: u8, price_usd: f64) -> Option<BribeEntry> {
    if left.is_zero() {
        return None;
    }
    let amount = normalize(left, decimals).unwrap_or(Decimal::ZERO);
    let amount_usd = amount.checked_mul(price_decimal(price_usd)).unwrap_or(Decimal::ZERO);

    Some(BribeEntry {
        bribe_token_address: token,
        amount: fixed(amount),
        amount_usd: fixed(amount_usd),
        price: if price_usd.is_finite() { price_usd } else { 0.0 },
    })
}

async fn pool_bribes(
    pool: &PoolRecord,
    gauges: &dyn GaugeSource,
    prices: &PriceMap,
) -> Result<BribeSummary, FetchError> {
    let data = &pool.pool_data;
    let mut bribes = Vec::new();
    let mut total = Decimal::ZERO;

    for token in &data.bribe_tokens_addresses {
        let left = gauges.bribe_left(data.bribe_address, *token).await?;
        if left.is_zero() {
            continue;
        }
        let decimals = gauges.token_decimals(*token).await?;

        if let Some(entry) = bribe_entry(*token, left, decimals, prices.usd(token)) {
            let usd = parse_fixed(&entry.amount_usd).unwrap_or(Decimal::ZERO);
            total = total.checked_add(usd).unwrap_or(total);
            bribes.push(entry);
        }
    }

    Ok(BribeSummary {
        ox_pool_address: pool.id,
        solid_pool_address: data.id,
        bribe_address: data.bribe_address,
        bribe_tokens_addresses: data.bribe_tokens_addresses.clone(),
        bribes,
        bribe_total_usd: fixed(total),
    })
}

/// Per-pool bribe totals, largest first (ties by wrapper address).
///
/// Pools are read concurrently, each pool's tokens in order.
pub async fn aggregate_bribes(
    pools: &[PoolRecord],
    gauges: &dyn GaugeSource,
    prices: &PriceMap,
    concurrency: usize,
) -> Result<Vec<BribeSummary>, FetchError> {
    let results: Vec<Result<BribeSummary, FetchError>> = stream::iter(pools)
        .map(|pool| pool_bribes(pool, gauges, prices))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summaries = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    summaries.sort_by(|a, b| {
        b.total()
            .cmp(&a.total())
            .then_with(|| a.ox_pool_address.cmp(&b.ox_pool_address))
    });

    let with_bribes = summaries.iter().filter(|s| !s.bribes.is_empty()).count();
    debug!("Bribe totals for {} pools", summaries.len());
    info!("{} of {} pools carry live bribes", with_bribes, summaries.len());
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GaugeBalance, PoolData};
    use alloy_primitives::address;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BRIBE_A: Address = address!("00000000000000000000000000000000000000ba");
    const BRIBE_B: Address = address!("00000000000000000000000000000000000000bb");
    const WFTM: Address = address!("00000000000000000000000000000000000000f1");
    const USDC: Address = address!("00000000000000000000000000000000000000f2");

    struct FakeBribes {
        left: HashMap<(Address, Address), U256>,
        decimals: HashMap<Address, u8>,
        decimals_reads: Mutex<Vec<Address>>,
    }

    #[async_trait]
    impl GaugeSource for FakeBribes {
        async fn gauge_balances(
            &self,
            _gauge: Address,
            _voters: &[Address],
        ) -> Result<Vec<GaugeBalance>, FetchError> {
            unreachable!()
        }

        async fn total_supply(&self, _token: Address) -> Result<U256, FetchError> {
            unreachable!()
        }

        async fn bribe_left(&self, bribe: Address, token: Address) -> Result<U256, FetchError> {
            Ok(self.left.get(&(bribe, token)).copied().unwrap_or(U256::ZERO))
        }

        async fn token_decimals(&self, token: Address) -> Result<u8, FetchError> {
            self.decimals_reads.lock().unwrap().push(token);
            self.decimals
                .get(&token)
                .copied()
                .ok_or_else(|| FetchError::rpc("decimals", "not a token"))
        }
    }

    fn pool(id: u8, bribe: Address) -> PoolRecord {
        PoolRecord {
            id: Address::repeat_byte(id),
            pool_data: PoolData {
                bribe_address: bribe,
                bribe_tokens_addresses: vec![WFTM, USDC],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn prices() -> PriceMap {
        let mut prices = PriceMap::new();
        prices.insert(format!("{:?}", WFTM), 0.5);
        prices.insert(format!("{:?}", USDC), 1.0);
        prices
    }

    fn fake() -> FakeBribes {
        let mut left = HashMap::new();
        // pool A: 10 WFTM, nothing in USDC
        left.insert((BRIBE_A, WFTM), U256::from(10u64) * U256::from(10u64).pow(U256::from(18)));
        left.insert((BRIBE_A, USDC), U256::ZERO);
        // pool B: 2 WFTM + 100 USDC
        left.insert((BRIBE_B, WFTM), U256::from(2u64) * U256::from(10u64).pow(U256::from(18)));
        left.insert((BRIBE_B, USDC), U256::from(100_000_000u64));

        FakeBribes {
            left,
            decimals: HashMap::from([(WFTM, 18), (USDC, 6)]),
            decimals_reads: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_zero_left_produces_no_entry() {
        assert!(bribe_entry(WFTM, U256::ZERO, 18, 0.5).is_none());

        let entry = bribe_entry(USDC, U256::from(2_500_000u64), 6, 1.0).unwrap();
        assert_eq!(entry.amount, "2.5");
        assert_eq!(entry.amount_usd, "2.5");
    }

    #[tokio::test]
    async fn test_aggregate_skips_zero_and_sorts_by_total() {
        let gauges = fake();
        let pools = vec![pool(1, BRIBE_A), pool(2, BRIBE_B)];

        let summaries = aggregate_bribes(&pools, &gauges, &prices(), 4).await.unwrap();

        assert_eq!(summaries.len(), 2);
        // 2 * 0.5 + 100 * 1 = 101 beats 10 * 0.5 = 5
        assert_eq!(summaries[0].ox_pool_address, Address::repeat_byte(2));
        assert_eq!(summaries[0].bribe_total_usd, "101");
        assert_eq!(summaries[0].bribes.len(), 2);

        assert_eq!(summaries[1].bribe_total_usd, "5");
        assert_eq!(summaries[1].bribes.len(), 1);
        assert_eq!(summaries[1].bribes[0].bribe_token_address, WFTM);
        assert_eq!(summaries[1].bribes[0].amount, "10");

        // decimals are never read for empty bribes
        let reads = gauges.decimals_reads.lock().unwrap();
        assert_eq!(reads.iter().filter(|t| **t == USDC).count(), 1);
    }

    #[tokio::test]
    async fn test_unpriced_bribe_counts_as_zero_usd() {
        let gauges = fake();
        let pools = vec![pool(1, BRIBE_A)];

        let summaries = aggregate_bribes(&pools, &gauges, &PriceMap::new(), 1).await.unwrap();
        assert_eq!(summaries[0].bribes[0].amount_usd, "0");
        assert_eq!(summaries[0].bribe_total_usd, "0");
    }

    #[tokio::test]
    async fn test_json_layout() {
        let gauges = fake();
        let summaries = aggregate_bribes(&[pool(2, BRIBE_B)], &gauges, &prices(), 1)
            .await
            .unwrap();
        let json = serde_json::to_value(&summaries[0]).unwrap();

        assert!(json.get("oxPoolAddress").is_some());
        assert!(json.get("solidPoolAddress").is_some());
        assert_eq!(json["bribeTotalUsd"], "101");
        assert_eq!(json["bribes"][1]["amountUsd"], "100");
    }
}
