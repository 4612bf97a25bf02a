//! Reward APR injection
//!
//! apr = SECONDS_PER_YEAR * rewardRate * tokenPrice
//!       / (poolPrice * totalStaked * tokenPrice)
//!
//! `rewardRate` is normalized by the reward token's own decimals (read once
//! per distinct token), `totalStaked` by the wrapper's 18. `poolPrice` is the
//! per-wrapper-token USD price written by the TVL stage. Every undefined
//! ratio (unknown price, zero pool price, nothing staked) is "0".

use alloy_primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::math::{
    fixed, normalize, normalize_str, parse_fixed, price_decimal, safe_div, SECONDS_PER_YEAR,
};
use super::tvl::LP_DECIMALS;
use crate::error::FetchError;
use crate::registry::GaugeSource;
use crate::types::{PoolRecord, PriceMap, RewardToken};

/// APR of one reward token, `None` when the ratio is undefined
pub fn reward_apr(
    reward_rate: &str,
    reward_decimals: u8,
    token_price_usd: f64,
    pool_price: &str,
    total_staked: U256,
) -> Option<Decimal> {
    let rate = normalize_str(reward_rate, reward_decimals)?;
    let price = price_decimal(token_price_usd);
    let pool_price = parse_fixed(pool_price)?;
    let staked = normalize(total_staked, LP_DECIMALS)?;

    let yearly_usd = Decimal::from(SECONDS_PER_YEAR)
        .checked_mul(rate)?
        .checked_mul(price)?;
    let staked_usd = pool_price.checked_mul(staked)?.checked_mul(price)?;

    safe_div(yearly_usd, staked_usd)
}

/// Decimals of every distinct reward token across `pools`
async fn reward_decimals(
    pools: &[PoolRecord],
    gauges: &dyn GaugeSource,
    concurrency: usize,
) -> Result<HashMap<Address, u8>, FetchError> {
    let mut seen = HashSet::new();
    let tokens: Vec<Address> = pools
        .iter()
        .flat_map(|p| p.reward_tokens.iter().map(|t| t.id))
        .filter(|id| seen.insert(*id))
        .collect();

    let results: Vec<Result<(Address, u8), FetchError>> = stream::iter(tokens)
        .map(|token| async move {
            let decimals = gauges.token_decimals(token).await?;
            Ok::<_, FetchError>((token, decimals))
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.into_iter().collect()
}

fn annotate(
    mut tokens: Vec<RewardToken>,
    pool_price: &str,
    total_staked: U256,
    prices: &PriceMap,
    decimals: &HashMap<Address, u8>,
) -> Vec<RewardToken> {
    for token in &mut tokens {
        let apr = decimals
            .get(&token.id)
            .and_then(|&d| {
                reward_apr(&token.reward_rate, d, prices.usd(&token.id), pool_price, total_staked)
            })
            .unwrap_or(Decimal::ZERO);
        token.apr = Some(fixed(apr));
    }
    tokens
}

/// Attach `apr` to every reward token of every pool.
///
/// Requires the TVL stage to have run (`poolPrice`). The staking contract's
/// supply is only read for pools that stream at least one reward token.
pub async fn inject_apr(
    pools: Vec<PoolRecord>,
    gauges: &dyn GaugeSource,
    prices: &PriceMap,
    concurrency: usize,
) -> Result<Vec<PoolRecord>, FetchError> {
    let decimals = reward_decimals(&pools, gauges, concurrency).await?;
    let decimals = &decimals;

    let results: Vec<Result<PoolRecord, FetchError>> = stream::iter(pools)
        .map(|mut pool| async move {
            if pool.reward_tokens.is_empty() {
                return Ok(pool);
            }

            let total_staked = gauges.total_supply(pool.staking_address).await?;
            let pool_price = pool.pool_price.clone().unwrap_or_else(|| "0".to_string());

            let tokens = std::mem::take(&mut pool.reward_tokens);
            pool.reward_tokens = annotate(tokens, &pool_price, total_staked, prices, decimals);
            Ok(pool)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let pools = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    debug!("Injected APR into {} pools", pools.len());
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GaugeBalance;
    use alloy_primitives::{address, Address};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const REWARD: Address = address!("00000000000000000000000000000000000000d4");
    const USDC: Address = address!("00000000000000000000000000000000000000f6");
    const STAKING: Address = address!("00000000000000000000000000000000000000e5");

    fn wei(tokens: u64) -> U256 {
        U256::from(tokens) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_reward_apr_hand_computed() {
        // 1 token/s for a year at $40 per staked token, 790_560 staked:
        // 31_622_400 / (40 * 790_560) = 1
        let apr = reward_apr("1000000000000000000", 18, 2.0, "40", wei(790_560)).unwrap();
        assert_eq!(fixed(apr), "1");

        let apr = reward_apr("500000000000000000", 18, 2.0, "40", wei(790_560)).unwrap();
        assert_eq!(fixed(apr), "0.5");
    }

    #[test]
    fn test_reward_apr_uses_token_decimals() {
        // 1 six-decimal token/s is the same emission as 1e18 wei/s of an 18-decimal one
        let apr = reward_apr("1000000", 6, 1.0, "40", wei(790_560)).unwrap();
        assert_eq!(fixed(apr), "1");
    }

    #[test]
    fn test_reward_apr_undefined_ratios() {
        assert_eq!(reward_apr("1000000000000000000", 18, 2.0, "0", wei(1)), None);
        assert_eq!(reward_apr("1000000000000000000", 18, 0.0, "40", wei(1)), None);
        assert_eq!(reward_apr("1000000000000000000", 18, 2.0, "40", U256::ZERO), None);
        assert_eq!(reward_apr("garbage", 18, 2.0, "40", wei(1)), None);
    }

    struct FixedSupply {
        supply: U256,
        reads: AtomicUsize,
        decimals_reads: Mutex<Vec<Address>>,
    }

    impl FixedSupply {
        fn new(supply: U256) -> Self {
            Self { supply, reads: AtomicUsize::new(0), decimals_reads: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl GaugeSource for FixedSupply {
        async fn gauge_balances(
            &self,
            _gauge: Address,
            _voters: &[Address],
        ) -> Result<Vec<GaugeBalance>, FetchError> {
            unreachable!()
        }

        async fn total_supply(&self, token: Address) -> Result<U256, FetchError> {
            assert_eq!(token, STAKING);
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.supply)
        }

        async fn bribe_left(&self, _bribe: Address, _token: Address) -> Result<U256, FetchError> {
            unreachable!()
        }

        async fn token_decimals(&self, token: Address) -> Result<u8, FetchError> {
            self.decimals_reads.lock().unwrap().push(token);
            Ok(if token == USDC { 6 } else { 18 })
        }
    }

    fn pool(pool_price: &str, reward_tokens: Vec<RewardToken>) -> PoolRecord {
        PoolRecord {
            staking_address: STAKING,
            pool_price: Some(pool_price.to_string()),
            reward_tokens,
            ..Default::default()
        }
    }

    fn reward(rate: &str) -> RewardToken {
        reward_of(REWARD, rate)
    }

    fn reward_of(id: Address, rate: &str) -> RewardToken {
        RewardToken { id, reward_rate: rate.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_inject_apr_attaches_to_reward_tokens() {
        let mut prices = PriceMap::new();
        prices.insert(format!("{:?}", REWARD), 2.0);
        let gauges = FixedSupply::new(wei(790_560));

        let pools = vec![
            pool("40", vec![reward("1000000000000000000")]),
            pool("0", vec![reward("1000000000000000000")]),
            pool("40", vec![]),
        ];
        let pools = inject_apr(pools, &gauges, &prices, 4).await.unwrap();

        assert_eq!(pools[0].reward_tokens[0].apr.as_deref(), Some("1"));
        assert_eq!(pools[1].reward_tokens[0].apr.as_deref(), Some("0"));
        assert!(pools[2].reward_tokens.is_empty());
        assert_eq!(gauges.reads.load(Ordering::SeqCst), 2);
        // one decimals read for the single distinct reward token
        assert_eq!(*gauges.decimals_reads.lock().unwrap(), vec![REWARD]);
    }

    #[tokio::test]
    async fn test_inject_apr_mixed_reward_decimals() {
        let mut prices = PriceMap::new();
        prices.insert(format!("{:?}", REWARD), 2.0);
        prices.insert(format!("{:?}", USDC), 1.0);
        let gauges = FixedSupply::new(wei(790_560));

        let pools = vec![pool(
            "40",
            vec![reward_of(USDC, "1000000"), reward("1000000000000000000")],
        )];
        let pools = inject_apr(pools, &gauges, &prices, 4).await.unwrap();

        assert_eq!(pools[0].reward_tokens[0].apr.as_deref(), Some("1"));
        assert_eq!(pools[0].reward_tokens[1].apr.as_deref(), Some("1"));
        assert_eq!(gauges.decimals_reads.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_reward_price_is_zero_apr() {
        let gauges = FixedSupply::new(wei(10));
        let pools = vec![pool("40", vec![reward("1000000000000000000")])];

        let pools = inject_apr(pools, &gauges, &PriceMap::new(), 1).await.unwrap();
        assert_eq!(pools[0].reward_tokens[0].apr.as_deref(), Some("0"));
    }
}
