//! Boost injection
//!
//! boost = 2.5 * derivedBalance / balance, per tracked voter and gauge.
//! A voter without stake (either balance zero) sits at the 2.5 baseline.

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::debug;

use super::math::{fixed_dp, normalize, safe_div};
use crate::config::TrackedVoters;
use crate::error::FetchError;
use crate::registry::GaugeSource;
use crate::types::{GaugeBalance, PoolRecord};

/// Maximum gauge boost, also the value reported when no ratio exists
pub const BASE_BOOST: Decimal = Decimal::from_parts(25, 0, 0, false, 1);

/// Gauge balances are LP-denominated
const GAUGE_DECIMALS: u8 = 18;

pub fn boost_multiplier(balances: GaugeBalance) -> Decimal {
    let balance = normalize(balances.balance, GAUGE_DECIMALS);
    let derived = normalize(balances.derived_balance, GAUGE_DECIMALS);

    let boost = balance
        .zip(derived)
        .and_then(|(balance, derived)| safe_div(balance, derived))
        .and_then(|ratio| safe_div(Decimal::ONE, ratio))
        .and_then(|inverse| BASE_BOOST.checked_mul(inverse))
        .unwrap_or(BASE_BOOST);

    if boost.is_zero() {
        BASE_BOOST
    } else {
        boost
    }
}

/// Two-decimal rendering stored on the pool record
pub fn format_boost(boost: Decimal) -> String {
    fixed_dp(boost, 2)
}

/// Read both voters' gauge balances for every pool and record their boosts.
///
/// Pools are processed concurrently (at most `concurrency` in flight); the
/// output keeps input order. Any failed read fails the stage.
pub async fn inject_boost(
    pools: Vec<PoolRecord>,
    gauges: &dyn GaugeSource,
    voters: &TrackedVoters,
    concurrency: usize,
) -> Result<Vec<PoolRecord>, FetchError> {
    let voter_list = [voters.ox_dao, voters.solidex];
    let voter_list = &voter_list;

    let results: Vec<Result<PoolRecord, FetchError>> = stream::iter(pools)
        .map(|mut pool| async move {
            let balances = gauges
                .gauge_balances(pool.pool_data.gauge_address, voter_list)
                .await?;

            let (ox_dao, solidex) = match balances.as_slice() {
                [ox_dao, solidex] => (*ox_dao, *solidex),
                other => {
                    return Err(FetchError::Merge {
                        pool: pool.id,
                        reason: format!("expected 2 gauge balances, got {}", other.len()),
                    })
                }
            };

            pool.boost_ox_dao = Some(format_boost(boost_multiplier(ox_dao)));
            pool.boost_solidex = Some(format_boost(boost_multiplier(solidex)));
            Ok(pool)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let pools = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    debug!("Injected boost into {} pools", pools.len());
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn wei(tokens: u64) -> U256 {
        U256::from(tokens) * U256::from(10u64).pow(U256::from(18))
    }

    fn balances(balance: U256, derived_balance: U256) -> GaugeBalance {
        GaugeBalance { balance, derived_balance }
    }

    #[test]
    fn test_zero_derived_balance_is_baseline() {
        let boost = boost_multiplier(balances(wei(100), U256::ZERO));
        assert_eq!(format_boost(boost), "2.50");
    }

    #[test]
    fn test_no_stake_is_baseline() {
        assert_eq!(format_boost(boost_multiplier(balances(U256::ZERO, U256::ZERO))), "2.50");
        assert_eq!(format_boost(boost_multiplier(balances(U256::ZERO, wei(5)))), "2.50");
    }

    #[test]
    fn test_boost_ratio() {
        // derived balance floor is 40% of balance -> 1x
        assert_eq!(format_boost(boost_multiplier(balances(wei(100), wei(40)))), "1.00");
        assert_eq!(format_boost(boost_multiplier(balances(wei(100), wei(70)))), "1.75");
        assert_eq!(format_boost(boost_multiplier(balances(wei(100), wei(100)))), "2.50");
        assert_eq!(format_boost(boost_multiplier(balances(wei(3), wei(2)))), "1.67");
    }

    struct FakeGauges {
        by_gauge: HashMap<Address, Vec<GaugeBalance>>,
    }

    #[async_trait]
    impl GaugeSource for FakeGauges {
        async fn gauge_balances(
            &self,
            gauge: Address,
            voters: &[Address],
        ) -> Result<Vec<GaugeBalance>, FetchError> {
            assert_eq!(voters.len(), 2);
            self.by_gauge
                .get(&gauge)
                .cloned()
                .ok_or_else(|| FetchError::rpc("balanceOf", "unknown gauge"))
        }

        async fn total_supply(&self, _token: Address) -> Result<U256, FetchError> {
            unreachable!()
        }

        async fn bribe_left(&self, _bribe: Address, _token: Address) -> Result<U256, FetchError> {
            unreachable!()
        }

        async fn token_decimals(&self, _token: Address) -> Result<u8, FetchError> {
            unreachable!()
        }
    }

    fn pool_with_gauge(gauge: Address) -> PoolRecord {
        let mut pool = PoolRecord { id: gauge, ..Default::default() };
        pool.pool_data.gauge_address = gauge;
        pool
    }

    #[tokio::test]
    async fn test_inject_boost_keeps_order_and_sets_both_voters() {
        let gauges: Vec<Address> = (1..=5u8).map(|i| Address::repeat_byte(i)).collect();
        let fake = FakeGauges {
            by_gauge: gauges
                .iter()
                .map(|g| (*g, vec![balances(wei(100), wei(70)), balances(wei(1), U256::ZERO)]))
                .collect(),
        };

        let pools = gauges.iter().map(|g| pool_with_gauge(*g)).collect();
        let pools = inject_boost(pools, &fake, &TrackedVoters::default(), 2).await.unwrap();

        assert_eq!(pools.len(), 5);
        for (pool, gauge) in pools.iter().zip(&gauges) {
            assert_eq!(pool.id, *gauge);
            assert_eq!(pool.boost_ox_dao.as_deref(), Some("1.75"));
            assert_eq!(pool.boost_solidex.as_deref(), Some("2.50"));
        }
    }

    #[tokio::test]
    async fn test_inject_boost_fails_on_read_error() {
        let fake = FakeGauges { by_gauge: HashMap::new() };
        let pools = vec![pool_with_gauge(Address::repeat_byte(9))];

        let result = inject_boost(pools, &fake, &TrackedVoters::default(), 4).await;
        assert!(matches!(result, Err(FetchError::Rpc { .. })));
    }
}
