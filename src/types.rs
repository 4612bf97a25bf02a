//! Pool, reward and price records shared by every stage
//!
//! Field names serialize in camelCase so `pools.json` keeps the layout
//! consumers of the published documents already read.
//! Raw on-chain integers stay strings; derived fields are `None` until the
//! stage that owns them has run.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================
// POOL RECORD
// ============================================

/// Underlying AMM pool, as reported by the lens plus merged reserve data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolData {
    /// Underlying AMM pool address
    pub id: Address,
    pub symbol: String,
    pub stable: bool,
    pub token0_address: Address,
    pub token1_address: Address,
    pub gauge_address: Address,
    pub bribe_address: Address,
    pub bribe_tokens_addresses: Vec<Address>,
    pub fees: Address,
    /// Raw LP supply of the AMM pool
    pub total_supply: String,

    // ========== Reserve data (joined by pool address) ==========
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub token0_reserve: String,
    pub token1_reserve: String,

    // ========== TVL stage ==========
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve0_normalized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve1_normalized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve0_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve1_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price0_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price1_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tvl_usd: Option<String>,
}

impl PoolData {
    pub fn apply_reserves(&mut self, reserves: &ReserveInfo) {
        self.token0_decimals = reserves.token0_decimals;
        self.token1_decimals = reserves.token1_decimals;
        self.token0_reserve = reserves.token0_reserve.clone();
        self.token1_reserve = reserves.token1_reserve.clone();
    }
}

/// Reward token streamed by a staking contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardToken {
    pub id: Address,
    /// Raw reward tokens emitted per second
    pub reward_rate: String,
    pub period_finish: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr: Option<String>,
}

/// One staking wrapper around an AMM pool. `id` is the wrapper address and
/// never changes once the record exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub id: Address,
    pub staking_address: Address,
    pub staked_total_supply: String,
    /// Raw supply of the wrapper token
    pub total_supply: String,
    pub pool_data: PoolData,
    #[serde(default)]
    pub reward_tokens: Vec<RewardToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tvl_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_ox_dao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_solidex: Option<String>,
}

/// Reserve/price-relevant data for an AMM pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReserveInfo {
    pub id: Address,
    pub token0_reserve: String,
    pub token1_reserve: String,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
}

/// Gauge balances of one voter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GaugeBalance {
    pub balance: U256,
    pub derived_balance: U256,
}

// ============================================
// POOL COLLECTION
// ============================================

/// Pools keyed by wrapper id, kept in first-insertion order.
/// A later record with the same id replaces the earlier one in place.
#[derive(Debug, Default)]
pub struct PoolCollection {
    pools: Vec<PoolRecord>,
    index: HashMap<Address, usize>,
}

impl PoolCollection {
    pub fn upsert(&mut self, pool: PoolRecord) {
        match self.index.get(&pool.id) {
            Some(&slot) => self.pools[slot] = pool,
            None => {
                self.index.insert(pool.id, self.pools.len());
                self.pools.push(pool);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn into_vec(self) -> Vec<PoolRecord> {
        self.pools
    }
}

// ============================================
// PRICES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub usd: f64,
}

/// Lower-cased token address -> USD price. Built once per run, read-only after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceMap(BTreeMap<String, TokenPrice>);

/// Key used by the price feed and the price map
pub fn price_key(address: &Address) -> String {
    format!("{:?}", address).to_lowercase()
}

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl AsRef<str>, usd: f64) {
        self.0.insert(token.as_ref().to_lowercase(), TokenPrice { usd });
    }

    pub fn extend(&mut self, other: PriceMap) {
        self.0.extend(other.0);
    }

    /// USD price, `0.0` when the feed did not know the token
    pub fn usd(&self, token: &Address) -> f64 {
        self.0.get(&price_key(token)).map(|p| p.usd).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_price_lookup_is_case_insensitive() {
        let token = address!("21be370D5312f44cB42ce377BC9b8a0cEF1A4C83");
        let mut prices = PriceMap::new();
        prices.insert("0x21BE370D5312F44CB42CE377BC9B8A0CEF1A4C83", 0.25);

        assert_eq!(prices.usd(&token), 0.25);
        assert_eq!(prices.usd(&Address::ZERO), 0.0);
    }

    #[test]
    fn test_collection_keeps_first_position_on_upsert() {
        let a = address!("00000000000000000000000000000000000000aa");
        let b = address!("00000000000000000000000000000000000000bb");
        let mut pools = PoolCollection::default();

        pools.upsert(PoolRecord { id: a, total_supply: "1".into(), ..Default::default() });
        pools.upsert(PoolRecord { id: b, ..Default::default() });
        pools.upsert(PoolRecord { id: a, total_supply: "2".into(), ..Default::default() });

        let pools = pools.into_vec();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].id, a);
        assert_eq!(pools[0].total_supply, "2");
    }

    #[test]
    fn test_pool_record_json_layout() {
        let pool = PoolRecord {
            total_tvl_usd: Some("12.5".into()),
            boost_ox_dao: Some("2.50".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&pool).unwrap();

        assert_eq!(json["totalTvlUsd"], "12.5");
        assert_eq!(json["boostOxDao"], "2.50");
        assert!(json["poolData"]["bribeTokensAddresses"].is_array());
        assert!(json.get("poolPrice").is_none());
    }
}
