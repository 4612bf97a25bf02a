//! TVL & pool price injection
//!
//! Pure pass over the merged pools:
//! reserves -> normalized reserves -> USD per side -> pool TVL ->
//! wrapper TVL (pro-rated by supply share) -> price per wrapper token.

use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::math::{fixed, mul_div, normalize_str, price_decimal, safe_div};
use crate::types::{PoolRecord, PriceMap};

/// Decimals of every LP / wrapper token
pub const LP_DECIMALS: u8 = 18;

/// Per-pool TVL figures before they are written back as strings
#[derive(Debug, Clone, PartialEq)]
pub struct TvlBreakdown {
    pub reserve0_normalized: Decimal,
    pub reserve1_normalized: Decimal,
    pub reserve0_usd: Decimal,
    pub reserve1_usd: Decimal,
    pub price0_usd: f64,
    pub price1_usd: f64,
    /// TVL of the whole AMM pool
    pub pool_tvl_usd: Decimal,
    /// TVL attributable to the wrapper's share of the pool
    pub wrapper_tvl_usd: Decimal,
    pub pool_price: Decimal,
}

/// Compute the TVL figures for one pool.
///
/// A side whose token has no price takes the other side's USD value, so a
/// pool with one known price is valued as if balanced.
pub fn compute_tvl(pool: &PoolRecord, prices: &PriceMap) -> TvlBreakdown {
    let data = &pool.pool_data;

    let price0_usd = prices.usd(&data.token0_address);
    let price1_usd = prices.usd(&data.token1_address);
    let price0 = price_decimal(price0_usd);
    let price1 = price_decimal(price1_usd);

    let reserve0_normalized =
        normalize_str(&data.token0_reserve, data.token0_decimals).unwrap_or(Decimal::ZERO);
    let reserve1_normalized =
        normalize_str(&data.token1_reserve, data.token1_decimals).unwrap_or(Decimal::ZERO);

    let mut reserve0_usd = reserve0_normalized.checked_mul(price0).unwrap_or_else(|| {
        trace!("token0 USD value overflows for {:?}, set to 0", data.id);
        Decimal::ZERO
    });
    let mut reserve1_usd = reserve1_normalized.checked_mul(price1).unwrap_or_else(|| {
        trace!("token1 USD value overflows for {:?}, set to 0", data.id);
        Decimal::ZERO
    });

    if price0.is_zero() {
        reserve0_usd = reserve1_usd;
    }
    if price1.is_zero() {
        reserve1_usd = reserve0_usd;
    }

    let pool_tvl_usd = reserve0_usd.checked_add(reserve1_usd).unwrap_or_else(|| {
        trace!("Pool TVL overflows for {:?}, set to 0", data.id);
        Decimal::ZERO
    });

    let wrapper_supply = normalize_str(&pool.total_supply, LP_DECIMALS).unwrap_or(Decimal::ZERO);
    let pool_supply = normalize_str(&data.total_supply, LP_DECIMALS).unwrap_or(Decimal::ZERO);

    let wrapper_tvl_usd = mul_div(wrapper_supply, pool_tvl_usd, pool_supply).unwrap_or_else(|| {
        trace!("Zero pool supply for {:?}, wrapper TVL set to 0", data.id);
        Decimal::ZERO
    });

    let pool_price = safe_div(wrapper_tvl_usd, wrapper_supply).unwrap_or(Decimal::ZERO);

    TvlBreakdown {
        reserve0_normalized,
        reserve1_normalized,
        reserve0_usd,
        reserve1_usd,
        price0_usd,
        price1_usd,
        pool_tvl_usd,
        wrapper_tvl_usd,
        pool_price,
    }
}

/// Annotate every pool with its TVL, reserve USD values and `poolPrice`
pub fn inject_tvl(pools: Vec<PoolRecord>, prices: &PriceMap) -> Vec<PoolRecord> {
    let pools: Vec<PoolRecord> = pools
        .into_iter()
        .map(|mut pool| {
            let tvl = compute_tvl(&pool, prices);
            let data = &mut pool.pool_data;
            data.reserve0_normalized = Some(fixed(tvl.reserve0_normalized));
            data.reserve1_normalized = Some(fixed(tvl.reserve1_normalized));
            data.reserve0_usd = Some(fixed(tvl.reserve0_usd));
            data.reserve1_usd = Some(fixed(tvl.reserve1_usd));
            data.price0_usd = Some(tvl.price0_usd);
            data.price1_usd = Some(tvl.price1_usd);
            data.total_tvl_usd = Some(fixed(tvl.pool_tvl_usd));

            pool.total_tvl_usd = Some(fixed(tvl.wrapper_tvl_usd));
            pool.pool_price = Some(fixed(tvl.pool_price));
            pool
        })
        .collect();

    debug!("Injected TVL into {} pools", pools.len());
    pools
}
