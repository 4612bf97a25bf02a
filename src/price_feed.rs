//! Price Oracle Adapter - CoinGecko token price API
//!
//! Resolves token contract addresses to USD prices. Tokens the feed does not
//! know are left out of the map (and read back as 0); a feed outage is an
//! error for the whole run.
//!
//! API: https://api.coingecko.com/api/v3/simple/token_price/fantom
//!      ?contract_addresses=0x..,0x..&vs_currencies=usd

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::error::PriceFeedError;
use crate::types::{price_key, PoolRecord, PriceMap};

// ============================================
// CONSTANTS
// ============================================

/// Timeout for a single feed request
const API_TIMEOUT_SECS: u64 = 15;

const VS_CURRENCY: &str = "usd";

// ============================================
// API RESPONSE TYPES
// ============================================

/// `{ "<address>": { "usd": 1.23 } }`
type TokenPriceResponse = HashMap<String, FeedEntry>;

#[derive(Debug, Deserialize)]
struct FeedEntry {
    usd: Option<f64>,
}

// ============================================
// PRICE FEED
// ============================================

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Resolve every address it can. Unknown tokens are omitted, not errors.
    async fn resolve(&self, addresses: &[String]) -> Result<PriceMap, PriceFeedError>;
}

pub struct HttpPriceFeed {
    http_client: Client,
    base_url: String,
    chunk_size: usize,
}

impl HttpPriceFeed {
    pub fn new(base_url: impl Into<String>, chunk_size: usize) -> Result<Self, PriceFeedError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            chunk_size: chunk_size.max(1),
        })
    }

    async fn fetch_chunk(&self, chunk: &[String]) -> Result<PriceMap, PriceFeedError> {
        let joined = chunk.join(",");
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("contract_addresses", joined.as_str()), ("vs_currencies", VS_CURRENCY)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceFeedError::Status { status: status.as_u16() });
        }

        let body: TokenPriceResponse = response.json().await?;
        trace!("Price feed answered {} of {} tokens", body.len(), chunk.len());
        Ok(prices_from_response(body))
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn resolve(&self, addresses: &[String]) -> Result<PriceMap, PriceFeedError> {
        let start = Instant::now();
        let addresses = dedupe_lowercase(addresses);

        let mut prices = PriceMap::new();
        for chunk in addresses.chunks(self.chunk_size) {
            prices.extend(self.fetch_chunk(chunk).await?);
        }

        info!(
            "Resolved {} of {} token prices in {:?}",
            prices.len(),
            addresses.len(),
            start.elapsed()
        );
        Ok(prices)
    }
}

/// Keep finite, non-negative USD quotes only
fn prices_from_response(body: TokenPriceResponse) -> PriceMap {
    let mut prices = PriceMap::new();
    for (token, entry) in body {
        match entry.usd {
            Some(usd) if usd.is_finite() && usd >= 0.0 => prices.insert(token, usd),
            _ => debug!("No usable USD quote for {}", token),
        }
    }
    prices
}

/// Lower-case and de-duplicate, preserving first-seen order
fn dedupe_lowercase(addresses: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect()
}

/// Every reserve token and bribe token referenced by any pool, de-duplicated
pub fn collect_token_addresses(pools: &[PoolRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for pool in pools {
        let data = &pool.pool_data;
        let referenced = [data.token0_address, data.token1_address]
            .into_iter()
            .chain(data.bribe_tokens_addresses.iter().copied());

        for token in referenced {
            let key = price_key(&token);
            if seen.insert(key.clone()) {
                tokens.push(key);
            }
        }
    }
    tokens
}
