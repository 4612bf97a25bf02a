//! Runtime configuration for the metrics daemon
//!
//! Everything has a working default for Fantom; the only override most
//! deployments need is `WEB3_PROVIDER_URL`.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::registry::{DEFAULT_PAGE_SIZE, OXDAO_VOTER, OX_LENS, SOLIDEX_VOTER, SOLIDLY_LENS};
use crate::summary::PartnerApr;

/// Public Fantom RPC used when no provider is configured
pub const DEFAULT_PROVIDER_URL: &str = "https://rpc.ankr.com/fantom";

/// CoinGecko token price endpoint for Fantom contracts
pub const DEFAULT_PRICE_FEED_URL: &str =
    "https://api.coingecko.com/api/v3/simple/token_price/fantom";

/// Upper bound of concurrent per-pool calls (boost, APR, bribes)
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 16;

/// Token addresses per price-feed request
pub const DEFAULT_PRICE_FEED_CHUNK: usize = 100;

/// The two external voters whose gauge boost is published per pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedVoters {
    pub ox_dao: Address,
    pub solidex: Address,
}

impl Default for TrackedVoters {
    fn default() -> Self {
        Self { ox_dao: OXDAO_VOTER, solidex: SOLIDEX_VOTER }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint
    pub provider_url: String,

    /// Registry lens (wrapper list, metadata, reward tokens)
    pub ox_lens: Address,

    /// AMM lens (reserves)
    pub solidly_lens: Address,

    /// Voters whose boost is tracked
    pub voters: TrackedVoters,

    // ========== Fetching ==========
    /// Wrappers per lens request
    pub page_size: usize,

    /// Max in-flight per-pool calls
    pub max_concurrent_calls: usize,

    // ========== Price Feed ==========
    pub price_feed_url: String,

    /// Addresses per price-feed request
    pub price_feed_chunk: usize,

    // ========== Output ==========
    /// Directory for the JSON artifacts
    pub data_dir: PathBuf,

    /// Object store base URL; uploads are skipped when unset
    pub upload_base_url: Option<String>,

    /// Compute and publish `bribes.json`
    pub enable_bribes: bool,

    /// Partner APR figures merged into `protocol.json`
    pub partner_apr: PartnerApr,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            provider_url: env::var("WEB3_PROVIDER_URL")
                .unwrap_or_else(|_| DEFAULT_PROVIDER_URL.to_string()),
            ox_lens: env_address("OX_LENS_ADDRESS", defaults.ox_lens)?,
            solidly_lens: env_address("SOLIDLY_LENS_ADDRESS", defaults.solidly_lens)?,
            voters: TrackedVoters {
                ox_dao: env_address("OXDAO_VOTER", defaults.voters.ox_dao)?,
                solidex: env_address("SOLIDEX_VOTER", defaults.voters.solidex)?,
            },

            page_size: env_parse("PAGE_SIZE", defaults.page_size)?,
            max_concurrent_calls: env_parse("MAX_CONCURRENT_CALLS", defaults.max_concurrent_calls)?,

            price_feed_url: env::var("PRICE_FEED_URL").unwrap_or(defaults.price_feed_url),
            price_feed_chunk: env_parse("PRICE_FEED_CHUNK", defaults.price_feed_chunk)?,

            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            upload_base_url: env::var("UPLOAD_BASE_URL").ok().filter(|s| !s.trim().is_empty()),
            enable_bribes: env_parse("ENABLE_BRIBES", defaults.enable_bribes)?,

            partner_apr: PartnerApr {
                ox_solid: env::var("PARTNER_APR_OX_SOLID").ok(),
                partner: env::var("PARTNER_APR_PARTNER").ok(),
                vl_oxd: env::var("PARTNER_APR_VLOXD").ok(),
            },
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.provider_url.trim().is_empty() {
            return Err(eyre!("Invalid WEB3_PROVIDER_URL - please set a JSON-RPC endpoint"));
        }
        if self.page_size == 0 {
            return Err(eyre!("PAGE_SIZE must be at least 1"));
        }
        if self.max_concurrent_calls == 0 {
            return Err(eyre!("MAX_CONCURRENT_CALLS must be at least 1"));
        }
        if self.price_feed_chunk == 0 {
            return Err(eyre!("PRICE_FEED_CHUNK must be at least 1"));
        }
        if self.ox_lens == Address::ZERO || self.solidly_lens == Address::ZERO {
            return Err(eyre!("Lens addresses must not be the zero address"));
        }
        self.partner_apr.validate()?;
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              LENS METRICS - CONFIGURATION                  ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Provider:          {:<40} ║", shorten(&self.provider_url, 40));
        println!("║ Registry lens:     {:<40} ║", format!("{:?}", self.ox_lens));
        println!("║ AMM lens:          {:<40} ║", format!("{:?}", self.solidly_lens));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Page size:         {:<40} ║", self.page_size);
        println!("║ Max concurrency:   {:<40} ║", self.max_concurrent_calls);
        println!("║ Price chunk:       {:<40} ║", self.price_feed_chunk);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Data dir:          {:<40} ║", shorten(&self.data_dir.display().to_string(), 40));
        println!("║ Upload:            {:<40} ║",
            if self.upload_base_url.is_some() { "✓ Configured" } else { "✗ Disabled" }
        );
        println!("║ Bribes:            {:<40} ║",
            if self.enable_bribes { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            ox_lens: OX_LENS,
            solidly_lens: SOLIDLY_LENS,
            voters: TrackedVoters::default(),
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            price_feed_url: DEFAULT_PRICE_FEED_URL.to_string(),
            price_feed_chunk: DEFAULT_PRICE_FEED_CHUNK,
            data_dir: PathBuf::from("./data"),
            upload_base_url: None,
            enable_bribes: false,
            partner_apr: PartnerApr::default(),
        }
    }
}

fn env_address(key: &str, default: Address) -> Result<Address> {
    match env::var(key) {
        Ok(value) => Address::from_str(value.trim())
            .map_err(|e| eyre!("{} is not a valid address ({}): {}", key, value, e)),
        Err(_) => Ok(default),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| eyre!("{} has an invalid value ({}): {}", key, value, e)),
        Err(_) => Ok(default),
    }
}

fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let head: String = value.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.voters.ox_dao, OXDAO_VOTER);
        assert!(!config.enable_bribes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = Config { page_size: 0, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { provider_url: "  ".to_string(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_partner_apr() {
        let mut config = Config::default();
        config.partner_apr.vl_oxd = Some("twelve".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_file() {
        let dir = std::env::temp_dir().join(format!("lens-metrics-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let config = Config {
            page_size: 25,
            upload_base_url: Some("https://bucket.example/oxd".to_string()),
            ..Config::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("abc", 5), "abc");
        assert_eq!(shorten("abcdefgh", 6), "abc...");
    }
}
