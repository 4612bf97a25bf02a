//! Protocol Summarizer
//!
//! Reduces the annotated pools to protocol-wide totals. Partner APR figures
//! come from outside the pipeline and are merged in last.

use eyre::{eyre, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::math::{fixed, parse_fixed};
use crate::types::PoolRecord;

/// Externally supplied partner APR figures, as decimal strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerApr {
    pub ox_solid: Option<String>,
    pub partner: Option<String>,
    pub vl_oxd: Option<String>,
}

impl PartnerApr {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ox_solid", &self.ox_solid),
            ("partner", &self.partner),
            ("vl_oxd", &self.vl_oxd),
        ] {
            if let Some(value) = value {
                if parse_fixed(value).is_none() {
                    return Err(eyre!("partner APR {} is not a decimal: {}", name, value));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSummary {
    pub total_tvl_usd: String,
    pub pools_count: usize,
    pub updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr_ox_solid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr_partner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr_vl_oxd: Option<String>,
}

impl ProtocolSummary {
    /// Sum wrapper TVL over every pool. Missing or unparsable TVL counts as zero.
    pub fn from_pools(pools: &[PoolRecord], updated: i64) -> Self {
        let total = total_tvl(pools);
        Self {
            total_tvl_usd: fixed(total),
            pools_count: pools.len(),
            updated,
            ..Default::default()
        }
    }

    pub fn with_partner_apr(mut self, apr: &PartnerApr) -> Self {
        self.apr_ox_solid = apr.ox_solid.clone();
        self.apr_partner = apr.partner.clone();
        self.apr_vl_oxd = apr.vl_oxd.clone();
        self
    }
}

pub fn total_tvl(pools: &[PoolRecord]) -> Decimal {
    pools
        .iter()
        .filter_map(|p| p.total_tvl_usd.as_deref().and_then(parse_fixed))
        .filter(|tvl| *tvl > Decimal::ZERO)
        .fold(Decimal::ZERO, |acc, tvl| acc.checked_add(tvl).unwrap_or(acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_tvl(tvl: Option<&str>) -> PoolRecord {
        PoolRecord { total_tvl_usd: tvl.map(String::from), ..Default::default() }
    }

    #[test]
    fn test_total_tvl_ignores_non_finite_and_missing() {
        let pools = vec![
            pool_with_tvl(Some("1000")),
            pool_with_tvl(Some("NaN")),
            pool_with_tvl(Some("Infinity")),
            pool_with_tvl(None),
            pool_with_tvl(Some("0.25")),
        ];

        let summary = ProtocolSummary::from_pools(&pools, 1_650_000_000);
        assert_eq!(summary.total_tvl_usd, "1000.25");
        assert_eq!(summary.pools_count, 5);
        assert_eq!(summary.updated, 1_650_000_000);
    }

    #[test]
    fn test_partner_apr_merge_and_layout() {
        let apr = PartnerApr {
            ox_solid: Some("12.5".into()),
            partner: None,
            vl_oxd: Some("40".into()),
        };
        let summary = ProtocolSummary::from_pools(&[], 0).with_partner_apr(&apr);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["totalTvlUsd"], "0");
        assert_eq!(json["aprOxSolid"], "12.5");
        assert_eq!(json["aprVlOxd"], "40");
        assert!(json.get("aprPartner").is_none());
    }

    #[test]
    fn test_partner_apr_validation() {
        assert!(PartnerApr::default().validate().is_ok());
        let bad = PartnerApr { partner: Some("n/a".into()), ..Default::default() };
        assert!(bad.validate().is_err());
    }
}
