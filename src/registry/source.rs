//! On-chain read surfaces
//!
//! [`RegistrySource`] covers the paginated lens reads, [`GaugeSource`] the
//! per-pool gauge, bribe and token reads. [`ChainReader`] implements both over
//! a single HTTP provider; tests swap in in-memory sources.

use alloy_primitives::{Address, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use eyre::Result;
use tracing::trace;

use super::contracts::*;
use crate::error::FetchError;
use crate::types::{GaugeBalance, PoolData, PoolRecord, ReserveInfo, RewardToken};

// ============================================
// TRAITS
// ============================================

#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Every staking wrapper known to the registry (unbounded call)
    async fn pool_addresses(&self) -> Result<Vec<Address>, FetchError>;

    /// Wrapper + underlying pool metadata, reserves left empty
    async fn pools_data(&self, wrappers: &[Address]) -> Result<Vec<PoolRecord>, FetchError>;

    /// Reserve data for underlying AMM pools (response order not guaranteed)
    async fn reserves_info(&self, pools: &[Address]) -> Result<Vec<ReserveInfo>, FetchError>;

    /// Reward tokens per staking contract, in request order
    async fn reward_tokens(&self, staking: &[Address])
        -> Result<Vec<Vec<RewardToken>>, FetchError>;
}

#[async_trait]
pub trait GaugeSource: Send + Sync {
    /// `balanceOf` / `derivedBalance` of each voter, in voter order
    async fn gauge_balances(
        &self,
        gauge: Address,
        voters: &[Address],
    ) -> Result<Vec<GaugeBalance>, FetchError>;

    async fn total_supply(&self, token: Address) -> Result<U256, FetchError>;

    /// Incentive still to be paid out by `bribe` in `token`
    async fn bribe_left(&self, bribe: Address, token: Address) -> Result<U256, FetchError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, FetchError>;
}

// ============================================
// ABI -> RECORD CONVERSIONS
// ============================================

impl From<OxPoolData> for PoolRecord {
    fn from(raw: OxPoolData) -> Self {
        let lens = raw.poolData;
        PoolRecord {
            id: raw.id,
            staking_address: raw.stakingAddress,
            staked_total_supply: raw.stakedTotalSupply.to_string(),
            total_supply: raw.totalSupply.to_string(),
            pool_data: PoolData {
                id: lens.id,
                symbol: lens.symbol,
                stable: lens.stable,
                token0_address: lens.token0Address,
                token1_address: lens.token1Address,
                gauge_address: lens.gaugeAddress,
                bribe_address: lens.bribeAddress,
                bribe_tokens_addresses: lens.bribeTokensAddresses,
                fees: lens.fees,
                total_supply: lens.totalSupply.to_string(),
                token0_reserve: "0".to_string(),
                token1_reserve: "0".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl From<PoolReserveData> for ReserveInfo {
    fn from(raw: PoolReserveData) -> Self {
        ReserveInfo {
            id: raw.id,
            token0_reserve: raw.token0Reserve.to_string(),
            token1_reserve: raw.token1Reserve.to_string(),
            token0_decimals: raw.token0Decimals,
            token1_decimals: raw.token1Decimals,
        }
    }
}

impl From<RewardTokenData> for RewardToken {
    fn from(raw: RewardTokenData) -> Self {
        RewardToken {
            id: raw.id,
            reward_rate: raw.rewardRate.to_string(),
            period_finish: raw.periodFinish.saturating_to::<u64>(),
            apr: None,
        }
    }
}

// ============================================
// CHAIN READER
// ============================================

/// `eth_call` reader for the lens contracts and per-pool contracts
pub struct ChainReader {
    provider: DynProvider,
    ox_lens: Address,
    solidly_lens: Address,
}

impl ChainReader {
    pub fn new(provider_url: &str, ox_lens: Address, solidly_lens: Address) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(provider_url.parse()?)
            .erased();

        Ok(Self { provider, ox_lens, solidly_lens })
    }

    /// Execute a single view call and decode its return value
    async fn call<C>(&self, name: &'static str, to: Address, call: C) -> Result<C::Return, FetchError>
    where
        C: SolCall + Send + Sync,
    {
        let tx = TransactionRequest::default()
            .to(to)
            .input(call.abi_encode().into());

        let result = self
            .provider
            .call(tx)
            .await
            .map_err(|e| FetchError::rpc(name, e))?;

        trace!("{} -> {} bytes", name, result.len());

        C::abi_decode_returns(&result).map_err(|e| FetchError::decode(name, e))
    }

    /// Execute a Multicall3 batch - SINGLE RPC call
    async fn execute_multicall(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, FetchError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let expected = calls.len();
        let results = self
            .call("aggregate3", MULTICALL3, IMulticall3::aggregate3Call { calls })
            .await?;

        if results.len() != expected {
            return Err(FetchError::decode(
                "aggregate3",
                format!("expected {} results, got {}", expected, results.len()),
            ));
        }
        Ok(results)
    }
}

fn decode_u256<C>(name: &'static str, result: &IMulticall3::Result) -> Result<U256, FetchError>
where
    C: SolCall<Return = U256>,
{
    if !result.success {
        return Err(FetchError::rpc(name, "reverted inside multicall"));
    }
    C::abi_decode_returns(&result.returnData).map_err(|e| FetchError::decode(name, e))
}

#[async_trait]
impl RegistrySource for ChainReader {
    async fn pool_addresses(&self) -> Result<Vec<Address>, FetchError> {
        self.call("oxPoolsAddresses", self.ox_lens, IOxLens::oxPoolsAddressesCall {})
            .await
    }

    async fn pools_data(&self, wrappers: &[Address]) -> Result<Vec<PoolRecord>, FetchError> {
        let call = IOxLens::oxPoolsDataCall { poolsAddresses: wrappers.to_vec() };
        let raw = self.call("oxPoolsData", self.ox_lens, call).await?;
        Ok(raw.into_iter().map(PoolRecord::from).collect())
    }

    async fn reserves_info(&self, pools: &[Address]) -> Result<Vec<ReserveInfo>, FetchError> {
        let call = ISolidlyLens::poolsReservesInfoCall { poolsAddresses: pools.to_vec() };
        let raw = self.call("poolsReservesInfo", self.solidly_lens, call).await?;
        Ok(raw.into_iter().map(ReserveInfo::from).collect())
    }

    async fn reward_tokens(
        &self,
        staking: &[Address],
    ) -> Result<Vec<Vec<RewardToken>>, FetchError> {
        let call = IOxLens::rewardTokensDatasCall { stakingPoolsAddresses: staking.to_vec() };
        let raw = self.call("rewardTokensDatas", self.ox_lens, call).await?;
        Ok(raw
            .into_iter()
            .map(|tokens| tokens.into_iter().map(RewardToken::from).collect())
            .collect())
    }
}

#[async_trait]
impl GaugeSource for ChainReader {
    async fn gauge_balances(
        &self,
        gauge: Address,
        voters: &[Address],
    ) -> Result<Vec<GaugeBalance>, FetchError> {
        let calls: Vec<IMulticall3::Call3> = voters
            .iter()
            .flat_map(|voter| {
                [
                    IMulticall3::Call3 {
                        target: gauge,
                        allowFailure: true,
                        callData: IGauge::balanceOfCall { account: *voter }.abi_encode().into(),
                    },
                    IMulticall3::Call3 {
                        target: gauge,
                        allowFailure: true,
                        callData: IGauge::derivedBalanceCall { account: *voter }
                            .abi_encode()
                            .into(),
                    },
                ]
            })
            .collect();

        let results = self.execute_multicall(calls).await?;

        results
            .chunks(2)
            .map(|pair| -> Result<GaugeBalance, FetchError> {
                Ok(GaugeBalance {
                    balance: decode_u256::<IGauge::balanceOfCall>("balanceOf", &pair[0])?,
                    derived_balance: decode_u256::<IGauge::derivedBalanceCall>(
                        "derivedBalance",
                        &pair[1],
                    )?,
                })
            })
            .collect()
    }

    async fn total_supply(&self, token: Address) -> Result<U256, FetchError> {
        self.call("totalSupply", token, IERC20::totalSupplyCall {}).await
    }

    async fn bribe_left(&self, bribe: Address, token: Address) -> Result<U256, FetchError> {
        self.call("left", bribe, IBribe::leftCall { token }).await
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, FetchError> {
        self.call("decimals", token, IERC20::decimalsCall {}).await
    }
}
