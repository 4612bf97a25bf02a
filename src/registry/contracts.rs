//! Lens, Gauge, Bribe and ERC-20 ABIs plus chain constants
//!
//! CRITICAL: Default addresses are for Fantom Opera.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

// ============================================
// LENS INTERFACES
// ============================================

sol! {
    /// Underlying AMM pool as described by the solidly lens
    struct LensPoolData {
        address id;
        string symbol;
        bool stable;
        address token0Address;
        address token1Address;
        address gaugeAddress;
        address bribeAddress;
        address[] bribeTokensAddresses;
        address fees;
        uint256 totalSupply;
    }

    /// Staking wrapper as described by the registry lens
    struct OxPoolData {
        address id;
        address stakingAddress;
        uint256 stakedTotalSupply;
        uint256 totalSupply;
        LensPoolData poolData;
    }

    struct PoolReserveData {
        address id;
        address token0Address;
        address token1Address;
        uint256 token0Reserve;
        uint256 token1Reserve;
        uint8 token0Decimals;
        uint8 token1Decimals;
    }

    struct RewardTokenData {
        address id;
        uint256 rewardRate;
        uint256 periodFinish;
    }

    interface IOxLens {
        function oxPoolsAddresses() external view returns (address[] memory);
        function oxPoolsData(address[] calldata poolsAddresses)
            external view returns (OxPoolData[] memory);
        function rewardTokensDatas(address[] calldata stakingPoolsAddresses)
            external view returns (RewardTokenData[][] memory);
    }

    interface ISolidlyLens {
        function poolsReservesInfo(address[] calldata poolsAddresses)
            external view returns (PoolReserveData[] memory);
    }
}

// ============================================
// GAUGE / BRIBE / TOKEN INTERFACES
// ============================================

sol! {
    interface IGauge {
        function balanceOf(address account) external view returns (uint256);
        function derivedBalance(address account) external view returns (uint256);
    }

    interface IBribe {
        function left(address token) external view returns (uint256);
    }

    interface IERC20 {
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}

// ============================================
// MULTICALL3 INTERFACE
// ============================================

sol! {
    /// Multicall3 - deployed at same address on all EVM chains
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Registry lens listing staking wrappers
pub const OX_LENS: Address = address!("DA00137c79B30bfE06d04733349d98Cf06320e69");

/// Lens over the underlying AMM pools
pub const SOLIDLY_LENS: Address = address!("DA0024F99A9889E8F48930614c27Ba41DD447c45");

/// Voter whose gauge boost is published as `boostOxDao`
pub const OXDAO_VOTER: Address = address!("DA00eA1c3813658325243e7ABb1f1Cac628Eb582");

/// Voter whose gauge boost is published as `boostSolidex`
pub const SOLIDEX_VOTER: Address = address!("26E1A0d851CF28E697870e1b7F053B605C8b060F");
