//! Contract interfaces read by the orchestrator.
//!
//! Generated with `alloy::sol!`, so selectors and return decoding are checked at
//! compile time. Only view functions are declared.

use alloy::sol;

sol! {
    /// Uniswap V3 NonfungiblePositionManager (ERC-721 enumerable + position records).
    interface INonfungiblePositionManager {
        function balanceOf(address owner) external view returns (uint256 balance);

        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256 tokenId);

        function positions(uint256 tokenId) external view returns (
            uint96 nonce,
            address operator,
            address token0,
            address token1,
            uint24 fee,
            int24 tickLower,
            int24 tickUpper,
            uint128 liquidity,
            uint256 feeGrowthInside0LastX128,
            uint256 feeGrowthInside1LastX128,
            uint128 tokensOwed0,
            uint128 tokensOwed1
        );
    }
}

sol! {
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }
}

sol! {
    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );

        function feeGrowthGlobal0X128() external view returns (uint256 growth);

        function feeGrowthGlobal1X128() external view returns (uint256 growth);

        function ticks(int24 tick) external view returns (
            uint128 liquidityGross,
            int128 liquidityNet,
            uint256 feeGrowthOutside0X128,
            uint256 feeGrowthOutside1X128,
            int56 tickCumulativeOutside,
            uint160 secondsPerLiquidityOutsideX128,
            uint32 secondsOutside,
            bool initialized
        );
    }
}

sol! {
    interface IERC20Metadata {
        function symbol() external view returns (string symbol);

        function decimals() external view returns (uint8 decimals);
    }
}

sol! {
    /// Pre-standard tokens (e.g. MKR) return `symbol()` as `bytes32`.
    interface IERC20SymbolBytes32 {
        function symbol() external view returns (bytes32 symbol);
    }
}

sol! {
    /// Multicall3, deployed at the same address on every major chain.
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }
}
