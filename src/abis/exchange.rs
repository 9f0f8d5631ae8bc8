use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IMaelstrom {
        function reserves(address token) external view returns (uint256 tokenReserve, uint256 ethReserve);
        function priceBuy(address token) external view returns (uint256);
        function priceSell(address token) external view returns (uint256);
        function tokenPerETHRatio(address token) external view returns (uint256);
        function poolUserBalances(address token, address user) external view returns (uint256 tokenBalance, uint256 ethBalance);
        function pools(address token) external view returns (uint256 tokenReserve, uint256 ethReserve, uint256 lastExchangeTs);
        function getPoolList(uint256 startIndex, uint256 count) external view returns (address[] memory);
        function getUserPools(address user, uint256 startIndex, uint256 count) external view returns (address[] memory);

        function initializePool(address token, uint256 tokenAmount, uint256 initialBuyPrice, uint256 initialSellPrice) external payable;
        function deposit(address token) external payable;
        function withdraw(address token, uint256 lpTokenAmount) external;
        function swap(address tokenIn, address tokenOut, uint256 amountIn, uint256 minimumTokenOut) external;
        function buy(address token) external payable;
        function sell(address token, uint256 amount) external;
    }
}
