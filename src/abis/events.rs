// The deployed exchange emits its withdraw event with a lowercase name.
#![allow(non_camel_case_types)]

use alloy::sol;

sol! {
    event BuyTrade(address indexed token, address indexed trader, uint256 ethAmount, uint256 tokenAmount, uint256 buyPrice);
    event SellTrade(address indexed token, address indexed trader, uint256 ethAmount, uint256 tokenAmount, uint256 sellPrice);
    event SwapTrade(address indexed tokenIn, address indexed tokenOut, address indexed trader, uint256 amountIn, uint256 amountOut, uint256 sellPrice, uint256 buyPrice);
    event Deposit(address indexed token, address indexed user, uint256 ethAmount, uint256 tokenAmount, uint256 lpTokensMinted);
    event withdraw(address indexed token, address indexed user, uint256 ethAmount, uint256 tokenAmount, uint256 lpTokensBurned);
}
