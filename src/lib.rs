pub mod app;
pub mod balance;
pub mod config;
pub mod erc20;
pub mod error;
pub mod eth_client;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod price;
pub mod router;
pub mod session;
pub mod slippage;
pub mod token_registry;
pub mod tools;
pub mod types;
pub mod wallet;
