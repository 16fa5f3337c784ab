use crate::erc20::{Erc20Client, Erc20Error, format_units, truncate_to_dp};
use crate::eth_client::{ChainReader, EthClientError};
use crate::types::Token;
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 余额读取错误
#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error(transparent)]
    Chain(#[from] EthClientError),

    #[error(transparent)]
    Erc20(#[from] Erc20Error),

    #[error("余额格式错误: {0}")]
    Format(String),
}

/// 账户在某个代币上的余额
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub symbol: String,
    /// 人类可读的余额
    pub formatted: String,
    /// 链上最小单位
    pub raw: U256,
    pub decimals: u8,
}

/// 余额读取器
#[derive(Clone)]
pub struct BalanceReader {
    reader: Arc<dyn ChainReader>,
    erc20: Erc20Client,
    native_gas_reserve: Decimal,
}

impl BalanceReader {
    pub fn new(reader: Arc<dyn ChainReader>, native_gas_reserve: Decimal) -> Self {
        Self {
            erc20: Erc20Client::new(reader.clone()),
            reader,
            native_gas_reserve,
        }
    }

    /// 查询余额：原生代币走 eth_getBalance，代币走 balanceOf + decimals()
    #[instrument(skip(self, token), fields(token = %token.symbol))]
    pub async fn balance(&self, account: Address, token: &Token) -> Result<TokenBalance, BalanceError> {
        let (raw, decimals) = if token.is_native {
            (self.reader.native_balance(account).await?, token.decimals)
        } else {
            let raw = self.erc20.balance_of(token.address, account).await?;
            let decimals = self.erc20.decimals(token.address).await?;
            (raw, decimals)
        };

        debug!(account = %account, raw = %raw, "读取余额");

        Ok(TokenBalance {
            symbol: token.symbol.clone(),
            formatted: format_units(raw, decimals),
            raw,
            decimals,
        })
    }

    /// 注册表以外的代币：符号和小数位都从链上读取
    #[instrument(skip(self))]
    pub async fn balance_of_contract(
        &self,
        account: Address,
        token_address: Address,
    ) -> Result<TokenBalance, BalanceError> {
        let symbol = self.erc20.symbol(token_address).await?;
        let decimals = self.erc20.decimals(token_address).await?;
        let raw = self.erc20.balance_of(token_address, account).await?;

        Ok(TokenBalance {
            symbol,
            formatted: format_units(raw, decimals),
            raw,
            decimals,
        })
    }

    /// "最大" 输入金额
    ///
    /// 原生代币扣除 Gas 预留（不低于 0）并截断到 6 位小数；代币返回全部余额。
    pub async fn max_input(&self, account: Address, token: &Token) -> Result<String, BalanceError> {
        let balance = self.balance(account, token).await?;
        self.max_for_balance(token, &balance)
    }

    /// 由已读取的余额计算最大输入
    pub fn max_for_balance(&self, token: &Token, balance: &TokenBalance) -> Result<String, BalanceError> {
        if !token.is_native {
            return Ok(balance.formatted.clone());
        }
        max_native_input(&balance.formatted, self.native_gas_reserve)
    }
}

/// balance - reserve，截断到 6 位小数
pub fn max_native_input(balance: &str, reserve: Decimal) -> Result<String, BalanceError> {
    let balance = Decimal::from_str(balance).map_err(|e| BalanceError::Format(e.to_string()))?;
    let spendable = (balance - reserve).max(Decimal::ZERO);
    truncate_to_dp(&spendable.to_string(), 6).map_err(BalanceError::Format)
}
