use super::{Notification, json_result, notification_result, swap_error_result};
use crate::app::AppContext;
use crate::balance::TokenBalance;
use crate::error::SwapError;
use ethers::types::Address;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 查询余额请求参数
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetBalanceRequest {
    /// 可选：代币符号或合约地址，不提供则查询 BNB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// 可选：账户地址，不提供则使用已连接的钱包
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// 余额查询响应
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// 账户地址
    pub address: String,

    /// 代币符号
    pub symbol: String,

    /// 余额值（已格式化，带正确小数位）
    pub balance: String,

    /// 原始余额（最小单位）
    pub balance_raw: String,

    /// 代币小数位数
    pub decimals: u8,

    /// 作为兑换输入时的最大金额（原生代币已扣除 Gas 预留）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_input: Option<String>,
}

impl BalanceResponse {
    fn new(address: Address, balance: TokenBalance, max_input: Option<String>) -> Self {
        Self {
            address: format!("{:?}", address),
            symbol: balance.symbol,
            balance: balance.formatted,
            balance_raw: balance.raw.to_string(),
            decimals: balance.decimals,
            max_input,
        }
    }
}

/// 查询 BNB 或代币余额
pub async fn get_balance(ctx: &AppContext, request: GetBalanceRequest) -> Result<CallToolResult, McpError> {
    let session = &ctx.session;
    info!(token = ?request.token, address = ?request.address, "收到 get_balance 请求");

    let account = match request.address.as_deref() {
        Some(address) => match address.parse::<Address>() {
            Ok(account) => account,
            Err(_) => {
                return notification_result(Notification::new(
                    "Invalid Input",
                    format!("无效的地址: {}", address),
                ));
            }
        },
        None => match session.orchestrator().wallet().require_account() {
            Ok(account) => account,
            Err(e) => return swap_error_result(&e),
        },
    };

    let symbol_or_address = request.token.as_deref().unwrap_or("BNB");
    let balances = session.balances();

    if let Some(token) = session.registry().resolve(symbol_or_address) {
        let balance = match balances.balance(account, &token).await {
            Ok(balance) => balance,
            Err(e) => return swap_error_result(&SwapError::BalanceUnavailable(e.to_string())),
        };
        let max_input = balances.max_for_balance(&token, &balance).ok();
        return json_result(&BalanceResponse::new(account, balance, max_input));
    }

    // 注册表以外的合约地址
    let Ok(token_address) = symbol_or_address.parse::<Address>() else {
        return swap_error_result(&SwapError::UnknownToken(symbol_or_address.to_string()));
    };
    match balances.balance_of_contract(account, token_address).await {
        Ok(balance) => json_result(&BalanceResponse::new(account, balance, None)),
        Err(e) => swap_error_result(&SwapError::BalanceUnavailable(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::QuoteChain;
    use crate::tools::tests::{connected_context, json_of, test_context};
    use ethers::types::U256;

    #[test]
    fn test_balance_request_deserialization() {
        let json = r#"{"token": "CAKE"}"#;
        let request: GetBalanceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.token.as_deref(), Some("CAKE"));
        assert!(request.address.is_none());
    }

    #[tokio::test]
    async fn test_native_balance_with_max_input() {
        let mut chain = QuoteChain::new(1, 1);
        chain.native_balance = U256::exp10(18) * U256::from(2);
        let ctx = connected_context(chain);
        ctx.session.orchestrator().wallet().connect().await.unwrap();

        let request = GetBalanceRequest {
            token: None,
            address: None,
        };
        let json = json_of(&get_balance(&ctx, request).await.unwrap());
        assert_eq!(json["symbol"], "BNB");
        assert_eq!(json["balance"], "2");
        assert_eq!(json["max_input"], "1.990000");
    }

    #[tokio::test]
    async fn test_token_balance_for_explicit_address() {
        let mut chain = QuoteChain::new(1, 1);
        chain.token_balance = U256::exp10(17) * U256::from(15);
        let ctx = test_context(chain, None);

        let request = GetBalanceRequest {
            token: Some("busd".to_string()),
            address: Some("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0".to_string()),
        };
        let json = json_of(&get_balance(&ctx, request).await.unwrap());
        assert_eq!(json["symbol"], "BUSD");
        assert_eq!(json["balance"], "1.5");
        assert_eq!(json["max_input"], "1.5");
    }

    #[tokio::test]
    async fn test_balance_requires_account() {
        let ctx = test_context(QuoteChain::new(1, 1), None);
        let request = GetBalanceRequest {
            token: None,
            address: None,
        };
        let result = get_balance(&ctx, request).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(json_of(&result)["title"], "Connection Failed");
    }

    #[tokio::test]
    async fn test_unknown_token_symbol() {
        let ctx = test_context(QuoteChain::new(1, 1), None);
        let request = GetBalanceRequest {
            token: Some("DOGE".to_string()),
            address: Some("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0".to_string()),
        };
        let result = get_balance(&ctx, request).await.unwrap();
        assert_eq!(json_of(&result)["title"], "Invalid Input");
    }
}
