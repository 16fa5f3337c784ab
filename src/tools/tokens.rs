use super::{SessionView, json_result, swap_error_result};
use crate::app::AppContext;
use crate::types::{SwapSide, Token};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};

/// 选择代币请求参数
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SelectTokenRequest {
    /// 选择哪一侧："from" 或 "to"
    pub side: SwapSide,

    /// 代币符号（BNB, CAKE, BUSD, USDT）
    pub symbol: String,
}

/// 代币信息
#[derive(Debug, Serialize)]
pub struct TokenView {
    pub symbol: String,
    pub name: String,
    /// 原生代币没有合约地址
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub decimals: u8,
    pub is_native: bool,
}

impl From<&Token> for TokenView {
    fn from(token: &Token) -> Self {
        Self {
            symbol: token.symbol.clone(),
            name: token.name.clone(),
            address: (!token.is_native).then(|| format!("{:?}", token.address)),
            decimals: token.decimals,
            is_native: token.is_native,
        }
    }
}

/// 代币列表响应
#[derive(Debug, Serialize)]
pub struct TokenListResponse {
    pub tokens: Vec<TokenView>,
    pub from_token: String,
    pub to_token: String,
    pub router: String,
    pub wrapped_native: String,
}

/// 可交易代币与当前选择
pub fn list_tokens(ctx: &AppContext) -> Result<CallToolResult, McpError> {
    let registry = ctx.session.registry();
    let state = ctx.session.state();

    json_result(&TokenListResponse {
        tokens: registry.tradeable().iter().map(TokenView::from).collect(),
        from_token: state.from_token.symbol,
        to_token: state.to_token.symbol,
        router: format!("{:?}", ctx.session.orchestrator().spender()),
        wrapped_native: format!("{:?}", registry.wrapped_native()),
    })
}

/// 选择一侧的代币，与另一侧相同时互换
pub fn select_token(ctx: &AppContext, request: SelectTokenRequest) -> Result<CallToolResult, McpError> {
    match ctx.session.select_token(request.side, &request.symbol) {
        Ok(state) => json_result(&SessionView::from(&state)),
        Err(e) => swap_error_result(&e),
    }
}

/// 互换两侧代币和金额
pub fn flip_tokens(ctx: &AppContext) -> Result<CallToolResult, McpError> {
    let state = ctx.session.flip();
    json_result(&SessionView::from(&state))
}
