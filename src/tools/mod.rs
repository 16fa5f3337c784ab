/// PancakeSwap 兑换 MCP 工具模块
///
/// - `wallet`: 连接钱包
/// - `tokens`: 代币列表与选择
/// - `quote`: 报价与滑点设置
/// - `swap`: 授权并兑换（主操作）
/// - `balance`: 余额查询
/// - `price`: BNB 价格
/// - `history`: 本地交易记录
pub mod balance;
pub mod history;
pub mod price;
pub mod quote;
pub mod swap;
pub mod tokens;
pub mod wallet;

use crate::error::SwapError;
use crate::session::SwapState;
use crate::slippage::SlippageWarning;
use crate::types::SwapPhase;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use tracing::warn;

/// 返回给客户端的通知（标题 + 描述）
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
        }
    }
}

impl From<&SwapError> for Notification {
    fn from(err: &SwapError) -> Self {
        Notification::new(err.title(), err.to_string())
    }
}

/// 序列化为 JSON 文本结果
pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// 以工具错误结果返回通知，会话继续
pub fn notification_result(notification: Notification) -> Result<CallToolResult, McpError> {
    warn!(title = %notification.title, description = %notification.description, "工具调用失败");
    let json = serde_json::to_string_pretty(&notification)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::error(vec![Content::text(json)]))
}

pub fn swap_error_result(err: &SwapError) -> Result<CallToolResult, McpError> {
    notification_result(Notification::from(err))
}

/// 会话状态的对外视图
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub from_token: String,
    pub to_token: String,
    pub from_amount: String,
    pub to_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact_percent: Option<f64>,
    pub needs_approval: bool,
    pub slippage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slippage_warning: Option<SlippageWarning>,
    pub phase: SwapPhase,
    pub loading: bool,
}

impl From<&SwapState> for SessionView {
    fn from(state: &SwapState) -> Self {
        Self {
            from_token: state.from_token.symbol.clone(),
            to_token: state.to_token.symbol.clone(),
            from_amount: state.from_amount.clone(),
            to_amount: state.to_amount.clone(),
            rate: state.quote.as_ref().map(|q| q.display_rate.clone()),
            price_impact_percent: state.quote.as_ref().map(|q| q.price_impact_percent),
            needs_approval: state.needs_approval,
            slippage: state.slippage.to_string(),
            slippage_warning: state.slippage.warning(),
            phase: state.phase,
            loading: state.loading,
        }
    }
}
