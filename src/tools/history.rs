use super::json_result;
use crate::app::AppContext;
use crate::ledger::SwapRecord;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use tracing::info;

/// 交易记录响应
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    /// 最新的在前
    pub records: Vec<SwapRecord>,
}

pub fn swap_history(ctx: &AppContext) -> Result<CallToolResult, McpError> {
    let records = ctx.session.ledger().list();
    json_result(&HistoryResponse {
        count: records.len(),
        records,
    })
}

pub fn clear_swap_history(ctx: &AppContext) -> Result<CallToolResult, McpError> {
    ctx.session.ledger().clear();
    info!("交易记录已清空");
    json_result(&HistoryResponse {
        count: 0,
        records: Vec::new(),
    })
}
