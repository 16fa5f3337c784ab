use super::{json_result, swap_error_result};
use crate::app::AppContext;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use tracing::info;

/// 连接钱包响应
#[derive(Debug, Serialize)]
pub struct ConnectWalletResponse {
    pub account: String,
    pub chain_id: u64,
    pub chain_name: String,
    pub explorer_url: String,
}

/// 请求账户并切换到目标网络
pub async fn connect_wallet(ctx: &AppContext) -> Result<CallToolResult, McpError> {
    let wallet = ctx.session.orchestrator().wallet();

    let account = match wallet.connect().await {
        Ok(account) => account,
        Err(e) => return swap_error_result(&e),
    };

    info!(account = %account, "connect_wallet 完成");

    let network = wallet.network();
    json_result(&ConnectWalletResponse {
        account: format!("{:?}", account),
        chain_id: network.chain_id,
        chain_name: network.chain_name.clone(),
        explorer_url: network.explorer_url.clone(),
    })
}
