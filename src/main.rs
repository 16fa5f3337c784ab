use pancake_swap_mcp_server::{
    app::AppContext,
    config::Config,
    logging::init_logging,
    tools::{
        balance::{GetBalanceRequest, get_balance},
        history::{clear_swap_history, swap_history},
        price::get_bnb_price,
        quote::{GetQuoteRequest, SetSlippageRequest, get_quote, set_slippage},
        swap::swap_tokens,
        tokens::{SelectTokenRequest, flip_tokens, list_tokens, select_token},
        wallet::connect_wallet,
    },
};
use rmcp::{
    ErrorData as McpError, ServiceExt,
    handler::server::{ServerHandler, router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use std::sync::Arc;

/// PancakeSwap 测试网兑换 MCP Server
#[derive(Clone)]
pub struct SwapServer {
    tool_router: ToolRouter<Self>,
    ctx: Arc<AppContext>,
}

#[tool_router]
impl SwapServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            ctx,
        }
    }

    // ==================== 钱包 ====================

    #[tool(description = "连接钱包：请求账户并确保钱包处于 BSC 测试网（chain 97），钱包不认识该网络时自动添加。")]
    async fn connect_wallet(&self) -> Result<CallToolResult, McpError> {
        connect_wallet(&self.ctx).await
    }

    #[tool(description = "查询 BNB 或代币余额。token 可以是符号（BNB, CAKE, BUSD, USDT）或合约地址；address 不提供时使用已连接的钱包。返回值包含作为兑换输入时的最大金额。")]
    async fn get_balance(
        &self,
        Parameters(request): Parameters<GetBalanceRequest>,
    ) -> Result<CallToolResult, McpError> {
        get_balance(&self.ctx, request).await
    }

    // ==================== 兑换表单 ====================

    #[tool(description = "列出可交易代币及当前选择的兑换方向。")]
    async fn list_tokens(&self) -> Result<CallToolResult, McpError> {
        list_tokens(&self.ctx)
    }

    #[tool(description = "选择源代币（side=from）或目标代币（side=to）。选择与另一侧相同的代币时两侧互换。")]
    async fn select_token(
        &self,
        Parameters(request): Parameters<SelectTokenRequest>,
    ) -> Result<CallToolResult, McpError> {
        select_token(&self.ctx, request)
    }

    #[tool(description = "互换源代币和目标代币，金额一并互换。")]
    async fn flip_tokens(&self) -> Result<CallToolResult, McpError> {
        flip_tokens(&self.ctx)
    }

    #[tool(description = "设置滑点容差（百分比，范围 (0, 50]，预设 0.1 / 0.5 / 1 / 3，默认 3）。大于 5% 或小于 0.5% 时返回提示。")]
    async fn set_slippage(
        &self,
        Parameters(request): Parameters<SetSlippageRequest>,
    ) -> Result<CallToolResult, McpError> {
        set_slippage(&self.ctx, request)
    }

    #[tool(description = "在 PancakeSwap Router 上查询报价。amount 为输入金额，\"max\" 表示最大可用余额；可选 from/to 同时切换代币。返回输出金额、兑换比率、价格影响、最少可得数量以及是否需要授权。")]
    async fn get_quote(
        &self,
        Parameters(request): Parameters<GetQuoteRequest>,
    ) -> Result<CallToolResult, McpError> {
        get_quote(&self.ctx, request).await
    }

    #[tool(description = "按当前报价执行兑换：余额检查，需要时先提交授权并等待确认，然后提交兑换交易并等待上链，成功后写入本地交易记录。")]
    async fn swap_tokens(&self) -> Result<CallToolResult, McpError> {
        swap_tokens(&self.ctx).await
    }

    // ==================== 价格与记录 ====================

    #[tool(description = "获取 BNB 的 USD 价格和 24 小时涨跌幅（CoinGecko，每 30 秒刷新）。")]
    async fn get_bnb_price(&self) -> Result<CallToolResult, McpError> {
        get_bnb_price(&self.ctx).await
    }

    #[tool(description = "列出本地保存的兑换记录（最新的在前，最多 50 条）。")]
    async fn swap_history(&self) -> Result<CallToolResult, McpError> {
        swap_history(&self.ctx)
    }

    #[tool(description = "清空本地兑换记录。")]
    async fn clear_swap_history(&self) -> Result<CallToolResult, McpError> {
        clear_swap_history(&self.ctx)
    }

    // ==================== 辅助工具 ====================

    #[tool(description = "获取 MCP 服务器的基本信息，包括版本、网络和工具列表")]
    async fn server_info(&self) -> Result<CallToolResult, McpError> {
        let config = &self.ctx.config;
        let wallet = if config.network.private_key.is_some() {
            "✅ 已配置"
        } else {
            "❌ 未配置（只读）"
        };
        let rpc = if self.ctx.chain_available {
            "✅ 已连接"
        } else {
            "❌ 不可用"
        };

        let info = format!(
            r#"
🥞 PancakeSwap Testnet Swap MCP Server
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
名称: {name}
版本: {version}
网络: {chain} (chain {chain_id})
RPC: {rpc}
钱包: {wallet}
Router: {router}

📋 可用工具:
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

🔹 钱包:
  • connect_wallet     - 连接钱包并切换网络
  • get_balance        - 查询 BNB / 代币余额

🔹 兑换:
  • list_tokens        - 可交易代币
  • select_token       - 选择代币
  • flip_tokens        - 互换方向
  • set_slippage       - 设置滑点
  • get_quote          - 查询报价
  • swap_tokens        - 授权并兑换

🔹 其他:
  • get_bnb_price      - BNB 价格
  • swap_history       - 交易记录
  • clear_swap_history - 清空交易记录
  • server_info        - 显示本信息

━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
⚠️  仅用于测试网，交易会真实上链
"#,
            name = config.server.name,
            version = config.server.version,
            chain = config.network.chain_name,
            chain_id = config.network.chain_id,
            router = config.pancakeswap.router,
        );

        Ok(CallToolResult::success(vec![Content::text(
            info.trim().to_string(),
        )]))
    }
}

#[tool_handler]
impl ServerHandler for SwapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "PancakeSwap BSC 测试网兑换：connect_wallet → get_quote → swap_tokens".to_string(),
            ),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // guard 必须存活到进程结束
    let _log_guard = init_logging(
        &config.server.log_level,
        config.server.log_json_format,
        config.server.log_dir.as_deref(),
    )?;

    config.validate()?;
    config.print_info();

    tracing::info!("🚀 启动 PancakeSwap Swap MCP Server...");

    let ctx = AppContext::init(config).await?;
    let server = SwapServer::new(Arc::new(ctx));

    let transport = stdio();

    tracing::info!("✅ MCP Server 已就绪，等待客户端连接...");

    let service = server.serve(transport).await?;

    let quit_reason = service.waiting().await?;
    tracing::info!("👋 MCP Server 关闭，原因: {:?}", quit_reason);

    Ok(())
}
