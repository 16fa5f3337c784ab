use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// 代币信息
///
/// 原生代币（BNB）使用零地址作为占位，通过 `is_native` 区分。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: u8,
    #[serde(default)]
    pub is_native: bool,
}

impl Token {
    /// 创建 ERC20 代币
    pub fn erc20(symbol: &str, name: &str, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address,
            decimals,
            is_native: false,
        }
    }

    /// 创建链原生代币
    pub fn native(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address: Address::zero(),
            decimals: 18,
            is_native: true,
        }
    }

    /// 判断两个代币是否为同一个（按符号）
    pub fn same_as(&self, other: &Token) -> bool {
        self.symbol.eq_ignore_ascii_case(&other.symbol)
    }
}

/// 报价结果（派生数据，不持久化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResult {
    /// Router 返回的完整精度输出
    pub output_amount: String,
    /// 界面展示用的输出（6 位小数）
    pub display_output: String,
    /// "1 BNB = 123.456789 CAKE"
    pub display_rate: String,
    /// |1 - rate| * 100，仅作展示
    pub price_impact_percent: f64,
    /// 链上最小单位的输出
    #[serde(skip)]
    pub output_raw: U256,
    /// 实际报价使用的路径（原生代币已替换为包装地址）
    pub path: Vec<Address>,
}

/// 代币选择的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SwapSide {
    From,
    To,
}

/// 单次兑换尝试的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    Idle,
    QuotePending,
    QuoteReady,
    AllowanceCheck,
    ApprovalPending,
    Approved,
    SwapPending,
    Confirmed,
}

/// 钱包添加网络时提交的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_symbol: String,
    pub native_decimals: u8,
    pub rpc_url: String,
    pub explorer_url: String,
}

impl NetworkParams {
    /// 钱包接口使用的十六进制 chain id（97 -> "0x61"）
    pub fn hex_chain_id(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// 交易在区块浏览器中的链接
    pub fn explorer_tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), hash)
    }
}
