use crate::eth_client::{ChainReader, EthClientError};
use crate::token_registry::TokenRegistry;
use crate::types::Token;
use ethers::abi::{self, ParamType, Token as AbiToken};
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use std::sync::Arc;
use tracing::{debug, instrument};

/// getAmountsOut(uint256,address[])
pub const GET_AMOUNTS_OUT_SELECTOR: [u8; 4] = [0xd0, 0x6c, 0xa6, 0x1f];
/// swapExactETHForTokens(uint256,address[],address,uint256)
pub const SWAP_EXACT_ETH_FOR_TOKENS_SELECTOR: [u8; 4] = [0x7f, 0xf3, 0x6a, 0xb5];
/// swapExactTokensForETH(uint256,uint256,address[],address,uint256)
pub const SWAP_EXACT_TOKENS_FOR_ETH_SELECTOR: [u8; 4] = [0x18, 0xcb, 0xaf, 0xe5];
/// swapExactTokensForTokens(uint256,uint256,address[],address,uint256)
pub const SWAP_EXACT_TOKENS_FOR_TOKENS_SELECTOR: [u8; 4] = [0x38, 0xed, 0x17, 0x39];

/// PancakeSwap Router 错误类型
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("链调用失败: {0}")]
    Chain(#[from] EthClientError),

    #[error("ABI 编码/解码错误: {0}")]
    AbiError(String),

    #[error("无效的路径: {0}")]
    InvalidPath(String),
}

/// Router 的三个兑换入口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapEntryPoint {
    /// 原生代币 -> 代币（payable）
    ExactNativeForTokens,
    /// 代币 -> 原生代币
    ExactTokensForNative,
    /// 代币 -> 代币
    ExactTokensForTokens,
}

impl SwapEntryPoint {
    /// 根据哪一侧是原生代币选择入口
    pub fn select(from: &Token, to: &Token) -> Self {
        if from.is_native {
            SwapEntryPoint::ExactNativeForTokens
        } else if to.is_native {
            SwapEntryPoint::ExactTokensForNative
        } else {
            SwapEntryPoint::ExactTokensForTokens
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            SwapEntryPoint::ExactNativeForTokens => SWAP_EXACT_ETH_FOR_TOKENS_SELECTOR,
            SwapEntryPoint::ExactTokensForNative => SWAP_EXACT_TOKENS_FOR_ETH_SELECTOR,
            SwapEntryPoint::ExactTokensForTokens => SWAP_EXACT_TOKENS_FOR_TOKENS_SELECTOR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwapEntryPoint::ExactNativeForTokens => "swapExactETHForTokens",
            SwapEntryPoint::ExactTokensForNative => "swapExactTokensForETH",
            SwapEntryPoint::ExactTokensForTokens => "swapExactTokensForTokens",
        }
    }
}

/// 兑换交易参数（链上最小单位）
#[derive(Debug, Clone)]
pub struct SwapCall {
    pub entry_point: SwapEntryPoint,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub path: Vec<Address>,
    pub to: Address,
    pub deadline: U256,
}

/// PancakeSwap V2 Router 客户端
#[derive(Clone)]
pub struct PancakeRouter {
    reader: Arc<dyn ChainReader>,
    registry: Arc<TokenRegistry>,
    router_address: Address,
}

impl PancakeRouter {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        registry: Arc<TokenRegistry>,
        router_address: Address,
    ) -> Self {
        Self {
            reader,
            registry,
            router_address,
        }
    }

    /// 获取 Router 地址
    pub fn router_address(&self) -> Address {
        self.router_address
    }

    /// 两跳路径 [from, to]，原生代币替换为 WBNB
    pub fn route_path(&self, from: &Token, to: &Token) -> Result<Vec<Address>, RouterError> {
        let path = vec![
            self.registry.route_address(from),
            self.registry.route_address(to),
        ];
        if path[0] == path[1] {
            return Err(RouterError::InvalidPath(format!(
                "{} 与 {} 解析为同一地址",
                from.symbol, to.symbol
            )));
        }
        Ok(path)
    }

    /// getAmountsOut(amountIn, path) -> amounts
    #[instrument(skip(self))]
    pub async fn get_amounts_out(
        &self,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Vec<U256>, RouterError> {
        if path.len() < 2 {
            return Err(RouterError::InvalidPath("路径至少需要 2 个代币".to_string()));
        }

        let data = encode_call(
            GET_AMOUNTS_OUT_SELECTOR,
            &[AbiToken::Uint(amount_in), address_array(path)],
        );

        debug!(
            router = %self.router_address,
            path_length = path.len(),
            "查询 getAmountsOut"
        );

        let result = self.reader.call(self.router_address, data).await?;
        let amounts = decode_amounts(&result)?;

        if amounts.len() != path.len() {
            return Err(RouterError::AbiError(format!(
                "期望 {} 个数量，实际 {} 个",
                path.len(),
                amounts.len()
            )));
        }

        Ok(amounts)
    }

    /// 构建兑换交易（未签名）
    pub fn build_swap_transaction(&self, call: &SwapCall, from: Address) -> TransactionRequest {
        let path = address_array(&call.path);
        let to = AbiToken::Address(call.to);
        let deadline = AbiToken::Uint(call.deadline);
        let amount_out_min = AbiToken::Uint(call.amount_out_min);

        let (data, value) = match call.entry_point {
            SwapEntryPoint::ExactNativeForTokens => (
                encode_call(
                    call.entry_point.selector(),
                    &[amount_out_min, path, to, deadline],
                ),
                Some(call.amount_in),
            ),
            SwapEntryPoint::ExactTokensForNative | SwapEntryPoint::ExactTokensForTokens => (
                encode_call(
                    call.entry_point.selector(),
                    &[
                        AbiToken::Uint(call.amount_in),
                        amount_out_min,
                        path,
                        to,
                        deadline,
                    ],
                ),
                None,
            ),
        };

        let tx = TransactionRequest::new()
            .from(from)
            .to(self.router_address)
            .data(data);

        match value {
            Some(value) => tx.value(value),
            None => tx,
        }
    }
}

fn address_array(path: &[Address]) -> AbiToken {
    AbiToken::Array(path.iter().copied().map(AbiToken::Address).collect())
}

/// selector + ABI 编码参数
pub fn encode_call(selector: [u8; 4], args: &[AbiToken]) -> Bytes {
    let mut data = selector.to_vec();
    data.extend_from_slice(&abi::encode(args));
    Bytes::from(data)
}

/// 解码 uint256[] 返回值
fn decode_amounts(data: &[u8]) -> Result<Vec<U256>, RouterError> {
    let tokens = abi::decode(&[ParamType::Array(Box::new(ParamType::Uint(256)))], data)
        .map_err(|e| RouterError::AbiError(e.to_string()))?;

    tokens
        .into_iter()
        .next()
        .and_then(|token| token.into_array())
        .ok_or_else(|| RouterError::AbiError("返回值不是数组".to_string()))?
        .into_iter()
        .map(|token| {
            token
                .into_uint()
                .ok_or_else(|| RouterError::AbiError("数组元素不是 uint".to_string()))
        })
        .collect()
}

/// 从错误信息中提取 revert 原因
pub fn revert_reason_from_message(error_msg: &str) -> Option<String> {
    if let Some(pos) = error_msg.find("execution reverted") {
        let reason = error_msg[pos..]
            .trim_start_matches("execution reverted")
            .trim_start_matches(':')
            .trim();
        if reason.is_empty() {
            Some("execution reverted".to_string())
        } else {
            Some(reason.to_string())
        }
    } else if error_msg.contains("INSUFFICIENT_OUTPUT_AMOUNT") {
        Some("Price moved beyond slippage tolerance".to_string())
    } else if error_msg.contains("TRANSFER_FROM_FAILED") {
        Some("Token transfer failed (check allowance)".to_string())
    } else if error_msg.contains("EXPIRED") {
        Some("Transaction deadline expired".to_string())
    } else if error_msg.contains("insufficient funds") {
        Some("Insufficient funds for gas".to_string())
    } else if error_msg.is_empty() {
        None
    } else {
        Some(error_msg.to_string())
    }
}
