use crate::eth_client::{ChainReader, EthClientError};
use ethers::types::{Address, Bytes, U256};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

/// balanceOf(address)
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// decimals()
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
/// symbol()
pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
/// allowance(address,address)
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
/// U256 能表示的最大 10 的幂次
pub const MAX_DECIMALS: u8 = 77;

/// approve(address,uint256)
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// ERC20 代币错误类型
#[derive(Debug, thiserror::Error)]
pub enum Erc20Error {
    #[error("链调用失败: {0}")]
    Chain(#[from] EthClientError),

    #[error("ABI 编码/解码错误: {0}")]
    AbiError(String),
}

/// ERC20 客户端
#[derive(Clone)]
pub struct Erc20Client {
    reader: Arc<dyn ChainReader>,
}

impl Erc20Client {
    /// 创建新的 ERC20 客户端
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// 查询 ERC20 代币余额
    #[instrument(skip(self))]
    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, Erc20Error> {
        debug!(token_address = %token, owner_address = %owner, "查询 ERC20 余额");

        let mut data = BALANCE_OF_SELECTOR.to_vec();
        push_address(&mut data, owner);

        let result = self.reader.call(token, Bytes::from(data)).await?;
        parse_uint_return(&result)
    }

    /// 查询授权额度 allowance(owner, spender)
    #[instrument(skip(self))]
    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, Erc20Error> {
        let mut data = ALLOWANCE_SELECTOR.to_vec();
        push_address(&mut data, owner);
        push_address(&mut data, spender);

        let result = self.reader.call(token, Bytes::from(data)).await?;
        let allowance = parse_uint_return(&result)?;

        debug!(token_address = %token, allowance = %allowance, "查询授权额度");
        Ok(allowance)
    }

    /// 查询代币符号（symbol）
    #[instrument(skip(self))]
    pub async fn symbol(&self, token: Address) -> Result<String, Erc20Error> {
        let result = self
            .reader
            .call(token, Bytes::from(SYMBOL_SELECTOR.to_vec()))
            .await?;

        decode_symbol(&result)
    }

    /// 查询代币小数位数（decimals）
    #[instrument(skip(self))]
    pub async fn decimals(&self, token: Address) -> Result<u8, Erc20Error> {
        let result = self
            .reader
            .call(token, Bytes::from(DECIMALS_SELECTOR.to_vec()))
            .await?;

        if result.is_empty() {
            return Err(Erc20Error::AbiError("空返回值".to_string()));
        }

        // decimals 通常返回 uint8，但某些合约返回 uint256
        let value = match result.len() {
            32 => U256::from_big_endian(&result),
            1 => U256::from(result[0]),
            len => {
                return Err(Erc20Error::AbiError(format!(
                    "意外的 decimals 返回值长度: {}",
                    len
                )));
            }
        };

        if value > U256::from(MAX_DECIMALS) {
            return Err(Erc20Error::AbiError(format!("decimals 超出范围: {}", value)));
        }
        Ok(value.as_u32() as u8)
    }
}

/// 构建 approve(spender, amount) 调用数据
pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    let mut data = APPROVE_SELECTOR.to_vec();
    push_address(&mut data, spender);
    let mut amount_bytes = [0u8; 32];
    amount.to_big_endian(&mut amount_bytes);
    data.extend_from_slice(&amount_bytes);
    Bytes::from(data)
}

/// 地址左填充到 32 字节
fn push_address(data: &mut Vec<u8>, address: Address) {
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(address.as_bytes());
}

fn parse_uint_return(data: &[u8]) -> Result<U256, Erc20Error> {
    if data.len() != 32 {
        return Err(Erc20Error::AbiError(format!(
            "期望 32 字节返回值，实际 {} 字节",
            data.len()
        )));
    }
    Ok(U256::from_big_endian(data))
}

/// symbol() 返回值：标准 ABI string，少数旧合约返回 bytes32
fn decode_symbol(data: &[u8]) -> Result<String, Erc20Error> {
    if data.len() == 32 {
        let end = data.iter().position(|b| *b == 0).unwrap_or(32);
        return String::from_utf8(data[..end].to_vec())
            .map_err(|e| Erc20Error::AbiError(format!("symbol 不是 UTF-8: {}", e)));
    }

    ethers::abi::decode(&[ethers::abi::ParamType::String], data)
        .map_err(|e| Erc20Error::AbiError(format!("无法解析 symbol 返回值: {}", e)))?
        .into_iter()
        .next()
        .and_then(|token| token.into_string())
        .ok_or_else(|| Erc20Error::AbiError("symbol 返回值为空".to_string()))
}

/// 格式化代币金额
pub fn format_units(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    // 10^decimals 超出 U256 时整数部分必然为 0
    let (integer_part, fractional_part) = match U256::from(10).checked_pow(U256::from(decimals)) {
        Some(divisor) => (amount / divisor, amount % divisor),
        None => (U256::zero(), amount),
    };

    if fractional_part.is_zero() {
        integer_part.to_string()
    } else {
        // 格式化小数部分，移除尾部的 0
        let frac_str = format!("{:0width$}", fractional_part, width = decimals as usize);
        let frac_trimmed = frac_str.trim_end_matches('0');
        format!("{}.{}", integer_part, frac_trimmed)
    }
}

/// 解析代币金额（使用 Decimal 保持精度）
pub fn parse_units(amount_str: &str, decimals: u8) -> Result<U256, String> {
    let decimal = Decimal::from_str(amount_str.trim())
        .map_err(|e| format!("无法解析金额 '{}': {}", amount_str, e))?;

    if decimal.is_sign_negative() {
        return Err("金额不能为负数".to_string());
    }

    let decimal_str = decimal.to_string();

    let (integer_part, fractional_part) = match decimal_str.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (decimal_str.as_str(), ""),
    };

    // 去掉尾部的 0 后再检查精度（"1.500000" 在 2 位小数代币上仍然有效）
    let fractional_part = fractional_part.trim_end_matches('0');
    if fractional_part.len() > decimals as usize {
        return Err(format!(
            "金额 '{}' 的精度超过了代币支持的 {} 位小数",
            amount_str, decimals
        ));
    }

    let padding_zeros = decimals as usize - fractional_part.len();
    let final_str = format!(
        "{}{}{}",
        integer_part,
        fractional_part,
        "0".repeat(padding_zeros)
    );

    U256::from_dec_str(&final_str).map_err(|e| format!("金额过大，无法转换: {}", e))
}

/// 解析为严格为正的金额
pub fn parse_positive_units(amount_str: &str, decimals: u8) -> Result<U256, String> {
    let amount = parse_units(amount_str, decimals)?;
    if amount.is_zero() {
        return Err("金额必须大于 0".to_string());
    }
    Ok(amount)
}

/// 保留 `dp` 位小数（四舍五入），总是补齐小数位
pub fn round_to_dp(amount_str: &str, dp: u32) -> Result<String, String> {
    let decimal = Decimal::from_str(amount_str.trim())
        .map_err(|e| format!("无法解析金额 '{}': {}", amount_str, e))?;
    let rounded = decimal.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    Ok(format!("{:.*}", dp as usize, rounded))
}

/// 保留 `dp` 位小数（截断），用于不能超过余额的场景
pub fn truncate_to_dp(amount_str: &str, dp: u32) -> Result<String, String> {
    let decimal = Decimal::from_str(amount_str.trim())
        .map_err(|e| format!("无法解析金额 '{}': {}", amount_str, e))?;
    let truncated = decimal.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
    Ok(format!("{:.*}", dp as usize, truncated))
}
