use crate::error::SwapError;
use ethers::types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::str::FromStr;

/// 预设滑点（百分比）
pub const SLIPPAGE_PRESETS: [Decimal; 4] = [
    Decimal::from_parts(1, 0, 0, false, 1),
    Decimal::from_parts(5, 0, 0, false, 1),
    Decimal::from_parts(1, 0, 0, false, 0),
    Decimal::from_parts(3, 0, 0, false, 0),
];

const BPS_DENOMINATOR: u32 = 10_000;

/// 滑点容差，取值范围 (0, 50]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlippageTolerance(Decimal);

/// 滑点提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlippageWarning {
    /// > 5%：可能以不利价格成交
    High,
    /// < 0.5%：交易可能失败
    Low,
}

impl SlippageTolerance {
    pub fn new(percent: Decimal) -> Result<Self, SwapError> {
        if percent <= Decimal::ZERO || percent > Decimal::from(50) {
            return Err(SwapError::InvalidSlippage(percent.to_string()));
        }
        Ok(Self(percent.normalize()))
    }

    /// 解析用户输入的自定义滑点
    pub fn parse(input: &str) -> Result<Self, SwapError> {
        let percent = Decimal::from_str(input.trim().trim_end_matches('%'))
            .map_err(|_| SwapError::InvalidSlippage(input.to_string()))?;
        Self::new(percent)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// 是否为预设值
    pub fn is_preset(&self) -> bool {
        SLIPPAGE_PRESETS.iter().any(|p| *p == self.0)
    }

    /// 基点，四舍五入（0.5% -> 50）
    pub fn basis_points(&self) -> u32 {
        (self.0 * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .unwrap_or(BPS_DENOMINATOR)
            .min(BPS_DENOMINATOR)
    }

    /// 可接受的最小输出：quoted * (10000 - bps) / 10000
    pub fn minimum_output(&self, quoted: U256) -> U256 {
        let factor = BPS_DENOMINATOR - self.basis_points();
        quoted * U256::from(factor) / U256::from(BPS_DENOMINATOR)
    }

    pub fn warning(&self) -> Option<SlippageWarning> {
        if self.0 > Decimal::from(5) {
            Some(SlippageWarning::High)
        } else if self.0 < Decimal::new(5, 1) {
            Some(SlippageWarning::Low)
        } else {
            None
        }
    }
}

impl Default for SlippageTolerance {
    fn default() -> Self {
        Self(Decimal::from(3))
    }
}

impl std::fmt::Display for SlippageTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}
