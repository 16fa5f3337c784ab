use ethers::types::TxHash;

/// 兑换流程对外暴露的错误
///
/// 组件内部错误（RPC、ABI、钱包、存储）在编排层转换为这里的变体，
/// 调用方只需要把它展示给用户。
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("未检测到钱包，请配置 ETH_PRIVATE_KEY")]
    WalletUnavailable,

    #[error("用户拒绝了钱包请求")]
    UserRejected,

    #[error("网络不匹配: 期望 chain {expected}，当前 chain {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("钱包未连接")]
    NotConnected,

    #[error("无法获取报价: {0}")]
    QuoteUnavailable(String),

    #[error("请先获取报价")]
    QuoteMissing,

    #[error("{symbol} 余额不足: 需要 {required}，可用 {available}")]
    InsufficientBalance {
        symbol: String,
        required: String,
        available: String,
    },

    #[error("无法读取余额: {0}")]
    BalanceUnavailable(String),

    #[error("授权失败: {0}")]
    ApprovalFailed(String),

    #[error("无法查询授权额度: {0}")]
    AllowanceCheckFailed(String),

    #[error("交易被用户拒绝")]
    TransactionRejected,

    #[error("交易已上链但执行失败: {0:?}")]
    TransactionReverted(TxHash),

    #[error("兑换失败: {0}")]
    SwapFailed(String),

    #[error("兑换交易回滚: {hash:?}")]
    SwapReverted { hash: TxHash },

    #[error("无效的金额: {0}")]
    InvalidAmount(String),

    #[error("滑点必须在 (0, 50] 范围内: {0}")]
    InvalidSlippage(String),

    #[error("源代币和目标代币不能相同: {0}")]
    SameToken(String),

    #[error("未知的代币: {0}")]
    UnknownToken(String),

    #[error("已有交易正在处理中")]
    ActionInFlight,
}

impl SwapError {
    /// 通知标题
    pub fn title(&self) -> &'static str {
        match self {
            SwapError::WalletUnavailable
            | SwapError::UserRejected
            | SwapError::NetworkMismatch { .. }
            | SwapError::NotConnected => "Connection Failed",
            SwapError::QuoteUnavailable(_) | SwapError::QuoteMissing => "Quote Error",
            SwapError::ApprovalFailed(_) | SwapError::TransactionReverted(_) => "Approval Failed",
            SwapError::AllowanceCheckFailed(_) => "Allowance Check Error",
            SwapError::InsufficientBalance { .. } => "Insufficient Balance",
            SwapError::BalanceUnavailable(_) => "Balance Error",
            SwapError::InvalidAmount(_)
            | SwapError::InvalidSlippage(_)
            | SwapError::SameToken(_)
            | SwapError::UnknownToken(_) => "Invalid Input",
            SwapError::TransactionRejected
            | SwapError::SwapFailed(_)
            | SwapError::SwapReverted { .. }
            | SwapError::ActionInFlight => "Swap Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SwapError::NetworkMismatch {
            expected: 97,
            actual: 1,
        };
        assert_eq!(err.to_string(), "网络不匹配: 期望 chain 97，当前 chain 1");
        assert_eq!(err.title(), "Connection Failed");
    }

    #[test]
    fn test_titles() {
        assert_eq!(SwapError::ApprovalFailed("x".into()).title(), "Approval Failed");
        assert_eq!(
            SwapError::TransactionReverted(TxHash::zero()).title(),
            "Approval Failed"
        );
        assert_eq!(SwapError::TransactionRejected.title(), "Swap Failed");
        assert_eq!(
            SwapError::SwapReverted { hash: TxHash::zero() }.title(),
            "Swap Failed"
        );
        assert_eq!(SwapError::UnknownToken("X".into()).title(), "Invalid Input");
    }
}
