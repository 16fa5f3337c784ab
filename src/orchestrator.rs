use crate::erc20::{Erc20Client, approve_calldata, format_units, parse_positive_units, parse_units, round_to_dp};
use crate::error::SwapError;
use crate::router::{PancakeRouter, RouterError, SwapCall, SwapEntryPoint};
use crate::slippage::SlippageTolerance;
use crate::types::{QuoteResult, Token};
use crate::wallet::{PendingTx, WalletError, WalletSession};
use ethers::types::{Address, TransactionReceipt, TransactionRequest, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

/// 展示用小数位
pub const DISPLAY_DECIMALS: u32 = 6;

/// 一次兑换提交所需的全部参数
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub from: Token,
    pub to: Token,
    pub input_amount: String,
    /// 报价得到的输出（最小单位），用于计算最小可接受输出
    pub quoted_output: U256,
    pub recipient: Address,
    pub slippage: SlippageTolerance,
}

/// 报价、授权与兑换的编排
pub struct SwapOrchestrator {
    wallet: Arc<WalletSession>,
    router: PancakeRouter,
    erc20: Erc20Client,
    deadline: Duration,
}

impl SwapOrchestrator {
    pub fn new(
        wallet: Arc<WalletSession>,
        router: PancakeRouter,
        erc20: Erc20Client,
        deadline: Duration,
    ) -> Self {
        Self {
            wallet,
            router,
            erc20,
            deadline,
        }
    }

    pub fn wallet(&self) -> &Arc<WalletSession> {
        &self.wallet
    }

    /// 授权对象（Router 地址）
    pub fn spender(&self) -> Address {
        self.router.router_address()
    }

    /// 只返回输出金额（完整精度）
    pub async fn get_quote(&self, from: &Token, to: &Token, input: &str) -> Result<String, SwapError> {
        Ok(self.quote(from, to, input).await?.output_amount)
    }

    /// 查询报价并计算展示字段
    #[instrument(skip(self, from, to), fields(from = %from.symbol, to = %to.symbol))]
    pub async fn quote(&self, from: &Token, to: &Token, input: &str) -> Result<QuoteResult, SwapError> {
        if from.same_as(to) {
            return Err(SwapError::SameToken(from.symbol.clone()));
        }

        let amount_in = parse_positive_units(input, from.decimals).map_err(SwapError::InvalidAmount)?;
        let path = self.router.route_path(from, to).map_err(quote_error)?;

        let amounts = self
            .router
            .get_amounts_out(amount_in, &path)
            .await
            .map_err(quote_error)?;
        let output_raw = amounts
            .last()
            .copied()
            .ok_or_else(|| SwapError::QuoteUnavailable("Router 未返回输出".to_string()))?;

        let output_amount = format_units(output_raw, to.decimals);
        let display_output =
            round_to_dp(&output_amount, DISPLAY_DECIMALS).map_err(SwapError::QuoteUnavailable)?;

        let rate = exchange_rate(input, &output_amount)?;
        let display_rate = format!(
            "1 {} = {} {}",
            from.symbol,
            format_display(rate),
            to.symbol
        );
        let price_impact_percent = price_impact(rate);

        debug!(output = %output_amount, rate = %rate, "报价完成");

        Ok(QuoteResult {
            output_amount,
            display_output,
            display_rate,
            price_impact_percent,
            output_raw,
            path,
        })
    }

    /// 当前授权额度（按代币精度格式化）
    #[instrument(skip(self, token), fields(token = %token.symbol))]
    pub async fn check_allowance(&self, owner: Address, token: &Token) -> Result<String, SwapError> {
        let allowance = self
            .erc20
            .allowance(token.address, owner, self.spender())
            .await
            .map_err(|e| SwapError::AllowanceCheckFailed(e.to_string()))?;
        Ok(format_units(allowance, token.decimals))
    }

    /// 原生代币不需要授权
    pub async fn needs_approval(
        &self,
        owner: Address,
        token: &Token,
        amount: &str,
    ) -> Result<bool, SwapError> {
        if token.is_native {
            return Ok(false);
        }
        let allowance = self.check_allowance(owner, token).await?;
        needs_approval(&allowance, amount, token.decimals)
    }

    /// 提交 approve(router, amount)
    #[instrument(skip(self, token), fields(token = %token.symbol))]
    pub async fn approve(&self, token: &Token, amount: &str) -> Result<PendingTx, SwapError> {
        let amount_raw = parse_positive_units(amount, token.decimals).map_err(SwapError::InvalidAmount)?;
        let owner = self.wallet.require_account()?;
        self.wallet.ensure_network().await?;
        let provider = self.wallet.provider()?;

        let tx = TransactionRequest::new()
            .from(owner)
            .to(token.address)
            .data(approve_calldata(self.spender(), amount_raw));

        let hash = provider.send_transaction(tx).await.map_err(|e| match e {
            WalletError::Rejected => SwapError::TransactionRejected,
            other => SwapError::ApprovalFailed(other.to_string()),
        })?;

        info!(tx_hash = ?hash, amount = %amount, "授权交易已提交");
        Ok(PendingTx::new(hash, provider))
    }

    /// 提交兑换交易
    #[instrument(skip(self, request), fields(from = %request.from.symbol, to = %request.to.symbol))]
    pub async fn swap(&self, request: &SwapRequest) -> Result<PendingTx, SwapError> {
        let account = self.wallet.require_account()?;
        if request.recipient != account {
            return Err(SwapError::SwapFailed(format!(
                "收款地址 {:?} 不是当前账户",
                request.recipient
            )));
        }
        if request.from.same_as(&request.to) {
            return Err(SwapError::SameToken(request.from.symbol.clone()));
        }

        let amount_in = parse_positive_units(&request.input_amount, request.from.decimals)
            .map_err(SwapError::InvalidAmount)?;
        if request.quoted_output.is_zero() {
            return Err(SwapError::InvalidAmount("报价输出为 0".to_string()));
        }

        self.wallet.ensure_network().await?;
        let provider = self.wallet.provider()?;

        let path = self
            .router
            .route_path(&request.from, &request.to)
            .map_err(|e| SwapError::SwapFailed(e.to_string()))?;
        let call = SwapCall {
            entry_point: SwapEntryPoint::select(&request.from, &request.to),
            amount_in,
            amount_out_min: request.slippage.minimum_output(request.quoted_output),
            path,
            to: request.recipient,
            deadline: self.deadline_timestamp(),
        };

        info!(
            entry_point = call.entry_point.name(),
            amount_in = %call.amount_in,
            amount_out_min = %call.amount_out_min,
            slippage = %request.slippage,
            "提交兑换交易"
        );

        let tx = self.router.build_swap_transaction(&call, account);
        let hash = provider.send_transaction(tx).await.map_err(|e| match e {
            WalletError::Rejected => SwapError::TransactionRejected,
            other => SwapError::SwapFailed(other.to_string()),
        })?;

        Ok(PendingTx::new(hash, provider))
    }

    /// 等待授权交易确认
    pub async fn confirm_approval(&self, pending: PendingTx) -> Result<TransactionReceipt, SwapError> {
        pending.confirm().await.map_err(|e| match e {
            WalletError::Reverted(hash) => SwapError::TransactionReverted(hash),
            WalletError::Rejected => SwapError::TransactionRejected,
            other => SwapError::ApprovalFailed(other.to_string()),
        })
    }

    /// 等待兑换交易确认
    pub async fn confirm_swap(&self, pending: PendingTx) -> Result<TransactionReceipt, SwapError> {
        pending.confirm().await.map_err(|e| match e {
            WalletError::Reverted(hash) => SwapError::SwapReverted { hash },
            WalletError::Rejected => SwapError::TransactionRejected,
            other => SwapError::SwapFailed(other.to_string()),
        })
    }

    fn deadline_timestamp(&self) -> U256 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        U256::from((now + self.deadline).as_secs())
    }
}

fn quote_error(e: RouterError) -> SwapError {
    warn!(error = %e, "报价失败");
    SwapError::QuoteUnavailable(e.to_string())
}

/// allowance < amount，按代币精度比较整数
pub fn needs_approval(allowance: &str, amount: &str, decimals: u8) -> Result<bool, SwapError> {
    let allowance = parse_units(allowance, decimals).map_err(SwapError::AllowanceCheckFailed)?;
    let amount = parse_units(amount, decimals).map_err(SwapError::InvalidAmount)?;
    Ok(allowance < amount)
}

/// output / input
pub fn exchange_rate(input: &str, output: &str) -> Result<Decimal, SwapError> {
    let input = parse_decimal(input)?;
    let output = parse_decimal(output)?;
    output
        .checked_div(input)
        .ok_or_else(|| SwapError::QuoteUnavailable("无法计算兑换比率".to_string()))
}

/// |1 - rate| * 100，仅作展示
pub fn price_impact(rate: Decimal) -> f64 {
    ((Decimal::ONE - rate).abs() * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(0.0)
}

fn format_display(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", DISPLAY_DECIMALS as usize, rounded)
}

// 超出 28 位有效数字时先截断小数部分
fn parse_decimal(value: &str) -> Result<Decimal, SwapError> {
    let value = value.trim();
    Decimal::from_str(value)
        .or_else(|_| {
            let (int_part, frac_part) = value.split_once('.').unwrap_or((value, ""));
            let keep = 27usize.saturating_sub(int_part.len()).min(frac_part.len());
            Decimal::from_str(&format!("{}.{}", int_part, &frac_part[..keep]))
        })
        .map_err(|e| SwapError::QuoteUnavailable(format!("无法解析金额 '{}': {}", value, e)))
}
