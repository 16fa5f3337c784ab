use crate::balance::BalanceReader;
use crate::erc20::parse_positive_units;
use crate::error::SwapError;
use crate::ledger::{SwapLedger, SwapRecord};
use crate::orchestrator::{SwapOrchestrator, SwapRequest};
use crate::slippage::{SlippageTolerance, SlippageWarning};
use crate::token_registry::TokenRegistry;
use crate::types::{QuoteResult, SwapPhase, SwapSide, Token};
use ethers::types::TxHash;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

/// 会话中的兑换表单状态
#[derive(Debug, Clone, Serialize)]
pub struct SwapState {
    pub from_token: Token,
    pub to_token: Token,
    pub from_amount: String,
    /// 报价输出（6 位小数）
    pub to_amount: String,
    pub loading: bool,
    pub quote: Option<QuoteResult>,
    pub needs_approval: bool,
    pub slippage: SlippageTolerance,
    pub phase: SwapPhase,
}

impl SwapState {
    fn input(&self) -> QuoteInput {
        QuoteInput {
            from: self.from_token.symbol.clone(),
            to: self.to_token.symbol.clone(),
            amount: self.from_amount.clone(),
        }
    }

    fn clear_quote(&mut self) {
        self.to_amount.clear();
        self.quote = None;
        self.loading = false;
        if self.phase != SwapPhase::Confirmed {
            self.phase = SwapPhase::Idle;
        }
    }
}

/// 报价请求的输入标识，结果返回时必须仍然一致
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuoteInput {
    from: String,
    to: String,
    amount: String,
}

/// 一次报价刷新的结果
#[derive(Debug, Clone)]
pub enum QuoteOutcome {
    Applied(QuoteResult),
    /// 输入已变化，结果被丢弃
    Superseded,
    /// 金额为空或为 0，报价被清空
    Cleared,
}

/// 兑换完成后的回执
#[derive(Debug, Clone, Serialize)]
pub struct SwapReceipt {
    pub record: SwapRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_hash: Option<TxHash>,
}

/// 提交期间置位，离开作用域时复位
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 兑换会话
pub struct SwapSession {
    orchestrator: Arc<SwapOrchestrator>,
    balances: BalanceReader,
    ledger: Arc<SwapLedger>,
    registry: Arc<TokenRegistry>,
    debounce: Duration,
    state: Mutex<SwapState>,
    quote_generation: AtomicU64,
    allowance_generation: AtomicU64,
    busy: AtomicBool,
}

impl SwapSession {
    pub fn new(
        orchestrator: Arc<SwapOrchestrator>,
        balances: BalanceReader,
        ledger: Arc<SwapLedger>,
        registry: Arc<TokenRegistry>,
        slippage: SlippageTolerance,
        debounce: Duration,
    ) -> Result<Self, SwapError> {
        let tradeable = registry.tradeable();
        let from_token = tradeable
            .first()
            .cloned()
            .ok_or_else(|| SwapError::UnknownToken("BNB".to_string()))?;
        let to_token = tradeable
            .get(1)
            .cloned()
            .ok_or_else(|| SwapError::UnknownToken("CAKE".to_string()))?;

        Ok(Self {
            orchestrator,
            balances,
            ledger,
            registry,
            debounce,
            state: Mutex::new(SwapState {
                from_token,
                to_token,
                from_amount: String::new(),
                to_amount: String::new(),
                loading: false,
                quote: None,
                needs_approval: false,
                slippage,
                phase: SwapPhase::Idle,
            }),
            quote_generation: AtomicU64::new(0),
            allowance_generation: AtomicU64::new(0),
            busy: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SwapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SwapState {
        self.lock().clone()
    }

    pub fn orchestrator(&self) -> &Arc<SwapOrchestrator> {
        &self.orchestrator
    }

    pub fn ledger(&self) -> &Arc<SwapLedger> {
        &self.ledger
    }

    pub fn balances(&self) -> &BalanceReader {
        &self.balances
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    /// 选择代币；与另一侧相同时两侧互换
    pub fn select_token(&self, side: SwapSide, symbol: &str) -> Result<SwapState, SwapError> {
        let token = self
            .registry
            .tradeable()
            .into_iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| SwapError::UnknownToken(symbol.to_string()))?;

        let mut state = self.lock();
        match side {
            SwapSide::From => {
                if token.same_as(&state.to_token) {
                    state.to_token = state.from_token.clone();
                }
                state.from_token = token;
            }
            SwapSide::To => {
                if token.same_as(&state.from_token) {
                    state.from_token = state.to_token.clone();
                }
                state.to_token = token;
            }
        }
        state.clear_quote();
        state.needs_approval = false;

        debug!(from = %state.from_token.symbol, to = %state.to_token.symbol, "选择代币");
        Ok(state.clone())
    }

    /// 交换两侧代币和金额
    pub fn flip(&self) -> SwapState {
        let mut state = self.lock();
        let state = &mut *state;
        std::mem::swap(&mut state.from_token, &mut state.to_token);
        std::mem::swap(&mut state.from_amount, &mut state.to_amount);
        let to_amount = std::mem::take(&mut state.to_amount);
        state.clear_quote();
        state.to_amount = to_amount;
        state.needs_approval = false;
        state.clone()
    }

    pub fn set_from_amount(&self, amount: &str) {
        let amount = amount.trim();
        let mut state = self.lock();
        if state.from_amount != amount {
            state.from_amount = amount.to_string();
            state.quote = None;
            state.to_amount.clear();
        }
    }

    pub fn set_slippage(&self, percent: &str) -> Result<(SlippageTolerance, Option<SlippageWarning>), SwapError> {
        let slippage = SlippageTolerance::parse(percent)?;
        self.lock().slippage = slippage;
        info!(slippage = %slippage, "滑点已更新");
        Ok((slippage, slippage.warning()))
    }

    /// "最大" 金额写入输入框
    pub async fn use_max_amount(&self) -> Result<String, SwapError> {
        let account = self.orchestrator.wallet().require_account()?;
        let from = self.lock().from_token.clone();
        let max = self
            .balances
            .max_input(account, &from)
            .await
            .map_err(|e| SwapError::BalanceUnavailable(e.to_string()))?;
        self.set_from_amount(&max);
        Ok(max)
    }

    /// 防抖后按当前输入刷新报价
    ///
    /// 结果返回时输入已变化（或有更新的请求）则丢弃。
    #[instrument(skip(self))]
    pub async fn refresh_quote(&self) -> Result<QuoteOutcome, SwapError> {
        let generation = self.quote_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (input, from, to) = {
            let mut state = self.lock();
            if is_empty_amount(&state.from_amount) {
                state.clear_quote();
                return Ok(QuoteOutcome::Cleared);
            }
            state.loading = true;
            state.phase = SwapPhase::QuotePending;
            (state.input(), state.from_token.clone(), state.to_token.clone())
        };

        tokio::time::sleep(self.debounce).await;
        if self.quote_generation.load(Ordering::SeqCst) != generation {
            debug!(generation = generation, "报价请求已被更新的输入取代");
            return Ok(QuoteOutcome::Superseded);
        }

        let result = self.orchestrator.quote(&from, &to, &input.amount).await;

        let mut state = self.lock();
        if self.quote_generation.load(Ordering::SeqCst) != generation || state.input() != input {
            debug!(generation = generation, "丢弃过期的报价结果");
            return Ok(QuoteOutcome::Superseded);
        }

        state.loading = false;
        match result {
            Ok(quote) => {
                state.to_amount = quote.display_output.clone();
                state.quote = Some(quote.clone());
                state.phase = SwapPhase::QuoteReady;
                Ok(QuoteOutcome::Applied(quote))
            }
            Err(e) => {
                warn!(error = %e, "报价失败");
                state.clear_quote();
                Err(e)
            }
        }
    }

    /// 按当前输入刷新是否需要授权，过期结果返回 None
    #[instrument(skip(self))]
    pub async fn refresh_allowance(&self) -> Result<Option<bool>, SwapError> {
        let generation = self.allowance_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(owner) = self.orchestrator.wallet().account() else {
            self.lock().needs_approval = false;
            return Ok(Some(false));
        };

        let (input, from) = {
            let mut state = self.lock();
            if state.from_token.is_native || is_empty_amount(&state.from_amount) {
                state.needs_approval = false;
                return Ok(Some(false));
            }
            (state.input(), state.from_token.clone())
        };

        let result = self
            .orchestrator
            .needs_approval(owner, &from, &input.amount)
            .await;

        let mut state = self.lock();
        if self.allowance_generation.load(Ordering::SeqCst) != generation || state.input() != input {
            debug!(generation = generation, "丢弃过期的授权查询结果");
            return Ok(None);
        }

        let needs = result?;
        state.needs_approval = needs;
        Ok(Some(needs))
    }

    /// 主操作：按需授权，然后兑换
    ///
    /// 同一时间只允许一次提交；任何错误都会让状态回到 Idle。
    #[instrument(skip(self))]
    pub async fn execute(&self) -> Result<SwapReceipt, SwapError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(SwapError::ActionInFlight);
        }
        let _guard = BusyGuard(&self.busy);

        let result = self.run_swap().await;
        if let Err(ref e) = result {
            warn!(error = %e, "兑换未完成");
            let mut state = self.lock();
            state.phase = SwapPhase::Idle;
            state.loading = false;
        }
        result
    }

    fn set_phase(&self, phase: SwapPhase) {
        self.lock().phase = phase;
        debug!(phase = ?phase, "兑换状态");
    }

    async fn run_swap(&self) -> Result<SwapReceipt, SwapError> {
        let account = self.orchestrator.wallet().require_account()?;
        let state = self.state();
        let quote = state.quote.clone().ok_or(SwapError::QuoteMissing)?;
        if state.to_amount.is_empty() {
            return Err(SwapError::QuoteMissing);
        }
        let from = state.from_token.clone();
        let to = state.to_token.clone();
        let amount = state.from_amount.clone();

        // 提交前在本地检查余额
        let required = parse_positive_units(&amount, from.decimals).map_err(SwapError::InvalidAmount)?;
        let balance = self
            .balances
            .balance(account, &from)
            .await
            .map_err(|e| SwapError::BalanceUnavailable(e.to_string()))?;
        if required > balance.raw {
            return Err(SwapError::InsufficientBalance {
                symbol: from.symbol.clone(),
                required: amount,
                available: balance.formatted,
            });
        }

        self.set_phase(SwapPhase::AllowanceCheck);
        let needs_approval = self
            .orchestrator
            .needs_approval(account, &from, &amount)
            .await?;

        let approval_hash = if needs_approval {
            self.set_phase(SwapPhase::ApprovalPending);
            let pending = self
                .orchestrator
                .approve(&from, &amount)
                .await
                .map_err(|e| match e {
                    SwapError::TransactionRejected => {
                        SwapError::ApprovalFailed("交易被用户拒绝".to_string())
                    }
                    other => other,
                })?;
            let hash = pending.hash;
            self.orchestrator.confirm_approval(pending).await?;

            info!(tx_hash = ?hash, token = %from.symbol, "授权已确认");
            {
                let mut state = self.lock();
                state.phase = SwapPhase::Approved;
                state.needs_approval = false;
            }
            Some(hash)
        } else {
            None
        };

        self.set_phase(SwapPhase::SwapPending);
        let request = SwapRequest {
            from: from.clone(),
            to: to.clone(),
            input_amount: amount.clone(),
            quoted_output: quote.output_raw,
            recipient: account,
            slippage: state.slippage,
        };
        let pending = self.orchestrator.swap(&request).await?;
        let receipt = self.orchestrator.confirm_swap(pending).await?;

        let hash = format!("{:?}", receipt.transaction_hash);
        let record = SwapRecord {
            transaction_hash: hash.clone(),
            from_symbol: from.symbol.clone(),
            to_symbol: to.symbol.clone(),
            from_amount: amount,
            to_amount: state.to_amount.clone(),
            timestamp_millis: now_millis(),
            explorer_url: self.orchestrator.wallet().network().explorer_tx_url(&hash),
        };
        self.ledger.append(record.clone());

        {
            let mut state = self.lock();
            state.from_amount.clear();
            state.to_amount.clear();
            state.quote = None;
            state.needs_approval = false;
            state.loading = false;
            state.phase = SwapPhase::Confirmed;
        }

        info!(tx_hash = %hash, from = %record.from_symbol, to = %record.to_symbol, "兑换成功");
        Ok(SwapReceipt {
            record,
            approval_hash,
        })
    }
}

fn is_empty_amount(amount: &str) -> bool {
    let amount = amount.trim();
    amount.is_empty() || Decimal::from_str(amount).is_ok_and(|d| d.is_zero())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
