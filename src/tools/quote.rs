use super::{Notification, SessionView, json_result, swap_error_result};
use crate::app::AppContext;
use crate::erc20::format_units;
use crate::session::QuoteOutcome;
use crate::slippage::SlippageWarning;
use crate::types::SwapSide;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 报价请求参数
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GetQuoteRequest {
    /// 输入金额（如 "1.5"），"max" 表示使用最大可用余额
    pub amount: String,

    /// 可选：源代币符号，不提供则沿用当前选择
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// 可选：目标代币符号，不提供则沿用当前选择
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// 报价响应
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub state: SessionView,
    /// 按当前滑点计算的最少可得数量
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_received: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<String>>,
    /// 结果被更新的输入取代
    pub superseded: bool,
    /// 授权额度查询失败时的提示（不影响报价）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowance_warning: Option<Notification>,
}

/// 设置输入并刷新报价和授权状态
pub async fn get_quote(ctx: &AppContext, request: GetQuoteRequest) -> Result<CallToolResult, McpError> {
    let session = &ctx.session;
    info!(amount = %request.amount, from = ?request.from, to = ?request.to, "收到 get_quote 请求");

    for (side, symbol) in [(SwapSide::From, &request.from), (SwapSide::To, &request.to)] {
        if let Some(symbol) = symbol {
            if let Err(e) = session.select_token(side, symbol) {
                return swap_error_result(&e);
            }
        }
    }

    if request.amount.trim().eq_ignore_ascii_case("max") {
        if let Err(e) = session.use_max_amount().await {
            return swap_error_result(&e);
        }
    } else {
        session.set_from_amount(&request.amount);
    }

    let outcome = match session.refresh_quote().await {
        Ok(outcome) => outcome,
        Err(e) => return swap_error_result(&e),
    };

    let allowance_warning = match session.refresh_allowance().await {
        Ok(_) => None,
        Err(e) => Some(Notification::from(&e)),
    };

    let state = session.state();
    let (minimum_received, route, superseded) = match outcome {
        QuoteOutcome::Applied(quote) => {
            let minimum = state.slippage.minimum_output(quote.output_raw);
            (
                Some(format_units(minimum, state.to_token.decimals)),
                Some(quote.path.iter().map(|a| format!("{:?}", a)).collect()),
                false,
            )
        }
        QuoteOutcome::Superseded => (None, None, true),
        QuoteOutcome::Cleared => (None, None, false),
    };

    debug!(to_amount = %state.to_amount, superseded = superseded, "get_quote 完成");

    json_result(&QuoteResponse {
        state: SessionView::from(&state),
        minimum_received,
        route,
        superseded,
        allowance_warning,
    })
}

/// 设置滑点请求参数
#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SetSlippageRequest {
    /// 滑点百分比，范围 (0, 50]，预设 0.1 / 0.5 / 1 / 3
    pub percent: String,
}

/// 滑点设置响应
#[derive(Debug, Serialize)]
pub struct SlippageResponse {
    pub slippage: String,
    pub is_preset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<SlippageWarning>,
}

pub fn set_slippage(ctx: &AppContext, request: SetSlippageRequest) -> Result<CallToolResult, McpError> {
    match ctx.session.set_slippage(&request.percent) {
        Ok((slippage, warning)) => json_result(&SlippageResponse {
            slippage: slippage.to_string(),
            is_preset: slippage.is_preset(),
            warning,
        }),
        Err(e) => swap_error_result(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::QuoteChain;
    use crate::tools::tests::{connected_context, json_of, test_context};

    #[test]
    fn test_quote_request_deserialization() {
        let request: GetQuoteRequest = serde_json::from_str(r#"{"amount": "1.5"}"#).unwrap();
        assert_eq!(request.amount, "1.5");
        assert!(request.from.is_none());
        assert!(request.to.is_none());
    }

    #[tokio::test]
    async fn test_get_quote() {
        let ctx = test_context(QuoteChain::new(25, 2), None);
        let request = GetQuoteRequest {
            amount: "1".to_string(),
            from: None,
            to: None,
        };

        let json = json_of(&get_quote(&ctx, request).await.unwrap());
        assert_eq!(json["to_amount"], "12.500000");
        assert_eq!(json["rate"], "1 BNB = 12.500000 CAKE");
        assert_eq!(json["minimum_received"], "12.125");
        assert_eq!(json["phase"], "quote_ready");
        assert_eq!(json["superseded"], false);
        assert_eq!(json["route"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_quote_with_token_selection() {
        let ctx = connected_context(QuoteChain::new(1, 2));
        ctx.session.orchestrator().wallet().connect().await.unwrap();

        let request = GetQuoteRequest {
            amount: "4".to_string(),
            from: Some("CAKE".to_string()),
            to: Some("USDT".to_string()),
        };
        let json = json_of(&get_quote(&ctx, request).await.unwrap());
        assert_eq!(json["from_token"], "CAKE");
        assert_eq!(json["to_token"], "USDT");
        assert_eq!(json["to_amount"], "2.000000");
        assert_eq!(json["needs_approval"], true);
    }

    #[tokio::test]
    async fn test_get_quote_invalid_amount() {
        let ctx = test_context(QuoteChain::new(1, 1), None);
        let request = GetQuoteRequest {
            amount: "-3".to_string(),
            from: None,
            to: None,
        };
        let result = get_quote(&ctx, request).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(json_of(&result)["title"], "Invalid Input");
    }

    #[tokio::test]
    async fn test_get_quote_router_failure() {
        let mut chain = QuoteChain::new(1, 1);
        chain.fail_quotes = true;
        let ctx = test_context(chain, None);
        let request = GetQuoteRequest {
            amount: "1".to_string(),
            from: None,
            to: None,
        };
        let result = get_quote(&ctx, request).await.unwrap();
        assert_eq!(json_of(&result)["title"], "Quote Error");
    }

    #[test]
    fn test_set_slippage() {
        let ctx = test_context(QuoteChain::new(1, 1), None);
        let json = json_of(
            &set_slippage(
                &ctx,
                SetSlippageRequest {
                    percent: "0.1".to_string(),
                },
            )
            .unwrap(),
        );
        assert_eq!(json["slippage"], "0.1%");
        assert_eq!(json["is_preset"], true);
        assert_eq!(json["warning"], "low");

        let result = set_slippage(
            &ctx,
            SetSlippageRequest {
                percent: "75".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
