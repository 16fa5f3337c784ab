use super::{Notification, json_result, notification_result};
use crate::app::AppContext;
use crate::price::BnbPrice;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

/// BNB 价格响应
#[derive(Debug, Serialize)]
pub struct BnbPriceResponse {
    pub symbol: &'static str,
    pub price_usd: String,
    /// 24 小时涨跌幅（百分比，保留两位小数）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<String>,
    pub data_source: &'static str,
}

impl From<BnbPrice> for BnbPriceResponse {
    fn from(price: BnbPrice) -> Self {
        Self {
            symbol: "BNB",
            price_usd: format!("{:.2}", price.usd),
            change_24h: price.usd_24h_change.map(|c| format!("{:+.2}%", c)),
            data_source: "CoinGecko",
        }
    }
}

/// 优先使用轮询得到的价格，没有时直接请求一次
pub async fn get_bnb_price(ctx: &AppContext) -> Result<CallToolResult, McpError> {
    let polled = *ctx.price_feed.borrow();

    let price = match polled {
        Some(price) => price,
        None => match ctx.price.price().await {
            Ok(price) => price,
            Err(e) => {
                return notification_result(Notification::new("Price Error", e.to_string()));
            }
        },
    };

    json_result(&BnbPriceResponse::from(price))
}
