use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, instrument, warn};

/// 价格源错误类型
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("价格 API 返回状态码 {0}")]
    Status(u16),

    #[error("响应中缺少 binancecoin 价格")]
    MissingPrice,
}

/// BNB/USD 现价，仅作展示
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BnbPrice {
    pub usd: f64,
    /// 24 小时涨跌幅（百分比）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_24h_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    binancecoin: Option<BnbPrice>,
}

/// 解析 CoinGecko simple/price 响应
pub fn parse_price_response(body: &str) -> Result<BnbPrice, PriceError> {
    let response: SimplePriceResponse =
        serde_json::from_str(body).map_err(|_| PriceError::MissingPrice)?;
    response.binancecoin.ok_or(PriceError::MissingPrice)
}

struct CachedPrice {
    price: BnbPrice,
    fetched_at: Instant,
}

/// BNB 价格客户端（带缓存）
pub struct BnbPriceClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedPrice>>,
}

impl BnbPriceClient {
    pub fn new(
        api_url: &str,
        api_key: Option<String>,
        cache_ttl: Duration,
        http_timeout: Duration,
    ) -> Result<Self, PriceError> {
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key,
            cache_ttl,
            cache: RwLock::new(None),
        })
    }

    /// 缓存中仍然有效的价格
    pub async fn cached(&self) -> Option<BnbPrice> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.cache_ttl)
            .map(|c| c.price)
    }

    /// 获取价格，缓存有效时不发请求
    #[instrument(skip(self))]
    pub async fn price(&self) -> Result<BnbPrice, PriceError> {
        if let Some(price) = self.cached().await {
            debug!(usd = price.usd, "使用缓存的 BNB 价格");
            return Ok(price);
        }

        self.refresh().await
    }

    /// 无视缓存直接请求，并写回缓存
    pub async fn refresh(&self) -> Result<BnbPrice, PriceError> {
        let price = self.fetch().await?;
        *self.cache.write().await = Some(CachedPrice {
            price,
            fetched_at: Instant::now(),
        });
        Ok(price)
    }

    async fn fetch(&self) -> Result<BnbPrice, PriceError> {
        let mut request = self.http.get(&self.api_url);
        if let Some(ref key) = self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let price = parse_price_response(&body)?;

        debug!(usd = price.usd, change = ?price.usd_24h_change, "获取 BNB 价格");
        Ok(price)
    }

    /// 后台轮询，最新价格通过 watch 通道发布
    ///
    /// 每个周期都请求一次，不经过缓存；请求失败只记录日志，通道保留上一次的值。
    pub fn spawn_poller(self: Arc<Self>, interval: Duration) -> watch::Receiver<Option<BnbPrice>> {
        let (tx, rx) = watch::channel(None);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            info!(interval_secs = interval.as_secs(), "BNB 价格轮询已启动");

            loop {
                ticker.tick().await;

                match self.refresh().await {
                    Ok(price) => {
                        if tx.send(Some(price)).is_err() {
                            debug!("价格接收端已关闭，停止轮询");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "获取 BNB 价格失败"),
                }
            }
        });

        rx
    }
}
