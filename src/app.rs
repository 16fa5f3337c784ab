use crate::balance::BalanceReader;
use crate::config::Config;
use crate::erc20::Erc20Client;
use crate::eth_client::{ChainReader, EthClient};
use crate::ledger::{FileLedgerStore, SwapLedger};
use crate::orchestrator::SwapOrchestrator;
use crate::price::{BnbPrice, BnbPriceClient};
use crate::router::PancakeRouter;
use crate::session::SwapSession;
use crate::slippage::SlippageTolerance;
use crate::token_registry::TokenRegistry;
use crate::wallet::{LocalKeyWallet, WalletProvider, WalletSession};
use anyhow::Context;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// 工具共享的依赖
pub struct AppContext {
    pub config: Arc<Config>,
    pub session: Arc<SwapSession>,
    pub price: Arc<BnbPriceClient>,
    pub price_feed: watch::Receiver<Option<BnbPrice>>,
    pub chain_available: bool,
}

impl AppContext {
    /// 构建全部组件并启动价格轮询
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(TokenRegistry::bsc_testnet()?);

        let eth_client = EthClient::new(
            Some(config.network.rpc_url.as_str()),
            Some(config.network.chain_id),
        )
        .await?;
        let chain_available = eth_client.is_available();
        let wallet = build_wallet(&config, &eth_client)?;
        let reader: Arc<dyn ChainReader> = Arc::new(eth_client);

        let router_address: Address = config
            .pancakeswap
            .router
            .parse()
            .with_context(|| format!("无效的 Router 地址: {}", config.pancakeswap.router))?;
        let router = PancakeRouter::new(reader.clone(), registry.clone(), router_address);

        let wallet_session = Arc::new(WalletSession::new(wallet, config.network_params()));
        let orchestrator = Arc::new(SwapOrchestrator::new(
            wallet_session,
            router,
            Erc20Client::new(reader.clone()),
            Duration::from_secs(config.trading.deadline_minutes * 60),
        ));

        let ledger = Arc::new(SwapLedger::new(Box::new(FileLedgerStore::new(
            &config.ledger.dir,
        ))));
        let slippage = SlippageTolerance::new(config.trading.default_slippage)?;

        let session = Arc::new(SwapSession::new(
            orchestrator,
            BalanceReader::new(reader, config.trading.native_gas_reserve),
            ledger,
            registry,
            slippage,
            Duration::from_millis(config.trading.quote_debounce_ms),
        )?);

        let price = Arc::new(BnbPriceClient::new(
            &config.price.api_url,
            config.price.coingecko_api_key.clone(),
            Duration::from_secs(config.price.cache_ttl),
            Duration::from_secs(config.price.http_timeout),
        )?);
        let price_feed = price
            .clone()
            .spawn_poller(Duration::from_secs(config.price.poll_interval));

        Ok(Self {
            config,
            session,
            price,
            price_feed,
            chain_available,
        })
    }

    /// 由已构建的组件组装（测试用）
    pub fn from_parts(
        config: Arc<Config>,
        session: Arc<SwapSession>,
        price: Arc<BnbPriceClient>,
        price_feed: watch::Receiver<Option<BnbPrice>>,
    ) -> Self {
        Self {
            config,
            session,
            price,
            price_feed,
            chain_available: true,
        }
    }
}

/// 配置了私钥时创建本地钱包，否则只读
fn build_wallet(
    config: &Config,
    eth_client: &EthClient,
) -> anyhow::Result<Option<Arc<dyn WalletProvider>>> {
    let Some(ref key) = config.network.private_key else {
        warn!("未配置 ETH_PRIVATE_KEY，兑换功能不可用");
        return Ok(None);
    };

    let provider = match eth_client.provider() {
        Some(provider) => (*provider).clone(),
        None => Provider::<Http>::try_from(config.network.rpc_url.as_str())
            .context("创建钱包 Provider 失败")?,
    };

    let wallet = LocalKeyWallet::new(key, provider, config.network.chain_id)?;
    info!("本地钱包已就绪");
    Ok(Some(Arc::new(wallet)))
}
