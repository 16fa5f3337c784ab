use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// BSC 客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("提供者错误: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("RPC 节点不可用")]
    NoProvider,

    #[error("调用被回滚: {0}")]
    Reverted(String),
}

/// 只读链调用接口
///
/// Router 报价、ERC20 查询、余额读取都经由这里，测试中用内存实现替换。
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// eth_call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, EthClientError>;

    /// 原生代币余额（wei）
    async fn native_balance(&self, account: Address) -> Result<U256, EthClientError>;

    /// 节点的 chain id
    async fn chain_id(&self) -> Result<u64, EthClientError>;
}

/// BSC JSON-RPC 客户端
#[derive(Clone)]
pub struct EthClient {
    provider: Option<Arc<Provider<Http>>>,
}

impl EthClient {
    /// 创建新的客户端并测试连接
    ///
    /// 连接失败时不会报错，客户端处于不可用状态，后续调用返回 `NoProvider`。
    #[instrument(skip(rpc_url))]
    pub async fn new(rpc_url: Option<&str>, network_id: Option<u64>) -> anyhow::Result<Self> {
        let provider = if let Some(url) = rpc_url {
            info!(rpc_url = %url, "初始化 BSC 客户端");

            match Provider::<Http>::try_from(url) {
                Ok(provider) => match provider.get_chainid().await {
                    Ok(chain_id) => {
                        let chain_id_u64 = chain_id.as_u64();
                        if let Some(expected) = network_id {
                            if expected != chain_id_u64 {
                                warn!(
                                    expected = expected,
                                    actual = chain_id_u64,
                                    "提供的 Chain ID 与节点返回值不一致"
                                );
                            }
                        }

                        info!(chain_id = %chain_id_u64, "成功连接到 BSC 节点");
                        Some(Arc::new(provider))
                    }
                    Err(e) => {
                        warn!(error = %e, "无法连接到 BSC 节点，报价功能不可用");
                        None
                    }
                },
                Err(e) => {
                    error!(error = %e, "创建 Provider 失败");
                    None
                }
            }
        } else {
            debug!("未配置 RPC URL，客户端将不可用");
            None
        };

        Ok(Self { provider })
    }

    /// 检查客户端是否可用
    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// 底层 Provider（供钱包签名中间件复用）
    pub fn provider(&self) -> Option<Arc<Provider<Http>>> {
        self.provider.clone()
    }

    fn require_provider(&self) -> Result<&Arc<Provider<Http>>, EthClientError> {
        self.provider.as_ref().ok_or(EthClientError::NoProvider)
    }
}

#[async_trait]
impl ChainReader for EthClient {
    #[instrument(skip(self, data))]
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, EthClientError> {
        let provider = self.require_provider()?;

        let tx = Eip1559TransactionRequest::new().to(to).data(data);

        provider.call(&tx.into(), None).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("execution reverted") || message.contains("revert") {
                EthClientError::Reverted(message)
            } else {
                EthClientError::ProviderError(e)
            }
        })
    }

    #[instrument(skip(self))]
    async fn native_balance(&self, account: Address) -> Result<U256, EthClientError> {
        let provider = self.require_provider()?;

        let balance_wei = provider.get_balance(account, None).await?;

        debug!(account = %account, balance_wei = %balance_wei, "成功查询余额");

        Ok(balance_wei)
    }

    #[instrument(skip(self))]
    async fn chain_id(&self) -> Result<u64, EthClientError> {
        let provider = self.require_provider()?;

        let chain_id = provider.get_chainid().await?;

        debug!(chain_id = %chain_id, "获取链 ID");

        Ok(chain_id.as_u64())
    }
}
