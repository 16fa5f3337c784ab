use crate::error::SwapError;
use crate::router::revert_reason_from_message;
use crate::types::NetworkParams;
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, TransactionRequest, TxHash, U64};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 钱包错误类型
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("钱包不可用")]
    Unavailable,

    #[error("用户拒绝了请求")]
    Rejected,

    #[error("钱包未识别的网络: {0}")]
    UnrecognizedChain(u64),

    #[error("无效的私钥: {0}")]
    InvalidKey(String),

    #[error("提供者错误: {0}")]
    Provider(String),

    #[error("交易已回滚: {0:?}")]
    Reverted(TxHash),

    #[error("交易未被打包: {0:?}")]
    Dropped(TxHash),
}

/// 钱包提供者接口
///
/// 对应浏览器注入的钱包：请求账户、切换/添加网络、签名并发送交易。
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    async fn add_chain(&self, network: &NetworkParams) -> Result<(), WalletError>;

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, WalletError>;

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, WalletError>;
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// 本地私钥钱包
pub struct LocalKeyWallet {
    wallet: LocalWallet,
    client: RwLock<Arc<SignerClient>>,
}

impl LocalKeyWallet {
    /// 由私钥和 RPC Provider 创建
    pub fn new(
        private_key: &str,
        provider: Provider<Http>,
        chain_id: u64,
    ) -> Result<Self, WalletError> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?
            .with_chain_id(chain_id);

        let client = SignerMiddleware::new(provider.interval(Duration::from_secs(2)), wallet.clone());

        info!(address = %wallet.address(), chain_id = chain_id, "本地钱包已加载");

        Ok(Self {
            wallet,
            client: RwLock::new(Arc::new(client)),
        })
    }

    fn client(&self) -> Arc<SignerClient> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.wallet.address()])
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let chain_id = self
            .client()
            .get_chainid()
            .await
            .map_err(|e| WalletError::Provider(e.to_string()))?;
        Ok(chain_id.as_u64())
    }

    /// 本地钱包无法改变节点所在的链，只能确认当前链
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        let current = self.chain_id().await?;
        if current == chain_id {
            Ok(())
        } else {
            Err(WalletError::UnrecognizedChain(chain_id))
        }
    }

    /// 改为连接网络参数中的 RPC 节点
    #[instrument(skip(self))]
    async fn add_chain(&self, network: &NetworkParams) -> Result<(), WalletError> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .map_err(|e| WalletError::Provider(e.to_string()))?;

        let actual = provider
            .get_chainid()
            .await
            .map_err(|e| WalletError::Provider(e.to_string()))?
            .as_u64();
        if actual != network.chain_id {
            return Err(WalletError::UnrecognizedChain(network.chain_id));
        }

        let wallet = self.wallet.clone().with_chain_id(network.chain_id);
        let client = SignerMiddleware::new(provider.interval(Duration::from_secs(2)), wallet);
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(client);

        info!(chain = %network.chain_name, chain_id = network.chain_id, "已切换到新的 RPC 节点");
        Ok(())
    }

    #[instrument(skip(self, tx))]
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, WalletError> {
        let client = self.client();
        let pending = client.send_transaction(tx, None).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("user rejected") || message.contains("denied") {
                WalletError::Rejected
            } else {
                WalletError::Provider(revert_reason_from_message(&message).unwrap_or(message))
            }
        })?;

        let hash = pending.tx_hash();
        debug!(tx_hash = ?hash, "交易已提交");
        Ok(hash)
    }

    #[instrument(skip(self))]
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, WalletError> {
        let client = self.client();
        let receipt = PendingTransaction::new(hash, client.provider())
            .await
            .map_err(|e| WalletError::Provider(e.to_string()))?;

        receipt.ok_or(WalletError::Dropped(hash))
    }
}

/// 已提交、等待确认的交易
pub struct PendingTx {
    pub hash: TxHash,
    wallet: Arc<dyn WalletProvider>,
}

impl PendingTx {
    pub fn new(hash: TxHash, wallet: Arc<dyn WalletProvider>) -> Self {
        Self { hash, wallet }
    }

    /// 等待交易被打包；status 为 0 视为回滚
    pub async fn confirm(self) -> Result<TransactionReceipt, WalletError> {
        let receipt = self.wallet.wait_for_receipt(self.hash).await?;
        if receipt.status == Some(U64::zero()) {
            return Err(WalletError::Reverted(self.hash));
        }
        Ok(receipt)
    }
}

/// 钱包会话：当前连接的账户
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    network: NetworkParams,
    account: RwLock<Option<Address>>,
}

impl WalletSession {
    pub fn new(provider: Option<Arc<dyn WalletProvider>>, network: NetworkParams) -> Self {
        Self {
            provider,
            network,
            account: RwLock::new(None),
        }
    }

    /// 当前连接的账户
    pub fn account(&self) -> Option<Address> {
        *self.account.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn require_account(&self) -> Result<Address, SwapError> {
        self.account().ok_or(SwapError::NotConnected)
    }

    pub fn provider(&self) -> Result<Arc<dyn WalletProvider>, SwapError> {
        self.provider.clone().ok_or(SwapError::WalletUnavailable)
    }

    pub fn network(&self) -> &NetworkParams {
        &self.network
    }

    /// 请求账户并确保处于目标网络
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<Address, SwapError> {
        let provider = self.provider()?;

        let accounts = provider.request_accounts().await.map_err(|e| match e {
            WalletError::Rejected => SwapError::UserRejected,
            WalletError::Unavailable => SwapError::WalletUnavailable,
            other => SwapError::SwapFailed(other.to_string()),
        })?;
        let account = accounts.first().copied().ok_or(SwapError::NotConnected)?;

        self.ensure_network().await?;

        *self.account.write().unwrap_or_else(PoisonError::into_inner) = Some(account);
        info!(account = %account, "钱包已连接");
        Ok(account)
    }

    /// 确保钱包处于目标网络：先切换，钱包不认识该网络时再添加
    #[instrument(skip(self))]
    pub async fn ensure_network(&self) -> Result<(), SwapError> {
        let provider = self.provider()?;
        let expected = self.network.chain_id;

        let actual = provider
            .chain_id()
            .await
            .map_err(|e| SwapError::SwapFailed(e.to_string()))?;
        if actual == expected {
            return Ok(());
        }

        warn!(expected = expected, actual = actual, "网络不匹配，请求切换网络");

        match provider.switch_chain(expected).await {
            Ok(()) => Ok(()),
            Err(WalletError::UnrecognizedChain(_)) => {
                provider.add_chain(&self.network).await.map_err(|e| {
                    warn!(error = %e, chain = %self.network.hex_chain_id(), "添加网络失败");
                    SwapError::NetworkMismatch { expected, actual }
                })
            }
            Err(WalletError::Rejected) => Err(SwapError::UserRejected),
            Err(e) => {
                warn!(error = %e, "切换网络失败");
                Err(SwapError::NetworkMismatch { expected, actual })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// 内存钱包：记录发送的交易，按配置拒绝或回滚
    pub(crate) struct MockWallet {
        pub account: Address,
        pub chain_id: AtomicU64,
        pub known_chains: Mutex<Vec<u64>>,
        pub reject_accounts: bool,
        pub reject_selector: Option<[u8; 4]>,
        pub revert_selector: Option<[u8; 4]>,
        pub sent: Mutex<Vec<TransactionRequest>>,
        pub receipts_waited: Mutex<Vec<TxHash>>,
        pub events: Arc<Mutex<Vec<String>>>,
    }

    impl MockWallet {
        pub(crate) fn new(account: Address, chain_id: u64) -> Self {
            Self {
                account,
                chain_id: AtomicU64::new(chain_id),
                known_chains: Mutex::new(vec![chain_id]),
                reject_accounts: false,
                reject_selector: None,
                revert_selector: None,
                sent: Mutex::new(Vec::new()),
                receipts_waited: Mutex::new(Vec::new()),
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn selector_of(tx: &TransactionRequest) -> Option<[u8; 4]> {
            tx.data
                .as_ref()
                .filter(|d| d.len() >= 4)
                .map(|d| [d[0], d[1], d[2], d[3]])
        }

        pub(crate) fn sent_selectors(&self) -> Vec<[u8; 4]> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(Self::selector_of)
                .collect()
        }
    }

    #[async_trait]
    impl WalletProvider for MockWallet {
        async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
            if self.reject_accounts {
                return Err(WalletError::Rejected);
            }
            Ok(vec![self.account])
        }

        async fn chain_id(&self) -> Result<u64, WalletError> {
            Ok(self.chain_id.load(Ordering::SeqCst))
        }

        async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
            if self.known_chains.lock().unwrap().contains(&chain_id) {
                self.chain_id.store(chain_id, Ordering::SeqCst);
                Ok(())
            } else {
                Err(WalletError::UnrecognizedChain(chain_id))
            }
        }

        async fn add_chain(&self, network: &NetworkParams) -> Result<(), WalletError> {
            self.known_chains.lock().unwrap().push(network.chain_id);
            self.chain_id.store(network.chain_id, Ordering::SeqCst);
            Ok(())
        }

        async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, WalletError> {
            let selector = Self::selector_of(&tx);
            if selector.is_some() && selector == self.reject_selector {
                self.events.lock().unwrap().push("rejected".to_string());
                return Err(WalletError::Rejected);
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(tx);
            let hash = TxHash::from_low_u64_be(sent.len() as u64);
            self.events.lock().unwrap().push(format!("send:{:?}", hash));
            Ok(hash)
        }

        async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt, WalletError> {
            self.receipts_waited.lock().unwrap().push(hash);
            self.events.lock().unwrap().push(format!("mined:{:?}", hash));

            let index = hash.to_low_u64_be() as usize - 1;
            let selector = self
                .sent
                .lock()
                .unwrap()
                .get(index)
                .and_then(Self::selector_of);
            let status = if selector.is_some() && selector == self.revert_selector {
                0u64
            } else {
                1u64
            };

            Ok(TransactionReceipt {
                transaction_hash: hash,
                status: Some(U64::from(status)),
                ..Default::default()
            })
        }
    }

    fn network() -> NetworkParams {
        NetworkParams {
            chain_id: 97,
            chain_name: "BSC Testnet".to_string(),
            native_symbol: "BNB".to_string(),
            native_decimals: 18,
            rpc_url: "https://rpc.invalid".to_string(),
            explorer_url: "https://testnet.bscscan.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let session = WalletSession::new(None, network());
        assert!(matches!(session.connect().await, Err(SwapError::WalletUnavailable)));
        assert!(session.account().is_none());
    }

    #[tokio::test]
    async fn test_connect_sets_account() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(7), 97));
        let session = WalletSession::new(Some(wallet), network());
        assert!(matches!(session.require_account(), Err(SwapError::NotConnected)));

        let account = session.connect().await.unwrap();
        assert_eq!(account, Address::repeat_byte(7));
        assert_eq!(session.account(), Some(account));
        assert_eq!(session.require_account().unwrap(), account);
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let mut wallet = MockWallet::new(Address::repeat_byte(7), 97);
        wallet.reject_accounts = true;
        let session = WalletSession::new(Some(Arc::new(wallet)), network());
        assert!(matches!(session.connect().await, Err(SwapError::UserRejected)));
    }

    #[tokio::test]
    async fn test_ensure_network_adds_unknown_chain() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(7), 1));
        let session = WalletSession::new(Some(wallet.clone()), network());

        session.ensure_network().await.unwrap();
        assert_eq!(wallet.chain_id.load(Ordering::SeqCst), 97);
        assert!(wallet.known_chains.lock().unwrap().contains(&97));
    }

    #[tokio::test]
    async fn test_ensure_network_switches_known_chain() {
        let wallet = MockWallet::new(Address::repeat_byte(7), 1);
        wallet.known_chains.lock().unwrap().push(97);
        let wallet = Arc::new(wallet);
        let session = WalletSession::new(Some(wallet.clone()), network());

        session.ensure_network().await.unwrap();
        assert_eq!(wallet.chain_id.load(Ordering::SeqCst), 97);
        assert_eq!(wallet.known_chains.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pending_tx_reverted_status() {
        let mut wallet = MockWallet::new(Address::repeat_byte(7), 97);
        wallet.revert_selector = Some([1, 2, 3, 4]);
        let wallet = Arc::new(wallet);

        let tx = TransactionRequest::new().data(vec![1u8, 2, 3, 4]);
        let hash = wallet.send_transaction(tx).await.unwrap();
        let result = PendingTx::new(hash, wallet.clone()).confirm().await;
        assert!(matches!(result, Err(WalletError::Reverted(h)) if h == hash));
    }

    #[test]
    fn test_local_key_wallet_invalid_key() {
        let provider = Provider::<Http>::try_from("http://localhost:8545").unwrap();
        let result = LocalKeyWallet::new("not-a-key", provider, 97);
        assert!(matches!(result, Err(WalletError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_local_key_wallet_accounts() {
        let provider = Provider::<Http>::try_from("http://localhost:8545").unwrap();
        let key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let wallet = LocalKeyWallet::new(key, provider, 97).unwrap();
        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0], key.parse::<LocalWallet>().unwrap().address());
    }
}
