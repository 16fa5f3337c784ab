use crate::types::NetworkParams;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// 服务器配置结构体
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,
    /// 服务器版本
    pub version: String,
    /// 日志级别
    pub log_level: String,
    /// 是否启用 JSON 格式日志
    pub log_json_format: bool,
    /// 文件日志目录（未配置则只输出到 stderr）
    pub log_dir: Option<String>,
}

/// BSC 测试网配置
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// RPC 节点地址
    pub rpc_url: String,
    /// Chain ID
    pub chain_id: u64,
    /// 网络显示名称（添加网络时提交给钱包）
    pub chain_name: String,
    /// 区块浏览器地址
    pub explorer_url: String,
    /// 私钥（用于签名交易）
    pub private_key: Option<String>,
}

/// 交易配置
#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// 默认滑点容差（百分比，3 = 3%）
    pub default_slippage: Decimal,
    /// 交易截止时间（分钟）
    pub deadline_minutes: u64,
    /// 报价防抖时间（毫秒）
    pub quote_debounce_ms: u64,
    /// 原生代币最大输入时预留的 Gas（BNB）
    pub native_gas_reserve: Decimal,
}

/// PancakeSwap 配置
#[derive(Debug, Clone)]
pub struct PancakeSwapConfig {
    /// Router 合约地址
    pub router: String,
}

/// 价格源配置
#[derive(Debug, Clone)]
pub struct PriceConfig {
    /// 价格 API 地址
    pub api_url: String,
    /// CoinGecko API Key
    pub coingecko_api_key: Option<String>,
    /// 轮询间隔（秒）
    pub poll_interval: u64,
    /// 价格缓存时间（秒）
    pub cache_ttl: u64,
    /// HTTP 请求超时时间（秒）
    pub http_timeout: u64,
}

/// 本地交易记录配置
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// 存储目录
    pub dir: String,
}

/// 完整配置
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub trading: TradingConfig,
    pub pancakeswap: PancakeSwapConfig,
    pub price: PriceConfig,
    pub ledger: LedgerConfig,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        // 尝试加载 .env 文件（如果存在）
        dotenv::dotenv().ok();

        let server = ServerConfig {
            name: env::var("SERVER_NAME").unwrap_or_else(|_| "pancake-swap-server".to_string()),
            version: env::var("SERVER_VERSION").unwrap_or_else(|_| "0.1.0".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json_format: parsed_var("LOG_JSON_FORMAT", false),
            log_dir: env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
        };

        let network = NetworkConfig {
            rpc_url: env::var("BSC_RPC_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://data-seed-prebsc-1-s1.binance.org:8545/".to_string()),
            chain_id: parsed_var("CHAIN_ID", 97),
            chain_name: env::var("CHAIN_NAME").unwrap_or_else(|_| "BSC Testnet".to_string()),
            explorer_url: env::var("EXPLORER_URL")
                .unwrap_or_else(|_| "https://testnet.bscscan.com".to_string()),
            private_key: env::var("ETH_PRIVATE_KEY").ok().filter(|s| !s.is_empty()),
        };

        let trading = TradingConfig {
            default_slippage: parsed_var("DEFAULT_SLIPPAGE", Decimal::from(3)),
            deadline_minutes: parsed_var("SWAP_DEADLINE_MINUTES", 20),
            quote_debounce_ms: parsed_var("QUOTE_DEBOUNCE_MS", 500),
            native_gas_reserve: parsed_var("NATIVE_GAS_RESERVE", Decimal::new(1, 2)),
        };

        let pancakeswap = PancakeSwapConfig {
            router: env::var("PANCAKESWAP_ROUTER")
                .unwrap_or_else(|_| "0x9ac64cc6e4415144c455bd8e4837fea55603e5c3".to_string()),
        };

        let price = PriceConfig {
            api_url: env::var("PRICE_API_URL").unwrap_or_else(|_| {
                "https://api.coingecko.com/api/v3/simple/price?ids=binancecoin&vs_currencies=usd&include_24hr_change=true"
                    .to_string()
            }),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok().filter(|s| !s.is_empty()),
            poll_interval: parsed_var("PRICE_POLL_SECS", 30),
            cache_ttl: parsed_var("PRICE_CACHE_TTL", 30),
            http_timeout: parsed_var("HTTP_TIMEOUT", 30),
        };

        let ledger = LedgerConfig {
            dir: env::var("LEDGER_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(default_ledger_dir),
        };

        Ok(Config {
            server,
            network,
            trading,
            pancakeswap,
            price,
            ledger,
        })
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.network.rpc_url.is_empty() {
            anyhow::bail!("必须配置 BSC_RPC_URL");
        }

        // 滑点范围 (0, 50]
        if self.trading.default_slippage <= Decimal::ZERO
            || self.trading.default_slippage > Decimal::from(50)
        {
            anyhow::bail!("DEFAULT_SLIPPAGE 必须在 (0, 50] 范围内");
        }

        if self.trading.deadline_minutes == 0 {
            anyhow::bail!("SWAP_DEADLINE_MINUTES 不能为 0");
        }

        if self.trading.native_gas_reserve.is_sign_negative() {
            anyhow::bail!("NATIVE_GAS_RESERVE 不能为负数");
        }

        if self.price.poll_interval == 0 {
            anyhow::bail!("PRICE_POLL_SECS 不能为 0");
        }

        if self.network.chain_id != 97 {
            eprintln!(
                "⚠️  警告: Chain ID {} 不是 BSC 测试网，代币地址可能无效",
                self.network.chain_id
            );
        }

        Ok(())
    }

    /// 钱包添加网络时使用的参数
    pub fn network_params(&self) -> NetworkParams {
        NetworkParams {
            chain_id: self.network.chain_id,
            chain_name: self.network.chain_name.clone(),
            native_symbol: "BNB".to_string(),
            native_decimals: 18,
            rpc_url: self.network.rpc_url.clone(),
            explorer_url: self.network.explorer_url.clone(),
        }
    }

    /// 打印配置信息（隐藏敏感信息）
    pub fn print_info(&self) {
        eprintln!("📋 配置信息:");
        eprintln!("  服务器名称: {}", self.server.name);
        eprintln!("  服务器版本: {}", self.server.version);
        eprintln!("  日志级别: {}", self.server.log_level);
        eprintln!("  JSON 日志: {}", self.server.log_json_format);
        if let Some(ref dir) = self.server.log_dir {
            eprintln!("  日志目录: {}", dir);
        }

        eprintln!("\n🌐 BSC 网络:");
        eprintln!("  RPC 节点: {}", mask_url(&self.network.rpc_url));
        eprintln!("  Chain ID: {}", self.network.chain_id);
        eprintln!("  浏览器: {}", self.network.explorer_url);

        if self.network.private_key.is_some() {
            eprintln!("  私钥: ✅ 已配置");
        } else {
            eprintln!("  私钥: ❌ 未配置（只读模式）");
        }

        eprintln!("\n💱 交易配置:");
        eprintln!("  默认滑点: {}%", self.trading.default_slippage);
        eprintln!("  截止时间: {} 分钟", self.trading.deadline_minutes);
        eprintln!("  报价防抖: {}ms", self.trading.quote_debounce_ms);
        eprintln!("  Gas 预留: {} BNB", self.trading.native_gas_reserve);

        eprintln!("\n🥞 PancakeSwap:");
        eprintln!("  Router: {}", self.pancakeswap.router);

        eprintln!("\n📈 价格源:");
        eprintln!("  API: {}", mask_url(&self.price.api_url));
        eprintln!("  轮询间隔: {}s", self.price.poll_interval);
        eprintln!("  价格缓存: {}s", self.price.cache_ttl);
        if self.price.coingecko_api_key.is_some() {
            eprintln!("  CoinGecko: ✅ 已配置");
        }

        eprintln!("\n📄 交易记录目录: {}", self.ledger.dir);
    }
}

/// 读取并解析环境变量，缺失或无法解析时使用默认值
fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn default_ledger_dir() -> String {
    let home_dir = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    format!("{home_dir}/.pancake_swap")
}

/// 隐藏 URL 中的查询参数（可能包含 API Key）
fn mask_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?***", base),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::from_env().expect("应该能创建默认配置");
        assert_eq!(config.server.name, "pancake-swap-server");
        assert_eq!(config.network.chain_id, 97);
        assert_eq!(config.trading.default_slippage, Decimal::from(3));
        assert_eq!(config.trading.deadline_minutes, 20);
        assert_eq!(config.trading.quote_debounce_ms, 500);
        assert_eq!(config.price.poll_interval, 30);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::from_env().expect("应该能创建配置");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_slippage_validation() {
        let mut config = Config::from_env().expect("应该能创建配置");

        config.trading.default_slippage = Decimal::new(5, 1);
        assert!(config.validate().is_ok());

        config.trading.default_slippage = Decimal::from(50);
        assert!(config.validate().is_ok());

        config.trading.default_slippage = Decimal::ZERO;
        assert!(config.validate().is_err());

        config.trading.default_slippage = Decimal::new(501, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_params() {
        let config = Config::from_env().expect("应该能创建配置");
        let params = config.network_params();
        assert_eq!(params.chain_id, config.network.chain_id);
        assert_eq!(params.native_symbol, "BNB");
        assert_eq!(params.native_decimals, 18);
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(mask_url("https://rpc.example?key=secret"), "https://rpc.example?***");
        assert_eq!(mask_url("https://rpc.example"), "https://rpc.example");
    }
}
