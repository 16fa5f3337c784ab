use crate::types::Token;
use ethers::types::Address;

/// 注册表错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("无效的地址 {symbol}: {address}")]
    InvalidAddress { symbol: String, address: String },

    #[error("注册表缺少包装原生代币")]
    MissingWrappedNative,
}

/// BSC 测试网代币表：(符号, 名称, 地址, 小数位)
const BSC_TESTNET_TOKENS: &[(&str, &str, &str, u8)] = &[
    ("WBNB", "Wrapped BNB", "0xae13d989daC2f0dEbFf460aC112a837C89BAa7cd", 18),
    ("CAKE", "PancakeSwap Token", "0xFa60D973F7642B748046464e165A65B7323b0DEE", 18),
    ("BUSD", "Binance USD", "0xeD24FC36d5Ee211Ea25A80239Fb8C4Cfd80f12Ee", 18),
    ("USDT", "Tether USD", "0x337610d27c682E347C9cD60BD4b3b107C9d34dDd", 18),
];

/// 可在界面中选择的代币
const TRADEABLE: &[&str] = &["BNB", "CAKE", "BUSD", "USDT"];

/// 代币注册表
/// 进程启动时构建，之后只读
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
    wrapped_native: Address,
}

impl TokenRegistry {
    /// BSC 测试网注册表
    pub fn bsc_testnet() -> Result<Self, RegistryError> {
        let mut tokens = vec![Token::native("BNB", "BNB")];

        for (symbol, name, address, decimals) in BSC_TESTNET_TOKENS {
            let addr: Address = address.parse().map_err(|_| RegistryError::InvalidAddress {
                symbol: symbol.to_string(),
                address: address.to_string(),
            })?;
            tokens.push(Token::erc20(symbol, name, addr, *decimals));
        }

        Self::from_tokens(tokens, "WBNB")
    }

    /// 由代币列表构建，`wrapped_symbol` 指定包装原生代币
    pub fn from_tokens(tokens: Vec<Token>, wrapped_symbol: &str) -> Result<Self, RegistryError> {
        let wrapped_native = tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(wrapped_symbol))
            .map(|t| t.address)
            .ok_or(RegistryError::MissingWrappedNative)?;

        Ok(Self {
            tokens,
            wrapped_native,
        })
    }

    /// 解析代币地址或符号
    pub fn resolve(&self, symbol_or_address: &str) -> Option<Token> {
        if let Ok(address) = symbol_or_address.parse::<Address>() {
            if symbol_or_address.starts_with("0x") {
                return self
                    .tokens
                    .iter()
                    .find(|t| !t.is_native && t.address == address)
                    .cloned();
            }
        }

        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol_or_address))
            .cloned()
    }

    /// 包装原生代币（WBNB）地址
    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// 链原生代币
    pub fn native(&self) -> Option<Token> {
        self.tokens.iter().find(|t| t.is_native).cloned()
    }

    /// Router 路径中使用的地址：原生代币替换为包装地址
    pub fn route_address(&self, token: &Token) -> Address {
        if token.is_native {
            self.wrapped_native
        } else {
            token.address
        }
    }

    /// 可交易代币，按界面顺序
    pub fn tradeable(&self) -> Vec<Token> {
        TRADEABLE
            .iter()
            .filter_map(|symbol| self.resolve(symbol))
            .collect()
    }

    /// 获取所有已注册代币
    pub fn all_tokens(&self) -> &[Token] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = TokenRegistry::bsc_testnet().unwrap();
        assert_eq!(registry.all_tokens().len(), 5);
        assert!(registry.resolve("BNB").unwrap().is_native);
        assert!(registry.resolve("WBNB").is_some());
    }

    #[test]
    fn test_resolve_by_symbol_case_insensitive() {
        let registry = TokenRegistry::bsc_testnet().unwrap();
        let cake = registry.resolve("cake").unwrap();
        assert_eq!(cake.symbol, "CAKE");
        assert_eq!(cake.decimals, 18);
    }

    #[test]
    fn test_resolve_by_address() {
        let registry = TokenRegistry::bsc_testnet().unwrap();
        let busd = registry
            .resolve("0xed24fc36d5ee211ea25a80239fb8c4cfd80f12ee")
            .unwrap();
        assert_eq!(busd.symbol, "BUSD");

        // 零地址不解析为原生代币
        assert!(
            registry
                .resolve("0x0000000000000000000000000000000000000000")
                .is_none()
        );
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = TokenRegistry::bsc_testnet().unwrap();
        assert!(registry.resolve("DOGE").is_none());
        assert!(registry.resolve("0xinvalid").is_none());
    }

    #[test]
    fn test_route_address_substitutes_wrapped_native() {
        let registry = TokenRegistry::bsc_testnet().unwrap();
        let bnb = registry.resolve("BNB").unwrap();
        let wbnb = registry.resolve("WBNB").unwrap();
        let cake = registry.resolve("CAKE").unwrap();

        assert_eq!(registry.route_address(&bnb), wbnb.address);
        assert_eq!(registry.route_address(&cake), cake.address);
        assert_eq!(registry.wrapped_native(), wbnb.address);
    }

    #[test]
    fn test_tradeable_excludes_wrapped_native() {
        let registry = TokenRegistry::bsc_testnet().unwrap();
        let symbols: Vec<String> = registry.tradeable().into_iter().map(|t| t.symbol).collect();
        assert_eq!(symbols, vec!["BNB", "CAKE", "BUSD", "USDT"]);
    }

    #[test]
    fn test_missing_wrapped_native() {
        let result = TokenRegistry::from_tokens(vec![Token::native("BNB", "BNB")], "WBNB");
        assert!(matches!(result, Err(RegistryError::MissingWrappedNative)));
    }
}
