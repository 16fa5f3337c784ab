use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// 存储键
pub const HISTORY_KEY: &str = "swap_transaction_history";
/// 最多保留的记录数
pub const MAX_HISTORY_ITEMS: usize = 50;

/// 一次已上链的兑换
///
/// 字段名与浏览器版本的 localStorage 格式保持一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    #[serde(rename = "hash")]
    pub transaction_hash: String,
    #[serde(rename = "fromToken")]
    pub from_symbol: String,
    #[serde(rename = "toToken")]
    pub to_symbol: String,
    #[serde(rename = "fromAmount")]
    pub from_amount: String,
    #[serde(rename = "toAmount")]
    pub to_amount: String,
    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
    #[serde(rename = "bscscanUrl")]
    pub explorer_url: String,
}

/// 存储错误类型
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 键值存储接口
pub trait LedgerStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, LedgerError>;

    fn set(&self, key: &str, value: &str) -> Result<(), LedgerError>;

    fn remove(&self, key: &str) -> Result<(), LedgerError>;
}

/// 每个键一个 JSON 文件
pub struct FileLedgerStore {
    dir: PathBuf,
}

impl FileLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LedgerStore for FileLedgerStore {
    fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        fs::create_dir_all(&self.dir)?;
        // 先写临时文件再重命名，避免写一半的文件
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LedgerError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<HashMap<String, String>>,
}

impl LedgerStore for MemoryLedgerStore {
    fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// 本地兑换记录
///
/// 所有操作都不会向调用方返回错误：读取失败视为空列表，写入失败只记录日志。
pub struct SwapLedger {
    store: Box<dyn LedgerStore>,
    capacity: usize,
}

impl SwapLedger {
    pub fn new(store: Box<dyn LedgerStore>) -> Self {
        Self {
            store,
            capacity: MAX_HISTORY_ITEMS,
        }
    }

    /// 最新的在前
    pub fn list(&self) -> Vec<SwapRecord> {
        let stored = match self.store.get(HISTORY_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "读取交易记录失败");
                return Vec::new();
            }
        };

        serde_json::from_str(&stored).unwrap_or_else(|e| {
            warn!(error = %e, "交易记录已损坏，按空列表处理");
            Vec::new()
        })
    }

    /// 插入到最前面，超出容量的旧记录被淘汰
    pub fn append(&self, record: SwapRecord) {
        let mut history = self.list();
        history.retain(|r| r.transaction_hash != record.transaction_hash);
        history.insert(0, record);
        history.truncate(self.capacity);

        let persisted = serde_json::to_string(&history)
            .map_err(LedgerError::from)
            .and_then(|json| self.store.set(HISTORY_KEY, &json));

        match persisted {
            Ok(()) => debug!(count = history.len(), "交易记录已保存"),
            Err(e) => warn!(error = %e, "保存交易记录失败"),
        }
    }

    /// 清空全部记录
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            warn!(error = %e, "清空交易记录失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str) -> SwapRecord {
        SwapRecord {
            transaction_hash: hash.to_string(),
            from_symbol: "BNB".to_string(),
            to_symbol: "CAKE".to_string(),
            from_amount: "1".to_string(),
            to_amount: "12.5".to_string(),
            timestamp_millis: 1_700_000_000_000,
            explorer_url: format!("https://testnet.bscscan.com/tx/{hash}"),
        }
    }

    fn memory_ledger() -> SwapLedger {
        SwapLedger::new(Box::new(MemoryLedgerStore::default()))
    }

    /// 所有操作都失败的存储
    struct BrokenStore;

    impl LedgerStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, LedgerError> {
            Err(std::io::Error::other("disk gone").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), LedgerError> {
            Err(std::io::Error::other("disk gone").into())
        }

        fn remove(&self, _key: &str) -> Result<(), LedgerError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    #[test]
    fn test_newest_first() {
        let ledger = memory_ledger();
        ledger.append(record("h1"));
        ledger.append(record("h2"));
        ledger.append(record("h3"));

        let hashes: Vec<String> = ledger.list().into_iter().map(|r| r.transaction_hash).collect();
        assert_eq!(hashes, vec!["h3", "h2", "h1"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let ledger = memory_ledger();
        for i in 0..51 {
            ledger.append(record(&format!("h{i}")));
        }

        let history = ledger.list();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].transaction_hash, "h50");
        assert_eq!(history[49].transaction_hash, "h1");
        assert!(history.iter().all(|r| r.transaction_hash != "h0"));
    }

    #[test]
    fn test_clear() {
        let ledger = memory_ledger();
        ledger.append(record("h1"));
        ledger.clear();
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_duplicate_hash_replaced() {
        let ledger = memory_ledger();
        ledger.append(record("h1"));
        ledger.append(record("h2"));
        ledger.append(record("h1"));

        let hashes: Vec<String> = ledger.list().into_iter().map(|r| r.transaction_hash).collect();
        assert_eq!(hashes, vec!["h1", "h2"]);
    }

    #[test]
    fn test_corrupt_storage_fails_open() {
        let store = MemoryLedgerStore::default();
        store.set(HISTORY_KEY, "{not json").unwrap();
        let ledger = SwapLedger::new(Box::new(store));

        assert!(ledger.list().is_empty());
        ledger.append(record("h1"));
        assert_eq!(ledger.list().len(), 1);
    }

    #[test]
    fn test_broken_store_never_panics() {
        let ledger = SwapLedger::new(Box::new(BrokenStore));
        ledger.append(record("h1"));
        ledger.clear();
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_record_storage_format() {
        let json = serde_json::to_value(record("0xabc")).unwrap();
        assert_eq!(json["hash"], "0xabc");
        assert_eq!(json["fromToken"], "BNB");
        assert_eq!(json["toToken"], "CAKE");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["bscscanUrl"], "https://testnet.bscscan.com/tx/0xabc");
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "pancake-swap-ledger-{}-{}",
            std::process::id(),
            line!()
        ));
        let ledger = SwapLedger::new(Box::new(FileLedgerStore::new(&dir)));

        assert!(ledger.list().is_empty());
        ledger.append(record("h1"));
        ledger.append(record("h2"));

        // 重新打开同一目录
        let reopened = SwapLedger::new(Box::new(FileLedgerStore::new(&dir)));
        assert_eq!(reopened.list().len(), 2);

        reopened.clear();
        assert!(ledger.list().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
