//! 发现地址目录内存实现

use crate::traits::AddressCatalog;
use std::collections::HashMap;
use std::sync::RwLock;

/// 发现地址内存目录（连接 ID → 最近一次发现结果）
pub struct InMemoryAddressCatalog {
    addresses: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryAddressCatalog {
    pub fn new() -> Self {
        Self {
            addresses: RwLock::new(HashMap::new()),
        }
    }

    pub fn addresses(&self, connection_id: &str) -> Option<Vec<String>> {
        self.addresses
            .read()
            .ok()
            .and_then(|map| map.get(connection_id).cloned())
    }
}

impl Default for InMemoryAddressCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AddressCatalog for InMemoryAddressCatalog {
    async fn refresh_discovered_addresses(&self, connection_id: &str, addresses: Vec<String>) {
        if let Ok(mut map) = self.addresses.write() {
            map.insert(connection_id.to_string(), addresses);
        }
    }
}
