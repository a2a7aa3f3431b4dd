//! 路由编排共享的领域模型。

pub mod config;
pub mod events;

pub use config::{
    Capability, CapabilitySet, ConnectionConfig, DestinationMapConfig, FilterConfig,
    PluginDescriptor, RoutingRule,
};
pub use events::{ConnectionStatus, IntegrationEvent, ServiceStatus, StateCommand};

use serde::{Deserialize, Serialize};
use std::fmt;

/// 路由键：(源插件标识, 源地址)。
///
/// 同一时刻每个路由键至多对应一个目标列表。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingKey {
    pub plugin_id: String,
    pub address: String,
}

impl RoutingKey {
    pub fn new(plugin_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.plugin_id, self.address)
    }
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
