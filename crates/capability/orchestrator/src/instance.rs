//! 运行中的插件实例。

use domain::CapabilitySet;
use fabric_plugin::ProtocolPlugin;
use std::sync::Arc;

/// 一个连接对应的插件实例；能力在构建时探测一次并缓存。
#[derive(Clone)]
pub struct PluginInstance {
    pub connection_id: String,
    pub kind: &'static str,
    pub capabilities: CapabilitySet,
    pub plugin: Arc<dyn ProtocolPlugin>,
    /// 构建阶段 connect 是否成功
    pub connected: bool,
}

impl PluginInstance {
    pub fn summary(&self) -> InstanceSummary {
        InstanceSummary {
            connection_id: self.connection_id.clone(),
            kind: self.kind,
            capabilities: self.capabilities.clone(),
            connected: self.plugin.is_connected(),
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("connection_id", &self.connection_id)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("connected", &self.connected)
            .finish()
    }
}

/// 实例状态快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    pub connection_id: String,
    pub kind: &'static str,
    pub capabilities: CapabilitySet,
    pub connected: bool,
}
