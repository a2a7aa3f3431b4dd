//! 路由条目与投递结果。

use domain::RoutingKey;
use fabric_filter::FilterChain;
use fabric_plugin::{PluginError, ProtocolPlugin};
use std::sync::{Arc, Weak};

/// 目的地：插件实例（弱引用，生命周期归编排器）+ 发布地址。
#[derive(Clone)]
pub struct DestinationTarget {
    plugin_id: String,
    address: String,
    plugin: Weak<dyn ProtocolPlugin>,
}

impl DestinationTarget {
    pub fn new(
        plugin_id: impl Into<String>,
        address: impl Into<String>,
        plugin: &Arc<dyn ProtocolPlugin>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            address: address.into(),
            plugin: Arc::downgrade(plugin),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn plugin(&self) -> Result<Arc<dyn ProtocolPlugin>, PluginError> {
        self.plugin.upgrade().ok_or(PluginError::NotConnected)
    }
}

impl std::fmt::Debug for DestinationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationTarget")
            .field("plugin_id", &self.plugin_id)
            .field("address", &self.address)
            .finish()
    }
}

/// 路由条目。
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub key: RoutingKey,
    pub destinations: Vec<DestinationTarget>,
    pub filters: FilterChain,
}

/// 单个目的地投递失败。
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub plugin_id: String,
    pub address: String,
    pub message: String,
    pub code: &'static str,
}

/// 一次路由的结果。
#[derive(Debug, Clone, Default)]
pub struct RouteOutcome {
    /// 键是否命中规则
    pub matched: bool,
    pub delivered: usize,
    pub failed: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl RouteOutcome {
    pub(crate) fn unmatched() -> Self {
        Self::default()
    }
}

/// 路由表快照中的一条。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSummary {
    pub key: RoutingKey,
    pub destinations: Vec<String>,
    pub filters: Vec<&'static str>,
}
