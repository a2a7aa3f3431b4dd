//! 拓扑文档模型

use domain::{ConnectionConfig, DestinationMapConfig, PluginDescriptor, RoutingRule};
use serde::{Deserialize, Serialize};

/// 完整路由拓扑（JSON 拓扑文件的根）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
    #[serde(default)]
    pub destinations: Vec<DestinationMapConfig>,
}

impl Topology {
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty() && self.connections.is_empty() && self.rules.is_empty()
    }
}
