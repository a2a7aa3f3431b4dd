//! 配置读模型内存实现

use crate::error::StorageError;
use crate::models::Topology;
use crate::traits::ConfigurationStore;
use domain::{ConnectionConfig, DestinationMapConfig, PluginDescriptor, RoutingRule};
use std::sync::RwLock;

/// 配置读模型内存存储
pub struct InMemoryConfigurationStore {
    topology: RwLock<Topology>,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::from_topology(Topology::default())
    }

    pub fn from_topology(topology: Topology) -> Self {
        Self {
            topology: RwLock::new(topology),
        }
    }

    /// 整体替换拓扑（下一个编排周期生效）
    pub fn replace(&self, topology: Topology) {
        if let Ok(mut guard) = self.topology.write() {
            *guard = topology;
        }
    }

    pub fn snapshot(&self) -> Topology {
        self.topology
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn read<T>(&self, f: impl FnOnce(&Topology) -> T) -> Result<T, StorageError> {
        self.topology
            .read()
            .map(|guard| f(&guard))
            .map_err(|_| StorageError::new("topology lock poisoned"))
    }
}

impl Default for InMemoryConfigurationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for InMemoryConfigurationStore {
    async fn get_all_plugin_descriptors(&self) -> Result<Vec<PluginDescriptor>, StorageError> {
        self.read(|t| t.plugins.clone())
    }

    async fn get_all_connection_configs(&self) -> Result<Vec<ConnectionConfig>, StorageError> {
        self.read(|t| t.connections.clone())
    }

    async fn get_all_routing_rules_for_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<RoutingRule>, StorageError> {
        self.read(|t| {
            t.rules
                .iter()
                .filter(|rule| rule.connection_id == connection_id)
                .cloned()
                .collect()
        })
    }

    async fn get_all_destination_maps_for_rule(
        &self,
        rule_id: &str,
    ) -> Result<Vec<DestinationMapConfig>, StorageError> {
        self.read(|t| {
            t.destinations
                .iter()
                .filter(|map| map.rule_id == rule_id)
                .cloned()
                .collect()
        })
    }
}
