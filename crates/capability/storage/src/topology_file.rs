//! JSON 拓扑文件存储
//!
//! `refresh` 读取并校验文件，成功后整体替换内存快照；失败时保留上一次快照。

use crate::error::StorageError;
use crate::in_memory::InMemoryConfigurationStore;
use crate::models::Topology;
use crate::traits::ConfigurationStore;
use crate::validation::validate_topology;
use domain::{ConnectionConfig, DestinationMapConfig, PluginDescriptor, RoutingRule};
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON 拓扑文件存储
pub struct JsonTopologyStore {
    path: PathBuf,
    inner: InMemoryConfigurationStore,
}

impl JsonTopologyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: InMemoryConfigurationStore::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取并解析拓扑文件（不更新快照）
    pub async fn load(path: &Path) -> Result<Topology, StorageError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| StorageError::new(format!("{}: {}", path.display(), err)))?;
        let topology: Topology = serde_json::from_str(&raw)?;
        validate_topology(&topology)?;
        Ok(topology)
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for JsonTopologyStore {
    async fn refresh(&self) -> Result<(), StorageError> {
        let topology = Self::load(&self.path).await?;
        info!(
            target: "fabric.storage",
            path = %self.path.display(),
            plugins = topology.plugins.len(),
            connections = topology.connections.len(),
            rules = topology.rules.len(),
            "topology_loaded"
        );
        self.inner.replace(topology);
        Ok(())
    }

    async fn get_all_plugin_descriptors(&self) -> Result<Vec<PluginDescriptor>, StorageError> {
        self.inner.get_all_plugin_descriptors().await
    }

    async fn get_all_connection_configs(&self) -> Result<Vec<ConnectionConfig>, StorageError> {
        self.inner.get_all_connection_configs().await
    }

    async fn get_all_routing_rules_for_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<RoutingRule>, StorageError> {
        self.inner
            .get_all_routing_rules_for_connection(connection_id)
            .await
    }

    async fn get_all_destination_maps_for_rule(
        &self,
        rule_id: &str,
    ) -> Result<Vec<DestinationMapConfig>, StorageError> {
        self.inner.get_all_destination_maps_for_rule(rule_id).await
    }
}
