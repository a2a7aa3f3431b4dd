//! 存储接口 Trait 定义
//!
//! - ConfigurationStore：配置读模型（只读）
//! - AddressCatalog：发现地址目录（fire-and-forget 写入）

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{ConnectionConfig, DestinationMapConfig, PluginDescriptor, RoutingRule};

/// 配置读模型
///
/// 编排器在每个 Initialize 开始时调用一次 `refresh`，随后查询。
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// 重新加载底层配置（默认无操作）
    async fn refresh(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_all_plugin_descriptors(&self) -> Result<Vec<PluginDescriptor>, StorageError>;

    async fn get_all_connection_configs(&self) -> Result<Vec<ConnectionConfig>, StorageError>;

    /// 指定连接拥有的路由规则
    async fn get_all_routing_rules_for_connection(
        &self,
        connection_id: &str,
    ) -> Result<Vec<RoutingRule>, StorageError>;

    /// 指定规则的目标映射（保持声明顺序）
    async fn get_all_destination_maps_for_rule(
        &self,
        rule_id: &str,
    ) -> Result<Vec<DestinationMapConfig>, StorageError>;
}

/// 发现地址目录
#[async_trait]
pub trait AddressCatalog: Send + Sync {
    async fn refresh_discovered_addresses(&self, connection_id: &str, addresses: Vec<String>);
}

/// 丢弃发现结果（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopAddressCatalog;

#[async_trait]
impl AddressCatalog for NoopAddressCatalog {
    async fn refresh_discovered_addresses(&self, _connection_id: &str, _addresses: Vec<String>) {}
}
