//! 拓扑一致性校验
//!
//! 只拒绝会破坏标识唯一性的配置：连接 ID 同时是插件实例的 PluginId。

use crate::error::StorageError;
use crate::models::Topology;
use std::collections::HashSet;

/// 校验各类 ID 在同类中唯一。
pub fn validate_topology(topology: &Topology) -> Result<(), StorageError> {
    ensure_unique("plugin", topology.plugins.iter().map(|p| p.id.as_str()))?;
    ensure_unique("connection", topology.connections.iter().map(|c| c.id.as_str()))?;
    ensure_unique("rule", topology.rules.iter().map(|r| r.id.as_str()))?;
    ensure_unique("destination", topology.destinations.iter().map(|d| d.id.as_str()))?;
    Ok(())
}

fn ensure_unique<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), StorageError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(StorageError::new(format!("{} id is empty", kind)));
        }
        if !seen.insert(id) {
            return Err(StorageError::new(format!("duplicate {} id: {}", kind, id)));
        }
    }
    Ok(())
}
