//! 持久化配置的只读模型。
//!
//! 每个编排周期（Start/Restart）从外部存储读取一次，Stop 时丢弃。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 插件能力。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 拉取读取
    Source,
    /// 发布
    Destination,
    /// 推送订阅
    Subscribable,
    /// 地址发现
    Browsable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Source => "source",
            Capability::Destination => "destination",
            Capability::Subscribable => "subscribable",
            Capability::Browsable => "browsable",
        };
        f.write_str(name)
    }
}

/// 能力集合。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// `other` 中的每一项能力都存在于当前集合。
    pub fn contains_all(&self, other: &CapabilitySet) -> bool {
        other.0.is_subset(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", names.join(","))
    }
}

/// 插件描述（名称/版本/加载位置/声明能力）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// 模块清单所在目录
    pub location: String,
    /// 插件类型标识（与工厂的 kind 精确比对）
    pub plugin_type: String,
    #[serde(default)]
    pub required_parameters: Vec<String>,
    #[serde(default)]
    pub capabilities: CapabilitySet,
}

/// 连接配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// 连接标识，同时作为插件实例的 PluginId
    pub id: String,
    pub name: String,
    /// 引用的 PluginDescriptor.id
    pub plugin: String,
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// 返回缺失的必填参数（保持声明顺序）。
    pub fn missing_parameters<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|key| !self.parameters.contains_key(key.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// 路由规则：某连接上的一个源地址。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub id: String,
    pub connection_id: String,
    pub address: String,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// 目标映射：目标连接 + 目标地址。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationMapConfig {
    pub id: String,
    pub rule_id: String,
    pub connection_id: String,
    pub address: String,
}

/// 规则级过滤器配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub kind: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}
