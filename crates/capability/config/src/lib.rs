//! 路由代理运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 路由代理运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// JSON 拓扑文件路径
    pub topology_path: String,
    /// 插件位置（描述符 location）的根目录
    pub plugin_dir: String,
    /// 启动后立即执行 Start
    pub autostart: bool,
    pub connect_timeout_ms: u64,
    pub disconnect_timeout_ms: u64,
    pub event_bus_capacity: usize,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let topology_path = read_optional(&lookup, "FABRIC_TOPOLOGY_PATH")
            .ok_or_else(|| ConfigError::Missing("FABRIC_TOPOLOGY_PATH".to_string()))?;
        let http_addr = read_optional(&lookup, "FABRIC_HTTP_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8090".to_string());
        let plugin_dir =
            read_optional(&lookup, "FABRIC_PLUGIN_DIR").unwrap_or_else(|| "plugins".to_string());
        let autostart = read_bool_with_default(&lookup, "FABRIC_AUTOSTART", true);
        let connect_timeout_ms =
            read_u64_with_default(&lookup, "FABRIC_CONNECT_TIMEOUT_MS", 10_000)?;
        let disconnect_timeout_ms =
            read_u64_with_default(&lookup, "FABRIC_DISCONNECT_TIMEOUT_MS", 5_000)?;
        let event_bus_capacity =
            read_u64_with_default(&lookup, "FABRIC_EVENT_BUS_CAPACITY", 1024)? as usize;

        if connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "FABRIC_CONNECT_TIMEOUT_MS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            http_addr,
            topology_path,
            plugin_dir,
            autostart,
            connect_timeout_ms,
            disconnect_timeout_ms,
            event_bus_capacity,
        })
    }
}

fn read_u64_with_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value) = read_optional(lookup, key) else {
        return Ok(default);
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    match lookup(key) {
        Some(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> bool {
    match lookup(key) {
        Some(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        None => default,
    }
}
