//! 连接状态、状态控制命令与对外集成事件。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 插件连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// 外部状态控制命令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCommand {
    Start,
    Stop,
    Restart,
}

impl FromStr for StateCommand {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            other => Err(format!("unknown state command: {}", other)),
        }
    }
}

impl fmt::Display for StateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateCommand::Start => "start",
            StateCommand::Stop => "stop",
            StateCommand::Restart => "restart",
        };
        f.write_str(name)
    }
}

/// 编排服务状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Faulted,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// 对外转发的集成事件（事件总线载荷）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrationEvent {
    ConnectionStateChanged {
        plugin_id: String,
        status: ConnectionStatus,
        message: Option<String>,
        ts_ms: i64,
    },
    PluginError {
        plugin_id: Option<String>,
        message: String,
        address: Option<String>,
        code: Option<String>,
        ts_ms: i64,
    },
    DataReceived {
        plugin_id: String,
        address: String,
        payload: Vec<u8>,
        ts_ms: i64,
    },
    DataRouted {
        plugin_id: String,
        address: String,
        delivered: usize,
        failed: usize,
        ts_ms: i64,
    },
    ServiceStateChanged {
        status: ServiceStatus,
        ts_ms: i64,
    },
}

impl IntegrationEvent {
    /// 事件名（日志与指标使用）。
    pub fn name(&self) -> &'static str {
        match self {
            IntegrationEvent::ConnectionStateChanged { .. } => "connection_state_changed",
            IntegrationEvent::PluginError { .. } => "plugin_error",
            IntegrationEvent::DataReceived { .. } => "data_received",
            IntegrationEvent::DataRouted { .. } => "data_routed",
            IntegrationEvent::ServiceStateChanged { .. } => "service_state_changed",
        }
    }
}
