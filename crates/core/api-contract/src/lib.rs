//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 编排服务状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStateDto {
    /// faulted / starting / running / stopping / stopped
    pub status: String,
    pub active: bool,
    pub route_count: usize,
    pub connection_count: usize,
}

/// 路由表条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub plugin_id: String,
    pub address: String,
    /// `<connectionId>/<address>`
    pub destinations: Vec<String>,
    pub filters: Vec<String>,
}

/// 运行中的连接实例。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub connection_id: String,
    pub kind: String,
    pub capabilities: Vec<String>,
    pub connected: bool,
}

/// 按地址读取一次的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResultDto {
    pub connection_id: String,
    pub address: String,
    pub payload: Vec<u8>,
}

/// 路由指标快照。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub data_received: u64,
    pub data_routed: u64,
    pub dropped_unmapped: u64,
    pub dropped_inactive: u64,
    pub dropped_stale: u64,
    pub publish_success: u64,
    pub publish_failure: u64,
    pub filter_failure: u64,
    pub plugin_errors: u64,
    pub connection_state_changes: u64,
    pub publish_latency_ms_total: u64,
    pub publish_latency_ms_count: u64,
    pub topology_starts: u64,
    pub topology_stops: u64,
}
