//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, orchestrator_error
//! - DTO 转换：state_to_dto, route_to_dto, instance_to_dto, metrics_to_dto

use api_contract::{ApiResponse, ConnectionDto, MetricsSnapshotDto, RouteDto, ServiceStateDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::ServiceStatus;
use fabric_orchestrator::{InstanceSummary, Orchestrator, OrchestratorError, RouteSummary};
use fabric_telemetry::MetricsSnapshot;

/// 错误请求响应
pub fn bad_request_error(code: &str, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(code, message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

/// 编排错误响应（状态码按错误类别）
pub fn orchestrator_error(err: OrchestratorError) -> Response {
    let status = match &err {
        OrchestratorError::UnknownConnection(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Unsupported(_, _) => StatusCode::BAD_REQUEST,
        OrchestratorError::Plugin(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::ControlClosed => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Storage(_) | OrchestratorError::Registry(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ApiResponse::<()>::error(err.code(), err.to_string())),
    )
        .into_response()
}

pub fn status_name(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Faulted => "faulted",
        ServiceStatus::Starting => "starting",
        ServiceStatus::Running => "running",
        ServiceStatus::Stopping => "stopping",
        ServiceStatus::Stopped => "stopped",
    }
}

/// 编排器当前状态转 ServiceStateDto
pub fn state_to_dto(orchestrator: &Orchestrator) -> ServiceStateDto {
    ServiceStateDto {
        status: status_name(orchestrator.status()).to_string(),
        active: orchestrator.is_active(),
        route_count: orchestrator.routes().len(),
        connection_count: orchestrator.instances().len(),
    }
}

/// RouteSummary 转 RouteDto
pub fn route_to_dto(route: RouteSummary) -> RouteDto {
    RouteDto {
        plugin_id: route.key.plugin_id,
        address: route.key.address,
        destinations: route.destinations,
        filters: route.filters.into_iter().map(str::to_string).collect(),
    }
}

/// InstanceSummary 转 ConnectionDto
pub fn instance_to_dto(instance: InstanceSummary) -> ConnectionDto {
    ConnectionDto {
        connection_id: instance.connection_id,
        kind: instance.kind.to_string(),
        capabilities: instance
            .capabilities
            .iter()
            .map(|capability| capability.to_string())
            .collect(),
        connected: instance.connected,
    }
}

/// MetricsSnapshot 转 MetricsSnapshotDto
pub fn metrics_to_dto(snapshot: MetricsSnapshot) -> MetricsSnapshotDto {
    MetricsSnapshotDto {
        data_received: snapshot.data_received,
        data_routed: snapshot.data_routed,
        dropped_unmapped: snapshot.dropped_unmapped,
        dropped_inactive: snapshot.dropped_inactive,
        dropped_stale: snapshot.dropped_stale,
        publish_success: snapshot.publish_success,
        publish_failure: snapshot.publish_failure,
        filter_failure: snapshot.filter_failure,
        plugin_errors: snapshot.plugin_errors,
        connection_state_changes: snapshot.connection_state_changes,
        publish_latency_ms_total: snapshot.publish_latency_ms_total,
        publish_latency_ms_count: snapshot.publish_latency_ms_count,
        topology_starts: snapshot.topology_starts,
        topology_stops: snapshot.topology_stops,
    }
}
