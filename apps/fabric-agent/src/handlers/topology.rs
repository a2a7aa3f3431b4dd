//! 运行拓扑查询 handlers
//!
//! - GET /api/routes
//! - GET /api/connections
//! - GET /api/connections/{id}/addresses
//! - GET /api/connections/{id}/read?address=

use crate::AppState;
use crate::utils::response::{
    bad_request_error, instance_to_dto, not_found_error, orchestrator_error, route_to_dto,
};
use api_contract::{ApiResponse, ConnectionDto, ReadResultDto, RouteDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(serde::Deserialize)]
pub struct ConnectionPath {
    connection_id: String,
}

#[derive(serde::Deserialize)]
pub struct ReadQuery {
    address: Option<String>,
}

/// 路由表快照
pub async fn list_routes(State(state): State<AppState>) -> Response {
    let data: Vec<RouteDto> = state
        .orchestrator
        .routes()
        .into_iter()
        .map(route_to_dto)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 运行中的连接实例
pub async fn list_connections(State(state): State<AppState>) -> Response {
    let data: Vec<ConnectionDto> = state
        .orchestrator
        .instances()
        .into_iter()
        .map(instance_to_dto)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Browsable 连接最近一次发现的地址
pub async fn list_addresses(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    match state.addresses.addresses(&path.connection_id) {
        Some(addresses) => (StatusCode::OK, Json(ApiResponse::success(addresses))).into_response(),
        None => not_found_error(format!(
            "no discovered addresses for {}",
            path.connection_id
        )),
    }
}

/// 从 Source 连接读取一次
pub async fn read_address(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
    Query(query): Query<ReadQuery>,
) -> Response {
    let address = match query.address.map(|a| a.trim().to_string()) {
        Some(address) if !address.is_empty() => address,
        _ => return bad_request_error("INVALID.REQUEST", "address is required"),
    };
    match state
        .orchestrator
        .read(&path.connection_id, &address)
        .await
    {
        Ok(payload) => (
            StatusCode::OK,
            Json(ApiResponse::success(ReadResultDto {
                connection_id: path.connection_id,
                address,
                payload,
            })),
        )
            .into_response(),
        Err(err) => orchestrator_error(err),
    }
}
