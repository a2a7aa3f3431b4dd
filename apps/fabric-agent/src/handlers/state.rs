//! 状态控制 handlers
//!
//! - GET /api/state
//! - POST /api/state/{start|stop|restart}
//!
//! 命令经状态控制通道串行执行，响应在命令执行完成后返回。

use crate::AppState;
use crate::utils::response::{bad_request_error, orchestrator_error, state_to_dto};
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::StateCommand;

/// 当前编排状态
pub async fn get_state(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(state_to_dto(&state.orchestrator))),
    )
        .into_response()
}

/// 下发状态命令
pub async fn post_state_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
) -> Response {
    let command: StateCommand = match command.parse() {
        Ok(command) => command,
        Err(message) => return bad_request_error("STATE.UNKNOWN_COMMAND", message),
    };
    match state.control.send(command).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(state_to_dto(&state.orchestrator))),
        )
            .into_response(),
        Err(err) => orchestrator_error(err),
    }
}
