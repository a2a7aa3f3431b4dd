//! 路由定义
//!
//! - 健康检查：/health
//! - 指标：/metrics
//! - 状态控制：/api/state, /api/state/{command}
//! - 运行拓扑：/api/routes, /api/connections/*

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// 创建完整路由（含请求追踪中间件）
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .nest("/api", create_api_router())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_context))
                .layer(TraceLayer::new_for_http()),
        )
}

/// /api 下的状态控制与拓扑查询
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/state/:command", post(post_state_command))
        .route("/routes", get(list_routes))
        .route("/connections", get(list_connections))
        .route("/connections/:connection_id/addresses", get(list_addresses))
        .route("/connections/:connection_id/read", get(read_address))
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::AppState;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use domain::{Capability, ConnectionConfig, PluginDescriptor};
    use fabric_orchestrator::{Orchestrator, OrchestratorSettings, run_state_loop, state_channel};
    use fabric_protocol::builtin_modules;
    use fabric_storage::{InMemoryAddressCatalog, InMemoryConfigurationStore, Topology};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn workspace() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fabric-agent-{}", uuid::Uuid::new_v4()));
        let module = dir.join("plugins").join("fabric-file");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::write(
            module.join("fabric-file.module.json"),
            r#"{"module":"fabric-file","version":"0.1.0"}"#,
        )
        .unwrap();
        dir
    }

    fn log_topology(dir: &Path) -> Topology {
        Topology {
            plugins: vec![PluginDescriptor {
                id: "log".to_string(),
                name: "File log".to_string(),
                version: "0.1.0".to_string(),
                location: "fabric-file".to_string(),
                plugin_type: "log".to_string(),
                required_parameters: vec!["filepath".to_string()],
                capabilities: [Capability::Destination].into_iter().collect(),
            }],
            connections: vec![ConnectionConfig {
                id: "logC".to_string(),
                name: "Route log".to_string(),
                plugin: "log".to_string(),
                connection_string: String::new(),
                parameters: [(
                    "filepath".to_string(),
                    dir.join("route.log").to_string_lossy().to_string(),
                )]
                .into_iter()
                .collect(),
            }],
            rules: Vec::new(),
            destinations: Vec::new(),
        }
    }

    fn app() -> axum::Router {
        let dir = workspace();
        let store = Arc::new(InMemoryConfigurationStore::from_topology(log_topology(&dir)));
        let addresses = Arc::new(InMemoryAddressCatalog::new());
        let orchestrator = Orchestrator::builder(store, builtin_modules())
            .address_catalog(addresses.clone())
            .settings(OrchestratorSettings {
                plugin_dir: dir.join("plugins"),
                ..OrchestratorSettings::default()
            })
            .build();
        let (control, receiver) = state_channel(4);
        tokio::spawn(run_state_loop(orchestrator.clone(), receiver));
        create_router(AppState {
            orchestrator,
            control,
            addresses,
        })
    }

    async fn call(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_carries_request_ids() {
        let app = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "req-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-1");
        assert!(response.headers().contains_key("x-trace-id"));
    }

    #[tokio::test]
    async fn start_and_stop_through_state_commands() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/state").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "stopped");

        let (status, body) = call(&app, "POST", "/api/state/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "running");
        assert_eq!(body["data"]["connectionCount"], 1);

        let (_, body) = call(&app, "GET", "/api/connections").await;
        assert_eq!(body["data"][0]["connectionId"], "logC");
        assert_eq!(body["data"][0]["kind"], "log");
        assert_eq!(body["data"][0]["connected"], true);

        let (_, body) = call(&app, "GET", "/api/routes").await;
        assert_eq!(body["data"], Value::Array(Vec::new()));

        let (status, body) = call(&app, "POST", "/api/state/stop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "stopped");
        assert_eq!(body["data"]["active"], false);
    }

    #[tokio::test]
    async fn rejects_unknown_state_command() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/state/pause").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "STATE.UNKNOWN_COMMAND");
    }

    #[tokio::test]
    async fn read_reports_unknown_connection_and_unsupported_source() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/connections/plcA/read?address=hr:0:1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "RESOURCE.NOT_FOUND");

        call(&app, "POST", "/api/state/start").await;
        let (status, body) = call(&app, "GET", "/api/connections/logC/read?address=x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "CONFIG.UNSUPPORTED");

        let (status, _) = call(&app, "GET", "/api/connections/logC/read").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        call(&app, "POST", "/api/state/stop").await;
    }

    #[tokio::test]
    async fn metrics_snapshot_is_wrapped() {
        let app = app();
        let (status, body) = call(&app, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["data"].get("dataReceived").is_some());
        assert!(body["data"].get("publishFailure").is_some());
    }
}
