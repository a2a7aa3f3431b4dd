//! 路由代理：加载拓扑、启动编排器，并提供 HTTP 状态控制接口。

mod handlers;
mod middleware;
mod routes;
mod utils;

use fabric_config::AppConfig;
use fabric_events::{BroadcastEventBus, CompositeEventSink, TracingEventSink};
use fabric_orchestrator::{
    Orchestrator, OrchestratorSettings, StateController, run_state_loop, state_channel,
};
use fabric_protocol::builtin_modules;
use fabric_storage::{InMemoryAddressCatalog, JsonTopologyStore};
use fabric_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 处理器共享状态。
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub control: StateController,
    pub addresses: Arc<InMemoryAddressCatalog>,
}

/// 状态控制通道容量
const CONTROL_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 拓扑文件在每次 Start/Restart 时重新读取
    let store = Arc::new(JsonTopologyStore::new(&config.topology_path));
    let addresses = Arc::new(InMemoryAddressCatalog::new());
    let bus = BroadcastEventBus::new(config.event_bus_capacity);
    let events = CompositeEventSink::new()
        .with(Arc::new(bus))
        .with(Arc::new(TracingEventSink));

    let orchestrator = Orchestrator::builder(store, builtin_modules())
        .address_catalog(addresses.clone())
        .events(Arc::new(events))
        .settings(OrchestratorSettings {
            plugin_dir: config.plugin_dir.clone().into(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            disconnect_timeout: Duration::from_millis(config.disconnect_timeout_ms),
        })
        .build();

    let (control, receiver) = state_channel(CONTROL_CAPACITY);
    let state_loop = tokio::spawn(run_state_loop(orchestrator.clone(), receiver));
    if config.autostart {
        control.signal(domain::StateCommand::Start)?;
    }

    let state = AppState {
        orchestrator,
        control,
        addresses,
    };
    let app = routes::create_router(state);

    info!(addr = %config.http_addr, topology = %config.topology_path, "fabric agent listening");
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 路由器随 AppState 释放后控制端关闭，状态循环停止拓扑并退出
    if let Err(err) = state_loop.await {
        error!(error = %err, "state loop terminated abnormally");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
