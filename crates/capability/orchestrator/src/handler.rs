//! 插件事件 → 对外事件与路由。

use crate::orchestrator::OrchestratorInner;
use async_trait::async_trait;
use domain::{IntegrationEvent, now_epoch_ms};
use fabric_plugin::{PluginEvent, PluginEventHandler};
use std::sync::Weak;
use tracing::{debug, info};

/// 编排器挂到每个插件实例上的事件处理器。
///
/// 持有弱引用：实例由编排器拥有，处理器不延长编排器生命周期。
/// 处理器绑定构建时的拓扑代数，拓扑拆除后旧实例的事件一律丢弃。
pub(crate) struct OrchestratorEventHandler {
    inner: Weak<OrchestratorInner>,
    generation: u64,
}

impl OrchestratorEventHandler {
    pub(crate) fn new(inner: Weak<OrchestratorInner>, generation: u64) -> Self {
        Self { inner, generation }
    }
}

#[async_trait]
impl PluginEventHandler for OrchestratorEventHandler {
    async fn handle(&self, plugin_id: &str, event: PluginEvent) {
        let Some(inner) = self.inner.upgrade() else {
            debug!(target: "fabric.orchestrator", plugin_id = %plugin_id, "orchestrator gone, plugin event dropped");
            return;
        };
        if !inner.is_current(self.generation) {
            fabric_telemetry::record_dropped_stale();
            debug!(
                target: "fabric.orchestrator",
                plugin_id = %plugin_id,
                generation = self.generation,
                "event from retired instance dropped"
            );
            return;
        }
        match event {
            PluginEvent::ConnectionStateChanged { status, message } => {
                fabric_telemetry::record_connection_state_change();
                info!(
                    target: "fabric.orchestrator",
                    plugin_id = %plugin_id,
                    status = ?status,
                    message = message.as_deref().unwrap_or(""),
                    "connection_state_changed"
                );
                inner
                    .publish(IntegrationEvent::ConnectionStateChanged {
                        plugin_id: plugin_id.to_string(),
                        status,
                        message,
                        ts_ms: now_epoch_ms(),
                    })
                    .await;
            }
            PluginEvent::Error {
                message,
                address,
                code,
            } => {
                inner
                    .report(
                        Some(plugin_id),
                        message,
                        address.as_deref(),
                        code.as_deref().unwrap_or("PLUGIN.ERROR"),
                    )
                    .await;
            }
            PluginEvent::DataReceived {
                address,
                payload,
                received_at_ms,
            } => {
                inner.on_data(plugin_id, address, payload, received_at_ms).await;
            }
        }
    }
}
