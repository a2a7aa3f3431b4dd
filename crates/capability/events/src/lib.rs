//! 对外事件出口。
//!
//! 连接状态、错误、数据到达与数据路由事件在发生时转发给外部观察者。
//! 核心不持久化这些事件。

use async_trait::async_trait;
use domain::IntegrationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 默认广播缓冲容量
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// 集成事件出口。
#[async_trait]
pub trait IntegrationEventSink: Send + Sync {
    async fn publish(&self, event: IntegrationEvent);
}

/// 丢弃事件（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopEventSink;

#[async_trait]
impl IntegrationEventSink for NoopEventSink {
    async fn publish(&self, _event: IntegrationEvent) {}
}

/// 基于 tokio broadcast 的事件总线。
///
/// 无订阅者时事件被丢弃；慢订阅者会收到 `Lagged`。
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<IntegrationEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntegrationEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[async_trait]
impl IntegrationEventSink for BroadcastEventBus {
    async fn publish(&self, event: IntegrationEvent) {
        if self.sender.send(event).is_err() {
            debug!(target: "fabric.events", "no event subscribers");
        }
    }
}

/// 将事件写入 tracing 日志。
#[derive(Debug, Default)]
pub struct TracingEventSink;

#[async_trait]
impl IntegrationEventSink for TracingEventSink {
    async fn publish(&self, event: IntegrationEvent) {
        match &event {
            IntegrationEvent::PluginError {
                plugin_id,
                message,
                address,
                code,
                ..
            } => {
                warn!(
                    target: "fabric.events",
                    plugin_id = plugin_id.as_deref().unwrap_or("-"),
                    address = address.as_deref().unwrap_or("-"),
                    code = code.as_deref().unwrap_or("-"),
                    message = %message,
                    "plugin_error"
                );
            }
            IntegrationEvent::ConnectionStateChanged {
                plugin_id,
                status,
                message,
                ..
            } => {
                info!(
                    target: "fabric.events",
                    plugin_id = %plugin_id,
                    status = ?status,
                    message = message.as_deref().unwrap_or(""),
                    "connection_state_changed"
                );
            }
            IntegrationEvent::ServiceStateChanged { status, .. } => {
                info!(target: "fabric.events", status = ?status, "service_state_changed");
            }
            IntegrationEvent::DataReceived { .. } | IntegrationEvent::DataRouted { .. } => {
                debug!(target: "fabric.events", event = event.name(), "data_event");
            }
        }
    }
}

/// 依次转发给多个出口。
#[derive(Clone, Default)]
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn IntegrationEventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn IntegrationEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl IntegrationEventSink for CompositeEventSink {
    async fn publish(&self, event: IntegrationEvent) {
        for sink in &self.sinks {
            sink.publish(event.clone()).await;
        }
    }
}
