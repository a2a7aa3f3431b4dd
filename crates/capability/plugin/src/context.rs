//! 插件事件通道。
//!
//! 编排器在 attach 时把 PluginId 与事件处理器交给插件；
//! 插件在自己的任务/线程中调用处理器，事件按发生时刻送达。

use async_trait::async_trait;
use domain::{ConnectionStatus, now_epoch_ms};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// 插件发出的事件。
#[derive(Debug, Clone)]
pub enum PluginEvent {
    /// 连接状态变化
    ConnectionStateChanged {
        status: ConnectionStatus,
        message: Option<String>,
    },
    /// 错误通知
    Error {
        message: String,
        address: Option<String>,
        code: Option<String>,
    },
    /// 数据到达（Subscribable）
    DataReceived {
        address: String,
        payload: Vec<u8>,
        received_at_ms: i64,
    },
}

/// 插件事件处理器
#[async_trait]
pub trait PluginEventHandler: Send + Sync {
    async fn handle(&self, plugin_id: &str, event: PluginEvent);
}

/// 丢弃所有事件（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopEventHandler;

#[async_trait]
impl PluginEventHandler for NoopEventHandler {
    async fn handle(&self, _plugin_id: &str, _event: PluginEvent) {}
}

/// 插件运行上下文。
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: String,
    handler: Arc<dyn PluginEventHandler>,
}

impl PluginContext {
    pub fn new(plugin_id: impl Into<String>, handler: Arc<dyn PluginEventHandler>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            handler,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub async fn emit(&self, event: PluginEvent) {
        self.handler.handle(&self.plugin_id, event).await;
    }

    pub async fn connection_state(&self, status: ConnectionStatus, message: Option<String>) {
        self.emit(PluginEvent::ConnectionStateChanged { status, message })
            .await;
    }

    pub async fn error(
        &self,
        message: impl Into<String>,
        address: Option<String>,
        code: Option<String>,
    ) {
        self.emit(PluginEvent::Error {
            message: message.into(),
            address,
            code,
        })
        .await;
    }

    pub async fn data_received(&self, address: impl Into<String>, payload: Vec<u8>) {
        self.emit(PluginEvent::DataReceived {
            address: address.into(),
            payload,
            received_at_ms: now_epoch_ms(),
        })
        .await;
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .finish()
    }
}

/// 插件内部持有上下文的辅助结构。
///
/// 未绑定前发出的事件被丢弃（debug 日志）。
#[derive(Debug, Default)]
pub struct PluginBinding {
    context: RwLock<Option<PluginContext>>,
}

impl PluginBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, context: PluginContext) {
        let mut guard = self
            .context
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(context);
    }

    pub fn context(&self) -> Option<PluginContext> {
        self.context
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn plugin_id(&self) -> Option<String> {
        self.context().map(|ctx| ctx.plugin_id().to_string())
    }

    pub async fn emit(&self, event: PluginEvent) {
        match self.context() {
            Some(ctx) => ctx.emit(event).await,
            None => debug!(?event, "plugin event dropped: not attached"),
        }
    }

    pub async fn connection_state(&self, status: ConnectionStatus, message: Option<String>) {
        self.emit(PluginEvent::ConnectionStateChanged { status, message })
            .await;
    }

    pub async fn error(&self, message: impl Into<String>, address: Option<String>, code: Option<String>) {
        self.emit(PluginEvent::Error {
            message: message.into(),
            address,
            code,
        })
        .await;
    }

    pub async fn data_received(&self, address: impl Into<String>, payload: Vec<u8>) {
        self.emit(PluginEvent::DataReceived {
            address: address.into(),
            payload,
            received_at_ms: now_epoch_ms(),
        })
        .await;
    }
}
