//! 插件基础契约与能力接口。

use crate::blocking::block_on;
use crate::context::PluginContext;
use crate::error::PluginError;
use async_trait::async_trait;
use domain::{Capability, CapabilitySet};
use std::collections::BTreeMap;

/// 连接参数（键 → 值）。
pub type Parameters = BTreeMap<String, String>;

/// 插件基础契约。
///
/// 编排器是唯一允许调用 connect/disconnect 的组件。
#[async_trait]
pub trait ProtocolPlugin: Send + Sync {
    /// 插件类型标识（稳定、精确比对）
    fn kind(&self) -> &'static str;

    /// 连接前校验所需的配置键
    fn required_parameters(&self) -> Vec<String>;

    /// 绑定编排器分配的 PluginId 与事件处理器
    fn attach(&self, context: PluginContext);

    /// 当前是否已连接
    fn is_connected(&self) -> bool;

    /// 建立连接（超时策略由插件自身决定）
    async fn connect(
        &self,
        connection_string: &str,
        parameters: &Parameters,
    ) -> Result<(), PluginError>;

    /// 断开连接
    async fn disconnect(&self) -> Result<(), PluginError>;

    /// `connect` 的同步变体
    fn connect_blocking(
        &self,
        connection_string: &str,
        parameters: &Parameters,
    ) -> Result<(), PluginError> {
        block_on(self.connect(connection_string, parameters))?
    }

    /// `disconnect` 的同步变体
    fn disconnect_blocking(&self) -> Result<(), PluginError> {
        block_on(self.disconnect())?
    }

    fn as_source(&self) -> Option<&dyn Source> {
        None
    }

    fn as_destination(&self) -> Option<&dyn Destination> {
        None
    }

    fn as_subscribable(&self) -> Option<&dyn Subscribable> {
        None
    }

    fn as_browsable(&self) -> Option<&dyn Browsable> {
        None
    }

    /// 通过能力探测得到的能力集合。
    fn capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        if self.as_source().is_some() {
            set.insert(Capability::Source);
        }
        if self.as_destination().is_some() {
            set.insert(Capability::Destination);
        }
        if self.as_subscribable().is_some() {
            set.insert(Capability::Subscribable);
        }
        if self.as_browsable().is_some() {
            set.insert(Capability::Browsable);
        }
        set
    }
}

/// 拉取读取能力。
#[async_trait]
pub trait Source: Send + Sync {
    async fn read_data(&self, address: &str) -> Result<Vec<u8>, PluginError>;

    fn read_data_blocking(&self, address: &str) -> Result<Vec<u8>, PluginError> {
        block_on(self.read_data(address))?
    }
}

/// 发布能力。
#[async_trait]
pub trait Destination: Send + Sync {
    async fn publish(&self, address: &str, data: &[u8]) -> Result<(), PluginError>;

    fn publish_blocking(&self, address: &str, data: &[u8]) -> Result<(), PluginError> {
        block_on(self.publish(address, data))?
    }
}

/// 推送订阅能力；数据通过 `PluginEvent::DataReceived` 送达。
#[async_trait]
pub trait Subscribable: Send + Sync {
    async fn subscribe(&self, address: &str) -> Result<(), PluginError>;

    async fn unsubscribe(&self, address: &str) -> Result<(), PluginError>;

    fn subscribe_blocking(&self, address: &str) -> Result<(), PluginError> {
        block_on(self.subscribe(address))?
    }

    fn unsubscribe_blocking(&self, address: &str) -> Result<(), PluginError> {
        block_on(self.unsubscribe(address))?
    }
}

/// 地址发现能力。
#[async_trait]
pub trait Browsable: Send + Sync {
    async fn browse(&self) -> Result<Vec<String>, PluginError>;

    fn browse_blocking(&self) -> Result<Vec<String>, PluginError> {
        block_on(self.browse())?
    }
}
