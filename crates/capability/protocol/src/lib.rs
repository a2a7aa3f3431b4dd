//! # 内置协议插件
//!
//! 随代理一起编译的传输插件，按模块注册到 [`ModuleTable`]：
//! - **fabric-file**：`log`，文件日志 Destination
//! - **fabric-mqtt**：`mqtt`，MQTT Destination + Subscribable（rumqttc）
//! - **fabric-modbus**：`modbus-tcp`，Modbus TCP Source + Subscribable（tokio-modbus，订阅由 Poller 轮询）
//!
//! ## 配置格式
//!
//! ### log
//! ```json
//! { "connectionString": "", "parameters": { "filepath": "/var/log/fabric/route.log" } }
//! ```
//!
//! ### mqtt
//! ```json
//! { "connectionString": "broker.local", "parameters": { "Port": "1883", "Username": "u", "Password": "p", "Topic1": "plant/#" } }
//! ```
//!
//! ### modbus-tcp
//! ```json
//! // address: hr:<register>:<count> | ir:<register>:<count>
//! { "connectionString": "192.168.1.100", "parameters": { "Port": "502", "SlaveId": "1", "PollIntervalMs": "1000" } }
//! ```

mod log_file;
mod modbus_tcp;
mod mqtt;
mod params;

pub use log_file::LogPlugin;
pub use modbus_tcp::{ModbusAddress, ModbusTcpPlugin, RegisterKind};
pub use mqtt::{MqttPlugin, ReconnectPolicy};

use fabric_plugin::ProtocolPlugin;
use fabric_registry::{ModuleTable, PluginModule};
use std::sync::Arc;

pub const FILE_MODULE: &str = "fabric-file";
pub const MQTT_MODULE: &str = "fabric-mqtt";
pub const MODBUS_MODULE: &str = "fabric-modbus";

/// 内置模块表。
pub fn builtin_modules() -> ModuleTable {
    ModuleTable::new()
        .with_module(
            PluginModule::new(FILE_MODULE)
                .with_factory(|| Arc::new(LogPlugin::new()) as Arc<dyn ProtocolPlugin>),
        )
        .with_module(
            PluginModule::new(MQTT_MODULE)
                .with_factory(|| Arc::new(MqttPlugin::new()) as Arc<dyn ProtocolPlugin>),
        )
        .with_module(
            PluginModule::new(MODBUS_MODULE)
                .with_factory(|| Arc::new(ModbusTcpPlugin::new()) as Arc<dyn ProtocolPlugin>),
        )
}
