//! Modbus TCP 插件（tokio-modbus）。
//!
//! 地址格式 `hr:<register>:<count>`（保持寄存器）或 `ir:<register>:<count>`（输入寄存器），
//! 读取结果按寄存器顺序以大端字节输出。订阅的地址由各自的 [`Poller`] 按 `PollIntervalMs` 轮询，
//! 每轮读取成功即发出 `DataReceived`。断开与取消订阅会等待轮询线程退出，
//! 返回后不再有该地址的数据事件。

use crate::params;
use async_trait::async_trait;
use domain::ConnectionStatus;
use fabric_plugin::{
    Parameters, PluginBinding, PluginContext, PluginError, ProtocolPlugin, Source, Subscribable,
};
use fabric_poller::Poller;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

const PORT: &str = "Port";
const SLAVE_ID: &str = "SlaveId";
const POLL_INTERVAL_MS: &str = "PollIntervalMs";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const POLLER_JOIN_GRACE: Duration = Duration::from_secs(2);

/// 寄存器类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// 保持寄存器（功能码 0x03）
    Holding,
    /// 输入寄存器（功能码 0x04）
    Input,
}

/// 解析后的寄存器地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusAddress {
    pub kind: RegisterKind,
    pub register: u16,
    pub count: u16,
}

impl FromStr for ModbusAddress {
    type Err = PluginError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || PluginError::Address(value.to_string());
        let mut parts = value.trim().split(':');
        let kind = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("hr") => RegisterKind::Holding,
            Some("ir") => RegisterKind::Input,
            _ => return Err(invalid()),
        };
        let register = parts
            .next()
            .and_then(|raw| raw.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let count = match parts.next() {
            Some(raw) => raw.parse::<u16>().map_err(|_| invalid())?,
            None => 1,
        };
        // 单次读取上限 125 个寄存器
        if parts.next().is_some() || count == 0 || count > 125 {
            return Err(invalid());
        }
        Ok(Self {
            kind,
            register,
            count,
        })
    }
}

impl fmt::Display for ModbusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            RegisterKind::Holding => "hr",
            RegisterKind::Input => "ir",
        };
        write!(f, "{}:{}:{}", prefix, self.register, self.count)
    }
}

/// 寄存器按大端序展开为字节。
pub(crate) fn registers_to_bytes(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_be_bytes()).collect()
}

#[derive(Default)]
struct ModbusShared {
    binding: PluginBinding,
    context: Mutex<Option<Context>>,
    connected: AtomicBool,
    poll_interval_ms: AtomicU64,
}

impl ModbusShared {
    async fn read(&self, address: ModbusAddress) -> Result<Vec<u8>, PluginError> {
        let mut guard = self.context.lock().await;
        let ctx = guard.as_mut().ok_or(PluginError::NotConnected)?;

        let registers = match address.kind {
            RegisterKind::Holding => ctx
                .read_holding_registers(address.register, address.count)
                .await
                .map_err(|e| PluginError::Transport(e.to_string()))?
                .map_err(|e| PluginError::Transport(format!("exception: {:?}", e)))?,
            RegisterKind::Input => ctx
                .read_input_registers(address.register, address.count)
                .await
                .map_err(|e| PluginError::Transport(e.to_string()))?
                .map_err(|e| PluginError::Transport(format!("exception: {:?}", e)))?,
        };

        debug!(
            target: "fabric.protocol",
            register = address.register,
            count = address.count,
            values = ?registers,
            "modbus_registers_read"
        );
        Ok(registers_to_bytes(&registers))
    }

    /// 轮询一次订阅地址。
    async fn poll(&self, raw: &str, address: ModbusAddress) -> Result<(), PluginError> {
        match self.read(address).await {
            Ok(payload) => {
                self.binding.data_received(raw, payload).await;
                Ok(())
            }
            Err(err) => {
                self.binding
                    .error(err.to_string(), Some(raw.to_string()), Some(err.code().to_string()))
                    .await;
                Err(err)
            }
        }
    }
}

/// Modbus TCP Source + Subscribable。
pub struct ModbusTcpPlugin {
    shared: Arc<ModbusShared>,
    pollers: StdMutex<HashMap<String, Poller>>,
}

impl Default for ModbusTcpPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ModbusTcpPlugin {
    pub const KIND: &'static str = "modbus-tcp";

    pub fn new() -> Self {
        let shared = ModbusShared::default();
        shared
            .poll_interval_ms
            .store(DEFAULT_POLL_INTERVAL_MS, Ordering::SeqCst);
        Self {
            shared: Arc::new(shared),
            pollers: StdMutex::new(HashMap::new()),
        }
    }

    /// 当前订阅的地址。
    pub fn subscriptions(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.lock_pollers().keys().cloned().collect();
        addresses.sort();
        addresses
    }

    fn lock_pollers(&self) -> std::sync::MutexGuard<'_, HashMap<String, Poller>> {
        self.pollers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn stop_pollers(&self) {
        let pollers: Vec<Poller> = self.lock_pollers().drain().map(|(_, p)| p).collect();
        retire(pollers).await;
    }
}

/// 停止并等待轮询线程退出；超出宽限时间的线程留给自身在间隔边界结束。
async fn retire(pollers: Vec<Poller>) {
    if pollers.is_empty() {
        return;
    }
    for poller in &pollers {
        poller.stop();
    }
    let joined = tokio::task::spawn_blocking(move || {
        for poller in &pollers {
            if let Err(err) = poller.join() {
                warn!(target: "fabric.protocol", poller = %poller.name(), error = %err, "modbus_poller_join_failed");
            }
        }
    });
    match tokio::time::timeout(POLLER_JOIN_GRACE, joined).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(target: "fabric.protocol", error = %err, "modbus_poller_join_task_failed");
        }
        Err(_) => {
            warn!(target: "fabric.protocol", grace_ms = POLLER_JOIN_GRACE.as_millis() as u64, "modbus_poller_join_timed_out");
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, PluginError> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| PluginError::Connection(e.to_string()))?
        .next()
        .ok_or_else(|| PluginError::Connection(format!("cannot resolve {}:{}", host, port)))
}

#[async_trait]
impl ProtocolPlugin for ModbusTcpPlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn required_parameters(&self) -> Vec<String> {
        vec![PORT.to_string()]
    }

    fn attach(&self, context: PluginContext) {
        self.shared.binding.bind(context);
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, connection_string: &str, parameters: &Parameters) -> Result<(), PluginError> {
        let port: u16 = params::parse_required(parameters, PORT)?;
        let slave: u8 = params::parse_or(parameters, SLAVE_ID, 1)?;
        let poll_interval_ms: u64 =
            params::parse_or(parameters, POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(PluginError::InvalidParameter(
                POLL_INTERVAL_MS.to_string(),
                "0".to_string(),
            ));
        }
        let host = connection_string.trim();

        self.shared
            .binding
            .connection_state(ConnectionStatus::Connecting, None)
            .await;
        let connected = async {
            let addr = resolve(host, port).await?;
            tcp::connect_slave(addr, Slave(slave))
                .await
                .map_err(|e| PluginError::Connection(e.to_string()))
        }
        .await;
        let ctx = match connected {
            Ok(ctx) => ctx,
            Err(err) => {
                self.shared
                    .binding
                    .connection_state(ConnectionStatus::Disconnected, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        *self.shared.context.lock().await = Some(ctx);
        self.shared
            .poll_interval_ms
            .store(poll_interval_ms, Ordering::SeqCst);
        self.shared.connected.store(true, Ordering::SeqCst);
        info!(target: "fabric.protocol", host = %host, port, slave, "modbus_connected");
        self.shared
            .binding
            .connection_state(ConnectionStatus::Connected, None)
            .await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        self.stop_pollers().await;
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.context.lock().await.take();
        self.shared
            .binding
            .connection_state(ConnectionStatus::Disconnected, None)
            .await;
        Ok(())
    }

    fn as_source(&self) -> Option<&dyn Source> {
        Some(self)
    }

    fn as_subscribable(&self) -> Option<&dyn Subscribable> {
        Some(self)
    }
}

#[async_trait]
impl Source for ModbusTcpPlugin {
    async fn read_data(&self, address: &str) -> Result<Vec<u8>, PluginError> {
        let parsed: ModbusAddress = address.parse()?;
        self.shared.read(parsed).await
    }
}

#[async_trait]
impl Subscribable for ModbusTcpPlugin {
    async fn subscribe(&self, address: &str) -> Result<(), PluginError> {
        let parsed: ModbusAddress = address.parse()?;
        if !self.is_connected() {
            return Err(PluginError::NotConnected);
        }
        let handle = Handle::try_current().map_err(|e| PluginError::Runtime(e.to_string()))?;

        let mut pollers = self.lock_pollers();
        if pollers.contains_key(address) {
            return Ok(());
        }
        let interval = Duration::from_millis(self.shared.poll_interval_ms.load(Ordering::SeqCst));
        let shared = self.shared.clone();
        let raw = address.to_string();
        let name = format!(
            "{}:{}",
            self.shared.binding.plugin_id().unwrap_or_default(),
            address
        );
        let poller = Poller::new(name, interval, move || {
            handle
                .block_on(shared.poll(&raw, parsed))
                .map_err(Into::into)
        });
        poller
            .start()
            .map_err(|e| PluginError::Runtime(e.to_string()))?;
        pollers.insert(address.to_string(), poller);
        Ok(())
    }

    async fn unsubscribe(&self, address: &str) -> Result<(), PluginError> {
        let removed = self.lock_pollers().remove(address);
        match removed {
            Some(poller) => retire(vec![poller]).await,
            None => warn!(target: "fabric.protocol", address = %address, "modbus_unsubscribe_unknown"),
        }
        Ok(())
    }
}
