//! 编排器测试共用的内存插件与拓扑构造。

#![allow(dead_code)]

use async_trait::async_trait;
use domain::{
    Capability, CapabilitySet, ConnectionConfig, DestinationMapConfig, IntegrationEvent,
    PluginDescriptor, RoutingRule,
};
use fabric_events::IntegrationEventSink;
use fabric_plugin::{
    Browsable, Destination, Parameters, PluginBinding, PluginContext, PluginError,
    ProtocolPlugin, Source, Subscribable,
};
use fabric_registry::{ModuleTable, PluginModule};
use fabric_storage::Topology;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 测试插件行为。
#[derive(Debug, Clone, Copy, Default)]
pub struct Behavior {
    pub source: bool,
    pub destination: bool,
    pub subscribable: bool,
    pub browsable: bool,
    pub fail_connect: bool,
    pub hang_disconnect: bool,
    pub fail_publish: bool,
}

/// 内存插件：记录所有调用。
pub struct MockPlugin {
    kind: &'static str,
    behavior: Behavior,
    binding: PluginBinding,
    connected: AtomicBool,
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
    pub subscribed: Mutex<Vec<String>>,
    pub disconnects: AtomicUsize,
}

impl MockPlugin {
    fn new(kind: &'static str, behavior: Behavior) -> Self {
        Self {
            kind,
            behavior,
            binding: PluginBinding::new(),
            connected: AtomicBool::new(false),
            published: Mutex::new(Vec::new()),
            subscribed: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn plugin_id(&self) -> Option<String> {
        self.binding.plugin_id()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    /// 模拟传输层推送数据。
    pub async fn push(&self, address: &str, payload: &[u8]) {
        self.binding.data_received(address, payload.to_vec()).await;
    }

    pub async fn raise(&self, message: &str) {
        self.binding
            .error(message, None, Some("TRANSPORT.IO".to_string()))
            .await;
    }
}

#[async_trait]
impl ProtocolPlugin for MockPlugin {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn required_parameters(&self) -> Vec<String> {
        vec!["Port".to_string()]
    }

    fn attach(&self, context: PluginContext) {
        self.binding.bind(context);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, _: &str, _: &Parameters) -> Result<(), PluginError> {
        if self.behavior.fail_connect {
            return Err(PluginError::Connection("refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.behavior.hang_disconnect {
            std::future::pending::<()>().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn as_source(&self) -> Option<&dyn Source> {
        self.behavior.source.then_some(self as &dyn Source)
    }

    fn as_destination(&self) -> Option<&dyn Destination> {
        self.behavior.destination.then_some(self as &dyn Destination)
    }

    fn as_subscribable(&self) -> Option<&dyn Subscribable> {
        self.behavior.subscribable.then_some(self as &dyn Subscribable)
    }

    fn as_browsable(&self) -> Option<&dyn Browsable> {
        self.behavior.browsable.then_some(self as &dyn Browsable)
    }
}

#[async_trait]
impl Source for MockPlugin {
    async fn read_data(&self, address: &str) -> Result<Vec<u8>, PluginError> {
        Ok(address.as_bytes().to_vec())
    }
}

#[async_trait]
impl Destination for MockPlugin {
    async fn publish(&self, address: &str, data: &[u8]) -> Result<(), PluginError> {
        if self.behavior.fail_publish {
            return Err(PluginError::Transport("publish rejected".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((address.to_string(), data.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl Subscribable for MockPlugin {
    async fn subscribe(&self, address: &str) -> Result<(), PluginError> {
        self.subscribed.lock().unwrap().push(address.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, address: &str) -> Result<(), PluginError> {
        self.subscribed.lock().unwrap().retain(|a| a != address);
        Ok(())
    }
}

#[async_trait]
impl Browsable for MockPlugin {
    async fn browse(&self) -> Result<Vec<String>, PluginError> {
        Ok(vec!["hr:0:2".to_string(), "hr:10:2".to_string()])
    }
}

/// 记录所有工厂创建的实例。
#[derive(Default, Clone)]
pub struct Created {
    plugins: Arc<Mutex<Vec<Arc<MockPlugin>>>>,
}

impl Created {
    /// 已被 attach 到指定连接的实例（最近一次）。
    pub fn attached(&self, connection_id: &str) -> Option<Arc<MockPlugin>> {
        self.plugins
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.plugin_id().as_deref() == Some(connection_id))
            .cloned()
    }

    pub fn all_attached(&self, connection_id: &str) -> Vec<Arc<MockPlugin>> {
        self.plugins
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.plugin_id().as_deref() == Some(connection_id))
            .cloned()
            .collect()
    }
}

fn factory(
    created: &Created,
    kind: &'static str,
    behavior: Behavior,
) -> impl Fn() -> Arc<dyn ProtocolPlugin> + Send + Sync + 'static {
    let created = created.clone();
    move || {
        let plugin = Arc::new(MockPlugin::new(kind, behavior));
        created.plugins.lock().unwrap().push(plugin.clone());
        plugin as Arc<dyn ProtocolPlugin>
    }
}

pub const SOURCE: Behavior = Behavior {
    source: true,
    destination: false,
    subscribable: true,
    browsable: true,
    fail_connect: false,
    hang_disconnect: false,
    fail_publish: false,
};

pub const SINK: Behavior = Behavior {
    source: false,
    destination: true,
    subscribable: false,
    browsable: false,
    fail_connect: false,
    hang_disconnect: false,
    fail_publish: false,
};

/// 模块 "mock"：source / sink / flaky-sink / hanging-sink / failing-sink。
pub fn module_table(created: &Created) -> ModuleTable {
    ModuleTable::new().with_module(
        PluginModule::new("mock")
            .with_factory(factory(created, "mock-source", SOURCE))
            .with_factory(factory(created, "mock-sink", SINK))
            .with_factory(factory(
                created,
                "mock-flaky",
                Behavior {
                    fail_connect: true,
                    ..SINK
                },
            ))
            .with_factory(factory(
                created,
                "mock-hang",
                Behavior {
                    hang_disconnect: true,
                    ..SINK
                },
            ))
            .with_factory(factory(
                created,
                "mock-broken",
                Behavior {
                    fail_publish: true,
                    ..SINK
                },
            )),
    )
}

/// 写入模块清单的插件根目录。
pub fn plugin_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fabric-orchestrator-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("mock")).unwrap();
    std::fs::write(
        dir.join("mock").join("mock.module.json"),
        r#"{"module":"mock","version":"0.1.0"}"#,
    )
    .unwrap();
    dir
}

pub fn descriptor(id: &str, plugin_type: &str, caps: &[Capability]) -> PluginDescriptor {
    PluginDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        version: "0.1.0".to_string(),
        location: "mock".to_string(),
        plugin_type: plugin_type.to_string(),
        required_parameters: Vec::new(),
        capabilities: caps.iter().copied().collect::<CapabilitySet>(),
    }
}

pub fn connection(id: &str, plugin: &str) -> ConnectionConfig {
    ConnectionConfig {
        id: id.to_string(),
        name: id.to_string(),
        plugin: plugin.to_string(),
        connection_string: format!("{}.local", id),
        parameters: [("Port".to_string(), "1".to_string())].into_iter().collect(),
    }
}

pub fn rule(id: &str, connection_id: &str, address: &str) -> RoutingRule {
    RoutingRule {
        id: id.to_string(),
        connection_id: connection_id.to_string(),
        address: address.to_string(),
        filters: Vec::new(),
    }
}

pub fn map(id: &str, rule_id: &str, connection_id: &str, address: &str) -> DestinationMapConfig {
    DestinationMapConfig {
        id: id.to_string(),
        rule_id: rule_id.to_string(),
        connection_id: connection_id.to_string(),
        address: address.to_string(),
    }
}

/// plcA(TankLevel) → mqttB(plant/tank1)
pub fn plant_topology(sink_type: &str) -> Topology {
    Topology {
        plugins: vec![
            descriptor("modbus", "mock-source", &[Capability::Source]),
            descriptor("mqtt", sink_type, &[Capability::Destination]),
        ],
        connections: vec![connection("plcA", "modbus"), connection("mqttB", "mqtt")],
        rules: vec![rule("r1", "plcA", "TankLevel")],
        destinations: vec![map("d1", "r1", "mqttB", "plant/tank1")],
    }
}

/// 收集对外事件。
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<IntegrationEvent>>,
}

impl EventLog {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn events(&self) -> Vec<IntegrationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn error_codes(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                IntegrationEvent::PluginError { code, .. } => code.clone(),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl IntegrationEventSink for EventLog {
    async fn publish(&self, event: IntegrationEvent) {
        self.events.lock().unwrap().push(event);
    }
}
