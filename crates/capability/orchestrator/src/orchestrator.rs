use crate::error::OrchestratorError;
use crate::handler::OrchestratorEventHandler;
use crate::instance::{InstanceSummary, PluginInstance};
use domain::{
    Capability, ConnectionConfig, IntegrationEvent, PluginDescriptor, RoutingRule, ServiceStatus,
    StateCommand, now_epoch_ms,
};
use fabric_events::{IntegrationEventSink, NoopEventSink};
use fabric_filter::{FilterChain, FilterTable};
use fabric_plugin::{PluginContext, PluginError, PluginEventHandler};
use fabric_registry::{ModuleTable, PluginRegistry};
use fabric_router::{DestinationTarget, RouteSummary, RoutingTable};
use fabric_storage::{AddressCatalog, ConfigurationStore, NoopAddressCatalog};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// 编排参数。
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// 描述符 location 的根目录
    pub plugin_dir: PathBuf,
    /// 单个插件 connect/browse/subscribe 的上限
    pub connect_timeout: Duration,
    /// 单个插件 disconnect 的上限
    pub disconnect_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("plugins"),
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

/// 编排器构建器。
pub struct OrchestratorBuilder {
    store: Arc<dyn ConfigurationStore>,
    modules: Arc<ModuleTable>,
    addresses: Arc<dyn AddressCatalog>,
    events: Arc<dyn IntegrationEventSink>,
    filters: FilterTable,
    settings: OrchestratorSettings,
}

impl OrchestratorBuilder {
    pub fn address_catalog(mut self, addresses: Arc<dyn AddressCatalog>) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn events(mut self, events: Arc<dyn IntegrationEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn filters(mut self, filters: FilterTable) -> Self {
        self.filters = filters;
        self
    }

    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inner: Arc::new(OrchestratorInner {
                store: self.store,
                modules: self.modules,
                addresses: self.addresses,
                events: self.events,
                filters: self.filters,
                settings: self.settings,
                routing: RoutingTable::new(),
                active: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                status: RwLock::new(ServiceStatus::Stopped),
                instances: RwLock::new(Vec::new()),
                control: Mutex::new(ControlState::default()),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    /// Some 表示拓扑已构建
    registry: Option<PluginRegistry>,
}

pub(crate) struct OrchestratorInner {
    store: Arc<dyn ConfigurationStore>,
    modules: Arc<ModuleTable>,
    addresses: Arc<dyn AddressCatalog>,
    events: Arc<dyn IntegrationEventSink>,
    filters: FilterTable,
    settings: OrchestratorSettings,
    routing: RoutingTable,
    active: AtomicBool,
    /// 拓扑代数；每次拆除后递增，旧实例的事件据此丢弃
    generation: AtomicU64,
    status: RwLock<ServiceStatus>,
    instances: RwLock<Vec<PluginInstance>>,
    control: Mutex<ControlState>,
}

impl OrchestratorInner {
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    pub(crate) async fn publish(&self, event: IntegrationEvent) {
        self.events.publish(event).await;
    }

    /// 上报配置/传输错误：日志 + 指标 + 错误事件。
    pub(crate) async fn report(
        &self,
        plugin_id: Option<&str>,
        message: String,
        address: Option<&str>,
        code: &str,
    ) {
        fabric_telemetry::record_plugin_error();
        warn!(
            target: "fabric.orchestrator",
            plugin_id = plugin_id.unwrap_or("-"),
            address = address.unwrap_or("-"),
            code = %code,
            message = %message,
            "orchestration_error"
        );
        self.publish(IntegrationEvent::PluginError {
            plugin_id: plugin_id.map(str::to_string),
            message,
            address: address.map(str::to_string),
            code: Some(code.to_string()),
            ts_ms: now_epoch_ms(),
        })
        .await;
    }

    /// 插件上报的数据：转发事件，拓扑激活时路由。
    pub(crate) async fn on_data(
        &self,
        plugin_id: &str,
        address: String,
        payload: Vec<u8>,
        received_at_ms: i64,
    ) {
        fabric_telemetry::record_data_received();
        self.publish(IntegrationEvent::DataReceived {
            plugin_id: plugin_id.to_string(),
            address: address.clone(),
            payload: payload.clone(),
            ts_ms: received_at_ms,
        })
        .await;

        if !self.active.load(Ordering::Acquire) {
            fabric_telemetry::record_dropped_inactive();
            debug!(target: "fabric.orchestrator", plugin_id = %plugin_id, address = %address, "topology inactive, data dropped");
            return;
        }

        let outcome = self.routing.route_async(plugin_id, &address, &payload).await;
        if !outcome.matched {
            return;
        }
        for failure in &outcome.failures {
            self.report(
                Some(failure.plugin_id.as_str()),
                failure.message.clone(),
                Some(failure.address.as_str()),
                failure.code,
            )
            .await;
        }
        self.publish(IntegrationEvent::DataRouted {
            plugin_id: plugin_id.to_string(),
            address,
            delivered: outcome.delivered,
            failed: outcome.failed,
            ts_ms: now_epoch_ms(),
        })
        .await;
    }

    fn set_instances(&self, instances: Vec<PluginInstance>) -> Vec<PluginInstance> {
        let mut guard = self.instances.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, instances)
    }

    fn push_instance(&self, instance: PluginInstance) {
        let mut guard = self.instances.write().unwrap_or_else(|e| e.into_inner());
        guard.push(instance);
    }

    fn find_instance(&self, connection_id: &str) -> Option<PluginInstance> {
        self.instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|instance| instance.connection_id == connection_id)
            .cloned()
    }

    async fn set_status(&self, status: ServiceStatus) {
        {
            let mut guard = self.status.write().unwrap_or_else(|e| e.into_inner());
            *guard = status;
        }
        info!(target: "fabric.orchestrator", status = ?status, "service_status");
        self.publish(IntegrationEvent::ServiceStateChanged {
            status,
            ts_ms: now_epoch_ms(),
        })
        .await;
    }
}

/// 连接编排器（克隆共享同一拓扑）。
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn builder(store: Arc<dyn ConfigurationStore>, modules: ModuleTable) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            modules: Arc::new(modules),
            addresses: Arc::new(NoopAddressCatalog),
            events: Arc::new(NoopEventSink),
            filters: FilterTable::builtin(),
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn status(&self) -> ServiceStatus {
        *self.inner.status.read().unwrap_or_else(|e| e.into_inner())
    }

    /// 拓扑已构建且正在路由
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn routes(&self) -> Vec<RouteSummary> {
        self.inner.routing.routes()
    }

    pub fn instances(&self) -> Vec<InstanceSummary> {
        self.inner
            .instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(PluginInstance::summary)
            .collect()
    }

    pub async fn apply(&self, command: StateCommand) -> Result<(), OrchestratorError> {
        info!(target: "fabric.orchestrator", command = %command, "state_command");
        match command {
            StateCommand::Start => self.start().await,
            StateCommand::Stop => {
                self.stop().await;
                Ok(())
            }
            StateCommand::Restart => self.restart().await,
        }
    }

    /// 构建拓扑；已运行时先丢弃旧拓扑。
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let mut control = self.inner.control.lock().await;
        if control.registry.is_some() {
            info!(target: "fabric.orchestrator", "start on running topology, re-initializing");
            self.teardown(&mut control).await;
        }
        self.initialize(&mut control).await
    }

    /// 断开全部实例并清空目录与路由表；重复调用无副作用。
    pub async fn stop(&self) {
        let mut control = self.inner.control.lock().await;
        if control.registry.is_none() {
            debug!(target: "fabric.orchestrator", "stop on stopped topology");
            return;
        }
        self.teardown(&mut control).await;
    }

    pub async fn restart(&self) -> Result<(), OrchestratorError> {
        let mut control = self.inner.control.lock().await;
        if control.registry.is_some() {
            self.teardown(&mut control).await;
        }
        self.initialize(&mut control).await
    }

    /// 从 Source 连接按地址读取一次。
    pub async fn read(&self, connection_id: &str, address: &str) -> Result<Vec<u8>, OrchestratorError> {
        let instance = self
            .inner
            .find_instance(connection_id)
            .ok_or_else(|| OrchestratorError::UnknownConnection(connection_id.to_string()))?;
        let source = instance
            .plugin
            .as_source()
            .ok_or_else(|| OrchestratorError::Unsupported(connection_id.to_string(), "source"))?;
        let limit = self.inner.settings.connect_timeout;
        let data = timeout(limit, source.read_data(address))
            .await
            .map_err(|_| PluginError::Timeout(format!("read {} on {}", address, connection_id)))??;
        Ok(data)
    }

    async fn initialize(&self, control: &mut ControlState) -> Result<(), OrchestratorError> {
        self.inner.set_status(ServiceStatus::Starting).await;
        fabric_telemetry::record_topology_start();
        match self.build().await {
            Ok(registry) => {
                control.registry = Some(registry);
                self.inner.active.store(true, Ordering::Release);
                info!(
                    target: "fabric.orchestrator",
                    instances = self.inner.instances.read().map(|i| i.len()).unwrap_or(0),
                    routes = self.inner.routing.len(),
                    "topology_started"
                );
                self.inner.set_status(ServiceStatus::Running).await;
                Ok(())
            }
            Err(err) => {
                error!(target: "fabric.orchestrator", error = %err, "topology start failed");
                self.release(control).await;
                self.inner.set_status(ServiceStatus::Faulted).await;
                Err(err)
            }
        }
    }

    async fn teardown(&self, control: &mut ControlState) {
        self.inner.set_status(ServiceStatus::Stopping).await;
        self.release(control).await;
        fabric_telemetry::record_topology_stop();
        self.inner.set_status(ServiceStatus::Stopped).await;
    }

    /// 停止路由、清空路由表、并发断开全部实例、清空插件目录。
    async fn release(&self, control: &mut ControlState) {
        let inner = &self.inner;
        inner.active.store(false, Ordering::Release);
        inner.routing.clear();

        let instances = inner.set_instances(Vec::new());
        let limit = inner.settings.disconnect_timeout;
        let mut tasks = JoinSet::new();
        for instance in instances {
            tasks.spawn(async move {
                let result = timeout(limit, instance.plugin.disconnect()).await;
                (instance.connection_id, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((connection_id, Ok(Ok(())))) => {
                    debug!(target: "fabric.orchestrator", connection_id = %connection_id, "plugin disconnected");
                }
                Ok((connection_id, Ok(Err(err)))) => {
                    warn!(target: "fabric.orchestrator", connection_id = %connection_id, error = %err, "disconnect failed");
                }
                Ok((connection_id, Err(_))) => {
                    warn!(
                        target: "fabric.orchestrator",
                        connection_id = %connection_id,
                        timeout_ms = limit.as_millis() as u64,
                        "disconnect timed out"
                    );
                }
                Err(err) => {
                    warn!(target: "fabric.orchestrator", error = %err, "disconnect task failed");
                }
            }
        }

        if let Some(mut registry) = control.registry.take() {
            registry.clear();
        }
        let retired = inner.generation.fetch_add(1, Ordering::AcqRel);
        debug!(target: "fabric.orchestrator", generation = retired, "topology generation retired");
    }

    async fn build(&self) -> Result<PluginRegistry, OrchestratorError> {
        let inner = &self.inner;
        inner.store.refresh().await?;
        let descriptors = inner.store.get_all_plugin_descriptors().await?;
        let connections = inner.store.get_all_connection_configs().await?;

        let mut registry = PluginRegistry::new(inner.modules.clone(), inner.settings.plugin_dir.clone());
        registry.load_all(&descriptors)?;
        let descriptors: HashMap<&str, &PluginDescriptor> =
            descriptors.iter().map(|d| (d.id.as_str(), d)).collect();

        let handler: Arc<dyn PluginEventHandler> = Arc::new(OrchestratorEventHandler::new(
            Arc::downgrade(&self.inner),
            inner.generation.load(Ordering::Acquire),
        ));

        // 阶段一：实例化并连接
        for connection in &connections {
            if inner.find_instance(&connection.id).is_some() {
                inner
                    .report(
                        Some(connection.id.as_str()),
                        format!("duplicate connection id {}", connection.id),
                        None,
                        "CONFIG.DUPLICATE_CONNECTION",
                    )
                    .await;
                continue;
            }
            if let Some(instance) = self
                .connect_instance(&registry, &descriptors, connection, &handler)
                .await
            {
                inner.push_instance(instance);
            }
        }

        // 阶段二：路由规则
        let live: HashMap<String, PluginInstance> = inner
            .instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|instance| (instance.connection_id.clone(), instance.clone()))
            .collect();
        for connection in &connections {
            let Some(source) = live.get(&connection.id) else {
                debug!(target: "fabric.orchestrator", connection_id = %connection.id, "connection skipped, rules ignored");
                continue;
            };
            let rules = inner
                .store
                .get_all_routing_rules_for_connection(&connection.id)
                .await?;
            for rule in &rules {
                self.define_rule(source, rule, &live).await?;
            }
        }

        Ok(registry)
    }

    async fn connect_instance(
        &self,
        registry: &PluginRegistry,
        descriptors: &HashMap<&str, &PluginDescriptor>,
        connection: &ConnectionConfig,
        handler: &Arc<dyn PluginEventHandler>,
    ) -> Option<PluginInstance> {
        let inner = &self.inner;
        let id = connection.id.as_str();

        let Some(descriptor) = descriptors.get(connection.plugin.as_str()) else {
            inner
                .report(
                    Some(id),
                    format!("unknown plugin descriptor {}", connection.plugin),
                    None,
                    "CONFIG.UNKNOWN_PLUGIN",
                )
                .await;
            return None;
        };
        let Some(entry) = registry.resolve(descriptor) else {
            inner
                .report(
                    Some(id),
                    format!(
                        "no plugin of type {} with capabilities {} at {}",
                        descriptor.plugin_type, descriptor.capabilities, descriptor.location
                    ),
                    None,
                    "CONFIG.UNRESOLVED_PLUGIN",
                )
                .await;
            return None;
        };

        let mut required = entry.required_parameters().to_vec();
        for key in &descriptor.required_parameters {
            if !required.contains(key) {
                required.push(key.clone());
            }
        }
        let missing = connection.missing_parameters(&required);
        if !missing.is_empty() {
            inner
                .report(
                    Some(id),
                    format!("missing required parameters: {}", missing.join(", ")),
                    None,
                    "CONFIG.MISSING_PARAMETER",
                )
                .await;
            return None;
        }

        let plugin = entry.instantiate();
        plugin.attach(PluginContext::new(id, handler.clone()));
        let capabilities = plugin.capabilities();
        let limit = inner.settings.connect_timeout;

        let connected = match timeout(
            limit,
            plugin.connect(&connection.connection_string, &connection.parameters),
        )
        .await
        {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                inner
                    .report(Some(id), format!("connect failed: {}", err), None, err.code())
                    .await;
                false
            }
            Err(_) => {
                inner
                    .report(
                        Some(id),
                        format!("connect timed out after {} ms", limit.as_millis()),
                        None,
                        "TRANSPORT.TIMEOUT",
                    )
                    .await;
                false
            }
        };

        if connected {
            if let Some(browsable) = plugin.as_browsable() {
                match timeout(limit, browsable.browse()).await {
                    Ok(Ok(addresses)) => {
                        debug!(target: "fabric.orchestrator", connection_id = %id, count = addresses.len(), "addresses discovered");
                        inner.addresses.refresh_discovered_addresses(id, addresses).await;
                    }
                    Ok(Err(err)) => {
                        inner
                            .report(Some(id), format!("browse failed: {}", err), None, err.code())
                            .await;
                    }
                    Err(_) => {
                        inner
                            .report(Some(id), "browse timed out".to_string(), None, "TRANSPORT.TIMEOUT")
                            .await;
                    }
                }
            }
        }

        info!(
            target: "fabric.orchestrator",
            connection_id = %id,
            kind = entry.kind(),
            capabilities = %capabilities,
            connected,
            "plugin_instance_created"
        );
        Some(PluginInstance {
            connection_id: connection.id.clone(),
            kind: entry.kind(),
            capabilities,
            plugin,
            connected,
        })
    }

    async fn define_rule(
        &self,
        source: &PluginInstance,
        rule: &RoutingRule,
        live: &HashMap<String, PluginInstance>,
    ) -> Result<(), OrchestratorError> {
        let inner = &self.inner;
        let source_id = source.connection_id.as_str();
        let maps = inner.store.get_all_destination_maps_for_rule(&rule.id).await?;

        let mut destinations = Vec::with_capacity(maps.len());
        for map in &maps {
            match live.get(&map.connection_id) {
                None => {
                    inner
                        .report(
                            Some(source_id),
                            format!(
                                "destination map {} references unknown connection {}",
                                map.id, map.connection_id
                            ),
                            Some(map.address.as_str()),
                            "CONFIG.UNKNOWN_CONNECTION",
                        )
                        .await;
                }
                Some(target) if !target.capabilities.contains(Capability::Destination) => {
                    inner
                        .report(
                            Some(source_id),
                            format!(
                                "destination map {} dropped: {} is not a destination",
                                map.id, map.connection_id
                            ),
                            Some(map.address.as_str()),
                            "CONFIG.NOT_DESTINATION",
                        )
                        .await;
                }
                Some(target) if !target.connected => {
                    warn!(
                        target: "fabric.orchestrator",
                        rule_id = %rule.id,
                        destination = %map.connection_id,
                        address = %map.address,
                        "destination dropped: not connected"
                    );
                }
                Some(target) => {
                    destinations.push(DestinationTarget::new(
                        &target.connection_id,
                        &map.address,
                        &target.plugin,
                    ));
                }
            }
        }

        let mut chain = FilterChain::new();
        for config in &rule.filters {
            if let Err(err) = inner
                .filters
                .create(config)
                .and_then(|filter| chain.push(filter))
            {
                inner
                    .report(
                        Some(source_id),
                        format!("filter {} left out of rule {}: {}", config.kind, rule.id, err),
                        Some(rule.address.as_str()),
                        err.code(),
                    )
                    .await;
            }
        }

        if source.connected {
            if let Some(subscribable) = source.plugin.as_subscribable() {
                let limit = inner.settings.connect_timeout;
                match timeout(limit, subscribable.subscribe(&rule.address)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        inner
                            .report(
                                Some(source_id),
                                format!("subscribe failed: {}", err),
                                Some(rule.address.as_str()),
                                err.code(),
                            )
                            .await;
                    }
                    Err(_) => {
                        inner
                            .report(
                                Some(source_id),
                                "subscribe timed out".to_string(),
                                Some(rule.address.as_str()),
                                "TRANSPORT.TIMEOUT",
                            )
                            .await;
                    }
                }
            }
        }

        info!(
            target: "fabric.orchestrator",
            rule_id = %rule.id,
            source = %source_id,
            address = %rule.address,
            destinations = destinations.len(),
            filters = chain.len(),
            "rule_registered"
        );
        inner
            .routing
            .define_rule_with_filters(source_id, &rule.address, destinations, chain);
        Ok(())
    }
}
