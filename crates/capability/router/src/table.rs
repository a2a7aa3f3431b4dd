use crate::entry::{DeliveryFailure, DestinationTarget, RouteEntry, RouteOutcome, RouteSummary};
use domain::RoutingKey;
use fabric_filter::FilterChain;
use fabric_plugin::PluginError;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

/// 路由表。
#[derive(Debug, Default)]
pub struct RoutingTable {
    rules: RwLock<HashMap<RoutingKey, Arc<RouteEntry>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 定义规则，替换同键的旧规则；目的地顺序即发布顺序。
    pub fn define_rule(
        &self,
        plugin_id: &str,
        address: &str,
        destinations: Vec<DestinationTarget>,
    ) {
        self.define_rule_with_filters(plugin_id, address, destinations, FilterChain::new());
    }

    pub fn define_rule_with_filters(
        &self,
        plugin_id: &str,
        address: &str,
        destinations: Vec<DestinationTarget>,
        filters: FilterChain,
    ) {
        let key = RoutingKey::new(plugin_id, address);
        debug!(
            target: "fabric.router",
            key = %key,
            destinations = destinations.len(),
            filters = filters.len(),
            "rule_defined"
        );
        let entry = Arc::new(RouteEntry {
            key: key.clone(),
            destinations,
            filters,
        });
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        rules.insert(key, entry);
    }

    pub fn remove_rule(&self, plugin_id: &str, address: &str) -> bool {
        let key = RoutingKey::new(plugin_id, address);
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        rules.remove(&key).is_some()
    }

    pub fn clear(&self) {
        let mut rules = self.rules.write().unwrap_or_else(|e| e.into_inner());
        rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, plugin_id: &str, address: &str) -> bool {
        let key = RoutingKey::new(plugin_id, address);
        self.rules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&key)
    }

    /// 按键排序的规则快照。
    pub fn routes(&self) -> Vec<RouteSummary> {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        let mut summaries: Vec<RouteSummary> = rules
            .values()
            .map(|entry| RouteSummary {
                key: entry.key.clone(),
                destinations: entry
                    .destinations
                    .iter()
                    .map(|target| format!("{}/{}", target.plugin_id(), target.address()))
                    .collect(),
                filters: entry.filters.kinds(),
            })
            .collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        summaries
    }

    fn lookup(&self, plugin_id: &str, address: &str) -> Option<Arc<RouteEntry>> {
        let key = RoutingKey::new(plugin_id, address);
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules.get(&key).cloned()
    }

    fn miss(plugin_id: &str, address: &str) -> RouteOutcome {
        fabric_telemetry::record_dropped_unmapped();
        warn!(
            target: "fabric.router",
            plugin_id = %plugin_id,
            address = %address,
            "no routing rule, payload dropped"
        );
        RouteOutcome::unmatched()
    }

    /// 同步路由（在调用线程上依次发布）。
    ///
    /// 供运行时之外的插件线程（如轮询线程）或多线程运行时调用；
    /// 在 current-thread 运行时内每个目的地都会以 `INTERNAL.RUNTIME` 失败，应改用 [`route_async`](Self::route_async)。
    pub fn route(&self, plugin_id: &str, address: &str, payload: &[u8]) -> RouteOutcome {
        let Some(entry) = self.lookup(plugin_id, address) else {
            return Self::miss(plugin_id, address);
        };
        let payload = match entry.filters.apply(payload) {
            Ok(filtered) => filtered,
            Err(err) => return filter_rejected(&entry, &err),
        };

        let mut outcome = matched();
        for target in &entry.destinations {
            let started = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| publish_blocking(target, &payload)))
                .unwrap_or_else(|_| Err(PluginError::Panicked(target.plugin_id().to_string())));
            record(&mut outcome, &entry.key, target, result, started);
        }
        outcome
    }

    /// 异步路由。
    pub async fn route_async(&self, plugin_id: &str, address: &str, payload: &[u8]) -> RouteOutcome {
        let Some(entry) = self.lookup(plugin_id, address) else {
            return Self::miss(plugin_id, address);
        };
        let payload = match entry.filters.apply_async(payload).await {
            Ok(filtered) => filtered,
            Err(err) => return filter_rejected(&entry, &err),
        };

        let mut outcome = matched();
        for target in &entry.destinations {
            let started = Instant::now();
            let result = AssertUnwindSafe(publish(target, &payload))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(PluginError::Panicked(target.plugin_id().to_string())));
            record(&mut outcome, &entry.key, target, result, started);
        }
        outcome
    }
}

fn not_destination(target: &DestinationTarget) -> PluginError {
    PluginError::Address(format!("{} is not a destination", target.plugin_id()))
}

fn publish_blocking(target: &DestinationTarget, payload: &[u8]) -> Result<(), PluginError> {
    let plugin = target.plugin()?;
    match plugin.as_destination() {
        Some(destination) => destination.publish_blocking(target.address(), payload),
        None => Err(not_destination(target)),
    }
}

async fn publish(target: &DestinationTarget, payload: &[u8]) -> Result<(), PluginError> {
    let plugin = target.plugin()?;
    match plugin.as_destination() {
        Some(destination) => destination.publish(target.address(), payload).await,
        None => Err(not_destination(target)),
    }
}

fn matched() -> RouteOutcome {
    fabric_telemetry::record_data_routed();
    RouteOutcome {
        matched: true,
        ..RouteOutcome::default()
    }
}

fn filter_rejected(entry: &RouteEntry, err: &fabric_filter::FilterError) -> RouteOutcome {
    fabric_telemetry::record_filter_failure();
    warn!(
        target: "fabric.router",
        key = %entry.key,
        error = %err,
        "filter rejected payload"
    );
    RouteOutcome {
        matched: true,
        delivered: 0,
        failed: entry.destinations.len(),
        failures: entry
            .destinations
            .iter()
            .map(|target| DeliveryFailure {
                plugin_id: target.plugin_id().to_string(),
                address: target.address().to_string(),
                message: err.to_string(),
                code: err.code(),
            })
            .collect(),
    }
}

fn record(
    outcome: &mut RouteOutcome,
    key: &RoutingKey,
    target: &DestinationTarget,
    result: Result<(), PluginError>,
    started: Instant,
) {
    fabric_telemetry::record_publish_latency_ms(started.elapsed().as_millis() as u64);
    match result {
        Ok(()) => {
            fabric_telemetry::record_publish_success();
            outcome.delivered += 1;
        }
        Err(err) => {
            fabric_telemetry::record_publish_failure();
            warn!(
                target: "fabric.router",
                key = %key,
                destination = %target.plugin_id(),
                address = %target.address(),
                error = %err,
                "publish failed"
            );
            outcome.failed += 1;
            outcome.failures.push(DeliveryFailure {
                plugin_id: target.plugin_id().to_string(),
                address: target.address().to_string(),
                message: err.to_string(),
                code: err.code(),
            });
        }
    }
}
