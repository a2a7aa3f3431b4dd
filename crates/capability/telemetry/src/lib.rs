//! 追踪初始化、请求 ID 与路由指标。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 路由指标快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub data_received: u64,
    pub data_routed: u64,
    pub dropped_unmapped: u64,
    pub dropped_inactive: u64,
    pub dropped_stale: u64,
    pub publish_success: u64,
    pub publish_failure: u64,
    pub filter_failure: u64,
    pub plugin_errors: u64,
    pub connection_state_changes: u64,
    pub publish_latency_ms_total: u64,
    pub publish_latency_ms_count: u64,
    pub topology_starts: u64,
    pub topology_stops: u64,
}

/// 路由指标。
pub struct TelemetryMetrics {
    data_received: AtomicU64,
    data_routed: AtomicU64,
    dropped_unmapped: AtomicU64,
    dropped_inactive: AtomicU64,
    dropped_stale: AtomicU64,
    publish_success: AtomicU64,
    publish_failure: AtomicU64,
    filter_failure: AtomicU64,
    plugin_errors: AtomicU64,
    connection_state_changes: AtomicU64,
    publish_latency_ms_total: AtomicU64,
    publish_latency_ms_count: AtomicU64,
    topology_starts: AtomicU64,
    topology_stops: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            data_received: AtomicU64::new(0),
            data_routed: AtomicU64::new(0),
            dropped_unmapped: AtomicU64::new(0),
            dropped_inactive: AtomicU64::new(0),
            dropped_stale: AtomicU64::new(0),
            publish_success: AtomicU64::new(0),
            publish_failure: AtomicU64::new(0),
            filter_failure: AtomicU64::new(0),
            plugin_errors: AtomicU64::new(0),
            connection_state_changes: AtomicU64::new(0),
            publish_latency_ms_total: AtomicU64::new(0),
            publish_latency_ms_count: AtomicU64::new(0),
            topology_starts: AtomicU64::new(0),
            topology_stops: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            data_received: self.data_received.load(Ordering::Relaxed),
            data_routed: self.data_routed.load(Ordering::Relaxed),
            dropped_unmapped: self.dropped_unmapped.load(Ordering::Relaxed),
            dropped_inactive: self.dropped_inactive.load(Ordering::Relaxed),
            dropped_stale: self.dropped_stale.load(Ordering::Relaxed),
            publish_success: self.publish_success.load(Ordering::Relaxed),
            publish_failure: self.publish_failure.load(Ordering::Relaxed),
            filter_failure: self.filter_failure.load(Ordering::Relaxed),
            plugin_errors: self.plugin_errors.load(Ordering::Relaxed),
            connection_state_changes: self.connection_state_changes.load(Ordering::Relaxed),
            publish_latency_ms_total: self.publish_latency_ms_total.load(Ordering::Relaxed),
            publish_latency_ms_count: self.publish_latency_ms_count.load(Ordering::Relaxed),
            topology_starts: self.topology_starts.load(Ordering::Relaxed),
            topology_stops: self.topology_stops.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录插件上报的数据条数。
pub fn record_data_received() {
    metrics().data_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录命中路由规则的数据条数。
pub fn record_data_routed() {
    metrics().data_routed.fetch_add(1, Ordering::Relaxed);
}

/// 记录未命中规则而丢弃的数据。
pub fn record_dropped_unmapped() {
    metrics().dropped_unmapped.fetch_add(1, Ordering::Relaxed);
}

/// 记录拓扑未激活时到达而丢弃的数据。
pub fn record_dropped_inactive() {
    metrics().dropped_inactive.fetch_add(1, Ordering::Relaxed);
}

/// 记录已拆除拓扑中的实例迟到的事件。
pub fn record_dropped_stale() {
    metrics().dropped_stale.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish_success() {
    metrics().publish_success.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish_failure() {
    metrics().publish_failure.fetch_add(1, Ordering::Relaxed);
}

pub fn record_filter_failure() {
    metrics().filter_failure.fetch_add(1, Ordering::Relaxed);
}

pub fn record_plugin_error() {
    metrics().plugin_errors.fetch_add(1, Ordering::Relaxed);
}

pub fn record_connection_state_change() {
    metrics()
        .connection_state_changes
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录单次发布耗时（毫秒）。
pub fn record_publish_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .publish_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .publish_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_topology_start() {
    metrics().topology_starts.fetch_add(1, Ordering::Relaxed);
}

pub fn record_topology_stop() {
    metrics().topology_stops.fetch_add(1, Ordering::Relaxed);
}
