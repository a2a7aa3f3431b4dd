use async_trait::async_trait;
use domain::FilterConfig;
use fabric_filter::{FilterChain, FilterTable};
use fabric_plugin::{Destination, Parameters, PluginContext, PluginError, ProtocolPlugin, Source};
use fabric_router::{DestinationTarget, RoutingTable};
use std::sync::{Arc, Mutex};
use std::thread;

/// 记录发布调用的目的地插件。
#[derive(Default)]
struct RecordingSink {
    fail: bool,
    panic: bool,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProtocolPlugin for RecordingSink {
    fn kind(&self) -> &'static str {
        "recording"
    }

    fn required_parameters(&self) -> Vec<String> {
        Vec::new()
    }

    fn attach(&self, _context: PluginContext) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn connect(&self, _: &str, _: &Parameters) -> Result<(), PluginError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_destination(&self) -> Option<&dyn Destination> {
        Some(self)
    }
}

#[async_trait]
impl Destination for RecordingSink {
    async fn publish(&self, address: &str, data: &[u8]) -> Result<(), PluginError> {
        if self.fail {
            return Err(PluginError::Transport("broker unreachable".to_string()));
        }
        if self.panic {
            panic!("sink driver crashed");
        }
        self.published
            .lock()
            .unwrap()
            .push((address.to_string(), data.to_vec()));
        Ok(())
    }
}

/// 只读源，不具备发布能力。
struct ReadOnly;

#[async_trait]
impl ProtocolPlugin for ReadOnly {
    fn kind(&self) -> &'static str {
        "read-only"
    }

    fn required_parameters(&self) -> Vec<String> {
        Vec::new()
    }

    fn attach(&self, _context: PluginContext) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn connect(&self, _: &str, _: &Parameters) -> Result<(), PluginError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_source(&self) -> Option<&dyn Source> {
        Some(self)
    }
}

#[async_trait]
impl Source for ReadOnly {
    async fn read_data(&self, _address: &str) -> Result<Vec<u8>, PluginError> {
        Ok(vec![0])
    }
}

fn sink(plugin: RecordingSink) -> (Arc<RecordingSink>, Arc<dyn ProtocolPlugin>) {
    let concrete = Arc::new(plugin);
    let erased: Arc<dyn ProtocolPlugin> = concrete.clone();
    (concrete, erased)
}

#[tokio::test]
async fn routes_payload_to_single_destination() {
    let table = RoutingTable::new();
    let (mqtt, mqtt_dyn) = sink(RecordingSink::default());
    table.define_rule(
        "plcA",
        "TankLevel",
        vec![DestinationTarget::new("mqttB", "plant/tank1", &mqtt_dyn)],
    );

    let payload = [0x00, 0x00, 0x80, 0x3F];
    let outcome = table.route_async("plcA", "TankLevel", &payload).await;

    assert!(outcome.matched);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(mqtt.published(), vec![("plant/tank1".to_string(), payload.to_vec())]);
}

#[tokio::test]
async fn latest_definition_replaces_previous_destinations() {
    let table = RoutingTable::new();
    let (old, old_dyn) = sink(RecordingSink::default());
    let (new, new_dyn) = sink(RecordingSink::default());
    table.define_rule("src", "a", vec![DestinationTarget::new("old", "x", &old_dyn)]);
    table.define_rule("src", "a", vec![DestinationTarget::new("new", "y", &new_dyn)]);

    table.route_async("src", "a", b"v").await;

    assert!(old.published().is_empty());
    assert_eq!(new.published().len(), 1);
    assert_eq!(table.len(), 1);
}

#[tokio::test]
async fn undefined_key_is_dropped_without_publishing() {
    let table = RoutingTable::new();
    let (dest, dest_dyn) = sink(RecordingSink::default());
    table.define_rule("src", "a", vec![DestinationTarget::new("d", "x", &dest_dyn)]);

    let outcome = table.route_async("src", "b", b"noise").await;
    assert!(!outcome.matched);
    assert_eq!(outcome.delivered + outcome.failed, 0);

    let outcome = table.route("other", "a", b"noise");
    assert!(!outcome.matched);
    assert!(dest.published().is_empty());
}

#[tokio::test]
async fn failing_destination_does_not_short_circuit_fan_out() {
    let table = RoutingTable::new();
    let (a, a_dyn) = sink(RecordingSink::default());
    let (_b, b_dyn) = sink(RecordingSink::failing());
    let (c, c_dyn) = sink(RecordingSink::default());
    table.define_rule(
        "src",
        "temp",
        vec![
            DestinationTarget::new("A", "a/out", &a_dyn),
            DestinationTarget::new("B", "b/out", &b_dyn),
            DestinationTarget::new("C", "c/out", &c_dyn),
        ],
    );

    let outcome = table.route_async("src", "temp", &[1, 2]).await;

    assert_eq!(outcome.delivered, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.failures[0].plugin_id, "B");
    assert_eq!(outcome.failures[0].code, "TRANSPORT.IO");
    assert_eq!(a.published().len(), 1);
    assert_eq!(c.published().len(), 1);
}

#[tokio::test]
async fn panicking_destination_is_isolated_in_spawned_task() {
    let table = Arc::new(RoutingTable::new());
    let (_b, b_dyn) = sink(RecordingSink::panicking());
    let (c, c_dyn) = sink(RecordingSink::default());
    table.define_rule(
        "src",
        "temp",
        vec![
            DestinationTarget::new("B", "b/out", &b_dyn),
            DestinationTarget::new("C", "c/out", &c_dyn),
        ],
    );

    let routing = table.clone();
    let outcome = tokio::spawn(async move { routing.route_async("src", "temp", &[7]).await })
        .await
        .expect("route task must not unwind");

    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.failures[0].plugin_id, "B");
    assert_eq!(outcome.failures[0].code, "PLUGIN.PANIC");
    assert_eq!(c.published(), vec![("c/out".to_string(), vec![7])]);
}

#[test]
fn sync_route_survives_panicking_destination() {
    let table = RoutingTable::new();
    let (_b, b_dyn) = sink(RecordingSink::panicking());
    let (c, c_dyn) = sink(RecordingSink::default());
    table.define_rule(
        "src",
        "temp",
        vec![
            DestinationTarget::new("B", "b/out", &b_dyn),
            DestinationTarget::new("C", "c/out", &c_dyn),
        ],
    );

    let outcome = table.route("src", "temp", &[7]);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.failures[0].code, "PLUGIN.PANIC");
    assert_eq!(c.published().len(), 1);
}

#[tokio::test]
async fn sync_route_inside_current_thread_runtime_fails_per_destination() {
    let table = RoutingTable::new();
    let (b, b_dyn) = sink(RecordingSink::default());
    table.define_rule("src", "temp", vec![DestinationTarget::new("B", "b/out", &b_dyn)]);

    let outcome = table.route("src", "temp", &[7]);
    assert_eq!(outcome.delivered, 0);
    assert_eq!(outcome.failures[0].code, "INTERNAL.RUNTIME");
    assert!(b.published().is_empty());

    let outcome = table.route_async("src", "temp", &[7]).await;
    assert_eq!(outcome.delivered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_routes_see_whole_destination_lists() {
    let table = Arc::new(RoutingTable::new());
    let (a, a_dyn) = sink(RecordingSink::default());
    let (b, b_dyn) = sink(RecordingSink::default());
    let (c, c_dyn) = sink(RecordingSink::default());
    let pair = {
        let (a_dyn, b_dyn) = (a_dyn.clone(), b_dyn.clone());
        move || {
            vec![
                DestinationTarget::new("A", "a", &a_dyn),
                DestinationTarget::new("B", "b", &b_dyn),
            ]
        }
    };
    let single = {
        let c_dyn = c_dyn.clone();
        move || vec![DestinationTarget::new("C", "c", &c_dyn)]
    };
    table.define_rule("src", "k", pair());

    let writer_table = table.clone();
    let writer = thread::spawn(move || {
        for round in 0..500 {
            if round % 2 == 0 {
                writer_table.define_rule("src", "k", single());
            } else {
                writer_table.define_rule("src", "k", pair());
            }
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let table = table.clone();
        readers.push(tokio::spawn(async move {
            let mut delivered = 0;
            for _ in 0..250 {
                let outcome = table.route_async("src", "k", b"v").await;
                assert!(outcome.matched);
                assert_eq!(outcome.failed, 0);
                assert!(
                    outcome.delivered == 1 || outcome.delivered == 2,
                    "partial destination list observed: {}",
                    outcome.delivered
                );
                delivered += outcome.delivered;
                tokio::task::yield_now().await;
            }
            delivered
        }));
    }

    let mut total = 0;
    for reader in readers {
        total += reader.await.unwrap();
    }
    writer.join().unwrap();

    // A 与 B 只会成对出现
    assert_eq!(a.published().len(), b.published().len());
    assert_eq!(
        a.published().len() + b.published().len() + c.published().len(),
        total
    );
}

#[tokio::test]
async fn empty_destination_list_is_a_matched_no_op() {
    let table = RoutingTable::new();
    table.define_rule("plcA", "TankLevel", Vec::new());

    let outcome = table.route_async("plcA", "TankLevel", &[0x00, 0x00, 0x80, 0x3F]).await;
    assert!(outcome.matched);
    assert_eq!(outcome.delivered + outcome.failed, 0);
}

#[tokio::test]
async fn dropped_plugin_and_non_destination_count_as_failures() {
    let table = RoutingTable::new();
    let reader: Arc<dyn ProtocolPlugin> = Arc::new(ReadOnly);
    let (_gone, gone_dyn) = sink(RecordingSink::default());
    let target_gone = DestinationTarget::new("gone", "x", &gone_dyn);
    drop(_gone);
    drop(gone_dyn);

    table.define_rule(
        "src",
        "a",
        vec![target_gone, DestinationTarget::new("reader", "y", &reader)],
    );
    let outcome = table.route_async("src", "a", b"v").await;
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.failures[0].code, "TRANSPORT.NOT_CONNECTED");
    assert_eq!(outcome.failures[1].code, "CONFIG.INVALID_ADDRESS");
}

#[test]
fn sync_route_publishes_in_declared_order() {
    let table = RoutingTable::new();
    let (a, a_dyn) = sink(RecordingSink::default());
    table.define_rule(
        "src",
        "a",
        vec![
            DestinationTarget::new("A", "first", &a_dyn),
            DestinationTarget::new("A", "second", &a_dyn),
        ],
    );

    let outcome = table.route("src", "a", b"v");
    assert_eq!(outcome.delivered, 2);
    let order: Vec<String> = a.published().into_iter().map(|(addr, _)| addr).collect();
    assert_eq!(order, vec!["first", "second"]);
}

#[tokio::test]
async fn filters_run_once_before_fan_out() {
    let table = RoutingTable::new();
    let (a, a_dyn) = sink(RecordingSink::default());
    let kalman = FilterTable::builtin()
        .create(&FilterConfig {
            kind: "kalman".to_string(),
            parameters: [
                ("InitialEstimated", "0"),
                ("InitialError", "1"),
                ("ProcessNoise", "0"),
                ("MeasurementNoise", "1"),
                ("BufferSize", "8"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        })
        .unwrap();
    let mut chain = FilterChain::new();
    chain.push(kalman).unwrap();
    table.define_rule_with_filters(
        "src",
        "level",
        vec![
            DestinationTarget::new("A", "one", &a_dyn),
            DestinationTarget::new("A", "two", &a_dyn),
        ],
        chain,
    );

    table.route_async("src", "level", &4.0f32.to_le_bytes()).await;
    let published = a.published();
    assert_eq!(published.len(), 2);
    // gain = 1 / (1 + 1)
    assert_eq!(published[0].1, 2.0f32.to_le_bytes().to_vec());
    assert_eq!(published[0].1, published[1].1);

    let outcome = table.route_async("src", "level", &[1, 2, 3]).await;
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.failures[0].code, "FILTER.PAYLOAD");
}

#[test]
fn routes_snapshot_is_sorted_and_clear_empties_table() {
    let table = RoutingTable::new();
    let (_a, a_dyn) = sink(RecordingSink::default());
    table.define_rule("z", "1", vec![DestinationTarget::new("A", "o", &a_dyn)]);
    table.define_rule("a", "2", Vec::new());

    let routes = table.routes();
    assert_eq!(routes[0].key.plugin_id, "a");
    assert_eq!(routes[1].destinations, vec!["A/o".to_string()]);
    assert!(table.contains("z", "1"));

    assert!(table.remove_rule("a", "2"));
    table.clear();
    assert!(table.is_empty());
}
