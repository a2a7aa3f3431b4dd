use async_trait::async_trait;
use domain::{Capability, ConnectionStatus};
use fabric_plugin::{
    Destination, Parameters, PluginBinding, PluginContext, PluginError, PluginEvent,
    PluginEventHandler, ProtocolPlugin, Source,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<(String, PluginEvent)>>,
}

#[async_trait]
impl PluginEventHandler for RecordingHandler {
    async fn handle(&self, plugin_id: &str, event: PluginEvent) {
        self.events
            .lock()
            .expect("lock")
            .push((plugin_id.to_string(), event));
    }
}

#[derive(Default)]
struct EchoPlugin {
    binding: PluginBinding,
    connected: AtomicBool,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl ProtocolPlugin for EchoPlugin {
    fn kind(&self) -> &'static str {
        "echo"
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

    async fn connect(&self, _connection_string: &str, parameters: &Parameters) -> Result<(), PluginError> {
        if !parameters.contains_key("Port") {
            return Err(PluginError::MissingParameter("Port".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.binding
            .connection_state(ConnectionStatus::Connected, None)
            .await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn as_source(&self) -> Option<&dyn Source> {
        Some(self)
    }

    fn as_destination(&self) -> Option<&dyn Destination> {
        Some(self)
    }
}

#[async_trait]
impl Source for EchoPlugin {
    async fn read_data(&self, address: &str) -> Result<Vec<u8>, PluginError> {
        Ok(address.as_bytes().to_vec())
    }
}

#[async_trait]
impl Destination for EchoPlugin {
    async fn publish(&self, address: &str, data: &[u8]) -> Result<(), PluginError> {
        if !self.is_connected() {
            return Err(PluginError::NotConnected);
        }
        self.published
            .lock()
            .expect("lock")
            .push((address.to_string(), data.to_vec()));
        Ok(())
    }
}

#[test]
fn capabilities_come_from_accessors() {
    let plugin = EchoPlugin::default();
    let caps = plugin.capabilities();
    assert!(caps.contains(Capability::Source));
    assert!(caps.contains(Capability::Destination));
    assert!(!caps.contains(Capability::Subscribable));
    assert!(!caps.contains(Capability::Browsable));
}

#[test]
fn blocking_variants_match_async_semantics() {
    let plugin = EchoPlugin::default();
    let err = plugin
        .connect_blocking("localhost", &Parameters::new())
        .expect_err("missing port");
    assert!(matches!(err, PluginError::MissingParameter(_)));

    let mut params = Parameters::new();
    params.insert("Port".to_string(), "1".to_string());
    plugin.connect_blocking("localhost", &params).expect("connect");
    assert!(plugin.is_connected());

    let destination = plugin.as_destination().expect("destination");
    destination
        .publish_blocking("plant/tank1", &[1, 2])
        .expect("publish");
    let source = plugin.as_source().expect("source");
    assert_eq!(source.read_data_blocking("abc").expect("read"), b"abc".to_vec());

    plugin.disconnect_blocking().expect("disconnect");
    assert!(destination.publish_blocking("x", &[0]).is_err());
}

#[tokio::test]
async fn binding_forwards_events_with_assigned_id() {
    let handler = Arc::new(RecordingHandler::default());
    let plugin = EchoPlugin::default();
    plugin.attach(PluginContext::new("plcA", handler.clone()));

    let mut params = Parameters::new();
    params.insert("Port".to_string(), "1".to_string());
    plugin.connect("localhost", &params).await.expect("connect");
    plugin.binding.data_received("TankLevel", vec![1]).await;

    let events = handler.events.lock().expect("lock");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, "plcA");
    assert!(matches!(
        events[0].1,
        PluginEvent::ConnectionStateChanged {
            status: ConnectionStatus::Connected,
            ..
        }
    ));
    match &events[1].1 {
        PluginEvent::DataReceived { address, payload, .. } => {
            assert_eq!(address, "TankLevel");
            assert_eq!(payload, &vec![1]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn unbound_plugin_drops_events() {
    let plugin = EchoPlugin::default();
    assert!(plugin.binding.plugin_id().is_none());
    plugin.binding.data_received("x", vec![]).await;
}
