//! MQTT 插件（rumqttc）。
//!
//! 连接成功后事件循环在独立任务中运行：入站 Publish 经通道交给转发任务，
//! 由后者发出 `DataReceived`，事件循环本身从不等待路由。
//! 断线按 [`ReconnectPolicy`] 重试，重试耗尽后发出错误事件并退出。

use crate::params;
use async_trait::async_trait;
use domain::ConnectionStatus;
use fabric_plugin::{
    Destination, Parameters, PluginBinding, PluginContext, PluginError, ProtocolPlugin,
    Subscribable,
};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PORT: &str = "Port";
const USERNAME: &str = "Username";
const PASSWORD: &str = "Password";
const RECONNECT_DELAY_MS: &str = "ReconnectDelayMs";
const RECONNECT_ATTEMPTS: &str = "ReconnectAttempts";
const QOS: &str = "QoS";
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// 断线重连策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// 0 表示不限次数
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(5000),
            max_attempts: 0,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, PluginError> {
        let defaults = Self::default();
        Ok(Self {
            delay: Duration::from_millis(params::parse_or(
                parameters,
                RECONNECT_DELAY_MS,
                defaults.delay.as_millis() as u64,
            )?),
            max_attempts: params::parse_or(parameters, RECONNECT_ATTEMPTS, defaults.max_attempts)?,
        })
    }

    /// 第 `failures` 次连续失败后是否放弃。
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts != 0 && failures > self.max_attempts
    }
}

#[derive(Debug, Clone)]
struct MqttSettings {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    qos: QoS,
    reconnect: ReconnectPolicy,
    topics: Vec<String>,
}

impl MqttSettings {
    fn parse(connection_string: &str, parameters: &Parameters) -> Result<Self, PluginError> {
        let host = connection_string.trim();
        if host.is_empty() {
            return Err(PluginError::InvalidParameter(
                "connectionString".to_string(),
                connection_string.to_string(),
            ));
        }
        let port = params::parse_required(parameters, PORT)?;
        let credentials = match (
            params::optional(parameters, USERNAME),
            params::optional(parameters, PASSWORD),
        ) {
            (Some(user), Some(pass)) => Some((user.to_string(), pass.to_string())),
            _ => None,
        };
        let qos = match params::parse_or(parameters, QOS, 1u8)? {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => {
                return Err(PluginError::InvalidParameter(QOS.to_string(), other.to_string()));
            }
        };
        // Topic* 参数在连接后立即订阅
        let topics = parameters
            .iter()
            .filter(|(key, _)| key.to_ascii_lowercase().starts_with("topic"))
            .map(|(_, topic)| topic.trim().to_string())
            .filter(|topic| !topic.is_empty())
            .collect();

        Ok(Self {
            host: host.to_string(),
            port,
            credentials,
            qos,
            reconnect: ReconnectPolicy::from_parameters(parameters)?,
            topics,
        })
    }

    fn options(&self) -> MqttOptions {
        let client_id = format!("fabric-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        options
    }
}

struct MqttSession {
    client: AsyncClient,
    qos: QoS,
    worker: JoinHandle<()>,
}

/// MQTT Destination + Subscribable。
#[derive(Default)]
pub struct MqttPlugin {
    binding: Arc<PluginBinding>,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<MqttSession>>,
}

impl MqttPlugin {
    pub const KIND: &'static str = "mqtt";

    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<(AsyncClient, QoS), PluginError> {
        let guard = self.session.lock().await;
        match guard.as_ref() {
            Some(session) if self.is_connected() => Ok((session.client.clone(), session.qos)),
            _ => Err(PluginError::NotConnected),
        }
    }

    async fn close_session(&self, session: MqttSession) {
        self.connected.store(false, Ordering::SeqCst);
        if let Err(err) = session.client.disconnect().await {
            debug!(target: "fabric.protocol", error = %err, "mqtt_disconnect_request_failed");
        }
        let abort = session.worker.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, session.worker).await.is_err() {
            abort.abort();
        }
    }
}

/// 等待首个 ConnAck。
async fn await_connack(eventloop: &mut EventLoop) -> Result<(), PluginError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(PluginError::Connection(err.to_string())),
        }
    }
}

/// 逐条把入站消息交给处理器；发送端全部关闭且队列清空后退出。
async fn forward_incoming(
    mut inbound: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
    binding: Arc<PluginBinding>,
) {
    while let Some((topic, payload)) = inbound.recv().await {
        binding.data_received(topic, payload).await;
    }
    debug!(target: "fabric.protocol", "mqtt_forwarder_exiting");
}

async fn drive(
    mut eventloop: EventLoop,
    binding: Arc<PluginBinding>,
    connected: Arc<AtomicBool>,
    policy: ReconnectPolicy,
) {
    // 路由可能回写同一连接的 client，轮询不能被处理器阻塞
    let (inbound, queue) = mpsc::unbounded_channel();
    tokio::spawn(forward_incoming(queue, binding.clone()));
    let mut failures = 0u32;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                failures = 0;
                if !connected.swap(true, Ordering::SeqCst) {
                    info!(target: "fabric.protocol", "mqtt_reconnected");
                    binding
                        .connection_state(ConnectionStatus::Connected, None)
                        .await;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if inbound
                    .send((publish.topic.clone(), publish.payload.to_vec()))
                    .is_err()
                {
                    warn!(target: "fabric.protocol", topic = %publish.topic, "mqtt_forwarder_gone");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(err) => {
                let message = err.to_string();
                if connected.swap(false, Ordering::SeqCst) {
                    warn!(target: "fabric.protocol", error = %message, "mqtt_connection_lost");
                    binding
                        .connection_state(ConnectionStatus::Disconnected, Some(message.clone()))
                        .await;
                }
                failures += 1;
                if policy.exhausted(failures) {
                    binding
                        .error(
                            format!("mqtt reconnect gave up after {} attempts: {}", policy.max_attempts, message),
                            None,
                            Some("TRANSPORT.CONNECTION".to_string()),
                        )
                        .await;
                    break;
                }
                tokio::time::sleep(policy.delay).await;
                binding
                    .connection_state(ConnectionStatus::Connecting, None)
                    .await;
            }
        }
    }
}

#[async_trait]
impl ProtocolPlugin for MqttPlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn required_parameters(&self) -> Vec<String> {
        vec![PORT.to_string()]
    }

    fn attach(&self, context: PluginContext) {
        self.binding.bind(context);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, connection_string: &str, parameters: &Parameters) -> Result<(), PluginError> {
        let settings = MqttSettings::parse(connection_string, parameters)?;
        let mut guard = self.session.lock().await;
        if let Some(previous) = guard.take() {
            self.close_session(previous).await;
        }

        self.binding
            .connection_state(ConnectionStatus::Connecting, None)
            .await;
        let (client, mut eventloop) = AsyncClient::new(settings.options(), 64);
        if let Err(err) = await_connack(&mut eventloop).await {
            self.binding
                .connection_state(ConnectionStatus::Disconnected, Some(err.to_string()))
                .await;
            return Err(err);
        }

        self.connected.store(true, Ordering::SeqCst);
        let worker = tokio::spawn(drive(
            eventloop,
            self.binding.clone(),
            self.connected.clone(),
            settings.reconnect,
        ));
        let session = MqttSession {
            client,
            qos: settings.qos,
            worker,
        };
        for topic in &settings.topics {
            if let Err(err) = session.client.subscribe(topic.as_str(), settings.qos).await {
                self.close_session(session).await;
                return Err(PluginError::Transport(err.to_string()));
            }
        }
        *guard = Some(session);

        info!(
            target: "fabric.protocol",
            host = %settings.host,
            port = settings.port,
            topics = settings.topics.len(),
            "mqtt_connected"
        );
        self.binding
            .connection_state(ConnectionStatus::Connected, None)
            .await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            self.close_session(session).await;
        }
        self.binding
            .connection_state(ConnectionStatus::Disconnected, None)
            .await;
        Ok(())
    }

    fn as_destination(&self) -> Option<&dyn Destination> {
        Some(self)
    }

    fn as_subscribable(&self) -> Option<&dyn Subscribable> {
        Some(self)
    }
}

#[async_trait]
impl Destination for MqttPlugin {
    async fn publish(&self, address: &str, data: &[u8]) -> Result<(), PluginError> {
        let (client, qos) = self.client().await?;
        client
            .publish(address, qos, false, data.to_vec())
            .await
            .map_err(|e| PluginError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Subscribable for MqttPlugin {
    async fn subscribe(&self, address: &str) -> Result<(), PluginError> {
        let (client, qos) = self.client().await?;
        client
            .subscribe(address, qos)
            .await
            .map_err(|e| PluginError::Transport(e.to_string()))
    }

    async fn unsubscribe(&self, address: &str) -> Result<(), PluginError> {
        let (client, _) = self.client().await?;
        client
            .unsubscribe(address)
            .await
            .map_err(|e| PluginError::Transport(e.to_string()))
    }
}
