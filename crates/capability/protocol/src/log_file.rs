//! 文件日志插件。
//!
//! 每次发布追加一行 `[<时间>] <pluginId>.<address>: <utf8 载荷>`。

use crate::params;
use async_trait::async_trait;
use domain::ConnectionStatus;
use fabric_plugin::{Destination, Parameters, PluginBinding, PluginContext, PluginError, ProtocolPlugin};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

const FILEPATH: &str = "filepath";

struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// 文件日志 Destination。
#[derive(Default)]
pub struct LogPlugin {
    binding: PluginBinding,
    sink: Mutex<Option<LogSink>>,
    connected: AtomicBool,
}

impl LogPlugin {
    pub const KIND: &'static str = "log";

    pub fn new() -> Self {
        Self::default()
    }

    /// 当前写入的文件。
    pub async fn path(&self) -> Option<PathBuf> {
        self.sink.lock().await.as_ref().map(|sink| sink.path.clone())
    }

    fn format_line(&self, address: &str, data: &[u8]) -> String {
        let plugin_id = self.binding.plugin_id().unwrap_or_default();
        format!(
            "[{}] {}.{}: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            plugin_id,
            address,
            String::from_utf8_lossy(data)
        )
    }
}

#[async_trait]
impl ProtocolPlugin for LogPlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn required_parameters(&self) -> Vec<String> {
        vec![FILEPATH.to_string()]
    }

    fn attach(&self, context: PluginContext) {
        self.binding.bind(context);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, _connection_string: &str, parameters: &Parameters) -> Result<(), PluginError> {
        let path = PathBuf::from(params::required(parameters, FILEPATH)?);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        *self.sink.lock().await = Some(LogSink {
            path: path.clone(),
            writer: BufWriter::new(file),
        });
        self.connected.store(true, Ordering::SeqCst);
        info!(target: "fabric.protocol", path = %path.display(), "log_file_opened");
        self.binding
            .connection_state(ConnectionStatus::Connected, None)
            .await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PluginError> {
        let sink = self.sink.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut sink) = sink {
            sink.writer.flush().await?;
        }
        self.binding
            .connection_state(ConnectionStatus::Disconnected, None)
            .await;
        Ok(())
    }

    fn as_destination(&self) -> Option<&dyn Destination> {
        Some(self)
    }
}

#[async_trait]
impl Destination for LogPlugin {
    async fn publish(&self, address: &str, data: &[u8]) -> Result<(), PluginError> {
        let line = self.format_line(address, data);
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(PluginError::NotConnected)?;
        sink.writer.write_all(line.as_bytes()).await?;
        sink.writer.flush().await?;
        Ok(())
    }
}
