use fabric_plugin::PluginError;
use fabric_registry::RegistryError;
use fabric_storage::StorageError;

/// 编排错误（向 Start 的调用方暴露）。
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("configuration store error: {0}")]
    Storage(#[from] StorageError),
    #[error("plugin catalog error: {0}")]
    Registry(#[from] RegistryError),
    #[error("connection {0} is not running")]
    UnknownConnection(String),
    #[error("connection {0} does not support {1}")]
    Unsupported(String, &'static str),
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),
    #[error("state control channel closed")]
    ControlClosed,
}

impl OrchestratorError {
    /// 对外错误码。
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::Storage(_) => "CONFIG.STORE",
            OrchestratorError::Registry(_) => "CONFIG.CATALOG",
            OrchestratorError::UnknownConnection(_) => "RESOURCE.NOT_FOUND",
            OrchestratorError::Unsupported(_, _) => "CONFIG.UNSUPPORTED",
            OrchestratorError::Plugin(err) => err.code(),
            OrchestratorError::ControlClosed => "INTERNAL.CONTROL_CLOSED",
        }
    }
}
