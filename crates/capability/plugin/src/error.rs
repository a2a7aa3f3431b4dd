//! 插件错误类型定义

/// 插件操作错误
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 缺少必填参数
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// 参数值非法
    #[error("invalid parameter {0}: {1}")]
    InvalidParameter(String, String),

    /// 地址格式不受支持
    #[error("unsupported address: {0}")]
    Address(String),

    /// 尚未连接
    #[error("not connected")]
    NotConnected,

    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// 传输层错误（读/写/订阅）
    #[error("transport error: {0}")]
    Transport(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 运行时桥接错误
    #[error("runtime error: {0}")]
    Runtime(String),

    /// 插件调用 panic
    #[error("plugin {0} panicked")]
    Panicked(String),
}

impl PluginError {
    /// 对外错误事件使用的错误码。
    pub fn code(&self) -> &'static str {
        match self {
            PluginError::MissingParameter(_) => "CONFIG.MISSING_PARAMETER",
            PluginError::InvalidParameter(_, _) => "CONFIG.INVALID_PARAMETER",
            PluginError::Address(_) => "CONFIG.INVALID_ADDRESS",
            PluginError::NotConnected => "TRANSPORT.NOT_CONNECTED",
            PluginError::Connection(_) => "TRANSPORT.CONNECTION",
            PluginError::Transport(_) => "TRANSPORT.IO",
            PluginError::Io(_) => "TRANSPORT.IO",
            PluginError::Timeout(_) => "TRANSPORT.TIMEOUT",
            PluginError::Runtime(_) => "INTERNAL.RUNTIME",
            PluginError::Panicked(_) => "PLUGIN.PANIC",
        }
    }
}
