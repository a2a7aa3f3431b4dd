use std::path::PathBuf;

/// 注册表错误（均为目录加载级致命错误）。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("plugin location {path} unreadable: {source}")]
    Location {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("module manifest {path} unreadable: {source}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("module manifest {path} invalid: {source}")]
    ManifestFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("module {module} (from {path}) is not linked into this host")]
    UnknownModule { module: String, path: PathBuf },
}
