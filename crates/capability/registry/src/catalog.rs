//! 插件目录加载与描述符解析。

use crate::error::RegistryError;
use crate::module::{MANIFEST_SUFFIX, ModuleManifest, ModuleTable, PluginFactory};
use domain::{CapabilitySet, PluginDescriptor};
use fabric_plugin::ProtocolPlugin;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 目录条目：一个工厂及其原型实例的元信息。
#[derive(Clone)]
pub struct CatalogEntry {
    module: String,
    kind: &'static str,
    required_parameters: Vec<String>,
    capabilities: CapabilitySet,
    prototype: Arc<dyn ProtocolPlugin>,
    factory: Arc<dyn PluginFactory>,
}

impl CatalogEntry {
    fn from_factory(module: &str, factory: Arc<dyn PluginFactory>) -> Self {
        let prototype = factory.create();
        Self {
            module: module.to_string(),
            kind: prototype.kind(),
            required_parameters: prototype.required_parameters(),
            capabilities: prototype.capabilities(),
            prototype,
            factory,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn required_parameters(&self) -> &[String] {
        &self.required_parameters
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// 加载时创建的原型实例。
    pub fn prototype(&self) -> &Arc<dyn ProtocolPlugin> {
        &self.prototype
    }

    /// 为一个连接创建新的实例。
    pub fn instantiate(&self) -> Arc<dyn ProtocolPlugin> {
        self.factory.create()
    }

    /// 类型一致且能力覆盖描述符声明。
    pub fn matches(&self, descriptor: &PluginDescriptor) -> bool {
        self.kind == descriptor.plugin_type
            && self.capabilities.contains_all(&descriptor.capabilities)
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("module", &self.module)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// 单个位置的插件目录。
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    location: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl PluginCatalog {
    /// 扫描位置目录中的模块清单。
    pub fn load(table: &ModuleTable, location: &Path) -> Result<Self, RegistryError> {
        let dir = std::fs::read_dir(location).map_err(|source| RegistryError::Location {
            path: location.to_path_buf(),
            source,
        })?;

        let mut manifests = Vec::new();
        for item in dir {
            let item = item.map_err(|source| RegistryError::Location {
                path: location.to_path_buf(),
                source,
            })?;
            let path = item.path();
            let is_manifest = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(MANIFEST_SUFFIX));
            if is_manifest && path.is_file() {
                manifests.push(path);
            }
        }
        manifests.sort();

        let mut entries = Vec::new();
        for path in manifests {
            let manifest = read_manifest(&path)?;
            let Some(module) = table.get(&manifest.module) else {
                return Err(RegistryError::UnknownModule {
                    module: manifest.module,
                    path,
                });
            };
            if module.factories().is_empty() {
                debug!(target: "fabric.registry", module = %manifest.module, "module contributes no plugins, skipped");
                continue;
            }
            for factory in module.factories() {
                let entry = CatalogEntry::from_factory(module.name(), factory.clone());
                if entry.capabilities.is_empty() {
                    warn!(
                        target: "fabric.registry",
                        module = %entry.module,
                        kind = entry.kind,
                        "plugin exposes no capability, skipped"
                    );
                    continue;
                }
                info!(
                    target: "fabric.registry",
                    module = %entry.module,
                    version = %manifest.version,
                    kind = entry.kind,
                    capabilities = %entry.capabilities,
                    "plugin_loaded"
                );
                entries.push(entry);
            }
        }

        Ok(Self {
            location: location.to_path_buf(),
            entries,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, descriptor: &PluginDescriptor) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.matches(descriptor))
    }
}

fn read_manifest(path: &Path) -> Result<ModuleManifest, RegistryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::ManifestIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RegistryError::ManifestFormat {
        path: path.to_path_buf(),
        source,
    })
}

/// 插件注册表：按描述符位置加载目录，并负责描述符 → 目录条目解析。
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    table: Arc<ModuleTable>,
    base_dir: PathBuf,
    catalogs: HashMap<String, PluginCatalog>,
}

impl PluginRegistry {
    pub fn new(table: Arc<ModuleTable>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            table,
            base_dir: base_dir.into(),
            catalogs: HashMap::new(),
        }
    }

    /// 相对位置基于 `base_dir` 解析；空位置即 `base_dir`。
    pub fn resolve_location(&self, location: &str) -> PathBuf {
        if location.is_empty() {
            self.base_dir.clone()
        } else {
            self.base_dir.join(location)
        }
    }

    /// 加载描述符引用的全部位置；任何一个失败则整体失败。
    pub fn load_all(&mut self, descriptors: &[PluginDescriptor]) -> Result<(), RegistryError> {
        let mut catalogs = HashMap::new();
        for descriptor in descriptors {
            if catalogs.contains_key(&descriptor.location) {
                continue;
            }
            let path = self.resolve_location(&descriptor.location);
            let catalog = PluginCatalog::load(&self.table, &path)?;
            catalogs.insert(descriptor.location.clone(), catalog);
        }
        self.catalogs = catalogs;
        Ok(())
    }

    pub fn resolve(&self, descriptor: &PluginDescriptor) -> Option<&CatalogEntry> {
        self.catalogs
            .get(&descriptor.location)
            .and_then(|catalog| catalog.find(descriptor))
    }

    pub fn catalog(&self, location: &str) -> Option<&PluginCatalog> {
        self.catalogs.get(location)
    }

    pub fn clear(&mut self) {
        self.catalogs.clear();
    }
}
