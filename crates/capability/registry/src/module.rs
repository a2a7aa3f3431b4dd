//! 可加载模块与插件工厂。

use fabric_plugin::ProtocolPlugin;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 模块清单文件后缀。
pub const MANIFEST_SUFFIX: &str = ".module.json";

/// 模块清单。
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    pub module: String,
    #[serde(default)]
    pub version: String,
}

/// 插件工厂：零参数构造一个新的插件实例。
pub trait PluginFactory: Send + Sync {
    fn create(&self) -> Arc<dyn ProtocolPlugin>;
}

impl<F> PluginFactory for F
where
    F: Fn() -> Arc<dyn ProtocolPlugin> + Send + Sync,
{
    fn create(&self) -> Arc<dyn ProtocolPlugin> {
        self()
    }
}

/// 一个模块贡献的插件工厂集合。
#[derive(Clone)]
pub struct PluginModule {
    name: String,
    factories: Vec<Arc<dyn PluginFactory>>,
}

impl PluginModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: Vec::new(),
        }
    }

    pub fn with_factory(mut self, factory: impl PluginFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factories(&self) -> &[Arc<dyn PluginFactory>] {
        &self.factories
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("name", &self.name)
            .field("factories", &self.factories.len())
            .finish()
    }
}

/// 宿主链接的模块表（模块名 → 模块）。
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    modules: BTreeMap<String, PluginModule>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: PluginModule) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn with_module(mut self, module: PluginModule) -> Self {
        self.register(module);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PluginModule> {
        self.modules.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
