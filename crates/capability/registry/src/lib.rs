//! 插件注册表。
//!
//! 给定位置目录，枚举其中的模块清单（`*.module.json`），从宿主编译期链接的
//! [`ModuleTable`] 中找到对应模块，并为每个插件工厂创建一个原型实例。
//!
//! - 模块不提供任何工厂：跳过
//! - 清单不可读/不可解析、模块未知：整个加载失败（部分加载的目录不可用于路由）

mod catalog;
mod error;
mod module;

pub use catalog::{CatalogEntry, PluginCatalog, PluginRegistry};
pub use error::RegistryError;
pub use module::{ModuleManifest, ModuleTable, PluginFactory, PluginModule, MANIFEST_SUFFIX};
