//! # Fabric Storage 模块
//!
//! 路由拓扑的配置读模型与地址目录。
//!
//! ## 模块说明
//!
//! - [`traits`]：`ConfigurationStore`（只读配置，每个编排周期查询一次）、
//!   `AddressCatalog`（Browsable 插件发现地址的写入出口）
//! - [`models`]：拓扑文档 `Topology`
//! - [`validation`]：拓扑一致性校验（重复 ID）
//! - [`in_memory`]：`RwLock<HashMap>` 内存实现（测试与演示）
//! - [`topology_file`]：JSON 拓扑文件实现，`refresh` 时重新读取文件
//!
//! ## 设计约束
//!
//! - 核心不在运行期修改配置；配置变化只在下一次 Start/Restart 生效
//! - 悬空引用（规则指向不存在的连接等）不在存储层拒绝，由编排器按规则粒度报告并跳过

pub mod error;
pub mod in_memory;
pub mod models;
pub mod topology_file;
pub mod traits;
pub mod validation;

pub use error::*;
pub use in_memory::{InMemoryAddressCatalog, InMemoryConfigurationStore};
pub use models::*;
pub use topology_file::JsonTopologyStore;
pub use traits::*;
pub use validation::*;
