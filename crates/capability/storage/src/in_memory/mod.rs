//! 内存存储实现
//!
//! 使用 RwLock 提供线程安全的内存存储，用于测试与演示。

pub mod address;
pub mod configuration;

pub use address::InMemoryAddressCatalog;
pub use configuration::InMemoryConfigurationStore;
