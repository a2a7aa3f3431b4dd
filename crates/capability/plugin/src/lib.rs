//! # 插件能力契约
//!
//! 每个传输插件实现基础契约 [`ProtocolPlugin`]，并按需暴露以下能力的非空子集：
//! - **Source**：按地址拉取读取
//! - **Destination**：向地址发布
//! - **Subscribable**：推送式数据到达
//! - **Browsable**：地址空间发现
//!
//! ## 架构设计
//!
//! ```text
//! ProtocolPlugin ──attach(PluginContext)──▶ PluginEventHandler (编排器实现)
//!       │                                        │
//!       ├── as_source()        ─┐                ├── ConnectionStateChanged
//!       ├── as_destination()    │ 能力探测       ├── Error
//!       ├── as_subscribable()   │ (非类型名匹配) └── DataReceived → RoutingTable
//!       └── as_browsable()     ─┘
//! ```
//!
//! 所有 I/O 操作以 async 形式定义；同步变体（`*_blocking`）语义一致，
//! 由 [`block_on`] 桥接。

mod blocking;
mod context;
mod contract;
mod error;

pub use blocking::block_on;
pub use context::{NoopEventHandler, PluginBinding, PluginContext, PluginEvent, PluginEventHandler};
pub use contract::{Browsable, Destination, Parameters, ProtocolPlugin, Source, Subscribable};
pub use error::PluginError;
