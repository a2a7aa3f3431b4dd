//! # 连接编排器
//!
//! 把配置读模型中的插件描述、连接与路由规则构建为运行中的拓扑，
//! 并负责 Start / Stop / Restart 生命周期。
//!
//! ## 构建流程
//!
//! ```text
//! refresh 配置 → 加载插件目录（失败即中止 Start）
//!   阶段一：每个连接 → 解析描述符 → 新建实例 → attach → 校验参数 → connect → browse
//!   阶段二：每条规则 → 解析目的地（已连接且具备 Destination）→ 过滤链 → subscribe → 定义路由
//! ```
//!
//! 单个连接/规则/目的地的配置错误与传输错误均以事件上报并跳过，不中止构建。
//!
//! ## 状态
//!
//! 插件目录、实例列表与路由表只归编排器所有：Start 时填充，Stop 时清空。
//! 控制命令由同一把异步互斥锁串行执行。

mod control;
mod error;
mod handler;
mod instance;
mod orchestrator;

pub use control::{StateController, StateReceiver, run_state_loop, state_channel};
pub use error::OrchestratorError;
pub use instance::{InstanceSummary, PluginInstance};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorSettings};
pub use fabric_router::RouteSummary;
