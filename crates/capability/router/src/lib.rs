//! 路由表。
//!
//! 以 [`RoutingKey`]（源插件 ID + 地址）为键，保存有序的目的地列表与过滤链。
//!
//! ## 并发
//!
//! - 规则只在编排器 Start/Stop 期间写入（单写者）
//! - `route` 可被多个插件线程并发调用：查找时克隆条目 `Arc` 并立即释放锁，
//!   读者不会看到写了一半的目的地列表
//!
//! ## 失败语义
//!
//! - 未定义的键：记录告警并丢弃，不向上报错
//! - 单个目的地发布失败：逐条记录，不影响列表中其他目的地

mod entry;
mod table;

pub use entry::{DeliveryFailure, DestinationTarget, RouteEntry, RouteOutcome, RouteSummary};
pub use table::RoutingTable;
