//! 路由过滤链。
//!
//! 过滤器按规则配置，在扇出前对负载做一次变换：
//! - 未配置成功的过滤器 `is_ready() == false`，不得接入扇出路径
//! - 链按声明顺序依次执行，任一过滤器失败则该条数据不投递

mod chain;
mod error;
mod kalman;

pub use chain::{FilterChain, FilterTable};
pub use error::FilterError;
pub use kalman::KalmanFilter;

use async_trait::async_trait;
use std::collections::BTreeMap;

/// 过滤器参数（键 → 值）。
pub type FilterParameters = BTreeMap<String, String>;

/// 路由过滤器契约。
#[async_trait]
pub trait RoutingFilter: Send + Sync {
    fn kind(&self) -> &'static str;

    fn required_parameters(&self) -> Vec<String>;

    /// 配置成功前为 false
    fn is_ready(&self) -> bool;

    fn configure(&mut self, parameters: &FilterParameters) -> Result<(), FilterError>;

    fn filter(&self, data: &[u8]) -> Result<Vec<u8>, FilterError>;

    async fn filter_async(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        self.filter(data)
    }
}
