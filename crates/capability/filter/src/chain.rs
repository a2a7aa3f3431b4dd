//! 过滤器表与过滤链。

use crate::kalman::KalmanFilter;
use crate::{FilterError, RoutingFilter};
use domain::FilterConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

type FilterConstructor = fn() -> Box<dyn RoutingFilter>;

/// 过滤器表（kind → 构造函数）。
#[derive(Clone)]
pub struct FilterTable {
    constructors: BTreeMap<String, FilterConstructor>,
}

impl FilterTable {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// 内置过滤器。
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.register(KalmanFilter::KIND, || Box::new(KalmanFilter::new()));
        table
    }

    pub fn register(&mut self, kind: impl Into<String>, constructor: FilterConstructor) {
        self.constructors.insert(kind.into().to_ascii_lowercase(), constructor);
    }

    /// 创建并配置过滤器；未就绪即失败。
    pub fn create(&self, config: &FilterConfig) -> Result<Arc<dyn RoutingFilter>, FilterError> {
        let constructor = self
            .constructors
            .get(&config.kind.to_ascii_lowercase())
            .ok_or_else(|| FilterError::UnknownKind(config.kind.clone()))?;
        let mut filter = constructor();
        filter.configure(&config.parameters)?;
        if !filter.is_ready() {
            return Err(FilterError::NotReady(filter.kind()));
        }
        Ok(Arc::from(filter))
    }
}

impl Default for FilterTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for FilterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.constructors.keys()).finish()
    }
}

/// 按声明顺序执行的过滤链。
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn RoutingFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未就绪的过滤器被拒绝接入。
    pub fn push(&mut self, filter: Arc<dyn RoutingFilter>) -> Result<(), FilterError> {
        if !filter.is_ready() {
            warn!(target: "fabric.filter", kind = filter.kind(), "unready filter refused by chain");
            return Err(FilterError::NotReady(filter.kind()));
        }
        self.filters.push(filter);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.kind()).collect()
    }

    pub fn apply(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        let mut current = data.to_vec();
        for filter in &self.filters {
            current = filter
                .filter(&current)
                .inspect_err(|err| rejected(filter.kind(), err))?;
        }
        Ok(current)
    }

    pub async fn apply_async(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        let mut current = data.to_vec();
        for filter in &self.filters {
            current = filter
                .filter_async(&current)
                .await
                .inspect_err(|err| rejected(filter.kind(), err))?;
        }
        Ok(current)
    }
}

fn rejected(kind: &'static str, err: &FilterError) {
    warn!(target: "fabric.filter", kind, code = err.code(), error = %err, "filter rejected payload");
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}
