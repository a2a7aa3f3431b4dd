use async_trait::async_trait;
use domain::FilterConfig;
use fabric_filter::{FilterChain, FilterError, FilterParameters, FilterTable, RoutingFilter};
use std::sync::Arc;

/// 每个字节加一（测试用）。
struct Increment {
    ready: bool,
}

#[async_trait]
impl RoutingFilter for Increment {
    fn kind(&self) -> &'static str {
        "increment"
    }

    fn required_parameters(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn configure(&mut self, _parameters: &FilterParameters) -> Result<(), FilterError> {
        self.ready = true;
        Ok(())
    }

    fn filter(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        Ok(data.iter().map(|b| b.wrapping_add(1)).collect())
    }
}

fn kalman_config() -> FilterConfig {
    FilterConfig {
        kind: "Kalman".to_string(),
        parameters: [
            ("InitialEstimated", "5"),
            ("InitialError", "1"),
            ("ProcessNoise", "0.01"),
            ("MeasurementNoise", "0.1"),
            ("BufferSize", "4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    }
}

#[test]
fn builtin_table_creates_ready_kalman() {
    let filter = FilterTable::builtin().create(&kalman_config()).unwrap();
    assert_eq!(filter.kind(), "kalman");
    assert!(filter.is_ready());
}

#[test]
fn unknown_kind_and_bad_config_are_rejected() {
    let table = FilterTable::builtin();
    let unknown = FilterConfig {
        kind: "median".to_string(),
        parameters: Default::default(),
    };
    assert!(matches!(table.create(&unknown), Err(FilterError::UnknownKind(_))));

    let mut broken = kalman_config();
    broken.parameters.remove("BufferSize");
    let err = table.create(&broken).err().unwrap();
    assert_eq!(err.code(), "CONFIG.MISSING_PARAMETER");
}

#[test]
fn chain_refuses_unready_filter() {
    let mut chain = FilterChain::new();
    let err = chain.push(Arc::new(Increment { ready: false })).unwrap_err();
    assert!(matches!(err, FilterError::NotReady("increment")));
    assert!(chain.is_empty());
}

#[test]
fn chain_applies_filters_in_declared_order() {
    let mut table = FilterTable::builtin();
    table.register("increment", || Box::new(Increment { ready: false }));
    let increment = table
        .create(&FilterConfig {
            kind: "increment".to_string(),
            parameters: Default::default(),
        })
        .unwrap();

    let mut chain = FilterChain::new();
    chain.push(increment.clone()).unwrap();
    chain.push(increment).unwrap();
    assert_eq!(chain.kinds(), vec!["increment", "increment"]);
    assert_eq!(chain.apply(&[1, 2]).unwrap(), vec![3, 4]);
    assert_eq!(FilterChain::new().apply(&[9]).unwrap(), vec![9]);
}

#[tokio::test]
async fn async_chain_matches_sync_semantics() {
    let mut chain = FilterChain::new();
    chain.push(Arc::new(Increment { ready: true })).unwrap();
    assert_eq!(chain.apply_async(&[0xFF]).await.unwrap(), vec![0x00]);

    let kalman = FilterTable::builtin().create(&kalman_config()).unwrap();
    let mut chain = FilterChain::new();
    chain.push(kalman).unwrap();
    let out = chain.apply_async(&5.0f32.to_le_bytes()).await.unwrap();
    assert_eq!(f32::from_le_bytes(out.try_into().unwrap()), 5.0);
}

#[tokio::test]
async fn rejecting_filter_stops_the_chain() {
    let kalman = FilterTable::builtin().create(&kalman_config()).unwrap();
    let mut chain = FilterChain::new();
    chain.push(Arc::new(Increment { ready: true })).unwrap();
    chain.push(kalman).unwrap();
    chain.push(Arc::new(Increment { ready: true })).unwrap();

    let err = chain.apply(&[1, 2, 3]).unwrap_err();
    assert_eq!(err.code(), "FILTER.PAYLOAD");
    let err = chain.apply_async(&[1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, FilterError::Payload(3)));
}
