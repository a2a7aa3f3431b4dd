//! 单变量 Kalman 估计器。

use crate::{FilterError, FilterParameters, RoutingFilter};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const INITIAL_ESTIMATED: &str = "InitialEstimated";
const INITIAL_ERROR: &str = "InitialError";
const PROCESS_NOISE: &str = "ProcessNoise";
const MEASUREMENT_NOISE: &str = "MeasurementNoise";
const BUFFER_SIZE: &str = "BufferSize";

#[derive(Debug, Default)]
struct KalmanState {
    estimated: f64,
    error: f64,
    process_noise: f64,
    measurement_noise: f64,
    buffer_size: usize,
    buffer: VecDeque<f64>,
}

impl KalmanState {
    fn record(&mut self, reading: f64) {
        if self.buffer.len() >= self.buffer_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(reading);
    }

    fn update(&mut self, measurement: f64) -> f64 {
        let predicted_error = self.error + self.process_noise;
        let gain = predicted_error / (predicted_error + self.measurement_noise);
        self.estimated += gain * (measurement - self.estimated);
        self.error = (1.0 - gain) * predicted_error;
        self.estimated
    }
}

/// Kalman 过滤器。
///
/// 负载宽度决定编码：4 字节为小端 f32，8 字节为小端 f64，输出保持输入宽度。
/// 最近 N 个原始读数保存在有界缓冲中（仅用于诊断）。
#[derive(Debug, Default)]
pub struct KalmanFilter {
    ready: bool,
    state: Mutex<KalmanState>,
}

impl KalmanFilter {
    pub const KIND: &'static str = "kalman";

    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, KalmanState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 当前估计值
    pub fn estimate(&self) -> f64 {
        self.state().estimated
    }

    /// 缓冲中的原始读数（旧 → 新）
    pub fn buffered(&self) -> Vec<f64> {
        self.state().buffer.iter().copied().collect()
    }

    pub fn clear_buffer(&self) {
        self.state().buffer.clear();
    }
}

fn parse<T: FromStr>(parameters: &FilterParameters, key: &str) -> Result<T, FilterError>
where
    T::Err: std::fmt::Display,
{
    let raw = parameters
        .get(key)
        .ok_or_else(|| FilterError::MissingParameter(key.to_string()))?;
    raw.trim()
        .parse()
        .map_err(|err: T::Err| FilterError::InvalidParameter(key.to_string(), err.to_string()))
}

#[async_trait]
impl RoutingFilter for KalmanFilter {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn required_parameters(&self) -> Vec<String> {
        [
            INITIAL_ESTIMATED,
            INITIAL_ERROR,
            PROCESS_NOISE,
            MEASUREMENT_NOISE,
            BUFFER_SIZE,
        ]
        .iter()
        .map(|key| key.to_string())
        .collect()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn configure(&mut self, parameters: &FilterParameters) -> Result<(), FilterError> {
        self.ready = false;
        let estimated = parse(parameters, INITIAL_ESTIMATED)?;
        let error = parse(parameters, INITIAL_ERROR)?;
        let process_noise = parse(parameters, PROCESS_NOISE)?;
        let measurement_noise: f64 = parse(parameters, MEASUREMENT_NOISE)?;
        let buffer_size: usize = parse(parameters, BUFFER_SIZE)?;
        if buffer_size == 0 {
            return Err(FilterError::InvalidParameter(
                BUFFER_SIZE.to_string(),
                "must be at least 1".to_string(),
            ));
        }

        *self.state() = KalmanState {
            estimated,
            error,
            process_noise,
            measurement_noise,
            buffer_size,
            buffer: VecDeque::with_capacity(buffer_size),
        };
        self.ready = true;
        Ok(())
    }

    fn filter(&self, data: &[u8]) -> Result<Vec<u8>, FilterError> {
        if !self.ready {
            return Err(FilterError::NotReady(Self::KIND));
        }
        let mut state = self.state();
        match <[u8; 4]>::try_from(data) {
            Ok(bytes) => {
                let reading = f64::from(f32::from_le_bytes(bytes));
                state.record(reading);
                let estimate = state.update(reading) as f32;
                Ok(estimate.to_le_bytes().to_vec())
            }
            Err(_) => {
                let bytes = <[u8; 8]>::try_from(data).map_err(|_| FilterError::Payload(data.len()))?;
                let reading = f64::from_le_bytes(bytes);
                state.record(reading);
                Ok(state.update(reading).to_le_bytes().to_vec())
            }
        }
    }
}
