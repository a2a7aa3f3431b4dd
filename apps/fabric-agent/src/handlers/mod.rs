//! Handlers 模块

pub mod health;
pub mod metrics;
pub mod state;
pub mod topology;

pub use health::*;
pub use metrics::*;
pub use state::*;
pub use topology::*;
