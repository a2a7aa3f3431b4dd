//! 响应辅助

pub mod response;
