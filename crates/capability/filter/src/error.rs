/// 过滤器错误。
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("unknown filter kind: {0}")]
    UnknownKind(String),
    #[error("missing filter parameter: {0}")]
    MissingParameter(String),
    #[error("invalid filter parameter {0}: {1}")]
    InvalidParameter(String, String),
    #[error("filter {0} is not ready")]
    NotReady(&'static str),
    #[error("unsupported payload width: {0} bytes")]
    Payload(usize),
}

impl FilterError {
    pub fn code(&self) -> &'static str {
        match self {
            FilterError::UnknownKind(_) => "CONFIG.UNKNOWN_FILTER",
            FilterError::MissingParameter(_) => "CONFIG.MISSING_PARAMETER",
            FilterError::InvalidParameter(_, _) => "CONFIG.INVALID_PARAMETER",
            FilterError::NotReady(_) => "FILTER.NOT_READY",
            FilterError::Payload(_) => "FILTER.PAYLOAD",
        }
    }
}
