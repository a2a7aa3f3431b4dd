//! 连接参数读取。

use fabric_plugin::{Parameters, PluginError};
use std::str::FromStr;

pub(crate) fn required<'a>(parameters: &'a Parameters, key: &str) -> Result<&'a str, PluginError> {
    parameters
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| PluginError::MissingParameter(key.to_string()))
}

pub(crate) fn parse_required<T: FromStr>(parameters: &Parameters, key: &str) -> Result<T, PluginError> {
    let raw = required(parameters, key)?;
    parse_value(key, raw)
}

pub(crate) fn parse_or<T: FromStr>(
    parameters: &Parameters,
    key: &str,
    default: T,
) -> Result<T, PluginError> {
    match parameters.get(key) {
        Some(raw) => parse_value(key, raw),
        None => Ok(default),
    }
}

/// 非空可选参数。
pub(crate) fn optional<'a>(parameters: &'a Parameters, key: &str) -> Option<&'a str> {
    parameters
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, PluginError> {
    raw.trim()
        .parse()
        .map_err(|_| PluginError::InvalidParameter(key.to_string(), raw.to_string()))
}
