//! Extraction of the scalar fields the client cares about
//!
//! Only three fields are ever read from a cloud response: `return_value` of a
//! function call, `result` of a variable read and `online` of a ping. Anything
//! missing or of the wrong shape is a [`CloudError::Parse`], never a panic and
//! never a partial value.

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use std::fmt;

use crate::error::{CloudError, Result};

/// Longest variable value handed to a continuation
pub const MAX_RESULT_LEN: usize = 1024;

fn parse_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| CloudError::Parse(format!("invalid JSON: {}", e)))
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value> {
    value
        .get(name)
        .ok_or_else(|| CloudError::Parse(format!("missing field '{}'", name)))
}

/// Integer returned by a device function
pub fn parse_return_value(body: &str) -> Result<i32> {
    let value = parse_body(body)?;
    let raw = field(&value, "return_value")?;
    let wide = raw
        .as_i64()
        .ok_or_else(|| CloudError::Parse(format!("return_value is not an integer: {}", raw)))?;
    i32::try_from(wide).map_err(|_| CloudError::Parse(format!("return_value out of range: {}", wide)))
}

#[derive(Deserialize)]
struct VariableBody<'a> {
    #[serde(borrow)]
    result: &'a RawValue,
}

/// Text form of a device variable
///
/// Strings are returned unescaped, numbers, booleans and null as their raw
/// JSON token. Values longer than [`MAX_RESULT_LEN`] bytes are cut at a
/// character boundary.
pub fn parse_variable_result(body: &str) -> Result<String> {
    let parsed: VariableBody<'_> = serde_json::from_str(body)
        .map_err(|e| CloudError::Parse(format!("invalid variable response: {}", e)))?;
    let raw = parsed.result.get().trim();

    let text = match raw.as_bytes().first() {
        Some(b'"') => serde_json::from_str::<String>(raw)
            .map_err(|e| CloudError::Parse(format!("invalid result string: {}", e)))?,
        Some(b'[') | Some(b'{') => {
            return Err(CloudError::Parse(
                "structured variable values are not supported".to_string(),
            ))
        }
        _ => raw.to_string(),
    };
    Ok(truncate_utf8(&text, MAX_RESULT_LEN).to_string())
}

/// Connection state a ping reports for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
    Unknown,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Read the `online` flag of a ping response; informational only
pub fn parse_online_status(body: &str) -> DeviceStatus {
    match serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("online").and_then(Value::as_bool))
    {
        Some(true) => DeviceStatus::Online,
        Some(false) => DeviceStatus::Offline,
        None => DeviceStatus::Unknown,
    }
}

/// Longest prefix of `text` that fits in `max_len` bytes
pub fn truncate_utf8(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
