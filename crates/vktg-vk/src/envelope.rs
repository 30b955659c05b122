// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of VK response envelopes.

use serde_json::Value;
use vktg_core::RelayError;

/// Unwraps a decoded response body.
///
/// Shapes are checked in a fixed order: `failed` (stale long-poll
/// session), `error` (structured API error), `response` (success, which
/// must carry a non-empty payload), and finally the bare long-poll body
/// carrying `ts`. The bare body is returned whole.
pub fn check_envelope(method: &str, body: Value) -> Result<Value, RelayError> {
    let Value::Object(mut map) = body else {
        return Err(RelayError::Decode(format!(
            "{method}: response body is not an object"
        )));
    };

    if let Some(failed) = map.get("failed") {
        return Err(RelayError::SessionExpired {
            code: failed.as_i64().unwrap_or_default(),
        });
    }

    if let Some(error) = map.get("error") {
        let code = error
            .get("error_code")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(RelayError::Protocol { code, message });
    }

    if let Some(response) = map.remove("response") {
        if is_empty_payload(&response) {
            return Err(RelayError::EmptyResponse {
                method: method.to_string(),
            });
        }
        return Ok(response);
    }

    if map.contains_key("ts") {
        return Ok(Value::Object(map));
    }

    Err(RelayError::Decode(format!(
        "{method}: unrecognized response envelope"
    )))
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
