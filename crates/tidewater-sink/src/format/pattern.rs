//! `${path}` placeholder rendering against a JSON record.

use serde_json::Value;

use crate::error::{SinkError, SinkResult};

/// Renders `pattern`, replacing each `${path}` with the value at that dotted
/// path in `root`.
///
/// Text outside placeholders is kept literally, including an unterminated
/// `${`. Path segments index objects by key and arrays by position. String
/// values are inserted as-is; numbers and booleans by their JSON text.
///
/// # Errors
///
/// Returns `SinkError::Decode` if a path is missing, null, or resolves to
/// an object or array.
pub fn render(pattern: &str, root: &Value) -> SinkResult<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let path = rest[start + 2..start + 2 + len].trim();
        out.push_str(&lookup(root, path)?);
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup(root: &Value, path: &str) -> SinkResult<String> {
    let mut current = root;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| {
            SinkError::Decode(format!("pattern path '{path}' not found in record"))
        })?;
    }

    match current {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(SinkError::Decode(format!("pattern path '{path}' is null"))),
        Value::Array(_) | Value::Object(_) => Err(SinkError::Decode(format!(
            "pattern path '{path}' is not a scalar"
        ))),
    }
}
