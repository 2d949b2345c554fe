//! Balanced-bracket JSON extraction from free-form LLM completion text.
//!
//! Used only when a completion endpoint cannot honor structured output and
//! returns a JSON value embedded in surrounding prose. Intentionally not
//! regex-based: a non-greedy regex cannot correctly match nested arrays or
//! objects, and a greedy one overshoots past the first closing brace found
//! anywhere later in the text.

/// Scans `text` for the first complete, balanced top-level JSON value
/// (an object or array) and returns its substring.
///
/// Tracks string and escape state so braces/brackets inside string
/// literals don't affect the bracket count. Returns `None` if no balanced
/// value is found.
pub fn extract_json(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let opener = bytes[start];
    let closer = if opener == b'{' { b'}' } else { b']' };

    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    // Only a match if the value that closed is the same
                    // bracket kind we opened with; a mismatched stream
                    // (malformed input) is rejected rather than returned.
                    if b == closer {
                        return Some(&text[start..end]);
                    }
                    return None;
                }
            }
            _ => {}
        }
    }

    None
}

/// Extracts and parses the first balanced JSON value in `text` as `T`.
pub fn extract_and_parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let raw = extract_json(text).ok_or(ExtractError::NoBalancedValue)?;
    serde_json::from_str(raw).map_err(ExtractError::Json)
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no balanced JSON value found in completion text")]
    NoBalancedValue,
    #[error("balanced JSON value failed to parse: {0}")]
    Json(#[from] serde_json::Error),
}
