//! Bounds for caller-supplied JSON objects.
//!
//! Hash metadata, subscription filters and audit details are free-form JSON
//! objects. They are accepted only when they stay within [`JsonBounds`].

use serde_json::Value;

/// Size limits applied to a free-form JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonBounds {
    /// Maximum keys in any single object (and elements in any single array).
    pub max_entries: usize,
    /// Maximum container nesting; the top-level object is depth 1.
    pub max_depth: usize,
    /// Maximum serialized size in bytes.
    pub max_bytes: usize,
}

impl Default for JsonBounds {
    fn default() -> Self {
        Self {
            max_entries: 64,
            max_depth: 4,
            max_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoundsError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("object has {count} entries, at most {max} allowed")]
    TooManyEntries { count: usize, max: usize },

    #[error("nesting exceeds {max} levels")]
    TooDeep { max: usize },

    #[error("serialized size {bytes} bytes exceeds {max} bytes")]
    TooLarge { bytes: usize, max: usize },
}

/// Validate that `value` is an object within `bounds`.
///
/// `null` is not accepted here; callers that allow an absent object should
/// check for it before calling.
pub fn validate_bounded_object(value: &Value, bounds: &JsonBounds) -> Result<(), BoundsError> {
    if !value.is_object() {
        return Err(BoundsError::NotAnObject);
    }
    check_node(value, 1, bounds)?;

    let bytes = value.to_string().len();
    if bytes > bounds.max_bytes {
        return Err(BoundsError::TooLarge {
            bytes,
            max: bounds.max_bytes,
        });
    }
    Ok(())
}

fn check_node(value: &Value, depth: usize, bounds: &JsonBounds) -> Result<(), BoundsError> {
    let children: Box<dyn Iterator<Item = &Value>> = match value {
        Value::Object(map) => {
            check_entries(map.len(), bounds)?;
            Box::new(map.values())
        }
        Value::Array(items) => {
            check_entries(items.len(), bounds)?;
            Box::new(items.iter())
        }
        _ => return Ok(()),
    };

    if depth > bounds.max_depth {
        return Err(BoundsError::TooDeep {
            max: bounds.max_depth,
        });
    }

    for child in children {
        check_node(child, depth + 1, bounds)?;
    }
    Ok(())
}

fn check_entries(count: usize, bounds: &JsonBounds) -> Result<(), BoundsError> {
    if count > bounds.max_entries {
        return Err(BoundsError::TooManyEntries {
            count,
            max: bounds.max_entries,
        });
    }
    Ok(())
}
