//! Hash value normalization.
//!
//! All hash values are stored and compared in normalized form: surrounding
//! whitespace removed and lowercased. Validation only checks length; the
//! content is otherwise opaque (perceptual hashes are not hex).

/// Shortest accepted hash value, in characters.
pub const MIN_HASH_LEN: usize = 8;

/// Longest accepted hash value, in characters.
pub const MAX_HASH_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashValueError {
    #[error("hash value must be between 8 and 64 characters, got {len}")]
    Length { len: usize },
}

/// Trim surrounding whitespace and lowercase.
pub fn normalize_hash(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Check an already-normalized value.
pub fn validate_hash_value(normalized: &str) -> Result<(), HashValueError> {
    let len = normalized.chars().count();
    if (MIN_HASH_LEN..=MAX_HASH_LEN).contains(&len) {
        Ok(())
    } else {
        Err(HashValueError::Length { len })
    }
}

/// Normalize then validate, returning the normalized value.
pub fn normalize_and_validate(raw: &str) -> Result<String, HashValueError> {
    let normalized = normalize_hash(raw);
    validate_hash_value(&normalized)?;
    Ok(normalized)
}
