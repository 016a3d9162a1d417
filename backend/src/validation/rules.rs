//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Validates a product key such as `rategen` or `bimCourse`.
///
/// Requirements:
/// - 1-64 characters in length
/// - ASCII alphanumerics, `_` and `-` only
pub fn validate_product_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() || key.len() > 64 {
        return Err(ValidationError::new("product_key_invalid_length"));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::new("product_key_invalid_characters"));
    }

    Ok(())
}

/// Validates a client-supplied device fingerprint.
///
/// Fingerprints are opaque, but must be non-blank and reasonably sized.
pub fn validate_fingerprint(fingerprint: &str) -> Result<(), ValidationError> {
    let trimmed = fingerprint.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("fingerprint_blank"));
    }
    if trimmed.len() > 256 {
        return Err(ValidationError::new("fingerprint_too_long"));
    }
    Ok(())
}
