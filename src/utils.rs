//! String helpers for showing credentials without leaking them
//!
//! Previews cut at UTF-8 character boundaries so that odd provider values
//! never cause a panic when printed.

/// Number of leading bytes of a secret that may be shown
pub const SECRET_PREVIEW_BYTES: usize = 8;

/// Safely truncate a string at a UTF-8 character boundary.
///
/// Returns a slice of at most `max_bytes` bytes, ending on the last valid
/// character boundary at or before `max_bytes`.
///
/// # Example
/// ```
/// use google_photos_auth::utils::safe_truncate;
///
/// let text = "Café";
/// assert_eq!(safe_truncate(text, 4), "Caf");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    &s[..boundary]
}

/// Redact a secret for display.
///
/// Long values keep a short prefix followed by `...`. Values too short to
/// hide anything behind a prefix are fully masked.
///
/// # Example
/// ```
/// use google_photos_auth::utils::redact;
///
/// assert_eq!(redact("ya29.a0AfH6SMBx"), "ya29.a0A...");
/// assert_eq!(redact("short"), "****");
/// ```
#[must_use]
pub fn redact(secret: &str) -> String {
    if secret.len() <= SECRET_PREVIEW_BYTES {
        return "****".to_string();
    }
    format!("{}...", safe_truncate(secret, SECRET_PREVIEW_BYTES))
}

/// Redact an optional secret, showing `<unset>` when absent
#[must_use]
pub fn redact_opt(secret: Option<&str>) -> String {
    secret.map_or_else(|| "<unset>".to_string(), redact)
}
