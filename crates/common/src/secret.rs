//! Serde helpers for `Secret<String>` fields.

use secrecy::Secret;

pub const REDACTED: &str = "[REDACTED]";

/// Serialize an `Option<Secret<String>>` as `"[REDACTED]"` when present.
///
/// Used by `config show` so effective configuration can be printed without
/// leaking credentials.
pub fn serialize_option_redacted<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(_) => serializer.serialize_some(REDACTED),
        None => serializer.serialize_none(),
    }
}
