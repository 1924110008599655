//! Key validation and artifact naming.
//!
//! Each key maps to exactly one artifact named `<key>.<extension>`. While a
//! replacement is in flight a second artifact `<key>.<extension>.tmp` exists
//! next to it.

use crate::error::{StorageError, StorageResult};

/// Suffix appended to an artifact name to form its temporary artifact.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Checks that a key can be used as an artifact name.
///
/// Keys must be non-empty, must not be `.` or `..`, and must not contain
/// path separators or NUL bytes.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] describing the first violation.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key(key, "key is empty"));
    }
    if key == "." || key == ".." {
        return Err(StorageError::invalid_key(key, "key is a relative path"));
    }
    if key.contains(['/', '\\']) {
        return Err(StorageError::invalid_key(key, "key contains a path separator"));
    }
    if key.contains('\0') {
        return Err(StorageError::invalid_key(key, "key contains a NUL byte"));
    }
    Ok(())
}

/// Returns the artifact name for a key.
#[must_use]
pub fn artifact_name(key: &str, extension: &str) -> String {
    format!("{key}.{extension}")
}

/// Returns the temporary artifact name for a key.
#[must_use]
pub fn temp_name(key: &str, extension: &str) -> String {
    format!("{key}.{extension}{TEMP_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_keys() {
        assert!(validate_key("settings").is_ok());
        assert!(validate_key("user-42.profile").is_ok());
        assert!(validate_key("..hidden").is_ok());
    }

    #[test]
    fn rejects_empty_key() {
        assert!(matches!(
            validate_key(""),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn rejects_path_like_keys() {
        for key in [".", "..", "a/b", "a\\b", "../escape"] {
            assert!(validate_key(key).is_err(), "{key} should be rejected");
        }
    }

    #[test]
    fn rejects_nul() {
        assert!(validate_key("a\0b").is_err());
    }

    #[test]
    fn names() {
        assert_eq!(artifact_name("todos", "json"), "todos.json");
        assert_eq!(temp_name("todos", "json"), "todos.json.tmp");
    }
}
