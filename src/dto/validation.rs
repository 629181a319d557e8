//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a user id is present and not just whitespace.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(error("user_id_empty", "user id must not be empty".into()));
    }
    Ok(())
}

/// Validates a list of target user ids.
///
/// ```ignore
/// validate_user_ids(&["u2".into(), "u3".into()]) // Ok
/// validate_user_ids(&[])                         // Err - empty
/// validate_user_ids(&["u2".into(), "u2".into()]) // Err - duplicate
/// ```
pub fn validate_user_ids(ids: &[String]) -> Result<(), ValidationError> {
    if ids.is_empty() {
        return Err(error(
            "user_ids_empty",
            "at least one user id is required".into(),
        ));
    }

    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(error("user_id_empty", "user ids must not be empty".into()));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(duplicate) = ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(error(
            "user_ids_duplicate",
            format!("user id {duplicate} is listed more than once"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("u1").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("   ").is_err());
    }

    #[test]
    fn test_validate_user_ids_valid() {
        assert!(validate_user_ids(&ids(&["u2"])).is_ok());
        assert!(validate_user_ids(&ids(&["u2", "u3"])).is_ok());
    }

    #[test]
    fn test_validate_user_ids_invalid() {
        assert!(validate_user_ids(&[]).is_err());
        assert!(validate_user_ids(&ids(&["u2", ""])).is_err());
        let err = validate_user_ids(&ids(&["u2", "u3", "u2"])).unwrap_err();
        assert_eq!(err.code, "user_ids_duplicate");
    }
}
