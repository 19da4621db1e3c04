use crate::storage::{RepositoryError, Result};

/// Validates a display name (listing, robot, artifact, username).
pub fn validate_name(entity: &str, name: &str, max_len: usize) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RepositoryError::Validation(format!(
            "{entity} name cannot be empty"
        )));
    }
    if name.chars().count() > max_len {
        return Err(RepositoryError::Validation(format!(
            "{entity} name too long (max {max_len} characters)"
        )));
    }
    Ok(())
}

/// Validates the rough shape of an email address.
pub fn validate_email(email: &str) -> Result<()> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(RepositoryError::Validation(format!(
            "Invalid email address: {email}"
        )));
    }
    Ok(())
}

/// Validates that an optional amount is not negative.
pub fn validate_non_negative(field: &str, value: Option<i64>) -> Result<()> {
    match value {
        Some(v) if v < 0 => Err(RepositoryError::Validation(format!(
            "{field} cannot be negative"
        ))),
        _ => Ok(()),
    }
}
