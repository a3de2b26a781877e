//! Input validation helpers for path and body fields

use shared::error::AppError;

/// Order, restaurant, table and menu item ids
pub const MAX_ID_LEN: usize = 128;

/// Validate an id taken from a path or body: non-blank, bounded, no control characters
pub fn validate_id(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {MAX_ID_LEN})",
            value.len()
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(AppError::validation(format!(
            "{field} contains control characters"
        )));
    }
    Ok(())
}
