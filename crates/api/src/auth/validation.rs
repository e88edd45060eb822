//! Explicit request validation
//!
//! Called at the top of each coordinator method. This is a format check, not the
//! security boundary; credential checks happen afterwards regardless.

use crate::error::{ApiError, ApiResult};

pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_IDENTITY_LEN: usize = 254;

/// Present and not just whitespace
pub fn not_blank(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

pub fn max_len(field: &str, value: &str, max: usize) -> ApiResult<()> {
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> ApiResult<()> {
    not_blank("username", username)?;
    max_len("username", username, MAX_USERNAME_LEN)?;
    let allowed = |c: char| c.is_ascii_alphanumeric() || "._-@+".contains(c);
    if !username.chars().all(allowed) {
        return Err(ApiError::Validation(
            "username contains unsupported characters".to_string(),
        ));
    }
    Ok(())
}

/// Login passwords are only format-checked; strength rules apply to new passwords.
pub fn validate_login_password(password: &str) -> ApiResult<()> {
    not_blank("password", password)?;
    max_len("password", password, MAX_PASSWORD_LEN)
}

pub fn validate_identity(identity: &str) -> ApiResult<()> {
    not_blank("identity", identity)?;
    max_len("identity", identity, MAX_IDENTITY_LEN)
}
