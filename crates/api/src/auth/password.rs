//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2id work factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    /// OWASP baseline for Argon2id (19 MiB, 2 iterations, 1 lane)
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingParams {
    pub fn hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str, params: HashingParams) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    params
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password_blocking(
    password: String,
    params: HashingParams,
) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password, params))
        .await
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
}

/// Generate a valid Argon2 hash whose password nobody knows.
///
/// Verified against when a username does not exist, so unknown and known
/// usernames cost the same.
pub fn generate_impossible_hash(params: HashingParams) -> Result<String, PasswordError> {
    use argon2::password_hash::rand_core::RngCore;

    let mut random_bytes = [0u8; 64];
    OsRng.fill_bytes(&mut random_bytes);

    hash_password(&hex::encode(random_bytes), params)
}

/// Verify a password against a hash. The work factor comes from the hash itself.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn verify_password_blocking(
    password: String,
    hash: String,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
}

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`";

/// Validate password strength for newly chosen passwords
pub fn validate_password_strength(password: &str) -> Result<(), PasswordValidationError> {
    if password.chars().count() < 12 {
        return Err(PasswordValidationError::TooShort);
    }

    if password.chars().count() > 128 {
        return Err(PasswordValidationError::TooLong);
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordValidationError::MissingLowercase);
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordValidationError::MissingUppercase);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordValidationError::MissingDigit);
    }

    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PasswordValidationError::MissingSpecialChar);
    }

    if is_common_password(password) {
        return Err(PasswordValidationError::TooCommon);
    }

    Ok(())
}

fn is_common_password(password: &str) -> bool {
    const COMMON_PASSWORDS: &[&str] = &[
        "password123!",
        "password1234",
        "password@123",
        "password#123",
        "p@ssw0rd1234",
        "qwerty123456",
        "qwertyuiop1!",
        "welcome123!!",
        "letmein12345",
        "administrator",
        "admin1234567",
        "changeme1234",
        "iloveyou1234",
        "1q2w3e4r5t6y",
        "trustno1trustno1",
    ];

    let password_lower = password.to_lowercase();
    COMMON_PASSWORDS.contains(&password_lower.as_str())
}

/// Calculate password strength score (0-4)
pub fn calculate_password_strength(password: &str) -> PasswordStrength {
    let mut score: u8 = 0;
    let mut feedback = Vec::new();
    let length = password.chars().count();

    if length >= 12 {
        score += 1;
    } else {
        feedback.push("Use at least 12 characters".to_string());
    }

    if length >= 16 {
        score += 1;
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARS.contains(c));

    let char_types = [has_lowercase, has_uppercase, has_digit, has_special]
        .iter()
        .filter(|&&x| x)
        .count();

    match char_types {
        4 => score += 2,
        3 => score += 1,
        _ => {}
    }

    for (present, hint) in [
        (has_lowercase, "Add lowercase letters"),
        (has_uppercase, "Add uppercase letters"),
        (has_digit, "Add numbers"),
        (has_special, "Add special characters (!@#$%^&*)"),
    ] {
        if !present {
            feedback.push(hint.to_string());
        }
    }

    if is_common_password(password) {
        score = 0;
        feedback.push("This is a commonly used password - choose something unique".to_string());
    }

    let has_repeated = password
        .chars()
        .collect::<Vec<_>>()
        .windows(3)
        .any(|w| w[0] == w[1] && w[1] == w[2]);

    if has_repeated {
        score = score.saturating_sub(1);
        feedback.push("Avoid repeated characters (e.g., 'aaa')".to_string());
    }

    let level = match score {
        0..=1 => PasswordStrengthLevel::VeryWeak,
        2 => PasswordStrengthLevel::Weak,
        3 => PasswordStrengthLevel::Fair,
        _ => PasswordStrengthLevel::Strong,
    };

    PasswordStrength {
        score,
        level,
        feedback,
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PasswordStrength {
    pub score: u8,
    pub level: PasswordStrengthLevel,
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, Copy, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStrengthLevel {
    VeryWeak,
    Weak,
    Fair,
    Strong,
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordValidationError {
    #[error("Password must be at least 12 characters")]
    TooShort,
    #[error("Password must be at most 128 characters")]
    TooLong,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
    #[error("Password must contain at least one special character (!@#$%^&*)")]
    MissingSpecialChar,
    #[error("This password is too common - please choose a unique password")]
    TooCommon,
}

#[cfg(test)]
pub(crate) const TEST_PARAMS: HashingParams = HashingParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};
