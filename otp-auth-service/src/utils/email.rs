use validator::ValidateEmail;

/// Longest address the identities table accepts.
pub const MAX_EMAIL_LEN: usize = 255;

/// Canonical form used for lookups and uniqueness: trimmed and lower-cased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN && email.validate_email()
}
