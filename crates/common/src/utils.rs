//! Small helpers

use uuid::Uuid;

/// Length of a DAO invite code
pub const INVITE_CODE_LEN: usize = 8;

/// Generate a random upper-case alphanumeric invite code
pub fn generate_invite_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(INVITE_CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Normalize a user-entered invite code for lookup
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_invite_code() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(code, generate_invite_code());
    }

    #[test]
    fn test_normalize_invite_code() {
        assert_eq!(normalize_invite_code("  ab12cd34 "), "AB12CD34");
    }
}
