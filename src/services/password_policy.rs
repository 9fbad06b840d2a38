use log::warn;
use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::security::password_hashing::verify_password;

/// Special characters that satisfy the special-character requirement.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";
pub const MIN_LENGTH: usize = 8;
pub const MAX_LENGTH: usize = 128;
/// How many previous passwords (including the current one) a new password is
/// compared against.
pub const HISTORY_DEPTH: usize = 5;

const BANNED_SUBSTRINGS: [&str; 5] = ["123", "abc", "password", "admin", "qwerty"];

/// One rule the candidate password broke. Checks collect every violation
/// rather than stopping at the first, so the client can show the full list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must be at least {} characters long", MIN_LENGTH)]
    TooShort,
    #[error("Password must be at most {} characters long", MAX_LENGTH)]
    TooLong,
    #[error("Password must contain an uppercase letter")]
    MissingUppercase,
    #[error("Password must contain a lowercase letter")]
    MissingLowercase,
    #[error("Password must contain a digit")]
    MissingDigit,
    #[error("Password must contain a special character ({})", SPECIAL_CHARACTERS)]
    MissingSpecial,
    #[error("Password must not repeat the same character 3 or more times in a row")]
    RepeatedCharacters,
    #[error("Password must not contain common sequences such as '{0}'")]
    BannedSubstring(String),
}

/// Every rule the candidate breaks, in a stable order.
pub fn violations_for(password: &str) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();

    let length = password.chars().count();
    if length < MIN_LENGTH {
        violations.push(PolicyViolation::TooShort);
    }
    if length > MAX_LENGTH {
        violations.push(PolicyViolation::TooLong);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PolicyViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push(PolicyViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PolicyViolation::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push(PolicyViolation::MissingSpecial);
    }
    if has_repeated_run(password) {
        violations.push(PolicyViolation::RepeatedCharacters);
    }

    let lowered = password.to_lowercase();
    for banned in BANNED_SUBSTRINGS {
        if lowered.contains(banned) {
            violations.push(PolicyViolation::BannedSubstring(banned.to_string()));
        }
    }

    violations
}

/// Validates strength rules; all violations come back together in a single
/// `WeakPassword` error.
pub fn validate(password: &str) -> AppResult<()> {
    let violations = violations_for(password);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::WeakPassword(
            violations.iter().map(|v| v.to_string()).collect(),
        ))
    }
}

/// Rejects a candidate matching any of the recent password hashes. A stored
/// hash that cannot be parsed is skipped with a warning instead of blocking
/// the change; the reuse check is advisory, not an admission gate.
pub fn check_history(candidate: &str, past_hashes: &[String]) -> AppResult<()> {
    for hash in past_hashes.iter().take(HISTORY_DEPTH) {
        match verify_password(candidate, hash) {
            Ok(true) => {
                return Err(AppError::WeakPassword(vec![format!(
                    "Password was used recently. Choose one not among your last {} passwords",
                    HISTORY_DEPTH
                )]));
            }
            Ok(false) => {}
            Err(e) => warn!("Skipping unreadable password-history entry: {}", e),
        }
    }
    Ok(())
}

fn has_repeated_run(password: &str) -> bool {
    let mut run = 0usize;
    let mut prev: Option<char> = None;
    for c in password.chars() {
        if prev == Some(c) {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::password_hashing::hash_password;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn short_password_fails_for_length_alone() {
        assert_eq!(violations_for("Weak1!"), vec![PolicyViolation::TooShort]);
    }

    #[test]
    fn missing_special_character_is_the_only_complaint() {
        assert_eq!(
            violations_for("NoSpecialChar1"),
            vec![PolicyViolation::MissingSpecial]
        );
    }

    #[test]
    fn strong_password_passes() {
        assert!(validate("Str0ng!Pass").is_ok());
    }

    #[test]
    fn violations_are_collected_not_fail_fast() {
        let violations = violations_for("aaa");
        assert!(violations.contains(&PolicyViolation::TooShort));
        assert!(violations.contains(&PolicyViolation::MissingUppercase));
        assert!(violations.contains(&PolicyViolation::MissingDigit));
        assert!(violations.contains(&PolicyViolation::MissingSpecial));
        assert!(violations.contains(&PolicyViolation::RepeatedCharacters));
    }

    #[test]
    fn banned_sequences_are_case_insensitive_and_all_reported() {
        let violations = violations_for("PaSsWoRd123!x");
        assert_eq!(
            violations,
            vec![
                PolicyViolation::BannedSubstring("123".to_string()),
                PolicyViolation::BannedSubstring("password".to_string()),
            ]
        );
    }

    #[test]
    fn three_repeated_characters_fail_two_pass() {
        assert!(violations_for("Goood!Pw1").contains(&PolicyViolation::RepeatedCharacters));
        assert!(!violations_for("Good!Pw19").contains(&PolicyViolation::RepeatedCharacters));
    }

    #[test]
    fn weak_password_error_carries_every_reason() {
        let err = validate("aaa").unwrap_err();
        match err {
            AppError::WeakPassword(reasons) => assert!(reasons.len() >= 4),
            other => panic!("expected WeakPassword, got {:?}", other),
        }
    }

    #[test]
    fn reused_password_is_rejected_against_history() {
        let history = vec![
            hash_password("Old!Pass1").unwrap(),
            hash_password("Old!Pass2").unwrap(),
        ];

        assert!(check_history("Fresh!Pass3", &history).is_ok());
        let err = check_history("Old!Pass2", &history).unwrap_err();
        assert!(matches!(err, AppError::WeakPassword(_)));
    }

    #[test]
    fn unreadable_history_entries_are_skipped() {
        let history = vec!["not-a-hash".to_string(), hash_password("Old!Pass1").unwrap()];
        assert!(check_history("Fresh!Pass3", &history).is_ok());
        assert!(check_history("Old!Pass1", &history).is_err());
    }

    proptest! {
        #[test]
        fn repeated_run_detection_matches_windowed_oracle(s in "[ab1!AB]{0,12}") {
            let chars: Vec<char> = s.chars().collect();
            let oracle = chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]);
            prop_assert_eq!(
                violations_for(&s).contains(&PolicyViolation::RepeatedCharacters),
                oracle
            );
        }

        #[test]
        fn length_bounds_count_characters_not_bytes(s in "\\PC{0,20}") {
            let count = s.chars().count();
            let violations = violations_for(&s);
            prop_assert_eq!(violations.contains(&PolicyViolation::TooShort), count < MIN_LENGTH);
            prop_assert!(!violations.contains(&PolicyViolation::TooLong));
        }
    }
}
