use subtle::ConstantTimeEq;

use crate::config::settings::ServiceGateConfig;

/// Compares two strings in constant time to avoid timing side channels on
/// credential checks. Length mismatches return false without leaking where
/// the difference is.
pub fn constant_time_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Checks a presented service key/code pair against the configured gate
/// credentials. Both comparisons always run, whatever the first one says.
pub fn verify_service_credentials(key: &str, code: &str, expected: &ServiceGateConfig) -> bool {
    let key_ok = constant_time_equal(key, &expected.key);
    let code_ok = constant_time_equal(code, &expected.code);
    key_ok & code_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ServiceGateConfig {
        ServiceGateConfig {
            key: "gate-key-123".to_string(),
            code: "gate-code-456".to_string(),
        }
    }

    #[test]
    fn equal_strings_compare_equal() {
        assert!(constant_time_equal("abc123", "abc123"));
        assert!(constant_time_equal("", ""));
    }

    #[test]
    fn different_strings_compare_unequal() {
        assert!(!constant_time_equal("abc123", "abc124"));
        assert!(!constant_time_equal("abc", "abcdef"));
    }

    #[test]
    fn matching_pair_is_accepted() {
        assert!(verify_service_credentials("gate-key-123", "gate-code-456", &gate()));
    }

    #[test]
    fn wrong_key_or_code_is_rejected() {
        assert!(!verify_service_credentials("wrong", "gate-code-456", &gate()));
        assert!(!verify_service_credentials("gate-key-123", "wrong", &gate()));
        assert!(!verify_service_credentials("", "", &gate()));
    }
}
