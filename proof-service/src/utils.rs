//! Shared utility functions for the proof service

use std::time::Duration;

/// Parse an environment variable into a type implementing FromStr, with a default fallback
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Millisecond duration from the environment
pub fn env_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_parse(key, default_ms))
}

/// Non-empty string from the environment
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("PROOF_SERVICE_TEST_NUM", "not-a-number");
        assert_eq!(env_parse("PROOF_SERVICE_TEST_NUM", 7u32), 7);

        std::env::set_var("PROOF_SERVICE_TEST_NUM", "42");
        assert_eq!(env_parse("PROOF_SERVICE_TEST_NUM", 7u32), 42);
        assert_eq!(
            env_millis("PROOF_SERVICE_TEST_NUM", 1),
            Duration::from_millis(42)
        );
        std::env::remove_var("PROOF_SERVICE_TEST_NUM");
    }

    #[test]
    #[serial]
    fn test_env_opt_ignores_blank() {
        std::env::set_var("PROOF_SERVICE_TEST_OPT", "   ");
        assert_eq!(env_opt("PROOF_SERVICE_TEST_OPT"), None);
        std::env::set_var("PROOF_SERVICE_TEST_OPT", " secret ");
        assert_eq!(env_opt("PROOF_SERVICE_TEST_OPT").as_deref(), Some("secret"));
        std::env::remove_var("PROOF_SERVICE_TEST_OPT");
    }
}
