//! Utility functions for Wayfinder
//!
//! Common helper functions used across the codebase.

use std::sync::LazyLock;

/// Regex pattern for validating identifiers (instance id, service name, tag)
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:=/-]*$").expect("Invalid regex pattern"));

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, equals, slash, hyphen
///
/// # Examples
///
/// ```
/// use wayfinder_common::is_valid;
///
/// assert!(is_valid("payments-api"));
/// assert!(is_valid("version=v2"));
/// assert!(!is_valid("with spaces"));
/// assert!(!is_valid("glob*"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_identifiers() {
        assert!(is_valid("abc123"));
        assert!(is_valid("orders_v2"));
        assert!(is_valid("orders-v2"));
        assert!(is_valid("orders.eu"));
        assert!(is_valid("region:eu-west"));
        assert!(is_valid("proto=grpc"));
        assert!(is_valid("team/payments"));
    }

    #[test]
    fn test_is_valid_empty() {
        assert!(is_valid(""));
    }

    #[test]
    fn test_is_valid_invalid_chars() {
        assert!(!is_valid("test value")); // space
        assert!(!is_valid("test*value")); // glob
        assert!(!is_valid("test?value")); // glob
        assert!(!is_valid("test[0]")); // glob
        assert!(!is_valid("test\\value")); // escape
    }
}
