//! Inbound correlation id validation.
//!
//! Validation is opt-in. When enabled, the shape check keeps hostile or
//! accidental junk (control characters, oversized values) out of logs and
//! response headers; rejected values are replaced, never errored on.

use crate::options::TraceabilityOptions;

/// Maximum accepted length for an inbound correlation id when validation
/// is enabled.
pub const MAX_CORRELATION_ID_LENGTH: usize = 128;

/// Shape check for inbound correlation ids.
///
/// Implementations must be pure: a boolean verdict, no side effects, no
/// panics on arbitrary input.
pub trait CorrelationValidator: Send + Sync {
    fn validate(&self, id: &str, options: &TraceabilityOptions) -> bool;
}

/// Default validator: bounded length, `[A-Za-z0-9_-]` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCorrelationValidator;

impl CorrelationValidator for DefaultCorrelationValidator {
    fn validate(&self, id: &str, options: &TraceabilityOptions) -> bool {
        if !options.validate_correlation_id_format {
            return true;
        }
        if id.is_empty() || id.len() > MAX_CORRELATION_ID_LENGTH {
            return false;
        }
        id.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn validating_options() -> TraceabilityOptions {
        TraceabilityOptions::default().validate_format(true)
    }

    #[test]
    fn test_disabled_accepts_anything() {
        let validator = DefaultCorrelationValidator;
        let options = TraceabilityOptions::default();

        assert!(validator.validate("abc def", &options));
        assert!(validator.validate("", &options));
        assert!(validator.validate(&"x".repeat(4096), &options));
    }

    #[test]
    fn test_accepts_well_formed_ids() {
        let validator = DefaultCorrelationValidator;
        let options = validating_options();

        assert!(validator.validate("4bf92f3577b34da6a3ce929d0e0e4736", &options));
        assert!(validator.validate("order-7781_retry", &options));
        assert!(validator.validate("A", &options));
        assert!(validator.validate(&"a".repeat(MAX_CORRELATION_ID_LENGTH), &options));
    }

    #[test]
    fn test_rejects_malformed_ids() {
        let validator = DefaultCorrelationValidator;
        let options = validating_options();

        assert!(!validator.validate("", &options));
        assert!(!validator.validate("abc def", &options));
        assert!(!validator.validate("abc\ndef", &options));
        assert!(!validator.validate("id;drop", &options));
        assert!(!validator.validate("id=value", &options));
        assert!(!validator.validate(&"a".repeat(MAX_CORRELATION_ID_LENGTH + 1), &options));
    }

    proptest! {
        #[test]
        fn prop_well_formed_ids_always_pass(id in "[A-Za-z0-9_-]{1,128}") {
            let validator = DefaultCorrelationValidator;
            prop_assert!(validator.validate(&id, &validating_options()));
        }

        #[test]
        fn prop_ids_with_illegal_chars_always_fail(
            prefix in "[A-Za-z0-9_-]{0,20}",
            bad in "[ !\"#$%&'()*+,./:;<=>?@\\\\\\[\\]^`{|}~]",
            suffix in "[A-Za-z0-9_-]{0,20}",
        ) {
            let validator = DefaultCorrelationValidator;
            let id = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(!validator.validate(&id, &validating_options()));
        }
    }
}
