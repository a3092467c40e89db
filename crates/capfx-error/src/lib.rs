// capfx Error Handling Framework
// Misuse errors raised by the effect runtime. Domain errors never use these
// types; they travel through the `CatchError` capability as ordinary values.

use thiserror::Error;

// Re-export the derive crate so downstream error enums share one version
pub use thiserror;

/// Errors signalling that the runtime was used outside its contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// A computation asked for a capability the record does not carry
    #[error("capability `{name}` is not present in the record")]
    MissingCapability { name: &'static str },

    /// The record carries an entry for the capability with an unexpected type
    #[error("capability `{name}` is registered with a different implementation type")]
    CapabilityTypeMismatch { name: &'static str },

    /// The sequential composer's body suspended without yielding a computation
    #[error("sequential composer suspended on a future that is not a yielded computation")]
    ForeignSuspension,
}

impl EffectError {
    /// Stable identifier for the error kind
    pub fn error_code(&self) -> &'static str {
        match self {
            EffectError::MissingCapability { .. } => "EFFECT_MISSING_CAPABILITY",
            EffectError::CapabilityTypeMismatch { .. } => "EFFECT_CAPABILITY_TYPE_MISMATCH",
            EffectError::ForeignSuspension => "EFFECT_FOREIGN_SUSPENSION",
        }
    }
}

/// Result type for runtime lookups
pub type EffectResult<T> = std::result::Result<T, EffectError>;

/// Abort on a contract violation.
///
/// Misuse is undefined behaviour at the design level; the runtime reports it and
/// stops instead of carrying on with a corrupted continuation chain.
#[track_caller]
pub fn fail_fast(err: EffectError) -> ! {
    tracing::error!(code = err.error_code(), "effect runtime misuse: {err}");
    panic!("{err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_capability() {
        let err = EffectError::MissingCapability { name: "print" };
        assert_eq!(err.to_string(), "capability `print` is not present in the record");
        assert_eq!(err.error_code(), "EFFECT_MISSING_CAPABILITY");
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            EffectError::MissingCapability { name: "a" }.error_code(),
            EffectError::CapabilityTypeMismatch { name: "a" }.error_code(),
            EffectError::ForeignSuspension.error_code(),
        ];
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
    }

    #[test]
    #[should_panic(expected = "not a yielded computation")]
    fn test_fail_fast_panics_with_message() {
        fail_fast(EffectError::ForeignSuspension);
    }
}
