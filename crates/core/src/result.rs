//! Result extension traits for Railway-Oriented Programming.
//!
//! Provides combinators for results whose failure should be logged and
//! absorbed rather than propagated, without unwrap/expect.

/// Extension trait for results whose error is reported and then dropped.
pub trait ResultExt<T> {
    /// Convert a Result to an Option, logging the error if present.
    fn into_option_logged(self, context: &str) -> Option<T>;

    /// Get the value or a default, logging the error if present.
    fn or_default_logged(self, context: &str, default: T) -> T;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }

    fn or_default_logged(self, context: &str, default: T) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "{context}, using default");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_result_into_option_ok() {
        let result: crate::Result<i32> = Ok(42);
        assert_eq!(result.into_option_logged("reading"), Some(42));
    }

    #[test]
    fn test_result_into_option_err() {
        let result: crate::Result<i32> = Err(Error::fingerprint_failed("test"));
        assert_eq!(result.into_option_logged("reading"), None);
    }

    #[test]
    fn test_result_or_default_logged_err() {
        let result: std::result::Result<i32, String> = Err("boom".to_string());
        assert_eq!(result.or_default_logged("counting", 99), 99);
    }
}
