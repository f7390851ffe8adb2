//! Input limits for untrusted markup
//!
//! Markup reaches the engines straight from user editors, so every call is
//! bounded before and during the rewrite:
//!
//! 1. **Input Size**: oversized buffers are rejected before any pass runs
//! 2. **Nesting Depth**: quote de-nesting refuses pathological `[quote]` towers
//!
//! Pattern matching itself cannot blow up: the `regex` crate guarantees
//! linear-time matching, and the cooperative timeout in
//! [`ConversionContext`](crate::converter::ConversionContext) bounds the rest.

use crate::converter::{ConversionOptions, DEFAULT_MAX_INPUT_SIZE, DEFAULT_MAX_QUOTE_DEPTH};
use crate::error::ConversionError;

/// Security validator for markup input
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    /// Maximum accepted input size in bytes
    max_input_size: usize,
    /// Maximum allowed nesting depth
    max_depth: usize,
}

impl SecurityValidator {
    /// Create a new security validator with default settings
    pub fn new() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_depth: DEFAULT_MAX_QUOTE_DEPTH,
        }
    }

    /// Create a validator from conversion options
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            max_input_size: options.max_input_size,
            max_depth: options.max_quote_depth,
        }
    }

    /// Create a security validator with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::new()
        }
    }

    /// Reject inputs larger than the configured limit
    ///
    /// # Examples
    ///
    /// ```
    /// use markup_normalizer::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::new();
    /// assert!(validator.validate_input_size(1024).is_ok());
    /// assert!(validator.validate_input_size(usize::MAX).is_err());
    /// ```
    pub fn validate_input_size(&self, size: usize) -> Result<(), ConversionError> {
        if size > self.max_input_size {
            tracing::warn!(size, limit = self.max_input_size, "Input rejected");
            return Err(ConversionError::InputTooLarge {
                size,
                limit: self.max_input_size,
            });
        }
        Ok(())
    }

    /// Validate nesting depth
    ///
    /// # Examples
    ///
    /// ```
    /// use markup_normalizer::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::with_max_depth(100);
    /// assert!(validator.validate_depth(50).is_ok());
    /// assert!(validator.validate_depth(150).is_err());
    /// ```
    pub fn validate_depth(&self, depth: usize) -> Result<(), ConversionError> {
        if depth > self.max_depth {
            Err(ConversionError::InvalidInput(format!(
                "quote nesting depth {} exceeds maximum allowed depth {}",
                depth, self.max_depth
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new()
    }
}
