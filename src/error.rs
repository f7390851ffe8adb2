//! Error types for conversion operations

use std::fmt;

/// Markup construct a strict pass failed to take apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedConstruct {
    /// `[list]` block whose items could not be split
    List,
    /// `[url]` / `[url=...]` tag without target or closing tag
    Url,
    /// `[img]` tag without source or closing tag
    Image,
    /// Unterminated `[code]` block
    CodeBlock,
    /// HTML anchor without `href`
    Link,
    /// HTML image without `src`
    ImageSource,
}

impl fmt::Display for MalformedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            MalformedConstruct::List => "BBCode list",
            MalformedConstruct::Url => "BBCode url",
            MalformedConstruct::Image => "BBCode image",
            MalformedConstruct::CodeBlock => "BBCode snippet",
            MalformedConstruct::Link => "HTML link",
            MalformedConstruct::ImageSource => "HTML image",
        };
        f.write_str(description)
    }
}

/// Errors that can occur while rewriting markup
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// A strict pass met a construct it could not take apart
    #[error("Text identified by '{id}' has malformed {construct} near `{excerpt}`")]
    MalformedMarkup {
        /// Caller-supplied identifier of the converted text
        id: String,
        /// Offending construct
        construct: MalformedConstruct,
        /// Start of the offending markup
        excerpt: String,
    },
    /// Input bytes are not valid UTF-8
    #[error("Encoding error: {0}")]
    EncodingError(String),
    /// Conversion timeout exceeded
    #[error("Conversion timeout exceeded")]
    Timeout,
    /// Input exceeds the configured size limit
    #[error("Input of {size} bytes exceeds limit of {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },
    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ConversionError {
    /// Get numeric error code for FFI
    pub fn code(&self) -> u32 {
        match self {
            ConversionError::MalformedMarkup { .. } => 1,
            ConversionError::EncodingError(_) => 2,
            ConversionError::Timeout => 3,
            ConversionError::InputTooLarge { .. } => 4,
            ConversionError::InvalidInput(_) => 5,
            ConversionError::InternalError(_) => 99,
        }
    }

    /// Identifier of the text that failed, when the error carries one
    pub fn id(&self) -> Option<&str> {
        match self {
            ConversionError::MalformedMarkup { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let malformed = ConversionError::MalformedMarkup {
            id: "42".to_string(),
            construct: MalformedConstruct::Url,
            excerpt: "[url=".to_string(),
        };
        assert_eq!(malformed.code(), 1);
        assert_eq!(ConversionError::EncodingError(String::new()).code(), 2);
        assert_eq!(ConversionError::Timeout.code(), 3);
        assert_eq!(
            ConversionError::InputTooLarge { size: 2, limit: 1 }.code(),
            4
        );
        assert_eq!(ConversionError::InvalidInput(String::new()).code(), 5);
        assert_eq!(ConversionError::InternalError(String::new()).code(), 99);
    }

    #[test]
    fn test_malformed_message_names_id_and_construct() {
        let err = ConversionError::MalformedMarkup {
            id: "post-7".to_string(),
            construct: MalformedConstruct::CodeBlock,
            excerpt: "[code=rust]".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("'post-7'"));
        assert!(message.contains("BBCode snippet"));
        assert!(message.contains("[code=rust]"));
        assert_eq!(err.id(), Some("post-7"));
    }

    #[test]
    fn test_id_absent_for_other_errors() {
        assert_eq!(ConversionError::Timeout.id(), None);
    }
}
