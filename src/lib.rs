//! Markup Normalizer - BBCode, HTML and Markdown rewrite engine
//!
//! This library normalizes user-authored markup so that content written in
//! different editors can be stored in one canonical form. Two engines share
//! the same plumbing:
//!
//! - BBCode to Markdown ([`BBCodeConverter`], [`to_markdown`])
//! - HTML to BBCode ([`HtmlConverter`], [`to_bbcode`])
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `converter`: options, per-call context and the ordered pass runner
//! - `bbcode`: BBCode to Markdown passes
//! - `html`: HTML to BBCode passes
//! - `quotes`: nested quote collapsing
//! - `snippet`: code block protection queue for the HTML engine
//! - `tables`: tag and code language lookup tables
//! - `security`: input size and nesting limits
//! - `request`: conversion request holder
//! - `ffi`: C-compatible interface for embedding
//!
//! # Safety
//!
//! All FFI functions taking pointers are marked `unsafe` and document their
//! contract. Memory allocated by Rust must be freed by Rust via the provided
//! cleanup functions.
//!
//! # Example
//!
//! ```rust
//! let markdown = markup_normalizer::to_markdown("[b]hi[/b]", "post-1").unwrap();
//! assert_eq!(markdown, "**hi**");
//!
//! let bbcode = markup_normalizer::to_bbcode(r#"<a href="http://x">t</a>"#, "").unwrap();
//! assert_eq!(bbcode, "[url=http://x t=_self]t[/url]");
//! ```

// Module declarations
pub mod bbcode;
pub mod converter;
pub mod error;
pub mod ffi;
pub mod html;
pub mod quotes;
pub mod request;
pub mod security;
pub mod snippet;
pub mod tables;

// Re-export main types for convenience
pub use bbcode::BBCodeConverter;
pub use converter::{ConversionContext, ConversionOptions};
pub use error::{ConversionError, MalformedConstruct};
pub use html::HtmlConverter;
pub use request::ConversionRequest;

/// Convert BBCode to Markdown with default options
///
/// `id` identifies the text in error messages; pass `""` when there is none.
pub fn to_markdown(text: &str, id: &str) -> Result<String, ConversionError> {
    BBCodeConverter::new().convert(ConversionRequest::new(text).with_id(id))
}

/// Convert HTML to BBCode with default options
///
/// `id` identifies the text in error messages; pass `""` when there is none.
pub fn to_bbcode(text: &str, id: &str) -> Result<String, ConversionError> {
    HtmlConverter::new().convert(ConversionRequest::new(text).with_id(id))
}
