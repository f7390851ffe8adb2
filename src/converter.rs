//! Shared conversion plumbing for both rewrite engines
//!
//! Each engine is a fixed, ordered list of whole-text passes. A pass takes the
//! current buffer and returns the rewritten buffer; passes never see each
//! other except through that buffer.
//!
//! # Conversion Strategy
//!
//! 1. **Ordered passes**: the pass table of an engine is a `static` slice, run
//!    front to back by [`run_passes`]
//! 2. **Strict constructs**: passes that assume well-formed markup report
//!    [`ConversionError::MalformedMarkup`] and abort the whole call
//! 3. **Bounded work**: every pattern runs on the `regex` crate, which matches
//!    in linear time, and a cooperative timeout is checked between passes and
//!    every 100 rewritten matches
//!
//! # Timeout Strategy
//!
//! The timeout is cooperative (not preemptive): conversion must reach a
//! checkpoint to notice it. Checkpoints are placed before every pass and
//! inside every fallible rewrite loop.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};

use crate::error::{ConversionError, MalformedConstruct};

/// Default upper bound on a single conversion
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum input size (16 MiB)
pub const DEFAULT_MAX_INPUT_SIZE: usize = 16 * 1024 * 1024;

/// Default maximum `[quote]` nesting depth
pub const DEFAULT_MAX_QUOTE_DEPTH: usize = 1000;

/// Number of rewritten matches between timeout checks
const CHECKPOINT_INTERVAL: u32 = 100;

/// Length of the markup excerpt carried by malformed-markup errors
const EXCERPT_CHARS: usize = 40;

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Maximum duration of one conversion (`Duration::ZERO` means no timeout)
    pub timeout: Duration,
    /// Maximum accepted input size in bytes
    pub max_input_size: usize,
    /// Maximum `[quote]` nesting depth accepted by quote de-nesting
    pub max_quote_depth: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_quote_depth: DEFAULT_MAX_QUOTE_DEPTH,
        }
    }
}

/// Per-call conversion context
///
/// Carries the caller's identifier (reported by malformed-markup errors) and
/// the cooperative timeout. One context is created per conversion call and
/// dropped with it; engines never store it.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use markup_normalizer::converter::ConversionContext;
///
/// let ctx = ConversionContext::new("post-17", Duration::from_secs(5));
/// assert_eq!(ctx.id(), "post-17");
/// assert!(ctx.check_timeout().is_ok());
/// ```
#[derive(Debug)]
pub struct ConversionContext {
    /// Identifier of the converted text
    id: String,
    /// Start time of conversion
    start_time: Instant,
    /// Timeout duration (0 means no timeout)
    timeout: Duration,
    /// Number of rewritten matches (for checkpoint frequency)
    match_count: u32,
}

impl ConversionContext {
    /// Create a new conversion context
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier reported by errors raised for this call
    /// * `timeout` - Maximum duration for conversion (Duration::ZERO means no timeout)
    pub fn new(id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            start_time: Instant::now(),
            timeout,
            match_count: 0,
        }
    }

    /// Identifier of the text being converted
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check if timeout has been exceeded
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Conversion is within timeout limit
    /// - `Err(ConversionError::Timeout)` - Timeout has been exceeded
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use markup_normalizer::converter::ConversionContext;
    ///
    /// let ctx = ConversionContext::new("", Duration::from_millis(10));
    /// std::thread::sleep(Duration::from_millis(20));
    ///
    /// assert!(ctx.check_timeout().is_err());
    /// ```
    pub fn check_timeout(&self) -> Result<(), ConversionError> {
        if self.timeout.is_zero() {
            return Ok(());
        }

        if self.start_time.elapsed() > self.timeout {
            tracing::warn!(id = %self.id, timeout = ?self.timeout, "Conversion timed out");
            return Err(ConversionError::Timeout);
        }

        Ok(())
    }

    /// Count one rewritten match and check timeout at checkpoints
    ///
    /// Timeout is checked every 100 matches to keep the hot loop cheap.
    pub fn increment_and_check(&mut self) -> Result<(), ConversionError> {
        self.match_count += 1;

        if self.match_count.is_multiple_of(CHECKPOINT_INTERVAL) {
            self.check_timeout()?;
        }

        Ok(())
    }

    /// Get elapsed time since conversion started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get number of matches rewritten so far
    pub fn match_count(&self) -> u32 {
        self.match_count
    }

    /// Build the error for a construct a strict pass could not take apart
    pub fn malformed(&self, construct: MalformedConstruct, markup: &str) -> ConversionError {
        let excerpt: String = markup.chars().take(EXCERPT_CHARS).collect();
        tracing::warn!(id = %self.id, %construct, excerpt = %excerpt, "Malformed markup");
        ConversionError::MalformedMarkup {
            id: self.id.clone(),
            construct,
            excerpt,
        }
    }
}

/// One whole-text rewrite pass
pub(crate) type Pass = fn(String, &mut ConversionContext) -> Result<String, ConversionError>;

/// Run `passes` in order over `text`
///
/// The timeout is checked before every pass.
pub(crate) fn run_passes(
    passes: &[(&'static str, Pass)],
    mut text: String,
    ctx: &mut ConversionContext,
) -> Result<String, ConversionError> {
    for (name, pass) in passes {
        ctx.check_timeout()?;
        text = pass(text, ctx)?;
        tracing::debug!(pass = *name, len = text.len(), "Pass completed");
    }

    Ok(text)
}

/// Compile `pattern` once and cache it in `cell`
///
/// Patterns are constants, so a compile failure is an internal error rather
/// than a property of the input.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Result<&'static Regex, ConversionError> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .ok_or_else(|| ConversionError::InternalError(format!("invalid pattern: {pattern}")))
}

/// Replace every match of `regex` in `text` with the output of `rewrite`
///
/// Unlike `Regex::replace_all`, the rewrite may fail, which aborts the whole
/// replacement. Every match is a timeout checkpoint candidate.
pub(crate) fn replace_all_checked<F>(
    regex: &Regex,
    text: &str,
    ctx: &mut ConversionContext,
    mut rewrite: F,
) -> Result<String, ConversionError>
where
    F: FnMut(&Captures<'_>, &ConversionContext) -> Result<String, ConversionError>,
{
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for caps in regex.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        ctx.increment_and_check()?;
        output.push_str(&text[last..whole.start()]);
        output.push_str(&rewrite(&caps, ctx)?);
        last = whole.end();
    }

    output.push_str(&text[last..]);
    Ok(output)
}

/// Fail with `construct` if `opener` still matches after a strict pass
///
/// Strict passes rewrite every well-formed construct; an opener that survives
/// the rewrite has no closing tag or lacks a required part.
pub(crate) fn reject_leftover(
    opener: &Regex,
    text: &str,
    construct: MalformedConstruct,
    ctx: &ConversionContext,
) -> Result<(), ConversionError> {
    match opener.find(text) {
        Some(m) => Err(ctx.malformed(construct, &text[m.start()..])),
        None => Ok(()),
    }
}
