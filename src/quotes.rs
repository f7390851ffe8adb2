//! Quote de-nesting
//!
//! Forum quotes nest: replying to a reply wraps the earlier `[quote]` inside
//! a new one. Markdown output keeps a single level, so every quote nested in
//! another quote is dropped together with its text.
//!
//! Markers are paired with an explicit stack instead of a recursive pattern.
//! A closing marker always pairs with the nearest unpaired opener, so an
//! opener that never closes cannot swallow the blocks around it:
//!
//! ```text
//! [quote]  [quote]a[/quote]  b[/quote]   I typed [quote] by mistake
//! depth 1  depth 2 (dropped)  depth 1     unpaired, kept as text
//! ```

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::converter::{ConversionContext, cached_regex};
use crate::error::ConversionError;
use crate::security::SecurityValidator;

static QUOTE_MARKER: OnceLock<Option<Regex>> = OnceLock::new();

/// Byte ranges of a matched opener and closer
#[derive(Debug)]
struct QuotePair {
    open: Range<usize>,
    close: Range<usize>,
}

/// Render every outermost quote block of `text` as `> ` lines
///
/// Quotes nested inside another quote are removed with their text. Markers
/// without a partner stay in the output verbatim.
///
/// # Errors
///
/// - `InvalidInput` when nesting exceeds the validator's maximum depth
/// - `Timeout` when the context's timeout expires during the scan
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use markup_normalizer::converter::ConversionContext;
/// use markup_normalizer::quotes::render_quotes;
/// use markup_normalizer::security::SecurityValidator;
///
/// let mut ctx = ConversionContext::new("", Duration::ZERO);
/// let markdown = render_quotes(
///     "[quote][quote]a[/quote]b[/quote]",
///     &SecurityValidator::new(),
///     &mut ctx,
/// ).unwrap();
/// assert_eq!(markdown, "> b\n\n");
/// ```
pub fn render_quotes(
    text: &str,
    validator: &SecurityValidator,
    ctx: &mut ConversionContext,
) -> Result<String, ConversionError> {
    let pairs = match_pairs(text, validator, ctx)?;

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    let mut pairs = pairs.iter().peekable();

    while let Some(outer) = pairs.next() {
        output.push_str(&text[last..outer.open.start]);

        // Pairs are sorted by opener, so everything inside `outer` follows it.
        let mut body = String::new();
        let mut cursor = outer.open.end;
        while let Some(inner) = pairs.next_if(|pair| pair.open.start < outer.close.start) {
            if inner.open.start < cursor {
                continue;
            }
            body.push_str(&text[cursor..inner.open.start]);
            cursor = inner.close.end;
        }
        body.push_str(&text[cursor..outer.close.start]);

        output.push_str(&format_quote(&body));
        last = outer.close.end;
    }

    output.push_str(&text[last..]);
    Ok(output)
}

/// Pair quote markers, innermost first, sorted by opener position
fn match_pairs(
    text: &str,
    validator: &SecurityValidator,
    ctx: &mut ConversionContext,
) -> Result<Vec<QuotePair>, ConversionError> {
    let marker = cached_regex(&QUOTE_MARKER, r"(?i)\[quote\b[^\]]*\]|\[/quote\]")?;

    let mut openers: Vec<Range<usize>> = Vec::new();
    let mut pairs = Vec::new();

    for m in marker.find_iter(text) {
        ctx.increment_and_check()?;
        if m.as_str().starts_with("[/") {
            if let Some(open) = openers.pop() {
                pairs.push(QuotePair {
                    open,
                    close: m.range(),
                });
            }
        } else {
            openers.push(m.range());
            validator.validate_depth(openers.len())?;
        }
    }

    if !openers.is_empty() {
        tracing::debug!(unpaired = openers.len(), "Unpaired quote openers kept as text");
    }

    pairs.sort_unstable_by_key(|pair| pair.open.start);
    Ok(pairs)
}

/// Render the body of a single-level quote as Markdown
///
/// Every line is left-trimmed and prefixed with `> `; blank lines are
/// dropped. The block ends with a blank line. An empty body renders nothing.
pub fn format_quote(body: &str) -> String {
    let mut output = String::with_capacity(body.len() + 8);

    for line in body.lines().map(str::trim_start).filter(|line| !line.is_empty()) {
        output.push_str("> ");
        output.push_str(line.trim_end());
        output.push('\n');
    }

    if !output.is_empty() {
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn render(text: &str) -> String {
        let mut ctx = ConversionContext::new("", Duration::ZERO);
        render_quotes(text, &SecurityValidator::new(), &mut ctx).expect("render failed")
    }

    #[test]
    fn test_single_level() {
        assert_eq!(render("[quote]a[/quote]"), "> a\n\n");
        assert_eq!(render("x [quote=bob]a[/quote] y"), "x > a\n\n y");
    }

    #[test]
    fn test_inner_quote_is_removed() {
        assert_eq!(render("[quote][quote]a[/quote]b[/quote]"), "> b\n\n");
    }

    #[test]
    fn test_deep_nesting_keeps_outer_text_only() {
        let text = "[quote=a]1[quote=b]2[quote=c]3[/quote]4[/quote]5[/quote]";
        assert_eq!(render(text), "> 15\n\n");
    }

    #[test]
    fn test_sibling_quotes_survive() {
        let text = "[quote]a[/quote] and [quote]b[quote]c[/quote][/quote]";
        assert_eq!(render(text), "> a\n\n and > b\n\n");
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        assert_eq!(render("[QUOTE][Quote]a[/QUOTE]b[/quote]"), "> b\n\n");
    }

    #[test]
    fn test_unpaired_opener_after_block() {
        assert_eq!(
            render("[quote][quote]a[/quote]b[/quote] typed [quote] by mistake"),
            "> b\n\n typed [quote] by mistake"
        );
    }

    #[test]
    fn test_unpaired_opener_before_block() {
        assert_eq!(
            render("oops [quote] then [quote]x[quote]y[/quote][/quote]"),
            "oops [quote] then > x\n\n"
        );
    }

    #[test]
    fn test_stray_close_is_kept() {
        assert_eq!(render("a[/quote]b"), "a[/quote]b");
    }

    #[test]
    fn test_quoted_word_is_not_a_marker() {
        assert_eq!(render("[quotes]a[/quotes]"), "[quotes]a[/quotes]");
    }

    #[test]
    fn test_depth_limit() {
        let text = "[quote]".repeat(5) + &"[/quote]".repeat(5);
        let mut ctx = ConversionContext::new("", Duration::ZERO);
        let result = render_quotes(&text, &SecurityValidator::with_max_depth(3), &mut ctx);
        assert!(matches!(result, Err(ConversionError::InvalidInput(_))));
    }

    #[test]
    fn test_format_quote() {
        assert_eq!(format_quote("\n\n  hello\n   world  \n"), "> hello\n> world\n\n");
        assert_eq!(format_quote("   "), "");
    }

    proptest! {
        #[test]
        fn prop_output_never_keeps_paired_markers(
            depth in 1usize..20,
            stray in 0usize..3,
            text in "[a-z ]{0,20}",
        ) {
            let nested = "[quote]".repeat(depth) + &text + &"[/quote]".repeat(depth);
            let input = format!("{nested}{}", " [quote]".repeat(stray));
            let rendered = render(&input);

            prop_assert_eq!(rendered.matches("[quote]").count(), stray);
            prop_assert!(!rendered.contains("[/quote]"));
        }
    }
}
