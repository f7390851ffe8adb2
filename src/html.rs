//! HTML to BBCode rewrite engine
//!
//! Code inside `<pre>`, `<code>` and `[code]` blocks is lifted into a
//! [`SnippetQueue`] before any tag is touched and put back at the end, so its
//! content reaches the output unchanged. In between, the engine runs:
//!
//! 1. **Links**: `<a href target>label</a>` to `[url=href t=target]label[/url]`
//! 2. **Images**: `<img src>` to `[img]src[/img]`
//! 3. **Other tags**: table-driven rewrite of emphasis, list and center tags
//! 4. **Strip**: every tag still left is removed, its text kept
//!
//! # Example
//!
//! Input HTML:
//! ```html
//! <p>See <a href="HTTP://Example.com" target="_blank">this</a>:</p>
//! <ul><li><strong>fast</strong></li></ul>
//! ```
//!
//! Output BBCode:
//! ```text
//! See [url=http://example.com t=_blank]this[/url]:
//! [list][*][b]fast[/b][/list]
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::converter::{
    ConversionContext, ConversionOptions, Pass, cached_regex, replace_all_checked, run_passes,
};
use crate::error::{ConversionError, MalformedConstruct};
use crate::request::ConversionRequest;
use crate::security::SecurityValidator;
use crate::snippet::SnippetQueue;
use crate::tables::lookup_tag;

/// Default link target when an anchor has none
const DEFAULT_TARGET: &str = "_self";

static LINK_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static HREF_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static TARGET_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static IMAGE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static SRC_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static TAG_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static STRIP_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

/// Passes run between snippet extraction and restoration, in execution order
static PASSES: &[(&str, Pass)] = &[
    ("replace_links", replace_links),
    ("replace_images", replace_images),
    ("replace_other_tags", replace_other_tags),
    ("strip_tags", strip_tags),
];

/// Converter from HTML to BBCode
///
/// # Usage
///
/// ```rust
/// use markup_normalizer::HtmlConverter;
/// use markup_normalizer::request::ConversionRequest;
///
/// let converter = HtmlConverter::new();
/// let bbcode = converter
///     .convert(ConversionRequest::new("<b>bold</b> <em>move</em>"))
///     .expect("conversion failed");
/// assert_eq!(bbcode, "[b]bold[/b] [i]move[/i]");
/// ```
#[derive(Debug, Clone)]
pub struct HtmlConverter {
    options: ConversionOptions,
    security_validator: SecurityValidator,
}

impl HtmlConverter {
    /// Create a converter with default options
    pub fn new() -> Self {
        Self::with_options(ConversionOptions::default())
    }

    /// Create a converter with custom options
    pub fn with_options(options: ConversionOptions) -> Self {
        let security_validator = SecurityValidator::from_options(&options);
        Self {
            options,
            security_validator,
        }
    }

    /// Convert a request's HTML text to BBCode
    pub fn convert(&self, request: ConversionRequest) -> Result<String, ConversionError> {
        let (text, id) = request.into_parts();
        let mut ctx = ConversionContext::new(id, self.options.timeout);
        self.convert_with_context(text, &mut ctx)
    }

    /// Convert HTML to BBCode with an explicit context
    ///
    /// # Errors
    ///
    /// - `MalformedMarkup` when an anchor has no `href` or an image no `src`
    /// - `Timeout` when the context's timeout expires
    /// - `InputTooLarge` when the text exceeds the configured size
    pub fn convert_with_context(
        &self,
        text: String,
        ctx: &mut ConversionContext,
    ) -> Result<String, ConversionError> {
        self.security_validator.validate_input_size(text.len())?;

        ctx.check_timeout()?;
        let (text, snippets) = SnippetQueue::extract(&text, ctx)?;

        let text = run_passes(PASSES, text, ctx)?;

        ctx.check_timeout()?;
        Ok(snippets.restore(text))
    }
}

impl Default for HtmlConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of attribute `regex` inside `tag`, quotes stripped
fn attribute<'t>(regex: &Regex, tag: &'t str) -> Option<&'t str> {
    regex
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim_matches(&['"', '\''][..]))
}

fn replace_links(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let link = cached_regex(&LINK_REGEX, r"(?is)(<a(?:\s[^>]*)?>)(.*?)</a>")?;
    let href = cached_regex(
        &HREF_REGEX,
        r#"(?i)\shref\s*=\s*("[^"]*"|'[^']*'|[^'">\s]+)"#,
    )?;
    let target = cached_regex(
        &TARGET_REGEX,
        r#"(?i)\starget\s*=\s*("[^"]*"|'[^']*'|[^'">\s]+)"#,
    )?;

    replace_all_checked(link, &text, ctx, |caps, ctx| {
        let open = &caps[1];
        let Some(url) = attribute(href, open) else {
            return Err(ctx.malformed(MalformedConstruct::Link, &caps[0]));
        };
        let window = attribute(target, open)
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_TARGET.to_string());

        Ok(format!(
            "[url={} t={}]{}[/url]",
            url.to_lowercase(),
            window,
            &caps[2]
        ))
    })
}

fn replace_images(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let image = cached_regex(&IMAGE_REGEX, r"(?i)<img\b[^>]*>")?;
    let src = cached_regex(
        &SRC_REGEX,
        r#"(?i)\ssrc\s*=\s*("[^"]*"|'[^']*'|[^'">\s]+)"#,
    )?;

    replace_all_checked(image, &text, ctx, |caps, ctx| {
        match attribute(src, &caps[0]) {
            Some(url) => Ok(format!("[img]{}[/img]", url.to_lowercase())),
            None => Err(ctx.malformed(MalformedConstruct::ImageSource, &caps[0])),
        }
    })
}

fn replace_other_tags(
    text: String,
    ctx: &mut ConversionContext,
) -> Result<String, ConversionError> {
    let tag = cached_regex(&TAG_REGEX, r"(?i)<(/?)([a-z][a-z0-9]*)\b[^<>]*>")?;

    replace_all_checked(tag, &text, ctx, |caps, _| {
        let closing = !caps[1].is_empty();
        Ok(match lookup_tag(&caps[2]) {
            Some(mapping) if closing => mapping.close.to_string(),
            Some(mapping) => mapping.open.to_string(),
            None => caps[0].to_string(),
        })
    })
}

fn strip_tags(text: String, _ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let tag = cached_regex(&STRIP_REGEX, r"(?s)<!--.*?-->|<[!?/]?[a-zA-Z][^<>]*>")?;
    Ok(tag.replace_all(&text, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn to_bbcode(html: &str) -> String {
        HtmlConverter::new()
            .convert(ConversionRequest::new(html))
            .expect("Conversion failed")
    }

    fn to_bbcode_err(html: &str, id: &str) -> ConversionError {
        match HtmlConverter::new().convert(ConversionRequest::new(html).with_id(id)) {
            Ok(bbcode) => panic!("Expected failure, got: {bbcode:?}"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_link_conversion() {
        assert_eq!(
            to_bbcode(r#"<a href="http://x" target="_blank">t</a>"#),
            "[url=http://x t=_blank]t[/url]"
        );
    }

    #[test]
    fn test_link_default_target_and_lowercase() {
        assert_eq!(
            to_bbcode(r#"<A HREF='HTTP://Example.COM/Page'>Go</A>"#),
            "[url=http://example.com/page t=_self]Go[/url]"
        );
    }

    #[test]
    fn test_link_unquoted_attributes() {
        assert_eq!(
            to_bbcode("<a class=nav href=/home target=_TOP>home</a>"),
            "[url=/home t=_top]home[/url]"
        );
    }

    #[test]
    fn test_link_label_keeps_inner_markup() {
        assert_eq!(
            to_bbcode(r#"<a href="/x"><b>bold</b> link</a>"#),
            "[url=/x t=_self][b]bold[/b] link[/url]"
        );
    }

    #[test]
    fn test_link_without_href_is_malformed() {
        match to_bbcode_err(r#"<a name="top">anchor</a>"#, "5") {
            ConversionError::MalformedMarkup { id, construct, .. } => {
                assert_eq!(id, "5");
                assert_eq!(construct, MalformedConstruct::Link);
            }
            other => panic!("Expected MalformedMarkup, got: {:?}", other),
        }
    }

    #[test]
    fn test_data_href_is_not_href() {
        let err = to_bbcode_err(r#"<a data-href="/x">t</a>"#, "");
        assert!(matches!(err, ConversionError::MalformedMarkup { .. }));
    }

    #[test]
    fn test_abbr_is_not_a_link() {
        assert_eq!(to_bbcode(r#"<abbr title="x">HTML</abbr>"#), "HTML");
    }

    #[test]
    fn test_image_conversion() {
        assert_eq!(
            to_bbcode(r#"<img src="http://x/A.png" alt="a">"#),
            "[img]http://x/a.png[/img]"
        );
        assert_eq!(to_bbcode("<img src=/a.png />"), "[img]/a.png[/img]");
    }

    #[test]
    fn test_image_without_src_is_malformed() {
        match to_bbcode_err(r#"<img alt="missing">"#, "img-9") {
            ConversionError::MalformedMarkup { id, construct, .. } => {
                assert_eq!(id, "img-9");
                assert_eq!(construct, MalformedConstruct::ImageSource);
            }
            other => panic!("Expected MalformedMarkup, got: {:?}", other),
        }
    }

    #[test]
    fn test_emphasis_tags() {
        assert_eq!(
            to_bbcode("<strong>a</strong><b>b</b><em>c</em><i>d</i><u>e</u><del>f</del><strike>g</strike>"),
            "[b]a[/b][b]b[/b][i]c[/i][i]d[/i][u]e[/u][s]f[/s][s]g[/s]"
        );
    }

    #[test]
    fn test_tags_with_attributes_are_mapped() {
        assert_eq!(to_bbcode(r#"<B class="x">a</B>"#), "[b]a[/b]");
    }

    #[test]
    fn test_lists() {
        assert_eq!(to_bbcode("<ul><li>a</li><li>b</li></ul>"), "[list][*]a[*]b[/list]");
        assert_eq!(to_bbcode("<ol><li>a</li></ol>"), "[list=1][*]a[/list]");
    }

    #[test]
    fn test_center() {
        assert_eq!(to_bbcode("<center>mid</center>"), "[center]mid[/center]");
    }

    #[test]
    fn test_unknown_tags_are_stripped() {
        assert_eq!(
            to_bbcode("<div class=\"post\"><p>Hello <span>world</span></p><br/></div>"),
            "Hello world"
        );
    }

    #[test]
    fn test_comments_and_doctype_are_stripped() {
        assert_eq!(to_bbcode("<!DOCTYPE html><!-- note -->text"), "text");
    }

    #[test]
    fn test_stray_angle_bracket_is_kept() {
        assert_eq!(to_bbcode("1 < 2 and 3 > 2"), "1 < 2 and 3 > 2");
    }

    #[test]
    fn test_pre_content_is_protected() {
        assert_eq!(
            to_bbcode("<p>x</p><pre><b>not bold</b></pre>"),
            "x\n[code]\n<b>not bold</b>\n[/code]\n"
        );
    }

    #[test]
    fn test_bbcode_snippet_keeps_markers() {
        assert_eq!(
            to_bbcode("<i>a</i>[code=php]<?php echo 1; ?>[/code]"),
            "[i]a[/i]\n[code=php]\n<?php echo 1; ?>\n[/code]\n"
        );
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(to_bbcode("  plain text \n"), "  plain text \n");
    }

    proptest! {
        #[test]
        fn prop_snippets_survive_in_order(
            blocks in prop::collection::vec("[a-z<> ]{1,20}", 1..6),
        ) {
            let mut html = String::new();
            for (index, block) in blocks.iter().enumerate() {
                match index % 3 {
                    0 => html.push_str(&format!("<p><b>t{index}</b></p><pre>{block}</pre>")),
                    1 => html.push_str(&format!("<em>t{index}</em><code>{block}</code>")),
                    _ => html.push_str(&format!("<u>t{index}</u>[code=c]{block}[/code]")),
                }
            }

            let bbcode = to_bbcode(&html);

            let mut cursor = 0;
            for block in &blocks {
                let content = block.trim();
                if content.is_empty() {
                    continue;
                }
                let found = bbcode[cursor..].find(content);
                prop_assert!(found.is_some(), "block {:?} missing from {:?}", content, bbcode);
                cursor += found.unwrap_or(0) + content.len();
            }
        }
    }
}
