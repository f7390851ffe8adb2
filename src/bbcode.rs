//! BBCode to Markdown rewrite engine
//!
//! The engine runs a fixed sequence of whole-text passes. Later passes see
//! the output of earlier ones:
//!
//! 1. **Wrappers**: `[size]`, `[center]`, `[left]`, `[color]` are dropped,
//!    their content kept
//! 2. **Emphasis**: `[b]`, `[i]`, `[u]`, `[s]` become `**`, `*`, `_`, `~~`
//! 3. **Lists**: `[list]` / `[list=1]` become `-` / numbered items
//! 4. **Links**: `[url=target]label[/url]` and `[url]target[/url]`
//! 5. **Images**: `[img]src[/img]` becomes a standalone `![](src)` line
//! 6. **Quotes**: nested quotes collapse to one level, then become `> ` lines
//! 7. **Snippets**: `[code=lang]` becomes a fenced block with a canonical
//!    language name
//!
//! The result is trimmed of leading and trailing whitespace.
//!
//! # Strictness
//!
//! Links, images and snippets assume well-formed markup. When one of them
//! cannot be taken apart the whole call fails with
//! [`ConversionError::MalformedMarkup`]; no partial output is returned.
//! Lists are more forgiving: an opener without a closer stays as text, and
//! only a closed list whose body holds no `[*]` item is rejected.
//!
//! # Example
//!
//! Input BBCode:
//! ```text
//! [b]Release notes[/b]
//! [list=1][*]Faster[*]Smaller[/list]
//! [code=shell]make install[/code]
//! ```
//!
//! Output Markdown:
//! ````markdown
//! **Release notes**
//!
//! 1. Faster
//! 2. Smaller
//!
//! ```sh
//! make install
//! ```
//! ````

use std::sync::OnceLock;

use regex::Regex;

use crate::converter::{
    ConversionContext, ConversionOptions, Pass, cached_regex, reject_leftover, replace_all_checked,
    run_passes,
};
use crate::error::{ConversionError, MalformedConstruct};
use crate::quotes::render_quotes;
use crate::request::ConversionRequest;
use crate::security::SecurityValidator;
use crate::tables::canonical_language;

/// Formatting-only wrappers whose content is kept verbatim
const WRAPPER_PATTERNS: &[&str] = &[
    r"(?is)\[size=\d*\](.*?)\[/size\]",
    r"(?is)\[center\](.*?)\[/center\]",
    r"(?is)\[left\](.*?)\[/left\]",
    r"(?is)\[color=?#?\w*\](.*?)\[/color\]",
];

/// Inline emphasis tags and their Markdown markers
const EMPHASIS: &[(&str, &str)] = &[
    (r"(?is)\[b\](.*?)\[/b\]", "**"),
    (r"(?is)\[i\](.*?)\[/i\]", "*"),
    (r"(?is)\[u\](.*?)\[/u\]", "_"),
    (r"(?is)\[s\](.*?)\[/s\]", "~~"),
];

static WRAPPERS: OnceLock<Option<Vec<Regex>>> = OnceLock::new();
static EMPHASIS_REGEXES: OnceLock<Option<Vec<(Regex, &'static str)>>> = OnceLock::new();
static LIST_MARKER: OnceLock<Option<Regex>> = OnceLock::new();
static URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static URL_OPEN: OnceLock<Option<Regex>> = OnceLock::new();
static BARE_URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static BARE_URL_OPEN: OnceLock<Option<Regex>> = OnceLock::new();
static IMAGE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static IMAGE_OPEN: OnceLock<Option<Regex>> = OnceLock::new();
static CODE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static CODE_OPEN: OnceLock<Option<Regex>> = OnceLock::new();

/// Passes that need nothing but the buffer, in execution order
static PASSES: &[(&str, Pass)] = &[
    ("strip_wrappers", strip_wrappers),
    ("replace_emphasis", replace_emphasis),
    ("replace_lists", replace_lists),
    ("replace_urls", replace_urls),
    ("replace_bare_urls", replace_bare_urls),
    ("replace_images", replace_images),
];

/// Converter from BBCode to Markdown
///
/// # Usage
///
/// ```rust
/// use markup_normalizer::BBCodeConverter;
/// use markup_normalizer::request::ConversionRequest;
///
/// let converter = BBCodeConverter::new();
/// let markdown = converter
///     .convert(ConversionRequest::new("[b]hi[/b]").with_id("post-1"))
///     .expect("conversion failed");
/// assert_eq!(markdown, "**hi**");
/// ```
#[derive(Debug, Clone)]
pub struct BBCodeConverter {
    options: ConversionOptions,
    security_validator: SecurityValidator,
}

impl BBCodeConverter {
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

    /// Convert a request's BBCode text to Markdown
    ///
    /// The request identifier is reported by any error raised for this call.
    pub fn convert(&self, request: ConversionRequest) -> Result<String, ConversionError> {
        let (text, id) = request.into_parts();
        let mut ctx = ConversionContext::new(id, self.options.timeout);
        self.convert_with_context(text, &mut ctx)
    }

    /// Convert BBCode to Markdown with an explicit context
    ///
    /// # Errors
    ///
    /// - `MalformedMarkup` when a closed list has no items, or a url, image or
    ///   code block is malformed
    /// - `Timeout` when the context's timeout expires
    /// - `InputTooLarge` when the text exceeds the configured size
    /// - `InvalidInput` when quotes nest deeper than allowed
    pub fn convert_with_context(
        &self,
        text: String,
        ctx: &mut ConversionContext,
    ) -> Result<String, ConversionError> {
        self.security_validator.validate_input_size(text.len())?;

        let text = run_passes(PASSES, text, ctx)?;

        ctx.check_timeout()?;
        let text = self.replace_quotes(text, ctx)?;
        tracing::debug!(pass = "replace_quotes", len = text.len(), "Pass completed");

        ctx.check_timeout()?;
        let text = replace_snippets(text, ctx)?;
        tracing::debug!(pass = "replace_snippets", len = text.len(), "Pass completed");

        Ok(text.trim().to_string())
    }

    /// Drop nested quotes, then render each remaining quote as `> ` lines
    fn replace_quotes(
        &self,
        text: String,
        ctx: &mut ConversionContext,
    ) -> Result<String, ConversionError> {
        render_quotes(&text, &self.security_validator, ctx)
    }
}

impl Default for BBCodeConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_wrappers(text: String, _ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let wrappers = WRAPPERS
        .get_or_init(|| {
            WRAPPER_PATTERNS
                .iter()
                .map(|pattern| Regex::new(pattern).ok())
                .collect()
        })
        .as_ref()
        .ok_or_else(|| ConversionError::InternalError("invalid wrapper pattern".to_string()))?;

    Ok(wrappers.iter().fold(text, |text, wrapper| {
        wrapper.replace_all(&text, "$1").into_owned()
    }))
}

fn replace_emphasis(
    text: String,
    _ctx: &mut ConversionContext,
) -> Result<String, ConversionError> {
    let emphasis = EMPHASIS_REGEXES
        .get_or_init(|| {
            EMPHASIS
                .iter()
                .map(|(pattern, marker)| Regex::new(pattern).ok().map(|regex| (regex, *marker)))
                .collect()
        })
        .as_ref()
        .ok_or_else(|| ConversionError::InternalError("invalid emphasis pattern".to_string()))?;

    Ok(emphasis.iter().fold(text, |text, (regex, marker)| {
        regex
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                format!("{marker}{}{marker}", caps[1].trim_matches(' '))
            })
            .into_owned()
    }))
}

/// `[list]` block still waiting for its closing tag
struct ListFrame {
    opener: String,
    ordered: bool,
    body: String,
}

/// Rewrite `[list]` blocks, innermost first
///
/// Markers are paired with a stack so nested lists close in the right order;
/// a rendered inner list is indented under the item that contains it.
/// Openers that never close stay in the text unchanged.
fn replace_lists(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let marker = cached_regex(&LIST_MARKER, r"(?i)\[list(=1)?\]|\[/list\]")?;

    let mut output = String::with_capacity(text.len());
    let mut frames: Vec<ListFrame> = Vec::new();
    let mut last = 0;

    for caps in marker.captures_iter(&text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        ctx.increment_and_check()?;

        let between = &text[last..m.start()];
        last = m.end();
        match frames.last_mut() {
            Some(frame) => frame.body.push_str(between),
            None => output.push_str(between),
        }

        if !m.as_str().starts_with("[/") {
            frames.push(ListFrame {
                opener: m.as_str().to_string(),
                ordered: caps.get(1).is_some(),
                body: String::new(),
            });
            continue;
        }

        let Some(frame) = frames.pop() else {
            output.push_str(m.as_str());
            continue;
        };
        let rendered = render_list(&frame.body, frame.ordered).ok_or_else(|| {
            ctx.malformed(
                MalformedConstruct::List,
                &format!("{}{}", frame.opener, frame.body),
            )
        })?;
        match frames.last_mut() {
            Some(parent) => parent.body.push_str(&indent(&rendered)),
            None => output.push_str(&rendered),
        }
    }

    let rest = &text[last..];
    match frames.last_mut() {
        Some(frame) => frame.body.push_str(rest),
        None => output.push_str(rest),
    }

    if !frames.is_empty() {
        tracing::debug!(unclosed = frames.len(), "Unclosed list openers kept as text");
    }
    for frame in frames {
        output.push_str(&frame.opener);
        output.push_str(&frame.body);
    }
    Ok(output)
}

/// Render the body of a `[list]` block
///
/// Text before the first `[*]` marker is discarded. Empty items are skipped;
/// ordered items are numbered consecutively. Returns `None` when a non-blank
/// body holds no `[*]` marker at all, i.e. it cannot be split into items.
fn render_list(body: &str, ordered: bool) -> Option<String> {
    if !body.contains("[*]") {
        return body.trim().is_empty().then(String::new);
    }

    let mut buffer = String::with_capacity(body.len() + 16);
    let items = body.split("[*]").skip(1).map(str::trim).filter(|item| !item.is_empty());
    for (index, item) in items.enumerate() {
        if ordered {
            buffer.push_str(&format!("{}. {item}\n", index + 1));
        } else {
            buffer.push_str(&format!("- {item}\n"));
        }
    }

    // Blank line above and below the list
    if !buffer.is_empty() {
        buffer = format!("\n\n{buffer}\n");
    }
    Some(buffer)
}

/// Indent every non-blank line by two spaces
fn indent(block: &str) -> String {
    block
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn replace_urls(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let url = cached_regex(
        &URL_REGEX,
        r#"(?is)\[url\s*=\s*("[^"]*"|[^'">\]\s]+)\s*[^\]\s]*\](.*?)\[/url\]"#,
    )?;
    let output = replace_all_checked(url, &text, ctx, |caps, ctx| {
        match (caps.get(1), caps.get(2)) {
            (Some(target), Some(label)) => Ok(format!(
                "[{}]({})",
                label.as_str(),
                target.as_str().trim_matches('"')
            )),
            _ => Err(ctx.malformed(MalformedConstruct::Url, &caps[0])),
        }
    })?;

    let opener = cached_regex(&URL_OPEN, r"(?i)\[url\s*=[^\]]*\]")?;
    reject_leftover(opener, &output, MalformedConstruct::Url, ctx)?;
    Ok(output)
}

fn replace_bare_urls(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let url = cached_regex(&BARE_URL_REGEX, r"(?is)\[url\](.*?)\[/url\]")?;
    let output = replace_all_checked(url, &text, ctx, |caps, _| {
        let target = caps[1].trim();
        Ok(format!("[{target}]({target})"))
    })?;

    let opener = cached_regex(&BARE_URL_OPEN, r"(?i)\[url\]")?;
    reject_leftover(opener, &output, MalformedConstruct::Url, ctx)?;
    Ok(output)
}

fn replace_images(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let image = cached_regex(
        &IMAGE_REGEX,
        r#"(?is)\[img\s*\]\s*("[^"]*"|[^'"\[\]\s]+)[^\[]*?\[/img\]"#,
    )?;
    let output = replace_all_checked(image, &text, ctx, |caps, ctx| match caps.get(1) {
        Some(src) => Ok(format!("\n\n![]({})\n\n", src.as_str().trim_matches('"'))),
        None => Err(ctx.malformed(MalformedConstruct::Image, &caps[0])),
    })?;

    let opener = cached_regex(&IMAGE_OPEN, r"(?i)\[img\s*\]")?;
    reject_leftover(opener, &output, MalformedConstruct::Image, ctx)?;
    Ok(output)
}

fn replace_snippets(text: String, ctx: &mut ConversionContext) -> Result<String, ConversionError> {
    let code = cached_regex(
        &CODE_REGEX,
        r"(?is)\[code\s*=?(?P<language>\w*)\](?P<snippet>.*?)\[/code\]",
    )?;
    let output = replace_all_checked(code, &text, ctx, |caps, ctx| {
        let Some(snippet) = caps.name("snippet") else {
            return Err(ctx.malformed(MalformedConstruct::CodeBlock, &caps[0]));
        };
        let language = caps
            .name("language")
            .map(|m| canonical_language(m.as_str()))
            .unwrap_or_default();
        Ok(format!(
            "\n\n```{language}\n{}\n```\n\n",
            snippet.as_str().trim()
        ))
    })?;

    let opener = cached_regex(&CODE_OPEN, r"(?i)\[code\s*=?\w*\]")?;
    reject_leftover(opener, &output, MalformedConstruct::CodeBlock, ctx)?;
    Ok(output)
}
