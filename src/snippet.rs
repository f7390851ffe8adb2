//! Code snippet protection for the HTML engine
//!
//! Code inside `<pre>`, `<code>` or `[code]` blocks must survive the tag
//! rewriting untouched. Before the rewrite every block is moved into a FIFO
//! queue and replaced with a placeholder token; afterwards the tokens are
//! swapped back, first extracted first restored.
//!
//! Placeholder tokens start with a prefix that does not occur anywhere in
//! the input, so user text can never be mistaken for a placeholder.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

use crate::converter::{ConversionContext, cached_regex, replace_all_checked};
use crate::error::ConversionError;

static SNIPPET_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

const SNIPPET_PATTERN: &str = concat!(
    r"(?is)(?P<openpre><pre\b[^>]*>)(?P<contentpre>.*?)(?P<closepre></pre>)",
    r"|(?P<opencode><code\b[^>]*>)(?P<contentcode>.*?)(?P<closecode></code>)",
    r"|(?P<openbbcode>\[code=?\w*\])(?P<contentbbcode>.*?)(?P<closebbcode>\[/code\])",
);

/// Placeholder delimiters (Unicode private use area)
const TOKEN_OPEN: char = '\u{E000}';
const TOKEN_CLOSE: char = '\u{E001}';

/// Which markup enclosed an extracted snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetKind {
    /// `<pre>...</pre>`
    Pre,
    /// `<code>...</code>`
    Code,
    /// `[code=lang]...[/code]`
    BBCode,
}

/// A code block lifted out of the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSnippet {
    pub kind: SnippetKind,
    /// Content between the markers, untouched
    pub raw_content: String,
    pub open_marker: String,
    pub close_marker: String,
}

impl ExtractedSnippet {
    /// Rebuild the snippet as a BBCode code block
    ///
    /// HTML blocks become a plain `[code]` fence; BBCode blocks keep their
    /// original markers. Content is trimmed either way.
    pub fn to_bbcode(&self) -> String {
        let content = self.raw_content.trim();
        match self.kind {
            SnippetKind::Pre | SnippetKind::Code => format!("[code]\n{content}\n[/code]"),
            SnippetKind::BBCode => {
                format!("{}\n{}\n{}", self.open_marker, content, self.close_marker)
            }
        }
    }
}

/// FIFO of extracted snippets paired with their placeholder tokens
#[derive(Debug, Default)]
pub struct SnippetQueue {
    entries: VecDeque<(String, ExtractedSnippet)>,
}

impl SnippetQueue {
    /// Move every code block of `text` into a queue
    ///
    /// Returns the buffer with each block replaced by a unique placeholder,
    /// and the queue holding the blocks in document order.
    pub fn extract(
        text: &str,
        ctx: &mut ConversionContext,
    ) -> Result<(String, SnippetQueue), ConversionError> {
        let regex = cached_regex(&SNIPPET_REGEX, SNIPPET_PATTERN)?;
        let prefix = unique_prefix(text);
        let mut queue = SnippetQueue::default();

        let output = replace_all_checked(regex, text, ctx, |caps, _| {
            let snippet = if let Some(open) = caps.name("openpre") {
                ExtractedSnippet {
                    kind: SnippetKind::Pre,
                    raw_content: caps["contentpre"].to_string(),
                    open_marker: open.as_str().to_string(),
                    close_marker: caps["closepre"].to_string(),
                }
            } else if let Some(open) = caps.name("opencode") {
                ExtractedSnippet {
                    kind: SnippetKind::Code,
                    raw_content: caps["contentcode"].to_string(),
                    open_marker: open.as_str().to_string(),
                    close_marker: caps["closecode"].to_string(),
                }
            } else {
                ExtractedSnippet {
                    kind: SnippetKind::BBCode,
                    raw_content: caps["contentbbcode"].to_string(),
                    open_marker: caps["openbbcode"].to_string(),
                    close_marker: caps["closebbcode"].to_string(),
                }
            };

            let token = format!("{prefix}{}{TOKEN_CLOSE}", queue.len());
            queue.entries.push_back((token.clone(), snippet));
            Ok(token)
        })?;

        tracing::debug!(count = queue.len(), "Snippets extracted");
        Ok((output, queue))
    }

    /// Swap every placeholder in `text` back for its rebuilt code block
    ///
    /// Snippets are restored strictly in extraction order, each on its own
    /// line. Passes never reorder text, so each token is searched for after
    /// the previous one and the buffer is scanned once.
    ///
    /// A pass may drop a placeholder together with the markup around it, for
    /// example a `<code>` block inside an image's `alt` attribute. Such
    /// snippets are appended after the text rather than lost.
    pub fn restore(mut self, text: String) -> String {
        let mut output = String::with_capacity(text.len());
        let mut orphans = Vec::new();
        let mut cursor = 0;
        let mut restored = 0usize;

        while let Some((token, snippet)) = self.entries.pop_front() {
            let Some(offset) = text[cursor..].find(&token) else {
                tracing::warn!(kind = ?snippet.kind, "Snippet placeholder missing, appending block");
                orphans.push(snippet);
                continue;
            };
            let start = cursor + offset;
            output.push_str(&text[cursor..start]);
            output.push('\n');
            output.push_str(&snippet.to_bbcode());
            output.push('\n');
            cursor = start + token.len();
            restored += 1;
        }

        output.push_str(&text[cursor..]);
        for snippet in &orphans {
            output.push('\n');
            output.push_str(&snippet.to_bbcode());
            output.push('\n');
        }
        tracing::debug!(count = restored, orphaned = orphans.len(), "Snippets restored");
        output
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snippets in extraction order
    #[cfg(test)]
    fn snippets(&self) -> impl Iterator<Item = &ExtractedSnippet> {
        self.entries.iter().map(|(_, snippet)| snippet)
    }

    /// Placeholder tokens in extraction order
    #[cfg(test)]
    fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(token, _)| token.as_str())
    }
}

/// Build a placeholder prefix that does not occur in `text`
///
/// The base prefix is padded with one more `TOKEN_OPEN` than the longest run
/// found after any occurrence of it, which takes a single scan.
fn unique_prefix(text: &str) -> String {
    let mut prefix = format!("{TOKEN_OPEN}SNIPPET");

    let longest_run = text
        .match_indices(prefix.as_str())
        .map(|(start, base)| {
            text[start + base.len()..]
                .chars()
                .take_while(|&c| c == TOKEN_OPEN)
                .count()
        })
        .max();

    if let Some(run) = longest_run {
        prefix.extend(std::iter::repeat_n(TOKEN_OPEN, run + 1));
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn extract(text: &str) -> (String, SnippetQueue) {
        let mut ctx = ConversionContext::new("", Duration::ZERO);
        SnippetQueue::extract(text, &mut ctx).expect("extraction failed")
    }

    #[test]
    fn test_extracts_all_kinds_in_order() {
        let (text, queue) =
            extract("a<pre>one</pre>b<code>two</code>c[code=php]three[/code]d");

        let kinds: Vec<_> = queue.snippets().map(|s| s.kind).collect();
        assert_eq!(kinds, [SnippetKind::Pre, SnippetKind::Code, SnippetKind::BBCode]);

        let contents: Vec<_> = queue.snippets().map(|s| s.raw_content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);

        for token in queue.tokens() {
            assert_eq!(text.matches(token).count(), 1);
        }
        assert!(!text.contains("one"));
        assert!(text.starts_with('a') && text.ends_with('d'));
    }

    #[test]
    fn test_markers_are_kept() {
        let (_, queue) = extract("<PRE class=\"x\">a</PRE>[code=rust]b[/code]");
        let snippets: Vec<_> = queue.snippets().collect();
        assert_eq!(snippets[0].open_marker, "<PRE class=\"x\">");
        assert_eq!(snippets[0].close_marker, "</PRE>");
        assert_eq!(snippets[1].open_marker, "[code=rust]");
        assert_eq!(snippets[1].close_marker, "[/code]");
    }

    #[test]
    fn test_no_snippets() {
        let (text, queue) = extract("<b>plain</b>");
        assert_eq!(text, "<b>plain</b>");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_restore_rebuilds_blocks() {
        let (text, queue) = extract("x<pre>  <b>y</b>  </pre>z[code=sql]select[/code]");
        let restored = queue.restore(text);
        assert_eq!(
            restored,
            "x\n[code]\n<b>y</b>\n[/code]\nz\n[code=sql]\nselect\n[/code]\n"
        );
    }

    #[test]
    fn test_prefix_avoids_user_content() {
        let hostile = format!("{TOKEN_OPEN}SNIPPET0{TOKEN_CLOSE} <code>real</code>");
        let (text, queue) = extract(&hostile);
        let restored = queue.restore(text);
        assert!(restored.starts_with(&format!("{TOKEN_OPEN}SNIPPET0{TOKEN_CLOSE} ")));
        assert!(restored.contains("[code]\nreal\n[/code]"));
    }

    #[test]
    fn test_prefix_outgrows_longest_run() {
        let base = format!("{TOKEN_OPEN}SNIPPET");
        let text = format!("{base}{TOKEN_OPEN} and {base}{}", TOKEN_OPEN.to_string().repeat(3));
        let prefix = unique_prefix(&text);

        assert_eq!(prefix, format!("{base}{}", TOKEN_OPEN.to_string().repeat(4)));
        assert!(!text.contains(&prefix));
        assert_eq!(unique_prefix("plain"), base);
    }

    #[test]
    fn test_restore_appends_missing_placeholders() {
        let (text, queue) = extract("a<code>one</code>b<code>two</code>c");
        let first = queue.tokens().next().map(str::to_string).expect("no token");
        let restored = queue.restore(text.replace(&first, ""));

        assert_eq!(restored, "ab\n[code]\ntwo\n[/code]\nc\n[code]\none\n[/code]\n");
    }

    #[test]
    fn test_bbcode_to_bbcode() {
        let snippet = ExtractedSnippet {
            kind: SnippetKind::BBCode,
            raw_content: "\n  ls -la \n".to_string(),
            open_marker: "[code=sh]".to_string(),
            close_marker: "[/code]".to_string(),
        };
        assert_eq!(snippet.to_bbcode(), "[code=sh]\nls -la\n[/code]");
    }

    proptest! {
        #[test]
        fn prop_placeholder_count_matches_queue(
            blocks in prop::collection::vec("[a-z]{1,10}", 0..8),
        ) {
            let text: String = blocks
                .iter()
                .map(|b| format!("<p>x</p><code>{b}</code>"))
                .collect();
            let (replaced, queue) = extract(&text);

            prop_assert_eq!(queue.len(), blocks.len());
            prop_assert_eq!(replaced.matches(TOKEN_CLOSE).count(), queue.len());
            let contents: Vec<_> = queue.snippets().map(|s| s.raw_content.clone()).collect();
            prop_assert_eq!(contents, blocks);
        }
    }
}
