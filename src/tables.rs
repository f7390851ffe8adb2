//! Static lookup tables shared by both engines

/// HTML tag name and the BBCode tokens replacing its open and close tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMapping {
    /// Lower-case HTML tag name
    pub tag: &'static str,
    /// Token replacing the opening tag
    pub open: &'static str,
    /// Token replacing the closing tag (empty drops the tag)
    pub close: &'static str,
}

const fn mapping(tag: &'static str, open: &'static str, close: &'static str) -> TagMapping {
    TagMapping { tag, open, close }
}

/// HTML tags the HTML engine turns into BBCode
pub static TAG_MAPPINGS: &[TagMapping] = &[
    mapping("b", "[b]", "[/b]"),
    mapping("strong", "[b]", "[/b]"),
    mapping("i", "[i]", "[/i]"),
    mapping("em", "[i]", "[/i]"),
    mapping("u", "[u]", "[/u]"),
    mapping("strike", "[s]", "[/s]"),
    mapping("del", "[s]", "[/s]"),
    mapping("ul", "[list]", "[/list]"),
    mapping("ol", "[list=1]", "[/list]"),
    // List items carry no closing token in BBCode.
    mapping("li", "[*]", ""),
    mapping("center", "[center]", "[/center]"),
];

/// Code-fence language tokens and their canonical highlighter names
pub static LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("html4strict", "html"),
    ("div", "html"),
    ("shell", "sh"),
    ("dos", "sh"),
    ("batch", "sh"),
    ("xul", "xml"),
    ("wpf", "xml"),
    ("xaml", "xml"),
    ("asm", "nasm"),
    ("vb", "vb.net"),
    ("visualbasic", "vb.net"),
    ("vba", "vb.net"),
    ("asp", "aspx-vb"),
    ("aspnet", "aspx-vb"),
    ("cplusplus", "cpp"),
    ("txt", "text"),
    ("gettext", "text"),
    ("basic", "cbmbas"),
    ("lisp", "clojure"),
];

/// Find the mapping for an HTML tag name, ignoring case
///
/// # Examples
///
/// ```
/// use markup_normalizer::tables::lookup_tag;
///
/// assert_eq!(lookup_tag("STRONG").map(|m| m.open), Some("[b]"));
/// assert!(lookup_tag("span").is_none());
/// ```
pub fn lookup_tag(name: &str) -> Option<&'static TagMapping> {
    TAG_MAPPINGS
        .iter()
        .find(|mapping| mapping.tag.eq_ignore_ascii_case(name))
}

/// Lower-case a code-fence language token and map it to its canonical name
///
/// Tokens without an alias pass through lower-cased.
///
/// # Examples
///
/// ```
/// use markup_normalizer::tables::canonical_language;
///
/// assert_eq!(canonical_language("Shell"), "sh");
/// assert_eq!(canonical_language("Rust"), "rust");
/// ```
pub fn canonical_language(token: &str) -> String {
    let language = token.to_lowercase();
    LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == language)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(language)
}
