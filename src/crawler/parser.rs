//! Pattern-based HTML extraction
//!
//! Extraction is regex-driven rather than DOM-driven: good enough for
//! titles, meta descriptions, visible text, and href discovery, with no
//! parser state to keep. All patterns are case-insensitive and dot-all so
//! multi-line tags match.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_DESC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .unwrap()
});
static META_DESC_REV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s[^>]*content\s*=\s*["']([^"']*)["'][^>]*name\s*=\s*["']description["']"#)
        .unwrap()
});
static OG_DESC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta\s[^>]*property\s*=\s*["']og:description["'][^>]*content\s*=\s*["']([^"']*)["']"#,
    )
    .unwrap()
});
static LANG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<html\s[^>]*lang\s*=\s*["']([^"']+)["']"#).unwrap());
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).unwrap());

const TITLE_MAX_CHARS: usize = 512;
const DESCRIPTION_MAX_CHARS: usize = 1024;

fn clean_fragment(s: &str, max_chars: usize) -> String {
    let no_tags = TAG_RE.replace_all(s, " ");
    let decoded = decode_html_entities(&no_tags);
    let collapsed = SPACE_RE.replace_all(&decoded, " ");
    collapsed.trim().chars().take(max_chars).collect()
}

/// Extracts the `<title>` text, capped at 512 characters
pub fn extract_title(html: &str) -> String {
    match TITLE_RE.captures(html) {
        Some(caps) => clean_fragment(&caps[1], TITLE_MAX_CHARS),
        None => String::new(),
    }
}

/// Extracts the meta description, falling back to `og:description`
///
/// Capped at 1024 characters.
pub fn extract_meta_description(html: &str) -> String {
    let raw = META_DESC_RE
        .captures(html)
        .or_else(|| META_DESC_REV_RE.captures(html))
        .or_else(|| OG_DESC_RE.captures(html))
        .map(|caps| caps[1].to_string());
    match raw {
        Some(s) => clean_fragment(&s, DESCRIPTION_MAX_CHARS),
        None => String::new(),
    }
}

/// Extracts the document language from `<html lang="...">`
pub fn extract_lang(html: &str) -> String {
    LANG_RE
        .captures(html)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

/// Strips markup and returns the visible text with whitespace collapsed
///
/// Script and style bodies are removed before tag stripping so their
/// contents never leak into the text.
pub fn extract_visible_text(html: &str) -> String {
    let no_script = SCRIPT_RE.replace_all(html, " ");
    let no_style = STYLE_RE.replace_all(&no_script, " ");
    let no_tags = TAG_RE.replace_all(&no_style, " ");
    let decoded = decode_html_entities(&no_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Collects every anchor href value, in document order
pub fn extract_hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>Hello, World</title></head></html>";
        assert_eq!(extract_title(html), "Hello, World");
    }

    #[test]
    fn test_extract_title_strips_nested_tags_and_entities() {
        let html = "<title>Rust &amp; <em>Friends</em></title>";
        assert_eq!(extract_title(html), "Rust & Friends");
    }

    #[test]
    fn test_extract_title_caps_length() {
        let long = "x".repeat(2000);
        let html = format!("<title>{}</title>", long);
        assert_eq!(extract_title(&html).chars().count(), 512);
    }

    #[test]
    fn test_missing_title_is_empty() {
        assert_eq!(extract_title("<html><body></body></html>"), "");
    }

    #[test]
    fn test_extract_meta_description() {
        let html = r#"<meta name="description" content="A page about things">"#;
        assert_eq!(extract_meta_description(html), "A page about things");
    }

    #[test]
    fn test_extract_meta_description_reversed_attrs() {
        let html = r#"<meta content="Reversed order" name="description">"#;
        assert_eq!(extract_meta_description(html), "Reversed order");
    }

    #[test]
    fn test_og_description_fallback() {
        let html = r#"<meta property="og:description" content="From og">"#;
        assert_eq!(extract_meta_description(html), "From og");
    }

    #[test]
    fn test_meta_description_preferred_over_og() {
        let html = concat!(
            r#"<meta property="og:description" content="From og">"#,
            r#"<meta name="description" content="From meta">"#,
        );
        assert_eq!(extract_meta_description(html), "From meta");
    }

    #[test]
    fn test_extract_lang() {
        assert_eq!(extract_lang(r#"<html lang="en-US"><body>"#), "en-US");
        assert_eq!(extract_lang("<html><body>"), "");
    }

    #[test]
    fn test_visible_text_drops_script_and_style() {
        let html = concat!(
            "<html><head><style>body { color: red }</style>",
            "<script>var x = 1;</script></head>",
            "<body><p>Hello   world</p></body></html>",
        );
        assert_eq!(extract_visible_text(html), "Hello world");
    }

    #[test]
    fn test_visible_text_decodes_entities() {
        assert_eq!(
            extract_visible_text("<p>a &lt; b &amp;&nbsp;c</p>"),
            "a < b & c"
        );
    }

    #[test]
    fn test_extract_hrefs_in_document_order() {
        let html = concat!(
            r#"<a href="/first">one</a>"#,
            r#"<a class="x" href='/second'>two</a>"#,
            r#"<a name="no-href">three</a>"#,
        );
        assert_eq!(extract_hrefs(html), vec!["/first", "/second"]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let html = "<title>T</title><p>body</p>";
        assert_eq!(extract_title(html), extract_title(html));
        assert_eq!(extract_visible_text(html), extract_visible_text(html));
    }
}
