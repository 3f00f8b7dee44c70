//! Allow-list HTML sanitizer for rich card text.
//!
//! Markup is tokenized with regexes rather than parsed into a tree. Tags on
//! the allow-list are re-emitted with only their validated attributes, other
//! tags are unwrapped (their text is kept), and `<script>`/`<style>` bodies
//! and comments are dropped. Text and attribute values are re-encoded, so
//! the output never carries raw `<`, `>` or quotes from the input.

use std::sync::OnceLock;

use regex::Regex;

const ALLOWED_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "s", "br", "p", "ul", "ol", "li", "code", "pre", "ruby", "rt",
    "rb", "rp", "span", "h1", "h2", "h3", "h4", "h5", "h6", "font", "a", "img", "sup", "sub",
    "mark",
];

const VOID_TAGS: &[&str] = &["br", "img"];

/// Tags whose content is dropped along with the tag
const OPAQUE_TAGS: &[&str] = &["script", "style"];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<!--.*?(?:-->|\z)|<(/?)([a-zA-Z][a-zA-Z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*)>|[^<]+|<"#,
        )
        .unwrap()
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .unwrap()
    })
}

static FONT_COLOR: OnceLock<Regex> = OnceLock::new();
static FONT_SIZE: OnceLock<Regex> = OnceLock::new();
static FONT_FACE: OnceLock<Regex> = OnceLock::new();
static LINK_HREF: OnceLock<Regex> = OnceLock::new();
static IMG_SRC: OnceLock<Regex> = OnceLock::new();
static IMG_DIMENSION: OnceLock<Regex> = OnceLock::new();

fn matches(cell: &'static OnceLock<Regex>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).unwrap()).is_match(value)
}

/// Validate one attribute value. Returns the value to emit, or `None` to drop
/// the attribute.
pub fn sanitize_attribute(tag: &str, name: &str, value: &str) -> Option<String> {
    let trimmed = value.trim();
    let ok = match (tag, name) {
        ("font", "color") => matches(
            &FONT_COLOR,
            r"^(#[0-9a-fA-F]{3}|#[0-9a-fA-F]{6}|[a-zA-Z]+)$",
            trimmed,
        ),
        ("font", "size") => matches(&FONT_SIZE, r"^[1-7]$", trimmed),
        ("font", "face") => matches(&FONT_FACE, r"^[\w\s,-]+$", trimmed),
        ("a", "href") => matches(&LINK_HREF, r"(?i)^((https?:)?//|mailto:|#)", trimmed),
        ("img", "src") => matches(&IMG_SRC, r"(?i)^((https?:)?//|data:image/)", trimmed),
        ("img", "alt") | ("img", "title") => return Some(value.to_string()),
        ("img", "width") | ("img", "height") => matches(&IMG_DIMENSION, r"^\d{1,4}$", trimmed),
        _ => false,
    };
    ok.then(|| trimmed.to_string())
}

fn render_attributes(tag: &str, raw: &str) -> String {
    let mut out = String::new();
    for caps in attr_re().captures_iter(raw) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");
        let value = html_escape::decode_html_entities(value);

        if let Some(clean) = sanitize_attribute(tag, &name, &value) {
            out.push(' ');
            out.push_str(&name);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(&clean));
            out.push('"');
        }
    }
    out
}

/// Sanitize untrusted HTML down to the allow-list
pub fn sanitize_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open: Vec<String> = Vec::new();
    let mut skipping: Option<String> = None;

    for caps in token_re().captures_iter(input) {
        let token = &caps[0];

        let Some(name) = caps.get(2) else {
            if skipping.is_some() || token.starts_with("<!--") {
                continue;
            }
            let text = html_escape::decode_html_entities(token);
            out.push_str(&html_escape::encode_text(&text));
            continue;
        };

        let tag = name.as_str().to_ascii_lowercase();
        let closing = !caps[1].is_empty();

        if let Some(opaque) = &skipping {
            if closing && *opaque == tag {
                skipping = None;
            }
            continue;
        }

        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let self_closing = attrs.trim_end().ends_with('/');

        if OPAQUE_TAGS.contains(&tag.as_str()) {
            if !closing && !self_closing {
                skipping = Some(tag);
            }
            continue;
        }

        if !ALLOWED_TAGS.contains(&tag.as_str()) {
            continue;
        }

        let void = VOID_TAGS.contains(&tag.as_str());
        if closing {
            if void {
                continue;
            }
            // Close everything opened inside the matching element
            if let Some(pos) = open.iter().rposition(|t| *t == tag) {
                for inner in open.drain(pos..).rev() {
                    out.push_str("</");
                    out.push_str(&inner);
                    out.push('>');
                }
            }
            continue;
        }

        let attrs = attrs.trim_end().trim_end_matches('/');
        out.push('<');
        out.push_str(&tag);
        out.push_str(&render_attributes(&tag, attrs));
        out.push('>');

        if void {
            continue;
        }
        if self_closing {
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        } else {
            open.push(tag);
        }
    }

    for tag in open.into_iter().rev() {
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_markup_survives() {
        assert_eq!(
            sanitize_html("<b>bold</b> and <em>em</em><br>"),
            "<b>bold</b> and <em>em</em><br>"
        );
        assert_eq!(
            sanitize_html("<ruby>漢<rt>kan</rt></ruby>"),
            "<ruby>漢<rt>kan</rt></ruby>"
        );
    }

    #[test]
    fn test_disallowed_tags_are_unwrapped() {
        assert_eq!(
            sanitize_html(r#"<div class="x"><p>Hi <blink>there</blink></p></div>"#),
            "<p>Hi there</p>"
        );
    }

    #[test]
    fn test_script_and_style_bodies_dropped() {
        assert_eq!(
            sanitize_html("a<script>alert('x')</script>b<style>p{}</style>c<!-- note -->"),
            "abc"
        );
    }

    #[test]
    fn test_attributes_filtered_and_validated() {
        assert_eq!(
            sanitize_html(r#"<a href="javascript:alert(1)" onclick="x()">link</a>"#),
            "<a>link</a>"
        );
        assert_eq!(
            sanitize_html(r#"<a href="https://example.com/?a=1&amp;b=2">ok</a>"#),
            r#"<a href="https://example.com/?a=1&amp;b=2">ok</a>"#
        );
        assert_eq!(
            sanitize_html(r##"<font color="#ff0000" size=9 face='Arial, sans-serif'>red</font>"##),
            r##"<font color="#ff0000" face="Arial, sans-serif">red</font>"##
        );
        assert_eq!(
            sanitize_html(r#"<img src="data:image/png;base64,AAAA" width="120" height="big" alt="a &quot;pic&quot;"/>"#),
            r#"<img src="data:image/png;base64,AAAA" width="120" alt="a &quot;pic&quot;">"#
        );
        assert_eq!(sanitize_html(r#"<span style="color:red">s</span>"#), "<span>s</span>");
    }

    #[test]
    fn test_attribute_rules() {
        for _ in 0..3 {
            assert_eq!(sanitize_attribute("font", "color", " #abc "), Some("#abc".to_string()));
            assert_eq!(sanitize_attribute("font", "color", "red;x"), None);
            assert_eq!(sanitize_attribute("font", "size", "8"), None);
            assert_eq!(
                sanitize_attribute("a", "href", "mailto:me@x.org").as_deref(),
                Some("mailto:me@x.org")
            );
            assert_eq!(sanitize_attribute("img", "src", "javascript:x"), None);
            assert_eq!(sanitize_attribute("img", "height", "12345"), None);
            assert_eq!(sanitize_attribute("span", "class", "x"), None);
        }
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(sanitize_html("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
        assert_eq!(sanitize_html("&lt;b&gt;"), "&lt;b&gt;");
    }

    #[test]
    fn test_unclosed_tags_are_closed() {
        assert_eq!(sanitize_html("<b><i>x"), "<b><i>x</i></b>");
        assert_eq!(sanitize_html("<b><i>x</b>y</i>"), "<b><i>x</i></b>y");
    }

    #[test]
    fn test_sanitize_attribute_rules() {
        assert_eq!(sanitize_attribute("a", "href", " #top "), Some("#top".to_string()));
        assert_eq!(sanitize_attribute("a", "href", "mailto:x@y.z").as_deref(), Some("mailto:x@y.z"));
        assert_eq!(sanitize_attribute("img", "src", "/local.png"), None);
        assert_eq!(sanitize_attribute("font", "color", "red"), Some("red".to_string()));
        assert_eq!(sanitize_attribute("font", "color", "rgb(0,0,0)"), None);
        assert_eq!(sanitize_attribute("span", "title", "x"), None);
    }
}
