//! Document extraction: raw page markup → [`ArticleDocument`].
//!
//! Metadata comes from Open Graph `<meta>` tags; the body comes from the
//! single `div#js_content` container. The body is linearised in one pass
//! over the parsed tree: text nodes are copied, `<br>` becomes a newline,
//! block elements get a trailing newline, script-like elements vanish, and each
//! real content image is replaced by a placeholder token on its own line.
//! The parsed tree itself is never modified.

use crate::document::{ArticleDocument, MediaRef, RawPage};
use crate::error::ArchiveError;
use crate::placeholder;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Selector of the article body container.
pub const CONTENT_MARKER: &str = "div#js_content";

/// Attribute holding an image's real (lazy-loaded) source.
pub const LAZY_SRC_ATTR: &str = "data-src";

static SEL_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static SEL_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:article:author"]"#).unwrap());
static SEL_SUMMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static SEL_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse(CONTENT_MARKER).unwrap());

/// Elements dropped with everything inside them.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that end their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "li",
    "ul", "ol", "pre", "figure", "figcaption", "table", "tr", "hr",
];

/// Parse a fetched page into an [`ArticleDocument`].
///
/// # Errors
/// * [`ArchiveError::MissingField`] — `title` or `author` meta tag absent or blank
/// * [`ArchiveError::ContentNotFound`] — no body container
pub fn extract(page: &RawPage) -> Result<ArticleDocument, ArchiveError> {
    let html = Html::parse_document(&page.text);

    let title = meta_content(&html, &SEL_TITLE).ok_or(ArchiveError::MissingField { field: "title" })?;
    let author =
        meta_content(&html, &SEL_AUTHOR).ok_or(ArchiveError::MissingField { field: "author" })?;
    let summary = meta_content(&html, &SEL_SUMMARY).unwrap_or_default();

    let content = html
        .select(&SEL_CONTENT)
        .next()
        .ok_or(ArchiveError::ContentNotFound {
            marker: CONTENT_MARKER,
        })?;

    let base = Url::parse(&page.url).ok();
    let mut linear = Linearizer::new(base);
    linear.walk(content);

    let body = collapse_lines(&linear.text);
    debug!(
        "Extracted '{}': {} chars, {} images",
        title,
        body.len(),
        linear.media_refs.len()
    );

    Ok(ArticleDocument {
        title,
        author,
        summary,
        body,
        media_refs: linear.media_refs,
    })
}

/// Trimmed `content` attribute of the first match; blank counts as absent.
fn meta_content(html: &Html, selector: &Selector) -> Option<String> {
    html.select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trim each line, drop blank lines, rejoin with single newlines.
pub fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accumulates body text and media references during the tree walk.
struct Linearizer {
    base: Option<Url>,
    text: String,
    media_refs: Vec<MediaRef>,
    seen: HashSet<String>,
}

impl Linearizer {
    fn new(base: Option<Url>) -> Self {
        Self {
            base,
            text: String::new(),
            media_refs: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text.push_str(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.visit_element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }
        match name {
            "br" => self.text.push('\n'),
            "img" => self.visit_image(el),
            _ if BLOCK_ELEMENTS.contains(&name) => {
                self.walk(el);
                self.text.push('\n');
            }
            _ => self.walk(el),
        }
    }

    fn visit_image(&mut self, el: ElementRef<'_>) {
        let Some(raw_src) = el
            .value()
            .attr(LAZY_SRC_ATTR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return;
        };

        let Some(source_url) = self.absolutize(raw_src) else {
            warn!("Skipping image with unresolvable source '{}'", raw_src);
            return;
        };
        if !placeholder::is_encodable(&source_url) {
            warn!("Skipping image with unusable source '{}'", source_url);
            return;
        }

        if self.seen.insert(source_url.clone()) {
            self.media_refs.push(MediaRef {
                source_url: source_url.clone(),
                alt_text: el.value().attr("alt").unwrap_or_default().trim().to_string(),
            });
        }

        self.text.push('\n');
        self.text.push_str(&placeholder::token(&source_url));
        self.text.push('\n');
    }

    fn absolutize(&self, src: &str) -> Option<String> {
        match Url::parse(src) {
            Ok(u) => Some(u.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.base.as_ref()?.join(src).ok().map(|u| u.to_string())
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(head: &str, body: &str) -> RawPage {
        RawPage::new(
            "https://mp.weixin.qq.com/s/abc",
            format!("<html><head>{head}</head><body>{body}</body></html>"),
        )
    }

    const META: &str = r#"
        <meta property="og:title" content=" Sample Title ">
        <meta property="og:article:author" content="Jane">
        <meta property="og:description" content="A short summary">
    "#;

    #[test]
    fn extracts_metadata() {
        let doc = extract(&page(META, r#"<div id="js_content"><p>Hi</p></div>"#)).unwrap();
        assert_eq!(doc.title, "Sample Title");
        assert_eq!(doc.author, "Jane");
        assert_eq!(doc.summary, "A short summary");
        assert_eq!(doc.body, "Hi");
    }

    #[test]
    fn missing_title_is_fatal() {
        let head = r#"<meta property="og:article:author" content="Jane">"#;
        let err = extract(&page(head, r#"<div id="js_content">x</div>"#)).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingField { field: "title" }));
    }

    #[test]
    fn blank_author_is_missing() {
        let head = r#"<meta property="og:title" content="T">
                      <meta property="og:article:author" content="   ">"#;
        let err = extract(&page(head, r#"<div id="js_content">x</div>"#)).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingField { field: "author" }));
    }

    #[test]
    fn summary_is_optional() {
        let head = r#"<meta property="og:title" content="T">
                      <meta property="og:article:author" content="A">"#;
        let doc = extract(&page(head, r#"<div id="js_content">x</div>"#)).unwrap();
        assert_eq!(doc.summary, "");
    }

    #[test]
    fn missing_container_is_fatal() {
        let err = extract(&page(META, "<div id=\"other\">x</div>")).unwrap_err();
        assert!(matches!(err, ArchiveError::ContentNotFound { .. }));
    }

    #[test]
    fn scripts_and_styles_vanish() {
        let body = r#"<div id="js_content">
            <p>keep</p><script>var x = 1;</script><style>p{}</style><p>also</p>
        </div>"#;
        let doc = extract(&page(META, body)).unwrap();
        assert_eq!(doc.body, "keep\nalso");
    }

    #[test]
    fn br_and_paragraphs_become_lines() {
        let body = r#"<div id="js_content"><p>one<br>two</p><p>three</p><span>four</span></div>"#;
        let doc = extract(&page(META, body)).unwrap();
        assert_eq!(doc.body, "one\ntwo\nthree\nfour");
    }

    #[test]
    fn sibling_blocks_stay_on_separate_lines() {
        let body = r#"<div id="js_content"><section>Line one</section><section>Line two</section><h2>Head</h2><p>para</p><ul><li>a</li><li>b<span>c</span></li></ul></div>"#;
        let doc = extract(&page(META, body)).unwrap();
        assert_eq!(doc.body, "Line one\nLine two\nHead\npara\na\nbc");
    }

    #[test]
    fn images_become_placeholders_in_position() {
        let body = r#"<div id="js_content">
            <p>before</p>
            <p><img data-src="https://img.example/1.png" alt="first"></p>
            <p>between</p>
            <img src="data:image/gif;base64,R0lGOD" alt="spacer">
            <img data-src="https://img.example/2.png">
            <p>after</p>
        </div>"#;
        let doc = extract(&page(META, body)).unwrap();

        let expected = format!(
            "before\n{}\nbetween\n{}\nafter",
            placeholder::token("https://img.example/1.png"),
            placeholder::token("https://img.example/2.png")
        );
        assert_eq!(doc.body, expected);
        assert_eq!(doc.media_refs.len(), 2);
        assert_eq!(doc.media_refs[0].alt_text, "first");
        assert_eq!(doc.media_refs[1].alt_text, "");
        assert!(doc.placeholders_consistent());
    }

    #[test]
    fn duplicate_images_share_one_ref() {
        let body = r#"<div id="js_content">
            <img data-src="https://img.example/1.png" alt="a">
            <p>x</p>
            <img data-src="https://img.example/1.png" alt="b">
        </div>"#;
        let doc = extract(&page(META, body)).unwrap();
        assert_eq!(doc.media_refs.len(), 1);
        assert_eq!(placeholder::urls(&doc.body).len(), 2);
        assert!(doc.placeholders_consistent());
    }

    #[test]
    fn relative_sources_resolve_against_page() {
        let body = r#"<div id="js_content">
            <img data-src="//mmbiz.example/pic.jpg">
            <img data-src="/static/b.png">
        </div>"#;
        let doc = extract(&page(META, body)).unwrap();
        let urls: Vec<&str> = doc.media_refs.iter().map(|r| r.source_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://mmbiz.example/pic.jpg",
                "https://mp.weixin.qq.com/static/b.png"
            ]
        );
    }

    #[test]
    fn entities_in_sources_are_decoded() {
        let body = r#"<div id="js_content"><img data-src="https://img.example/a?x=1&amp;y=2"></div>"#;
        let doc = extract(&page(META, body)).unwrap();
        assert_eq!(doc.media_refs[0].source_url, "https://img.example/a?x=1&y=2");
    }

    #[test]
    fn collapse_lines_drops_blank_and_trims() {
        assert_eq!(collapse_lines("  a  \n\n \t\n b\n\n"), "a\nb");
        assert_eq!(collapse_lines("\u{3000}x\u{3000}"), "x");
    }
}
