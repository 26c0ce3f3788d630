//! Article markup handling.
//!
//! Everything that knows how the archive site writes its article HTML lives
//! here: the `<%basePath%>` placeholder in image sources, which elements carry
//! no readable text, and how paragraphs map to plain text. The exporter only
//! ever sees the cleaned [`ArticleBody`].
//!
//! # Example
//!
//! ```rust
//! use chinaland_core::parse::parse_body;
//! use url::Url;
//!
//! let base = Url::parse("http://szb.iziran.net").unwrap();
//! let body = parse_body(r#"<p>正文</p><img src="<%basePath%>/batch/a.jpg" alt="图">"#, &base).unwrap();
//! assert_eq!(body.images[0].url, "http://szb.iziran.net/dataFile/batch/a.jpg");
//! assert!(!body.html.contains("<img"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::model::Image;
use crate::{ChinaLandError, Result};

/// Placeholder the site leaves in image sources instead of its file server root.
pub const BASE_PATH_PLACEHOLDER: &str = "<%basePath%>";

static IMG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").expect("static selector"));
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"));
static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</p\s*>").expect("static regex"));
static ITEM_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("static regex"));
static ITEM_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</li\s*>").expect("static regex"));

/// Cleaned article content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleBody {
    /// Article markup without images, scripts or styles.
    pub html: String,
    /// Readable plain text of the markup.
    pub text: String,
    /// Every image of the original markup, in document order.
    pub images: Vec<Image>,
}

/// Root of the site's static file server for a given site root.
pub fn data_url(base: &Url) -> String {
    format!("{}/dataFile", base.as_str().trim_end_matches('/'))
}

/// Parses the HTML body of an article.
pub fn parse_body(raw_html: &str, base: &Url) -> Result<ArticleBody> {
    let resolved = raw_html.replace(BASE_PATH_PLACEHOLDER, &data_url(base));
    let images = extract_images(&resolved, base);
    let html = strip_media(&resolved)?;
    let text = html_to_text(&html);

    Ok(ArticleBody { html, text, images })
}

/// Collects image sources and alt texts in document order.
///
/// Relative sources are resolved against `base`; images without a source are
/// skipped.
pub fn extract_images(html: &str, base: &Url) -> Vec<Image> {
    let fragment = Html::parse_fragment(html);

    fragment
        .select(&IMG_SELECTOR)
        .filter_map(|img| {
            let src = img.value().attr("src")?.trim();
            if src.is_empty() {
                return None;
            }
            let url = base.join(src).map(|u| u.to_string()).unwrap_or_else(|_| src.to_string());
            let alt = img.value().attr("alt").unwrap_or_default().trim().to_string();
            Some(Image { url, alt })
        })
        .collect()
}

/// Removes images, scripts and styles from HTML.
fn strip_media(html: &str) -> Result<String> {
    let mut output = Vec::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("img", |el| {
                    el.remove();
                    Ok(())
                }),
                lol_html::element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
                lol_html::element!("style", |el| {
                    el.remove();
                    Ok(())
                }),
            ],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| ChinaLandError::ParseError(e.to_string()))?;
    rewriter.end().map_err(|e| ChinaLandError::ParseError(e.to_string()))?;

    String::from_utf8(output).map_err(|e| ChinaLandError::ParseError(e.to_string()))
}

/// Converts an HTML snippet to plain text.
///
/// Line breaks and paragraph ends become newlines, list items become `- `
/// bullets, and entities are decoded.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let marked = LINE_BREAK.replace_all(html, "\n");
    let marked = PARAGRAPH_END.replace_all(&marked, "\n\n");
    let marked = ITEM_START.replace_all(&marked, "- ");
    let marked = ITEM_END.replace_all(&marked, "\n");

    let fragment = Html::parse_fragment(&marked);
    let text = fragment.root_element().text().collect::<String>();
    normalise_whitespace(&text)
}

/// Trims every line (including full-width indentation) and collapses runs of
/// blank lines into one.
pub fn normalise_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\u{3000}' | '\u{a0}'));
        if line.is_empty() {
            if lines.last().is_some_and(|last| !last.is_empty()) {
                lines.push("");
            }
            continue;
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://szb.iziran.net").unwrap()
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url(&base()), "http://szb.iziran.net/dataFile");
    }

    #[test]
    fn test_images_in_document_order() {
        let html = r#"
            <p>开头</p>
            <img src="<%basePath%>/batch/2025/one.jpg" alt="第一张">
            <p>中间</p>
            <img src="http://cdn.example.com/two.png">
        "#;
        let body = parse_body(html, &base()).unwrap();
        assert_eq!(body.images.len(), 2);
        assert_eq!(body.images[0].url, "http://szb.iziran.net/dataFile/batch/2025/one.jpg");
        assert_eq!(body.images[0].alt, "第一张");
        assert_eq!(body.images[1].url, "http://cdn.example.com/two.png");
        assert_eq!(body.images[1].alt, "");
    }

    #[test]
    fn test_relative_sources_are_resolved() {
        let images = extract_images(r#"<img src="/dataFile/x.jpg">"#, &base());
        assert_eq!(images[0].url, "http://szb.iziran.net/dataFile/x.jpg");
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let images = extract_images(r#"<img src=""><img src="  "><img alt="none">"#, &base());
        assert!(images.is_empty());
    }

    #[test]
    fn test_alt_entities_are_decoded() {
        let images = extract_images(r#"<img src="a.jpg" alt="土地 &amp; 资源">"#, &base());
        assert_eq!(images[0].alt, "土地 & 资源");
    }

    #[test]
    fn test_body_html_has_no_media() {
        let html = r#"<p>正文<img src="a.jpg"></p><script>alert(1)</script><style>p{}</style>"#;
        let body = parse_body(html, &base()).unwrap();
        assert!(!body.html.contains("<img"));
        assert!(!body.html.contains("alert"));
        assert!(!body.html.contains("<style"));
        assert!(body.html.contains("正文"));
    }

    #[test]
    fn test_html_to_text_paragraphs() {
        let text = html_to_text("<p>\u{3000}\u{3000}第一段</p><p>第二段<br>换行</p>");
        assert_eq!(text, "第一段\n\n第二段\n换行");
    }

    #[test]
    fn test_html_to_text_lists() {
        let text = html_to_text("<ul><li>甲</li><li>乙</li></ul>");
        assert_eq!(text, "- 甲\n- 乙");
    }

    #[test]
    fn test_html_to_text_empty() {
        assert_eq!(html_to_text("   "), "");
        assert_eq!(html_to_text("<p></p>"), "");
    }

    #[test]
    fn test_normalise_whitespace_collapses_blank_runs() {
        let text = normalise_whitespace("  甲  \n\n\n\n\t乙\n \n");
        assert_eq!(text, "甲\n\n乙");
    }
}
