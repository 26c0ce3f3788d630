//! Markdown rendering and issue files.
//!
//! Articles render as a level-two heading, an optional metadata list, one
//! image reference per image (remote URLs, never downloaded) and the body.
//! Issue files join the rendered articles with horizontal rules and are named
//! `<year>_<issue-label>.md`.
//!
//! # Example
//!
//! ```rust
//! use chinaland_core::export::issue_file_name;
//! use chinaland_core::Issue;
//!
//! let issue = Issue {
//!     id: "m1".to_string(),
//!     year: "2025".to_string(),
//!     label: "第10期".to_string(),
//!     title: None,
//!     date: None,
//! };
//! assert_eq!(issue_file_name(&issue), "2025_第10期.md");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::model::{Article, Issue};
use crate::{ChinaLandError, Result};

/// File name prefix for single-article exports.
pub const DEFAULT_PREFIX: &str = "中国土地";

static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z\x{4e00}-\x{9fff}\-（）()第期年月日]").expect("static regex"));
static UNSAFE_TITLE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z\x{4e00}-\x{9fff}\-（）()第期年月日 ]").expect("static regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// How batch exports lay out their files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportLayout {
    /// One file per issue.
    #[default]
    Issue,
    /// One file per article.
    Article,
}

/// Settings shared by every export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Prefix of single-article file names.
    pub prefix: String,
    pub layout: ExportLayout,
    /// JSON Lines file that batch exports append every fetched article to.
    pub dump: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { prefix: DEFAULT_PREFIX.to_string(), layout: ExportLayout::Issue, dump: None }
    }
}

/// Renders one article as Markdown.
pub fn render_article(article: &Article) -> String {
    let mut lines: Vec<String> = Vec::new();

    let title = single_line(&article.title);
    let title = title.as_str();
    lines.push(match format_index(article.index.as_deref()) {
        Some(index) if title.is_empty() => format!("## {}", index),
        Some(index) => format!("## {} {}", index, title),
        None => format!("## {}", title),
    });

    let meta: Vec<String> = [
        ("栏目", article.column.as_deref()),
        ("作者", article.author.as_deref()),
        ("页码", article.page_number.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| format!("- {}：{}", label, v))
    })
    .collect();
    if !meta.is_empty() {
        lines.extend(meta);
        lines.push(String::new());
    }

    if !article.images.is_empty() {
        for (i, image) in article.images.iter().enumerate() {
            let caption = if image.alt.is_empty() { format!("图片{}", i + 1) } else { escape_brackets(&image.alt) };
            lines.push(format!("![{}]({})", caption, image.url));
        }
        lines.push(String::new());
    }

    lines.push(body_markdown(article));

    collapse_blank_lines(lines.join("\n").trim())
}

/// Renders an issue with all given articles, separated by horizontal rules.
pub fn render_issue(issue: &Issue, articles: &[Article]) -> String {
    let mut lines: Vec<String> = vec![format!("# {}", issue.display_title(DEFAULT_PREFIX))];

    if let Some(date) = issue.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        lines.push(String::new());
        lines.push(format!("- 出版日期：{}", date));
    }

    for (i, article) in articles.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
            lines.push("---".to_string());
        }
        lines.push(String::new());
        lines.push(render_article(article));
    }

    format!("{}\n", lines.join("\n").trim())
}

/// File name of an issue: `<year>_<label>.md`.
///
/// Characters that are unsafe in file names become `_`; an empty label falls
/// back to the issue id.
pub fn issue_file_name(issue: &Issue) -> String {
    let label = sanitize(issue.label.trim(), &UNSAFE_NAME_CHARS);
    let name = if label.is_empty() { sanitize(&issue.id, &UNSAFE_NAME_CHARS) } else { label };
    format!("{}_{}.md", sanitize(issue.year.trim(), &UNSAFE_NAME_CHARS), name)
}

/// File name of a single article: `<prefix>_<year>_<label>_<index>_<title>.md`.
pub fn article_file_name(issue: &Issue, article: &Article, prefix: &str) -> String {
    let index = format_index(article.index.as_deref()).unwrap_or_else(|| article.id.clone());
    let stem = format!("{}_{}_{}_{}", issue.year, issue.label, index, article.title);
    format!(
        "{}_{}.md",
        sanitize(prefix.trim(), &UNSAFE_NAME_CHARS),
        sanitize(stem.trim(), &UNSAFE_TITLE_CHARS)
    )
}

/// Writes an issue file into `dir`, creating the directory if needed.
///
/// Identical input always produces identical bytes; an existing file is
/// overwritten.
pub fn write_issue_markdown(issue: &Issue, articles: &[Article], dir: &Path) -> Result<PathBuf> {
    let path = dir.join(issue_file_name(issue));
    write_file(dir, &path, &render_issue(issue, articles))?;
    info!(path = %path.display(), articles = articles.len(), "issue written");
    Ok(path)
}

/// Writes a single article into `dir`.
pub fn write_article_markdown(issue: &Issue, article: &Article, dir: &Path, prefix: &str) -> Result<PathBuf> {
    let path = dir.join(article_file_name(issue, article, prefix));
    write_file(dir, &path, &format!("{}\n", render_article(article)))?;
    info!(path = %path.display(), "article written");
    Ok(path)
}

fn write_file(dir: &Path, path: &Path, content: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| ChinaLandError::WriteError { path: dir.to_path_buf(), source })?;
    fs::write(path, content).map_err(|source| ChinaLandError::WriteError { path: path.to_path_buf(), source })
}

/// Zero-padded numeric index, or the raw value when it is not a number.
fn format_index(index: Option<&str>) -> Option<String> {
    let index = index.map(str::trim).filter(|i| !i.is_empty())?;
    Some(match index.parse::<u64>() {
        Ok(n) => format!("{:03}", n),
        Err(_) => index.to_string(),
    })
}

/// Markdown of the article body, falling back to its plain text.
fn body_markdown(article: &Article) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["img", "script", "style"])
        .build();
    let markdown = converter.convert(&article.body_html).unwrap_or_default();

    let tidy = markdown
        .lines()
        .map(|line| line.trim_start_matches(['\u{3000}', '\u{a0}']).trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let tidy = tidy.trim();

    if tidy.is_empty() { article.body_text.trim().to_string() } else { tidy.to_string() }
}

/// Joins the non-empty lines of `text` with single spaces.
fn single_line(text: &str) -> String {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join(" ")
}

fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUNS.replace_all(text, "\n\n").to_string()
}

fn escape_brackets(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

fn sanitize(text: &str, unsafe_chars: &Regex) -> String {
    unsafe_chars.replace_all(text, "_").to_string()
}
