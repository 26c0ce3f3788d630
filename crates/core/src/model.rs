//! Archive hierarchy types: years, issues, article summaries and articles.
//!
//! Values here are plain data. They are produced by the session client and
//! consumed by the Markdown exporter, which never sees site markup directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A publication year of the journal.
///
/// The site identifies years by their label, so `id` and `label` carry the
/// same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Year {
    pub id: String,
    pub label: String,
}

impl Year {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self { id: label.clone(), label }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A single published edition, belonging to exactly one [`Year`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Site identifier of the magazine edition.
    pub id: String,
    /// Label of the owning year.
    pub year: String,
    /// Edition label, e.g. `第10期`.
    pub label: String,
    /// Full edition title, if the site provides one.
    pub title: Option<String>,
    /// Publication date as given by the site.
    pub date: Option<String>,
}

impl Issue {
    /// Title used for headings: the full title, or `prefix`, year and label.
    pub fn display_title(&self, prefix: &str) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => format!("{}{}{}", prefix, self.year, self.label).trim().to_string(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.label.is_empty() { &self.id } else { &self.label };
        write!(f, "{} {}", self.year, label)
    }
}

/// Listing entry for an article within an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub id: String,
    /// Position within the issue, as given by the site.
    pub index: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub column: Option<String>,
    pub page_number: Option<String>,
}

impl fmt::Display for ArticleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() { write!(f, "article {}", self.id) } else { f.write_str(&self.title) }
    }
}

/// An image referenced by an article, kept as a remote link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Absolute URL on the site's static file server.
    pub url: String,
    /// Alternative text, empty when the markup has none.
    pub alt: String,
}

/// A fully fetched article.
///
/// `body_html` has had its images removed; they are listed in `images` in
/// document order instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub index: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub column: Option<String>,
    pub page_number: Option<String>,
    pub body_html: String,
    pub body_text: String,
    pub images: Vec<Image>,
}

impl Article {
    /// Fills fields the detail payload left empty from the listing entry.
    pub fn merge_summary(mut self, summary: &ArticleSummary) -> Self {
        if self.index.is_none() {
            self.index = summary.index.clone();
        }
        if self.title.is_empty() {
            self.title = summary.title.clone();
        }
        if self.author.is_none() {
            self.author = summary.author.clone();
        }
        if self.column.is_none() {
            self.column = summary.column.clone();
        }
        if self.page_number.is_none() {
            self.page_number = summary.page_number.clone();
        }
        self
    }

    /// Numeric position within the issue; missing or non-numeric sorts first.
    pub fn sort_key(&self) -> u64 {
        self.index.as_deref().and_then(|i| i.trim().parse().ok()).unwrap_or(0)
    }
}
