//! Best-effort export over issues, years and the whole archive.
//!
//! Upstream rate limits make large exports unreliable, so a failure on one
//! issue or article is recorded in the [`BatchReport`] and the walk moves on.
//! Nothing is retried.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::catalog::ArticleSource;
use crate::dump::{append_dump, read_dump};
use crate::export::{ExportConfig, ExportLayout, write_article_markdown, write_issue_markdown};
use crate::model::{Article, ArticleSummary, Issue, Year};
use crate::{ChinaLandError, Result};

/// A failure recorded during a batch export.
#[derive(Debug)]
pub struct ExportFailure {
    /// What was being exported, e.g. `2025 第10期`.
    pub scope: String,
    pub error: ChinaLandError,
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.error)
    }
}

/// Outcome of a batch export.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files written, in export order.
    pub written: Vec<PathBuf>,
    /// Failures, in the order they happened.
    pub failures: Vec<ExportFailure>,
}

impl BatchReport {
    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Appends another report. A path written by both is a failure.
    pub fn merge(&mut self, other: BatchReport) {
        for path in other.written {
            let scope = path.display().to_string();
            self.record(path, scope);
        }
        self.failures.extend(other.failures);
    }

    /// Records a written file, failing when an earlier step wrote the same path.
    fn record(&mut self, path: PathBuf, scope: impl Into<String>) {
        if self.written.contains(&path) {
            let source = io::Error::new(io::ErrorKind::AlreadyExists, "overwrote the file of an earlier export");
            self.fail(scope, ChinaLandError::WriteError { path, source });
        } else {
            self.written.push(path);
        }
    }

    fn fail(&mut self, scope: impl Into<String>, error: ChinaLandError) {
        let scope = scope.into();
        warn!(%scope, %error, "export step failed");
        self.failures.push(ExportFailure { scope, error });
    }
}

/// Exports one article to its own file.
pub async fn export_article<S: ArticleSource>(
    source: &mut S,
    issue: &Issue,
    summary: &ArticleSummary,
    dir: &Path,
    config: &ExportConfig,
) -> Result<PathBuf> {
    let article = source.article(summary).await?;
    write_article_markdown(issue, &article, dir, &config.prefix)
}

/// Exports one issue.
///
/// Articles that fail to load are reported and left out; the rest are still
/// written.
pub async fn export_issue<S: ArticleSource>(
    source: &mut S,
    issue: &Issue,
    dir: &Path,
    config: &ExportConfig,
) -> BatchReport {
    let mut report = BatchReport::default();
    let scope = issue.to_string();

    let summaries = match source.articles(issue).await {
        Ok(summaries) => summaries,
        Err(e) => {
            report.fail(scope, e);
            return report;
        }
    };

    let mut articles = Vec::with_capacity(summaries.len());
    for summary in &summaries {
        match source.article(summary).await {
            Ok(article) => articles.push(article),
            Err(e) => report.fail(format!("{} / {}", scope, summary), e),
        }
    }
    articles.sort_by_key(Article::sort_key);

    if articles.is_empty() {
        return report;
    }

    if let Some(dump) = &config.dump {
        if let Err(e) = append_dump(dump, issue, &articles) {
            report.fail(format!("{} (dump)", scope), e);
        }
    }

    report.merge(write_articles(issue, &articles, dir, config));
    info!(issue = %scope, written = report.written.len(), failed = report.failures.len(), "issue exported");
    report
}

/// Writes already fetched articles of one issue in the configured layout.
fn write_articles(issue: &Issue, articles: &[Article], dir: &Path, config: &ExportConfig) -> BatchReport {
    let mut report = BatchReport::default();
    let scope = issue.to_string();

    match config.layout {
        ExportLayout::Issue => match write_issue_markdown(issue, articles, dir) {
            Ok(path) => report.record(path, scope),
            Err(e) => report.fail(scope, e),
        },
        ExportLayout::Article => {
            for article in articles {
                let scope = format!("{} / {}", scope, article.title);
                match write_article_markdown(issue, article, dir, &config.prefix) {
                    Ok(path) => report.record(path, scope),
                    Err(e) => report.fail(scope, e),
                }
            }
        }
    }
    report
}

/// Rebuilds Markdown files from a dump written by an earlier batch export.
///
/// No request is sent. An unreadable dump is an error; write failures are
/// recorded in the report.
pub fn export_from_dump(dump: &Path, dir: &Path, config: &ExportConfig) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for (issue, articles) in read_dump(dump)? {
        if articles.is_empty() {
            continue;
        }
        report.merge(write_articles(&issue, &articles, dir, config));
    }
    info!(dump = %dump.display(), written = report.written.len(), "dump exported");
    Ok(report)
}

/// Exports every issue of a year.
pub async fn export_year<S: ArticleSource>(
    source: &mut S,
    year: &Year,
    dir: &Path,
    config: &ExportConfig,
) -> BatchReport {
    let mut report = BatchReport::default();

    let issues = match source.issues(year).await {
        Ok(issues) => issues,
        Err(e) => {
            report.fail(year.to_string(), e);
            return report;
        }
    };

    for issue in &issues {
        report.merge(export_issue(source, issue, dir, config).await);
    }
    report
}

/// Exports every issue of every year.
pub async fn export_all<S: ArticleSource>(source: &mut S, dir: &Path, config: &ExportConfig) -> BatchReport {
    let mut report = BatchReport::default();

    let years = match source.years().await {
        Ok(years) => years,
        Err(e) => {
            report.fail("years", e);
            return report;
        }
    };

    for year in &years {
        report.merge(export_year(source, year, dir, config).await);
    }
    report
}
