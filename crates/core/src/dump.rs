//! JSON Lines dump of fetched articles.
//!
//! A batch export can append every article it fetched to a dump file, one
//! `{"issue": .., "article": ..}` record per line. [`read_dump`] groups the
//! records back into issues so the Markdown files can be rebuilt offline.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Article, Issue};
use crate::{ChinaLandError, Result};

#[derive(Serialize)]
struct RecordRef<'a> {
    issue: &'a Issue,
    article: &'a Article,
}

#[derive(Deserialize)]
struct Record {
    issue: Issue,
    article: Article,
}

fn write_error(path: &Path, source: io::Error) -> ChinaLandError {
    ChinaLandError::WriteError { path: path.to_path_buf(), source }
}

/// Creates an empty dump file, replacing any previous one.
pub fn start_dump(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
    }
    fs::write(path, "").map_err(|source| write_error(path, source))
}

/// Appends one record per article of `issue`.
pub fn append_dump(path: &Path, issue: &Issue, articles: &[Article]) -> Result<()> {
    let records = articles.iter().map(|article| RecordRef { issue, article });
    serde_jsonlines::append_json_lines(path, records).map_err(|source| write_error(path, source))?;
    debug!(path = %path.display(), issue = %issue, count = articles.len(), "articles dumped");
    Ok(())
}

/// Reads a dump back as issues with their articles.
///
/// Issues keep the order they first appear in. A later record for the same
/// article replaces the earlier one, and articles are sorted by index.
pub fn read_dump(path: &Path) -> Result<Vec<(Issue, Vec<Article>)>> {
    let records = serde_jsonlines::json_lines::<Record, _>(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ChinaLandError::NotFound(format!("dump file {}", path.display())),
        _ => ChinaLandError::ParseError(format!("cannot read dump {}: {}", path.display(), e)),
    })?;

    let mut groups: Vec<(Issue, Vec<Article>)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for (n, record) in records.enumerate() {
        let record = record
            .map_err(|e| ChinaLandError::ParseError(format!("{} record {}: {}", path.display(), n + 1, e)))?;
        let slot = *slots.entry(record.issue.id.clone()).or_insert_with(|| {
            groups.push((record.issue.clone(), Vec::new()));
            groups.len() - 1
        });

        let articles = &mut groups[slot].1;
        match articles.iter_mut().find(|a| a.id == record.article.id) {
            Some(existing) => *existing = record.article,
            None => articles.push(record.article),
        }
    }

    for (_, articles) in &mut groups {
        articles.sort_by_key(Article::sort_key);
    }
    Ok(groups)
}
