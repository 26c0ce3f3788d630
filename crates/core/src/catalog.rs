//! Session-scoped browsing context.
//!
//! A [`Catalog`] owns the client, the current [`Session`] and the in-memory
//! caches of everything listed so far. Callers pass it explicitly to every
//! lookup instead of sharing mutable state.
//!
//! A transport failure or timeout invalidates the session. The failed call
//! still returns its error; the next call logs in again before it is sent.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::client::{JournalClient, Session};
use crate::model::{Article, ArticleSummary, Issue, Year};
use crate::{ChinaLandError, Result};

/// Source of archive content, walked by the batch exporter.
///
/// [`Catalog`] is the network-backed implementation.
#[allow(async_fn_in_trait)]
pub trait ArticleSource {
    /// All years, in site order.
    async fn years(&mut self) -> Result<Vec<Year>>;

    /// Issues of a year, in site order.
    async fn issues(&mut self, year: &Year) -> Result<Vec<Issue>>;

    /// Article listing of an issue, in site order.
    async fn articles(&mut self, issue: &Issue) -> Result<Vec<ArticleSummary>>;

    /// Full article for a listing entry.
    async fn article(&mut self, summary: &ArticleSummary) -> Result<Article>;
}

/// Client, session and listing caches for one run.
///
/// Article bodies are not cached.
#[derive(Debug)]
pub struct Catalog {
    client: JournalClient,
    session: Session,
    stale: bool,
    years: Option<Vec<Year>>,
    issues: HashMap<String, Vec<Issue>>,
    articles: HashMap<String, Vec<ArticleSummary>>,
}

impl Catalog {
    /// Wraps an existing session.
    pub fn new(client: JournalClient, session: Session) -> Self {
        Self {
            client,
            session,
            stale: false,
            years: None,
            issues: HashMap::new(),
            articles: HashMap::new(),
        }
    }

    /// Logs in and returns a catalog for the new session.
    pub async fn open(client: JournalClient) -> Result<Self> {
        let session = client.login().await?;
        Ok(Self::new(client, session))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// True after a transport failure, until the next successful login.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replaces the session and drops every cached listing.
    ///
    /// On failure the previous session and caches are kept.
    pub async fn relogin(&mut self) -> Result<()> {
        let session = self.client.login().await?;
        self.session = session;
        self.stale = false;
        self.years = None;
        self.issues.clear();
        self.articles.clear();
        info!("session renewed, caches cleared");
        Ok(())
    }

    /// Logs in again when the last call lost the session.
    async fn ensure_session(&mut self) -> Result<()> {
        if self.stale {
            self.relogin().await?;
        }
        Ok(())
    }

    /// Marks the session stale when `result` is a transport failure.
    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e @ (ChinaLandError::NetworkError(_) | ChinaLandError::Timeout { .. })) = &result {
            warn!(error = %e, "session invalidated");
            self.stale = true;
        }
        result
    }

    /// Finds a year by label.
    pub async fn find_year(&mut self, key: &str) -> Result<Year> {
        let key = key.trim();
        self.years()
            .await?
            .into_iter()
            .find(|year| year.label == key || year.id == key)
            .ok_or_else(|| ChinaLandError::NotFound(format!("year '{}'", key)))
    }

    /// Finds an issue of a year by id, label, title or 1-based position.
    pub async fn find_issue(&mut self, year: &Year, key: &str) -> Result<Issue> {
        let key = key.trim();
        let issues = self.issues(year).await?;

        let found = issues
            .iter()
            .find(|issue| issue.id == key || issue.label == key)
            .or_else(|| issues.iter().find(|issue| issue.title.as_deref().map(str::trim) == Some(key)))
            .or_else(|| position(key).and_then(|i| issues.get(i)));

        found
            .cloned()
            .ok_or_else(|| ChinaLandError::NotFound(format!("issue '{}' in {}", key, year)))
    }

    /// Finds an article of an issue by id, index, title or 1-based position.
    pub async fn find_article(&mut self, issue: &Issue, key: &str) -> Result<ArticleSummary> {
        let key = key.trim();
        let articles = self.articles(issue).await?;

        let found = articles
            .iter()
            .find(|article| article.id == key)
            .or_else(|| articles.iter().find(|article| article.index.as_deref() == Some(key)))
            .or_else(|| articles.iter().find(|article| article.title == key))
            .or_else(|| position(key).and_then(|i| articles.get(i)));

        found
            .cloned()
            .ok_or_else(|| ChinaLandError::NotFound(format!("article '{}' in {}", key, issue)))
    }
}

/// Zero-based position for a 1-based numeric key.
fn position(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|n| *n > 0).map(|n| n - 1)
}

impl ArticleSource for Catalog {
    async fn years(&mut self) -> Result<Vec<Year>> {
        if let Some(years) = &self.years {
            return Ok(years.clone());
        }
        self.ensure_session().await?;
        let result = self.client.list_years(&self.session).await;
        let years = self.observe(result)?;
        self.years = Some(years.clone());
        Ok(years)
    }

    async fn issues(&mut self, year: &Year) -> Result<Vec<Issue>> {
        if let Some(issues) = self.issues.get(&year.id) {
            debug!(year = %year, "issues served from cache");
            return Ok(issues.clone());
        }
        self.ensure_session().await?;
        let result = self.client.list_issues(&self.session, year).await;
        let issues = self.observe(result)?;
        self.issues.insert(year.id.clone(), issues.clone());
        Ok(issues)
    }

    async fn articles(&mut self, issue: &Issue) -> Result<Vec<ArticleSummary>> {
        if let Some(articles) = self.articles.get(&issue.id) {
            debug!(issue = %issue, "articles served from cache");
            return Ok(articles.clone());
        }
        self.ensure_session().await?;
        let result = self.client.list_articles(&self.session, issue).await;
        let articles = self.observe(result)?;
        self.articles.insert(issue.id.clone(), articles.clone());
        Ok(articles)
    }

    async fn article(&mut self, summary: &ArticleSummary) -> Result<Article> {
        self.ensure_session().await?;
        let result = self.client.fetch_article(&self.session, &summary.id).await;
        Ok(self.observe(result)?.merge_summary(summary))
    }
}
