//! Session client for the archive site.
//!
//! [`JournalClient`] performs the anonymous login handshake and the three
//! listing calls (years, issues, articles) plus article detail fetching.
//! Every call is awaited to completion before the next one starts, and every
//! endpoint answers with the same JSON envelope:
//!
//! ```json
//! { "success": true, "message": null, "data": [ ... ] }
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::model::{Article, ArticleSummary, Issue, Year};
use crate::parse::{html_to_text, normalise_whitespace, parse_body};
use crate::{ChinaLandError, Result};

const LOGIN_PATH: &str = "/user/ipLogin";
const YEARS_PATH: &str = "/magazine/queryYearByColumn";
const ISSUES_PATH: &str = "/magazine/queryMagazineByColumn";
const ARTICLES_PATH: &str = "/magazine/getArticleByMagazineId";
const ARTICLE_PATH: &str = "/magazine/getArticleById";

/// Connection settings for the archive site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Site root.
    pub base_url: String,
    /// Column holding the journal.
    pub column_id: u32,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Pause after each listing or detail call, in milliseconds.
    pub delay_ms: u64,
    /// Uniform jitter applied to the pause, in milliseconds.
    pub jitter_ms: u64,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://szb.iziran.net".to_string(),
            column_id: 2,
            timeout: 15,
            delay_ms: 1500,
            jitter_ms: 300,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/127.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl ClientConfig {
    /// Config with pauses disabled.
    pub fn without_delay(mut self) -> Self {
        self.delay_ms = 0;
        self.jitter_ms = 0;
        self
    }
}

/// An anonymous session with the site.
///
/// Holds the HTTP client carrying the session cookies and identity header.
/// Obtained from [`JournalClient::login`] and read by every other call.
#[derive(Debug, Clone)]
pub struct Session {
    http: reqwest::Client,
    identity: String,
}

impl Session {
    /// Identity header value sent with every request of this session.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YearRecord {
    Text(String),
    Number(i64),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MagazineRecord {
    #[serde(default, deserialize_with = "text_or_number")]
    id: Option<String>,
    #[serde(default)]
    page_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleRecord {
    #[serde(default, deserialize_with = "text_or_number")]
    id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    index: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    title_html: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    author_html: Option<String>,
    #[serde(default)]
    column: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    page_number: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Accepts JSON strings and numbers, keeping both as text.
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Plain text of an optional HTML field, `None` when it has no text.
fn text_field(html: Option<&str>) -> Option<String> {
    html.map(html_to_text).filter(|t| !t.is_empty())
}

impl ArticleRecord {
    fn title(&self) -> String {
        text_field(self.title_html.as_deref())
            .or_else(|| text_field(self.title.as_deref()))
            .unwrap_or_default()
    }

    fn author(&self) -> Option<String> {
        text_field(self.author_html.as_deref()).or_else(|| text_field(self.author.as_deref()))
    }

    fn into_summary(self) -> Result<ArticleSummary> {
        let title = self.title();
        let author = self.author();
        let id = self
            .id
            .ok_or_else(|| ChinaLandError::ParseError(format!("article entry '{}' has no id", title)))?;

        Ok(ArticleSummary {
            id,
            index: self.index,
            title,
            author,
            column: text_field(self.column.as_deref()),
            page_number: self.page_number,
        })
    }

    fn into_article(self, requested_id: &str, base: &Url) -> Result<Article> {
        let title = self.title();
        let author = self.author();
        let body = parse_body(self.html.as_deref().unwrap_or_default(), base)?;
        let body_text = if body.text.is_empty() {
            normalise_whitespace(self.text.as_deref().unwrap_or_default())
        } else {
            body.text
        };

        if title.is_empty() && body_text.is_empty() && body.images.is_empty() {
            return Err(ChinaLandError::ParseError(format!(
                "article {} has neither title nor body",
                requested_id
            )));
        }

        Ok(Article {
            id: self.id.unwrap_or_else(|| requested_id.to_string()),
            index: self.index,
            title,
            author,
            column: text_field(self.column.as_deref()),
            page_number: self.page_number,
            body_html: body.html,
            body_text,
            images: body.images,
        })
    }
}

/// Client for the archive site's fixed endpoint set.
#[derive(Debug, Clone)]
pub struct JournalClient {
    config: ClientConfig,
    base: Url,
}

impl JournalClient {
    /// Creates a client, validating the configured site root.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ChinaLandError::ConfigError(format!("invalid base_url '{}': {}", config.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ChinaLandError::ConfigError(format!(
                "base_url must be http or https, got '{}'",
                config.base_url
            )));
        }

        Ok(Self { config, base })
    }

    /// Performs the anonymous login handshake.
    ///
    /// Any failure, including transport errors, is reported as
    /// [`ChinaLandError::AuthError`].
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn login(&self) -> Result<Session> {
        let identity = format!("crawler-{}", uuid::Uuid::new_v4());
        let http = self
            .build_http(&identity)
            .map_err(|e| ChinaLandError::AuthError(e.to_string()))?;
        let session = Session { http, identity };

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let query = [("rd", millis.to_string())];

        match self.request(&session, Method::GET, LOGIN_PATH, Some(&query), None).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ChinaLandError::AuthError("empty login response".to_string())),
            Err(e) => return Err(ChinaLandError::AuthError(e.to_string())),
        }

        info!(identity = %session.identity, "session established");
        self.pause().await;
        Ok(session)
    }

    /// Lists the years the journal has issues for, in site order.
    #[instrument(skip_all)]
    pub async fn list_years(&self, session: &Session) -> Result<Vec<Year>> {
        let form = [("columnId", self.config.column_id.to_string())];
        let envelope = self.request(session, Method::POST, YEARS_PATH, None, Some(&form)).await?;
        let records: Vec<YearRecord> = listing(envelope, "years")?;
        self.pause().await;

        let years = records
            .into_iter()
            .map(|record| match record {
                YearRecord::Text(label) => Year::new(label.trim()),
                YearRecord::Number(n) => Year::new(n.to_string()),
            })
            .collect::<Vec<_>>();
        debug!(count = years.len(), "years listed");
        Ok(years)
    }

    /// Lists the issues of a year, in site order.
    #[instrument(skip_all, fields(year = %year.label))]
    pub async fn list_issues(&self, session: &Session, year: &Year) -> Result<Vec<Issue>> {
        let form = [
            ("columnId", self.config.column_id.to_string()),
            ("year", year.id.clone()),
        ];
        let envelope = self.request(session, Method::POST, ISSUES_PATH, None, Some(&form)).await?;
        let records: Vec<MagazineRecord> = listing(envelope, &format!("issues of {}", year))?;
        self.pause().await;

        let issues = records
            .into_iter()
            .map(|record| {
                let id = record
                    .id
                    .ok_or_else(|| ChinaLandError::ParseError(format!("issue entry of {} has no id", year)))?;
                let title = text_field(record.title.as_deref()).or_else(|| text_field(record.subject.as_deref()));
                Ok(Issue {
                    id,
                    year: year.label.clone(),
                    label: record.page_name.unwrap_or_default().trim().to_string(),
                    title,
                    date: record.date,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(count = issues.len(), "issues listed");
        Ok(issues)
    }

    /// Lists the articles of an issue (title and id only), in site order.
    #[instrument(skip_all, fields(issue = %issue))]
    pub async fn list_articles(&self, session: &Session, issue: &Issue) -> Result<Vec<ArticleSummary>> {
        let form = [("magazineId", issue.id.clone())];
        let envelope = self.request(session, Method::POST, ARTICLES_PATH, None, Some(&form)).await?;
        let records: Vec<ArticleRecord> = listing(envelope, &format!("articles of {}", issue))?;
        self.pause().await;

        let articles = records
            .into_iter()
            .map(ArticleRecord::into_summary)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = articles.len(), "articles listed");
        Ok(articles)
    }

    /// Fetches an article's full body and image references.
    #[instrument(skip(self, session))]
    pub async fn fetch_article(&self, session: &Session, article_id: &str) -> Result<Article> {
        let form = [("articleId", article_id.to_string())];
        let envelope = self
            .request(session, Method::POST, ARTICLE_PATH, None, Some(&form))
            .await?
            .ok_or_else(|| ChinaLandError::ParseError(format!("article {}: empty response", article_id)))?;

        if !envelope.data.is_object() {
            return Err(ChinaLandError::ParseError(format!(
                "article {}: expected an object, got {}",
                article_id,
                kind_of(&envelope.data)
            )));
        }
        let record: ArticleRecord = serde_json::from_value(envelope.data)
            .map_err(|e| ChinaLandError::ParseError(format!("article {}: {}", article_id, e)))?;
        let article = record.into_article(article_id, &self.base)?;
        self.pause().await;

        debug!(images = article.images.len(), "article fetched");
        Ok(article)
    }

    fn build_http(&self, identity: &str) -> Result<reqwest::Client> {
        let origin = self.base.as_str().trim_end_matches('/').to_string();
        let referer = format!("{}/zazhi-pc/html/index.html?cid={}", origin, self.config.column_id);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("site"), HeaderValue::from_static("iziran"));
        headers.insert(HeaderName::from_static("brower_language"), HeaderValue::from_static("zh-CN"));
        headers.insert(HeaderName::from_static("screen"), HeaderValue::from_static("1080x1920"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(ORIGIN, header_value(&origin)?);
        headers.insert(REFERER, header_value(&referer)?);
        headers.insert(HeaderName::from_static("myidentity"), header_value(identity)?);

        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout))
            .user_agent(&self.config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(ChinaLandError::NetworkError)
    }

    /// Sends one request and decodes the envelope.
    ///
    /// Returns `None` when the site answers with an empty body.
    async fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        form: Option<&[(&str, String)]>,
    ) -> Result<Option<Envelope>> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ChinaLandError::ConfigError(format!("cannot build URL for {}: {}", path, e)))?;
        debug!(%method, %url, "sending request");

        let mut request = session.http.request(method, url);
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let response = response.error_for_status()?;
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if body.trim().is_empty() {
            debug!(path, "empty response body");
            return Ok(None);
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| ChinaLandError::ParseError(format!("{}: invalid JSON: {}", path, e)))?;

        if !envelope.success {
            return Err(ChinaLandError::ApiError {
                endpoint: path.to_string(),
                message: envelope.message.unwrap_or_else(|| "未知错误".to_string()),
            });
        }

        Ok(Some(envelope))
    }

    fn transport_error(&self, err: reqwest::Error) -> ChinaLandError {
        if err.is_timeout() {
            ChinaLandError::Timeout { timeout: self.config.timeout }
        } else {
            ChinaLandError::NetworkError(err)
        }
    }

    /// Sleeps for the configured delay plus jitter.
    async fn pause(&self) {
        let delay = pause_duration(self.config.delay_ms, self.config.jitter_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ChinaLandError::ConfigError(format!("invalid header value '{}': {}", value, e)))
}

/// Delay in `[delay - jitter, delay + jitter]`, never negative.
///
/// Values beyond `i64::MAX` milliseconds saturate.
fn pause_duration(delay_ms: u64, jitter_ms: u64) -> Duration {
    if delay_ms == 0 && jitter_ms == 0 {
        return Duration::ZERO;
    }
    let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
    let spread = i64::try_from(jitter_ms).unwrap_or(i64::MAX);
    let jitter = if spread == 0 { 0 } else { rand::rng().random_range(-spread..=spread) };
    let millis = delay.saturating_add(jitter).max(0);
    Duration::from_millis(millis.unsigned_abs())
}

/// Decodes the `data` array of a listing envelope.
///
/// Missing data, an empty array and an empty response body all count as an
/// empty listing.
fn listing<T: DeserializeOwned>(envelope: Option<Envelope>, what: &str) -> Result<Vec<T>> {
    let Some(envelope) = envelope else {
        return Err(ChinaLandError::EmptyResult(format!("{}: empty response", what)));
    };

    match envelope.data {
        Value::Null => Err(ChinaLandError::EmptyResult(format!("{}: no data", what))),
        Value::Array(items) if items.is_empty() => Err(ChinaLandError::EmptyResult(what.to_string())),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|e| ChinaLandError::ParseError(format!("{}: {}", what, e)))
            })
            .collect(),
        other => Err(ChinaLandError::ParseError(format!(
            "{}: expected a list, got {}",
            what,
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(data: Value) -> Option<Envelope> {
        Some(Envelope { success: true, message: None, data })
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://szb.iziran.net");
        assert_eq!(config.column_id, 2);
        assert_eq!(config.timeout, 15);
        assert!(config.user_agent.contains("Chrome"));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig { base_url: "not a url".to_string(), ..Default::default() };
        assert!(matches!(JournalClient::new(config), Err(ChinaLandError::ConfigError(_))));

        let config = ClientConfig { base_url: "ftp://example.com".to_string(), ..Default::default() };
        assert!(matches!(JournalClient::new(config), Err(ChinaLandError::ConfigError(_))));
    }

    #[test]
    fn test_listing_empty_variants() {
        let empty: Result<Vec<YearRecord>> = listing(None, "years");
        assert!(matches!(empty, Err(ChinaLandError::EmptyResult(_))));

        let null: Result<Vec<YearRecord>> = listing(envelope(Value::Null), "years");
        assert!(matches!(null, Err(ChinaLandError::EmptyResult(_))));

        let array: Result<Vec<YearRecord>> = listing(envelope(json!([])), "years");
        assert!(matches!(array, Err(ChinaLandError::EmptyResult(_))));
    }

    #[test]
    fn test_listing_wrong_shape() {
        let result: Result<Vec<YearRecord>> = listing(envelope(json!({"year": "2025"})), "years");
        assert!(matches!(result, Err(ChinaLandError::ParseError(_))));
    }

    #[test]
    fn test_year_records_accept_numbers() {
        let records: Vec<YearRecord> = listing(envelope(json!(["2025", 2024])), "years").unwrap();
        assert!(matches!(&records[0], YearRecord::Text(s) if s == "2025"));
        assert!(matches!(records[1], YearRecord::Number(2024)));
    }

    #[test]
    fn test_article_record_prefers_html_fields() {
        let record: ArticleRecord = serde_json::from_value(json!({
            "id": 42,
            "index": 3,
            "title": "plain",
            "titleHtml": "<b>耕地</b>保护",
            "authorHtml": "<span>张三</span>",
            "pageNumber": 12,
        }))
        .unwrap();
        let summary = record.into_summary().unwrap();
        assert_eq!(summary.id, "42");
        assert_eq!(summary.index.as_deref(), Some("3"));
        assert_eq!(summary.title, "耕地保护");
        assert_eq!(summary.author.as_deref(), Some("张三"));
        assert_eq!(summary.page_number.as_deref(), Some("12"));
    }

    #[test]
    fn test_article_record_text_fallback() {
        let base = Url::parse("http://szb.iziran.net").unwrap();
        let record: ArticleRecord =
            serde_json::from_value(json!({"title": "标题", "html": "", "text": "  纯文本正文  "})).unwrap();
        let article = record.into_article("a9", &base).unwrap();
        assert_eq!(article.id, "a9");
        assert_eq!(article.body_text, "纯文本正文");
        assert!(article.images.is_empty());
    }

    #[test]
    fn test_article_record_without_content() {
        let base = Url::parse("http://szb.iziran.net").unwrap();
        let record: ArticleRecord = serde_json::from_value(json!({"id": "a1"})).unwrap();
        assert!(matches!(record.into_article("a1", &base), Err(ChinaLandError::ParseError(_))));
    }

    #[test]
    fn test_pause_duration_bounds() {
        assert_eq!(pause_duration(0, 0), Duration::ZERO);
        assert_eq!(pause_duration(100, 0), Duration::from_millis(100));
        for _ in 0..50 {
            let d = pause_duration(100, 300);
            assert!(d <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_pause_duration_saturates() {
        let max = Duration::from_millis(i64::MAX.unsigned_abs());
        assert_eq!(pause_duration(u64::MAX, 0), max);
        for _ in 0..20 {
            assert!(pause_duration(u64::MAX, u64::MAX) <= max);
            assert!(pause_duration(0, u64::MAX) <= max);
        }
    }
}
