//! Session client and Markdown exporter for the *中国土地* journal archive.
//!
//! The pipeline is linear: [`JournalClient`] logs in and lists years, issues
//! and articles; [`Catalog`] keeps the session and listing caches of a run;
//! [`export`] renders articles as Markdown and writes one file per issue;
//! [`batch`] walks years and issues with best-effort error handling and can
//! keep a [`dump`] of every fetched article for offline rebuilds.
//!
//! ```no_run
//! use chinaland_core::{ArticleSource, Catalog, ClientConfig, ExportConfig, JournalClient, export_year};
//! use std::path::Path;
//!
//! # async fn run() -> chinaland_core::Result<()> {
//! let client = JournalClient::new(ClientConfig::default())?;
//! let mut catalog = Catalog::open(client).await?;
//! let year = catalog.find_year("2025").await?;
//! let report = export_year(&mut catalog, &year, Path::new("out"), &ExportConfig::default()).await;
//! for failure in &report.failures {
//!     eprintln!("{failure}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dump;
pub mod error;
pub mod export;
pub mod model;
pub mod parse;

pub use batch::{BatchReport, ExportFailure, export_all, export_article, export_from_dump, export_issue, export_year};
pub use catalog::{ArticleSource, Catalog};
pub use client::{ClientConfig, JournalClient, Session};
pub use config::{default_config_path, load_config};
pub use dump::{append_dump, read_dump, start_dump};
pub use error::{ChinaLandError, Result};
pub use export::{
    DEFAULT_PREFIX, ExportConfig, ExportLayout, issue_file_name, render_article, render_issue, write_article_markdown,
    write_issue_markdown,
};
pub use model::{Article, ArticleSummary, Image, Issue, Year};
