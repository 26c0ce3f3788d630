mod echo;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chinaland_core::{
    ArticleSource, BatchReport, Catalog, ClientConfig, DEFAULT_PREFIX, ExportConfig, ExportLayout, JournalClient,
    export_all, export_article, export_from_dump, export_issue, export_year, load_config, render_article, start_dump,
};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use echo::{print_banner, print_info, print_report, print_step, print_success};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Browse the 中国土地 journal archive and export issues to Markdown
#[derive(Parser, Debug)]
#[command(name = "chinaland")]
#[command(version)]
#[command(about = "Browse the 中国土地 journal archive and export issues to Markdown", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config dir>/chinaland/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site root of the archive
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Pause between requests in milliseconds (0 disables pauses)
    #[arg(long, global = true, value_name = "MS")]
    delay_ms: Option<u64>,

    /// File name prefix for per-article exports
    #[arg(long, global = true, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the years with published issues
    Years,

    /// List the issues of a year
    Issues {
        /// Year label, e.g. 2025
        year: String,
    },

    /// List the articles of an issue
    Articles {
        year: String,
        /// Issue label (第10期), title or 1-based position
        issue: String,
    },

    /// Print one article as Markdown
    Show {
        year: String,
        issue: String,
        /// Article id, index, title or 1-based position
        article: String,
    },

    /// Export articles, issues or years to Markdown files
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },

    /// Generate a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ExportTarget {
    /// Export one article to its own file
    Article {
        year: String,
        issue: String,
        article: String,

        /// Output directory
        #[arg(short, long, default_value = ".", value_name = "DIR")]
        output: PathBuf,
    },

    /// Export one issue
    Issue {
        year: String,
        issue: String,

        #[command(flatten)]
        output: OutputArgs,

        /// Also write every fetched article to this JSON Lines file
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Export every issue of a year
    Year {
        year: String,

        #[command(flatten)]
        output: OutputArgs,

        /// Also write every fetched article to this JSON Lines file
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Export the whole archive
    All {
        #[command(flatten)]
        output: OutputArgs,

        /// Also write every fetched article to this JSON Lines file
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Rebuild Markdown files from a dump, without contacting the site
    FromJsonl {
        /// Dump written by --dump
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output directory
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    output: PathBuf,

    /// One file per issue, or one file per article
    #[arg(long, value_enum, default_value_t = Layout::Issue)]
    layout: Layout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Layout {
    Issue,
    Article,
}

impl From<Layout> for ExportLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Issue => ExportLayout::Issue,
            Layout::Article => ExportLayout::Article,
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "chinaland=debug,chinaland_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Configuration file and environment, then command-line overrides.
fn client_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.delay_ms = delay_ms;
        if delay_ms == 0 {
            config.jitter_ms = 0;
        }
    }

    Ok(config)
}

fn export_config(prefix: &str, layout: Layout) -> ExportConfig {
    ExportConfig { prefix: prefix.to_string(), layout: layout.into(), dump: None }
}

/// Export settings for a batch, starting a fresh dump file when asked.
fn batch_config(prefix: &str, output: &OutputArgs, dump: Option<PathBuf>) -> anyhow::Result<ExportConfig> {
    if let Some(path) = &dump {
        start_dump(path).with_context(|| format!("Failed to create dump {}", path.display()))?;
    }
    Ok(ExportConfig { dump, ..export_config(prefix, output.layout) })
}

/// Rebuilds issue files from a dump.
fn rebuild_from_dump(input: &Path, output: &OutputArgs, prefix: &str) -> anyhow::Result<()> {
    let report = export_from_dump(input, &output.output, &export_config(prefix, output.layout))
        .with_context(|| format!("Failed to read dump {}", input.display()))?;
    finish(&report)
}

/// Prints the report and fails when any step failed.
fn finish(report: &BatchReport) -> anyhow::Result<()> {
    print_report(report);
    if !report.is_clean() {
        bail!("{} export step(s) failed", report.failures.len());
    }
    if report.written.is_empty() {
        print_info("Nothing to export");
    }
    Ok(())
}

async fn run(catalog: &mut Catalog, command: Command, prefix: &str) -> anyhow::Result<()> {
    match command {
        Command::Years => {
            for year in catalog.years().await.context("Failed to list years")? {
                println!("{}", year.label);
            }
        }
        Command::Issues { year } => {
            let year = catalog.find_year(&year).await?;
            let issues = catalog.issues(&year).await.context("Failed to list issues")?;
            for (i, issue) in issues.iter().enumerate() {
                let title = issue.title.as_deref().unwrap_or_default();
                let date = issue.date.as_deref().unwrap_or_default();
                println!("{:>3}  {}  {}  {}", i + 1, issue.label, title, date.dimmed());
            }
        }
        Command::Articles { year, issue } => {
            let year = catalog.find_year(&year).await?;
            let issue = catalog.find_issue(&year, &issue).await?;
            let articles = catalog.articles(&issue).await.context("Failed to list articles")?;
            for (i, article) in articles.iter().enumerate() {
                let index = article.index.clone().unwrap_or_else(|| (i + 1).to_string());
                let author = article.author.as_deref().unwrap_or_default();
                println!("{:>3}  {}  {}", index, article.title, author.dimmed());
            }
        }
        Command::Show { year, issue, article } => {
            let year = catalog.find_year(&year).await?;
            let issue = catalog.find_issue(&year, &issue).await?;
            let summary = catalog.find_article(&issue, &article).await?;
            let article = catalog
                .article(&summary)
                .await
                .with_context(|| format!("Failed to fetch article {}", summary))?;
            println!("{}", render_article(&article));
        }
        Command::Export { target } => match target {
            ExportTarget::Article { year, issue, article, output } => {
                let year = catalog.find_year(&year).await?;
                let issue = catalog.find_issue(&year, &issue).await?;
                let summary = catalog.find_article(&issue, &article).await?;
                let config = export_config(prefix, Layout::Article);
                let path = export_article(catalog, &issue, &summary, &output, &config)
                    .await
                    .with_context(|| format!("Failed to export {}", summary))?;
                print_success(&format!("Wrote {}", path.display().bright_white()));
            }
            ExportTarget::Issue { year, issue, output, dump } => {
                let year = catalog.find_year(&year).await?;
                let issue = catalog.find_issue(&year, &issue).await?;
                let config = batch_config(prefix, &output, dump)?;
                finish(&export_issue(catalog, &issue, &output.output, &config).await)?;
            }
            ExportTarget::Year { year, output, dump } => {
                let year = catalog.find_year(&year).await?;
                let config = batch_config(prefix, &output, dump)?;
                finish(&export_year(catalog, &year, &output.output, &config).await)?;
            }
            ExportTarget::All { output, dump } => {
                let config = batch_config(prefix, &output, dump)?;
                finish(&export_all(catalog, &output.output, &config).await)?;
            }
            ExportTarget::FromJsonl { input, output } => rebuild_from_dump(&input, &output, prefix)?,
        },
        // handled before login
        Command::Completions { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let prefix = cli.prefix.clone().unwrap_or_else(|| DEFAULT_PREFIX.to_string());

    match &cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "chinaland", &mut io::stdout());
            return Ok(());
        }
        Command::Export { target: ExportTarget::FromJsonl { input, output } } => {
            return rebuild_from_dump(input, output, &prefix);
        }
        _ => {}
    }

    if cli.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let config = client_config(&cli)?;

    if cli.verbose {
        print_step(1, 2, &format!("Logging in to {}", config.base_url.bright_white().underline()));
    }
    let client = JournalClient::new(config).context("Invalid client configuration")?;
    let mut catalog = Catalog::open(client).await.context("Login failed")?;

    if cli.verbose {
        print_step(2, 2, "Querying archive");
    }
    run(&mut catalog, cli.command, &prefix).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_issue() {
        let cli = Cli::try_parse_from(["chinaland", "export", "issue", "2025", "第10期", "-o", "out", "--layout", "article"])
            .unwrap();
        match cli.command {
            Command::Export { target: ExportTarget::Issue { year, issue, output, dump } } => {
                assert_eq!(year, "2025");
                assert_eq!(issue, "第10期");
                assert_eq!(output.output, PathBuf::from("out"));
                assert_eq!(output.layout, Layout::Article);
                assert_eq!(dump, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_from_jsonl() {
        let cli = Cli::try_parse_from(["chinaland", "export", "from-jsonl", "dump.jsonl", "-o", "out"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Export { target: ExportTarget::FromJsonl { ref input, .. } } if input == Path::new("dump.jsonl")
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["chinaland", "years", "--delay-ms", "0", "--base-url", "http://localhost:1"])
            .unwrap();
        assert_eq!(cli.delay_ms, Some(0));
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:1"));
    }

    #[test]
    fn test_delay_zero_disables_jitter() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let cli = Cli::try_parse_from([
            "chinaland",
            "--config",
            path.to_str().unwrap(),
            "--delay-ms",
            "0",
            "--timeout",
            "3",
            "years",
        ])
        .unwrap();

        let config = client_config(&cli).unwrap();
        assert_eq!(config.delay_ms, 0);
        assert_eq!(config.jitter_ms, 0);
        assert_eq!(config.timeout, 3);
    }
}
