use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use scholar_fetch::config::{
    find_config_file, load_config, write_default_config, ENV_PREFIX, LOCAL_CONFIG_FILE,
};
use scholar_fetch::dispatch::{DispatchResponse, DispatchStatus, SearchDispatcher};
use scholar_fetch::download::DownloadEngine;
use scholar_fetch::models::{DocumentId, DownloadOutcome, DownloadRequest, PaperRecord, RecordKind};
use scholar_fetch::sources::SourceRegistry;
use scholar_fetch::ui::{
    format_file_size, print_search_header, print_section, print_status, source_icon,
    truncate_with_ellipsis, DownloadBar, Spinner, Status,
};
use scholar_fetch::utils::{detect_identifier, CancelFlag};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scholar Fetch - Search academic sources and download papers through mirrors
#[derive(Parser, Debug)]
#[command(name = "scholar-fetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search academic sources and download papers through mirrors", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Download directory (overrides the configuration)
    #[arg(long, short, global = true)]
    dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Show all environment variables
    #[arg(long)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for papers by query string
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Source to search (id or name, e.g. arxiv, "Google Scholar", sci-hub)
        #[arg(long, short, default_value = "arxiv")]
        source: String,

        /// Search every source
        #[arg(long, conflicts_with = "source")]
        all: bool,

        /// Maximum number of results
        #[arg(long, short)]
        max_results: Option<usize>,

        /// Download the Nth result (1-based) after searching
        #[arg(long, value_name = "N")]
        download: Option<usize>,
    },

    /// Download a document from one or more URLs, tried in order
    #[command(alias = "d")]
    Download {
        /// Candidate URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Title used for the file name
        #[arg(long, short)]
        title: Option<String>,

        /// DOI of the document (names the file and adds mirror fallbacks)
        #[arg(long, conflicts_with = "arxiv")]
        doi: Option<String>,

        /// arXiv id of the document
        #[arg(long)]
        arxiv: Option<String>,
    },

    /// Resolve a DOI or arXiv id and download it
    #[command(alias = "f")]
    Fetch {
        /// DOI, DOI link, arXiv id or arXiv link
        identifier: String,

        /// Title used for the file name
        #[arg(long, short)]
        title: Option<String>,
    },

    /// Show the URLs a DOI or arXiv id resolves to
    Mirrors {
        /// DOI, DOI link, arXiv id or arXiv link
        identifier: String,
    },

    /// List available sources
    Sources,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Target path (default: ./scholar-fetch.toml)
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Print all available environment variables
fn print_env_vars() {
    println!("Scholar Fetch - Environment Variables");
    println!();
    println!("Configuration overrides (nested keys joined with __):");
    println!("  {}__DOWNLOADS__DIRECTORY              Download directory (default: ./downloads)", ENV_PREFIX);
    println!("  {}__DOWNLOADS__MIN_PDF_BYTES          Minimum PDF size (default: 1024)", ENV_PREFIX);
    println!("  {}__DOWNLOADS__MIN_MIRROR_PDF_BYTES   Minimum PDF size from mirrors (default: 10000)", ENV_PREFIX);
    println!("  {}__DOWNLOADS__INTER_ATTEMPT_DELAY_MS Pause between candidate URLs (default: 2000)", ENV_PREFIX);
    println!("  {}__HTTP__USER_AGENT                  User-Agent header", ENV_PREFIX);
    println!("  {}__HTTP__ACCEPT_LANGUAGE             Accept-Language header", ENV_PREFIX);
    println!("  {}__MIRRORS__DOWNLOAD                 Comma-separated mirror hosts", ENV_PREFIX);
    println!("  {}__SOURCES__MAX_RESULTS              Results per source (default: 20)", ENV_PREFIX);
    println!();
    println!("API Keys:");
    println!("  SEMANTIC_SCHOLAR_API_KEY    API key for Semantic Scholar (higher rate limits)");
    println!();
    println!("Proxy Settings:");
    println!("  HTTP_PROXY                  HTTP proxy URL (e.g., http://proxy:8080)");
    println!("  HTTPS_PROXY                 HTTPS proxy URL (socks5:// is supported)");
    println!("  NO_PROXY                    Comma-separated list of hosts to bypass proxy");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Rust logging level (e.g., debug, info, warn, error)");
}

fn init_tracing(verbose: u8, quiet: bool, json: bool) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = if quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("scholar_fetch={}", env_filter)),
        ))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Cancel `flag` when the user presses Ctrl-C
fn cancel_on_ctrl_c(flag: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} cancelling, waiting for in-flight requests...", "⚠".yellow());
            flag.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet, cli.log_json);

    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let mut config = load_config(config_path.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = &cli.dir {
        config.downloads.directory = dir.clone();
    }

    let format = resolve_format(cli.output);
    let interactive = std::io::stdout().is_terminal() && !cli.quiet;
    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Search {
            query,
            source,
            all,
            max_results,
            download,
        } => {
            if let Some(n) = max_results {
                config.sources.max_results = n.max(1);
            }
            let dispatcher = SearchDispatcher::from_config(&config)?;

            let spinner = if interactive {
                Spinner::new(&format!("Searching for \"{}\"", query))
            } else {
                Spinner::hidden()
            };
            let started = Instant::now();
            let responses = if all {
                dispatcher.dispatch_all(&query, &cancel).await
            } else {
                vec![dispatcher.dispatch(&query, &source, &cancel).await]
            };
            spinner.finish_and_clear();

            if let [only] = responses.as_slice() {
                if only.status == DispatchStatus::Unsupported {
                    bail!(
                        "unsupported source '{}'. Available sources: {}",
                        source,
                        dispatcher.registry().ids().join(", ")
                    );
                }
            }

            output_responses(&responses, format, started.elapsed().as_secs_f64())?;

            if let Some(index) = download {
                let records: Vec<&PaperRecord> =
                    responses.iter().flat_map(|r| r.records()).collect();
                let record = index
                    .checked_sub(1)
                    .and_then(|i| records.get(i))
                    .ok_or_else(|| anyhow!("no result #{} to download ({} results)", index, records.len()))?;
                if record.kind != RecordKind::Paper {
                    tracing::warn!("Result #{} is not a paper, trying its link anyway", index);
                }

                let engine = DownloadEngine::from_config(&config)?;
                let request = engine.resolver().request_for_record(record);
                run_download(&engine, &request, format, interactive, &cancel).await?;
            }
        }

        Commands::Download {
            urls,
            title,
            doi,
            arxiv,
        } => {
            let identifier = doi.map(DocumentId::Doi).or(arxiv.map(DocumentId::Arxiv));
            let mut request = DownloadRequest::new(urls, title.unwrap_or_default());
            if let Some(id) = identifier {
                request = request.with_identifier(id);
            }

            let engine = DownloadEngine::from_config(&config)?;
            run_download(&engine, &request, format, interactive, &cancel).await?;
        }

        Commands::Fetch { identifier, title } => {
            let id = parse_identifier(&identifier)?;
            let engine = DownloadEngine::from_config(&config)?;
            let request = engine
                .resolver()
                .request_for(&id, title.as_deref().unwrap_or_default());
            if format != OutputFormat::Json && !cli.quiet {
                print_status(Status::Info, &format!("Resolved {}", id));
            }
            run_download(&engine, &request, format, interactive, &cancel).await?;
        }

        Commands::Mirrors { identifier } => {
            let id = parse_identifier(&identifier)?;
            let engine = DownloadEngine::from_config(&config)?;
            let candidates = engine.resolver().resolve(&id);
            let fallbacks = engine.resolver().fallback_links(&id);

            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "identifier": id,
                        "candidates": candidates,
                        "fallback_links": fallbacks,
                    }))?
                ),
                _ => {
                    print_section(&id.to_string());
                    for (i, url) in candidates.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, url);
                    }
                    println!();
                    for url in &fallbacks {
                        println!("  {} {}", "→".dimmed(), url.cyan());
                    }
                }
            }
        }

        Commands::Sources => {
            let registry = SourceRegistry::from_config(&config);
            output_sources(&registry, format)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                let path = path.unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE));
                write_default_config(&path, force)?;
                print_status(
                    Status::Success,
                    &format!("Wrote default configuration to {}", path.display()),
                );
            }
        },
    }

    Ok(())
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn parse_identifier(input: &str) -> Result<DocumentId> {
    detect_identifier(input)
        .ok_or_else(|| anyhow!("'{}' is neither a DOI nor an arXiv id", input))
}

async fn run_download(
    engine: &DownloadEngine,
    request: &DownloadRequest,
    format: OutputFormat,
    interactive: bool,
    cancel: &CancelFlag,
) -> Result<()> {
    let bar = if interactive {
        DownloadBar::new(&request.suggested_filename)
    } else {
        DownloadBar::hidden()
    };
    let outcome = engine.download(request, &bar, cancel).await;
    bar.finish_and_clear();

    output_outcome(&outcome, format)?;
    match outcome.reason() {
        None => Ok(()),
        Some(reason) => bail!("download failed: {}", reason),
    }
}

fn output_responses(responses: &[DispatchResponse], format: OutputFormat, secs: f64) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(responses)?);
        }
        OutputFormat::Plain => {
            let mut index = 0;
            for response in responses {
                println!("# {} [{}]", source_label(response), response.message);
                for record in response.records() {
                    index += 1;
                    println!("{}. {} - {} ({})", index, record.title, record.authors, record.year);
                    println!("   URL: {}", record.primary_url);
                    if let Some(pdf) = &record.pdf_url {
                        println!("   PDF: {}", pdf);
                    }
                    if let Some(doi) = record.doi() {
                        println!("   DOI: {}", doi);
                    }
                    if record.is_notice() {
                        println!("   {}", record.abstract_text);
                    }
                }
                println!();
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            let mut index = 0;
            for response in responses {
                let Some(source) = response.source else {
                    print_status(Status::Error, &response.message);
                    continue;
                };
                print_search_header(
                    &response.query,
                    source,
                    response.result.records().iter().filter(|r| r.is_paper()).count(),
                    std::time::Duration::from_secs_f64(secs),
                );

                match response.status {
                    DispatchStatus::SoftError | DispatchStatus::Cancelled => {
                        print_status(Status::Warning, &response.message);
                        continue;
                    }
                    DispatchStatus::Empty => {
                        print_status(Status::Info, &response.message);
                        continue;
                    }
                    _ => {}
                }

                let mut table = Table::new();
                table.load_preset(comfy_table::presets::UTF8_FULL);
                table.set_header(vec!["#", "Title", "Authors", "Year", "Link"]);
                for record in response.records() {
                    index += 1;
                    let title = truncate_with_ellipsis(&record.title, 60);
                    let title = match record.kind {
                        RecordKind::Paper => Cell::new(title).add_attribute(Attribute::Bold),
                        RecordKind::Notice => Cell::new(title).fg(Color::Yellow),
                        RecordKind::Alternate => Cell::new(title).fg(Color::DarkGrey),
                    };
                    table.add_row(vec![
                        Cell::new(index),
                        title,
                        Cell::new(truncate_with_ellipsis(&record.authors, 30)),
                        Cell::new(&record.year),
                        Cell::new(truncate_with_ellipsis(
                            record.pdf_url.as_deref().unwrap_or(&record.primary_url),
                            60,
                        )),
                    ]);
                }
                println!("{table}");

                for notice in response.records().iter().filter(|r| r.is_notice()) {
                    print_status(Status::Warning, &notice.abstract_text);
                }
            }
        }
    }
    Ok(())
}

fn source_label(response: &DispatchResponse) -> String {
    response
        .source
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| "unknown source".to_string())
}

fn output_outcome(outcome: &DownloadOutcome, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        DownloadOutcome::Success {
            file_path,
            bytes_written,
            url,
        } => {
            print_status(
                Status::Success,
                &format!(
                    "Saved {} ({})",
                    file_path.display().to_string().green(),
                    format_file_size(*bytes_written)
                ),
            );
            println!("  from {}", url.dimmed());
        }
        DownloadOutcome::Failure {
            reason,
            message,
            attempted_urls,
            alternate_links,
        } => {
            print_status(Status::Error, &format!("{}: {}", reason, message));
            if !attempted_urls.is_empty() {
                println!("  Tried:");
                for url in attempted_urls {
                    println!("    {}", url.dimmed());
                }
            }
            if !alternate_links.is_empty() {
                println!("  Try by hand:");
                for url in alternate_links {
                    println!("    {}", url.cyan());
                }
            }
        }
    }
    Ok(())
}

fn output_sources(registry: &SourceRegistry, format: OutputFormat) -> Result<()> {
    let sources = registry.all();
    match format {
        OutputFormat::Json => {
            let list: Vec<_> = sources
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id(),
                        "name": s.name(),
                        "network": s.uses_network(),
                        "soft_blocking": s.is_soft_blocking(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        OutputFormat::Plain => {
            for source in sources {
                println!("{}\t{}", source.id(), source.name());
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["", "ID", "Name", "Network", "Soft blocking"]);
            for source in sources {
                table.add_row(vec![
                    Cell::new(source_icon(source.source_type())),
                    Cell::new(source.id()).add_attribute(Attribute::Bold),
                    Cell::new(source.name()),
                    Cell::new(if source.uses_network() { "yes" } else { "links only" }),
                    Cell::new(if source.is_soft_blocking() { "yes" } else { "" }),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
