mod run;
mod session;

use anyhow::{Context, Result};
use chapterbind_acquire::{FetchConfig, HttpClient, RetryPolicy, BROWSER_USER_AGENT};
use chapterbind_bind::{Pipeline, PipelineConfig};
use clap::{Args, Parser, Subcommand};
use run::{Input, StopSignal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "chapterbind")]
#[command(about = "Download the chapters of a web serial and bind each into a PDF")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Commands {
    /// List the chapters of a title in reading order
    List {
        /// URL of the title's chapter listing
        #[arg(short, long)]
        url: String,

        /// Print the chapters as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        net: NetArgs,
    },

    /// Download chapters and bind each one into a PDF
    Download {
        /// URL of the title's chapter listing (prompted for when omitted)
        #[arg(short, long)]
        url: Option<String>,

        /// Download every chapter without asking
        #[arg(long, conflicts_with = "chapter")]
        all: bool,

        /// Download only the chapter with this exact name (e.g., "Chapter 12")
        #[arg(short, long)]
        chapter: Option<String>,

        /// Directory receiving the PDFs and transient page workspaces
        #[arg(short = 'O', long, default_value = ".")]
        output_dir: PathBuf,

        /// Maximum number of page images fetched at once
        #[arg(long, default_value_t = 8)]
        concurrency: usize,

        /// JPEG quality (1-100) used when normalizing pages
        #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,

        /// Keep the page workspace of a chapter that failed
        #[arg(long)]
        keep_failed: bool,

        #[command(flatten)]
        net: NetArgs,
    },
}

#[derive(Args)]
struct NetArgs {
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Retries for failed requests (exponential backoff from 500ms)
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// User-Agent header sent with every request
    #[arg(long, default_value = BROWSER_USER_AGENT)]
    user_agent: String,
}

impl NetArgs {
    fn client(&self) -> Result<HttpClient> {
        HttpClient::new(&self.user_agent, Duration::from_secs(self.timeout_secs))
            .context("Failed to build HTTP client")
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            ..RetryPolicy::default()
        }
    }
}

fn init_logging(level: &LogLevel, utc: bool) {
    // Keep HTML-parsing internals quiet at debug/trace
    let level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z".to_string();

    if utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format))
            .init();
    }
}

/// First Ctrl-C stops new chapters from starting; a second one exits.
fn install_interrupt_handler(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if *tx.borrow() {
                std::process::exit(130);
            }
            tracing::warn!("Interrupted: finishing the current chapter (Ctrl-C again to exit now)");
            let _ = tx.send(true);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.utc);

    match cli.command {
        Commands::List { url, json, net } => {
            let config = PipelineConfig {
                fetch: FetchConfig {
                    retry: net.retry(),
                    ..FetchConfig::default()
                },
                ..PipelineConfig::default()
            };
            let pipeline = Pipeline::new(Arc::new(net.client()?), config);
            let chapters = pipeline
                .discover(&url)
                .await
                .with_context(|| format!("Failed to list chapters at {url}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&chapters)?);
            } else {
                for chapter in &chapters {
                    println!("{}\t{}", chapter.display_name(), chapter.source_url());
                }
            }
        }
        Commands::Download {
            url,
            all,
            chapter,
            output_dir,
            concurrency,
            quality,
            keep_failed,
            net,
        } => {
            let (tx, mut stop) = StopSignal::channel();
            install_interrupt_handler(tx);

            let wanted = chapter.clone();
            let mut input = if all {
                Input::scripted(["1"])
            } else if let Some(name) = chapter {
                Input::scripted(["3".to_string(), name])
            } else {
                Input::interactive()
            };

            let url = match url {
                Some(url) => url,
                None if input.is_interactive() => {
                    match input.next_token("Enter the URL of the title: ", &mut stop).await? {
                        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
                        _ => anyhow::bail!("No listing URL given"),
                    }
                }
                None => anyhow::bail!("--url is required with --all or --chapter"),
            };

            let config = PipelineConfig {
                output_root: output_dir,
                fetch: FetchConfig {
                    concurrency,
                    jpeg_quality: quality,
                    retry: net.retry(),
                },
                keep_failed,
            };
            tracing::info!(
                url = %url,
                output_dir = %config.output_root.display(),
                concurrency,
                "Starting download session"
            );

            let pipeline = Pipeline::new(Arc::new(net.client()?), config);
            let chapters = pipeline
                .discover(&url)
                .await
                .with_context(|| format!("Failed to list chapters at {url}"))?;
            if chapters.is_empty() {
                tracing::warn!(url = %url, "No chapters found");
                return Ok(());
            }
            if let Some(name) = &wanted {
                anyhow::ensure!(
                    chapters.iter().any(|c| c.display_name() == name.as_str()),
                    "Chapter '{name}' not found at {url}"
                );
            }

            let interactive = input.is_interactive();
            let summary = run::run_session(&pipeline, chapters, &mut input, &mut stop).await?;

            for (chapter, err) in &summary.failed {
                tracing::error!(
                    chapter = %chapter.display_name(),
                    url = %chapter.source_url(),
                    kind = err.kind(),
                    "Not downloaded"
                );
            }
            if !interactive && !summary.failed.is_empty() {
                anyhow::bail!("{} chapter(s) failed", summary.failed.len());
            }
        }
    }

    Ok(())
}
