use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tabula_client::{ReqwestFetcher, ScraperParser};
use tabula_core::{
    ColumnRule, Job, JobRunner, JobSpec, OutputFormat, Outcome, RowSet, ScrapeConfig,
    SinkRegistry,
};

#[derive(Parser)]
#[command(name = "tabula", version, about = "Column-rule web scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one page into rows, one column per rule
    Scrape {
        /// Target URL to scrape
        #[arg(short, long, required_unless_present = "job")]
        url: Option<String>,

        /// Column rule, repeatable: "text:<css> || <fallback>" or "attr:<name>:<css>"
        #[arg(
            short = 'c',
            long = "column",
            value_name = "RULE",
            required_unless_present = "job"
        )]
        columns: Vec<ColumnRule>,

        /// Path to a JSON job description (url, selectors, save_format)
        #[arg(short, long, conflicts_with_all = ["url", "columns"])]
        job: Option<PathBuf>,

        /// Output format for --output (csv or json)
        #[arg(short, long)]
        format: Option<String>,

        /// Save rows to this file instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Give up waiting for the job after this many seconds
        #[arg(long, env = "TABULA_JOB_TIMEOUT_SECS", default_value_t = 120)]
        timeout: u64,

        /// Poll cadence in milliseconds (overrides TABULA_POLL_INTERVAL_MS)
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// User-Agent header (overrides TABULA_USER_AGENT)
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// List the registered output formats
    Formats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tabula=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            url,
            columns,
            job,
            format,
            output,
            timeout,
            poll_interval_ms,
            user_agent,
        } => {
            let mut config = ScrapeConfig::from_env().context("Invalid configuration")?;
            if let Some(ms) = poll_interval_ms {
                if ms == 0 {
                    bail!("--poll-interval-ms must be positive");
                }
                config = config.with_poll_interval(Duration::from_millis(ms));
            }
            if let Some(agent) = user_agent {
                config = config.with_user_agent(agent);
            }

            let job = build_job(url, columns, job.as_deref(), format)?;
            cmd_scrape(job, &config, output.as_deref(), Duration::from_secs(timeout)).await?;
        }
        Commands::Formats => {
            for format in SinkRegistry::builtin().formats() {
                println!("{format}");
            }
        }
    }

    Ok(())
}

/// Build the job from either a JSON job file or the command-line rules.
fn build_job(
    url: Option<String>,
    columns: Vec<ColumnRule>,
    job_file: Option<&Path>,
    format: Option<String>,
) -> Result<Job> {
    if let Some(path) = job_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;
        let mut spec = JobSpec::from_json(&text).context("Invalid job file")?;
        if let Some(format) = format {
            spec.save_format = format;
        }
        return Ok(spec.into_job()?);
    }

    let url = url.context("--url is required unless --job is given")?;
    let format = match format {
        Some(name) => name.parse::<OutputFormat>()?,
        None => OutputFormat::default(),
    };
    Ok(Job::new(url, columns, format)?)
}

async fn cmd_scrape(
    job: Job,
    config: &ScrapeConfig,
    output: Option<&Path>,
    timeout: Duration,
) -> Result<()> {
    let format = job.output_format();
    let fetcher = ReqwestFetcher::from_config(config).context("Failed to create HTTP client")?;
    let mut runner = JobRunner::new(fetcher, ScraperParser);

    tracing::info!("Scraping {} ({} columns)", job.url(), job.rules().len());
    runner.submit(job)?;

    let outcome = poll_outcome(&mut runner, config.poll_interval, timeout).await?;

    let rows = match outcome {
        Outcome::Success { rows } => rows,
        Outcome::Failure { kind, message } => bail!("Scrape failed ({kind}): {message}"),
    };

    if rows.is_empty() {
        println!("No elements found with the provided selectors.");
        return Ok(());
    }

    match output {
        Some(path) => {
            SinkRegistry::builtin()
                .save(&rows, format.as_str(), path)
                .with_context(|| format!("Failed to save results to {}", path.display()))?;
            println!("Saved {} rows to {}", rows.len(), path.display());
        }
        None => print_rows(&rows),
    }

    Ok(())
}

/// Check the runner once per tick until the outcome arrives or `timeout` passes.
///
/// On timeout the job is abandoned; it finishes in the background and its
/// outcome is dropped.
async fn poll_outcome(
    runner: &mut JobRunner<ReqwestFetcher, ScraperParser>,
    every: Duration,
    timeout: Duration,
) -> Result<Outcome> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(outcome) = runner.poll() {
            return Ok(outcome);
        }
        if tokio::time::Instant::now() >= deadline {
            if let Some(handle) = runner.abandon() {
                tracing::warn!(job_id = %handle.job_id(), url = %handle.url(), "Giving up on job");
            }
            bail!("Job did not finish within {}s", timeout.as_secs());
        }
    }
}

fn print_rows(rows: &RowSet) {
    for row in rows {
        let line = row
            .iter()
            .map(|cell| cell.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(": ");
        println!("{line}");
    }
}
