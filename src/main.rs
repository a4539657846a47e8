//! Coursescan - Canvas course audit and conclude tool
//!
//! Audits the wiki front pages of the courses of one term and subject,
//! writes a JSON or CSV report, and optionally concludes the courses of a
//! second term afterwards.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (credentials, config, fetch failure, etc.) or interrupt
//!   2 - Conclude pass finished but some courses could not be concluded

mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod workflow;

use anyhow::{Context, Result};
use api::HttpCanvasClient;
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{CourseFilter, Report, ReportMetadata};
use pipeline::WorkerPool;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use workflow::ConcludeWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may come from a .env file
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Coursescan v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: term={:?} subject={:?} catalog={:?}", args.term, args.subject, args.catalog);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .coursescan.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to change the output directory, concurrency, and cooldown.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the audit and conclude passes. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    debug!("Config: {:?}", config);

    // Missing credentials stop the run before any request is made.
    let settings = config.api_settings(args.token.as_deref(), args.api_url.as_deref())?;
    info!("Canvas API: {}", settings.base_url);
    let api = Arc::new(HttpCanvasClient::new(settings)?);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    let pool = WorkerPool::new(config.general.concurrency).with_cancellation(cancel.clone());

    let output_dir = Path::new(&config.general.output_dir);

    let audited = match args.audit_filter() {
        Some(filter) => {
            run_audit(Arc::clone(&api), &filter, &pool, &config, output_dir, args.quiet).await?;
            true
        }
        None => false,
    };

    let Some(filter) = args.conclude_filter() else {
        return Ok(0);
    };

    if cancel.is_cancelled() {
        warn!("Interrupted, skipping the conclude pass");
        return Ok(1);
    }

    if audited && config.workflow.cooldown_seconds > 0 {
        println!(
            "\n⏳ Waiting {}s before the conclude pass...",
            config.workflow.cooldown_seconds
        );
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.workflow.cooldown_seconds)) => {}
            _ = cancel.cancelled() => {
                warn!("Interrupted during cooldown, skipping the conclude pass");
                return Ok(1);
            }
        }
    }

    run_conclude(api, &filter, pool, &config, output_dir).await
}

/// Audit the courses matching `filter` and write the report.
async fn run_audit(
    api: Arc<HttpCanvasClient>,
    filter: &CourseFilter,
    pool: &WorkerPool,
    config: &Config,
    output_dir: &Path,
    quiet: bool,
) -> Result<()> {
    let start_time = Instant::now();

    println!("🔎 Auditing courses for {}", filter);
    println!("   Concurrency: {}", pool.concurrency());

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        pb
    };

    let data = pipeline::audit_courses(
        api,
        filter,
        pool,
        |total| progress.set_length(total as u64),
        |_| progress.inc(1),
    )
    .await;
    progress.finish_and_clear();
    let data = data?;

    let report = Report {
        metadata: ReportMetadata {
            term: filter.term.clone(),
            subject: filter.subject.clone(),
            catalog: filter.catalog.clone(),
            generated_at: Utc::now(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        data,
    };

    let path = report::write_report(&report, output_dir, config.general.format)?;

    println!("\n📊 Audit Summary:");
    for line in analysis::generate_summary_text(&report.data).lines() {
        println!("   {}", line);
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("\n✅ Audit complete! Report saved to: {}", path.display());
    Ok(())
}

/// Conclude the courses matching `filter`. Returns the exit code.
async fn run_conclude(
    api: Arc<HttpCanvasClient>,
    filter: &CourseFilter,
    pool: WorkerPool,
    config: &Config,
    output_dir: &Path,
) -> Result<i32> {
    let dry_run = config.workflow.dry_run;
    if dry_run {
        println!("\n🔍 Dry run: concluding nothing for {}", filter);
    } else {
        println!("\n📦 Concluding courses for {}", filter);
    }

    let cancel = pool.cancellation().clone();
    let report = ConcludeWorkflow::new(api, pool)
        .dry_run(dry_run)
        .run(filter)
        .await?;
    let path = report::write_conclude_report(&report, output_dir)?;

    println!("\n📊 Conclude Summary:");
    if dry_run {
        println!("   Would conclude: {}", report.would_conclude);
    } else {
        println!("   Concluded: {}", report.concluded);
    }
    println!("   Already concluded: {}", report.skipped);
    println!("   Failed: {}", report.failed);

    if cancel.is_cancelled() {
        println!("   Not attempted: {}", report.not_attempted);
        eprintln!(
            "\n⛔ Conclude pass interrupted. Record saved to: {}",
            path.display()
        );
        return Ok(1);
    }

    println!("\n✅ Conclude pass complete! Record saved to: {}", path.display());

    if report.failed > 0 {
        eprintln!(
            "\n⛔ {} course(s) could not be concluded (exit code 2).",
            report.failed
        );
        return Ok(2);
    }
    Ok(0)
}

/// First Ctrl-C cancels outstanding work; a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after in-flight requests (Ctrl-C again to exit)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n❌ Aborted");
            std::process::exit(130);
        }
    });
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
