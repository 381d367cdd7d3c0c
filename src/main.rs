use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use infraprobe::assertion::file::AssertionsFile;
use infraprobe::client::{ResourceClient, ResourceKind};
use infraprobe::config::Config;
use infraprobe::declaration::Declaration;
use infraprobe::engine::Engine;
use infraprobe::gcp::client::{GcpOptions, GcpResourceClient};
use infraprobe::report::{self, Report, EXIT_LOAD_ERROR, EXIT_PASSED};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Assert declared infrastructure state against live cloud resources
#[derive(Parser, Debug)]
#[command(name = "infraprobe", version, about, long_about = None)]
struct Cli {
    /// Log level for debugging (written to the log file, never stdout)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate an assertions file against live resources
    Run(RunArgs),
    /// List the resource kinds assertions can select
    Kinds,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Declared outputs (e.g. `terraform output -json > output.json`)
    #[arg(short, long)]
    input: PathBuf,

    /// Assertions file (YAML or JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// GCP project to query
    #[arg(short, long)]
    project: Option<String>,

    /// Override the API base URL
    #[arg(long)]
    api_base: Option<String>,

    /// Evaluate assertions concurrently
    #[arg(long)]
    parallel: bool,

    /// Worker count in parallel mode (default: one per assertion, at most 8)
    #[arg(long)]
    workers: Option<usize>,

    /// Deadline for the whole run, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("infraprobe started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("infraprobe").join("infraprobe.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".infraprobe").join("infraprobe.log");
    }
    PathBuf::from("infraprobe.log")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load();

    let level = cli
        .log_level
        .or_else(|| {
            config
                .log_level
                .as_deref()
                .and_then(|s| LogLevel::from_str(s, true).ok())
        })
        .unwrap_or(LogLevel::Off);
    let log_guard = setup_logging(level);

    let code = match cli.command {
        Command::Kinds => {
            for kind in ResourceKind::ALL {
                println!("{kind}");
            }
            EXIT_PASSED
        }
        Command::Run(args) => match run(args, &config).await {
            Ok(code) => code,
            Err(err) => {
                tracing::error!("Aborted before evaluation: {:#}", err);
                eprintln!("Error: {err:#}");
                EXIT_LOAD_ERROR
            }
        },
    };

    // flush the non-blocking writer before exiting
    drop(log_guard);
    std::process::exit(code);
}

/// Load everything, evaluate, print the report. Errors returned from here
/// happen before any assertion has run.
async fn run(args: RunArgs, config: &Config) -> Result<i32> {
    let declaration = Declaration::load(&args.input)?;
    let file = AssertionsFile::load(&args.config)?;
    let assertions = file.build(&declaration)?;
    let settings = &file.settings;

    let mut engine = Engine::new().with_retry(settings.retry.to_policy()?);
    if args.parallel || settings.parallel {
        engine = engine.parallel(args.workers.or(settings.workers));
    }
    if let Some(timeout) = args.timeout.map(Duration::from_secs).or(settings.timeout()) {
        engine = engine.with_timeout(timeout);
    }

    let project = config
        .effective_project(args.project.as_deref(), settings.project.as_deref())
        .unwrap_or_default();
    let needs_project = assertions
        .iter()
        .any(|a| a.selector.kind != ResourceKind::Bucket);
    if project.is_empty() && needs_project {
        bail!("No GCP project configured. Set GOOGLE_CLOUD_PROJECT, use --project, or set settings.project");
    }

    let options = GcpOptions::new(&project).with_api_base(
        config.effective_api_base(args.api_base.as_deref(), settings.api_base.as_deref()),
    );
    let client = GcpResourceClient::new(options)
        .await
        .context("Failed to create GCP client")?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    tracing::info!(
        "Run {} started: {} assertions, project {}",
        run_id,
        assertions.len(),
        project
    );

    let results = engine.evaluate(&assertions, &client).await;
    let summary = report::summarize(&results);

    tracing::info!(
        "Run {} finished: {} passed, {} failed",
        run_id,
        summary.passed,
        summary.failed
    );

    match args.format {
        OutputFormat::Text => print!("{}", report::render_text(&results, &summary)),
        OutputFormat::Json => {
            let report = Report {
                run_id,
                started_at,
                provider: client.name(),
                summary,
                results: &results,
            };
            println!("{}", report::render_json(&report)?);
        }
    }

    Ok(summary.exit_code)
}
