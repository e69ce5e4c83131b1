use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use ta_limits::aws::http::format_aws_error;
use ta_limits::config::Config;
use ta_limits::service::{self, LimitOverride, LimitedService};
use ta_limits::TrustedAdvisor;
use tracing_subscriber::EnvFilter;

/// Apply Trusted Advisor service limits to a set of known services
#[derive(Parser, Debug)]
#[command(name = "ta-limits", version, about, long_about = None)]
struct Args {
    /// YAML file: service name -> limit name -> default value
    #[arg(short, long)]
    services: PathBuf,

    /// Region whose advisory rows are applied
    #[arg(short, long)]
    region: Option<String>,

    /// AWS profile to use
    #[arg(short, long)]
    profile: Option<String>,

    /// Support API endpoint override
    #[arg(long)]
    endpoint: Option<String>,

    /// Fail on malformed advisory rows instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Pin a limit regardless of the advisory value (repeatable)
    #[arg(long = "override", value_name = "SERVICE/LIMIT=N")]
    overrides: Vec<LimitOverride>,

    /// Store region, profile, endpoint and --strict as the new defaults
    #[arg(long)]
    save_config: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
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
    fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(directive) = level.directive() else {
        return Ok(None);
    };

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_thread_ids(false)
        .init();

    tracing::info!("ta-limits started with log level: {:?}", level);
    Ok(Some(guard))
}

fn print_limits(services: &HashMap<String, LimitedService>) -> std::io::Result<()> {
    let mut names: Vec<&String> = services.keys().collect();
    names.sort();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{:<16} {:<48} {:>8} {:>9} {:>9}",
        "SERVICE", "LIMIT", "DEFAULT", "ADVISORY", "EFFECTIVE"
    )?;
    for name in names {
        for limit in services[name].limits() {
            let advisory = limit
                .advisory
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                out,
                "{:<16} {:<48} {:>8} {:>9} {:>9}",
                name,
                limit.name,
                limit.default,
                advisory,
                limit.effective()
            )?;
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load().merge_cli(args.region, args.profile, args.endpoint, args.strict);
    if args.save_config {
        config.save().context("Failed to save config")?;
        tracing::info!("Saved config to {:?}", Config::config_path());
    }

    let mut services = service::load_registry(&args.services)?;
    service::apply_overrides(&mut services, &args.overrides)?;

    let mut advisor =
        TrustedAdvisor::new(config.session_options()).with_row_policy(config.row_policy());
    advisor.update_limits(&mut services).await?;

    print_limits(&services)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = match setup_logging(args.log_level, args.log_file.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {}", format_aws_error(&e));
        drop(log_guard);
        std::process::exit(1);
    }
}
