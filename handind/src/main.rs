//! handin portal daemon.
//!
//! Serves the course submission pages, runs the GitHub login flow and writes
//! one row per student into each course's worksheet.

#![forbid(unsafe_code)]

mod pages;
mod routes;
mod session;
mod state;
mod submit;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use handin_common::config::dotenv::load_dotenv;
use handin_common::config::validate::has_errors;
use handin_common::config::{CliOverrides, PortalConfig, Severity, validate_config};
use handin_common::identity::GitHubProvider;
use handin_common::probe::HttpProber;
use handin_common::retry::RetryPolicy;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use session::SessionStore;
use state::{PortalState, course_stores_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "handind")]
#[command(author, version, about = "handin daemon - course submission portal")]
struct Cli {
    /// Address to bind (default depends on HANDIN_PROFILE)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on [env: HANDIN_PORT, default 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Courses file (TOML)
    #[arg(short, long)]
    courses: Option<PathBuf>,

    /// .env file loaded before reading the environment
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    check_config: bool,
}

fn init_logging(verbose: bool, level: &str, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HANDIN_LOG").unwrap_or_else(|_| EnvFilter::new(level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Load and validate configuration; errors carry the catalog remediation.
fn load_config(cli: &Cli) -> Result<PortalConfig> {
    let overrides = CliOverrides {
        host: cli.host.clone(),
        port: cli.port,
        courses: cli.courses.clone(),
    };
    PortalConfig::load(&overrides).map_err(|err| {
        let entry = err.code().entry();
        anyhow::anyhow!(
            "{}: {err}\n  {}",
            entry.format_brief(),
            entry.remediation.join("\n  ")
        )
    })
}

fn report_config(config: &PortalConfig) -> Result<()> {
    let warnings = validate_config(config);
    for warning in &warnings {
        match warning.severity {
            Severity::Warning => warn!(field = %warning.field, "{}", warning.message),
            Severity::Error => error!(
                field = %warning.field,
                code = %warning.code.code_string(),
                "{}",
                warning.message
            ),
        }
    }
    if has_errors(&warnings) {
        let count = warnings.iter().filter(|w| w.is_error()).count();
        bail!("configuration has {count} error(s)");
    }
    Ok(())
}

async fn serve(config: PortalConfig) -> Result<()> {
    let courses = course_stores_for(&config)?;
    for runtime in &courses {
        info!(
            course = runtime.slug(),
            store = %runtime.store.describe(),
            secondary = runtime.course.has_secondary(),
            "Course ready"
        );
    }

    let state = PortalState::new(
        courses,
        SessionStore::new(config.profile.value.secure_cookies()),
        Arc::new(HttpProber::new()),
        Arc::new(GitHubProvider::new(config.oauth_client())),
        RetryPolicy::immediate(config.login_attempts.value),
        config.tz(),
    );
    let router = routes::create_router(Arc::new(state));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, profile = %config.profile.value, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Before any thread exists: loading .env mutates the environment.
    let dotenv_error = load_dotenv(Path::new(&cli.env_file)).err();

    let config = load_config(&cli)?;
    init_logging(cli.verbose, &config.log_level.value, cli.log_format);
    if let Some(e) = dotenv_error {
        warn!("Ignoring {}: {}", cli.env_file.display(), e);
    }

    info!("Starting handin daemon v{}", env!("CARGO_PKG_VERSION"));
    for line in config.describe() {
        info!("{line}");
    }
    report_config(&config)?;

    if cli.check_config {
        println!("configuration ok");
        return Ok(());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?
        .block_on(serve(config))
}
