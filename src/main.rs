//! `devserve` command line.
//!
//! Serves the demo application on a TCP address or a Unix socket path:
//!
//! ```text
//! devserve 127.0.0.1:8000 --threaded
//! devserve /tmp/app.sock --reload --extra-file templates/
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use devserve::config::{load_config, validate_config, ConfigError, DevServerConfig, ReloaderType, TlsConfig};
use devserve::demo::demo_app;
use devserve::observability::init_logging;
use devserve::ServeError;

#[derive(Parser)]
#[command(name = "devserve")]
#[command(about = "Development HTTP server for TCP addresses and Unix sockets", long_about = None)]
struct Cli {
    /// `host:port` to listen on, or a filesystem path for a Unix socket
    address: Option<String>,

    /// TOML configuration file; command line flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Handle each connection on its own task
    #[arg(long)]
    threaded: bool,

    /// Handle up to this many connections at once
    #[arg(long)]
    processes: Option<usize>,

    /// Restart the server when the executable or an extra file changes
    #[arg(long)]
    reload: bool,

    /// Change detection backend for the reloader
    #[arg(long, value_parser = ["notify", "poll"])]
    reloader_type: Option<String>,

    /// Polling interval for the reloader, in milliseconds
    #[arg(long)]
    reloader_interval_ms: Option<u64>,

    /// Additional file or directory to watch (repeatable)
    #[arg(long = "extra-file", value_name = "PATH")]
    extra_files: Vec<PathBuf>,

    /// Render application errors as a debugging page
    #[arg(long)]
    debugger: bool,

    /// Stop the server on the first application error instead of answering 500
    #[arg(long)]
    passthrough_errors: bool,

    /// Serve files from DIR under URL PREFIX (repeatable)
    #[arg(long = "static", value_name = "PREFIX=DIR", value_parser = parse_static)]
    static_files: Vec<(String, PathBuf)>,

    /// TLS certificate (PEM), TCP only
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// TLS private key (PEM), TCP only
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_static(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((prefix, dir)) if !prefix.is_empty() && !dir.is_empty() => {
            Ok((prefix.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected PREFIX=DIR, got {value:?}")),
    }
}

fn build_config(cli: Cli) -> Result<DevServerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DevServerConfig::default(),
    };

    if let Some(address) = cli.address {
        config.address = address;
    }

    config.server.threaded |= cli.threaded;
    if let Some(processes) = cli.processes {
        config.server.processes = processes;
    }
    config.server.passthrough_errors |= cli.passthrough_errors;
    if let (Some(cert_path), Some(key_path)) = (cli.cert, cli.key) {
        config.server.tls = Some(TlsConfig { cert_path, key_path });
    }

    config.middleware.use_debugger |= cli.debugger;
    config.middleware.static_files.extend(cli.static_files);

    config.reloader.enabled |= cli.reload;
    match cli.reloader_type.as_deref() {
        Some("poll") => config.reloader.kind = ReloaderType::Poll,
        Some("notify") => config.reloader.kind = ReloaderType::Notify,
        _ => {}
    }
    if let Some(interval_ms) = cli.reloader_interval_ms {
        config.reloader.interval_ms = interval_ms;
    }
    config.reloader.extra_files.extend(cli.extra_files);

    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match build_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            let e = ServeError::from(e);
            eprintln!("Error: {e}");
            return exit_code(&e);
        }
    };

    init_logging(&config.observability);

    let address = config.address.clone();
    match devserve::run_simple(&address, Arc::new(demo_app), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            exit_code(&e)
        }
    }
}

fn exit_code(error: &ServeError) -> ExitCode {
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}
