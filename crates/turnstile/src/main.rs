use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use turnstile::config::{Config, ConfigError};
use turnstile::format::{Unit, format_duration};
use turnstile::gate::Gate;
use turnstile::TurnstileServer;
use turnstile_log::{DiagnosticLayer, DiagnosticLog};
use turnstile_session::hash_password;

#[derive(Parser)]
#[command(name = "turnstile", version, about = "Session-authenticated HTTP API server")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read a password from stdin and print its Argon2id hash for the
    /// `users` section of the configuration.
    HashPassword,
}

/// Loads the configuration. A missing file is not an error: the defaults
/// are used and `true` is returned so the caller can warn once logging is
/// up.
fn load_config(path: &Path) -> Result<(Config, bool), ConfigError> {
    match Config::load(path) {
        Ok(config) => Ok((config, false)),
        Err(ConfigError::NotFound(_)) => Ok((Config::default(), true)),
        Err(e) => Err(e),
    }
}

fn print_password_hash(config: &Config) -> ExitCode {
    let mut password = String::new();
    if let Err(e) = std::io::stdin().lock().read_line(&mut password) {
        eprintln!("turnstile: reading password: {e}");
        return ExitCode::FAILURE;
    }
    let password = password.trim_end_matches(['\r', '\n']);

    match hash_password(password, &config.crypto.argon) {
        Ok(phc) => {
            println!("{phc}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("turnstile: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Re-reads the configuration file and applies what can change while
/// running: the log level and the user table. Users whose credentials
/// changed are logged out.
fn reload(path: &Path, current: &mut Config, log: &DiagnosticLog, gate: &Gate) {
    let next = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "reload failed, keeping current configuration");
            return;
        }
    };
    next.trace_dump();

    log.set_level(next.log.level);
    current.log = next.log;
    match gate.reload_users(current, &next) {
        Ok(revoked) => {
            tracing::info!(
                level = %next.log.level,
                users = next.users.len(),
                revoked,
                "configuration reloaded"
            );
            *current = next;
        }
        Err(e) => tracing::error!(error = %e, "reload: keeping current users"),
    }
}

#[cfg(unix)]
fn hangup_signal() -> std::io::Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
}

#[tokio::main]
async fn main() -> ExitCode {
    let started = Instant::now();
    let cli = Cli::parse();

    let (config, defaulted) = match load_config(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("turnstile: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(Command::HashPassword) = cli.command {
        return print_password_hash(&config);
    }

    let log = match DiagnosticLog::new(config.log.into()) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            eprintln!("turnstile: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(DiagnosticLayer::new(Arc::clone(&log)))
        .init();

    log.register_shutdown_hook(move || {
        tracing::info!(uptime = %format_duration(started.elapsed(), Unit::Secs), "shutdown");
    });

    if defaulted {
        tracing::warn!(path = %cli.config.display(), "configuration file not found, using defaults");
    }
    config.trace_dump();
    let mut current = config.clone();

    let server = match TurnstileServer::builder().config(config).build().await {
        Ok(server) => server,
        Err(e) => log.fatal(format_args!("cannot start server: {e}")),
    };
    let gate = Arc::clone(server.gate());

    let server_log = Arc::clone(&log);
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            server_log.fatal(format_args!("server stopped: {e}"));
        }
    });

    #[cfg(unix)]
    let mut hangup = match hangup_signal() {
        Ok(signal) => signal,
        Err(e) => log.fatal(format_args!("cannot install SIGHUP handler: {e}")),
    };

    loop {
        #[cfg(unix)]
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log.fatal(format_args!("cannot listen for interrupt: {e}"));
                }
                log.fatal("caught interrupt, shutting down");
            }
            _ = hangup.recv() => {
                tracing::info!("caught hangup, reloading configuration");
                reload(&cli.config, &mut current, &log, &gate);
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log.fatal(format_args!("cannot listen for interrupt: {e}"));
            }
            log.fatal("caught interrupt, shutting down");
        }
    }
}
