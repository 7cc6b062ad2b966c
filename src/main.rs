use std::{sync::Arc, time::Duration};

use email_sender_app::build_application;
use email_sender_lettre::{ConfigError, LettreMailTransport, SmtpConfig};
use email_sender_mcp_api::{protocol::ServerInfo, server::ServerError};
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime::Runtime;

mod logs;

const SERVER_NAME: &str = "EmailSender";

/// Stdin is read on a blocking thread that can't be interrupted, so the
/// runtime must not wait for it on the way out.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum RunError {
    #[error("failed to load .env file: {0}")]
    Env(#[from] dotenvy::Error),
    #[error("invalid SMTP configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to create SMTP transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("MCP server failed: {0}")]
    Server(#[from] ServerError),
}

impl RunError {
    fn during_startup(&self) -> bool {
        !matches!(self, RunError::Server(_))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Finishing in-flight requests...");
}

async fn run(dotenv: Result<std::path::PathBuf, dotenvy::Error>) -> Result<(), RunError> {
    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => info!("No .env file found, using process environment"),
        Err(e) => return Err(e.into()),
    }

    let config = SmtpConfig::from_env()?;
    let mail_transport = Arc::new(LettreMailTransport::new(config)?);
    let app = Arc::new(build_application(mail_transport));

    let info = ServerInfo {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    info!("📨 MCP Email Sender running on stdio");
    email_sender_mcp_api::run(app, info, shutdown_signal()).await?;

    info!("MCP Email Sender stopped");
    Ok(())
}

fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

fn main() {
    let dotenv = dotenvy::dotenv();

    if let Err(e) = logs::init_logger() {
        eprintln!("🚨 Fatal error: failed to initialize logger: {}", e);
        std::process::exit(1);
    }

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("🚨 Fatal error: failed to start async runtime: {}", e);
            log::logger().flush();
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(dotenv));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if let Err(e) = result {
        if e.during_startup() {
            error!("🚨 Fatal error during startup: {}", e);
        } else {
            error!("🚨 MCP Email Sender stopped after an I/O failure: {}", e);
        }
        log::logger().flush();
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_runtime_shutdown_does_not_wait_for_blocking_reads() {
        let runtime = build_runtime().unwrap();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        runtime.block_on(async {
            tokio::task::spawn_blocking(move || {
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_secs(30));
            });
        });
        started_rx.recv().unwrap();

        let start = Instant::now();
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_only_server_errors_happen_after_startup() {
        let config_error = RunError::Config(ConfigError::Missing("EMAIL_SMTP_HOST"));
        assert!(config_error.during_startup());

        let server_error = RunError::Server(ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "stdout closed",
        )));
        assert!(!server_error.during_startup());
    }
}
