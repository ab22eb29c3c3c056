pub mod commands;
pub mod config;

pub use config::{Command, Config, ConfigError};

use crate::errors::{BoxError, render_error};
use crate::logging::{Logger, LoggingError, default_directives, init_tracing, set_global};
use crate::shutdown::{CleanupConfig, ShutdownCoordinator};
use anyhow::Context;
use clap::CommandFactory;
use parking_lot::Mutex;
use std::process;
use tokio::sync::oneshot;
use tracing::{debug, info};

pub struct App {
    config: Config,
    logger: Logger,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Ok(Self::from_config(config))
    }

    /// Builds the logger from `config` and makes it the process-wide default.
    pub fn from_config(config: Config) -> Self {
        let logger = Logger::new(config.log_config());
        set_global(logger.clone());
        Self { config, logger }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Routes `tracing` events from the kernel and its dependencies into the logger.
    pub fn init_telemetry(&self) -> Result<(), LoggingError> {
        let directives = default_directives(self.logger.config().effective_level());
        init_tracing(self.logger.clone(), &directives)?;
        for warning in self.config.warnings() {
            self.logger.warn(&warning, &[]);
        }
        debug!(directives = %directives, "tracing initialized");
        Ok(())
    }

    /// Runs the selected subcommand and returns the process exit status.
    pub async fn run(self) -> anyhow::Result<i32> {
        match self.config.command.clone() {
            Some(Command::Explain { message, command }) => {
                println!("{}", commands::explain(&message, command.as_deref()));
                Ok(0)
            }
            Some(Command::Paginate {
                total,
                page,
                limit,
                all,
            }) => {
                let output = commands::paginate(total, page, limit, all)
                    .context("invalid pagination flags")?;
                println!("{output}");
                Ok(0)
            }
            Some(Command::Wait) => self.wait_for_signal().await,
            None => {
                Config::command().print_help()?;
                Ok(0)
            }
        }
    }

    async fn wait_for_signal(self) -> anyhow::Result<i32> {
        let timeout_secs = i64::try_from(self.config.shutdown_timeout_secs).unwrap_or(i64::MAX);
        let (exit_tx, exit_rx) = oneshot::channel();
        let exit_tx = Mutex::new(Some(exit_tx));
        let coordinator =
            ShutdownCoordinator::new(self.logger.clone(), timeout_secs).with_exit_hook(move |code| {
                if let Some(tx) = exit_tx.lock().take() {
                    let _ = tx.send(code);
                }
            });

        let sink = self.logger.clone();
        coordinator.register_with_config(
            move |_| {
                let sink = sink.clone();
                async move {
                    sink.flush();
                    Ok::<(), BoxError>(())
                }
            },
            CleanupConfig::new("flush-logs").with_description("Flush buffered log records"),
        );
        coordinator
            .start()
            .context("failed to listen for shutdown signals")?;

        let operation = self
            .logger
            .start_operation(uuid::Uuid::new_v4().to_string(), "wait");
        info!(timeout_secs, "waiting for SIGINT or SIGTERM");
        eprintln!("Waiting for SIGINT or SIGTERM...");

        coordinator.wait().await;
        operation.complete(&[]);

        let code = exit_rx
            .await
            .context("shutdown listener stopped before choosing an exit status")?;
        Ok(code)
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Main entry point for the application
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = match App::from_args(std::env::args()) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}", render_error(&e, false));
            process::exit(1);
        }
    };

    if let Err(e) = app.init_telemetry() {
        eprintln!("Warning: {e}");
    }

    let verbose = app.config().verbose;
    let logger = app.logger().clone();
    match app.run().await {
        Ok(0) => Ok(()),
        Ok(code) => {
            logger.flush();
            process::exit(code);
        }
        Err(err) => {
            let err: &(dyn std::error::Error + 'static) = err.as_ref();
            eprintln!("{}", render_error(err, verbose));
            logger.flush();
            process::exit(1);
        }
    }
}
