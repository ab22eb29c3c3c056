//! Graceful shutdown: a single signal listener, a once-only cleanup phase
//! run in parallel under a deadline, and a signal-derived exit status.

pub mod signal;

pub use signal::{ShutdownSignal, os_signals};

use crate::errors::BoxError;
use crate::logging::Logger;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("{}", .errors.join("; "))]
    CleanupFailed { errors: Vec<String> },

    #[error("failed to install signal handler: {0}")]
    SignalSetup(String),

    #[error("signal listener already started")]
    AlreadyStarted,
}

pub type CleanupFuture = BoxFuture<'static, Result<(), BoxError>>;
type CleanupFn = Arc<dyn Fn(CancellationToken) -> CleanupFuture + Send + Sync>;
type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;
type CleanupRun = Shared<BoxFuture<'static, Arc<CleanupReport>>>;

/// Scheduling options for one cleanup handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupConfig {
    pub name: String,
    /// Clamped to the coordinator timeout.
    pub timeout: Option<Duration>,
    /// A failing critical handler cancels every other handler.
    pub critical: bool,
    pub description: String,
}

impl CleanupConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

struct CleanupEntry {
    handler: CleanupFn,
    config: Option<CleanupConfig>,
}

/// Outcome of the cleanup phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub handlers: usize,
    /// Handlers that returned, successfully or not, before the deadline.
    pub completed: usize,
    /// One `cleanup[i]: ...` entry per failed handler.
    pub errors: Vec<String>,
    pub timed_out: bool,
    /// Index of the critical handler whose failure stopped the phase.
    pub aborted_by: Option<usize>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.timed_out && self.aborted_by.is_none()
    }

    pub fn error(&self) -> Option<ShutdownError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ShutdownError::CleanupFailed {
                errors: self.errors.clone(),
            })
        }
    }
}

enum Outcome {
    Done,
    Failed(String),
    Panicked,
    TimedOut,
}

fn process_exit(code: i32) {
    std::process::exit(code)
}

struct Inner {
    token: CancellationToken,
    logger: Logger,
    cleanups: RwLock<Vec<CleanupEntry>>,
    timeout: Duration,
    interrupted: Mutex<bool>,
    listening: AtomicBool,
    cleanup_run: Mutex<Option<CleanupRun>>,
    exit_hook: RwLock<ExitHook>,
}

/// Turns signals and shutdown requests into one bounded cleanup phase.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("timeout", &self.inner.timeout)
            .field("handlers", &self.inner.cleanups.read().len())
            .field("interrupted", &*self.inner.interrupted.lock())
            .field("cancelled", &self.inner.token.is_cancelled())
            .finish()
    }
}

impl ShutdownCoordinator {
    /// A timeout of zero or less means [`DEFAULT_TIMEOUT_SECS`].
    pub fn new(logger: Logger, timeout_secs: i64) -> Self {
        Self::with_token(logger, timeout_secs, CancellationToken::new())
    }

    /// The root token becomes a child of `parent`, so cancelling the parent
    /// also starts shutdown.
    pub fn with_parent(logger: Logger, timeout_secs: i64, parent: &CancellationToken) -> Self {
        Self::with_token(logger, timeout_secs, parent.child_token())
    }

    fn with_token(logger: Logger, timeout_secs: i64, token: CancellationToken) -> Self {
        let timeout = match u64::try_from(timeout_secs) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        let exit_hook: ExitHook = Arc::new(process_exit);
        Self {
            inner: Arc::new(Inner {
                token,
                logger,
                cleanups: RwLock::new(Vec::new()),
                timeout,
                interrupted: Mutex::new(false),
                listening: AtomicBool::new(false),
                cleanup_run: Mutex::new(None),
                exit_hook: RwLock::new(exit_hook),
            }),
        }
    }

    /// Replaces the process exit performed after a signal-initiated shutdown.
    pub fn with_exit_hook<F>(self, hook: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        *self.inner.exit_hook.write() = Arc::new(hook);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn register<F, Fut>(&self, handler: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.push(handler, None);
    }

    pub fn register_with_config<F, Fut>(&self, handler: F, config: CleanupConfig)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.push(handler, Some(config));
    }

    fn push<F, Fut>(&self, handler: F, config: Option<CleanupConfig>)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let handler: CleanupFn =
            Arc::new(move |token: CancellationToken| -> CleanupFuture { Box::pin(handler(token)) });
        self.inner.cleanups.write().push(CleanupEntry { handler, config });
    }

    pub fn handler_count(&self) -> usize {
        self.inner.cleanups.read().len()
    }

    /// Listens for SIGINT and SIGTERM.
    pub fn start(&self) -> Result<(), ShutdownError> {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyStarted);
        }
        match os_signals() {
            Ok(signals) => {
                self.spawn_listener(signals);
                Ok(())
            }
            Err(err) => {
                self.inner.listening.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Spawns the one listener task consuming `signals`.
    pub fn start_with_signals(
        &self,
        signals: mpsc::UnboundedReceiver<ShutdownSignal>,
    ) -> Result<(), ShutdownError> {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyStarted);
        }
        self.spawn_listener(signals);
        Ok(())
    }

    fn spawn_listener(&self, signals: mpsc::UnboundedReceiver<ShutdownSignal>) {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.listen(signals).await });
    }

    async fn listen(self, mut signals: mpsc::UnboundedReceiver<ShutdownSignal>) {
        let Some(first) = signals.recv().await else {
            return;
        };

        {
            let mut interrupted = self.inner.interrupted.lock();
            if *interrupted {
                return;
            }
            *interrupted = true;
        }

        eprintln!("\nReceived {first}, shutting down gracefully (press Ctrl+C again to force)...");
        self.inner.logger.info(
            "Shutdown signal received",
            &[("signal", json!(first.to_string()))],
        );
        self.inner.token.cancel();

        let cleanup = self.run_cleanup();
        tokio::pin!(cleanup);

        let code = loop {
            tokio::select! {
                _ = &mut cleanup => break first.exit_code(),
                next = signals.recv() => match next {
                    Some(second) => {
                        eprintln!("Received {second} during cleanup, forcing shutdown");
                        break second.exit_code();
                    }
                    None => {
                        (&mut cleanup).await;
                        break first.exit_code();
                    }
                },
            }
        };

        self.inner.logger.flush();
        let hook = self.inner.exit_hook.read().clone();
        hook(code);
    }

    pub async fn wait(&self) {
        self.inner.token.cancelled().await;
    }

    pub fn is_interrupted(&self) -> bool {
        *self.inner.interrupted.lock()
    }

    /// Cancels the root token. Never runs the exit hook.
    pub fn shutdown(&self) {
        self.inner.logger.info("Shutdown requested", &[]);
        self.inner.token.cancel();
    }

    /// Runs every registered handler at most once per coordinator; later
    /// callers get the report of the first run.
    ///
    /// The run is claimed before any handler starts and is driven by its own
    /// task, so dropping a caller neither cancels nor restarts it.
    pub async fn run_cleanup(&self) -> Arc<CleanupReport> {
        let run = {
            let mut slot = self.inner.cleanup_run.lock();
            slot.get_or_insert_with(|| self.spawn_cleanup()).clone()
        };
        run.await
    }

    fn spawn_cleanup(&self) -> CleanupRun {
        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.execute_cleanup().await });
        async move {
            match task.await {
                Ok(report) => Arc::new(report),
                Err(err) => Arc::new(CleanupReport {
                    errors: vec![format!("cleanup task failed: {err}")],
                    ..CleanupReport::default()
                }),
            }
        }
        .boxed()
        .shared()
    }

    async fn execute_cleanup(&self) -> CleanupReport {
        let entries: Vec<(CleanupFn, Option<CleanupConfig>)> = self
            .inner
            .cleanups
            .read()
            .iter()
            .map(|entry| (entry.handler.clone(), entry.config.clone()))
            .collect();

        let timeout = self.inner.timeout;
        let logger = &self.inner.logger;
        let mut report = CleanupReport {
            handlers: entries.len(),
            ..CleanupReport::default()
        };

        if entries.is_empty() {
            return report;
        }

        eprintln!(
            "Running {} cleanup handler(s) (timeout {}s)...",
            entries.len(),
            timeout.as_secs()
        );
        logger.info(
            "Starting cleanup",
            &[
                ("handlers", json!(entries.len())),
                ("timeout", json!(crate::logging::format_duration(timeout))),
            ],
        );

        let deadline = Instant::now() + timeout;
        let cleanup_token = CancellationToken::new();
        let mut supervisors = JoinSet::new();
        let mut critical = vec![false; entries.len()];
        let mut names = vec![String::new(); entries.len()];

        for (index, (handler, config)) in entries.into_iter().enumerate() {
            let handler_token = cleanup_token.child_token();
            let limit = config
                .as_ref()
                .and_then(|c| c.timeout)
                .map(|t| t.min(timeout));
            critical[index] = config.as_ref().is_some_and(|c| c.critical);
            if let Some(config) = &config {
                names[index] = config.name.clone();
            }

            // Handlers run detached so an expired deadline never aborts them.
            let mut task = tokio::spawn(handler(handler_token.clone()));
            supervisors.spawn(async move {
                let joined = match limit {
                    Some(limit) => tokio::select! {
                        joined = &mut task => joined,
                        _ = tokio::time::sleep(limit) => {
                            handler_token.cancel();
                            return (index, Outcome::TimedOut);
                        }
                    },
                    None => task.await,
                };
                let outcome = match joined {
                    Ok(Ok(())) => Outcome::Done,
                    Ok(Err(err)) => Outcome::Failed(err.to_string()),
                    Err(_) => Outcome::Panicked,
                };
                (index, outcome)
            });
        }

        let mut finished = vec![false; report.handlers];
        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);

        loop {
            tokio::select! {
                biased;
                joined = supervisors.join_next() => {
                    let Some(joined) = joined else { break };
                    let Ok((index, outcome)) = joined else { continue };
                    finished[index] = true;
                    let failure = match outcome {
                        Outcome::Done => {
                            report.completed += 1;
                            None
                        }
                        Outcome::Failed(message) => {
                            report.completed += 1;
                            Some(message)
                        }
                        Outcome::Panicked => {
                            report.completed += 1;
                            Some("handler panicked".to_string())
                        }
                        Outcome::TimedOut => Some("timed out".to_string()),
                    };
                    if let Some(message) = failure {
                        let entry = format!("cleanup[{index}]: {message}");
                        logger.error(
                            "Cleanup handler failed",
                            &[
                                ("handler", json!(index)),
                                ("name", json!(names[index])),
                                ("error", json!(entry)),
                            ],
                        );
                        report.errors.push(entry);
                        if critical[index] {
                            cleanup_token.cancel();
                            report.aborted_by = Some(index);
                            break;
                        }
                    }
                }
                _ = &mut expired => {
                    cleanup_token.cancel();
                    report.timed_out = true;
                    break;
                }
            }
        }

        if report.timed_out {
            for (index, _) in finished.iter().enumerate().filter(|(_, done)| !**done) {
                report.errors.push(format!("cleanup[{index}]: timed out"));
            }
            eprintln!("Cleanup timed out after {}s", timeout.as_secs());
            logger.warn(
                "Cleanup deadline exceeded",
                &[("unfinished", json!(report.handlers - report.completed))],
            );
        } else if let Some(index) = report.aborted_by {
            eprintln!("Cleanup aborted: critical handler {index} failed");
        } else if report.errors.is_empty() {
            eprintln!("Cleanup completed");
        } else {
            eprintln!("Cleanup finished with {} error(s)", report.errors.len());
        }

        logger.info(
            "Cleanup finished",
            &[
                ("completed", json!(report.completed)),
                ("errors", json!(report.errors.len())),
                ("timed_out", json!(report.timed_out)),
            ],
        );
        report
    }
}
