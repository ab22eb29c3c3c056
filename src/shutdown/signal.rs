use super::ShutdownError;
use std::fmt;
#[cfg(not(unix))]
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::sync::mpsc;
#[cfg(unix)]
use tracing::debug;
#[cfg(not(unix))]
use tracing::error;

/// Process signals that start a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    pub fn signum(self) -> i32 {
        match self {
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
        }
    }

    /// `128 + signum`, the conventional status of a signal-terminated process.
    pub fn exit_code(self) -> i32 {
        128 + self.signum()
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Installs SIGINT/SIGTERM handlers and forwards every delivery, in order,
/// to a single receiver.
#[cfg(unix)]
pub fn os_signals() -> Result<mpsc::UnboundedReceiver<ShutdownSignal>, ShutdownError> {
    let mut sigint = unix_signal(SignalKind::interrupt())
        .map_err(|e| ShutdownError::SignalSetup(format!("SIGINT: {e}")))?;
    let mut sigterm = unix_signal(SignalKind::terminate())
        .map_err(|e| ShutdownError::SignalSetup(format!("SIGTERM: {e}")))?;
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = sigint.recv() => ShutdownSignal::Interrupt,
                Some(()) = sigterm.recv() => ShutdownSignal::Terminate,
                else => break,
            };
            debug!(signal = %received, "signal received");
            if tx.send(received).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn os_signals() -> Result<mpsc::UnboundedReceiver<ShutdownSignal>, ShutdownError> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match signal::ctrl_c().await {
                Ok(()) => {
                    if tx.send(ShutdownSignal::Interrupt).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!("Failed to listen for Ctrl+C: {}", err);
                    break;
                }
            }
        }
    });

    Ok(rx)
}
