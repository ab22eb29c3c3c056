// Signal-driven shutdown through an injected signal stream.
use atlas_cli_kernel::errors::BoxError;
use atlas_cli_kernel::logging::{CaptureBuffer, LogConfig, Logger};
use atlas_cli_kernel::shutdown::{ShutdownCoordinator, ShutdownError, ShutdownSignal};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

fn coordinator(buffer: &CaptureBuffer, timeout_secs: i64) -> (ShutdownCoordinator, mpsc::UnboundedReceiver<i32>) {
    let logger = Logger::new(LogConfig::default().with_sink(buffer.clone()));
    let (code_tx, code_rx) = mpsc::unbounded_channel();
    let coordinator = ShutdownCoordinator::new(logger, timeout_secs).with_exit_hook(move |code| {
        let _ = code_tx.send(code);
    });
    (coordinator, code_rx)
}

#[tokio::test]
async fn test_interrupt_runs_cleanup_and_exits_with_signal_status() {
    let buffer = CaptureBuffer::new();
    let (coordinator, mut codes) = coordinator(&buffer, 5);
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let ran = ran.clone();
        coordinator.register(move |_token| {
            let ran = ran.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        });
    }
    coordinator.register(|_token| async { Err::<(), BoxError>("close connection pool".into()) });

    let (signals, rx) = mpsc::unbounded_channel();
    coordinator.start_with_signals(rx).unwrap();
    signals.send(ShutdownSignal::Interrupt).unwrap();

    let code = tokio::time::timeout(Duration::from_secs(5), codes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, 128 + 2);
    assert!(coordinator.is_interrupted());
    assert!(coordinator.cancel_token().is_cancelled());
    assert_eq!(ran.load(Ordering::SeqCst), 2);

    let report = coordinator.run_cleanup().await;
    assert_eq!(report.handlers, 3);
    assert_eq!(report.completed, 3);
    assert!(!report.timed_out);
    assert_eq!(report.errors, vec!["cleanup[2]: close connection pool".to_string()]);

    let err = report.error().unwrap();
    let message = err.to_string();
    assert_eq!(message.matches("cleanup[").count(), 1);
    assert!(matches!(err, ShutdownError::CleanupFailed { .. }));
    assert!(buffer.contents().contains("Shutdown signal received"));
}

#[tokio::test]
async fn test_terminate_exit_status() {
    let buffer = CaptureBuffer::new();
    let (coordinator, mut codes) = coordinator(&buffer, 1);

    let (signals, rx) = mpsc::unbounded_channel();
    coordinator.start_with_signals(rx).unwrap();
    signals.send(ShutdownSignal::Terminate).unwrap();

    let code = tokio::time::timeout(Duration::from_secs(5), codes.recv())
        .await
        .unwrap();
    assert_eq!(code, Some(143));
}

#[tokio::test]
async fn test_second_signal_forces_exit() {
    let buffer = CaptureBuffer::new();
    let (coordinator, mut codes) = coordinator(&buffer, 30);
    coordinator.register(|token| async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(token);
        Ok::<(), BoxError>(())
    });

    let (signals, rx) = mpsc::unbounded_channel();
    coordinator.start_with_signals(rx).unwrap();
    signals.send(ShutdownSignal::Interrupt).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    signals.send(ShutdownSignal::Terminate).unwrap();

    let code = tokio::time::timeout(Duration::from_secs(5), codes.recv())
        .await
        .unwrap();
    assert_eq!(code, Some(143));
}

#[tokio::test]
async fn test_concurrent_cleanup_requests_run_handlers_once() {
    let buffer = CaptureBuffer::new();
    let (coordinator, _codes) = coordinator(&buffer, 5);
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        coordinator.register(move |_| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        });
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let coordinator = coordinator.clone();
        tasks.push(tokio::spawn(async move { coordinator.run_cleanup().await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().completed, 1);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
