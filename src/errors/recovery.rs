use super::BoxError;
use super::context::{ContextualError, ErrorContext};
use super::sdk::ApiError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

pub const PANIC_OPERATION: &str = "panic_recovery";

/// A panic payload that was not itself an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RecoveredPanic {
    pub message: String,
}

impl RecoveredPanic {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

macro_rules! try_display {
    ($payload:ident, $($ty:ty),+) => {
        $(
            if let Some(value) = $payload.downcast_ref::<$ty>() {
                return Box::new(RecoveredPanic::new(format!("panic: {value}")));
            }
        )+
    };
}

/// Errors stay errors, strings become messages, anything else is described.
pub fn normalize_panic(payload: Box<dyn Any + Send>) -> BoxError {
    let payload = match payload.downcast::<BoxError>() {
        Ok(err) => return *err,
        Err(other) => other,
    };
    let payload = match payload.downcast::<ApiError>() {
        Ok(err) => return err,
        Err(other) => other,
    };
    let payload = match payload.downcast::<std::io::Error>() {
        Ok(err) => return err,
        Err(other) => other,
    };
    if let Some(message) = payload.downcast_ref::<String>() {
        return Box::new(RecoveredPanic::new(message.clone()));
    }
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return Box::new(RecoveredPanic::new(*message));
    }
    try_display!(payload, i32, i64, u32, u64, usize, bool);
    Box::new(RecoveredPanic::new(format!("panic: {payload:?}")))
}

#[inline(never)]
fn recovered_panic(operation: &str, payload: Box<dyn Any + Send>) -> BoxError {
    let err = normalize_panic(payload);
    tracing::warn!(operation, error = %err, "recovered from panic");
    let context = ErrorContext::new()
        .with_operation(PANIC_OPERATION)
        .with_resource(operation);
    Box::new(ContextualError::with_stack_context(err, context))
}

/// Runs `f`, turning a panic into a [`ContextualError`] with operation
/// `panic_recovery` and the caller's stack. Errors returned by `f` pass
/// through unchanged.
#[inline(never)]
pub fn handle_with_recovery<T, F>(operation: &str, f: F) -> Result<T, BoxError>
where
    F: FnOnce() -> Result<T, BoxError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(recovered_panic(operation, payload)),
    }
}

pub async fn handle_with_recovery_async<T, F>(operation: &str, fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(recovered_panic(operation, payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, ContextualError, chain_contains, find_in_chain};

    #[test]
    fn test_success_and_error_pass_through() {
        let ok = handle_with_recovery("noop", || Ok(5));
        assert_eq!(ok.unwrap(), 5);

        let err = handle_with_recovery::<(), _>("fails", || Err(ApiError::Conflict.into()))
            .unwrap_err();
        assert!(err.downcast_ref::<ContextualError>().is_none());
        assert_eq!(err.downcast_ref::<ApiError>(), Some(&ApiError::Conflict));
    }

    #[test]
    fn test_string_panic_is_wrapped() {
        let err = handle_with_recovery::<(), _>("delete_cluster", || panic!("boom {}", 1))
            .unwrap_err();
        let wrapped = err.downcast_ref::<ContextualError>().unwrap();
        assert_eq!(wrapped.context().operation, PANIC_OPERATION);
        assert_eq!(wrapped.context().resource, "delete_cluster");
        assert_eq!(wrapped.to_string(), "[panic_recovery] boom 1");
        assert!(wrapped.stack().is_some());
    }

    #[test]
    fn test_error_payload_keeps_identity() {
        let err = handle_with_recovery::<(), _>("op", || {
            std::panic::panic_any(ApiError::Unauthorized)
        })
        .unwrap_err();
        assert!(chain_contains::<ApiError>(&*err));
    }

    #[test]
    fn test_other_payloads_are_described() {
        let err = handle_with_recovery::<(), _>("op", || std::panic::panic_any(42_i32))
            .unwrap_err();
        let recovered = find_in_chain::<RecoveredPanic>(&*err).unwrap();
        assert_eq!(recovered.message, "panic: 42");

        struct Opaque;
        let err = normalize_panic(Box::new(Opaque));
        assert!(err.to_string().starts_with("panic: "));
    }

    #[tokio::test]
    async fn test_async_recovery() {
        let err = handle_with_recovery_async::<(), _>("stream", async {
            tokio::task::yield_now().await;
            if true {
                panic!("async boom");
            }
            Ok::<(), BoxError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "[panic_recovery] async boom");

        let ok = handle_with_recovery_async("stream", async { Ok::<_, BoxError>("done") }).await;
        assert_eq!(ok.unwrap(), "done");
    }
}
