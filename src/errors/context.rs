use super::stack::{StackFrame, capture_stack, render_stack};
use super::{BoxError, chain_contains, find_in_chain};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Where an error happened, attached when it is wrapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorContext {
    pub command: String,
    pub resource: String,
    pub operation: String,
    pub configuration: BTreeMap<String, Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }
}

/// An error together with the context it was raised in.
///
/// `source()` is the wrapped error, so downcasting probes such as
/// [`ContextualError::is`] see through any number of wrappers.
#[derive(Debug)]
pub struct ContextualError {
    inner: BoxError,
    context: ErrorContext,
    stack: Option<Vec<StackFrame>>,
}

impl ContextualError {
    pub fn new(err: impl Into<BoxError>, mut context: ErrorContext) -> Self {
        if context.timestamp.is_none() {
            context.timestamp = Some(Utc::now());
        }
        Self {
            inner: err.into(),
            context,
            stack: None,
        }
    }

    pub fn with_operation(err: impl Into<BoxError>, operation: &str, resource: &str) -> Self {
        Self::new(
            err,
            ErrorContext::new()
                .with_operation(operation)
                .with_resource(resource),
        )
    }

    /// Wraps `err` and records the caller's stack.
    #[inline(never)]
    pub fn with_stack(err: impl Into<BoxError>, operation: &str) -> Self {
        Self::with_stack_context(err, ErrorContext::new().with_operation(operation))
    }

    #[inline(never)]
    pub fn with_stack_context(err: impl Into<BoxError>, context: ErrorContext) -> Self {
        let mut wrapped = Self::new(err, context);
        wrapped.stack = Some(capture_stack());
        wrapped
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.inner
    }

    pub fn into_inner(self) -> BoxError {
        self.inner
    }

    pub fn stack(&self) -> Option<&[StackFrame]> {
        self.stack.as_deref()
    }

    pub fn stack_trace(&self) -> Option<String> {
        self.stack.as_deref().map(render_stack)
    }

    /// True when this error or anything it wraps is a `T`.
    pub fn is<T: Error + 'static>(&self) -> bool {
        chain_contains::<T>(self)
    }

    pub fn find<T: Error + 'static>(&self) -> Option<&T> {
        find_in_chain::<T>(self)
    }
}

impl fmt::Display for ContextualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.operation.is_empty() {
            write!(f, "{}", self.inner)
        } else {
            write!(f, "[{}] {}", self.context.operation, self.inner)
        }
    }
}

impl Error for ContextualError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.inner as &(dyn Error + 'static))
    }
}

/// Context wrapping for `Result`s. `Ok` values pass through untouched.
pub trait WrapErr<T> {
    fn wrap_context(self, context: ErrorContext) -> Result<T, ContextualError>;

    fn wrap_operation(self, operation: &str, resource: &str) -> Result<T, ContextualError>;

    fn wrap_stack(self, operation: &str) -> Result<T, ContextualError>;
}

impl<T, E> WrapErr<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn wrap_context(self, context: ErrorContext) -> Result<T, ContextualError> {
        self.map_err(|e| ContextualError::new(e, context))
    }

    fn wrap_operation(self, operation: &str, resource: &str) -> Result<T, ContextualError> {
        self.map_err(|e| ContextualError::with_operation(e, operation, resource))
    }

    #[inline(never)]
    fn wrap_stack(self, operation: &str) -> Result<T, ContextualError> {
        match self {
            Ok(value) => Ok(value),
            Err(e) => Err(ContextualError::with_stack(e, operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApiError;

    #[test]
    fn test_display_with_and_without_operation() {
        let err = ContextualError::with_operation(ApiError::NotFound, "describe_cluster", "Cluster0");
        assert_eq!(err.to_string(), "[describe_cluster] resource not found");

        let err = ContextualError::new(ApiError::NotFound, ErrorContext::new());
        assert_eq!(err.to_string(), "resource not found");
    }

    #[test]
    fn test_timestamp_defaults_to_wrap_time() {
        let before = Utc::now();
        let err = ContextualError::new("boom", ErrorContext::new().with_command("apply"));
        let stamp = err.context().timestamp.unwrap();
        assert!(stamp >= before);
        assert_eq!(err.context().command, "apply");
    }

    #[test]
    fn test_identity_is_transitive() {
        let inner = ContextualError::with_operation(ApiError::Conflict, "create_user", "app-user");
        let outer = ContextualError::with_operation(inner, "apply", "config.yaml");

        assert!(outer.is::<ApiError>());
        assert_eq!(outer.find::<ApiError>(), Some(&ApiError::Conflict));
        assert!(!outer.is::<std::io::Error>());
        assert_eq!(
            outer.to_string(),
            "[apply] [create_user] resource conflict"
        );
    }

    #[test]
    fn test_ok_results_pass_through() {
        let ok: Result<u32, ApiError> = Ok(7);
        assert_eq!(ok.wrap_operation("op", "res").unwrap(), 7);

        let ok: Result<(), std::io::Error> = Ok(());
        assert!(ok.wrap_stack("op").is_ok());
    }

    #[test]
    fn test_stack_capture_on_wrap() {
        let failed: Result<(), ApiError> = Err(ApiError::Transient);
        let err = failed.wrap_stack("list_clusters").unwrap_err();

        let frames = err.stack().unwrap();
        assert!(frames.len() <= crate::errors::stack::MAX_FRAMES);
        assert!(
            frames
                .iter()
                .any(|f| f.function.contains("test_stack_capture_on_wrap"))
        );
        assert!(frames.iter().all(|f| !f.function.contains("wrap_stack")));
        assert!(err.stack_trace().unwrap().starts_with("  at "));
    }
}
