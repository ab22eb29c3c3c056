// Classification, wrapping, collection, recovery and rendering working together.
use atlas_cli_kernel::errors::{
    ApiError, BoxError, ClassificationRule, ContextualError, EnhancedErrorFormatter, ErrorCategory,
    ErrorClassifier, ErrorCollector, ErrorContext, ErrorFormatter, HttpError, Severity, WrapErr,
    chain, handle_with_recovery, handle_with_recovery_async, is_sentinel, render_error,
};
use std::io;

fn io_err(msg: &str) -> io::Error {
    io::Error::other(msg.to_string())
}

#[test]
fn test_timeout_is_a_retryable_network_warning() {
    let classifier = ErrorClassifier::default();
    let err = io_err("connection timeout: failed to reach host");
    let analysis = classifier.analyze(&err, None);

    assert_eq!(analysis.category, ErrorCategory::Network);
    assert_eq!(analysis.severity, Severity::Warning);
    assert!(analysis.retryable);
    assert!(!analysis.user_actionable);
}

#[test]
fn test_sentinel_survives_wrapping() {
    let result: Result<(), ApiError> = Err(ApiError::NotFound);
    let wrapped = result
        .wrap_operation("describe_cluster", "Cluster0")
        .wrap_context(ErrorContext::new().with_command("clusters describe"))
        .unwrap_err();

    assert!(is_sentinel(&wrapped, ApiError::NotFound));
    assert!(!is_sentinel(&wrapped, ApiError::Conflict));
    assert_eq!(
        ErrorClassifier::default().classify(&wrapped),
        ErrorCategory::Resource
    );
    assert_eq!(wrapped.context().command, "clusters describe");
}

#[test]
fn test_ok_passes_through_wrapping() {
    let result: Result<u32, ApiError> = Ok(7);
    assert_eq!(result.wrap_operation("noop", "").unwrap(), 7);
}

#[test]
fn test_http_error_is_recognised_by_status() {
    let err = ContextualError::with_operation(
        HttpError::new(401, "invalid digest"),
        "list_projects",
        "",
    );
    let analysis = ErrorClassifier::default().analyze(&err, None);

    assert_eq!(analysis.category, ErrorCategory::Authentication);
    assert_eq!(analysis.severity, Severity::Critical);
    assert_eq!(analysis.suggestions[0].title, "Check your API keys");
    assert_eq!(analysis.metadata["operation"], "list_projects");
}

#[test]
fn test_forbidden_is_an_authorization_problem() {
    let err = HttpError::new(403, "forbidden: user lacks project role");
    assert_eq!(
        ErrorClassifier::default().classify(&err),
        ErrorCategory::Authorization
    );

    let out = ErrorFormatter::new(false).format(&err);
    assert!(out.contains("(HTTP 403)"));
    assert!(!out.contains("API keys are missing"));
}

#[test]
fn test_custom_rules_extend_the_table() {
    let classifier = ErrorClassifier::default().with_rule(ClassificationRule::new(
        ErrorCategory::Fatal,
        &["disk full"],
    ));
    assert_eq!(classifier.classify(&io_err("write failed: disk full")), ErrorCategory::Fatal);
    assert_eq!(classifier.classify(&io_err("something odd")), ErrorCategory::Internal);
}

#[test]
fn test_collector_combines_batch_failures() {
    let mut collector = ErrorCollector::new();
    for (i, result) in [Ok(()), Err(ApiError::Conflict), Err(ApiError::Transient)]
        .into_iter()
        .enumerate()
    {
        collector.add_result(
            result,
            Some(ErrorContext::new().with_resource(format!("user{i}"))),
        );
    }

    assert_eq!(collector.count(), 2);
    let combined = collector.combine().unwrap();
    assert_eq!(
        combined.to_string(),
        "resource conflict; transient API failure"
    );
}

#[test]
fn test_chain_keeps_primary_identity() {
    let primary: BoxError = Box::new(ApiError::Unauthorized);
    let chained = chain(Some(primary), [Some(io_err("logout failed").into())]).unwrap();
    assert!(is_sentinel(&*chained, ApiError::Unauthorized));
    assert!(chained.to_string().contains("related errors: logout failed"));
}

#[test]
fn test_panics_become_contextual_errors() {
    let result: Result<(), BoxError> = handle_with_recovery("delete_cluster", || {
        if true {
            panic!("index out of range");
        }
        Ok(())
    });
    let err = result.unwrap_err();
    let contextual = err.downcast_ref::<ContextualError>().unwrap();
    assert_eq!(contextual.context().operation, "panic_recovery");
    assert_eq!(contextual.context().resource, "delete_cluster");
    assert!(err.to_string().contains("index out of range"));
}

#[tokio::test]
async fn test_async_panics_are_recovered() {
    let result = handle_with_recovery_async("pause_cluster", async {
        if true {
            panic!("boom");
        }
        Ok::<(), BoxError>(())
    })
    .await;
    assert!(result.unwrap_err().to_string().contains("boom"));

    let ok = handle_with_recovery_async("pause_cluster", async { Ok::<u8, BoxError>(1) }).await;
    assert_eq!(ok.unwrap(), 1);
}

#[test]
fn test_rendering_is_stable() {
    let messages = [
        "unauthorized",
        "GET /groups: HTTP 503",
        "server selection error: context deadline exceeded",
        "connection refused",
        "cluster name must be lowercase",
    ];
    for message in messages {
        let once = render_error(&io_err(message), false);
        let twice = render_error(&io_err(&once), false);
        assert_eq!(once, twice, "{message}");
        assert!(!twice.starts_with("Error: Error: "));
    }
}

#[test]
fn test_verbose_rendering_lists_suggestions() {
    let ctx = ErrorContext::new()
        .with_command("infra apply")
        .with_config("file", "prod.yaml");
    let out = EnhancedErrorFormatter::new(true).format(
        &io_err("yaml: unmarshal errors: line 7"),
        Some(&ctx),
    );
    assert!(out.contains("$ atlas infra validate -f prod.yaml"));
    assert!(out.contains("Root Cause: Configuration problem"));
}

#[test]
fn test_quiet_formatter_shows_last_segment() {
    let err = io_err("apply: load config: missing field `name`");
    assert_eq!(ErrorFormatter::new(false).format(&err), "missing field `name`");
}
