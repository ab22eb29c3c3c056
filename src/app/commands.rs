use crate::errors::{BoxError, EnhancedErrorFormatter, ErrorClassifier, ErrorContext};
use crate::pagination::{PaginationError, PaginationInfo, PaginationOptions};
use std::fmt::Write as _;

/// Renders `message` as a failing command would in verbose mode, followed by
/// the classification.
pub fn explain(message: &str, command: Option<&str>) -> String {
    let err: BoxError = message.into();
    let context = command.map(|c| ErrorContext::new().with_command(c));
    let classifier = ErrorClassifier::new();
    let analysis = classifier.analyze(&*err, context.as_ref());

    let mut out = EnhancedErrorFormatter::new(true).format(&*err, context.as_ref());
    let _ = write!(
        out,
        "\n\ncategory: {}\nseverity: {}\nretryable: {}\nuser actionable: {}",
        analysis.category, analysis.severity, analysis.retryable, analysis.user_actionable
    );
    out
}

/// The display line and skip for the given flags.
pub fn paginate(total: u64, page: u32, limit: u32, all: bool) -> Result<String, PaginationError> {
    let resolved = PaginationOptions::new(page, limit, all).resolve()?;
    let info = PaginationInfo::new(resolved, total);
    Ok(format!("{}\nskip: {}", info.display(), resolved.skip()))
}
