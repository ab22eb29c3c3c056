use super::BoxError;
use super::context::ErrorContext;
use std::error::Error;
use std::fmt;

/// Several independent failures reported as one.
#[derive(Debug)]
pub struct MultiError {
    errors: Vec<BoxError>,
}

impl MultiError {
    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl Error for MultiError {}

/// A primary failure with related secondary failures attached.
#[derive(Debug)]
pub struct ChainedError {
    primary: BoxError,
    related: Vec<BoxError>,
}

impl ChainedError {
    pub fn primary(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.primary
    }

    pub fn related(&self) -> &[BoxError] {
        &self.related
    }
}

impl fmt::Display for ChainedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let related = self
            .related
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{} (related errors: {})", self.primary, related)
    }
}

impl Error for ChainedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.primary as &(dyn Error + 'static))
    }
}

/// Attaches the non-empty `secondaries` to `primary`.
///
/// No primary yields `None`; no secondaries yields the primary unchanged.
pub fn chain<I>(primary: Option<BoxError>, secondaries: I) -> Option<BoxError>
where
    I: IntoIterator<Item = Option<BoxError>>,
{
    let primary = primary?;
    let related: Vec<BoxError> = secondaries.into_iter().flatten().collect();
    if related.is_empty() {
        return Some(primary);
    }
    Some(Box::new(ChainedError { primary, related }))
}

/// Accumulates errors from independent steps, in insertion order.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<BoxError>,
    contexts: Vec<Option<ErrorContext>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `err` when present; `None` leaves the collector unchanged.
    pub fn add(&mut self, err: Option<BoxError>, context: Option<ErrorContext>) {
        if let Some(err) = err {
            self.errors.push(err);
            self.contexts.push(context);
        }
    }

    pub fn add_result<T, E>(&mut self, result: Result<T, E>, context: Option<ErrorContext>) -> Option<T>
    where
        E: Into<BoxError>,
    {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.add(Some(err.into()), context);
                None
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn count(&self) -> usize {
        self.errors.len()
    }

    pub fn first(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.errors.first().map(|e| &**e)
    }

    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    pub fn contexts(&self) -> &[Option<ErrorContext>] {
        &self.contexts
    }

    /// One error for the whole batch: the sole error as-is, or a
    /// [`MultiError`] joining every message with `; `.
    pub fn combine(mut self) -> Option<BoxError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => Some(Box::new(MultiError {
                errors: self.errors,
            })),
        }
    }
}
