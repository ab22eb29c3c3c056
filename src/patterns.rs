// Lazily compiled, name-addressable regex tables
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PatternError {
    #[error("Regex compilation failed for pattern '{pattern}' (name: {name}): {source}")]
    CompilationFailed {
        pattern: String,
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Regex index out of bounds: {index} >= {max}")]
    IndexOutOfBounds { index: usize, max: usize },

    #[error("Regex pattern not found: {name}")]
    PatternNotFound { name: String },
}

/// Static regex pattern set, compiled once on first access.
pub struct StaticRegexSet {
    patterns: &'static [(&'static str, &'static str)], // (pattern, name)
    compiled: OnceLock<Result<Vec<Regex>, PatternError>>,
}

impl StaticRegexSet {
    pub const fn new(patterns: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            patterns,
            compiled: OnceLock::new(),
        }
    }

    fn compiled(&self) -> Result<&[Regex], PatternError> {
        let compiled = self.compiled.get_or_init(|| {
            let mut regexes = Vec::with_capacity(self.patterns.len());

            for (pattern, name) in self.patterns {
                match Regex::new(pattern) {
                    Ok(regex) => regexes.push(regex),
                    Err(e) => {
                        return Err(PatternError::CompilationFailed {
                            pattern: pattern.to_string(),
                            name: name.to_string(),
                            source: e,
                        });
                    }
                }
            }

            Ok(regexes)
        });

        match compiled {
            Ok(regexes) => Ok(regexes.as_slice()),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn get(&self, index: usize) -> Result<&Regex, PatternError> {
        let regexes = self.compiled()?;
        regexes.get(index).ok_or(PatternError::IndexOutOfBounds {
            index,
            max: regexes.len(),
        })
    }

    pub fn get_by_name(&self, name: &str) -> Result<&Regex, PatternError> {
        let index = self
            .patterns
            .iter()
            .position(|(_, pattern_name)| *pattern_name == name)
            .ok_or(PatternError::PatternNotFound {
                name: name.to_string(),
            })?;

        self.get(index)
    }

    /// All compiled patterns, or an empty slice when any pattern failed to compile.
    pub fn iter(&self) -> impl Iterator<Item = &Regex> {
        self.compiled().unwrap_or_default().iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn pattern_names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|(_, name)| *name).collect()
    }
}
