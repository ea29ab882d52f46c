use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub const fn dummy() -> Self {
        Self { line: 0, column: 0 }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0 || self.column != 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_known() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found by one of the compiler passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GssError {
    pub message: String,
    pub span: Option<Span>,
    pub severity: Severity,
}

impl GssError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
            severity: Severity::Error,
        }
    }

    pub fn without_location(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            severity: Severity::Error,
        }
    }
}

impl fmt::Display for GssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "[{}] {}", span, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Collects the errors and warnings reported by the passes of one compilation.
///
/// Reporting never interrupts a pass: the offending node is left alone and the
/// walk continues, so a single run surfaces every problem of a stylesheet.
#[derive(Debug, Default)]
pub struct ErrorManager {
    source_name: String,
    errors: Vec<GssError>,
    warnings: Vec<GssError>,
}

impl ErrorManager {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    pub fn report(&mut self, mut err: GssError) {
        err.severity = Severity::Error;
        error!(source = %self.source_name, "{}", err);
        self.errors.push(err);
    }

    pub fn report_warning(&mut self, mut warning: GssError) {
        warning.severity = Severity::Warning;
        warn!(source = %self.source_name, "{}", warning);
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[GssError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[GssError] {
        &self.warnings
    }

    pub fn into_parts(self) -> (Vec<GssError>, Vec<GssError>) {
        (self.errors, self.warnings)
    }
}

/// Fatal failures: anything that prevents producing a stylesheet at all.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Parse error at {span}: {message}")]
    Parse { message: String, span: Span },

    #[error("Compilation failed with {} error(s)", errors.len())]
    Failed { errors: Vec<GssError> },
}

impl CompileError {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::Parse {
            message: message.into(),
            span,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_span_display() {
        assert_eq!(Span::dummy().to_string(), "<unknown>");
        assert_eq!(Span::new(3, 7).to_string(), "3:7");
    }

    #[test]
    fn manager_separates_errors_and_warnings() {
        let mut errors = ErrorManager::new("test.gss");
        errors.report_warning(GssError::new("careful", Span::new(1, 1)));
        assert!(!errors.has_errors());

        errors.report(GssError::without_location("broken"));
        assert!(errors.has_errors());
        assert_eq!(errors.errors()[0].to_string(), "broken");
        assert_eq!(errors.warnings()[0].severity, Severity::Warning);
        assert_eq!(errors.warnings()[0].to_string(), "[1:1] careful");
    }
}
