//! Error types for store parsing and mutation.

use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// One non-indented record line that lacks a `:` field separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProblem {
    /// 1-based line number in the source file.
    pub line: usize,
    pub content: String,
}

/// Every line-level problem found in one parse attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub source_name: Option<String>,
    pub problems: Vec<ParseProblem>,
}

impl ParseError {
    pub fn new(problems: Vec<ParseProblem>) -> Self {
        Self {
            source_name: None,
            problems,
        }
    }

    pub fn with_source(mut self, path: &Path) -> Self {
        self.source_name = Some(path.display().to_string());
        self
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.source_name {
            write!(f, "{name}: ")?;
        }
        write!(
            f,
            "{} line(s) lack a ':' field separator; the file cannot be edited automatically until it is fixed manually",
            self.problems.len()
        )?;
        for problem in &self.problems {
            write!(f, "\n  line {}: {}", problem.line, problem.content)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Errors raised by the parser and the file mutator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("record {digest} not found in {path}; the file was probably modified since it was read")]
    RecordNotFound { digest: String, path: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record payload: {0}")]
    InvalidPayload(String),

    #[error("invalid group name `{0}`: only ASCII letters and digits are allowed")]
    InvalidGroupName(String),

    #[error("store file lock busy: {lock_path}")]
    LockBusy { lock_path: String },
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for conditions the caller can act on (re-read, fix the file).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::RecordNotFound { .. })
    }
}
