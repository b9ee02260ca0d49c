use std::fmt;

/// A 0-based position in notation source text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub line: usize,
    /// Bytes since the last newline.
    pub column: usize,
    /// Byte offset into the expression.
    pub offset: usize,
}

/// A failure to read or evaluate object notation, with span information.
#[derive(Debug, Clone, PartialEq)]
pub struct NotationError {
    pub code: String,
    pub message: String,
    pub begin: Position,
    /// Exclusive.
    pub end: Position,
}

impl NotationError {
    pub fn syntax_error(message: String, begin: Position, end: Position) -> Self {
        NotationError {
            code: "notation-syntax-error".to_string(),
            message,
            begin,
            end,
        }
    }

    pub fn unknown_identifier(name: &str, begin: Position, end: Position) -> Self {
        NotationError {
            code: "notation-unknown-identifier".to_string(),
            message: format!("{} is not defined", name),
            begin,
            end,
        }
    }

    /// Both the evaluator and the strict JSON reader rejected the input.
    pub fn malformed(eval_err: &NotationError, json_err: &serde_json::Error) -> Self {
        NotationError {
            code: "malformed-notation".to_string(),
            message: format!("{}; as JSON: {}", eval_err.message, json_err),
            begin: eval_err.begin,
            end: eval_err.end,
        }
    }
}

impl fmt::Display for NotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(
                f,
                "{}:{}: {} ({})",
                self.begin.line, self.begin.column, self.message, self.code
            )
        } else {
            write!(
                f,
                "{}:{}-{}:{}: {} ({})",
                self.begin.line,
                self.begin.column,
                self.end.line,
                self.end.column,
                self.message,
                self.code
            )
        }
    }
}

impl std::error::Error for NotationError {}

/// Statement assembly failed before anything reached the transport.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SendError {
    #[error(
        "xAPI: Please provide a valid verb, object and (default) actor! (missing: {})",
        .0.join(", ")
    )]
    MissingFields(Vec<&'static str>),
}

/// Reported by a [`crate::transport::StatementTransport`] when a send fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("statement transport failed: {message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            status: None,
            message: message.into(),
        }
    }
}

/// Loading defaults or a vocabulary document failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object at the top level of the {0} document")]
    NotAnObject(&'static str),
    #[error("vocabulary entry {0:?} must be an object")]
    BadVocabularyEntry(String),
}
