//! Error handling and formatting for predicate expressions
//!
//! Every failure during a parse call is reported as an [`Error`]. Syntax
//! problems carry source positions and can be rendered with context through
//! [`SyntaxError::render`].

use colored::Colorize;
use pest::error::{Error as PestError, InputLocation, LineColLocation};
use thiserror::Error;

use crate::callable::{Arity, CallError, InvocationFault};
use crate::fields::FieldError;
use crate::lexer::{Position, Rule};

/// A malformed source string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {line}:{column}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Byte offset into the source
    pub offset: usize,
    /// The offending token or character, if identifiable
    pub found: Option<String>,
}

impl SyntaxError {
    /// Create a syntax error at a token position
    pub fn at(message: impl Into<String>, position: Position, found: Option<String>) -> Self {
        Self {
            message: message.into(),
            line: position.line,
            column: position.column,
            offset: position.offset,
            found,
        }
    }

    pub(crate) fn from_pest(error: &PestError<Rule>) -> Self {
        let (line, column) = match error.line_col {
            LineColLocation::Pos((line, col)) => (line, col),
            LineColLocation::Span((line, col), _) => (line, col),
        };
        let offset = match error.location {
            InputLocation::Pos(pos) => pos,
            InputLocation::Span((start, _)) => start,
        };
        let found = error
            .line()
            .chars()
            .nth(column.saturating_sub(1))
            .map(|c| c.to_string());
        let message = match &found {
            Some(c) if c == "\"" => "unterminated string literal".to_string(),
            Some(c) if c == "'" => "unterminated character literal".to_string(),
            Some(c) => format!("unexpected character '{}'", c),
            None => error.variant.message().to_string(),
        };

        Self {
            message,
            line,
            column,
            offset,
            found,
        }
    }

    /// Format the error with the offending source line and a caret marker
    pub fn render(&self, input: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!("{} {}\n", "Syntax error:".red().bold(), self.message));
        output.push_str(&format!(
            "  {} {}:{}\n",
            "-->".blue().bold(),
            "input".dimmed(),
            format!("{}:{}", self.line, self.column).cyan()
        ));

        let lines: Vec<&str> = input.lines().collect();
        if self.line > 0 && self.line <= lines.len() {
            let line_idx = self.line - 1;

            output.push_str(&format!("   {}\n", "|".blue()));
            output.push_str(&format!(
                " {} | {}\n",
                format!("{:3}", self.line).blue().bold(),
                lines[line_idx]
            ));
            let indicator = format!("{}^", " ".repeat(self.column.saturating_sub(1)));
            output.push_str(&format!("     {} {}\n", "|".blue(), indicator.red().bold()));
        }

        if let Some(found) = &self.found {
            output.push_str(&format!("  {} {}\n", "Found:".yellow().bold(), found));
        }

        output
    }
}

/// Coarse classification of an [`Error`], stable for callers that branch on
/// the failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    UnsupportedNodeKind,
    UndefinedIdentifier,
    UndefinedFunction,
    UndefinedOperator,
    PropertyUnsupported,
    LiteralParseFailure,
    ArityMismatch,
    InvocationFailure,
    MalformedCallableContract,
    CallableFailed,
    ResolverFailed,
    FieldNotFound,
    NilTarget,
    UnsupportedSelectorShape,
}

/// Errors produced while parsing and evaluating an expression
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("{0} is not supported")]
    UnsupportedNode(String),

    #[error("{0} is not defined")]
    UndefinedIdentifier(String),

    #[error("unsupported function: {0}")]
    UndefinedFunction(String),

    #[error("operator {0} is not supported")]
    UndefinedOperator(String),

    #[error("properties are not supported")]
    PropertyUnsupported,

    #[error("failed to parse literal {text}: {reason}")]
    LiteralParse { text: String, reason: String },

    #[error("{callee}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        callee: String,
        expected: Arity,
        got: usize,
    },

    #[error("{callee}: {fault}")]
    Invocation {
        callee: String,
        #[source]
        fault: InvocationFault,
    },

    #[error("{callee}: {detail}")]
    MalformedContract { callee: String, detail: String },

    #[error("{callee}: {source}")]
    Callable {
        callee: String,
        #[source]
        source: CallError,
    },

    #[error("resolving {selector}: {source}")]
    Identifier {
        selector: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("resolving property: {source}")]
    Property {
        #[source]
        source: anyhow::Error,
    },

    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::UnsupportedNode(_) => ErrorKind::UnsupportedNodeKind,
            Error::UndefinedIdentifier(_) => ErrorKind::UndefinedIdentifier,
            Error::UndefinedFunction(_) => ErrorKind::UndefinedFunction,
            Error::UndefinedOperator(_) => ErrorKind::UndefinedOperator,
            Error::PropertyUnsupported => ErrorKind::PropertyUnsupported,
            Error::LiteralParse { .. } => ErrorKind::LiteralParseFailure,
            Error::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            Error::Invocation { .. } => ErrorKind::InvocationFailure,
            Error::MalformedContract { .. } => ErrorKind::MalformedCallableContract,
            Error::Callable { .. } => ErrorKind::CallableFailed,
            Error::UnsupportedSelector(_) => ErrorKind::UnsupportedSelectorShape,
            Error::Identifier { .. } | Error::Property { .. } => match self.field_error() {
                Some(FieldError::NilTarget { .. }) => ErrorKind::NilTarget,
                Some(FieldError::NotFound { .. }) => ErrorKind::FieldNotFound,
                Some(FieldError::EmptyPath) | None => ErrorKind::ResolverFailed,
            },
        }
    }

    /// The field accessor error a resolver failed with, if any
    pub fn field_error(&self) -> Option<&FieldError> {
        match self {
            Error::Identifier { source, .. } | Error::Property { source } => {
                source.chain().find_map(|e| e.downcast_ref::<FieldError>())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(line: usize, column: usize) -> Position {
        Position {
            line,
            column,
            offset: 0,
        }
    }

    #[test]
    fn test_render_points_at_column() {
        colored::control::set_override(false);
        let err = SyntaxError::at("unexpected token", position(1, 5), Some(")".into()));
        let rendered = err.render("a && )");
        assert!(rendered.contains("Syntax error: unexpected token"));
        assert!(rendered.contains("input:1:5"));
        assert!(rendered.contains("  1 | a && )"));
        assert!(rendered.contains("|     ^"));
        assert!(rendered.contains("Found: )"));
    }

    #[test]
    fn test_field_errors_are_classified() {
        let err = Error::Identifier {
            selector: "val.param".into(),
            source: FieldError::NilTarget {
                path: "param".into(),
            }
            .into(),
        };
        assert_eq!(err.kind(), ErrorKind::NilTarget);

        let err = Error::Identifier {
            selector: "val.nope".into(),
            source: FieldError::NotFound {
                path: "nope".into(),
            }
            .into(),
        };
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);

        // a malformed path is not the same as an absent field
        let err = Error::Identifier {
            selector: "val".into(),
            source: FieldError::EmptyPath.into(),
        };
        assert_eq!(err.kind(), ErrorKind::ResolverFailed);
        assert_eq!(err.field_error(), Some(&FieldError::EmptyPath));

        let err = Error::Property {
            source: anyhow::anyhow!("no such key"),
        };
        assert_eq!(err.kind(), ErrorKind::ResolverFailed);
        assert!(err.field_error().is_none());
    }

    #[test]
    fn test_syntax_error_display() {
        let err = Error::from(SyntaxError::at("expected expression", position(2, 3), None));
        assert_eq!(err.to_string(), "expected expression at 2:3");
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }
}
