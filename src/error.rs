//! Error types shared by every engine in the crate.
//!
//! All fallible operations report an [`ExprError`]. Variants are grouped by the
//! failure category returned from [`ExprError::kind`], so callers can branch on
//! the category without matching every variant.

use std::fmt;

use thiserror::Error;

/// Failure category of an [`ExprError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No domain hook accepts an operand combination, or a call has the wrong arity.
    Type,
    /// Differentiation or normalization hit a node without a rule.
    UnimplementedRule,
    /// The member resolver could not resolve a field, overload or index.
    MemberResolution,
    /// The toolchain rejected a compilation batch.
    Compilation,
    /// The node ordinal space is used up.
    CounterExhaustion,
    /// Evaluating concrete values failed (bad arguments, matrix shape, ...).
    Evaluation,
}

/// Errors that can occur while building, transforming, compiling or running expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    // Construction-time type errors
    #[error("cannot apply `{target}` ({target_domain}) to `{argument}` ({argument_domain})")]
    UnsupportedApplication {
        target: String,
        target_domain: String,
        argument: String,
        argument_domain: String,
    },
    #[error("cannot add `{left}` ({left_domain}) and `{right}` ({right_domain})")]
    UnsupportedSum {
        left: String,
        left_domain: String,
        right: String,
        right_domain: String,
    },
    #[error("`{function}` expects {expected} argument(s), got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("`{0}` is not a symbol")]
    NotASymbol(String),

    // Missing rules
    #[error("no {operation} rule for `{expression}`")]
    UnimplementedRule {
        operation: &'static str,
        expression: String,
    },

    // Collaborator failures
    #[error(transparent)]
    MemberResolution(#[from] ResolveError),
    #[error("compilation failed with {} diagnostic(s): {}", .diagnostics.len(), render_diagnostics(.diagnostics))]
    Compilation { diagnostics: Vec<Diagnostic> },

    #[error("expression ordinal counter exhausted")]
    CounterExhausted,

    // Evaluation of concrete values
    #[error("expected {expected} argument(s), got {got}")]
    ArgumentCount { expected: usize, got: usize },
    #[error("argument {index} should be {expected}, got {got}")]
    ArgumentType {
        index: usize,
        expected: String,
        got: String,
    },
    #[error("matrix {operation} failed: {reason}")]
    Matrix {
        operation: &'static str,
        reason: String,
    },
    #[error("cannot evaluate {0}")]
    Evaluation(String),
}

impl ExprError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedApplication { .. }
            | Self::UnsupportedSum { .. }
            | Self::ArityMismatch { .. }
            | Self::NotASymbol(_) => ErrorKind::Type,
            Self::UnimplementedRule { .. } => ErrorKind::UnimplementedRule,
            Self::MemberResolution(_) => ErrorKind::MemberResolution,
            Self::Compilation { .. } => ErrorKind::Compilation,
            Self::CounterExhausted => ErrorKind::CounterExhaustion,
            Self::ArgumentCount { .. }
            | Self::ArgumentType { .. }
            | Self::Matrix { .. }
            | Self::Evaluation(_) => ErrorKind::Evaluation,
        }
    }

    pub(crate) fn unimplemented(operation: &'static str, expression: impl fmt::Display) -> Self {
        Self::UnimplementedRule {
            operation,
            expression: expression.to_string(),
        }
    }

    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    pub(crate) fn matrix(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Matrix {
            operation,
            reason: reason.into(),
        }
    }
}

/// Failures reported by a [`MemberResolver`](crate::MemberResolver).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("type `{ty}` has no member `{member}`")]
    UnknownMember { ty: String, member: String },
    #[error("member `{member}` of `{ty}` is ambiguous for {arity} argument(s)")]
    Ambiguous {
        ty: String,
        member: String,
        arity: usize,
    },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("`{ty}` cannot be indexed by {arguments}")]
    NotIndexable { ty: String, arguments: String },
}

/// Severity of a toolchain [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// A single message produced by a [`Toolchain`](crate::Toolchain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Name of the generated function the message refers to, if any.
    pub function: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(function: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            function: function.map(str::to_owned),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.function {
            Some(name) => write!(f, "{level} in {name}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;

    #[test]
    fn test_kind_grouping() {
        let err = ExprError::ArityMismatch {
            function: "pow".into(),
            expected: 2,
            got: 1,
        };
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.to_string(), "`pow` expects 2 argument(s), got 1");

        let err: ExprError = ResolveError::IndexOutOfRange { index: 5, len: 2 }.into();
        assert_eq!(err.kind(), ErrorKind::MemberResolution);
        assert_eq!(err.to_string(), "index 5 out of range for length 2");
    }

    #[test]
    fn test_compilation_message_lists_diagnostics() {
        let err = ExprError::Compilation {
            diagnostics: vec![
                Diagnostic::error(Some("f0"), "unbound symbol `y`"),
                Diagnostic::error(None, "register limit exceeded"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "compilation failed with 2 diagnostic(s): error in f0: unbound symbol `y`; error: register limit exceeded"
        );
    }
}
