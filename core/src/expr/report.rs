//! Rendering of diagnostics.
//!
//! All rendering functions are pure: they only depend on the source text
//! and the position of the offending token.
use super::{eval, lex, parse, position::Span};

/// Number of characters shown on either side of an offending token.
const WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Invalid character or literal.
    Lexical,
    /// Invalid arrangement of tokens.
    Structural,
    /// Unknown name or invalid call.
    Binding,
    /// Operand out of range.
    Magnitude,
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, derive_more::From)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cause {
    Lex(lex::error::Kind),
    Parse(parse::error::Kind),
    Eval(eval::error::Kind),
}

impl Cause {
    pub fn category(&self) -> Category {
        match self {
            Self::Lex(kind) => kind.category(),
            Self::Parse(kind) => kind.category(),
            Self::Eval(kind) => kind.category(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Lex(kind) => kind.to_string(),
            Self::Parse(kind) => kind.to_string(),
            Self::Eval(kind) => kind.to_string(),
        }
    }
}

/// A user facing error with its rendered traceback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{text}")]
pub struct Diagnostic {
    pub cause: Cause,
    pub span: Option<Span>,
    pub text: String,
}

impl Diagnostic {
    /// Diagnostic without a position.
    pub fn plain(cause: impl Into<Cause>) -> Self {
        let cause = cause.into();
        let text = plain(&cause.message());
        Self {
            cause,
            span: None,
            text,
        }
    }

    /// Diagnostic pointing at a token in `src`.
    pub fn at_token(src: &str, span: Span, cause: impl Into<Cause>) -> Self {
        let cause = cause.into();
        let text = token(src, &span, &cause.message());
        Self {
            cause,
            span: Some(span),
            text,
        }
    }

    /// Diagnostic showing the operands around a failing operator.
    /// `span` is the span of the operator.
    pub fn at_operator(window: &OperatorWindow, span: Span, cause: impl Into<Cause>) -> Self {
        let cause = cause.into();
        let text = operator_window(window, &cause.message());
        Self {
            cause,
            span: Some(span),
            text,
        }
    }

    pub fn category(&self) -> Category {
        self.cause.category()
    }

    pub fn message(&self) -> String {
        self.cause.message()
    }
}

/// Bare message.
pub fn plain(message: &str) -> String {
    message.to_string()
}

/// A window of the line containing the token,
/// the token underlined, and the message.
///
/// ```text
/// >2 + y
/// >    ^
/// >~~~~~
/// >Variable 'y' does not exist
/// ```
pub fn token(src: &str, span: &Span, message: &str) -> String {
    let (line_start, line) = line_at(src, span.line);
    let column = span.start.0.saturating_sub(line_start).min(line.len());
    let width = span
        .len()
        .min(line.len().saturating_sub(column))
        .max(1);

    let from = column.saturating_sub(WINDOW);
    let to = (column + width + WINDOW).min(line.len());
    let relevant = line[from..to].iter().collect::<String>();
    let arrow = format!("{}{}", " ".repeat(column - from), "^".repeat(width));
    let rule = "~".repeat(arrow.chars().count());
    format!(">{relevant}\n>{arrow}\n>{rule}\n>{message}")
}

/// Tokens surrounding a failing operator, rendered for [`operator_window`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorWindow {
    /// Token before the left operand.
    pub before: Option<String>,
    pub left: String,
    pub op: char,
    pub right: String,
    /// Token after the right operand.
    pub after: Option<String>,
    pub left_value: String,
    pub right_value: String,
}

/// The tokens around the operator with the operation marked,
/// the operand values beneath their tokens, and the message.
///
/// ```text
/// >+ >>99999999 * 10<<
/// >    99999999   10
/// >~~~~~~~~~~~~~~~~~~~~
/// >Number (left) is larger than the permissible values
/// ```
pub fn operator_window(window: &OperatorWindow, message: &str) -> String {
    let before = window
        .before
        .as_deref()
        .map(|before| format!("{before} "))
        .unwrap_or_default();
    let after = window
        .after
        .as_deref()
        .map(|after| format!(" {after}"))
        .unwrap_or_default();

    let left_width = window
        .left
        .chars()
        .count()
        .max(window.left_value.chars().count());
    let top = format!(
        "{before}>>{:<left_width$} {} {}<<{after}",
        window.left, window.op, window.right
    );
    let indent = " ".repeat(before.chars().count() + 2);
    let mid = format!(
        "{indent}{:<left_width$}   {}",
        window.left_value, window.right_value
    );
    let rule = "~".repeat(top.chars().count().max(mid.chars().count()));
    format!(">{top}\n>{mid}\n>{rule}\n>{message}")
}

/// Text covered by the span.
pub fn slice(src: &str, span: &Span) -> String {
    src.chars().skip(span.start.0).take(span.len()).collect()
}

/// Character offset of the start of the line and its characters.
/// `line` is 1-based.
fn line_at(src: &str, line: usize) -> (usize, Vec<char>) {
    let mut start = 0;
    for (idx, text) in src.split('\n').enumerate() {
        if idx + 1 == line {
            return (start, text.trim_end_matches('\r').chars().collect());
        }
        start += text.chars().count() + 1;
    }
    (start, vec![])
}
