//! Handles a calculation request.
//!
//! A request is the raw text of the input.
//! The host evaluates every statement and renders one output line each,
//! or rejects the whole request if the input is invalid.
use reckon_core::expr::{self, SymbolTable, Value, eval, parse};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Status of a rejected request.
pub const STATUS_REJECTED: u16 = 417;

/// Name of the payload builtin requesting a plot.
pub const GRAPH: &str = "graph";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Response {
    /// One `[n] <result>` line per statement.
    pub output: String,
    pub results: Vec<Outcome>,
    /// Seconds.
    pub lex_time: f64,
    /// Seconds.
    pub parse_time: f64,
    /// Seconds.
    pub evaluation_time: f64,
}

/// Result of a single statement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, derive_more::Display)]
pub enum Outcome {
    #[display("{_0}")]
    Value(Value),

    /// The statement failed without invalidating the request.
    #[display("{message}")]
    Fault { message: String },
}

/// The request was invalid.
/// `text` is the rendered diagnostic, to be returned verbatim.
#[derive(Serialize, Deserialize, Debug, thiserror::Error, Clone, PartialEq)]
#[error("{text}")]
pub struct Rejection {
    pub status: u16,
    pub text: String,
}

impl From<expr::Diagnostic> for Rejection {
    fn from(value: expr::Diagnostic) -> Self {
        Self {
            status: STATUS_REJECTED,
            text: value.text,
        }
    }
}

/// Symbols available to every request.
pub fn symbols() -> SymbolTable {
    SymbolTable::new().with_payload(GRAPH, &["from", "to"])
}

/// Evaluate every statement of the input.
///
/// # Returns
/// + `Err` if lexing, parsing, or any statement raised a diagnostic.
///   Results of other statements are discarded.
/// + Division by zero only fails the statement it occurs in.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(len = text.len())))]
pub fn evaluate(text: &str) -> Result<Response, Rejection> {
    let start = Instant::now();
    let lex = expr::lex::tokenize(text);
    let lex_time = start.elapsed().as_secs_f64();
    if let Some(err) = expr::lex_diagnostic(text, &lex) {
        #[cfg(feature = "tracing")]
        tracing::debug!(category = %err.category(), "rejected while lexing");
        return Err(err.into());
    }

    let start = Instant::now();
    let parsed = match parse::parse_with(text, &lex.tokens, symbols()) {
        Ok(parsed) => parsed,
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(category = %err.category(), "rejected while parsing");
            return Err(err.into());
        }
    };
    let program = expr::Program::new(text, parsed);
    let parse_time = start.elapsed().as_secs_f64();

    let start = Instant::now();
    let mut output = String::new();
    let mut results = Vec::with_capacity(program.len());
    for (idx, result) in program.evaluate_all().into_iter().enumerate() {
        let outcome = match result {
            Ok(value) => Outcome::Value(value),
            Err(err @ eval::Error::DivisionByZero { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(statement = idx + 1, ?err);

                Outcome::Fault {
                    message: err.to_string(),
                }
            }
            Err(eval::Error::Diagnostic(err)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(statement = idx + 1, category = %err.category(), "rejected while evaluating");
                return Err(err.into());
            }
        };

        output.push_str(&format!("[{}] {outcome}\n", idx + 1));
        results.push(outcome);
    }
    let evaluation_time = start.elapsed().as_secs_f64();

    #[cfg(feature = "tracing")]
    tracing::debug!(statements = results.len(), lex_time, parse_time, evaluation_time);

    Ok(Response {
        output,
        results,
        lex_time,
        parse_time,
        evaluation_time,
    })
}
