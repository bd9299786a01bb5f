//! Expression interpreter.
//!
//! Input is processed in three stages:
//! 1. [`lex`] turns the text into tokens.
//! 2. [`parse`] builds statements and binds function definitions.
//! 3. [`eval`] computes the value of a statement.
//!
//! Errors from any stage are reported as a [`Diagnostic`] pointing into the input.
pub mod ast;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod position;
pub mod report;
pub mod symbols;
pub mod token;

pub use eval::{Error, Namespace, Payload, Value};
pub use report::{Category, Diagnostic};
pub use symbols::SymbolTable;

/// Lex and parse the input using the default builtins.
pub fn compile(src: impl AsRef<str>) -> Result<Program, Diagnostic> {
    compile_with(src, SymbolTable::new())
}

/// Lex and parse the input using the given symbol table.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
pub fn compile_with(src: impl AsRef<str>, symbols: SymbolTable) -> Result<Program, Diagnostic> {
    let src = src.as_ref();
    let lex = lex::tokenize(src);
    if let Some(err) = lex_diagnostic(src, &lex) {
        return Err(err);
    }

    let parsed = parse::parse_with(src, &lex.tokens, symbols)?;
    Ok(Program::new(src, parsed))
}

/// Diagnostic for the first lexical error.
/// `None` if lexing succeeded.
pub fn lex_diagnostic(src: &str, lex: &lex::Lex) -> Option<Diagnostic> {
    let err = lex.errors.first()?;
    #[cfg(feature = "tracing")]
    tracing::debug!(errors = lex.errors.len(), first = ?err.value);

    Some(Diagnostic::at_token(src, err.span, err.value.clone()))
}

/// Parsed input, ready to be evaluated.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    statements: Vec<ast::Expression>,
    symbols: SymbolTable,
}

impl Program {
    pub fn new(source: impl Into<String>, parsed: parse::Parsed) -> Self {
        Self {
            source: source.into(),
            statements: parsed.statements,
            symbols: parsed.symbols,
        }
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Evaluate the statement at `index`.
    pub fn evaluate(&self, index: usize) -> Result<Value, Error> {
        self.evaluate_in(index, &Namespace::new())
    }

    /// Evaluate the statement at `index` with local variables.
    pub fn evaluate_in(&self, index: usize, namespace: &Namespace) -> Result<Value, Error> {
        let Some(statement) = self.statements.get(index) else {
            return Err(Diagnostic::plain(eval::error::Kind::NoStatement(index)).into());
        };

        eval::Evaluator::new(&self.source, &self.symbols).evaluate(&statement.chunks, namespace)
    }

    /// Evaluate every statement, in order.
    /// Statements are independent, so a failing statement does not stop
    /// the ones after it.
    /// Calls made by all statements count towards one [`eval::MAX_CALLS`] budget.
    pub fn evaluate_all(&self) -> Vec<Result<Value, Error>> {
        let evaluator = eval::Evaluator::new(&self.source, &self.symbols);
        let namespace = Namespace::new();
        self.statements
            .iter()
            .map(|statement| evaluator.evaluate(&statement.chunks, &namespace))
            .collect()
    }
}
