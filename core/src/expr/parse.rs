use super::{
    ast::{self, Chunk},
    eval::MAX_NESTING,
    lex,
    position::{Span, WithSpan},
    report::Diagnostic,
    symbols::{Function, SymbolTable},
    token::{self, Op, Token},
};
use std::{collections::HashSet, mem};

/// Result of parsing an input.
#[derive(Debug, Clone)]
pub struct Parsed {
    /// Non-empty statements, in order.
    pub statements: Vec<ast::Expression>,
    /// Builtins plus the functions defined by the input.
    pub symbols: SymbolTable,
}

/// Where a token sequence appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Top level input, possibly spanning multiple lines.
    TopLevel,
    /// Bracket contents, a call argument, or a function body.
    Nested,
}

struct Parser<'a> {
    /// Full input, for diagnostics.
    src: &'a str,
    symbols: SymbolTable,
    /// Brackets and call arguments enclosing the sequence being scanned.
    nesting: usize,
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
pub fn parse(src: &str, tokens: &[WithSpan<Token>]) -> Result<Parsed, Diagnostic> {
    parse_with(src, tokens, SymbolTable::new())
}

/// Parse using the given symbol table as the global state.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
pub fn parse_with(
    src: &str,
    tokens: &[WithSpan<Token>],
    symbols: SymbolTable,
) -> Result<Parsed, Diagnostic> {
    let mut parser = Parser {
        src,
        symbols,
        nesting: 0,
    };
    let statements = parser.scan(tokens, Context::TopLevel)?;
    let statements = statements
        .into_iter()
        .map(ast::Expression::new)
        .collect::<Vec<_>>();

    for statement in statements.iter() {
        parser.validate_calls(&statement.chunks, None)?;
    }

    Ok(Parsed {
        statements,
        symbols: parser.symbols,
    })
}

impl<'a> Parser<'a> {
    fn error(&self, kind: error::Kind, span: Span) -> Diagnostic {
        Diagnostic::at_token(self.src, span, kind)
    }

    fn lex_error(&self, err: &WithSpan<lex::error::Kind>) -> Diagnostic {
        Diagnostic::at_token(self.src, err.span, err.value.clone())
    }

    /// Fails if opening `depth` more levels exceeds [`MAX_NESTING`].
    fn check_nesting(&self, depth: usize, span: Span) -> Result<(), Diagnostic> {
        if self.nesting + depth > MAX_NESTING {
            return Err(self.error(error::Kind::NestingTooDeep, span));
        }
        Ok(())
    }

    /// Build the statements of a token sequence.
    /// Empty statements are dropped.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, tokens)))]
    fn scan(
        &mut self,
        tokens: &[WithSpan<Token>],
        context: Context,
    ) -> Result<Vec<Vec<Chunk>>, Diagnostic> {
        let mut statements = vec![];
        let mut current: Vec<Chunk> = vec![];
        let mut depth = 0_usize;
        // Opening parenthesis of the outermost open bracket, and its index.
        let mut open: Option<(Span, usize)> = None;

        let mut iter = tokens.iter().enumerate().peekable();
        while let Some((idx, token)) = iter.next() {
            #[cfg(feature = "tracing")]
            tracing::trace!(?token, depth);

            if depth > 0 {
                match token.value {
                    Token::ParenLeft => {
                        depth += 1;
                        self.check_nesting(depth, token.span)?;
                    }
                    Token::ParenRight => {
                        depth -= 1;
                        if depth == 0
                            && let Some((open_span, start)) = open.take()
                        {
                            let span = open_span.join(&token.span);
                            let chunks = self.parse_bracket(&tokens[start + 1..idx], span)?;
                            current.push(ast::Bracket { chunks, span }.into());
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match &token.value {
                Token::FunctionDef(def) => {
                    if context != Context::TopLevel || !current.is_empty() {
                        return Err(self.error(error::Kind::DefinitionNotAllowed, token.span));
                    }
                    self.define(def, token.span)?;
                    iter.next_if(|(_, next)| next.value == Token::Newline);
                }

                Token::ParenLeft => {
                    depth = 1;
                    self.check_nesting(depth, token.span)?;
                    open = Some((token.span, idx));
                }

                Token::ParenRight => {
                    return Err(self.error(error::Kind::UnexpectedClosingBracket, token.span));
                }

                Token::Operator(op) => current.push(ast::Operator::new(*op, token.span).into()),

                Token::FunctionCall(call) => {
                    self.check_nesting(1, token.span)?;
                    let call = self.parse_call(call, token.span)?;
                    current.push(call.into());
                }

                Token::Name(name) => current.push(
                    ast::Name {
                        value: name.clone(),
                        span: token.span,
                    }
                    .into(),
                ),

                Token::Number(value) => current.push(
                    ast::Literal {
                        value: *value,
                        span: token.span,
                    }
                    .into(),
                ),

                Token::Newline => match context {
                    Context::TopLevel => statements.push(mem::take(&mut current)),
                    Context::Nested => {
                        return Err(self.error(error::Kind::MultipleLines, token.span));
                    }
                },

                Token::Equal => {
                    return Err(self.error(error::Kind::UnexpectedToken('='), token.span));
                }

                Token::Comma => {
                    return Err(self.error(error::Kind::UnexpectedToken(','), token.span));
                }
            }
        }

        if let Some((open_span, _)) = open {
            return Err(self.error(error::Kind::UnclosedBracket, open_span));
        }
        statements.push(current);

        statements
            .into_iter()
            .filter(|chunks| !chunks.is_empty())
            .map(|chunks| self.peephole(chunks))
            .collect()
    }

    /// Parse a sequence that must form exactly one expression.
    fn parse_single(
        &mut self,
        tokens: &[WithSpan<Token>],
        span: Span,
        empty: error::Kind,
    ) -> Result<Vec<Chunk>, Diagnostic> {
        self.nesting += 1;
        let statements = self.scan(tokens, Context::Nested);
        self.nesting -= 1;

        let mut statements = statements?;
        // Newlines are rejected in nested context, so there is at most one.
        statements.pop().ok_or_else(|| self.error(empty, span))
    }

    fn parse_bracket(
        &mut self,
        tokens: &[WithSpan<Token>],
        span: Span,
    ) -> Result<Vec<Chunk>, Diagnostic> {
        self.parse_single(tokens, span, error::Kind::EmptyBracket)
    }

    /// Re-lex the argument list of a call and parse each argument.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn parse_call(
        &mut self,
        call: &token::CallText,
        span: Span,
    ) -> Result<ast::FunctionCall, Diagnostic> {
        let lex = lex::tokenize_slice(&call.args, lex::Mode::Arguments, call.args_start, span.line);
        if let Some(err) = lex.errors.first() {
            return Err(self.lex_error(err));
        }

        let mut args = vec![];
        if !lex.tokens.is_empty() {
            for (tokens, end) in split_args(&lex.tokens, span) {
                let chunks = self.parse_single(tokens, end, error::Kind::MissingArgument)?;
                args.push(ast::Expression::new(chunks));
            }
        }

        Ok(ast::FunctionCall {
            name: call.name.clone(),
            args,
            span,
        })
    }

    /// Parse the body of a definition and bind the function.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn define(&mut self, def: &token::FunctionDef, span: Span) -> Result<(), Diagnostic> {
        let mut seen = HashSet::new();
        for param in def.params.iter() {
            if !seen.insert(param.as_str()) {
                return Err(self.error(error::Kind::DuplicateParameter(param.clone()), span));
            }
        }

        let lex = lex::tokenize_slice(&def.body, lex::Mode::Arguments, def.body_start, span.line);
        if let Some(err) = lex.errors.first() {
            return Err(self.lex_error(err));
        }
        let body = self.parse_single(&lex.tokens, span, error::Kind::EmptyBody)?;

        let function = Function {
            name: def.name.clone(),
            params: def.params.clone(),
            body,
            span,
        };
        self.validate_body(&function.body, &function.params)?;
        self.validate_calls(&function.body, Some(function.params.as_slice()))?;
        self.symbols.define(function);
        Ok(())
    }
}

/// Split argument tokens at top level commas.
/// Each argument is paired with the span to report if it is empty.
fn split_args<'t>(
    tokens: &'t [WithSpan<Token>],
    call: Span,
) -> Vec<(&'t [WithSpan<Token>], Span)> {
    let mut args = vec![];
    let mut depth = 0_usize;
    let mut start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        match token.value {
            Token::ParenLeft => depth += 1,
            Token::ParenRight => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                args.push((&tokens[start..idx], token.span));
                start = idx + 1;
            }
            _ => {}
        }
    }

    let end = tokens.last().map(|token| token.span).unwrap_or(call);
    args.push((&tokens[start..], end));
    args
}

impl<'a> Parser<'a> {
    /// Normalize a raw statement.
    /// + Collapses `- -` into `+`.
    /// + Inserts `*` between adjacent operands.
    /// + Folds unary minus into its operand.
    fn peephole(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, Diagnostic> {
        let chunks = self.collapse(chunks)?;
        self.fold_unary(chunks)
    }

    fn collapse(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, Diagnostic> {
        let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                Chunk::Operator(operator) => match out.last() {
                    None if operator.op != Op::Subtract => {
                        return Err(self.error(error::Kind::UnexpectedOperator, operator.span));
                    }

                    Some(Chunk::Operator(prev))
                        if prev.op == Op::Subtract && operator.op == Op::Subtract =>
                    {
                        let span = prev.span.join(&operator.span);
                        out.pop();
                        out.push(ast::Operator::synthetic(Op::Add, span).into());
                    }

                    Some(Chunk::Operator(prev)) if prev.op == operator.op => {
                        return Err(self.error(
                            error::Kind::UnexpectedToken(operator.op.as_char()),
                            operator.span,
                        ));
                    }

                    _ => out.push(operator.into()),
                },

                operand => {
                    if out.last().is_some_and(Chunk::is_operand) {
                        let span = operand.span();
                        out.push(ast::Operator::synthetic(Op::Multiply, span).into());
                    }
                    out.push(operand);
                }
            }
        }

        Ok(out)
    }

    fn fold_unary(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, Diagnostic> {
        let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
        let mut iter = chunks.into_iter();
        while let Some(chunk) = iter.next() {
            let unary = out.last().is_none_or(|last| !last.is_operand());
            match chunk {
                Chunk::Operator(operator) if unary => match operator.op {
                    Op::Subtract => {
                        let operand = match iter.next() {
                            Some(operand) if operand.is_operand() => operand,
                            Some(Chunk::Operator(next)) => {
                                return Err(self.error(
                                    error::Kind::UnexpectedToken(next.op.as_char()),
                                    next.span,
                                ));
                            }
                            _ => {
                                return Err(self.error(
                                    error::Kind::MissingOperand(operator.op.as_char()),
                                    operator.span,
                                ));
                            }
                        };
                        out.push(negate(operator, operand));
                    }

                    // Only left behind by collapsing `- -`.
                    Op::Add if operator.synthetic => {}

                    op => {
                        return Err(
                            self.error(error::Kind::UnexpectedToken(op.as_char()), operator.span)
                        );
                    }
                },

                chunk => out.push(chunk),
            }
        }

        if let Some(Chunk::Operator(operator)) = out.last() {
            return Err(self.error(
                error::Kind::MissingOperand(operator.op.as_char()),
                operator.span,
            ));
        }

        Ok(out)
    }
}

/// Apply a unary minus to an operand.
/// Literals are negated directly, anything else becomes `(-1 * operand)`.
///
/// The negated literal is a single operand, so `-3^2` is `(-3)^2`.
fn negate(minus: ast::Operator, operand: Chunk) -> Chunk {
    let span = minus.span.join(&operand.span());
    match operand {
        Chunk::Literal(literal) => ast::Literal {
            value: -literal.value,
            span,
        }
        .into(),

        operand => ast::Bracket {
            chunks: vec![
                ast::Literal {
                    value: -1.0,
                    span: minus.span,
                }
                .into(),
                ast::Operator::synthetic(Op::Multiply, minus.span).into(),
                operand,
            ],
            span,
        }
        .into(),
    }
}

impl<'a> Parser<'a> {
    /// Check every call in `chunks`, including calls nested in brackets and
    /// arguments.
    ///
    /// `scope` holds the names bound in the enclosing function, if any.
    /// Free names in arguments must be bound either there or as a global
    /// constant.
    fn validate_calls(&self, chunks: &[Chunk], scope: Option<&[String]>) -> Result<(), Diagnostic> {
        for chunk in chunks {
            match chunk {
                Chunk::Bracket(bracket) => self.validate_calls(&bracket.chunks, scope)?,
                Chunk::Call(call) => self.validate_call(call, scope)?,
                Chunk::Literal(_) | Chunk::Name(_) | Chunk::Operator(_) => {}
            }
        }
        Ok(())
    }

    fn validate_call(
        &self,
        call: &ast::FunctionCall,
        scope: Option<&[String]>,
    ) -> Result<(), Diagnostic> {
        let Some(symbol) = self.symbols.get(&call.name) else {
            return Err(self.error(error::Kind::FunctionNotFound(call.name.clone()), call.span));
        };
        let Some(params) = symbol.params() else {
            return Err(self.error(error::Kind::NotAFunction(call.name.clone()), call.span));
        };
        if params.len() != call.args.len() {
            return Err(self.error(
                error::Kind::ArityMismatch {
                    name: call.name.clone(),
                    expected: params.len(),
                    found: call.args.len(),
                },
                call.span,
            ));
        }

        for arg in call.args.iter() {
            self.validate_arg_names(&arg.chunks, scope)?;
            self.validate_calls(&arg.chunks, scope)?;
        }
        Ok(())
    }

    fn validate_arg_names(
        &self,
        chunks: &[Chunk],
        scope: Option<&[String]>,
    ) -> Result<(), Diagnostic> {
        for chunk in chunks {
            match chunk {
                Chunk::Name(name) => {
                    let in_scope = scope.is_some_and(|scope| scope.contains(&name.value));
                    if !in_scope && self.symbols.constant(&name.value).is_none() {
                        return Err(self.error(
                            error::Kind::VariableNotFound(name.value.clone()),
                            name.span,
                        ));
                    }
                }
                Chunk::Bracket(bracket) => self.validate_arg_names(&bracket.chunks, scope)?,
                Chunk::Literal(_) | Chunk::Operator(_) | Chunk::Call(_) => {}
            }
        }
        Ok(())
    }

    /// Every name in a function body must be one of its parameters.
    fn validate_body(&self, chunks: &[Chunk], params: &[String]) -> Result<(), Diagnostic> {
        for chunk in chunks {
            match chunk {
                Chunk::Name(name) => {
                    if !params.contains(&name.value) {
                        return Err(self.error(
                            error::Kind::UnknownVariable(name.value.clone()),
                            name.span,
                        ));
                    }
                }
                Chunk::Bracket(bracket) => self.validate_body(&bracket.chunks, params)?,
                Chunk::Call(call) => {
                    for arg in call.args.iter() {
                        self.validate_body(&arg.chunks, params)?;
                    }
                }
                Chunk::Literal(_) | Chunk::Operator(_) => {}
            }
        }
        Ok(())
    }
}

pub mod error {
    use crate::expr::report::Category;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum Kind {
        /// `)` without a matching `(`.
        #[error("Unexpected closing bracket")]
        UnexpectedClosingBracket,

        /// `(` without a matching `)`.
        #[error("Unclosed bracket")]
        UnclosedBracket,

        /// `()`
        #[error("Empty brackets")]
        EmptyBracket,

        /// A newline inside brackets.
        #[error("Brackets cannot span multiple lines")]
        MultipleLines,

        /// Brackets and call arguments nested beyond [`MAX_NESTING`](crate::expr::eval::MAX_NESTING).
        #[error("Brackets are nested too deeply")]
        NestingTooDeep,

        /// A statement starting with an operator other than `-`.
        #[error("Unexpected operator")]
        UnexpectedOperator,

        /// A token that is not valid in its position.
        /// e.g. a repeated operator in `2 * * 3`
        #[error("Unexpected '{0}'")]
        UnexpectedToken(char),

        /// An operator without an operand after it.
        #[error("Missing operand after '{0}'")]
        MissingOperand(char),

        /// An empty argument in a call.
        /// e.g. `log(2, )`
        #[error("Missing argument")]
        MissingArgument,

        /// A definition without a body.
        #[error("Function body is empty")]
        EmptyBody,

        /// A parameter declared more than once.
        #[error("Duplicate parameter '{0}'")]
        DuplicateParameter(String),

        /// A function definition that does not start a top level statement.
        #[error("Functions are not allowed here")]
        DefinitionNotAllowed,

        /// A call to a name that is not bound.
        #[error("Function '{0}' not found")]
        FunctionNotFound(String),

        /// A call to a constant.
        #[error("'{0}' is not a function")]
        NotAFunction(String),

        /// Wrong number of arguments.
        #[error("{} arguments passed to {name}", arity_word(.expected, .found))]
        ArityMismatch {
            name: String,
            expected: usize,
            found: usize,
        },

        /// An unbound name in call arguments.
        #[error("Variable '{0}' not found")]
        VariableNotFound(String),

        /// A name in a function body that is not one of its parameters.
        #[error("Unknown variable: '{0}'")]
        UnknownVariable(String),
    }

    impl Kind {
        pub fn category(&self) -> Category {
            match self {
                Self::UnexpectedClosingBracket
                | Self::UnclosedBracket
                | Self::EmptyBracket
                | Self::MultipleLines
                | Self::NestingTooDeep
                | Self::UnexpectedOperator
                | Self::UnexpectedToken(_)
                | Self::MissingOperand(_)
                | Self::MissingArgument
                | Self::EmptyBody
                | Self::DuplicateParameter(_) => Category::Structural,

                Self::DefinitionNotAllowed
                | Self::FunctionNotFound(_)
                | Self::NotAFunction(_)
                | Self::ArityMismatch { .. }
                | Self::VariableNotFound(_)
                | Self::UnknownVariable(_) => Category::Binding,
            }
        }
    }

    fn arity_word(expected: &usize, found: &usize) -> &'static str {
        if expected > found {
            "Not enough"
        } else {
            "Too many"
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expr::{
        report::{self, Cause},
        symbols::Symbol,
    };

    fn parse_src(src: &str) -> Result<Parsed, Diagnostic> {
        let lex = lex::tokenize(src);
        assert!(lex.errors.is_empty(), "input should lex");
        parse(src, &lex.tokens)
    }

    fn parse_err(src: &str) -> error::Kind {
        let err = parse_src(src).expect_err("input should be invalid");
        let Cause::Parse(kind) = err.cause else {
            panic!("expected a parse error, found {:?}", err.cause);
        };
        kind
    }

    fn ops(chunks: &[Chunk]) -> Vec<Op> {
        chunks
            .iter()
            .filter_map(|chunk| match chunk {
                Chunk::Operator(operator) => Some(operator.op),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_empty() {
        let parsed = parse_src("").expect("input should be valid");
        assert!(parsed.statements.is_empty());

        let parsed = parse_src("\n\n").expect("input should be valid");
        assert!(parsed.statements.is_empty());
    }

    #[test]
    fn parse_statements() {
        let parsed = parse_src("1 + 2\n3\n\n4 * 5").expect("input should be valid");
        assert_eq!(parsed.statements.len(), 3);
        assert_eq!(parsed.statements[0].len(), 3);
        assert_eq!(parsed.statements[1].len(), 1);
        assert_eq!(parsed.statements[2].line(), Some(4));
    }

    #[test]
    fn parse_bracket() {
        let parsed = parse_src("(2 + 3) * 4").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(chunks.len(), 3);
        let Chunk::Bracket(bracket) = &chunks[0] else {
            panic!("invalid chunk");
        };
        assert_eq!(bracket.chunks.len(), 3);
        assert_eq!(bracket.span, Span::new(0, 7, 1));

        // nested
        let parsed = parse_src("((1 + 2) * (3))").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(chunks.len(), 1);
        let Chunk::Bracket(outer) = &chunks[0] else {
            panic!("invalid chunk");
        };
        assert!(matches!(outer.chunks[0], Chunk::Bracket(_)));
        assert!(matches!(outer.chunks[2], Chunk::Bracket(_)));
    }

    #[test]
    fn parse_bracket_errors() {
        assert_eq!(parse_err("(2+3"), error::Kind::UnclosedBracket);
        assert_eq!(parse_err("2+3)"), error::Kind::UnexpectedClosingBracket);
        assert_eq!(parse_err("()"), error::Kind::EmptyBracket);
        assert_eq!(parse_err("(2\n+ 3)"), error::Kind::MultipleLines);

        let err = parse_src("1 + (2+3").expect_err("input should be invalid");
        assert_eq!(err.span, Some(Span::new(4, 5, 1)));
    }

    #[test]
    fn parse_nesting_limit() {
        let src = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        parse_src(&src).expect("input should be valid");

        let depth = 10_000;
        let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse_src(&src).expect_err("input should be invalid");
        assert_eq!(err.cause, Cause::Parse(error::Kind::NestingTooDeep));
        assert_eq!(err.category(), report::Category::Structural);
        // the first bracket past the limit
        assert_eq!(err.span, Some(Span::new(MAX_NESTING, MAX_NESTING + 1, 1)));

        // call arguments count towards the limit
        let src = format!("{}0{}", "sin(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_err(&src), error::Kind::NestingTooDeep);

        let src = format!("f(x) = {}x{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(parse_err(&src), error::Kind::NestingTooDeep);
    }

    #[test]
    fn implicit_multiplication() {
        let parsed = parse_src("2(3 + 4)").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(ops(chunks), vec![Op::Multiply]);
        let Chunk::Operator(operator) = &chunks[1] else {
            panic!("invalid chunk");
        };
        assert!(operator.synthetic);

        let parsed = parse_src("2 x").expect("input should be valid");
        assert_eq!(ops(&parsed.statements[0].chunks), vec![Op::Multiply]);

        let parsed = parse_src("(1)(2) 3 sin(4)").expect("input should be valid");
        assert_eq!(
            ops(&parsed.statements[0].chunks),
            vec![Op::Multiply, Op::Multiply, Op::Multiply]
        );
    }

    #[test]
    fn double_minus_collapses() {
        let parsed = parse_src("5 - -3").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(ops(chunks), vec![Op::Add]);
        assert_eq!(chunks.len(), 3);

        // a triple minus leaves a unary minus after the collapsed `+`
        let parsed = parse_src("2 - - - 3").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(ops(chunks), vec![Op::Add]);
        let Chunk::Literal(literal) = &chunks[2] else {
            panic!("invalid chunk");
        };
        assert_eq!(literal.value, -3.0);
    }

    #[test]
    fn unary_minus() {
        let parsed = parse_src("-3").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(chunks.len(), 1);
        let Chunk::Literal(literal) = &chunks[0] else {
            panic!("invalid chunk");
        };
        assert_eq!(literal.value, -3.0);
        assert_eq!(literal.span, Span::new(0, 2, 1));

        let parsed = parse_src("2 * -x").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(chunks.len(), 3);
        let Chunk::Bracket(bracket) = &chunks[2] else {
            panic!("invalid chunk");
        };
        assert_eq!(ops(&bracket.chunks), vec![Op::Multiply]);

        // leading double minus
        let parsed = parse_src("- -3").expect("input should be valid");
        let chunks = &parsed.statements[0].chunks;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Chunk::Literal(ast::Literal { value, .. }) if value == 3.0));
    }

    #[test]
    fn operator_errors() {
        assert_eq!(parse_err("* 2"), error::Kind::UnexpectedOperator);
        assert_eq!(parse_err("2 * * 3"), error::Kind::UnexpectedToken('*'));
        assert_eq!(parse_err("2 + + 3"), error::Kind::UnexpectedToken('+'));
        assert_eq!(parse_err("2 * / 3"), error::Kind::UnexpectedToken('/'));
        assert_eq!(parse_err("2 - + 3"), error::Kind::UnexpectedToken('+'));
        assert_eq!(parse_err("2 +"), error::Kind::MissingOperand('+'));
        assert_eq!(parse_err("2 * -"), error::Kind::MissingOperand('-'));
        assert_eq!(parse_err("x = 2"), error::Kind::UnexpectedToken('='));
    }

    #[test]
    fn function_definition() {
        let parsed = parse_src("f(x) = x*2\nf(4)").expect("input should be valid");
        assert_eq!(parsed.statements.len(), 1);
        let Some(Symbol::Function(function)) = parsed.symbols.get("f") else {
            panic!("function should be defined");
        };
        assert_eq!(function.params, vec!["x".to_string()]);
        assert_eq!(function.body.len(), 3);
        // body spans point into the full input
        assert_eq!(function.body[0].span(), Span::new(7, 8, 1));

        let Chunk::Call(call) = &parsed.statements[0].chunks[0] else {
            panic!("invalid chunk");
        };
        assert_eq!(call.name, "f");
        assert_eq!(call.args.len(), 1);
    }

    #[test]
    fn function_definition_errors() {
        assert_eq!(
            parse_err("f(x) = x * y"),
            error::Kind::UnknownVariable("y".to_string())
        );
        assert_eq!(
            parse_err("f(x) = (x + pi)"),
            error::Kind::UnknownVariable("pi".to_string())
        );
        assert_eq!(
            parse_err("f(x, x) = x"),
            error::Kind::DuplicateParameter("x".to_string())
        );
        assert_eq!(parse_err("f(x) ="), error::Kind::EmptyBody);
        assert_eq!(parse_err("2 + f(x) = x"), error::Kind::DefinitionNotAllowed);
    }

    #[test]
    fn definition_in_arguments() {
        let src = "g(f(x) = x)";
        let lex = lex::tokenize(src);
        let err = parse(src, &lex.tokens).expect_err("input should be invalid");
        assert_eq!(
            err.cause,
            Cause::Lex(lex::error::Kind::DefinitionNotAllowed)
        );
        assert_eq!(err.category(), report::Category::Binding);
    }

    #[test]
    fn function_call_arguments() {
        let parsed = parse_src("log(8, 2)").expect("input should be valid");
        let Chunk::Call(call) = &parsed.statements[0].chunks[0] else {
            panic!("invalid chunk");
        };
        assert_eq!(call.args.len(), 2);

        // commas inside nested calls do not split the outer call
        let parsed = parse_src("sin(log(8, 2))").expect("input should be valid");
        let Chunk::Call(call) = &parsed.statements[0].chunks[0] else {
            panic!("invalid chunk");
        };
        assert_eq!(call.args.len(), 1);
        assert!(matches!(call.args[0].chunks[0], Chunk::Call(_)));

        assert_eq!(parse_err("log(8, )"), error::Kind::MissingArgument);
    }

    #[test]
    fn function_call_validation() {
        assert_eq!(
            parse_err("g(1)"),
            error::Kind::FunctionNotFound("g".to_string())
        );
        assert_eq!(
            parse_err("pi(1)"),
            error::Kind::NotAFunction("pi".to_string())
        );
        assert_eq!(
            parse_err("f(x) = x\nf(1, 2)"),
            error::Kind::ArityMismatch {
                name: "f".to_string(),
                expected: 1,
                found: 2
            }
        );
        assert_eq!(
            parse_err("log(8)").to_string(),
            "Not enough arguments passed to log"
        );
        assert_eq!(
            parse_err("sin(y)"),
            error::Kind::VariableNotFound("y".to_string())
        );

        // calls inside brackets are validated too
        assert_eq!(
            parse_err("2 * (1 + g(1))"),
            error::Kind::FunctionNotFound("g".to_string())
        );
    }

    #[test]
    fn top_level_calls_see_later_definitions() {
        let parsed = parse_src("f(2)\nf(x) = x + 1").expect("input should be valid");
        assert_eq!(parsed.statements.len(), 1);
    }

    #[test]
    fn calls_in_bodies_use_parameters() {
        parse_src("f(x) = sin(x) + log(x, 2)").expect("input should be valid");
        parse_src("f(x) = x\ng(y) = f(y * 2)").expect("input should be valid");
        assert_eq!(
            parse_err("g(y) = f(y)"),
            error::Kind::FunctionNotFound("f".to_string())
        );
    }

    #[test]
    fn validation_error_points_at_call() {
        let src = "1 + nope(2)";
        let err = parse_src(src).expect_err("input should be invalid");
        assert_eq!(err.span, Some(Span::new(4, 11, 1)));
        assert_eq!(
            err.text,
            ">1 + nope(2)\n>    ^^^^^^^\n>~~~~~~~~~~~\n>Function 'nope' not found"
        );
    }
}
