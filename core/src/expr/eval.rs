use super::{
    ast::{self, Chunk},
    parse,
    position::{Span, WithSpan},
    report::{self, Diagnostic, OperatorWindow},
    symbols::{Native, Symbol, SymbolTable},
    token::Op,
};
use std::{cell::Cell, collections::HashMap, fmt};

/// Largest absolute value allowed as an operand.
pub const MAX_OPERAND: f64 = 99_999_999.0;

/// Maximum nesting of user function calls.
pub const MAX_CALL_DEPTH: usize = 64;

/// Maximum nesting of brackets and call arguments within a single
/// statement or function body.
pub const MAX_NESTING: usize = 32;

/// Maximum nesting while evaluating, counting brackets, arguments and
/// calls across function bodies.
pub const MAX_FRAMES: usize = 512;

/// Maximum number of calls made by one evaluator.
pub const MAX_CALLS: usize = 10_000;

/// Local variables.
pub type Namespace = HashMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Number(f64),
    Payload(Payload),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        if let Self::Number(value) = self {
            Some(*value)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", format_number(*value)),
            Self::Payload(payload) => write!(f, "{payload}"),
        }
    }
}

/// Result of a builtin whose output is handled by the host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Payload {
    /// Name of the builtin that produced it.
    pub name: String,
    pub args: Vec<f64>,
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self
            .args
            .iter()
            .map(|arg| format_number(*arg))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({args})", self.name)
    }
}

/// Render a number.
///
/// + Integral values keep one decimal: `14.0`.
/// + Other values use the shortest representation that round trips.
/// + Very large or small magnitudes use an exponent: `1e+16`.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude >= 1e16 || (magnitude != 0.0 && magnitude < 1e-4) {
        let text = format!("{value:e}");
        let Some((mantissa, exponent)) = text.split_once('e') else {
            return text;
        };
        let Ok(exponent) = exponent.parse::<i32>() else {
            return text;
        };
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[derive(Debug, thiserror::Error, derive_more::From)]
pub enum Error {
    /// The statement is invalid.
    /// Invalidates the whole input.
    #[error(transparent)]
    Diagnostic(Diagnostic),

    /// Division by exactly zero.
    /// Only the statement containing it fails.
    #[from(skip)]
    #[error("division by zero")]
    DivisionByZero { span: Span },
}

/// Operand or operator of a partially reduced statement.
#[derive(Debug)]
enum Item {
    Value(WithSpan<Value>),
    Op(ast::Operator),
}

/// How deep an evaluation is.
#[derive(Debug, Clone, Copy, Default)]
struct Depth {
    /// User function calls.
    calls: usize,
    frames: usize,
}

/// Evaluates statements against a symbol table.
///
/// Every call made through an evaluator counts towards [`MAX_CALLS`],
/// so one evaluator should be used per request.
pub struct Evaluator<'a> {
    /// Full input, for diagnostics.
    src: &'a str,
    symbols: &'a SymbolTable,
    calls: Cell<usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(src: &'a str, symbols: &'a SymbolTable) -> Self {
        Self {
            src,
            symbols,
            calls: Cell::new(0),
        }
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn error(&self, span: Span, cause: impl Into<report::Cause>) -> Error {
        Diagnostic::at_token(self.src, span, cause).into()
    }

    /// Evaluate a statement.
    /// Names are looked up in `namespace` first, then in the global constants.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub fn evaluate(&self, chunks: &[Chunk], namespace: &Namespace) -> Result<Value, Error> {
        self.eval_chunks(chunks, namespace, Depth::default())
    }

    /// Descend one frame into the chunk at `span`.
    fn enter(&self, depth: Depth, span: Span) -> Result<Depth, Error> {
        if depth.frames >= MAX_FRAMES {
            return Err(self.error(span, error::Kind::NestingTooDeep));
        }
        Ok(Depth {
            frames: depth.frames + 1,
            ..depth
        })
    }

    fn eval_chunks(
        &self,
        chunks: &[Chunk],
        namespace: &Namespace,
        depth: Depth,
    ) -> Result<Value, Error> {
        match chunks {
            [] => Err(Diagnostic::plain(error::Kind::EmptyExpression).into()),
            [chunk] => self.operand(chunk, namespace, depth),
            chunks => {
                let items = chunks
                    .iter()
                    .map(|chunk| match chunk {
                        Chunk::Operator(operator) => Ok(Item::Op(operator.clone())),
                        chunk => {
                            let value = self.operand(chunk, namespace, depth)?;
                            Ok(Item::Value(WithSpan::new(value, chunk.span())))
                        }
                    })
                    .collect::<Result<Vec<_>, Error>>()?;

                self.reduce(items)
            }
        }
    }

    /// Value of a single chunk.
    fn operand(&self, chunk: &Chunk, namespace: &Namespace, depth: Depth) -> Result<Value, Error> {
        match chunk {
            Chunk::Literal(literal) => Ok(Value::Number(literal.value)),
            Chunk::Name(name) => self.lookup(name, namespace).map(Value::Number),
            Chunk::Bracket(bracket) => {
                let depth = self.enter(depth, bracket.span)?;
                self.eval_chunks(&bracket.chunks, namespace, depth)
            }
            Chunk::Call(call) => self.call(call, namespace, depth),
            Chunk::Operator(operator) => Err(self.error(
                operator.span,
                error::Kind::MissingOperand(operator.op.as_char()),
            )),
        }
    }

    fn lookup(&self, name: &ast::Name, namespace: &Namespace) -> Result<f64, Error> {
        namespace
            .get(&name.value)
            .copied()
            .or_else(|| self.symbols.constant(&name.value))
            .ok_or_else(|| {
                self.error(
                    name.span,
                    error::Kind::VariableNotFound(name.value.clone()),
                )
            })
    }

    /// Resolve operators one class at a time, in precedence order.
    /// Within a class operators are resolved left to right.
    fn reduce(&self, mut items: Vec<Item>) -> Result<Value, Error> {
        for class in Op::PRECEDENCE {
            if items.len() <= 1 {
                break;
            }

            let mut next = Vec::with_capacity(items.len());
            let mut iter = items.into_iter();
            while let Some(item) = iter.next() {
                let operator = match item {
                    Item::Op(operator) if operator.op == class => operator,
                    item => {
                        next.push(item);
                        continue;
                    }
                };

                let Some(Item::Value(left)) = next.pop() else {
                    return Err(self.error(
                        operator.span,
                        error::Kind::MissingOperand(operator.op.as_char()),
                    ));
                };
                let Some(Item::Value(right)) = iter.next() else {
                    return Err(self.error(
                        operator.span,
                        error::Kind::MissingOperand(operator.op.as_char()),
                    ));
                };

                let neighbors = (next.last(), iter.as_slice().first());
                let value = self.apply(&operator, left, right, neighbors)?;
                next.push(Item::Value(value));
            }

            items = next;
        }

        match items.pop() {
            Some(Item::Value(value)) if items.is_empty() => Ok(value.value),
            Some(Item::Op(operator)) => Err(self.error(
                operator.span,
                error::Kind::MissingOperand(operator.op.as_char()),
            )),
            _ => Err(Diagnostic::plain(error::Kind::EmptyExpression).into()),
        }
    }

    /// Apply a binary operator.
    /// `neighbors` are the items before and after the operation,
    /// shown if an operand is out of range.
    fn apply(
        &self,
        operator: &ast::Operator,
        left: WithSpan<Value>,
        right: WithSpan<Value>,
        neighbors: (Option<&Item>, Option<&Item>),
    ) -> Result<WithSpan<Value>, Error> {
        let lhs = self.number(&left)?;
        let rhs = self.number(&right)?;

        let side = if lhs.abs() > MAX_OPERAND {
            Some(Side::Left)
        } else if rhs.abs() > MAX_OPERAND {
            Some(Side::Right)
        } else {
            None
        };
        if let Some(side) = side {
            let (before, after) = neighbors;
            let window = OperatorWindow {
                before: before.map(|item| self.item_text(item)),
                left: report::slice(self.src, &left.span),
                op: operator.op.as_char(),
                right: report::slice(self.src, &right.span),
                after: after.map(|item| self.item_text(item)),
                left_value: format_number(lhs),
                right_value: format_number(rhs),
            };
            return Err(
                Diagnostic::at_operator(&window, operator.span, error::Kind::OperandTooLarge(side))
                    .into(),
            );
        }

        let value = match operator.op {
            Op::Exp => lhs.powf(rhs),
            Op::Divide => {
                if rhs == 0.0 {
                    return Err(Error::DivisionByZero {
                        span: operator.span,
                    });
                }
                lhs / rhs
            }
            Op::Multiply => lhs * rhs,
            Op::Add => lhs + rhs,
            Op::Subtract => lhs - rhs,
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(lhs, op = ?operator.op, rhs, value);

        let span = left.span.join(&right.span);
        Ok(WithSpan::new(Value::Number(value), span))
    }

    fn number(&self, value: &WithSpan<Value>) -> Result<f64, Error> {
        match &value.value {
            Value::Number(number) => Ok(*number),
            Value::Payload(payload) => Err(self.error(
                value.span,
                error::Kind::PayloadOperand(payload.name.clone()),
            )),
        }
    }

    fn item_text(&self, item: &Item) -> String {
        match item {
            Item::Value(value) => report::slice(self.src, &value.span),
            Item::Op(operator) => operator.op.as_char().to_string(),
        }
    }

    /// Execute a call.
    /// Arguments are evaluated in the caller's namespace.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, call, namespace), fields(name = %call.name)))]
    fn call(
        &self,
        call: &ast::FunctionCall,
        namespace: &Namespace,
        depth: Depth,
    ) -> Result<Value, Error> {
        let calls = self.calls.get() + 1;
        if calls > MAX_CALLS {
            return Err(self.error(call.span, error::Kind::CallLimitExceeded));
        }
        self.calls.set(calls);
        let depth = self.enter(depth, call.span)?;

        let Some(symbol) = self.symbols.get(&call.name) else {
            return Err(self.error(
                call.span,
                parse::error::Kind::FunctionNotFound(call.name.clone()),
            ));
        };
        let Some(params) = symbol.params() else {
            return Err(self.error(call.span, parse::error::Kind::NotAFunction(call.name.clone())));
        };
        // A redefinition may change the arity after the call was validated.
        if params.len() != call.args.len() {
            return Err(self.error(
                call.span,
                parse::error::Kind::ArityMismatch {
                    name: call.name.clone(),
                    expected: params.len(),
                    found: call.args.len(),
                },
            ));
        }

        let args = call
            .args
            .iter()
            .map(|arg| {
                let value = self.eval_chunks(&arg.chunks, namespace, depth)?;
                let span = arg
                    .chunks
                    .iter()
                    .map(Chunk::span)
                    .reduce(|span, next| span.join(&next))
                    .unwrap_or(call.span);
                self.number(&WithSpan::new(value, span))
            })
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(?args, depth = depth.calls, calls, "call function");

        match symbol {
            Symbol::Builtin(builtin) => match builtin.native {
                Native::Number(native) => Ok(Value::Number(native(&args))),
                Native::Payload => Ok(Value::Payload(Payload {
                    name: call.name.clone(),
                    args,
                })),
            },

            Symbol::Function(function) => {
                if depth.calls >= MAX_CALL_DEPTH {
                    return Err(self.error(call.span, error::Kind::CallDepthExceeded));
                }
                let depth = Depth {
                    calls: depth.calls + 1,
                    ..depth
                };

                let scope = function
                    .params
                    .iter()
                    .cloned()
                    .zip(args)
                    .collect::<Namespace>();
                self.eval_chunks(&function.body, &scope, depth)
            }

            Symbol::Constant(_) => unreachable!("constants do not have parameters"),
        }
    }
}

/// Operand of a binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    #[display("left")]
    Left,
    #[display("right")]
    Right,
}

pub mod error {
    use super::Side;
    use crate::expr::report::Category;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum Kind {
        /// A name that is neither local nor a global constant.
        #[error("Variable '{0}' does not exist")]
        VariableNotFound(String),

        /// An operand whose absolute value exceeds [`MAX_OPERAND`](super::MAX_OPERAND).
        #[error("Number ({0}) is larger than the permissible values")]
        OperandTooLarge(Side),

        /// A payload used in arithmetic.
        #[error("Cannot use the result of '{0}' in arithmetic")]
        PayloadOperand(String),

        /// Nested user function calls exceeded [`MAX_CALL_DEPTH`](super::MAX_CALL_DEPTH).
        #[error("Maximum call depth exceeded")]
        CallDepthExceeded,

        /// Evaluation nested beyond [`MAX_FRAMES`](super::MAX_FRAMES).
        #[error("Expression is nested too deeply")]
        NestingTooDeep,

        /// More than [`MAX_CALLS`](super::MAX_CALLS) calls in one request.
        #[error("Too many function calls")]
        CallLimitExceeded,

        #[error("Missing operand for '{0}'")]
        MissingOperand(char),

        #[error("Empty expression")]
        EmptyExpression,

        /// Requested statement does not exist.
        #[error("No statement at index {0}")]
        NoStatement(usize),
    }

    impl Kind {
        pub fn category(&self) -> Category {
            match self {
                Self::VariableNotFound(_) => Category::Binding,
                Self::OperandTooLarge(_) => Category::Magnitude,
                Self::PayloadOperand(_)
                | Self::CallDepthExceeded
                | Self::NestingTooDeep
                | Self::CallLimitExceeded
                | Self::MissingOperand(_)
                | Self::EmptyExpression
                | Self::NoStatement(_) => Category::Structural,
            }
        }
    }
}
