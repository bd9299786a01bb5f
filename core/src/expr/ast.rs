use super::{position::Span, token::Op};

/// One element of a statement.
#[derive(Debug, Clone, derive_more::From, PartialEq)]
pub enum Chunk {
    Literal(Literal),
    Name(Name),
    Operator(Operator),
    Bracket(Bracket),
    Call(FunctionCall),
}

impl Chunk {
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(chunk) => chunk.span,
            Self::Name(chunk) => chunk.span,
            Self::Operator(chunk) => chunk.span,
            Self::Bracket(chunk) => chunk.span,
            Self::Call(chunk) => chunk.span,
        }
    }

    /// If the chunk produces a value, as opposed to an operator.
    pub fn is_operand(&self) -> bool {
        !matches!(self, Self::Operator(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: f64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub op: Op,
    pub span: Span,
    /// Inserted by the parser rather than written by the user.
    /// e.g. implicit multiplication in `2(x + 1)`.
    pub synthetic: bool,
}

impl Operator {
    pub fn new(op: Op, span: Span) -> Self {
        Self {
            op,
            span,
            synthetic: false,
        }
    }

    pub fn synthetic(op: Op, span: Span) -> Self {
        Self {
            op,
            span,
            synthetic: true,
        }
    }
}

/// Parenthesized sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    pub chunks: Vec<Chunk>,
    /// From the opening to the closing parenthesis.
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub span: Span,
}

/// A single statement.
#[derive(Debug, Clone, PartialEq, derive_more::Deref)]
pub struct Expression {
    pub chunks: Vec<Chunk>,
}

impl Expression {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// Line the statement starts on.
    pub fn line(&self) -> Option<usize> {
        self.chunks.first().map(|chunk| chunk.span().line)
    }
}
