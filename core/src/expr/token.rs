use super::position::CharPos;

/// Binary operators, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    /// `^`
    Exp,
    /// `/`
    Divide,
    /// `*`
    Multiply,
    /// `+`
    Add,
    /// `-`
    Subtract,
}

impl Op {
    /// Operator classes from highest to lowest precedence.
    /// Each class is fully resolved, left to right, before the next one.
    pub const PRECEDENCE: [Self; 5] = [
        Self::Exp,
        Self::Divide,
        Self::Multiply,
        Self::Add,
        Self::Subtract,
    ];

    pub fn as_char(&self) -> char {
        match self {
            Self::Exp => '^',
            Self::Divide => '/',
            Self::Multiply => '*',
            Self::Add => '+',
            Self::Subtract => '-',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '^' => Some(Self::Exp),
            '/' => Some(Self::Divide),
            '*' => Some(Self::Multiply),
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            _ => None,
        }
    }
}

/// `name(params) = body`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
    /// Position of the first character of `body`.
    pub body_start: CharPos,
}

/// `name(args)`
/// The argument list is kept as raw text and re-lexed by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct CallText {
    pub name: String,
    pub args: String,
    /// Position of the first character of `args`.
    pub args_start: CharPos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    FunctionDef(FunctionDef),
    FunctionCall(CallText),
    Name(String),
    Number(f64),
    Operator(Op),
    Newline,
    Comma,
    Equal,
    ParenLeft,
    ParenRight,
}

/// Kind of token without any data.
/// Should match the variants in [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    FunctionDef,
    FunctionCall,
    Name,
    Number,
    Operator,
    Newline,
    Comma,
    Equal,
    ParenLeft,
    ParenRight,
}

impl Kind {
    pub fn from_token(token: &Token) -> Self {
        match token {
            Token::FunctionDef(_) => Self::FunctionDef,
            Token::FunctionCall(_) => Self::FunctionCall,
            Token::Name(_) => Self::Name,
            Token::Number(_) => Self::Number,
            Token::Operator(_) => Self::Operator,
            Token::Newline => Self::Newline,
            Token::Comma => Self::Comma,
            Token::Equal => Self::Equal,
            Token::ParenLeft => Self::ParenLeft,
            Token::ParenRight => Self::ParenRight,
        }
    }
}
