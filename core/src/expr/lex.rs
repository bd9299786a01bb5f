use super::{
    position::{CharPos, Span, WithSpan},
    token::{self, Token},
};
use std::iter;

/// Maximum number of characters in a number literal.
pub const MAX_LITERAL_LEN: usize = 8;

/// Which constructs the lexer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Top level input.
    /// Function definitions are allowed, `=` is a token.
    Statement,
    /// Argument lists and function bodies.
    /// Function definitions are rejected, `,` is a token.
    Arguments,
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", fields(src = %src.as_ref())))]
pub fn tokenize(src: impl AsRef<str>) -> Lex {
    Lexer::new(src.as_ref(), Mode::Statement).collect()
}

/// Tokenize a slice of a larger input.
/// `origin` and `line` locate the start of the slice so spans stay
/// relative to the full input.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(origin, line)))]
pub fn tokenize_slice(src: &str, mode: Mode, origin: CharPos, line: usize) -> Lex {
    Lexer::with_origin(src, mode, origin, line).collect()
}

#[derive(Debug, Default)]
pub struct Lex {
    pub tokens: Vec<WithSpan<Token>>,
    pub errors: Vec<WithSpan<error::Kind>>,
}

impl Lex {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.errors.is_empty()
    }
}

impl FromIterator<Result<WithSpan<Token>, WithSpan<error::Kind>>> for Lex {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<WithSpan<Token>, WithSpan<error::Kind>>>,
    {
        let mut lex = Self::default();
        for token in iter {
            match token {
                Ok(token) => lex.tokens.push(token),
                Err(err) => lex.errors.push(err),
            }
        }
        lex
    }
}

#[derive(Clone)]
struct Scanner<'a> {
    /// Iterator over src characters.
    iter: iter::Peekable<iter::Enumerate<std::str::Chars<'a>>>,

    /// Index of the next character.
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        let iter = src.chars().enumerate().peekable();
        Self { iter, pos: 0 }
    }
}

impl<'a> Scanner<'a> {
    /// Peek at the next character without consuming it.
    pub fn peek(&mut self) -> Option<&<Self as Iterator>::Item> {
        self.iter.peek().map(|(_, char)| char)
    }

    /// Consume the next character if it is equal to the expected one.
    pub fn next_if_eq(&mut self, expected: char) -> Option<<Self as Iterator>::Item> {
        let (idx, char) = self.iter.next_if(|(_, char)| expected == *char)?;
        self.pos = idx + 1;
        Some(char)
    }

    /// Consume characters as long as they match the predicate.
    pub fn next_while<F>(&mut self, predicate: F) -> String
    where
        F: Fn(char) -> bool,
    {
        let mut chars = String::new();
        while let Some((idx, char)) = self.iter.next_if(|(_, char)| predicate(*char)) {
            self.pos = idx + 1;
            chars.push(char);
        }
        chars
    }
}

impl<'a> iter::Iterator for Scanner<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        let (idx, char) = self.iter.next()?;
        #[cfg(feature = "tracing")]
        tracing::trace!(?char);

        self.pos = idx + 1;
        Some(char)
    }
}

/// Lazily produces tokens.
/// Lexing continues after an error so all errors in the input can be collected.
pub struct Lexer<'a> {
    it: Scanner<'a>,
    mode: Mode,
    /// Position of the first character in the full input.
    origin: CharPos,
    /// Current line.
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, mode: Mode) -> Self {
        Self::with_origin(src, mode, CharPos(0), 1)
    }

    pub fn with_origin(src: &'a str, mode: Mode, origin: CharPos, line: usize) -> Self {
        Self {
            it: Scanner::new(src),
            mode,
            origin,
            line,
        }
    }

    /// Span from `start` to the current position.
    fn span_from(&self, start: usize) -> Span {
        Span::new(self.origin + start, self.origin + self.it.pos, self.line)
    }

    fn is_blank(ch: char) -> bool {
        ch == ' ' || ch == '\t' || ch == '\r'
    }

    /// Valid first characters of a name are alphabetic (`a-z`, `A-Z`),
    /// underscore (`_`), and `π`.
    fn is_valid_name_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_' || ch == 'π'
    }

    fn is_valid_name_char(ch: char) -> bool {
        Self::is_valid_name_start(ch) || ch.is_ascii_digit()
    }

    /// Parameter lists do not span lines.
    fn is_valid_param_char(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == ',' || ch == ' ' || ch == '\t'
    }

    /// Characters allowed in the body of a function definition.
    fn is_valid_body_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || " \t.,^*/-+()".contains(ch)
    }
}

impl<'a> Lexer<'a> {
    /// Attempt to read `name(params) = body` at the current position.
    /// Nothing is consumed, the advanced scanner is returned instead.
    fn scan_function_def(&self) -> Option<(Scanner<'a>, String, token::FunctionDef)> {
        let mut look = self.it.clone();
        let name = look.next_while(|ch| ch.is_ascii_alphabetic());
        if name.is_empty() {
            return None;
        }
        look.next_if_eq('(')?;
        let params = look.next_while(Self::is_valid_param_char);
        look.next_if_eq(')')?;
        look.next_while(|ch| ch == ' ' || ch == '\t');
        look.next_if_eq('=')?;
        look.next_while(|ch| ch == ' ' || ch == '\t');
        let body_start = self.origin + look.pos;
        let body = look.next_while(Self::is_valid_body_char);

        let def = token::FunctionDef {
            name,
            params: vec![],
            body,
            body_start,
        };
        Some((look, params, def))
    }

    /// Attempt to read `name(args)` at the current position, where the
    /// closing parenthesis matches the opening one on the same line.
    /// Nothing is consumed, the advanced scanner is returned instead.
    fn scan_function_call(&self) -> Option<(Scanner<'a>, token::CallText)> {
        let mut look = self.it.clone();
        let name = look.next_while(|ch| ch.is_ascii_alphabetic());
        if name.is_empty() {
            return None;
        }
        look.next_if_eq('(')?;
        let args_start = self.origin + look.pos;

        let mut depth = 0_usize;
        let mut args = String::new();
        loop {
            let ch = look.next()?;
            match ch {
                '\n' => return None,
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                _ => {}
            }
            args.push(ch);
        }

        Some((
            look,
            token::CallText {
                name,
                args,
                args_start,
            },
        ))
    }

    /// Split a raw parameter list.
    /// `None` if any parameter is not a single word.
    fn split_params(params: &str) -> Option<Vec<String>> {
        if params.trim().is_empty() {
            return Some(vec![]);
        }

        params
            .split(',')
            .map(|param| {
                let param = param.trim();
                if !param.is_empty() && param.chars().all(|ch| ch.is_ascii_alphabetic()) {
                    Some(param.to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    fn match_function_def(
        &mut self,
        start: usize,
    ) -> Option<Result<WithSpan<Token>, WithSpan<error::Kind>>> {
        let (scanner, params, mut def) = self.scan_function_def()?;
        self.it = scanner;
        let span = self.span_from(start);
        #[cfg(feature = "tracing")]
        tracing::debug!(name = ?def.name, ?params, body = ?def.body);

        if self.mode == Mode::Arguments {
            return Some(Err(WithSpan::new(error::Kind::DefinitionNotAllowed, span)));
        }

        let Some(params) = Self::split_params(&params) else {
            return Some(Err(WithSpan::new(
                error::Kind::InvalidParameters { function: def.name },
                span,
            )));
        };
        def.params = params;
        Some(Ok(WithSpan::new(Token::FunctionDef(def), span)))
    }

    fn match_next_token(&mut self) -> Option<Result<WithSpan<Token>, WithSpan<error::Kind>>> {
        self.it.next_while(Self::is_blank);
        let char = *self.it.peek()?;
        let start = self.it.pos;

        if char.is_ascii_alphabetic() {
            if let Some(def) = self.match_function_def(start) {
                return Some(def);
            }

            if let Some((scanner, call)) = self.scan_function_call() {
                self.it = scanner;
                let span = self.span_from(start);
                return Some(Ok(WithSpan::new(Token::FunctionCall(call), span)));
            }
        }

        let char = self.it.next().expect("peeked character should be present");
        let token = match char {
            '\n' => {
                let rest = self.it.next_while(|ch| ch == '\n' || Self::is_blank(ch));
                let span = self.span_from(start);
                self.line += 1 + rest.matches('\n').count();
                Ok(WithSpan::new(Token::Newline, span))
            }

            '(' => Ok(WithSpan::new(Token::ParenLeft, self.span_from(start))),
            ')' => Ok(WithSpan::new(Token::ParenRight, self.span_from(start))),
            '=' if self.mode == Mode::Statement => {
                Ok(WithSpan::new(Token::Equal, self.span_from(start)))
            }
            ',' if self.mode == Mode::Arguments => {
                Ok(WithSpan::new(Token::Comma, self.span_from(start)))
            }

            '^' | '/' | '*' | '+' | '-' => {
                let op = token::Op::from_char(char).expect("character should be an operator");
                Ok(WithSpan::new(Token::Operator(op), self.span_from(start)))
            }

            char if char.is_ascii_digit() || char == '.' => {
                let rest = self.it.next_while(|ch| ch.is_ascii_digit() || ch == '.');
                let value = iter::once(char).chain(rest.chars()).collect::<String>();
                let span = self.span_from(start);

                if value.chars().count() > MAX_LITERAL_LEN {
                    Err(WithSpan::new(error::Kind::NumberTooLong, span))
                } else {
                    match value.parse::<f64>() {
                        Ok(number) => Ok(WithSpan::new(Token::Number(number), span)),
                        Err(_) => Err(WithSpan::new(error::Kind::InvalidNumber(value), span)),
                    }
                }
            }

            char if Self::is_valid_name_start(char) => {
                let rest = self.it.next_while(Self::is_valid_name_char);
                let value = iter::once(char).chain(rest.chars()).collect::<String>();
                Ok(WithSpan::new(Token::Name(value), self.span_from(start)))
            }

            char => Err(WithSpan::new(
                error::Kind::InvalidCharacter(char),
                self.span_from(start),
            )),
        };

        Some(token)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<WithSpan<Token>, WithSpan<error::Kind>>;
    fn next(&mut self) -> Option<Self::Item> {
        self.match_next_token()
    }
}

pub mod error {
    use crate::expr::report::Category;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum Kind {
        /// A character that does not start any token.
        #[error("Invalid syntax: {0}")]
        InvalidCharacter(char),

        /// Number literal is longer than [`MAX_LITERAL_LEN`](super::MAX_LITERAL_LEN).
        #[error("Number is too large or too precise")]
        NumberTooLong,

        /// Number literal could not be converted.
        /// e.g. `1.2.3`
        #[error("Invalid number: '{0}'")]
        InvalidNumber(String),

        /// A function definition inside an argument list or function body.
        #[error("Functions are not allowed here")]
        DefinitionNotAllowed,

        /// Parameters of a function definition must be single words.
        #[error("Invalid parameter list for function '{function}'")]
        InvalidParameters { function: String },
    }

    impl Kind {
        pub fn category(&self) -> Category {
            match self {
                Self::DefinitionNotAllowed => Category::Binding,
                Self::InvalidCharacter(_)
                | Self::NumberTooLong
                | Self::InvalidNumber(_)
                | Self::InvalidParameters { .. } => Category::Lexical,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(lex: &Lex) -> Vec<token::Kind> {
        lex.tokens
            .iter()
            .map(|token| token::Kind::from_token(&token.value))
            .collect()
    }

    #[test]
    fn tokenize_empty() {
        let input = "";
        let lex = tokenize(input);
        assert!(lex.is_empty());

        let input = " \t\r";
        let lex = tokenize(input);
        assert!(lex.is_empty());
    }

    #[test]
    fn tokenize_number() {
        let input = "3";
        let lex = tokenize(input);
        assert_eq!(lex.tokens.len(), 1);
        assert!(lex.errors.is_empty());
        assert_eq!(lex.tokens[0].value, Token::Number(3.0));
        assert_eq!(lex.tokens[0].span, Span::new(0, 1, 1));

        let input = "3.25";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(lex.tokens[0].value, Token::Number(3.25));

        let input = ".5";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(lex.tokens[0].value, Token::Number(0.5));

        let input = "99999999";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(lex.tokens[0].value, Token::Number(99_999_999.0));
    }

    #[test]
    fn tokenize_number_too_long() {
        let input = "123456789";
        let lex = tokenize(input);
        assert!(lex.tokens.is_empty());
        assert_eq!(lex.errors.len(), 1);
        let err = &lex.errors[0];
        assert_eq!(err.value, error::Kind::NumberTooLong);
        assert_eq!(err.span, Span::new(0, 9, 1));

        let input = "1.2345678";
        let lex = tokenize(input);
        assert_eq!(lex.errors[0].value, error::Kind::NumberTooLong);
    }

    #[test]
    fn tokenize_number_invalid() {
        let input = "1.2.3";
        let lex = tokenize(input);
        assert!(lex.tokens.is_empty());
        assert_eq!(
            lex.errors[0].value,
            error::Kind::InvalidNumber("1.2.3".to_string())
        );

        let input = "2 + .";
        let lex = tokenize(input);
        assert_eq!(lex.tokens.len(), 2);
        assert_eq!(lex.errors[0].value, error::Kind::InvalidNumber(".".to_string()));
        assert_eq!(lex.errors[0].span, Span::new(4, 5, 1));
    }

    #[test]
    fn tokenize_name() {
        for input in ["a", "a_b", "x2", "_tmp", "π"] {
            let lex = tokenize(input);
            assert!(lex.errors.is_empty());
            assert_eq!(lex.tokens.len(), 1);
            assert_eq!(lex.tokens[0].value, Token::Name(input.to_string()));
        }
    }

    #[test]
    fn tokenize_operators() {
        let input = "1 ^ 2 / 3 * 4 + 5 - 6";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        let ops = lex
            .tokens
            .iter()
            .filter_map(|token| match token.value {
                Token::Operator(op) => Some(op),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(ops, token::Op::PRECEDENCE.to_vec());
    }

    #[test]
    fn tokenize_function_def() {
        let input = "f(x, y) = x * y";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(lex.tokens.len(), 1);
        let token = &lex.tokens[0];
        assert_eq!(token.span, Span::new(0, 15, 1));
        let Token::FunctionDef(def) = &token.value else {
            panic!("incorrect token kind");
        };
        assert_eq!(def.name, "f");
        assert_eq!(def.params, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(def.body, "x * y");
        assert_eq!(def.body_start, CharPos(10));
    }

    #[test]
    fn tokenize_function_def_stops_at_newline() {
        let input = "f(x) = x*2\nf(4)";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(
            kinds(&lex),
            vec![
                token::Kind::FunctionDef,
                token::Kind::Newline,
                token::Kind::FunctionCall
            ]
        );
        assert_eq!(lex.tokens[2].span.line, 2);
    }

    #[test]
    fn tokenize_function_def_invalid_params() {
        let input = "f(x,,y) = x";
        let lex = tokenize(input);
        assert_eq!(lex.errors.len(), 1);
        assert!(matches!(
            lex.errors[0].value,
            error::Kind::InvalidParameters { .. }
        ));
    }

    #[test]
    fn tokenize_function_def_params_on_one_line() {
        let input = "f(x,\ny) = x + y";
        let lex = tokenize(input);
        assert!(!kinds(&lex).contains(&token::Kind::FunctionDef));
        assert!(kinds(&lex).contains(&token::Kind::Newline));
    }

    #[test]
    fn tokenize_function_call() {
        let input = "log(8, 2) + 1";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(
            kinds(&lex),
            vec![
                token::Kind::FunctionCall,
                token::Kind::Operator,
                token::Kind::Number
            ]
        );
        let Token::FunctionCall(call) = &lex.tokens[0].value else {
            panic!("incorrect token kind");
        };
        assert_eq!(call.name, "log");
        assert_eq!(call.args, "8, 2");
        assert_eq!(call.args_start, CharPos(4));

        // nested parentheses belong to the call
        let input = "f((1 + 2) * 3)";
        let lex = tokenize(input);
        let Token::FunctionCall(call) = &lex.tokens[0].value else {
            panic!("incorrect token kind");
        };
        assert_eq!(call.args, "(1 + 2) * 3");
    }

    #[test]
    fn tokenize_function_call_unclosed() {
        let input = "f(2";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(
            kinds(&lex),
            vec![token::Kind::Name, token::Kind::ParenLeft, token::Kind::Number]
        );
    }

    #[test]
    fn tokenize_name_before_bracket() {
        // a space separates a name from a bracket
        let input = "x (1)";
        let lex = tokenize(input);
        assert_eq!(
            kinds(&lex),
            vec![
                token::Kind::Name,
                token::Kind::ParenLeft,
                token::Kind::Number,
                token::Kind::ParenRight
            ]
        );
    }

    #[test]
    fn tokenize_newlines() {
        let input = "1\n\n\r\n2\n3";
        let lex = tokenize(input);
        assert!(lex.errors.is_empty());
        assert_eq!(
            kinds(&lex),
            vec![
                token::Kind::Number,
                token::Kind::Newline,
                token::Kind::Number,
                token::Kind::Newline,
                token::Kind::Number
            ]
        );
        assert_eq!(lex.tokens[2].span.line, 4);
        assert_eq!(lex.tokens[4].span.line, 5);
    }

    #[test]
    fn tokenize_invalid_character() {
        let input = "2 # 3";
        let lex = tokenize(input);
        assert_eq!(lex.tokens.len(), 2);
        assert_eq!(lex.errors.len(), 1);
        let err = &lex.errors[0];
        assert_eq!(err.value, error::Kind::InvalidCharacter('#'));
        assert_eq!(err.span, Span::new(2, 3, 1));

        // commas only exist in argument lists
        let lex = tokenize("1, 2");
        assert_eq!(lex.errors[0].value, error::Kind::InvalidCharacter(','));
    }

    #[test]
    fn tokenize_arguments_mode() {
        let lex = tokenize_slice("1, x", Mode::Arguments, CharPos(10), 3);
        assert!(lex.errors.is_empty());
        assert_eq!(
            kinds(&lex),
            vec![token::Kind::Number, token::Kind::Comma, token::Kind::Name]
        );
        assert_eq!(lex.tokens[2].span, Span::new(13, 14, 3));

        let lex = tokenize_slice("g(x) = x", Mode::Arguments, CharPos(0), 1);
        assert_eq!(lex.errors.len(), 1);
        assert_eq!(lex.errors[0].value, error::Kind::DefinitionNotAllowed);

        let lex = tokenize_slice("x = 1", Mode::Arguments, CharPos(0), 1);
        assert_eq!(lex.errors[0].value, error::Kind::InvalidCharacter('='));
    }

    #[test]
    fn lexer_is_lazy() {
        let mut lexer = Lexer::new("1 # 2", Mode::Statement);
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(matches!(lexer.next(), Some(Err(_))));
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(lexer.next().is_none());
    }
}
