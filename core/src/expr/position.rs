/// Index of a character in the request text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, derive_more::Deref, derive_more::From)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharPos(pub usize);

impl std::ops::Add<usize> for CharPos {
    type Output = Self;
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Location of a token.
/// Offsets are always relative to the full request text,
/// even for tokens produced by re-lexing a slice of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: CharPos,
    pub end: CharPos,
    /// 1-based line number.
    pub line: usize,
}

impl Span {
    pub fn new(start: impl Into<CharPos>, end: impl Into<CharPos>, line: usize) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            line,
        }
    }

    /// Smallest span covering both spans.
    /// Keeps the line of `self`.
    pub fn join(&self, other: &Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line,
        }
    }

    /// Number of characters covered.
    pub(crate) fn len(&self) -> usize {
        self.end.0.saturating_sub(self.start.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithSpan<T> {
    pub value: T,
    pub span: Span,
}

impl<T> WithSpan<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }
}
