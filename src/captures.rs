use std::borrow::Cow;
use std::ops::Range;

use crate::error::ExecError;

/// A half-open range of codepoint offsets into a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span::new(start, end)
    }
}

/// Spans of the whole match (index 0) and of every capturing group.
/// A group that did not take part in the match is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    spans: Vec<Option<Span>>,
}

impl Captures {
    pub(crate) fn from_slots(slots: &[Option<usize>]) -> Self {
        let spans = slots
            .chunks(2)
            .map(|pair| match *pair {
                [Some(start), Some(end)] if start <= end => Some(Span::new(start, end)),
                _ => None,
            })
            .collect();
        Self { spans }
    }

    /// The span of group `index`, or `None` if it is unset or out of range.
    pub fn get(&self, index: usize) -> Option<Span> {
        self.spans.get(index).copied().flatten()
    }

    /// The whole match.
    pub fn span(&self) -> Span {
        self.get(0).unwrap_or_default()
    }

    /// Always the capture count plus one.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Span>> + '_ {
        self.spans.iter().copied()
    }

    /// Integer pairs with `(-1, -1)` for unset groups.
    pub fn to_offsets(&self) -> Vec<(i64, i64)> {
        self.iter()
            .map(|span| match span {
                Some(span) => (span.start as i64, span.end as i64),
                None => (-1, -1),
            })
            .collect()
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::new(0, 0)
    }
}

/// What one search produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Match(Captures),
    /// The subject ran out in the middle of a possible match.
    Partial(Span),
    NoMatch,
}

impl Outcome {
    pub fn captures(self) -> Option<Captures> {
        match self {
            Outcome::Match(caps) => Some(caps),
            _ => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match(_))
    }
}

/// Text prepared for matching: decoded once into codepoints so every
/// offset is a codepoint index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subject {
    chars: Vec<char>,
}

impl Subject {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
        }
    }

    /// Decode raw bytes. With `utf8` the bytes must be valid UTF-8 when
    /// `check` is set and are decoded lossily otherwise; without `utf8`
    /// every byte is one Latin-1 character.
    pub fn from_bytes(bytes: &[u8], utf8: bool, check: bool) -> Result<Self, ExecError> {
        if !utf8 {
            return Ok(Self {
                chars: bytes.iter().map(|&b| char::from(b)).collect(),
            });
        }
        let text = if check {
            Cow::Borrowed(std::str::from_utf8(bytes).map_err(|e| ExecError::BadUtf8 {
                offset: e.valid_up_to(),
            })?)
        } else {
            String::from_utf8_lossy(bytes)
        };
        Ok(Self::new(&text))
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// The text covered by `span`, or `None` when the span runs past the
    /// end of the subject.
    pub fn slice(&self, span: Span) -> Option<String> {
        self.chars.get(span.range()).map(|chars| chars.iter().collect())
    }
}

impl From<&str> for Subject {
    fn from(text: &str) -> Self {
        Subject::new(text)
    }
}
