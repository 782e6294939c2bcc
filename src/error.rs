use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

/// What went wrong while reading a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// `\` as the last character of the pattern.
    TrailingBackslash,
    /// `\c` as the last two characters of the pattern.
    TrailingControl,
    UnrecognizedEscape(char),
    /// A class escape such as `\R` or `\B` inside `[...]`.
    InvalidEscapeInClass(char),
    /// `*`, `+`, `?` or `{n}` with nothing before it.
    NothingToRepeat,
    QuantifierOutOfOrder,
    NumberTooBig,
    MissingTerminatingBracket,
    RangeOutOfOrder,
    MissingCloseParen,
    UnmatchedCloseParen,
    UnterminatedComment,
    UnrecognizedGroupSyntax,
    UnknownVerb(String),
    UnknownPosixClass(String),
    UnknownProperty(String),
    MalformedProperty,
    MalformedHex,
    CharValueTooLarge,
    InvalidGroupName,
    MalformedBackReference,
    NestingTooDeep,
    /// Syntax this engine recognizes but deliberately does not implement.
    Unsupported(&'static str),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrailingBackslash => write!(f, "\\ at end of pattern"),
            Self::TrailingControl => write!(f, "\\c at end of pattern"),
            Self::UnrecognizedEscape(c) => write!(f, "unrecognized escape \\{c}"),
            Self::InvalidEscapeInClass(c) => {
                write!(f, "escape sequence \\{c} is invalid in character class")
            }
            Self::NothingToRepeat => write!(f, "nothing to repeat"),
            Self::QuantifierOutOfOrder => write!(f, "numbers out of order in {{}} quantifier"),
            Self::NumberTooBig => write!(f, "number too big in {{}} quantifier"),
            Self::MissingTerminatingBracket => {
                write!(f, "missing terminating ] for character class")
            }
            Self::RangeOutOfOrder => write!(f, "range out of order in character class"),
            Self::MissingCloseParen => write!(f, "missing )"),
            Self::UnmatchedCloseParen => write!(f, "unmatched parentheses"),
            Self::UnterminatedComment => write!(f, "missing ) after comment"),
            Self::UnrecognizedGroupSyntax => {
                write!(f, "unrecognized character after (? or (?-")
            }
            Self::UnknownVerb(name) => write!(f, "(*{name}) is not recognized"),
            Self::UnknownPosixClass(name) => write!(f, "unknown POSIX class name {name:?}"),
            Self::UnknownProperty(name) => write!(f, "unknown property name {name:?}"),
            Self::MalformedProperty => write!(f, "malformed \\P or \\p sequence"),
            Self::MalformedHex => write!(f, "malformed hexadecimal escape"),
            Self::CharValueTooLarge => write!(f, "character value is not a valid code point"),
            Self::InvalidGroupName => write!(f, "invalid or missing group name"),
            Self::MalformedBackReference => write!(f, "malformed back reference"),
            Self::NestingTooDeep => write!(f, "parentheses are too deeply nested"),
            Self::Unsupported(what) => write!(f, "{what} is not supported"),
        }
    }
}

/// Malformed pattern syntax. `offset` is a byte offset into the pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// A pattern that parsed but cannot be turned into a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompileError {
    #[error("unknown option bits {bits:#x}")]
    BadOption { bits: u32 },
    #[error("invalid newline selector {bits:#x}")]
    BadNewline { bits: u32 },
    #[error("BSR_ANYCRLF and BSR_UNICODE are mutually exclusive")]
    ConflictingBsr,
    #[error("reference to non-existent subpattern {0}")]
    NonexistentGroup(usize),
    #[error("reference to non-existent named subpattern {0:?}")]
    UnknownGroupName(String),
    #[error("two named subpatterns have the same name {0:?}")]
    DuplicateName(String),
    #[error("lookbehind assertion is not fixed length")]
    LookbehindNotFixed,
    #[error("regular expression is too large")]
    TooLarge,
}

/// A match call that had to give up. Distinct from "no match".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecError {
    #[error("match limit exceeded")]
    MatchLimit,
    #[error("recursion limit exceeded")]
    RecursionLimit,
    #[error("invalid UTF-8 in subject at byte {offset}")]
    BadUtf8 { offset: usize },
    #[error("start offset {offset} is past the end of a subject of length {len}")]
    BadOffset { offset: usize, len: usize },
    #[error("unknown or conflicting exec option bits {bits:#x}")]
    BadOption { bits: u32 },
}

impl ExecError {
    /// Numeric code from the error table.
    pub fn code(&self) -> i32 {
        let name = match self {
            Self::MatchLimit => "MATCHLIMIT",
            Self::RecursionLimit => "RECURSIONLIMIT",
            Self::BadUtf8 { .. } => "BADUTF8",
            Self::BadOffset { .. } => "BADOFFSET",
            Self::BadOption { .. } => "BADOPTION",
        };
        error_code(name).unwrap_or(INTERNAL)
    }
}

/// Any failure the public API can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("unknown flag name {0:?}")]
    UnknownFlag(String),
    #[error("unknown info field {0}")]
    UnknownInfoField(String),
    #[error("unknown config field {0}")]
    UnknownConfigField(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

const INTERNAL: i32 = -14;

static ERROR_CODES: &[(&str, i32)] = &[
    ("NOMATCH", -1),
    ("BADOPTION", -3),
    ("NOSUBSTRING", -7),
    ("MATCHLIMIT", -8),
    ("BADUTF8", -10),
    ("PARTIAL", -12),
    ("INTERNAL", INTERNAL),
    ("RECURSIONLIMIT", -21),
    ("BADNEWLINE", -23),
    ("BADOFFSET", -24),
];

static NAME_BY_CODE: Lazy<HashMap<i32, &'static str>> =
    Lazy::new(|| ERROR_CODES.iter().map(|&(name, code)| (code, name)).collect());

static CODE_BY_NAME: Lazy<HashMap<&'static str, i32>> =
    Lazy::new(|| ERROR_CODES.iter().copied().collect());

/// Name for a numeric result code, e.g. `-8` is `"MATCHLIMIT"`.
pub fn error_name(code: i32) -> Cow<'static, str> {
    match NAME_BY_CODE.get(&code) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("unknown error: {code}")),
    }
}

/// Numeric code for a result name. A leading `PCRE_ERROR_` is ignored.
pub fn error_code(name: &str) -> Option<i32> {
    let name = name.strip_prefix("PCRE_ERROR_").unwrap_or(name);
    CODE_BY_NAME.get(name).copied()
}
