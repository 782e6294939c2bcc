//! A backtracking regular-expression engine for the Perl/PCRE dialect.
//!
//! Patterns are parsed into an AST, compiled into a small instruction set
//! and run by a backtracking matcher with leftmost-first semantics. Every
//! offset the engine reports is a codepoint index into the subject.
//!
//! ```
//! use rexec::Regex;
//!
//! let re = Regex::new(r"(?<year>\d{4})-(?<month>\d{2})").unwrap();
//! let caps = re.captures("on 2024-05").unwrap().unwrap();
//! assert_eq!(caps.get(1).map(|s| (s.start, s.end)), Some((3, 7)));
//! assert_eq!(re.name_indices("month"), Some(&[2][..]));
//! ```

pub mod ast;
pub mod captures;
pub mod class;
pub mod compiler;
pub mod config;
pub mod error;
pub mod flags;
pub mod info;
pub mod matcher;
pub mod parser;
pub mod program;
pub mod study;
pub mod unicode;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::trace;

pub use crate::captures::{Captures, Outcome, Span, Subject};
pub use crate::config::{config, library_utf, version, ConfigField, ConfigValue, Limits};
pub use crate::error::{error_code, error_name, CompileError, Error, ExecError, ParseError, Result};
pub use crate::flags::{CompileFlags, ExecFlags, Options, StudyFlags};
pub use crate::info::{InfoField, InfoValue};
pub use crate::program::Program;

/// A compiled pattern together with the limits its searches run under.
///
/// Cloning is cheap: the program is shared. Two handles are equal when
/// they were compiled from the same text with the same options.
#[derive(Debug, Clone)]
pub struct Regex {
    pattern: String,
    options: CompileFlags,
    program: Arc<Program>,
    limits: Limits,
}

impl Regex {
    /// Compile `pattern` with default options.
    pub fn new(pattern: &str) -> Result<Regex> {
        RegexBuilder::new().build(pattern)
    }

    /// Compile `pattern` with a flag mask or a list of flag names.
    pub fn with_options(pattern: &str, options: impl Into<Options>) -> Result<Regex> {
        RegexBuilder::new().options(options).build(pattern)
    }

    pub fn builder() -> RegexBuilder {
        RegexBuilder::new()
    }

    /// The source text.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// The options the pattern was compiled with.
    pub fn options(&self) -> CompileFlags {
        self.options
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn capture_count(&self) -> usize {
        self.program.capture_count
    }

    /// One search starting at codepoint `start`.
    pub fn exec(&self, subject: &Subject, start: usize, options: impl Into<Options>) -> Result<Outcome> {
        let flags = options.into().exec_flags()?;
        trace!("exec {self} at {start} with {flags:?}");
        Ok(matcher::exec(
            &self.program,
            subject.chars(),
            start,
            flags,
            &self.limits,
        )?)
    }

    /// Like [`Regex::exec`] for raw bytes. The bytes are UTF-8 when the
    /// pattern was compiled with `UTF8` and Latin-1 otherwise.
    pub fn exec_bytes(&self, bytes: &[u8], start: usize, options: impl Into<Options>) -> Result<Outcome> {
        let flags = options.into().exec_flags()?;
        let subject = Subject::from_bytes(
            bytes,
            self.program.flags.contains(CompileFlags::UTF8),
            !flags.contains(ExecFlags::NO_UTF8_CHECK),
        )?;
        self.exec(&subject, start, flags)
    }

    /// The leftmost match in `text`, if any.
    pub fn captures(&self, text: &str) -> Result<Option<Captures>> {
        Ok(self.exec(&Subject::new(text), 0, ExecFlags::empty())?.captures())
    }

    pub fn is_match(&self, text: &str) -> Result<bool> {
        Ok(self.captures(text)?.is_some())
    }

    /// Successive non-overlapping matches.
    pub fn find_iter(&self, text: &str) -> Matches<'_> {
        Matches {
            regex: self,
            subject: Subject::new(text),
            next_start: 0,
            after_empty: false,
            done: false,
        }
    }

    /// A copy of this handle whose program carries study data.
    pub fn study(&self, options: impl Into<Options>) -> Result<Regex> {
        let flags = options.into().study_flags()?;
        Ok(Regex {
            program: Arc::new(study::study(&self.program, flags)),
            ..self.clone()
        })
    }

    pub fn info(&self, field: InfoField) -> InfoValue {
        info::info(&self.program, field)
    }

    /// `(name, index)` pairs sorted by name.
    pub fn names(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.program.names.iter()
    }

    pub fn name_indices(&self, name: &str) -> Option<&[usize]> {
        self.program.names.get(name)
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<regex {}>", self.pattern)
    }
}

impl PartialEq for Regex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.options == other.options
    }
}

impl Eq for Regex {}

impl Hash for Regex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
        self.options.hash(state);
    }
}

impl std::str::FromStr for Regex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Regex> {
        Regex::new(s)
    }
}

/// Options, limits and study settings for building a [`Regex`].
#[derive(Debug, Clone, Default)]
pub struct RegexBuilder {
    options: Options,
    limits: Limits,
    study: Option<Options>,
}

impl RegexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile flags as a mask or a list of names.
    pub fn options(&mut self, options: impl Into<Options>) -> &mut Self {
        self.options = options.into();
        self
    }

    /// Cap on backtracking points per search. Default is 10 million.
    pub fn match_limit(&mut self, limit: u64) -> &mut Self {
        self.limits.match_limit = limit;
        self
    }

    /// Cap on backtrack stack depth per search. Default is 10 million.
    pub fn recursion_limit(&mut self, limit: u64) -> &mut Self {
        self.limits.recursion_limit = limit;
        self
    }

    /// Run the study pass after compiling.
    pub fn study(&mut self, options: impl Into<Options>) -> &mut Self {
        self.study = Some(options.into());
        self
    }

    pub fn build(&self, pattern: &str) -> Result<Regex> {
        let options = self.options.compile_flags()?;
        let parsed = parser::parse(pattern, options)?;
        let mut program = compiler::compile(&parsed)?;
        if let Some(study) = &self.study {
            program = study::study(&program, study.study_flags()?);
        }
        Ok(Regex {
            pattern: pattern.to_string(),
            options,
            program: Arc::new(program),
            limits: self.limits,
        })
    }
}

/// Iterator returned by [`Regex::find_iter`]. Stops after the first error.
#[derive(Debug)]
pub struct Matches<'r> {
    regex: &'r Regex,
    subject: Subject,
    next_start: usize,
    after_empty: bool,
    done: bool,
}

impl Matches<'_> {
    pub fn subject(&self) -> &Subject {
        &self.subject
    }
}

impl Iterator for Matches<'_> {
    type Item = Result<Captures>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        // an empty match must not be found twice at the same place
        let flags = if self.after_empty {
            ExecFlags::NOTEMPTY_ATSTART
        } else {
            ExecFlags::empty()
        };
        match self.regex.exec(&self.subject, self.next_start, flags) {
            Ok(Outcome::Match(caps)) => {
                let span = caps.span();
                self.next_start = span.end;
                self.after_empty = span.is_empty();
                Some(Ok(caps))
            }
            Ok(_) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Compile `pattern` and test it against `input` in one go.
pub fn is_match(input: &str, pattern: &str) -> Result<bool> {
    Regex::new(pattern)?.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_equality() {
        let a = Regex::new("a+b").unwrap();
        let b = Regex::new("a+b").unwrap();
        let c = Regex::with_options("a+b", CompileFlags::CASELESS).unwrap();
        assert_eq!(a.to_string(), "#<regex a+b>");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn options_by_name() {
        let re = Regex::with_options("abc", ["CASELESS"]).unwrap();
        assert!(re.is_match("xABCx").unwrap());
        let err = Regex::with_options("abc", ["NOPE"]).unwrap_err();
        assert_eq!(err, Error::UnknownFlag("NOPE".into()));
    }

    #[test]
    fn find_iter_steps_over_empty_matches() {
        let re = Regex::new("a*").unwrap();
        let spans: Vec<_> = re
            .find_iter("baaa")
            .map(|caps| caps.unwrap().span())
            .collect();
        assert_eq!(spans, [Span::new(0, 0), Span::new(1, 4), Span::new(4, 4)]);
    }

    #[test]
    fn exec_bytes_checks_utf8() {
        let re = Regex::with_options("b", CompileFlags::UTF8).unwrap();
        let err = re.exec_bytes(&[b'a', 0xc3], 0, 0u32).unwrap_err();
        assert_eq!(err, Error::Exec(ExecError::BadUtf8 { offset: 1 }));
        let outcome = re.exec_bytes(&[b'a', 0xc3, b'b'], 0, ExecFlags::NO_UTF8_CHECK).unwrap();
        assert_eq!(outcome.captures().map(|c| c.span()), Some(Span::new(2, 3)));
        let latin1 = Regex::new("\\xe9").unwrap();
        assert!(latin1.exec_bytes(&[0xe9], 0, 0u32).unwrap().is_match());
    }

    #[test]
    fn studying_keeps_results() {
        let re = Regex::new("x[yz]+").unwrap();
        let studied = re.study(StudyFlags::empty()).unwrap();
        assert_eq!(studied.info(InfoField::Studied), InfoValue::Bool(true));
        assert_eq!(re.captures("axzz").unwrap(), studied.captures("axzz").unwrap());
        assert_eq!(re, studied);
    }

    #[test]
    fn builder_limits() {
        let re = Regex::builder()
            .match_limit(1_000)
            .build("(a+)+$")
            .unwrap();
        let err = re.is_match("aaaaaaaaaaaaaaaaaaaaaaaaa!").unwrap_err();
        assert_eq!(err, Error::Exec(ExecError::MatchLimit));
    }

    #[test]
    fn quick_is_match() {
        assert!(is_match("apple", "p+l").unwrap());
        assert!(!is_match("apple", "^p").unwrap());
        assert!(is_match("x", "(").is_err());
    }
}
