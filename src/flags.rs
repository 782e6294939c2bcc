//! Dialect, exec and study flags.
//!
//! Bit values follow the classic PCRE1 layout so integer masks handed over by
//! an embedding host keep their meaning. Hosts may also pass an ordered list
//! of symbolic names; both forms go through [`Options`] and are normalized
//! here, before any parsing or matching starts.

use std::collections::HashMap;

use bitflags::bitflags;
use once_cell::sync::Lazy;

use crate::error::{CompileError, Error, ExecError};

bitflags! {
    /// Flags accepted when a pattern is compiled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompileFlags: u32 {
        const CASELESS = 0x0000_0001;
        const MULTILINE = 0x0000_0002;
        const DOTALL = 0x0000_0004;
        const EXTENDED = 0x0000_0008;
        const ANCHORED = 0x0000_0010;
        const DOLLAR_ENDONLY = 0x0000_0020;
        const EXTRA = 0x0000_0040;
        const UNGREEDY = 0x0000_0200;
        const UTF8 = 0x0000_0800;
        const NO_AUTO_CAPTURE = 0x0000_1000;
        const FIRSTLINE = 0x0004_0000;
        const DUPNAMES = 0x0008_0000;
        const NEWLINE_CR = 0x0010_0000;
        const NEWLINE_LF = 0x0020_0000;
        const NEWLINE_CRLF = 0x0030_0000;
        const NEWLINE_ANY = 0x0040_0000;
        const NEWLINE_ANYCRLF = 0x0050_0000;
        const BSR_ANYCRLF = 0x0080_0000;
        const BSR_UNICODE = 0x0100_0000;
        const JAVASCRIPT_COMPAT = 0x0200_0000;
        const NO_START_OPTIMIZE = 0x0400_0000;
        const UCP = 0x2000_0000;
    }
}

bitflags! {
    /// Flags accepted by a single match call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExecFlags: u32 {
        const ANCHORED = 0x0000_0010;
        const NOTBOL = 0x0000_0080;
        const NOTEOL = 0x0000_0100;
        const NOTEMPTY = 0x0000_0400;
        const NO_UTF8_CHECK = 0x0000_2000;
        const PARTIAL_SOFT = 0x0000_8000;
        const NO_START_OPTIMIZE = 0x0400_0000;
        const PARTIAL_HARD = 0x0800_0000;
        const NOTEMPTY_ATSTART = 0x1000_0000;
    }
}

bitflags! {
    /// Flags accepted by the study pass. The JIT requests are recognized
    /// but there is no JIT backend, so they only show up in the log.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StudyFlags: u32 {
        const JIT_COMPILE = 0x0000_0001;
        const JIT_PARTIAL_SOFT_COMPILE = 0x0000_0002;
        const JIT_PARTIAL_HARD_COMPILE = 0x0000_0004;
        const EXTRA_NEEDED = 0x0000_0008;
    }
}

const NEWLINE_MASK: u32 = 0x0070_0000;

impl CompileFlags {
    /// Checks a raw mask. Unknown bits, an undefined newline selector and
    /// both `\R` conventions at once are all rejected.
    pub fn validate(bits: u32) -> Result<CompileFlags, CompileError> {
        let flags = CompileFlags::from_bits(bits).ok_or(CompileError::BadOption {
            bits: bits & !CompileFlags::all().bits(),
        })?;
        flags.newline_field()?;
        if flags.contains(CompileFlags::BSR_ANYCRLF | CompileFlags::BSR_UNICODE) {
            return Err(CompileError::ConflictingBsr);
        }
        Ok(flags)
    }

    fn newline_field(self) -> Result<Option<Newline>, CompileError> {
        match self.bits() & NEWLINE_MASK {
            0 => Ok(None),
            0x0010_0000 => Ok(Some(Newline::Cr)),
            0x0020_0000 => Ok(Some(Newline::Lf)),
            0x0030_0000 => Ok(Some(Newline::CrLf)),
            0x0040_0000 => Ok(Some(Newline::Any)),
            0x0050_0000 => Ok(Some(Newline::AnyCrLf)),
            other => Err(CompileError::BadNewline { bits: other }),
        }
    }

    /// The newline convention selected by these flags, if any.
    pub fn newline(self) -> Option<Newline> {
        self.newline_field().ok().flatten()
    }

    /// Replaces the newline selector.
    pub fn with_newline(self, newline: Newline) -> CompileFlags {
        let bits = (self.bits() & !NEWLINE_MASK) | newline.flag_bits();
        CompileFlags::from_bits_retain(bits)
    }

    /// The `\R` convention selected by these flags, if any.
    pub fn bsr(self) -> Option<Bsr> {
        if self.contains(CompileFlags::BSR_ANYCRLF) {
            Some(Bsr::AnyCrLf)
        } else if self.contains(CompileFlags::BSR_UNICODE) {
            Some(Bsr::Unicode)
        } else {
            None
        }
    }

    /// Replaces the `\R` convention.
    pub fn with_bsr(self, bsr: Bsr) -> CompileFlags {
        let mut flags = self - (CompileFlags::BSR_ANYCRLF | CompileFlags::BSR_UNICODE);
        match bsr {
            Bsr::AnyCrLf => flags |= CompileFlags::BSR_ANYCRLF,
            Bsr::Unicode => flags |= CompileFlags::BSR_UNICODE,
        }
        flags
    }
}

impl ExecFlags {
    pub fn validate(bits: u32) -> Result<ExecFlags, ExecError> {
        let flags = ExecFlags::from_bits(bits).ok_or(ExecError::BadOption {
            bits: bits & !ExecFlags::all().bits(),
        })?;
        if flags.contains(ExecFlags::PARTIAL_SOFT | ExecFlags::PARTIAL_HARD) {
            return Err(ExecError::BadOption {
                bits: (ExecFlags::PARTIAL_SOFT | ExecFlags::PARTIAL_HARD).bits(),
            });
        }
        Ok(flags)
    }

    pub(crate) fn partial(self) -> bool {
        self.intersects(ExecFlags::PARTIAL_SOFT | ExecFlags::PARTIAL_HARD)
    }
}

/// Which character sequences end a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Newline {
    Cr,
    #[default]
    Lf,
    CrLf,
    Any,
    AnyCrLf,
}

impl Newline {
    fn flag_bits(self) -> u32 {
        match self {
            Newline::Cr => CompileFlags::NEWLINE_CR.bits(),
            Newline::Lf => CompileFlags::NEWLINE_LF.bits(),
            Newline::CrLf => CompileFlags::NEWLINE_CRLF.bits(),
            Newline::Any => CompileFlags::NEWLINE_ANY.bits(),
            Newline::AnyCrLf => CompileFlags::NEWLINE_ANYCRLF.bits(),
        }
    }

    /// Numeric form used by the configuration query.
    pub fn code(self) -> i64 {
        match self {
            Newline::Cr => 13,
            Newline::Lf => 10,
            Newline::CrLf => 3338,
            Newline::Any => -1,
            Newline::AnyCrLf => -2,
        }
    }

    /// True if `c` can be part of a newline sequence.
    pub fn is_newline_char(self, c: char) -> bool {
        match self {
            Newline::Cr => c == '\r',
            Newline::Lf => c == '\n',
            Newline::CrLf | Newline::AnyCrLf => c == '\r' || c == '\n',
            Newline::Any => is_any_newline(c),
        }
    }

    /// Length of the newline sequence that starts at `pos`.
    pub fn len_at(self, text: &[char], pos: usize) -> Option<usize> {
        let c = *text.get(pos)?;
        let crlf = c == '\r' && text.get(pos + 1) == Some(&'\n');
        match self {
            Newline::Cr => (c == '\r').then_some(1),
            Newline::Lf => (c == '\n').then_some(1),
            Newline::CrLf => crlf.then_some(2),
            Newline::AnyCrLf | Newline::Any => {
                if crlf {
                    Some(2)
                } else if self.is_newline_char(c) {
                    Some(1)
                } else {
                    None
                }
            }
        }
    }

    /// Length of the newline sequence that ends at `pos`.
    pub fn len_before(self, text: &[char], pos: usize) -> Option<usize> {
        if pos == 0 || pos > text.len() {
            return None;
        }
        let c = text[pos - 1];
        let crlf = c == '\n' && pos >= 2 && text[pos - 2] == '\r';
        match self {
            Newline::Cr => (c == '\r').then_some(1),
            Newline::Lf => (c == '\n').then_some(1),
            Newline::CrLf => crlf.then_some(2),
            Newline::AnyCrLf | Newline::Any => {
                if crlf {
                    Some(2)
                } else if self.is_newline_char(c) {
                    Some(1)
                } else {
                    None
                }
            }
        }
    }

    /// True if `pos` sits between the CR and LF of one CRLF sequence that
    /// this convention treats as a single newline.
    pub fn splits_crlf(self, text: &[char], pos: usize) -> bool {
        matches!(self, Newline::CrLf | Newline::Any | Newline::AnyCrLf)
            && pos > 0
            && text.get(pos - 1) == Some(&'\r')
            && text.get(pos) == Some(&'\n')
    }
}

fn is_any_newline(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{0b}' | '\u{0c}' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// What `\R` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bsr {
    AnyCrLf,
    #[default]
    Unicode,
}

impl Bsr {
    /// Length of the line break at `pos`. CRLF is taken as a unit.
    pub fn len_at(self, text: &[char], pos: usize) -> Option<usize> {
        let c = *text.get(pos)?;
        if c == '\r' && text.get(pos + 1) == Some(&'\n') {
            return Some(2);
        }
        let hit = match self {
            Bsr::AnyCrLf => c == '\r' || c == '\n',
            Bsr::Unicode => is_any_newline(c),
        };
        hit.then_some(1)
    }
}

/// Flags as they arrive from a host: a single mask or an ordered list of
/// symbolic names, OR-ed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Options {
    Mask(u32),
    Names(Vec<String>),
}

impl Default for Options {
    fn default() -> Self {
        Options::Mask(0)
    }
}

impl Options {
    /// The combined bit mask.
    pub fn bits(&self) -> Result<u32, Error> {
        match self {
            Options::Mask(bits) => Ok(*bits),
            Options::Names(names) => names.iter().try_fold(0, |acc, name| {
                symbol_value(name)
                    .map(|bits| acc | bits)
                    .ok_or_else(|| Error::UnknownFlag(name.clone()))
            }),
        }
    }

    pub fn compile_flags(&self) -> Result<CompileFlags, Error> {
        Ok(CompileFlags::validate(self.bits()?)?)
    }

    pub fn exec_flags(&self) -> Result<ExecFlags, Error> {
        Ok(ExecFlags::validate(self.bits()?)?)
    }

    pub fn study_flags(&self) -> Result<StudyFlags, Error> {
        let bits = self.bits()?;
        StudyFlags::from_bits(bits).ok_or(Error::Compile(CompileError::BadOption {
            bits: bits & !StudyFlags::all().bits(),
        }))
    }
}

impl From<u32> for Options {
    fn from(bits: u32) -> Self {
        Options::Mask(bits)
    }
}

impl From<CompileFlags> for Options {
    fn from(flags: CompileFlags) -> Self {
        Options::Mask(flags.bits())
    }
}

impl From<ExecFlags> for Options {
    fn from(flags: ExecFlags) -> Self {
        Options::Mask(flags.bits())
    }
}

impl From<StudyFlags> for Options {
    fn from(flags: StudyFlags) -> Self {
        Options::Mask(flags.bits())
    }
}

impl From<Vec<String>> for Options {
    fn from(names: Vec<String>) -> Self {
        Options::Names(names)
    }
}

impl From<&[&str]> for Options {
    fn from(names: &[&str]) -> Self {
        Options::Names(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Options {
    fn from(names: [&str; N]) -> Self {
        Options::Names(names.iter().map(|s| s.to_string()).collect())
    }
}

static SYMBOLS: &[(&str, u32)] = &[
    ("CASELESS", 0x0000_0001),
    ("MULTILINE", 0x0000_0002),
    ("DOTALL", 0x0000_0004),
    ("EXTENDED", 0x0000_0008),
    ("ANCHORED", 0x0000_0010),
    ("DOLLAR_ENDONLY", 0x0000_0020),
    ("EXTRA", 0x0000_0040),
    ("NOTBOL", 0x0000_0080),
    ("NOTEOL", 0x0000_0100),
    ("UNGREEDY", 0x0000_0200),
    ("NOTEMPTY", 0x0000_0400),
    ("UTF8", 0x0000_0800),
    ("NO_AUTO_CAPTURE", 0x0000_1000),
    ("NO_UTF8_CHECK", 0x0000_2000),
    ("PARTIAL_SOFT", 0x0000_8000),
    ("PARTIAL", 0x0000_8000),
    ("FIRSTLINE", 0x0004_0000),
    ("DUPNAMES", 0x0008_0000),
    ("NEWLINE_CR", 0x0010_0000),
    ("NEWLINE_LF", 0x0020_0000),
    ("NEWLINE_CRLF", 0x0030_0000),
    ("NEWLINE_ANY", 0x0040_0000),
    ("NEWLINE_ANYCRLF", 0x0050_0000),
    ("BSR_ANYCRLF", 0x0080_0000),
    ("BSR_UNICODE", 0x0100_0000),
    ("JAVASCRIPT_COMPAT", 0x0200_0000),
    ("NO_START_OPTIMIZE", 0x0400_0000),
    ("NO_START_OPTIMISE", 0x0400_0000),
    ("PARTIAL_HARD", 0x0800_0000),
    ("NOTEMPTY_ATSTART", 0x1000_0000),
    ("UCP", 0x2000_0000),
    ("STUDY_JIT_COMPILE", 0x0000_0001),
    ("STUDY_JIT_PARTIAL_SOFT_COMPILE", 0x0000_0002),
    ("STUDY_JIT_PARTIAL_HARD_COMPILE", 0x0000_0004),
    ("STUDY_EXTRA_NEEDED", 0x0000_0008),
];

static SYMBOLS_BY_NAME: Lazy<HashMap<&'static str, u32>> =
    Lazy::new(|| SYMBOLS.iter().copied().collect());

/// Looks up a flag by its symbolic name. A leading `PCRE_` is ignored.
pub fn symbol_value(name: &str) -> Option<u32> {
    let name = name.strip_prefix("PCRE_").unwrap_or(name);
    SYMBOLS_BY_NAME.get(name).copied()
}

static SYMBOLS_BY_VALUE: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for &(name, value) in SYMBOLS {
        map.entry(value).or_insert(name);
    }
    map
});

/// The first table name for `value`. Aliases share a value, and so do
/// study and compile flags, so the mapping back is not unique.
pub fn symbol_name(value: u32) -> Option<&'static str> {
    SYMBOLS_BY_VALUE.get(&value).copied()
}

/// Every symbolic flag name with its value, in table order.
pub fn symbols() -> impl Iterator<Item = (&'static str, u32)> {
    SYMBOLS.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_masks_combine_the_same_way() {
        let by_name = Options::from(["CASELESS", "PCRE_MULTILINE"]);
        let by_mask = Options::from(CompileFlags::CASELESS | CompileFlags::MULTILINE);
        assert_eq!(
            by_name.compile_flags().unwrap(),
            by_mask.compile_flags().unwrap()
        );
    }

    #[test]
    fn symbol_table_goes_both_ways() {
        assert_eq!(symbol_value("PCRE_UTF8"), Some(0x800));
        assert_eq!(symbol_name(0x800), Some("UTF8"));
        assert_eq!(symbol_name(0x8000), Some("PARTIAL_SOFT"));
        assert_eq!(symbol_name(0x4000_0000), None);
        assert!(symbols().all(|(name, value)| symbol_value(name) == Some(value)));
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = Options::from(["CASELESS", "SHOUTY"]).bits().unwrap_err();
        assert!(matches!(err, Error::UnknownFlag(name) if name == "SHOUTY"));
    }

    #[test]
    fn exec_only_bit_is_rejected_at_compile() {
        let err = CompileFlags::validate(ExecFlags::NOTBOL.bits()).unwrap_err();
        assert!(matches!(err, CompileError::BadOption { bits: 0x80 }));
    }

    #[test]
    fn undefined_newline_selector_is_rejected() {
        let err = CompileFlags::validate(0x0060_0000).unwrap_err();
        assert!(matches!(err, CompileError::BadNewline { .. }));
        assert_eq!(
            CompileFlags::validate(0x0030_0000).unwrap().newline(),
            Some(Newline::CrLf)
        );
    }

    #[test]
    fn both_bsr_conventions_conflict() {
        let bits = (CompileFlags::BSR_ANYCRLF | CompileFlags::BSR_UNICODE).bits();
        assert!(matches!(
            CompileFlags::validate(bits),
            Err(CompileError::ConflictingBsr)
        ));
    }

    #[test]
    fn both_partial_modes_conflict() {
        let bits = (ExecFlags::PARTIAL_SOFT | ExecFlags::PARTIAL_HARD).bits();
        assert!(ExecFlags::validate(bits).is_err());
    }

    #[test]
    fn crlf_is_one_newline() {
        let text: Vec<char> = "a\r\nb".chars().collect();
        assert_eq!(Newline::CrLf.len_at(&text, 1), Some(2));
        assert_eq!(Newline::CrLf.len_at(&text, 2), None);
        assert_eq!(Newline::AnyCrLf.len_before(&text, 3), Some(2));
        assert!(Newline::Any.splits_crlf(&text, 2));
        assert_eq!(Bsr::AnyCrLf.len_at(&text, 1), Some(2));
    }
}
