//! Build-time capabilities of the engine and the per-call resource limits.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::flags::{Bsr, Newline};

pub const DEFAULT_MATCH_LIMIT: u64 = 10_000_000;
pub const DEFAULT_RECURSION_LIMIT: u64 = 10_000_000;
/// Deepest group nesting the parser accepts.
pub const PARENS_LIMIT: i64 = 250;

/// Bounds on the work one match call may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Backtracking points (alternatives tried, nested sub-searches) per call.
    pub match_limit: u64,
    /// Depth of the backtrack stack plus sub-search nesting.
    pub recursion_limit: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            match_limit: DEFAULT_MATCH_LIMIT,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Utf8,
    Newline,
    LinkSize,
    PosixMallocThreshold,
    MatchLimit,
    StackRecurse,
    UnicodeProperties,
    MatchLimitRecursion,
    Bsr,
    Jit,
    Utf16,
    JitTarget,
    Utf32,
    ParensLimit,
}

const CONFIG_FIELDS: &[(ConfigField, &str)] = &[
    (ConfigField::Utf8, "UTF8"),
    (ConfigField::Newline, "NEWLINE"),
    (ConfigField::LinkSize, "LINK_SIZE"),
    (ConfigField::PosixMallocThreshold, "POSIX_MALLOC_THRESHOLD"),
    (ConfigField::MatchLimit, "MATCH_LIMIT"),
    (ConfigField::StackRecurse, "STACKRECURSE"),
    (ConfigField::UnicodeProperties, "UNICODE_PROPERTIES"),
    (ConfigField::MatchLimitRecursion, "MATCH_LIMIT_RECURSION"),
    (ConfigField::Bsr, "BSR"),
    (ConfigField::Jit, "JIT"),
    (ConfigField::Utf16, "UTF16"),
    (ConfigField::JitTarget, "JITTARGET"),
    (ConfigField::Utf32, "UTF32"),
    (ConfigField::ParensLimit, "PARENS_LIMIT"),
];

impl ConfigField {
    /// Field for a numeric code; codes are positions in the classic table.
    pub fn from_code(code: i32) -> Result<ConfigField, Error> {
        usize::try_from(code)
            .ok()
            .and_then(|i| CONFIG_FIELDS.get(i))
            .map(|&(field, _)| field)
            .ok_or_else(|| Error::UnknownConfigField(code.to_string()))
    }

    pub fn code(self) -> i32 {
        CONFIG_FIELDS
            .iter()
            .position(|&(field, _)| field == self)
            .map_or(-1, |i| i as i32)
    }

    pub fn name(self) -> &'static str {
        CONFIG_FIELDS
            .iter()
            .find(|&&(field, _)| field == self)
            .map_or("", |&(_, name)| name)
    }

    pub fn all() -> impl Iterator<Item = ConfigField> {
        CONFIG_FIELDS.iter().map(|&(field, _)| field)
    }
}

impl FromStr for ConfigField {
    type Err = Error;

    /// Accepts `"NEWLINE"` as well as `"PCRE_CONFIG_NEWLINE"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("PCRE_CONFIG_").unwrap_or(s);
        CONFIG_FIELDS
            .iter()
            .find(|&&(_, n)| n == name)
            .map(|&(field, _)| field)
            .ok_or_else(|| Error::UnknownConfigField(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Text(Option<&'static str>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(n) => write!(f, "{n}"),
            ConfigValue::Text(Some(text)) => f.write_str(text),
            ConfigValue::Text(None) => f.write_str("none"),
        }
    }
}

/// What the engine was built with.
pub fn config(field: ConfigField) -> ConfigValue {
    match field {
        ConfigField::Utf8 | ConfigField::UnicodeProperties => ConfigValue::Bool(true),
        ConfigField::Utf16 | ConfigField::Utf32 | ConfigField::Jit => ConfigValue::Bool(false),
        // the backtrack stack lives on the heap
        ConfigField::StackRecurse => ConfigValue::Bool(false),
        ConfigField::Newline => ConfigValue::Int(Newline::default().code()),
        ConfigField::Bsr => ConfigValue::Int(match Bsr::default() {
            Bsr::Unicode => 0,
            Bsr::AnyCrLf => 1,
        }),
        ConfigField::LinkSize => ConfigValue::Int(std::mem::size_of::<usize>() as i64),
        ConfigField::PosixMallocThreshold => ConfigValue::Int(10),
        ConfigField::MatchLimit => ConfigValue::Int(DEFAULT_MATCH_LIMIT as i64),
        ConfigField::MatchLimitRecursion => ConfigValue::Int(DEFAULT_RECURSION_LIMIT as i64),
        ConfigField::ParensLimit => ConfigValue::Int(PARENS_LIMIT),
        ConfigField::JitTarget => ConfigValue::Text(None),
    }
}

/// Width in bits of the code units subjects are given in.
pub fn library_utf() -> u32 {
    8
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
