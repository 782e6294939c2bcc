//! Questions a caller can ask about a compiled pattern.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::flags::CompileFlags;
use crate::program::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoField {
    Options,
    Size,
    CaptureCount,
    BackrefMax,
    /// First character as a code, -1 for start of line, -2 for none.
    FirstByte,
    /// The study pass's 256-bit start table.
    FirstTable,
    /// Required character as a code, -1 for none.
    LastLiteral,
    NameEntrySize,
    NameCount,
    NameTable,
    StudySize,
    OkPartial,
    JChanged,
    HasCrOrLf,
    MinLength,
    Jit,
    JitSize,
    MaxLookbehind,
    FirstCharacter,
    FirstCharacterFlags,
    RequiredChar,
    RequiredCharFlags,
    Studied,
}

/// Names and numeric codes. `Studied` has no classic code.
const INFO_FIELDS: &[(InfoField, &str, Option<i32>)] = &[
    (InfoField::Options, "OPTIONS", Some(0)),
    (InfoField::Size, "SIZE", Some(1)),
    (InfoField::CaptureCount, "CAPTURECOUNT", Some(2)),
    (InfoField::BackrefMax, "BACKREFMAX", Some(3)),
    (InfoField::FirstByte, "FIRSTBYTE", Some(4)),
    (InfoField::FirstTable, "FIRSTTABLE", Some(5)),
    (InfoField::LastLiteral, "LASTLITERAL", Some(6)),
    (InfoField::NameEntrySize, "NAMEENTRYSIZE", Some(7)),
    (InfoField::NameCount, "NAMECOUNT", Some(8)),
    (InfoField::NameTable, "NAMETABLE", Some(9)),
    (InfoField::StudySize, "STUDYSIZE", Some(10)),
    (InfoField::OkPartial, "OKPARTIAL", Some(12)),
    (InfoField::JChanged, "JCHANGED", Some(13)),
    (InfoField::HasCrOrLf, "HASCRORLF", Some(14)),
    (InfoField::MinLength, "MINLENGTH", Some(15)),
    (InfoField::Jit, "JIT", Some(16)),
    (InfoField::JitSize, "JITSIZE", Some(17)),
    (InfoField::MaxLookbehind, "MAXLOOKBEHIND", Some(18)),
    (InfoField::FirstCharacter, "FIRSTCHARACTER", Some(19)),
    (InfoField::FirstCharacterFlags, "FIRSTCHARACTERFLAGS", Some(20)),
    (InfoField::RequiredChar, "REQUIREDCHAR", Some(21)),
    (InfoField::RequiredCharFlags, "REQUIREDCHARFLAGS", Some(22)),
    (InfoField::Studied, "STUDIED", None),
];

impl InfoField {
    pub fn from_code(code: i32) -> Result<InfoField, Error> {
        INFO_FIELDS
            .iter()
            .find(|&&(_, _, c)| c == Some(code))
            .map(|&(field, _, _)| field)
            .ok_or_else(|| Error::UnknownInfoField(code.to_string()))
    }

    pub fn code(self) -> Option<i32> {
        self.entry().2
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn all() -> impl Iterator<Item = InfoField> {
        INFO_FIELDS.iter().map(|&(field, _, _)| field)
    }

    fn entry(self) -> (InfoField, &'static str, Option<i32>) {
        INFO_FIELDS
            .iter()
            .copied()
            .find(|&(field, _, _)| field == self)
            .unwrap_or((self, "", None))
    }
}

impl FromStr for InfoField {
    type Err = Error;

    /// Accepts `"CAPTURECOUNT"` as well as `"PCRE_INFO_CAPTURECOUNT"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("PCRE_INFO_").unwrap_or(s);
        INFO_FIELDS
            .iter()
            .find(|&&(_, n, _)| n == name)
            .map(|&(field, _, _)| field)
            .ok_or_else(|| Error::UnknownInfoField(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    Bool(bool),
    Int(i64),
    Size(usize),
    Names(Vec<(String, usize)>),
    Table(Option<[u8; 32]>),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Bool(b) => write!(f, "{b}"),
            InfoValue::Int(n) => write!(f, "{n}"),
            InfoValue::Size(n) => write!(f, "{n}"),
            InfoValue::Names(names) => {
                let entries: Vec<String> = names.iter().map(|(n, i)| format!("{n}={i}")).collect();
                write!(f, "[{}]", entries.join(", "))
            }
            InfoValue::Table(None) => f.write_str("none"),
            InfoValue::Table(Some(bytes)) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Answer one introspection query.
pub fn info(program: &Program, field: InfoField) -> InfoValue {
    let meta = &program.meta;
    match field {
        InfoField::Options => {
            let mut options = program.flags;
            if meta.anchored {
                options |= CompileFlags::ANCHORED;
            }
            InfoValue::Int(i64::from(options.bits()))
        }
        InfoField::Size => InfoValue::Size(program.size()),
        InfoField::CaptureCount => InfoValue::Size(program.capture_count),
        InfoField::BackrefMax => InfoValue::Size(meta.backref_max),
        InfoField::FirstByte => InfoValue::Int(match meta.first_char {
            Some(first) => i64::from(u32::from(first.ch)),
            None if meta.start_line => -1,
            None => -2,
        }),
        InfoField::FirstTable => InfoValue::Table(
            program
                .study
                .as_ref()
                .and_then(|s| s.start_bits.as_ref())
                .map(|bits| bits.to_bytes()),
        ),
        InfoField::LastLiteral => InfoValue::Int(
            meta.required_char
                .map_or(-1, |req| i64::from(u32::from(req.ch))),
        ),
        InfoField::NameEntrySize => InfoValue::Size(program.names.entry_size()),
        InfoField::NameCount => InfoValue::Size(program.names.len()),
        InfoField::NameTable => InfoValue::Names(
            program
                .names
                .iter()
                .map(|(name, index)| (name.to_string(), index))
                .collect(),
        ),
        InfoField::StudySize => InfoValue::Size(program.study.as_ref().map_or(0, |s| s.size)),
        InfoField::OkPartial => InfoValue::Bool(true),
        InfoField::JChanged => InfoValue::Bool(meta.jchanged),
        InfoField::HasCrOrLf => InfoValue::Bool(meta.has_cr_or_lf),
        InfoField::MinLength => InfoValue::Size(meta.min_len),
        InfoField::Jit => InfoValue::Bool(false),
        InfoField::JitSize => InfoValue::Size(0),
        InfoField::MaxLookbehind => InfoValue::Size(meta.max_lookbehind),
        InfoField::FirstCharacter => {
            InfoValue::Int(meta.first_char.map_or(0, |first| i64::from(u32::from(first.ch))))
        }
        InfoField::FirstCharacterFlags => InfoValue::Int(if meta.first_char.is_some() {
            1
        } else if meta.start_line {
            2
        } else {
            0
        }),
        InfoField::RequiredChar => {
            InfoValue::Int(meta.required_char.map_or(0, |req| i64::from(u32::from(req.ch))))
        }
        InfoField::RequiredCharFlags => InfoValue::Int(i64::from(meta.required_char.is_some())),
        InfoField::Studied => InfoValue::Bool(program.study.is_some()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::parser::parse;

    fn program(pattern: &str) -> Program {
        compile(&parse(pattern, CompileFlags::empty()).unwrap()).unwrap()
    }

    #[test]
    fn field_lookup() {
        assert_eq!("CAPTURECOUNT".parse::<InfoField>().unwrap(), InfoField::CaptureCount);
        assert_eq!(
            "PCRE_INFO_NAMETABLE".parse::<InfoField>().unwrap(),
            InfoField::NameTable
        );
        assert_eq!(InfoField::from_code(15).unwrap(), InfoField::MinLength);
        assert!(matches!(InfoField::from_code(11), Err(Error::UnknownInfoField(_))));
        assert!("BOGUS".parse::<InfoField>().is_err());
        for field in InfoField::all() {
            assert_eq!(field.name().parse::<InfoField>().unwrap(), field);
        }
    }

    #[test]
    fn answers_for_a_named_pattern() {
        let prog = program("(?<year>[0-9]{4})-(?<month>[0-9]{2})");
        assert_eq!(info(&prog, InfoField::CaptureCount), InfoValue::Size(2));
        assert_eq!(info(&prog, InfoField::NameCount), InfoValue::Size(2));
        assert_eq!(
            info(&prog, InfoField::NameTable),
            InfoValue::Names(vec![("month".into(), 2), ("year".into(), 1)])
        );
        assert_eq!(info(&prog, InfoField::MinLength), InfoValue::Size(7));
        assert_eq!(info(&prog, InfoField::FirstByte), InfoValue::Int(-2));
        assert_eq!(info(&prog, InfoField::LastLiteral), InfoValue::Int('-' as i64));
        assert_eq!(info(&prog, InfoField::Studied), InfoValue::Bool(false));
    }

    #[test]
    fn anchoring_shows_in_options() {
        let prog = program("^abc");
        assert_eq!(info(&prog, InfoField::Options), InfoValue::Int(0x10));
        assert_eq!(info(&prog, InfoField::FirstCharacterFlags), InfoValue::Int(1));
        let prog = program("(?m)^abc");
        assert_eq!(info(&prog, InfoField::FirstByte), InfoValue::Int('a' as i64));
        let prog = program("(?m)^.");
        assert_eq!(info(&prog, InfoField::FirstByte), InfoValue::Int(-1));
    }
}
