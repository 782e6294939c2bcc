//! The compiled form of a pattern: a flat instruction list for the
//! backtracking matcher plus the facts gathered about the pattern while
//! compiling it.

use std::collections::BTreeMap;
use std::mem;

use crate::ast::Anchor;
use crate::class::ClassSet;
use crate::error::CompileError;
use crate::flags::{Bsr, CompileFlags, Newline};
use crate::unicode;

/// One step of the matcher. Jump targets are indices into
/// [`Program::insts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    Match,
    Char(char),
    /// Compares simple case folds; the operand is already folded.
    CharNoCase(char),
    Any,
    AnyNoNewline,
    Class(usize),
    LineBreak,
    Assert(Anchor),
    Save(usize),
    /// Note where group `n` starts. Its slots stay as they were until
    /// the matching `Close`, so a back reference inside the group still
    /// sees the previous iteration's text.
    Open(usize),
    /// Set both slots of group `n`.
    Close(usize),
    /// Try the first target, fall back to the second.
    Split(usize, usize),
    Jmp(usize),
    /// The first group in `groups` that is set supplies the text.
    Backref {
        groups: Vec<usize>,
        caseless: bool,
    },
    SetMark(usize),
    /// Leave the loop at `exit` when the iteration that just ended
    /// consumed nothing.
    LoopCheck {
        reg: usize,
        exit: usize,
    },
    /// Run the body at `pc + 1` up to its `SubEnd`, `behind` characters
    /// back for a lookbehind, then continue at `next`.
    Look {
        behind: Option<usize>,
        negated: bool,
        next: usize,
    },
    /// Run the body at `pc + 1` once, keep its first way of matching and
    /// continue at `next`.
    Atomic {
        next: usize,
    },
    SubEnd,
    Fail,
}

/// A literal character known to appear at a fixed place in every match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralChar {
    pub ch: char,
    pub caseless: bool,
}

impl LiteralChar {
    pub fn matches(self, c: char) -> bool {
        c == self.ch || (self.caseless && unicode::fold(c) == unicode::fold(self.ch))
    }
}

/// Group names and the indices they stand for.
///
/// Iteration is sorted by name, then by index. A name maps to several
/// indices only when duplicates were allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: BTreeMap<String, Vec<usize>>,
}

impl NameTable {
    pub fn insert(&mut self, name: &str, index: usize, allow_dup: bool) -> Result<(), CompileError> {
        let indices = self.names.entry(name.to_string()).or_default();
        if indices.contains(&index) {
            // same group seen again, e.g. in another `(?|` branch
            return Ok(());
        }
        if !indices.is_empty() && !allow_dup {
            return Err(CompileError::DuplicateName(name.to_string()));
        }
        indices.push(index);
        indices.sort_unstable();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[usize]> {
        self.names.get(name).map(Vec::as_slice)
    }

    /// Number of `(name, index)` entries.
    pub fn len(&self) -> usize {
        self.names.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.names
            .iter()
            .flat_map(|(name, indices)| indices.iter().map(move |&i| (name.as_str(), i)))
    }

    /// Bytes per entry in the classic packed layout: two for the index,
    /// the longest name, and a terminator.
    pub fn entry_size(&self) -> usize {
        self.names.keys().map(String::len).max().map_or(0, |longest| longest + 3)
    }
}

/// Characters that can begin a match, as a 256-bit table plus a single bit
/// for everything above U+00FF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartBits {
    low: [u64; 4],
    high: bool,
}

impl StartBits {
    pub fn insert(&mut self, c: char) {
        let n = c as usize;
        if n < 256 {
            self.low[n / 64] |= 1 << (n % 64);
        } else {
            self.high = true;
        }
    }

    pub fn insert_high(&mut self) {
        self.high = true;
    }

    pub fn contains(&self, c: char) -> bool {
        let n = c as usize;
        if n < 256 {
            self.low[n / 64] & (1 << (n % 64)) != 0
        } else {
            self.high
        }
    }

    pub fn may_start_high(&self) -> bool {
        self.high
    }

    /// The table as 32 bytes, bit `c % 8` of byte `c / 8` set for each
    /// possible first character `c` below 256.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, word) in self.low.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}

/// What the study pass learned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyData {
    pub start_bits: Option<StartBits>,
    pub size: usize,
}

/// Facts about a pattern used to skip hopeless start positions and to
/// answer introspection queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub min_len: usize,
    pub anchored: bool,
    pub start_line: bool,
    pub first_char: Option<LiteralChar>,
    pub required_char: Option<LiteralChar>,
    pub backref_max: usize,
    pub max_lookbehind: usize,
    pub has_cr_or_lf: bool,
    pub jchanged: bool,
}

/// A compiled pattern. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub insts: Vec<Inst>,
    pub classes: Vec<ClassSet>,
    pub capture_count: usize,
    /// Loop registers used by the empty-iteration guard.
    pub registers: usize,
    pub names: NameTable,
    pub flags: CompileFlags,
    pub newline: Newline,
    pub bsr: Bsr,
    pub meta: Metadata,
    pub study: Option<StudyData>,
}

impl Program {
    /// Capture slots: a start and an end for group 0 and every group.
    pub fn slot_count(&self) -> usize {
        (self.capture_count + 1) * 2
    }

    /// Approximate memory held by the compiled pattern, in bytes.
    pub fn size(&self) -> usize {
        let classes: usize = self
            .classes
            .iter()
            .map(|set| mem::size_of::<ClassSet>() + mem::size_of_val(set.items.as_slice()))
            .sum();
        mem::size_of::<Program>() + self.insts.len() * mem::size_of::<Inst>() + classes
    }
}
