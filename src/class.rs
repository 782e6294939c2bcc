use crate::unicode::{self, PosixClass, Property};

/// The Perl shorthand classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerlClass {
    Digit,
    Word,
    Space,
    HSpace,
    VSpace,
}

impl PerlClass {
    fn matches(self, c: char, unicode: bool) -> bool {
        match self {
            PerlClass::Digit => unicode::is_digit(c, unicode),
            PerlClass::Word => unicode::is_word(c, unicode),
            PerlClass::Space => unicode::is_space(c, unicode),
            PerlClass::HSpace => unicode::is_hspace(c),
            PerlClass::VSpace => unicode::is_vspace(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassItem {
    Range(char, char),
    Perl {
        class: PerlClass,
        negated: bool,
        unicode: bool,
    },
    Posix {
        class: PosixClass,
        negated: bool,
        unicode: bool,
    },
    Property {
        property: Property,
        negated: bool,
    },
}

impl ClassItem {
    pub fn single(c: char) -> Self {
        ClassItem::Range(c, c)
    }

    fn matches(&self, c: char) -> bool {
        match *self {
            ClassItem::Range(lo, hi) => lo <= c && c <= hi,
            ClassItem::Perl {
                class,
                negated,
                unicode,
            } => class.matches(c, unicode) != negated,
            ClassItem::Posix {
                class,
                negated,
                unicode,
            } => class.matches(c, unicode) != negated,
            ClassItem::Property { property, negated } => property.matches(c) != negated,
        }
    }
}

/// A set of codepoints: `[...]`, `\d`, `\p{L}` and friends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassSet {
    pub items: Vec<ClassItem>,
    pub negated: bool,
    pub caseless: bool,
}

impl ClassSet {
    pub fn new(items: Vec<ClassItem>, negated: bool, caseless: bool) -> Self {
        Self {
            items,
            negated,
            caseless,
        }
    }

    /// A set holding one shorthand item, e.g. `\d` outside brackets.
    pub fn from_item(item: ClassItem) -> Self {
        Self::new(vec![item], false, false)
    }

    pub fn matches(&self, c: char) -> bool {
        let mut hit = self.items.iter().any(|item| item.matches(c));
        if !hit && self.caseless {
            hit = unicode::caseless_set(c)
                .filter(|&v| v != c)
                .any(|v| self.items.iter().any(|item| item.matches(v)));
        }
        hit != self.negated
    }

    /// True when no character above U+00FF can be a member. Used by the
    /// study pass to decide whether its 256-entry table is exact.
    pub fn is_latin1_only(&self) -> bool {
        !self.negated
            && !self.caseless
            && self
                .items
                .iter()
                .all(|item| matches!(item, ClassItem::Range(_, hi) if *hi <= '\u{ff}'))
    }

    /// A single literal character, when that is all the set can match.
    pub fn as_single(&self) -> Option<char> {
        match self.items.as_slice() {
            [ClassItem::Range(lo, hi)] if lo == hi && !self.negated && !self.caseless => {
                Some(*lo)
            }
            _ => None,
        }
    }
}
