//! Character predicates: case folding, `\p{..}` properties, Perl and POSIX
//! classes.
//!
//! General categories come from `unic-ucd-category`, scripts from the
//! `Script` property in `icu_properties`. Case folding uses the default
//! (full) folding from `caseless`, narrowed to one character.

use std::collections::HashMap;
use std::iter;

use caseless::Caseless;
use icu_properties::props::Script;
use icu_properties::{CodePointMapData, PropertyParser};
use once_cell::sync::Lazy;
use unic_char_property::EnumeratedCharProperty;
use unic_ucd_category::GeneralCategory;

/// Single-character case fold. Characters whose full folding expands
/// (`ß`, `İ`) fall back to their lowercase mapping when that is a single
/// character, else fold to themselves.
pub fn fold(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_lowercase();
    }
    let mut folded = iter::once(c).default_case_fold();
    if let (Some(f), None) = (folded.next(), folded.next()) {
        return f;
    }
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Every character that folds to a given fold, except the fold itself.
static FOLDED_FROM: Lazy<HashMap<char, Vec<char>>> = Lazy::new(|| {
    let mut table: HashMap<char, Vec<char>> = HashMap::new();
    // everything with a case mapping is alphabetic, `ͅ` and `Ⓐ` included
    for c in (0..=char::MAX as u32).filter_map(char::from_u32) {
        if !c.is_alphabetic() {
            continue;
        }
        let f = fold(c);
        if f != c {
            table.entry(f).or_default().push(c);
        }
    }
    table
});

/// The caseless set of `c`: its fold followed by every other character
/// with the same fold. `ς`, `σ` and `Σ` all give the same set.
pub fn caseless_set(c: char) -> impl Iterator<Item = char> {
    let f = fold(c);
    let others = FOLDED_FROM.get(&f).map_or(&[][..], Vec::as_slice);
    iter::once(f).chain(others.iter().copied())
}

/// True when some other character matches `c` caselessly.
pub fn has_other_case(c: char) -> bool {
    caseless_set(c).nth(1).is_some()
}

pub fn is_word(c: char, unicode: bool) -> bool {
    if unicode {
        let gc = GeneralCategory::of(c);
        gc.is_letter() || gc.is_number() || c == '_'
    } else {
        c.is_ascii_alphanumeric() || c == '_'
    }
}

pub fn is_digit(c: char, unicode: bool) -> bool {
    if unicode {
        GeneralCategory::of(c) == GeneralCategory::DecimalNumber
    } else {
        c.is_ascii_digit()
    }
}

pub fn is_space(c: char, unicode: bool) -> bool {
    if unicode {
        GeneralCategory::of(c).is_separator() || matches!(c, '\t'..='\r')
    } else {
        matches!(c, ' ' | '\t' | '\n' | '\u{0b}' | '\u{0c}' | '\r')
    }
}

pub fn is_hspace(c: char) -> bool {
    matches!(
        c,
        '\t' | ' '
            | '\u{a0}'
            | '\u{1680}'
            | '\u{180e}'
            | '\u{2000}'..='\u{200a}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
    )
}

pub fn is_vspace(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{0b}' | '\u{0c}' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// A general category name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// One letter (`L`, `N`, ...): every category starting with it.
    Major(char),
    /// `L&`: upper, lower and title case letters.
    CasedLetter,
    Exact(GeneralCategory),
}

impl Category {
    fn from_name(name: &str) -> Option<Category> {
        match name {
            "C" | "L" | "M" | "N" | "P" | "S" | "Z" => name.chars().next().map(Category::Major),
            "L&" => Some(Category::CasedLetter),
            _ if name.len() == 2 => GeneralCategory::all_values()
                .iter()
                .find(|gc| gc.abbr_name() == name)
                .map(|&gc| Category::Exact(gc)),
            _ => None,
        }
    }

    fn matches(self, c: char) -> bool {
        let gc = GeneralCategory::of(c);
        match self {
            Category::Major('C') => gc.is_other(),
            Category::Major('L') => gc.is_letter(),
            Category::Major('M') => gc.is_mark(),
            Category::Major('N') => gc.is_number(),
            Category::Major('P') => gc.is_punctuation(),
            Category::Major('S') => gc.is_symbol(),
            Category::Major('Z') => gc.is_separator(),
            Category::Major(_) => false,
            Category::CasedLetter => gc.is_cased_letter(),
            Category::Exact(exact) => gc == exact,
        }
    }
}

/// Something `\p{..}` can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Any,
    Category(Category),
    /// A script by long or short name, `Latin` or `Latn`.
    Script(Script),
    /// `Xan`: letters and numbers.
    AlphaNumeric,
    /// `Xsp` and `Xps`: separators plus the ASCII white space controls.
    Space,
    /// `Xwd`: word characters.
    Word,
}

impl Property {
    pub fn from_name(name: &str) -> Option<Property> {
        let prop = match name {
            "Any" => Property::Any,
            "Xan" => Property::AlphaNumeric,
            "Xsp" | "Xps" => Property::Space,
            "Xwd" => Property::Word,
            _ => {
                if let Some(cat) = Category::from_name(name) {
                    return Some(Property::Category(cat));
                }
                let script = PropertyParser::<Script>::new().get_strict(name)?;
                Property::Script(script)
            }
        };
        Some(prop)
    }

    pub fn matches(self, c: char) -> bool {
        match self {
            Property::Any => true,
            Property::Category(cat) => cat.matches(c),
            Property::Script(script) => CodePointMapData::<Script>::new().get(c) == script,
            Property::AlphaNumeric => {
                let gc = GeneralCategory::of(c);
                gc.is_letter() || gc.is_number()
            }
            Property::Space => is_space(c, true),
            Property::Word => is_word(c, true),
        }
    }
}

/// `[:name:]` classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PosixClass {
    Alnum,
    Alpha,
    Ascii,
    Blank,
    Cntrl,
    Digit,
    Graph,
    Lower,
    Print,
    Punct,
    Space,
    Upper,
    Word,
    Xdigit,
}

impl PosixClass {
    pub fn from_name(name: &str) -> Option<PosixClass> {
        let class = match name {
            "alnum" => PosixClass::Alnum,
            "alpha" => PosixClass::Alpha,
            "ascii" => PosixClass::Ascii,
            "blank" => PosixClass::Blank,
            "cntrl" => PosixClass::Cntrl,
            "digit" => PosixClass::Digit,
            "graph" => PosixClass::Graph,
            "lower" => PosixClass::Lower,
            "print" => PosixClass::Print,
            "punct" => PosixClass::Punct,
            "space" => PosixClass::Space,
            "upper" => PosixClass::Upper,
            "word" => PosixClass::Word,
            "xdigit" => PosixClass::Xdigit,
            _ => return None,
        };
        Some(class)
    }

    pub fn matches(self, c: char, unicode: bool) -> bool {
        if unicode {
            let gc = GeneralCategory::of(c);
            return match self {
                PosixClass::Alnum => gc.is_letter() || gc.is_number(),
                PosixClass::Alpha => gc.is_letter(),
                PosixClass::Ascii => c.is_ascii(),
                PosixClass::Blank => is_hspace(c),
                PosixClass::Cntrl => gc == GeneralCategory::Control,
                PosixClass::Digit => gc == GeneralCategory::DecimalNumber,
                PosixClass::Graph => !gc.is_separator() && !gc.is_other(),
                PosixClass::Lower => gc == GeneralCategory::LowercaseLetter,
                PosixClass::Print => {
                    gc == GeneralCategory::SpaceSeparator || (!gc.is_separator() && !gc.is_other())
                }
                PosixClass::Punct => gc.is_punctuation() || (c.is_ascii() && gc.is_symbol()),
                PosixClass::Space => is_space(c, true),
                PosixClass::Upper => gc == GeneralCategory::UppercaseLetter,
                PosixClass::Word => is_word(c, true),
                PosixClass::Xdigit => c.is_ascii_hexdigit(),
            };
        }
        match self {
            PosixClass::Alnum => c.is_ascii_alphanumeric(),
            PosixClass::Alpha => c.is_ascii_alphabetic(),
            PosixClass::Ascii => c.is_ascii(),
            PosixClass::Blank => c == ' ' || c == '\t',
            PosixClass::Cntrl => c.is_ascii_control(),
            PosixClass::Digit => c.is_ascii_digit(),
            PosixClass::Graph => c.is_ascii_graphic(),
            PosixClass::Lower => c.is_ascii_lowercase(),
            PosixClass::Print => c.is_ascii_graphic() || c == ' ',
            PosixClass::Punct => c.is_ascii_punctuation(),
            PosixClass::Space => is_space(c, false),
            PosixClass::Upper => c.is_ascii_uppercase(),
            PosixClass::Word => is_word(c, false),
            PosixClass::Xdigit => c.is_ascii_hexdigit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str) -> Property {
        Property::from_name(name).unwrap()
    }

    #[test]
    fn folding_is_single_char() {
        assert_eq!(fold('A'), 'a');
        assert_eq!(fold('\u{130}'), '\u{130}');
        assert_eq!(fold('\u{1e9e}'), '\u{df}');
        assert!(has_other_case('a'));
        assert!(!has_other_case('1'));
    }

    #[test]
    fn caseless_sets_cover_every_case_variant() {
        let sigma: Vec<char> = caseless_set('\u{3c2}').collect();
        assert_eq!(sigma[0], '\u{3c3}');
        assert!(sigma.contains(&'\u{3a3}') && sigma.contains(&'\u{3c2}'));
        let sorted = |c| {
            let mut set: Vec<char> = caseless_set(c).collect();
            set.sort_unstable();
            set
        };
        assert_eq!(sorted('\u{3a3}'), sorted('\u{3c2}'));
        // KELVIN SIGN, and MICRO SIGN next to GREEK SMALL LETTER MU
        assert!(caseless_set('k').any(|c| c == '\u{212a}'));
        assert_eq!(fold('\u{b5}'), fold('\u{39c}'));
    }

    #[test]
    fn unicode_digits_only_under_ucp() {
        assert!(is_digit('\u{0663}', true));
        assert!(!is_digit('\u{0663}', false));
        assert!(!is_digit('\u{00b2}', true));
    }

    #[test]
    fn properties_by_name() {
        assert!(prop("Lu").matches('Q'));
        assert!(!prop("Lu").matches('q'));
        assert!(prop("Greek").matches('\u{3bb}'));
        assert!(prop("Nd").matches('7'));
        assert!(Property::from_name("Bogus").is_none());
        assert!(Property::from_name("Lx").is_none());
    }

    #[test]
    fn general_categories_are_exact() {
        // MODIFIER LETTER SMALL H is Lm, not Ll
        assert!(!prop("Ll").matches('\u{2b0}'));
        assert!(prop("Lm").matches('\u{2b0}'));
        assert!(prop("L&").matches('\u{1c5}'));
        // DEVANAGARI SIGN VISARGA is a spacing mark
        assert!(prop("Mc").matches('\u{903}'));
        assert!(!prop("Mn").matches('\u{903}'));
        assert!(prop("M").matches('\u{903}'));
        assert!(prop("Sc").matches('$') && prop("Sc").matches('\u{20ac}'));
        assert!(prop("Nl").matches('\u{216b}'));
        assert!(prop("Pd").matches('-'));
        assert!(prop("Cn").matches('\u{378}'));
    }

    #[test]
    fn scripts_follow_the_script_property() {
        assert!(prop("Latin").matches('\u{250}'));
        assert!(prop("Latn").matches('z'));
        // GREEK QUESTION MARK belongs to Common
        assert!(!prop("Greek").matches('\u{37e}'));
        assert!(prop("Common").matches('\u{37e}'));
        assert!(prop("Georgian").matches('\u{10d0}'));
        assert!(!prop("Georgian").matches('a'));
    }

    #[test]
    fn posix_classes_respect_ascii_mode() {
        assert!(PosixClass::Alpha.matches('\u{e9}', true));
        assert!(!PosixClass::Alpha.matches('\u{e9}', false));
        assert!(PosixClass::Xdigit.matches('F', false));
        assert!(PosixClass::Punct.matches('$', true));
        assert!(!PosixClass::Punct.matches('\u{20ac}', true));
    }
}
