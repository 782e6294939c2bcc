//! Property-based tests for the matcher.
//!
//! Patterns are assembled from a small set of pieces that always parse, so
//! every generated case exercises matching rather than error paths.

use proptest::prelude::*;
use rexec::{CompileFlags, ExecFlags, InfoField, Regex, RegexBuilder, StudyFlags, Subject};

const PIECES: &[(&str, usize)] = &[
    ("a", 0),
    ("b", 0),
    ("[ab]", 0),
    ("a*", 0),
    ("b+", 0),
    ("x?", 0),
    ("(a|b)", 1),
    ("(?:ab)+?", 0),
    ("(b*)", 1),
    ("\\w", 0),
];

/// Named groups as `(prefix, body)`. The piece's position is appended to
/// the prefix, so a pattern never repeats a name.
const NAMED: &[(&str, &str)] = &[("g", "a|b"), ("run", "b*")];

/// A pattern and the number of capturing groups it has.
fn arb_pattern() -> impl Strategy<Value = (String, usize)> {
    arb_named_pattern().prop_map(|(pattern, groups, _)| (pattern, groups))
}

/// A pattern, its group count, and its `(name, index)` pairs sorted the
/// way the name table lists them.
fn arb_named_pattern() -> impl Strategy<Value = (String, usize, Vec<(String, usize)>)> {
    prop::collection::vec(0..PIECES.len() + NAMED.len(), 1..5).prop_map(|picks| {
        let mut pattern = String::new();
        let mut groups = 0;
        let mut names = Vec::new();
        for (at, &i) in picks.iter().enumerate() {
            match PIECES.get(i) {
                Some(&(piece, n)) => {
                    pattern.push_str(piece);
                    groups += n;
                }
                None => {
                    let (prefix, body) = NAMED[i - PIECES.len()];
                    let name = format!("{prefix}{at}");
                    groups += 1;
                    pattern.push_str(&format!("(?<{name}>{body})"));
                    names.push((name, groups));
                }
            }
        }
        names.sort();
        (pattern, groups, names)
    })
}

fn arb_subject() -> impl Strategy<Value = String> {
    "[abx]{0,12}"
}

proptest! {
    #[test]
    fn captures_have_one_slot_per_group((pattern, groups) in arb_pattern(), text in arb_subject()) {
        let re = Regex::new(&pattern).unwrap();
        prop_assert_eq!(re.capture_count(), groups);
        if let Some(caps) = re.captures(&text).unwrap() {
            prop_assert_eq!(caps.len(), groups + 1);
            let len = text.chars().count();
            for span in caps.iter().flatten() {
                prop_assert!(span.start <= span.end && span.end <= len);
            }
        }
    }

    #[test]
    fn compiling_twice_gives_the_same_groups((pattern, groups, names) in arb_named_pattern()) {
        let first = Regex::new(&pattern).unwrap();
        let second = Regex::new(&pattern).unwrap();
        let table = |re: &Regex| -> Vec<(String, usize)> {
            re.names().map(|(name, index)| (name.to_string(), index)).collect()
        };
        prop_assert_eq!(first.capture_count(), groups);
        prop_assert_eq!(second.capture_count(), groups);
        prop_assert_eq!(table(&first), names.clone());
        prop_assert_eq!(table(&second), names);
        prop_assert_eq!(first.info(InfoField::NameTable), second.info(InfoField::NameTable));
        prop_assert_eq!(
            first.info(InfoField::NameEntrySize),
            second.info(InfoField::NameEntrySize)
        );
    }

    #[test]
    fn matching_is_deterministic((pattern, _) in arb_pattern(), text in arb_subject()) {
        let re = Regex::new(&pattern).unwrap();
        prop_assert_eq!(re.captures(&text).unwrap(), re.captures(&text).unwrap());
    }

    #[test]
    fn study_and_start_optimizations_do_not_change_results(
        (pattern, _) in arb_pattern(),
        text in arb_subject(),
    ) {
        let plain = Regex::new(&pattern).unwrap();
        let studied = RegexBuilder::new()
            .study(StudyFlags::empty())
            .build(&pattern)
            .unwrap();
        let unoptimized = Regex::with_options(&pattern, CompileFlags::NO_START_OPTIMIZE).unwrap();
        let expected = plain.captures(&text).unwrap();
        prop_assert_eq!(&studied.captures(&text).unwrap(), &expected);
        prop_assert_eq!(&unoptimized.captures(&text).unwrap(), &expected);
    }

    #[test]
    fn literal_search_agrees_with_str_find(needle in "[ab]{1,4}", text in "[abc]{0,20}") {
        let re = Regex::new(&needle).unwrap();
        let found = re.captures(&text).unwrap().map(|caps| caps.span().start);
        prop_assert_eq!(found, text.find(&needle));
    }

    #[test]
    fn caseless_matches_lowercased(needle in "[a-cA-C]{1,3}", text in "[a-cA-C]{0,10}") {
        let caseless = Regex::with_options(&needle, CompileFlags::CASELESS).unwrap();
        let lower = Regex::new(&needle.to_lowercase()).unwrap();
        prop_assert_eq!(
            caseless.captures(&text).unwrap(),
            lower.captures(&text.to_lowercase()).unwrap()
        );
    }

    #[test]
    fn search_from_offset_never_starts_before_it(
        (pattern, _) in arb_pattern(),
        text in arb_subject(),
        offset in 0usize..13,
    ) {
        let subject = Subject::new(&text);
        prop_assume!(offset <= subject.len());
        let re = Regex::new(&pattern).unwrap();
        if let Some(caps) = re.exec(&subject, offset, ExecFlags::empty()).unwrap().captures() {
            prop_assert!(caps.span().start >= offset);
        }
    }
}
