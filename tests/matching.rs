use rexec::error::ParseErrorKind;
use rexec::flags::{symbol_name, symbol_value};
use rexec::{
    config, error_code, error_name, CompileError, CompileFlags, ConfigField, ConfigValue, Error,
    ExecError, ExecFlags, InfoField, InfoValue, Outcome, Regex, Span, Subject,
};
use rstest::rstest;

fn find(pattern: &str, subject: &str) -> Option<(usize, usize)> {
    let re = Regex::new(pattern).unwrap();
    re.captures(subject)
        .unwrap()
        .map(|caps| (caps.span().start, caps.span().end))
}

fn exec(re: &Regex, subject: &str, flags: ExecFlags) -> Outcome {
    re.exec(&Subject::new(subject), 0, flags).unwrap()
}

#[rstest]
#[case("a+", "baaa", Some((1, 4)))]
#[case("a+?", "aaa", Some((0, 1)))]
#[case("colou?r", "my color", Some((3, 8)))]
#[case("\\d+", "abc123def", Some((3, 6)))]
#[case("[^abc]+", "abcxyz", Some((3, 6)))]
#[case("\\bcat\\b", "concat cat", Some((7, 10)))]
#[case("x*", "abc", Some((0, 0)))]
#[case("(?i)HELLO", "say hello", Some((4, 9)))]
#[case("a|b|c", "zzc", Some((2, 3)))]
#[case("^abc$", "abc", Some((0, 3)))]
#[case("^abc$", "abcd", None)]
#[case("\\w+@\\w+\\.com", "mail bob@site.com now", Some((5, 17)))]
#[case("(?<=\\$)\\d+", "cost $42", Some((6, 8)))]
#[case("foo(?!bar)", "foobar foobaz", Some((7, 10)))]
#[case("a(?=b)", "acab", Some((2, 3)))]
#[case("(?>a+)b", "aaab", Some((0, 4)))]
#[case("a++a", "aaaa", None)]
#[case("é+", "caféé", Some((3, 5)))]
#[case("\\p{Lu}+", "abcDEF", Some((3, 6)))]
#[case("[[:digit:]]+", "ab12", Some((2, 4)))]
#[case("\\x41", "zA", Some((1, 2)))]
#[case("\\p{Ll}", "\u{2b0}a", Some((1, 2)))]
#[case("\\p{Mn}", "\u{903}\u{301}", Some((1, 2)))]
#[case("\\p{Latin}+", "\u{3b1}\u{250}b", Some((1, 3)))]
#[case("\\p{Greek}", ";\u{37e}\u{3bb}", Some((2, 3)))]
#[case("\\p{Sc}\\d", "cost \u{20ac}5", Some((5, 7)))]
#[case("\\p{Nl}", "XII \u{216b}", Some((4, 5)))]
#[case("\\p{Pd}", "a-b", Some((1, 2)))]
#[case("\\p{Lm}", "h\u{2b0}", Some((1, 2)))]
#[case("\\p{Georgian}+", "ab\u{10d0}\u{10d1}", Some((2, 4)))]
fn finds_leftmost_match(
    #[case] pattern: &str,
    #[case] subject: &str,
    #[case] expected: Option<(usize, usize)>,
) {
    assert_eq!(find(pattern, subject), expected);
}

#[rstest]
#[case("ab(c", ParseErrorKind::MissingCloseParen)]
#[case("ab)c", ParseErrorKind::UnmatchedCloseParen)]
#[case("[a", ParseErrorKind::MissingTerminatingBracket)]
#[case("*a", ParseErrorKind::NothingToRepeat)]
#[case("a**", ParseErrorKind::NothingToRepeat)]
#[case("[z-a]", ParseErrorKind::RangeOutOfOrder)]
fn rejects_bad_syntax(#[case] pattern: &str, #[case] kind: ParseErrorKind) {
    match Regex::new(pattern) {
        Err(Error::Parse(err)) => assert_eq!(err.kind, kind),
        other => panic!("expected a parse error for {pattern:?}, got {other:?}"),
    }
}

#[test]
fn caseless_matches_the_whole_case_set() {
    let flags = CompileFlags::CASELESS | CompileFlags::UTF8;
    let sigma = Regex::with_options("\u{3c2}", flags).unwrap();
    assert!(sigma.is_match("\u{3a3}").unwrap());
    assert!(sigma.is_match("\u{3c3}").unwrap());
    let upper = Regex::with_options("\u{3a3}", flags).unwrap();
    assert!(upper.is_match("\u{3c2}").unwrap());
    let class = Regex::with_options("[\u{3c2}x]", flags).unwrap();
    assert!(class.is_match("\u{3a3}").unwrap());
    let kelvin = Regex::with_options("k", flags).unwrap();
    assert!(kelvin.is_match("\u{212a}").unwrap());
    assert!(!Regex::new("\u{3c2}").unwrap().is_match("\u{3a3}").unwrap());
}

#[test]
fn backreference_in_repeated_group_uses_previous_iteration() {
    let re = Regex::new("(a|b\\1)+").unwrap();
    let caps = re.captures("aba").unwrap().unwrap();
    assert_eq!(caps.to_offsets(), [(0, 3), (1, 3)]);
    let caps = re.captures("abaaba").unwrap().unwrap();
    assert_eq!(caps.to_offsets(), [(0, 6), (4, 6)]);
}

#[test]
fn ungreedy_flips_quantifiers() {
    let re = Regex::with_options("a+", CompileFlags::UNGREEDY).unwrap();
    assert_eq!(re.captures("aaa").unwrap().unwrap().span(), Span::new(0, 1));
    let re = Regex::with_options("a+?", CompileFlags::UNGREEDY).unwrap();
    assert_eq!(re.captures("aaa").unwrap().unwrap().span(), Span::new(0, 3));
}

#[test]
fn named_groups() {
    let re = Regex::new("(?<year>\\d{4})-(?<month>\\d{2})").unwrap();
    let caps = re.captures("2024-05").unwrap().unwrap();
    assert_eq!(caps.to_offsets(), [(0, 7), (0, 4), (5, 7)]);
    let names: Vec<_> = re.names().collect();
    assert_eq!(names, [("month", 2), ("year", 1)]);
    assert_eq!(re.capture_count(), 2);
    let field: InfoField = "CAPTURECOUNT".parse().unwrap();
    assert_eq!(re.info(field), InfoValue::Size(2));
}

#[test]
fn duplicate_names() {
    assert_eq!(
        Regex::new("(?<n>a)|(?<n>b)").unwrap_err(),
        Error::Compile(CompileError::DuplicateName("n".into()))
    );
    let re = Regex::with_options("(?<n>a)|(?<n>b)", CompileFlags::DUPNAMES).unwrap();
    assert_eq!(re.name_indices("n"), Some(&[1, 2][..]));
    let caps = re.captures("b").unwrap().unwrap();
    assert_eq!(caps.get(1), None);
    assert_eq!(caps.get(2), Some(Span::new(0, 1)));
}

#[test]
fn compile_flags_change_meaning() {
    let multiline = Regex::with_options("^b", CompileFlags::MULTILINE).unwrap();
    assert_eq!(multiline.captures("a\nb").unwrap().unwrap().span(), Span::new(2, 3));
    assert_eq!(find("^b", "a\nb"), None);

    let dotall = Regex::with_options("a.b", CompileFlags::DOTALL).unwrap();
    assert!(dotall.is_match("a\nb").unwrap());
    assert_eq!(find("a.b", "a\nb"), None);

    let extended = Regex::with_options("a b # comment\n c", CompileFlags::EXTENDED).unwrap();
    assert_eq!(extended.captures("xabc").unwrap().unwrap().span(), Span::new(1, 4));
}

#[test]
fn newline_conventions() {
    let crlf = Regex::with_options("^b", CompileFlags::MULTILINE | CompileFlags::NEWLINE_CRLF).unwrap();
    assert_eq!(crlf.captures("a\r\nb").unwrap().unwrap().span(), Span::new(3, 4));
    let cr = Regex::with_options("a$", CompileFlags::NEWLINE_CR).unwrap();
    assert!(cr.is_match("a\r").unwrap());
    assert!(!cr.is_match("a\n").unwrap());
}

#[test]
fn exec_flags() {
    let caret = Regex::new("^a").unwrap();
    assert_eq!(exec(&caret, "a", ExecFlags::NOTBOL), Outcome::NoMatch);
    let dollar = Regex::new("a$").unwrap();
    assert_eq!(exec(&dollar, "a", ExecFlags::NOTEOL), Outcome::NoMatch);
    let star = Regex::new("a*").unwrap();
    assert_eq!(exec(&star, "bb", ExecFlags::NOTEMPTY), Outcome::NoMatch);
    let outcome = exec(&star, "baa", ExecFlags::NOTEMPTY);
    assert_eq!(outcome.captures().map(|c| c.span()), Some(Span::new(1, 3)));
}

#[test]
fn start_offsets() {
    let re = Regex::new("ab").unwrap();
    let subject = Subject::new("abab");
    let outcome = re.exec(&subject, 2, 0u32).unwrap();
    assert_eq!(outcome.captures().map(|c| c.span()), Some(Span::new(2, 4)));

    let sticky = Regex::new("\\Gab").unwrap();
    let subject = Subject::new("xab");
    assert!(sticky.exec(&subject, 1, 0u32).unwrap().is_match());
    assert_eq!(sticky.exec(&subject, 0, 0u32).unwrap(), Outcome::NoMatch);

    assert_eq!(
        re.exec(&Subject::new("ab"), 5, 0u32).unwrap_err(),
        Error::Exec(ExecError::BadOffset { offset: 5, len: 2 })
    );
}

#[test]
fn partial_matching() {
    let re = Regex::new("abc").unwrap();
    assert_eq!(exec(&re, "xab", ExecFlags::PARTIAL_SOFT), Outcome::Partial(Span::new(1, 3)));
    assert_eq!(exec(&re, "xab", ExecFlags::PARTIAL_HARD), Outcome::Partial(Span::new(1, 3)));
    assert_eq!(exec(&re, "xay", ExecFlags::PARTIAL_SOFT), Outcome::NoMatch);

    // soft prefers a complete match, hard stops at the first partial one
    let re = Regex::new("abcd|ab").unwrap();
    let soft = exec(&re, "abc", ExecFlags::PARTIAL_SOFT);
    assert_eq!(soft.captures().map(|c| c.span()), Some(Span::new(0, 2)));
    assert_eq!(exec(&re, "abc", ExecFlags::PARTIAL_HARD), Outcome::Partial(Span::new(0, 3)));
}

#[test]
fn limits_abort_the_search() {
    let re = Regex::builder().match_limit(10_000).build("(a+)+$").unwrap();
    let subject = format!("{}!", "a".repeat(28));
    assert_eq!(re.is_match(&subject).unwrap_err(), Error::Exec(ExecError::MatchLimit));

    let re = Regex::builder().recursion_limit(5).build("a*").unwrap();
    assert_eq!(
        re.is_match(&"a".repeat(100)).unwrap_err(),
        Error::Exec(ExecError::RecursionLimit)
    );
    assert_eq!(ExecError::MatchLimit.code(), -8);
    assert_eq!(ExecError::RecursionLimit.code(), -21);
}

#[test]
fn find_iter_collects_every_match() {
    let re = Regex::new("\\d+").unwrap();
    let mut matches = re.find_iter("a1b22c333");
    let mut found = Vec::new();
    while let Some(caps) = matches.next() {
        found.push(matches.subject().slice(caps.unwrap().span()).unwrap());
    }
    assert_eq!(found, ["1", "22", "333"]);
}

#[test]
fn tables_round_trip() {
    assert_eq!(error_code("MATCHLIMIT"), Some(-8));
    assert_eq!(error_code("PCRE_ERROR_NOMATCH"), Some(-1));
    assert_eq!(error_name(-8), "MATCHLIMIT");
    assert_eq!(error_name(-99), "unknown error: -99");
    assert_eq!(symbol_value("CASELESS"), Some(1));
    assert_eq!(symbol_name(0x800), Some("UTF8"));
    assert_eq!(config(ConfigField::Utf8), ConfigValue::Bool(true));
    assert!(!rexec::version().is_empty());
}

#[test]
fn shared_between_threads() {
    let re = Regex::new("(\\w+)@(\\w+)").unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let re = &re;
                scope.spawn(move || {
                    let subject = format!("user{i}@host");
                    re.captures(&subject).unwrap().map(|caps| caps.get(1))
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let user = format!("user{i}").chars().count();
            assert_eq!(handle.join().unwrap(), Some(Some(Span::new(0, user))));
        }
    });
}
