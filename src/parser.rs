use crate::ast::{Anchor, BackRefTarget, GroupKind, Node, Pattern};
use crate::class::{ClassItem, ClassSet, PerlClass};
use crate::config::PARENS_LIMIT;
use crate::error::{ParseError, ParseErrorKind};
use crate::flags::{Bsr, CompileFlags, Newline};
use crate::unicode::{PosixClass, Property};

const MAX_NESTING: usize = PARENS_LIMIT as usize;
const MAX_REPEAT: u32 = 65535;
const MAX_NAME_LEN: usize = 32;

/// Parse `pattern` under `flags` into a [`Pattern`].
pub fn parse(pattern: &str, flags: CompileFlags) -> Result<Pattern, ParseError> {
    Parser::new(pattern, flags).parse()
}

/// What a backslash sequence stands for once the caller knows whether it
/// sits inside a character class.
enum Escape {
    Char(char),
    Item(ClassItem),
}

/// Parser for regular expressions.
///
/// The `Parser` struct holds the pattern and the current byte position.
/// It also manages group IDs for capturing groups and the option state that
/// inline settings such as `(?i)` change while parsing.
pub struct Parser<'a> {
    pattern: &'a str,
    pos: usize,
    next_group_id: usize,
    /// Flags after leading `(*VERB)` items; fixed for the whole pattern.
    flags: CompileFlags,
    /// Flags in effect at the current position.
    mode: CompileFlags,
    jchanged: bool,
    depth: usize,
    in_quote: bool,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given pattern.
    pub fn new(pattern: &'a str, flags: CompileFlags) -> Self {
        Self {
            pattern,
            pos: 0,
            next_group_id: 1,
            flags,
            mode: flags,
            jchanged: false,
            depth: 0,
            in_quote: false,
        }
    }

    /// Allocate a new group ID for capturing groups.
    fn alloc_group_id(&mut self) -> usize {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    fn rest(&self) -> &'a str {
        &self.pattern[self.pos..]
    }

    /// Peek at the next character in the pattern without advancing.
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// Advance the parser by one character and return it.
    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Expect a specific character and advance if it matches.
    fn expect(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.pos)
    }

    fn caseless(&self) -> bool {
        self.mode.contains(CompileFlags::CASELESS)
    }

    fn ucp(&self) -> bool {
        self.flags.contains(CompileFlags::UCP)
    }

    fn js_compat(&self) -> bool {
        self.flags.contains(CompileFlags::JAVASCRIPT_COMPAT)
    }

    fn literal(&self, ch: char) -> Node {
        Node::Literal {
            ch,
            caseless: self.caseless(),
        }
    }

    /// Entry point for parsing a regex pattern.
    ///
    /// Leading `(*VERB)` items adjust the flags first, then `parse_alt`
    /// reads the body. A stray `)` is the only way to stop early.
    pub fn parse(mut self) -> Result<Pattern, ParseError> {
        self.parse_start_verbs()?;
        self.mode = self.flags;
        let root = self.parse_alt()?;
        if self.pos < self.pattern.len() {
            return Err(self.error(ParseErrorKind::UnmatchedCloseParen));
        }
        Ok(Pattern {
            root,
            capture_count: self.next_group_id - 1,
            flags: self.flags,
            jchanged: self.jchanged,
        })
    }

    /// `(*UTF8)`, `(*CRLF)` and the other settings that may open a pattern.
    fn parse_start_verbs(&mut self) -> Result<(), ParseError> {
        while let Some(body) = self.rest().strip_prefix("(*") {
            let Some(end) = body.find(')') else {
                return Err(self.error(ParseErrorKind::MissingCloseParen));
            };
            let flags = self.flags;
            self.flags = match &body[..end] {
                "UTF8" | "UTF" => flags | CompileFlags::UTF8,
                "UCP" => flags | CompileFlags::UCP,
                "NO_START_OPT" => flags | CompileFlags::NO_START_OPTIMIZE,
                "CR" => flags.with_newline(Newline::Cr),
                "LF" => flags.with_newline(Newline::Lf),
                "CRLF" => flags.with_newline(Newline::CrLf),
                "ANYCRLF" => flags.with_newline(Newline::AnyCrLf),
                "ANY" => flags.with_newline(Newline::Any),
                "BSR_ANYCRLF" => flags.with_bsr(Bsr::AnyCrLf),
                "BSR_UNICODE" => flags.with_bsr(Bsr::Unicode),
                // not a setting; the group parser deals with it
                _ => break,
            };
            self.pos += 2 + end + 1;
        }
        Ok(())
    }

    fn skip_extended(&mut self) {
        if !self.mode.contains(CompileFlags::EXTENDED) || self.in_quote {
            return;
        }
        let newline = self.flags.newline().unwrap_or_default();
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\n' | '\u{0b}' | '\u{0c}' | '\r') => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.advance() {
                        if newline.is_newline_char(c) {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Parse alternation (`|`) in the pattern.
    ///
    /// Example:
    /// - Pattern: `a|b|c` → Alt([Literal('a'), Literal('b'), Literal('c')])
    /// - Pattern: `abc`   → Concat([Literal('a'), Literal('b'), Literal('c')])
    fn parse_alt(&mut self) -> Result<Node, ParseError> {
        let mut branches = vec![self.parse_seq()?];
        while self.expect('|') {
            branches.push(self.parse_seq()?);
        }
        Ok(Node::alt(branches))
    }

    /// Parse a sequence of regex atoms (concatenation).
    fn parse_seq(&mut self) -> Result<Node, ParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_extended();
            if !self.in_quote && matches!(self.peek(), None | Some(')' | '|')) {
                break;
            }
            if self.in_quote && self.peek().is_none() {
                break;
            }
            let node = self.parse_repeat()?;
            if node != Node::Empty {
                nodes.push(node);
            }
        }
        Ok(Node::concat(nodes))
    }

    /// Parse a quantifier after an atom.
    ///
    /// Example:
    /// - Pattern: `a?`     → Repeat { min: 0, max: Some(1), greedy: true }
    /// - Pattern: `b+?`    → Repeat { min: 1, max: None, greedy: false }
    /// - Pattern: `c{2,}+` → Repeat { min: 2, max: None, possessive: true }
    fn parse_repeat(&mut self) -> Result<Node, ParseError> {
        let atom = self.parse_atom()?;
        if self.in_quote {
            if self.rest().starts_with("\\E") {
                self.pos += 2;
                self.in_quote = false;
            } else {
                return Ok(atom);
            }
        }
        self.skip_extended();
        let Some((min, max)) = self.parse_quantifier()? else {
            return Ok(atom);
        };
        let ungreedy = self.mode.contains(CompileFlags::UNGREEDY);
        let (greedy, possessive) = if self.expect('?') {
            (ungreedy, false)
        } else if self.expect('+') {
            (true, true)
        } else {
            (!ungreedy, false)
        };
        self.skip_extended();
        if matches!(self.peek(), Some('*' | '+' | '?'))
            || scan_braces(self.rest()).is_some()
        {
            return Err(self.error(ParseErrorKind::NothingToRepeat));
        }
        Ok(Node::Repeat {
            node: Box::new(atom),
            min,
            max,
            greedy,
            possessive,
        })
    }

    fn parse_quantifier(&mut self) -> Result<Option<(u32, Option<u32>)>, ParseError> {
        let quantifier = match self.peek() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') => return self.parse_braces(),
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(quantifier))
    }

    fn parse_braces(&mut self) -> Result<Option<(u32, Option<u32>)>, ParseError> {
        let Some((len, min, max)) = scan_braces(self.rest()) else {
            return Ok(None);
        };
        let number = |digits: &str| {
            digits
                .parse::<u32>()
                .ok()
                .filter(|n| *n <= MAX_REPEAT)
                .ok_or_else(|| self.error(ParseErrorKind::NumberTooBig))
        };
        let min = number(min)?;
        let max = max.map(number).transpose()?;
        if max.is_some_and(|max| max < min) {
            return Err(self.error(ParseErrorKind::QuantifierOutOfOrder));
        }
        self.pos += len;
        Ok(Some((min, max)))
    }

    /// Parse a single regex atom: group, char class, escape, literal, or anchor.
    ///
    /// Examples:
    /// - Pattern: `(abc)` → Group { Capture { index: 1 }, Concat(..) }
    /// - Pattern: `[abc]` → Class(ClassSet { .. })
    /// - Pattern: `\1`    → BackRef { Index(1) }
    /// - Pattern: `^`     → Anchor(Caret)
    fn parse_atom(&mut self) -> Result<Node, ParseError> {
        if self.in_quote {
            if self.rest().starts_with("\\E") {
                self.pos += 2;
                self.in_quote = false;
                return Ok(Node::Empty);
            }
            return Ok(match self.advance() {
                Some(c) => self.literal(c),
                None => Node::Empty,
            });
        }
        let start = self.pos;
        let Some(c) = self.advance() else {
            return Ok(Node::Empty);
        };
        match c {
            '(' => self.parse_group(start),
            '[' => self.parse_class(start).map(Node::Class),
            '\\' => self.parse_escape_atom(start),
            '.' => Ok(Node::Dot {
                dotall: self.mode.contains(CompileFlags::DOTALL),
            }),
            '^' => Ok(Node::Anchor(Anchor::Caret {
                multiline: self.mode.contains(CompileFlags::MULTILINE),
            })),
            '$' => Ok(Node::Anchor(Anchor::Dollar {
                multiline: self.mode.contains(CompileFlags::MULTILINE),
                end_only: self.mode.contains(CompileFlags::DOLLAR_ENDONLY),
            })),
            '*' | '+' | '?' => Err(ParseError::new(ParseErrorKind::NothingToRepeat, start)),
            '{' if scan_braces(&self.pattern[start..]).is_some() => {
                Err(ParseError::new(ParseErrorKind::NothingToRepeat, start))
            }
            c => Ok(self.literal(c)),
        }
    }

    fn enter_group(&mut self, start: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::new(ParseErrorKind::NestingTooDeep, start));
        }
        Ok(())
    }

    fn close_group(&mut self) -> Result<(), ParseError> {
        if !self.expect(')') {
            return Err(self.error(ParseErrorKind::MissingCloseParen));
        }
        self.depth -= 1;
        Ok(())
    }

    /// The body of a group up to and including its `)`. Option changes made
    /// inside do not leak out.
    fn group_body(&mut self, start: usize, kind: GroupKind) -> Result<Node, ParseError> {
        self.enter_group(start)?;
        let saved = self.mode;
        let node = self.parse_alt()?;
        self.mode = saved;
        self.close_group()?;
        Ok(Node::Group {
            node: Box::new(node),
            kind,
        })
    }

    fn look_body(&mut self, start: usize, behind: bool, negated: bool) -> Result<Node, ParseError> {
        self.enter_group(start)?;
        let saved = self.mode;
        let node = self.parse_alt()?;
        self.mode = saved;
        self.close_group()?;
        Ok(Node::Look {
            node: Box::new(node),
            behind,
            negated,
        })
    }

    /// Everything that starts with `(`; the parenthesis is already consumed.
    fn parse_group(&mut self, start: usize) -> Result<Node, ParseError> {
        if self.expect('*') {
            return self.parse_inline_verb(start);
        }
        if !self.expect('?') {
            let kind = if self.mode.contains(CompileFlags::NO_AUTO_CAPTURE) {
                GroupKind::NonCapture
            } else {
                GroupKind::Capture {
                    index: self.alloc_group_id(),
                    name: None,
                }
            };
            return self.group_body(start, kind);
        }
        let Some(c) = self.peek() else {
            return Err(self.error(ParseErrorKind::MissingCloseParen));
        };
        match c {
            '#' => {
                let Some(end) = self.rest().find(')') else {
                    return Err(ParseError::new(ParseErrorKind::UnterminatedComment, start));
                };
                self.pos += end + 1;
                Ok(Node::Empty)
            }
            ':' => {
                self.advance();
                self.group_body(start, GroupKind::NonCapture)
            }
            '>' => {
                self.advance();
                self.group_body(start, GroupKind::Atomic)
            }
            '|' => {
                self.advance();
                self.parse_branch_reset(start)
            }
            '=' | '!' => {
                self.advance();
                self.look_body(start, false, c == '!')
            }
            '<' if matches!(self.peek_at(1), Some('=' | '!')) => {
                self.advance();
                let negated = self.advance() == Some('!');
                self.look_body(start, true, negated)
            }
            '<' | '\'' => {
                self.advance();
                let name = self.parse_name(if c == '<' { '>' } else { '\'' })?;
                self.named_group(start, name)
            }
            'P' => {
                self.advance();
                match self.advance() {
                    Some('<') => {
                        let name = self.parse_name('>')?;
                        self.named_group(start, name)
                    }
                    Some('=') => {
                        let name = self.parse_name(')')?;
                        Ok(Node::BackRef {
                            target: BackRefTarget::Name(name),
                            caseless: self.caseless(),
                        })
                    }
                    Some('>') => Err(ParseError::new(
                        ParseErrorKind::Unsupported("subroutine call"),
                        start,
                    )),
                    _ => Err(self.error(ParseErrorKind::UnrecognizedGroupSyntax)),
                }
            }
            'R' | '&' | '+' | '0'..='9' => {
                Err(ParseError::new(ParseErrorKind::Unsupported("recursion"), start))
            }
            '-' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                Err(ParseError::new(ParseErrorKind::Unsupported("recursion"), start))
            }
            '(' => Err(ParseError::new(
                ParseErrorKind::Unsupported("conditional subpattern"),
                start,
            )),
            'C' => Err(ParseError::new(ParseErrorKind::Unsupported("callout"), start)),
            _ => self.parse_options(start),
        }
    }

    fn named_group(&mut self, start: usize, name: String) -> Result<Node, ParseError> {
        let index = self.alloc_group_id();
        self.group_body(
            start,
            GroupKind::Capture {
                index,
                name: Some(name),
            },
        )
    }

    /// `(?|...)`: every alternative numbers its groups from the same base.
    fn parse_branch_reset(&mut self, start: usize) -> Result<Node, ParseError> {
        self.enter_group(start)?;
        let saved = self.mode;
        let base = self.next_group_id;
        let mut high = base;
        let mut branches = Vec::new();
        loop {
            self.next_group_id = base;
            branches.push(self.parse_seq()?);
            high = high.max(self.next_group_id);
            if !self.expect('|') {
                break;
            }
        }
        self.next_group_id = high;
        self.mode = saved;
        self.close_group()?;
        Ok(Node::Group {
            node: Box::new(Node::alt(branches)),
            kind: GroupKind::NonCapture,
        })
    }

    /// `(?i)`, `(?-m)`, `(?s:...)` and so on.
    fn parse_options(&mut self, start: usize) -> Result<Node, ParseError> {
        let mut on = CompileFlags::empty();
        let mut off = CompileFlags::empty();
        let mut negate = false;
        loop {
            let Some(c) = self.advance() else {
                return Err(self.error(ParseErrorKind::MissingCloseParen));
            };
            let flag = match c {
                'i' => CompileFlags::CASELESS,
                'm' => CompileFlags::MULTILINE,
                's' => CompileFlags::DOTALL,
                'x' => CompileFlags::EXTENDED,
                'U' => CompileFlags::UNGREEDY,
                'X' => CompileFlags::EXTRA,
                'J' => {
                    if !negate {
                        self.jchanged = true;
                    }
                    CompileFlags::DUPNAMES
                }
                '-' if !negate => {
                    negate = true;
                    continue;
                }
                ')' => {
                    self.mode = (self.mode | on) - off;
                    return Ok(Node::Empty);
                }
                ':' => {
                    let outer = self.mode;
                    self.mode = (outer | on) - off;
                    let node = self.group_body(start, GroupKind::NonCapture);
                    self.mode = outer;
                    return node;
                }
                c => {
                    let at = self.pos - c.len_utf8();
                    return Err(ParseError::new(ParseErrorKind::UnrecognizedGroupSyntax, at));
                }
            };
            if negate {
                off |= flag;
            } else {
                on |= flag;
            }
        }
    }

    /// `(*FAIL)` and the backtracking control verbs, which are not supported.
    fn parse_inline_verb(&mut self, start: usize) -> Result<Node, ParseError> {
        let Some(end) = self.rest().find(')') else {
            return Err(ParseError::new(ParseErrorKind::MissingCloseParen, start));
        };
        let name = &self.rest()[..end];
        self.pos += end + 1;
        match name {
            "FAIL" | "F" => Ok(Node::Look {
                node: Box::new(Node::Empty),
                behind: false,
                negated: true,
            }),
            "ACCEPT" | "COMMIT" | "PRUNE" | "SKIP" | "THEN" => Err(ParseError::new(
                ParseErrorKind::Unsupported("backtracking control verb"),
                start,
            )),
            n if n.starts_with("MARK:") || n.starts_with(':') => Err(ParseError::new(
                ParseErrorKind::Unsupported("backtracking control verb"),
                start,
            )),
            _ => Err(ParseError::new(
                ParseErrorKind::UnknownVerb(name.to_string()),
                start,
            )),
        }
    }

    /// A group name up to `terminator`, which is consumed.
    fn parse_name(&mut self, terminator: char) -> Result<String, ParseError> {
        let start = self.pos;
        let mut name = String::new();
        loop {
            match self.advance() {
                Some(c) if c == terminator => break,
                Some(c) if c == '_' || c.is_ascii_alphanumeric() => name.push(c),
                _ => return Err(ParseError::new(ParseErrorKind::InvalidGroupName, start)),
            }
        }
        let leading_digit = name.starts_with(|c: char| c.is_ascii_digit());
        if name.is_empty() || leading_digit || name.len() > MAX_NAME_LEN {
            return Err(ParseError::new(ParseErrorKind::InvalidGroupName, start));
        }
        Ok(name)
    }

    /// A backslash sequence outside a class; the backslash is consumed.
    fn parse_escape_atom(&mut self, start: usize) -> Result<Node, ParseError> {
        let Some(c) = self.peek() else {
            return Err(ParseError::new(ParseErrorKind::TrailingBackslash, start));
        };
        let anchor = |anchor| Node::Anchor(anchor);
        let node = match c {
            'Q' => {
                self.in_quote = true;
                Node::Empty
            }
            'E' => Node::Empty,
            'b' | 'B' => anchor(Anchor::WordBoundary {
                negated: c == 'B',
                unicode: self.ucp(),
            }),
            'A' => anchor(Anchor::StartText),
            'z' => anchor(Anchor::EndText),
            'Z' => anchor(Anchor::EndTextOptNewline),
            'G' => anchor(Anchor::StartOfMatch),
            'R' => Node::LineBreak,
            'N' if self.peek_at(1) == Some('{') => {
                return Err(ParseError::new(ParseErrorKind::Unsupported("\\N{name}"), start));
            }
            'N' => Node::NotNewline,
            'K' | 'X' | 'C' => {
                let what = match c {
                    'K' => "\\K",
                    'X' => "\\X",
                    _ => "\\C",
                };
                return Err(ParseError::new(ParseErrorKind::Unsupported(what), start));
            }
            'k' => {
                self.advance();
                return self.parse_k_reference(start);
            }
            'g' => {
                self.advance();
                return self.parse_g_reference(start);
            }
            '1'..='9' => {
                if let Some(node) = self.parse_numbered_reference() {
                    return Ok(node);
                }
                return self.escape_literal(start);
            }
            _ => return self.escape_literal(start),
        };
        self.advance();
        Ok(node)
    }

    fn escape_literal(&mut self, start: usize) -> Result<Node, ParseError> {
        Ok(match self.parse_escape(start, false)? {
            Escape::Char(ch) => self.literal(ch),
            Escape::Item(item) => Node::Class(ClassSet::from_item(item)),
        })
    }

    fn backref(&self, target: BackRefTarget) -> Node {
        Node::BackRef {
            target,
            caseless: self.caseless(),
        }
    }

    /// `\1` to `\9` are always back references; longer numbers only when that
    /// many groups have been opened, otherwise they are octal escapes.
    fn parse_numbered_reference(&mut self) -> Option<Node> {
        let digits: &str = {
            let rest = self.rest();
            let len = rest.bytes().take_while(u8::is_ascii_digit).count();
            &rest[..len]
        };
        let n = digits.parse::<usize>().unwrap_or(usize::MAX);
        let octal = digits.starts_with(|c: char| ('1'..='7').contains(&c));
        if n < 10 || n < self.next_group_id || !octal {
            self.pos += digits.len();
            return Some(self.backref(BackRefTarget::Index(n)));
        }
        None
    }

    /// `\k<name>`, `\k'name'` and `\k{name}`.
    fn parse_k_reference(&mut self, start: usize) -> Result<Node, ParseError> {
        let terminator = match self.advance() {
            Some('<') => '>',
            Some('\'') => '\'',
            Some('{') => '}',
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::MalformedBackReference,
                    start,
                ))
            }
        };
        let name = self.parse_name(terminator)?;
        Ok(self.backref(BackRefTarget::Name(name)))
    }

    /// `\gN`, `\g-N`, `\g{N}`, `\g{-N}` and `\g{name}`.
    fn parse_g_reference(&mut self, start: usize) -> Result<Node, ParseError> {
        let malformed = ParseError::new(ParseErrorKind::MalformedBackReference, start);
        let text = if self.expect('{') {
            let Some(end) = self.rest().find('}') else {
                return Err(malformed);
            };
            let text = &self.rest()[..end];
            self.pos += end + 1;
            text
        } else if matches!(self.peek(), Some('<' | '\'')) {
            return Err(ParseError::new(
                ParseErrorKind::Unsupported("subroutine call"),
                start,
            ));
        } else {
            let rest = self.rest();
            let sign = usize::from(rest.starts_with('-'));
            let len = sign + rest[sign..].bytes().take_while(u8::is_ascii_digit).count();
            self.pos += len;
            &rest[..len]
        };
        if let Ok(n) = text.parse::<isize>() {
            let index = if n < 0 {
                self.next_group_id as isize + n
            } else if text.starts_with('+') {
                0
            } else {
                n
            };
            if index <= 0 {
                return Err(malformed);
            }
            return Ok(self.backref(BackRefTarget::Index(index as usize)));
        }
        let valid = !text.is_empty()
            && !text.starts_with(|c: char| c.is_ascii_digit())
            && text.chars().all(|c| c == '_' || c.is_ascii_alphanumeric());
        if !valid {
            return Err(malformed);
        }
        Ok(self.backref(BackRefTarget::Name(text.to_string())))
    }

    /// Escapes that mean the same thing inside and outside a class. The
    /// backslash is consumed; `start` points at it.
    fn parse_escape(&mut self, start: usize, in_class: bool) -> Result<Escape, ParseError> {
        let Some(c) = self.advance() else {
            return Err(ParseError::new(ParseErrorKind::TrailingBackslash, start));
        };
        let perl = |class, negated, unicode| {
            Escape::Item(ClassItem::Perl {
                class,
                negated,
                unicode,
            })
        };
        let ucp = self.ucp();
        let js = self.js_compat();
        let escape = match c {
            'a' => Escape::Char('\u{07}'),
            'e' => Escape::Char('\u{1b}'),
            'f' => Escape::Char('\u{0c}'),
            'n' => Escape::Char('\n'),
            'r' => Escape::Char('\r'),
            't' => Escape::Char('\t'),
            'b' if in_class => Escape::Char('\u{08}'),
            '0'..='7' => Escape::Char(self.parse_octal(c)),
            '8' | '9' => Escape::Char(c),
            'x' => Escape::Char(self.parse_hex(start)?),
            'u' if js => Escape::Char(self.parse_js_unicode()),
            'U' if js => Escape::Char('U'),
            'c' => {
                let Some(x) = self.advance() else {
                    return Err(ParseError::new(ParseErrorKind::TrailingControl, start));
                };
                if !x.is_ascii() {
                    return Err(ParseError::new(ParseErrorKind::UnrecognizedEscape('c'), start));
                }
                Escape::Char(char::from(x.to_ascii_uppercase() as u8 ^ 0x40))
            }
            'd' | 'D' => perl(PerlClass::Digit, c == 'D', ucp),
            'w' | 'W' => perl(PerlClass::Word, c == 'W', ucp),
            's' | 'S' => perl(PerlClass::Space, c == 'S', ucp),
            'h' | 'H' => perl(PerlClass::HSpace, c == 'H', ucp),
            'v' | 'V' => perl(PerlClass::VSpace, c == 'V', ucp),
            'p' | 'P' => Escape::Item(self.parse_property(start, c == 'P')?),
            c if c.is_ascii_alphanumeric() => {
                let kind = if in_class {
                    ParseErrorKind::InvalidEscapeInClass(c)
                } else {
                    ParseErrorKind::UnrecognizedEscape(c)
                };
                return Err(ParseError::new(kind, start));
            }
            c => Escape::Char(c),
        };
        Ok(escape)
    }

    /// Up to two more octal digits after `first`.
    fn parse_octal(&mut self, first: char) -> char {
        let mut value = first.to_digit(8).unwrap_or(0);
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    value = value * 8 + d;
                    self.advance();
                }
                None => break,
            }
        }
        char::from_u32(value).unwrap_or('\0')
    }

    fn parse_hex(&mut self, start: usize) -> Result<char, ParseError> {
        if self.js_compat() {
            let digits = self.rest().get(..2).filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()));
            return Ok(match digits.and_then(|d| u32::from_str_radix(d, 16).ok()) {
                Some(value) => {
                    self.pos += 2;
                    char::from_u32(value).unwrap_or('x')
                }
                None => 'x',
            });
        }
        if self.expect('{') {
            let Some(end) = self.rest().find('}') else {
                return Err(ParseError::new(ParseErrorKind::MalformedHex, start));
            };
            let digits = &self.rest()[..end];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseError::new(ParseErrorKind::MalformedHex, start));
            }
            self.pos += end + 1;
            return u32::from_str_radix(digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or(ParseError::new(ParseErrorKind::CharValueTooLarge, start));
        }
        let len = self
            .rest()
            .bytes()
            .take(2)
            .take_while(u8::is_ascii_hexdigit)
            .count();
        let value = u32::from_str_radix(&self.rest()[..len], 16).unwrap_or(0);
        self.pos += len;
        Ok(char::from_u32(value).unwrap_or('\0'))
    }

    /// `\uHHHH` in JavaScript mode; a bare `\u` is the letter itself.
    fn parse_js_unicode(&mut self) -> char {
        let digits = self.rest().get(..4).filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()));
        match digits
            .and_then(|d| u32::from_str_radix(d, 16).ok())
            .and_then(char::from_u32)
        {
            Some(c) => {
                self.pos += 4;
                c
            }
            None => 'u',
        }
    }

    /// `\p{Name}`, `\p{^Name}` or `\pL`; the `p` is consumed.
    fn parse_property(&mut self, start: usize, mut negated: bool) -> Result<ClassItem, ParseError> {
        let name = if self.expect('{') {
            if self.expect('^') {
                negated = !negated;
            }
            let Some(end) = self.rest().find('}') else {
                return Err(ParseError::new(ParseErrorKind::MalformedProperty, start));
            };
            let name = &self.rest()[..end];
            self.pos += end + 1;
            name.to_string()
        } else {
            match self.advance() {
                Some(c) => c.to_string(),
                None => return Err(ParseError::new(ParseErrorKind::MalformedProperty, start)),
            }
        };
        let property = Property::from_name(&name)
            .ok_or_else(|| ParseError::new(ParseErrorKind::UnknownProperty(name), start))?;
        Ok(ClassItem::Property { property, negated })
    }

    /// Parse a character class, e.g. `[abc]`, `[^a-z\d]` or `[[:alpha:]]`.
    /// The opening bracket is consumed.
    fn parse_class(&mut self, start: usize) -> Result<ClassSet, ParseError> {
        let caseless = self.caseless();
        let negated = self.expect('^');
        if self.js_compat() && self.expect(']') {
            // `[]` matches nothing and `[^]` matches anything
            return Ok(ClassSet::new(Vec::new(), negated, false));
        }
        let mut items = Vec::new();
        let mut first = true;
        let mut quoted = false;
        loop {
            let item_start = self.pos;
            let Some(c) = self.advance() else {
                return Err(ParseError::new(
                    ParseErrorKind::MissingTerminatingBracket,
                    start,
                ));
            };
            if quoted {
                if c == '\\' && self.peek() == Some('E') {
                    self.advance();
                    quoted = false;
                } else {
                    items.push(ClassItem::single(c));
                }
                continue;
            }
            if c == ']' && !first {
                break;
            }
            first = false;
            let lo = match c {
                '[' if self.peek() == Some(':') => match self.parse_posix()? {
                    Some(item) => {
                        items.push(item);
                        continue;
                    }
                    None => '[',
                },
                '\\' => match self.peek() {
                    Some('Q') => {
                        self.advance();
                        quoted = true;
                        continue;
                    }
                    Some('E') => {
                        self.advance();
                        continue;
                    }
                    _ => match self.parse_escape(item_start, true)? {
                        Escape::Char(ch) => ch,
                        Escape::Item(item) => {
                            items.push(item);
                            continue;
                        }
                    },
                },
                c => c,
            };
            if self.peek() == Some('-') && !matches!(self.peek_at(1), None | Some(']')) {
                let before_dash = self.pos;
                self.advance();
                let hi_start = self.pos;
                let hi = match self.advance() {
                    Some('\\') => match self.parse_escape(hi_start, true)? {
                        Escape::Char(ch) => Some(ch),
                        Escape::Item(_) => None,
                    },
                    Some('[') if self.peek() == Some(':') => None,
                    other => other,
                };
                match hi {
                    Some(hi) if hi < lo => {
                        return Err(ParseError::new(
                            ParseErrorKind::RangeOutOfOrder,
                            item_start,
                        ));
                    }
                    Some(hi) => {
                        items.push(ClassItem::Range(lo, hi));
                        continue;
                    }
                    // `[a-\d]`: the hyphen is a literal
                    None => self.pos = before_dash,
                }
            }
            items.push(ClassItem::single(lo));
        }
        Ok(ClassSet::new(items, negated, caseless))
    }

    /// `[:name:]` or `[:^name:]`; the opening `[` is consumed. Anything that
    /// does not look like a POSIX class leaves the position untouched.
    fn parse_posix(&mut self) -> Result<Option<ClassItem>, ParseError> {
        let rest = self.rest();
        let Some(end) = rest[1..].find(":]") else {
            return Ok(None);
        };
        let body = &rest[1..1 + end];
        let (negated, name) = match body.strip_prefix('^') {
            Some(name) => (true, name),
            None => (false, body),
        };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
            return Ok(None);
        }
        let class = PosixClass::from_name(name)
            .ok_or_else(|| self.error(ParseErrorKind::UnknownPosixClass(name.to_string())))?;
        self.pos += 1 + end + 2;
        Ok(Some(ClassItem::Posix {
            class,
            negated,
            unicode: self.ucp(),
        }))
    }
}

/// Scans `{n}`, `{n,}` or `{n,m}` at the start of `s`: the byte length,
/// the minimum digits and the maximum digits (`None` when unbounded).
fn scan_braces(s: &str) -> Option<(usize, &str, Option<&str>)> {
    if !s.starts_with('{') {
        return None;
    }
    let close = s.find('}')?;
    let inner = &s[1..close];
    let (min, max) = match inner.split_once(',') {
        None => (inner, Some(inner)),
        Some((min, max)) => (min, (!max.is_empty()).then_some(max)),
    };
    let digits = |d: &str| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit());
    if !digits(min) || !max.map_or(true, digits) {
        return None;
    }
    Some((close + 1, min, max))
}
