//! Lowers a parsed [`Pattern`] into a [`Program`].
//!
//! Groups turn into `Open`/`Close` pairs, alternation and repetition into `Split`
//! and `Jmp`, and look-around and atomic groups into bodies that the matcher
//! runs on their own and then resumes after. Counted repeats are unrolled.

use log::debug;

use crate::ast::{Anchor, BackRefTarget, GroupKind, Node, Pattern};
use crate::class::ClassItem;
use crate::error::CompileError;
use crate::flags::CompileFlags;
use crate::program::{Inst, LiteralChar, Metadata, NameTable, Program};
use crate::unicode;

/// Programs larger than this are refused.
pub const MAX_INSTS: usize = 1_000_000;

/// Compile a parsed pattern. The flags in effect are the ones recorded on
/// the pattern, which include any leading `(*VERB)` settings.
pub fn compile(pattern: &Pattern) -> Result<Program, CompileError> {
    let flags = CompileFlags::validate(pattern.flags.bits())?;
    let allow_dup = flags.contains(CompileFlags::DUPNAMES) || pattern.jchanged;

    let mut names = NameTable::default();
    let mut name_result = Ok(());
    visit(&pattern.root, &mut |node| {
        if let Node::Group {
            kind: GroupKind::Capture {
                index,
                name: Some(name),
            },
            ..
        } = node
        {
            if name_result.is_ok() {
                name_result = names.insert(name, *index, allow_dup);
            }
        }
    });
    name_result?;

    let mut compiler = Compiler {
        insts: Vec::new(),
        classes: Vec::new(),
        registers: 0,
        names: &names,
        capture_count: pattern.capture_count,
        backref_max: 0,
        max_lookbehind: 0,
    };
    compiler.push(Inst::Save(0))?;
    compiler.emit(&pattern.root)?;
    compiler.push(Inst::Save(1))?;
    compiler.push(Inst::Match)?;

    let has_backrefs = contains(&pattern.root, |n| matches!(n, Node::BackRef { .. }));
    let min_len = pattern.root.min_width();
    let first_char = first_char(&pattern.root);
    let meta = Metadata {
        min_len,
        anchored: flags.contains(CompileFlags::ANCHORED) || is_anchored(&pattern.root, has_backrefs),
        start_line: is_start_line(&pattern.root, has_backrefs),
        first_char,
        required_char: if min_len > 1 {
            required_char(&pattern.root)
        } else {
            None
        },
        backref_max: compiler.backref_max,
        max_lookbehind: compiler.max_lookbehind,
        has_cr_or_lf: contains(&pattern.root, mentions_cr_or_lf),
        jchanged: pattern.jchanged,
    };

    let Compiler {
        insts,
        classes,
        registers,
        ..
    } = compiler;
    debug!(
        "compiled {} instructions, {} classes, {} capture groups",
        insts.len(),
        classes.len(),
        pattern.capture_count
    );
    Ok(Program {
        insts,
        classes,
        capture_count: pattern.capture_count,
        registers,
        names,
        flags,
        newline: flags.newline().unwrap_or_default(),
        bsr: flags.bsr().unwrap_or_default(),
        meta,
        study: None,
    })
}

struct Compiler<'n> {
    insts: Vec<Inst>,
    classes: Vec<crate::class::ClassSet>,
    registers: usize,
    names: &'n NameTable,
    capture_count: usize,
    backref_max: usize,
    max_lookbehind: usize,
}

impl Compiler<'_> {
    fn push(&mut self, inst: Inst) -> Result<usize, CompileError> {
        if self.insts.len() >= MAX_INSTS {
            return Err(CompileError::TooLarge);
        }
        self.insts.push(inst);
        Ok(self.insts.len() - 1)
    }

    fn next_pc(&self) -> usize {
        self.insts.len()
    }

    fn emit(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Empty => {}
            Node::Literal { ch, caseless } => {
                let inst = if *caseless && unicode::has_other_case(*ch) {
                    Inst::CharNoCase(unicode::fold(*ch))
                } else {
                    Inst::Char(*ch)
                };
                self.push(inst)?;
            }
            Node::Class(set) => {
                if let Some(ch) = set.as_single() {
                    self.push(Inst::Char(ch))?;
                } else {
                    self.classes.push(set.clone());
                    self.push(Inst::Class(self.classes.len() - 1))?;
                }
            }
            Node::Dot { dotall: true } => {
                self.push(Inst::Any)?;
            }
            Node::Dot { dotall: false } | Node::NotNewline => {
                self.push(Inst::AnyNoNewline)?;
            }
            Node::LineBreak => {
                self.push(Inst::LineBreak)?;
            }
            Node::Concat(nodes) => {
                for node in nodes {
                    self.emit(node)?;
                }
            }
            Node::Alt(branches) => self.emit_alt(branches)?,
            Node::Repeat {
                node,
                min,
                max,
                greedy,
                possessive,
            } => {
                if *possessive {
                    self.emit_atomic(|c| c.emit_repeat(node, *min, *max, true))?;
                } else {
                    self.emit_repeat(node, *min, *max, *greedy)?;
                }
            }
            Node::Group { node, kind } => match kind {
                GroupKind::Capture { index, .. } => {
                    self.push(Inst::Open(*index))?;
                    self.emit(node)?;
                    self.push(Inst::Close(*index))?;
                }
                GroupKind::NonCapture => self.emit(node)?,
                GroupKind::Atomic => self.emit_atomic(|c| c.emit(node))?,
            },
            Node::Anchor(anchor) => {
                self.push(Inst::Assert(*anchor))?;
            }
            Node::BackRef { target, caseless } => {
                let groups = self.resolve(target)?;
                if let Some(&max) = groups.iter().max() {
                    self.backref_max = self.backref_max.max(max);
                }
                self.push(Inst::Backref {
                    groups,
                    caseless: *caseless,
                })?;
            }
            Node::Look {
                node,
                behind,
                negated,
            } => self.emit_look(node, *behind, *negated)?,
        }
        Ok(())
    }

    fn resolve(&self, target: &BackRefTarget) -> Result<Vec<usize>, CompileError> {
        match target {
            BackRefTarget::Index(index) if *index > self.capture_count => {
                Err(CompileError::NonexistentGroup(*index))
            }
            BackRefTarget::Index(index) => Ok(vec![*index]),
            BackRefTarget::Name(name) => self
                .names
                .get(name)
                .map(<[usize]>::to_vec)
                .ok_or_else(|| CompileError::UnknownGroupName(name.clone())),
        }
    }

    fn split(body: usize, exit: usize, greedy: bool) -> Inst {
        if greedy {
            Inst::Split(body, exit)
        } else {
            Inst::Split(exit, body)
        }
    }

    fn emit_alt(&mut self, branches: &[Node]) -> Result<(), CompileError> {
        let mut jumps = Vec::new();
        let last = branches.len().saturating_sub(1);
        for (i, branch) in branches.iter().enumerate() {
            if i == last {
                self.emit(branch)?;
                break;
            }
            let split = self.push(Inst::Split(0, 0))?;
            self.emit(branch)?;
            jumps.push(self.push(Inst::Jmp(0))?);
            self.insts[split] = Inst::Split(split + 1, self.next_pc());
        }
        let end = self.next_pc();
        for jump in jumps {
            self.insts[jump] = Inst::Jmp(end);
        }
        Ok(())
    }

    /// `x{min,max}`: `min` mandatory copies, then either a loop or a chain
    /// of optional copies that all bail out to the same exit.
    fn emit_repeat(
        &mut self,
        node: &Node,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<(), CompileError> {
        for _ in 0..min {
            self.emit(node)?;
        }
        let Some(max) = max else {
            return self.emit_star(node, greedy);
        };
        let mut splits = Vec::new();
        for _ in min..max {
            splits.push(self.push(Inst::Split(0, 0))?);
            self.emit(node)?;
        }
        let exit = self.next_pc();
        for split in splits {
            self.insts[split] = Self::split(split + 1, exit, greedy);
        }
        Ok(())
    }

    fn emit_star(&mut self, node: &Node, greedy: bool) -> Result<(), CompileError> {
        let top = self.push(Inst::Split(0, 0))?;
        let reg = if node.min_width() == 0 {
            let reg = self.registers;
            self.registers += 1;
            self.push(Inst::SetMark(reg))?;
            Some(reg)
        } else {
            None
        };
        self.emit(node)?;
        let check = match reg {
            Some(reg) => Some((self.push(Inst::LoopCheck { reg, exit: 0 })?, reg)),
            None => None,
        };
        self.push(Inst::Jmp(top))?;
        let exit = self.next_pc();
        self.insts[top] = Self::split(top + 1, exit, greedy);
        if let Some((pc, reg)) = check {
            self.insts[pc] = Inst::LoopCheck { reg, exit };
        }
        Ok(())
    }

    fn emit_atomic(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        let at = self.push(Inst::Atomic { next: 0 })?;
        body(self)?;
        self.push(Inst::SubEnd)?;
        self.insts[at] = Inst::Atomic {
            next: self.next_pc(),
        };
        Ok(())
    }

    fn emit_look(&mut self, node: &Node, behind: bool, negated: bool) -> Result<(), CompileError> {
        let width = if behind {
            match node.fixed_width() {
                Some(width) => Some(width),
                None => return self.emit_split_lookbehind(node, negated),
            }
        } else {
            None
        };
        if let Some(width) = width {
            self.max_lookbehind = self.max_lookbehind.max(width);
        }
        let at = self.push(Inst::Look {
            behind: width,
            negated,
            next: 0,
        })?;
        self.emit(node)?;
        self.push(Inst::SubEnd)?;
        self.insts[at] = Inst::Look {
            behind: width,
            negated,
            next: self.next_pc(),
        };
        Ok(())
    }

    /// `(?<=ab|c)` becomes `(?<=ab)|(?<=c)` and `(?<!ab|c)` becomes
    /// `(?<!ab)(?<!c)`. Each alternative still needs a fixed width.
    fn emit_split_lookbehind(&mut self, node: &Node, negated: bool) -> Result<(), CompileError> {
        let Node::Alt(branches) = node else {
            return Err(CompileError::LookbehindNotFixed);
        };
        if branches.iter().any(|b| b.fixed_width().is_none()) {
            return Err(CompileError::LookbehindNotFixed);
        }
        let looks: Vec<Node> = branches
            .iter()
            .map(|branch| Node::Look {
                node: Box::new(branch.clone()),
                behind: true,
                negated,
            })
            .collect();
        if negated {
            self.emit(&Node::Concat(looks))
        } else {
            self.emit_alt(&looks)
        }
    }
}

fn visit(node: &Node, f: &mut impl FnMut(&Node)) {
    f(node);
    for child in node.children() {
        visit(child, f);
    }
}

fn contains(node: &Node, pred: impl Fn(&Node) -> bool) -> bool {
    let mut found = false;
    visit(node, &mut |n| found |= pred(n));
    found
}

fn mentions_cr_or_lf(node: &Node) -> bool {
    let in_range = |lo: char, hi: char| (lo..=hi).contains(&'\r') || (lo..=hi).contains(&'\n');
    match node {
        Node::Literal { ch, .. } => *ch == '\r' || *ch == '\n',
        Node::Class(set) => set.items.iter().any(|item| match item {
            ClassItem::Range(lo, hi) => in_range(*lo, *hi),
            _ => false,
        }),
        _ => false,
    }
}

/// `.*` at the start of a branch.
fn is_dot_star(node: &Node, dotall: bool) -> bool {
    match node {
        Node::Repeat {
            node,
            min: 0,
            max: None,
            possessive: false,
            ..
        } => matches!(**node, Node::Dot { dotall: d } if d == dotall),
        _ => false,
    }
}

/// Every branch can only match at the start position.
fn is_anchored(node: &Node, has_backrefs: bool) -> bool {
    match node {
        Node::Anchor(Anchor::StartText | Anchor::StartOfMatch) => true,
        Node::Anchor(Anchor::Caret { multiline: false }) => true,
        Node::Concat(nodes) => nodes.first().is_some_and(|n| is_anchored(n, has_backrefs)),
        Node::Alt(branches) => branches.iter().all(|n| is_anchored(n, has_backrefs)),
        Node::Group { node, .. } => is_anchored(node, has_backrefs),
        n => !has_backrefs && is_dot_star(n, true),
    }
}

/// Every branch can only match at the start of a line.
fn is_start_line(node: &Node, has_backrefs: bool) -> bool {
    match node {
        Node::Anchor(Anchor::Caret { multiline: true }) => true,
        Node::Concat(nodes) => nodes.first().is_some_and(|n| is_start_line(n, has_backrefs)),
        Node::Alt(branches) => branches.iter().all(|n| is_start_line(n, has_backrefs)),
        Node::Group { node, .. } => is_start_line(node, has_backrefs),
        n => !has_backrefs && is_dot_star(n, false),
    }
}

fn literal(node: &Node) -> Option<LiteralChar> {
    match node {
        Node::Literal { ch, caseless } => Some(LiteralChar {
            ch: *ch,
            caseless: *caseless && unicode::has_other_case(*ch),
        }),
        Node::Class(set) => set.as_single().map(|ch| LiteralChar {
            ch,
            caseless: false,
        }),
        _ => None,
    }
}

fn same<I: Iterator<Item = Option<LiteralChar>>>(mut chars: I) -> Option<LiteralChar> {
    let first = chars.next()??;
    chars.all(|c| c == Some(first)).then_some(first)
}

/// The character every match starts with.
fn first_char(node: &Node) -> Option<LiteralChar> {
    match node {
        Node::Concat(nodes) => nodes
            .iter()
            .find(|n| !matches!(n, Node::Anchor(_) | Node::Look { .. }))
            .and_then(first_char),
        Node::Alt(branches) => same(branches.iter().map(first_char)),
        Node::Group { node, .. } => first_char(node),
        Node::Repeat { node, min, .. } if *min > 0 => first_char(node),
        n => literal(n),
    }
}

/// The last literal character every match must contain.
fn required_char(node: &Node) -> Option<LiteralChar> {
    match node {
        Node::Concat(nodes) => nodes.iter().rev().find_map(required_char),
        Node::Alt(branches) => same(branches.iter().map(required_char)),
        Node::Group { node, .. } => required_char(node),
        Node::Repeat { node, min, .. } if *min > 0 => required_char(node),
        n => literal(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn program(pattern: &str) -> Program {
        compile(&parse(pattern, CompileFlags::empty()).unwrap()).unwrap()
    }

    fn compile_err(pattern: &str, flags: CompileFlags) -> CompileError {
        compile(&parse(pattern, flags).unwrap()).unwrap_err()
    }

    #[test]
    fn simple_program_shape() {
        let prog = program("ab");
        assert_eq!(
            prog.insts,
            [Inst::Save(0), Inst::Char('a'), Inst::Char('b'), Inst::Save(1), Inst::Match]
        );
    }

    #[test]
    fn alternation_and_star() {
        let prog = program("a|b*");
        assert_eq!(
            prog.insts,
            [
                Inst::Save(0),
                Inst::Split(2, 4),
                Inst::Char('a'),
                Inst::Jmp(7),
                Inst::Split(5, 7),
                Inst::Char('b'),
                Inst::Jmp(4),
                Inst::Save(1),
                Inst::Match,
            ]
        );
    }

    #[test]
    fn nullable_loop_gets_a_guard() {
        let prog = program("(a?)*");
        assert_eq!(prog.registers, 1);
        assert!(prog.insts.iter().any(|i| matches!(i, Inst::LoopCheck { reg: 0, .. })));
    }

    #[test]
    fn reference_checks() {
        assert_eq!(compile_err("(a)\\2", CompileFlags::empty()), CompileError::NonexistentGroup(2));
        assert_eq!(
            compile_err("(?<a>x)\\k<b>", CompileFlags::empty()),
            CompileError::UnknownGroupName("b".into())
        );
        assert_eq!(
            compile_err("(?<n>a)(?<n>b)", CompileFlags::empty()),
            CompileError::DuplicateName("n".into())
        );
        assert!(compile(&parse("(?<n>a)(?<n>b)", CompileFlags::DUPNAMES).unwrap()).is_ok());
        assert!(compile(&parse("(?J)(?<n>a)(?<n>b)", CompileFlags::empty()).unwrap()).is_ok());
        // forward references are fine
        assert!(compile(&parse("\\1(a)", CompileFlags::empty()).unwrap()).is_ok());
    }

    #[test]
    fn lookbehind_widths() {
        assert_eq!(compile_err("(?<=a+)b", CompileFlags::empty()), CompileError::LookbehindNotFixed);
        let prog = program("(?<=ab|c)d");
        assert_eq!(prog.meta.max_lookbehind, 2);
        let looks = prog.insts.iter().filter(|i| matches!(i, Inst::Look { .. })).count();
        assert_eq!(looks, 2);
    }

    #[test]
    fn oversized_programs_are_refused() {
        assert_eq!(compile_err("(?:a{1000}){1001}", CompileFlags::empty()), CompileError::TooLarge);
    }

    #[test]
    fn metadata() {
        let prog = program("abc|abd");
        assert_eq!(prog.meta.min_len, 3);
        assert_eq!(prog.meta.first_char, Some(LiteralChar { ch: 'a', caseless: false }));
        assert_eq!(prog.meta.required_char, None);
        assert!(!prog.meta.anchored);

        let prog = program("^x|\\Ay");
        assert!(prog.meta.anchored);
        let prog = program("(?m)^x");
        assert!(prog.meta.start_line && !prog.meta.anchored);

        let prog = program("a.*z");
        assert_eq!(prog.meta.required_char, Some(LiteralChar { ch: 'z', caseless: false }));
        assert!(program("a\\r").meta.has_cr_or_lf);
        assert_eq!(program("(a)(b)\\2").meta.backref_max, 2);
    }

    #[test]
    fn bad_flags_are_rejected() {
        let flags = CompileFlags::from_bits_retain(0x0060_0000);
        let pattern = Pattern {
            root: Node::Empty,
            capture_count: 0,
            flags,
            jchanged: false,
        };
        assert_eq!(compile(&pattern), Err(CompileError::BadNewline { bits: 0x0060_0000 }));
    }
}
