//! The backtracking matcher.
//!
//! Alternatives that have not been tried yet are kept on an explicit stack
//! of frames, together with the capture and loop-register values to put
//! back when backtracking past the instruction that changed them. Only
//! look-around and atomic bodies recurse, so native stack depth follows the
//! nesting of the pattern and not the length of the subject.

use log::debug;

use crate::ast::Anchor;
use crate::captures::{Captures, Outcome, Span};
use crate::config::Limits;
use crate::error::ExecError;
use crate::flags::{CompileFlags, ExecFlags, Newline};
use crate::program::{Inst, Program};
use crate::unicode;

/// Search `text` for `program`, trying start positions from `start`.
pub fn exec(
    program: &Program,
    text: &[char],
    start: usize,
    flags: ExecFlags,
    limits: &Limits,
) -> Result<Outcome, ExecError> {
    if start > text.len() {
        return Err(ExecError::BadOffset {
            offset: start,
            len: text.len(),
        });
    }
    let partial = if flags.contains(ExecFlags::PARTIAL_HARD) {
        Some(PartialMode::Hard)
    } else if flags.contains(ExecFlags::PARTIAL_SOFT) {
        Some(PartialMode::Soft)
    } else {
        None
    };
    let mut matcher = Matcher {
        prog: program,
        text,
        start_offset: start,
        flags,
        limits: *limits,
        partial,
        attempt_start: start,
        steps: 0,
        held: 0,
        hit_end: false,
        slots: vec![None; program.slot_count()],
        opens: vec![None; program.capture_count + 1],
        regs: vec![usize::MAX; program.registers],
    };
    matcher.search()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartialMode {
    Soft,
    Hard,
}

#[derive(Debug)]
enum Frame {
    Retry { pc: usize, pos: usize },
    RestoreSlot { slot: usize, old: Option<usize> },
    RestoreOpen { group: usize, old: Option<usize> },
    RestoreReg { reg: usize, old: usize },
}

/// Why a run stopped before exhausting its alternatives.
enum Halt {
    Error(ExecError),
    /// Hard partial matching hit the end of the subject.
    Partial,
}

impl From<ExecError> for Halt {
    fn from(err: ExecError) -> Self {
        Halt::Error(err)
    }
}

struct Matcher<'a> {
    prog: &'a Program,
    text: &'a [char],
    start_offset: usize,
    flags: ExecFlags,
    limits: Limits,
    partial: Option<PartialMode>,
    attempt_start: usize,
    steps: u64,
    /// Frames held by enclosing runs plus the nesting of sub-runs.
    held: u64,
    hit_end: bool,
    slots: Vec<Option<usize>>,
    /// Start of each group that is open on the current path.
    opens: Vec<Option<usize>>,
    regs: Vec<usize>,
}

impl Matcher<'_> {
    fn search(&mut self) -> Result<Outcome, ExecError> {
        let prog = self.prog;
        let text = self.text;
        let len = text.len();
        let start = self.start_offset;
        let anchored = prog.meta.anchored || self.flags.contains(ExecFlags::ANCHORED);
        let optimize = !prog.flags.contains(CompileFlags::NO_START_OPTIMIZE)
            && !self.flags.contains(ExecFlags::NO_START_OPTIMIZE);
        let crlf_aware = !prog.meta.has_cr_or_lf
            && matches!(prog.newline, Newline::CrLf | Newline::Any | Newline::AnyCrLf);

        let last_start = if prog.flags.contains(CompileFlags::FIRSTLINE) {
            (start..len)
                .find(|&p| prog.newline.len_at(text, p).is_some())
                .unwrap_or(len)
        } else {
            len
        };

        // the length and required-character checks would hide partial matches
        let prechecks = optimize && !self.flags.partial();
        let mut required_until = None;
        if prechecks {
            if len - start < prog.meta.min_len {
                return Ok(Outcome::NoMatch);
            }
            if let Some(required) = prog.meta.required_char {
                match text[start..].iter().rposition(|&c| required.matches(c)) {
                    Some(i) => required_until = Some(start + i),
                    None => return Ok(Outcome::NoMatch),
                }
            }
        }

        let mut partial_at = None;
        let mut pos = start;
        while pos <= last_start && (!anchored || pos == start) {
            if prechecks {
                if len - pos < prog.meta.min_len {
                    break;
                }
                if required_until.is_some_and(|last| pos > last) {
                    break;
                }
            }
            if optimize && !self.may_start(pos) {
                pos += 1;
                continue;
            }
            self.hit_end = false;
            match self.attempt(pos) {
                Ok(Some(caps)) => return Ok(Outcome::Match(caps)),
                Ok(None) => {}
                Err(Halt::Partial) => return Ok(Outcome::Partial(Span::new(pos, len))),
                Err(Halt::Error(err)) => return Err(err),
            }
            if self.hit_end && partial_at.is_none() {
                partial_at = Some(pos);
            }
            // never start between the two halves of a CRLF
            let crlf = text.get(pos) == Some(&'\r') && text.get(pos + 1) == Some(&'\n');
            pos += if crlf && crlf_aware { 2 } else { 1 };
        }
        Ok(match partial_at {
            Some(at) => Outcome::Partial(Span::new(at, len)),
            None => Outcome::NoMatch,
        })
    }

    /// Cheap checks that rule out a start position.
    fn may_start(&self, pos: usize) -> bool {
        let meta = &self.prog.meta;
        let text = self.text;
        if let Some(first) = meta.first_char {
            return text.get(pos).is_some_and(|&c| first.matches(c));
        }
        if meta.start_line {
            let newline = self.prog.newline;
            return pos == self.start_offset
                || (newline.len_before(text, pos).is_some() && !newline.splits_crlf(text, pos));
        }
        match self.prog.study.as_ref().and_then(|s| s.start_bits.as_ref()) {
            Some(bits) => text.get(pos).is_some_and(|&c| bits.contains(c)),
            None => true,
        }
    }

    fn attempt(&mut self, start: usize) -> Result<Option<Captures>, Halt> {
        self.attempt_start = start;
        let mut stack = Vec::new();
        Ok(self
            .run(0, start, &mut stack)?
            .map(|_| Captures::from_slots(&self.slots)))
    }

    fn run(&mut self, mut pc: usize, mut pos: usize, stack: &mut Vec<Frame>) -> Result<Option<usize>, Halt> {
        let prog = self.prog;
        let text = self.text;
        loop {
            let next = match &prog.insts[pc] {
                Inst::Match => {
                    if self.rejects_empty(pos) {
                        None
                    } else {
                        return Ok(Some(pos));
                    }
                }
                Inst::SubEnd => return Ok(Some(pos)),
                Inst::Char(ch) => self.single(pos, |c| c == *ch)?.map(|p| (pc + 1, p)),
                Inst::CharNoCase(folded) => self
                    .single(pos, |c| unicode::fold(c) == *folded)?
                    .map(|p| (pc + 1, p)),
                Inst::Any => self.single(pos, |_| true)?.map(|p| (pc + 1, p)),
                Inst::AnyNoNewline => {
                    if prog.newline.len_at(text, pos).is_some() {
                        None
                    } else {
                        self.single(pos, |_| true)?.map(|p| (pc + 1, p))
                    }
                }
                Inst::Class(index) => {
                    let set = &prog.classes[*index];
                    self.single(pos, |c| set.matches(c))?.map(|p| (pc + 1, p))
                }
                Inst::LineBreak => match prog.bsr.len_at(text, pos) {
                    Some(n) => Some((pc + 1, pos + n)),
                    None => {
                        if pos >= text.len() {
                            self.note_end(pos)?;
                        }
                        None
                    }
                },
                Inst::Assert(anchor) => self.assert(*anchor, pos).then_some((pc + 1, pos)),
                Inst::Save(slot) => {
                    stack.push(Frame::RestoreSlot {
                        slot: *slot,
                        old: self.slots[*slot],
                    });
                    self.slots[*slot] = Some(pos);
                    Some((pc + 1, pos))
                }
                Inst::Open(group) => {
                    stack.push(Frame::RestoreOpen {
                        group: *group,
                        old: self.opens[*group],
                    });
                    self.opens[*group] = Some(pos);
                    Some((pc + 1, pos))
                }
                Inst::Close(group) => {
                    let (start, end) = (2 * group, 2 * group + 1);
                    stack.push(Frame::RestoreSlot {
                        slot: start,
                        old: self.slots[start],
                    });
                    stack.push(Frame::RestoreSlot {
                        slot: end,
                        old: self.slots[end],
                    });
                    self.slots[start] = self.opens[*group];
                    self.slots[end] = Some(pos);
                    Some((pc + 1, pos))
                }
                Inst::Split(first, second) => {
                    self.tick(stack.len())?;
                    stack.push(Frame::Retry { pc: *second, pos });
                    Some((*first, pos))
                }
                Inst::Jmp(target) => Some((*target, pos)),
                Inst::Backref { groups, caseless } => {
                    self.backref(groups, *caseless, pos)?.map(|p| (pc + 1, p))
                }
                Inst::SetMark(reg) => {
                    stack.push(Frame::RestoreReg {
                        reg: *reg,
                        old: self.regs[*reg],
                    });
                    self.regs[*reg] = pos;
                    Some((pc + 1, pos))
                }
                Inst::LoopCheck { reg, exit } => {
                    let target = if self.regs[*reg] == pos { *exit } else { pc + 1 };
                    Some((target, pos))
                }
                Inst::Look {
                    behind,
                    negated,
                    next,
                } => {
                    self.tick(stack.len())?;
                    let from = match behind {
                        Some(width) => pos.checked_sub(*width),
                        None => Some(pos),
                    };
                    let body = match from {
                        Some(from) => self.sub_run(pc + 1, from, stack.len())?,
                        None => None,
                    };
                    match (body, *negated) {
                        (Some((_, frames)), false) => {
                            keep_restores(frames, stack);
                            Some((*next, pos))
                        }
                        (Some((_, frames)), true) => {
                            self.undo(frames);
                            None
                        }
                        (None, false) => None,
                        (None, true) => Some((*next, pos)),
                    }
                }
                Inst::Atomic { next } => {
                    self.tick(stack.len())?;
                    match self.sub_run(pc + 1, pos, stack.len())? {
                        Some((end, frames)) => {
                            keep_restores(frames, stack);
                            Some((*next, end))
                        }
                        None => None,
                    }
                }
                Inst::Fail => None,
            };
            match next.or_else(|| self.backtrack(stack)) {
                Some((next_pc, next_pos)) => {
                    pc = next_pc;
                    pos = next_pos;
                }
                None => return Ok(None),
            }
        }
    }

    /// Run a look-around or atomic body on a fresh stack. On success the
    /// body's frames come back so the caller can keep or undo its captures.
    fn sub_run(
        &mut self,
        pc: usize,
        pos: usize,
        outer_frames: usize,
    ) -> Result<Option<(usize, Vec<Frame>)>, Halt> {
        let saved = self.held;
        self.held += outer_frames as u64 + 1;
        if self.held >= self.limits.recursion_limit {
            debug!("recursion limit of {} reached", self.limits.recursion_limit);
            return Err(ExecError::RecursionLimit.into());
        }
        let mut frames = Vec::new();
        let result = self.run(pc, pos, &mut frames);
        self.held = saved;
        Ok(result?.map(|end| (end, frames)))
    }

    fn backtrack(&mut self, stack: &mut Vec<Frame>) -> Option<(usize, usize)> {
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Retry { pc, pos } => return Some((pc, pos)),
                Frame::RestoreSlot { slot, old } => self.slots[slot] = old,
                Frame::RestoreOpen { group, old } => self.opens[group] = old,
                Frame::RestoreReg { reg, old } => self.regs[reg] = old,
            }
        }
        None
    }

    /// Put back everything a finished body changed.
    fn undo(&mut self, frames: Vec<Frame>) {
        for frame in frames.into_iter().rev() {
            match frame {
                Frame::Retry { .. } => {}
                Frame::RestoreSlot { slot, old } => self.slots[slot] = old,
                Frame::RestoreOpen { group, old } => self.opens[group] = old,
                Frame::RestoreReg { reg, old } => self.regs[reg] = old,
            }
        }
    }

    fn tick(&mut self, frames: usize) -> Result<(), Halt> {
        self.steps += 1;
        if self.steps > self.limits.match_limit {
            debug!("match limit of {} reached", self.limits.match_limit);
            return Err(ExecError::MatchLimit.into());
        }
        if self.held + frames as u64 >= self.limits.recursion_limit {
            debug!("recursion limit of {} reached", self.limits.recursion_limit);
            return Err(ExecError::RecursionLimit.into());
        }
        Ok(())
    }

    /// Consume one character satisfying `pred`.
    fn single(&mut self, pos: usize, pred: impl Fn(char) -> bool) -> Result<Option<usize>, Halt> {
        match self.text.get(pos) {
            Some(&c) => Ok(pred(c).then_some(pos + 1)),
            None => {
                self.note_end(pos)?;
                Ok(None)
            }
        }
    }

    /// A path wanted more subject than there is.
    fn note_end(&mut self, pos: usize) -> Result<(), Halt> {
        match self.partial {
            Some(PartialMode::Hard) if pos > self.attempt_start => Err(Halt::Partial),
            Some(PartialMode::Soft) if pos > self.attempt_start => {
                self.hit_end = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn rejects_empty(&self, pos: usize) -> bool {
        pos == self.attempt_start
            && (self.flags.contains(ExecFlags::NOTEMPTY)
                || (self.flags.contains(ExecFlags::NOTEMPTY_ATSTART)
                    && self.attempt_start == self.start_offset))
    }

    fn backref(&mut self, groups: &[usize], caseless: bool, pos: usize) -> Result<Option<usize>, Halt> {
        let span = groups.iter().find_map(|&g| match (self.slots[2 * g], self.slots[2 * g + 1]) {
            (Some(start), Some(end)) if start <= end => Some(start..end),
            _ => None,
        });
        let Some(span) = span else {
            // an unset group matches nothing, or the empty string in
            // JavaScript mode
            let js = self.prog.flags.contains(CompileFlags::JAVASCRIPT_COMPAT);
            return Ok(js.then_some(pos));
        };
        let text = self.text;
        let mut at = pos;
        for &want in &text[span] {
            let Some(&got) = text.get(at) else {
                self.note_end(at)?;
                return Ok(None);
            };
            let same = got == want || (caseless && unicode::fold(got) == unicode::fold(want));
            if !same {
                return Ok(None);
            }
            at += 1;
        }
        Ok(Some(at))
    }

    fn assert(&self, anchor: Anchor, pos: usize) -> bool {
        let text = self.text;
        let len = text.len();
        let newline = self.prog.newline;
        let notbol = self.flags.contains(ExecFlags::NOTBOL);
        let noteol = self.flags.contains(ExecFlags::NOTEOL);
        let before_final_newline = || newline.len_at(text, pos) == Some(len - pos);
        match anchor {
            Anchor::Caret { multiline } => {
                (pos == 0 && !notbol)
                    || (multiline
                        && pos > 0
                        && pos < len
                        && newline.len_before(text, pos).is_some()
                        && !newline.splits_crlf(text, pos))
            }
            Anchor::Dollar {
                multiline: true, ..
            } => {
                (pos == len && !noteol)
                    || (newline.len_at(text, pos).is_some() && !newline.splits_crlf(text, pos))
            }
            Anchor::Dollar { end_only, .. } => {
                !noteol && (pos == len || (!end_only && before_final_newline()))
            }
            Anchor::StartText => pos == 0,
            Anchor::EndText => pos == len,
            Anchor::EndTextOptNewline => pos == len || before_final_newline(),
            Anchor::StartOfMatch => pos == self.start_offset,
            Anchor::WordBoundary { negated, unicode } => {
                let before = pos > 0 && unicode::is_word(text[pos - 1], unicode);
                let after = text.get(pos).is_some_and(|&c| unicode::is_word(c, unicode));
                (before != after) != negated
            }
        }
    }
}

/// Keep a finished body's captures but drop its untried alternatives.
fn keep_restores(frames: Vec<Frame>, stack: &mut Vec<Frame>) {
    stack.extend(
        frames
            .into_iter()
            .filter(|frame| !matches!(frame, Frame::Retry { .. })),
    );
}
