//! The optional study pass: works out which characters a match can begin
//! with so the matcher can skip start positions without running the VM.

use std::mem;

use log::debug;

use crate::flags::StudyFlags;
use crate::program::{Inst, Program, StartBits, StudyData};
use crate::unicode;

/// Return a copy of `program` with study data attached.
///
/// Studying never fails. When no start set can be derived the program is
/// returned as is, unless `EXTRA_NEEDED` asks for study data regardless.
pub fn study(program: &Program, flags: StudyFlags) -> Program {
    let jit = StudyFlags::JIT_COMPILE
        | StudyFlags::JIT_PARTIAL_SOFT_COMPILE
        | StudyFlags::JIT_PARTIAL_HARD_COMPILE;
    if flags.intersects(jit) {
        debug!("JIT compilation requested but not available, studying only");
    }
    let start_bits = match start_bits(program) {
        Ok(bits) => Some(bits),
        Err(reason) => {
            debug!("no start set for this pattern: {reason}");
            None
        }
    };
    let mut studied = program.clone();
    if start_bits.is_some() || flags.contains(StudyFlags::EXTRA_NEEDED) {
        let size = mem::size_of::<StudyData>() + start_bits.as_ref().map_or(0, |_| 32);
        studied.study = Some(StudyData { start_bits, size });
    }
    studied
}

/// Walks every path from the first instruction up to the first character
/// it consumes.
fn start_bits(program: &Program) -> Result<StartBits, &'static str> {
    let insts = &program.insts;
    // where to go once an atomic body is done
    let mut after_atomic = vec![None; insts.len()];
    for inst in insts {
        if let Inst::Atomic { next } = inst {
            after_atomic[next - 1] = Some(*next);
        }
    }

    let mut bits = StartBits::default();
    let mut seen = vec![false; insts.len()];
    let mut work = vec![0];
    while let Some(pc) = work.pop() {
        if mem::replace(&mut seen[pc], true) {
            continue;
        }
        match &insts[pc] {
            Inst::Match => return Err("pattern can match an empty string"),
            Inst::SubEnd => match after_atomic[pc] {
                Some(next) => work.push(next),
                None => return Err("pattern can match an empty string"),
            },
            Inst::Char(c) => bits.insert(*c),
            Inst::CharNoCase(folded) => {
                for c in (0u32..256).filter_map(char::from_u32) {
                    if unicode::fold(c) == *folded {
                        bits.insert(c);
                    }
                }
                bits.insert_high();
            }
            Inst::Class(index) => {
                let set = &program.classes[*index];
                for c in (0u32..256).filter_map(char::from_u32) {
                    if set.matches(c) {
                        bits.insert(c);
                    }
                }
                if !set.is_latin1_only() {
                    bits.insert_high();
                }
            }
            Inst::LineBreak => {
                for c in ['\n', '\u{0b}', '\u{0c}', '\r', '\u{85}'] {
                    bits.insert(c);
                }
                bits.insert_high();
            }
            Inst::Any | Inst::AnyNoNewline => return Err("pattern can start with any character"),
            Inst::Backref { .. } => return Err("pattern can start with a back reference"),
            Inst::Save(_)
            | Inst::Open(_)
            | Inst::Close(_)
            | Inst::SetMark(_)
            | Inst::Assert(_)
            | Inst::Atomic { .. } => {
                work.push(pc + 1)
            }
            Inst::LoopCheck { exit, .. } => work.extend([pc + 1, *exit]),
            Inst::Split(a, b) => work.extend([*a, *b]),
            Inst::Jmp(target) => work.push(*target),
            Inst::Look { next, .. } => work.push(*next),
            Inst::Fail => {}
        }
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::flags::CompileFlags;
    use crate::parser::parse;

    fn studied(pattern: &str, flags: StudyFlags) -> Program {
        let program = compile(&parse(pattern, CompileFlags::empty()).unwrap()).unwrap();
        study(&program, flags)
    }

    fn bits(pattern: &str) -> Option<StartBits> {
        studied(pattern, StudyFlags::empty())
            .study
            .and_then(|data| data.start_bits)
    }

    #[test]
    fn alternatives_and_optional_prefixes() {
        let set = bits("abc|x?yz").unwrap();
        for c in ['a', 'x', 'y'] {
            assert!(set.contains(c), "{c}");
        }
        assert!(!set.contains('b'));
        assert!(!set.may_start_high());
    }

    #[test]
    fn classes_and_case_folding() {
        let set = bits("[0-9]+|(?i:k)").unwrap();
        assert!(set.contains('7'));
        assert!(set.contains('K') && set.contains('k'));
        assert!(!set.contains('j'));
    }

    #[test]
    fn lookahead_and_atomic_bodies() {
        let set = bits("(?=x)(?>a|b)c").unwrap();
        assert!(set.contains('a') && set.contains('b'));
        assert!(!set.contains('x') && !set.contains('c'));
    }

    #[test]
    fn gives_up_gracefully() {
        assert!(studied("a?", StudyFlags::empty()).study.is_none());
        assert!(bits(".x").is_none());
        assert!(bits("(a)\\1").is_some());
        let forced = studied("a?", StudyFlags::EXTRA_NEEDED);
        assert_eq!(forced.study.map(|d| d.start_bits), Some(None));
    }
}
