//! Walks a whole byte range, one instruction at a time.
//!
//! Branch arguments hold absolute byte offsets, not instruction indices, so
//! after the pass the walker builds an offset-to-index map and checks every
//! branch against it. Targets that do not land on a decoded instruction
//! become [`DanglingBranch`] diagnostics rather than errors.

use std::collections::BTreeMap;

use crate::cursor::Cursor;
use crate::decode;
use crate::error::DecodeError;
use crate::inst::{Instruction, Operand};
use crate::registry::Registry;

/// Why a walk stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkEnd {
    /// A terminal opcode (`end_script`) was decoded.
    EndScript,
    /// The byte range ran out exactly at an instruction boundary.
    EndOfRange,
    /// The caller stopped stepping before the walker reached an end.
    Cancelled,
    /// Decoding failed. Everything decoded before the failure is kept.
    Failed(DecodeError),
}

/// Observable walker state.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkState {
    /// Still going; carries the offset the next instruction decodes at.
    Running(u64),
    Halted(Halt),
    Failed(DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    EndScript,
    EndOfRange,
}

/// A branch argument that does not land on a decoded instruction.
///
/// Not an error: `call` and `exec_script` legitimately target other script
/// files. A target inside the walked range but off every instruction
/// boundary usually means a mis-catalogued arity desynchronized the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingBranch {
    /// Offset of the branching instruction.
    pub from: u64,
    /// Index of the branching instruction within the walk.
    pub index: usize,
    /// The unresolved target offset.
    pub target: u64,
    /// The target lies inside the walked range, between boundaries.
    pub mid_instruction: bool,
}

/// Result of one walk: the decoded instructions, how the walk ended, branch
/// diagnostics, and the offset index for branch resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptWalk {
    pub instructions: Vec<Instruction>,
    pub end: WalkEnd,
    pub dangling: Vec<DanglingBranch>,
    by_offset: BTreeMap<u64, usize>,
    branches: BTreeMap<usize, u64>,
}

impl ScriptWalk {
    /// Index of the instruction starting at `offset`, if one does.
    pub fn resolve(&self, offset: u64) -> Option<usize> {
        self.by_offset.get(&offset).copied()
    }

    /// Branch target of the instruction at `index`, if it has one.
    pub fn branch_target(&self, index: usize) -> Option<u64> {
        self.branches.get(&index).copied()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.end, WalkEnd::Failed(_))
    }

    pub fn error(&self) -> Option<&DecodeError> {
        match &self.end {
            WalkEnd::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Walk `bytes` to completion. `start_offset` is the absolute position of
/// `bytes[0]` within the script file; all reported offsets are absolute.
pub fn walk(bytes: &[u8], start_offset: u64, registry: &Registry) -> ScriptWalk {
    let mut walker = Walker::new(bytes, start_offset, registry);
    while walker.step().is_some() {}
    walker.finish()
}

/// Caller-paced walk over one stream.
///
/// `step` decodes one instruction; stopping early is simply not calling it
/// again. One `step` is atomic: there is no cancellation point inside it.
pub struct Walker<'a> {
    cur: Cursor<'a>,
    registry: &'a Registry,
    instructions: Vec<Instruction>,
    end: Option<WalkEnd>,
}

impl<'a> Walker<'a> {
    pub fn new(bytes: &'a [u8], start_offset: u64, registry: &'a Registry) -> Self {
        Self {
            cur: Cursor::new(bytes, start_offset),
            registry,
            instructions: Vec::new(),
            end: None,
        }
    }

    pub fn state(&self) -> WalkState {
        match &self.end {
            None => WalkState::Running(self.cur.offset()),
            Some(WalkEnd::EndScript) => WalkState::Halted(Halt::EndScript),
            Some(WalkEnd::EndOfRange) => WalkState::Halted(Halt::EndOfRange),
            // Cancellation only exists on finished walks, never in here.
            Some(WalkEnd::Cancelled) => WalkState::Running(self.cur.offset()),
            Some(WalkEnd::Failed(err)) => WalkState::Failed(err.clone()),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Decode one more instruction and return a reference to it, or `None`
    /// once the walk has ended (inspect [`Walker::state`] for the reason).
    pub fn step(&mut self) -> Option<&Instruction> {
        if self.end.is_some() {
            return None;
        }
        if self.cur.is_empty() {
            self.end = Some(WalkEnd::EndOfRange);
            return None;
        }
        match decode::decode_one(&mut self.cur, self.registry) {
            Ok(inst) => {
                let terminal = self
                    .registry
                    .lookup(inst.opcode)
                    .is_some_and(|desc| desc.terminal);
                if terminal {
                    self.end = Some(WalkEnd::EndScript);
                }
                self.instructions.push(inst);
                self.instructions.last()
            }
            Err(err) => {
                self.end = Some(WalkEnd::Failed(err));
                None
            }
        }
    }

    /// Close the walk and build the branch-resolution index. Stepping may be
    /// abandoned at any instruction boundary; the end state is then
    /// [`WalkEnd::Cancelled`].
    pub fn finish(self) -> ScriptWalk {
        let end = self.end.unwrap_or(WalkEnd::Cancelled);

        let mut by_offset = BTreeMap::new();
        for (index, inst) in self.instructions.iter().enumerate() {
            by_offset.insert(inst.offset, index);
        }

        let span = match (self.instructions.first(), self.instructions.last()) {
            (Some(first), Some(last)) => first.offset..last.end_offset(),
            _ => 0..0,
        };

        let mut branches = BTreeMap::new();
        let mut dangling = Vec::new();
        for (index, inst) in self.instructions.iter().enumerate() {
            let Some(desc) = self.registry.lookup(inst.opcode) else {
                continue;
            };
            let Some(arg_index) = desc.branch_arg else {
                continue;
            };
            let Some(arg) = inst.args.get(arg_index) else {
                continue;
            };
            let target = match arg.value {
                Operand::Int(v) => v as u64,
                Operand::UInt(v) => v,
                _ => continue,
            };
            branches.insert(index, target);
            if !by_offset.contains_key(&target) {
                let mid = span.contains(&target);
                log::warn!(
                    "dangling branch at 0x{:x}: target 0x{:x} is {}",
                    inst.offset,
                    target,
                    if mid { "between instructions" } else { "outside the walk" },
                );
                dangling.push(DanglingBranch {
                    from: inst.offset,
                    index,
                    target,
                    mid_instruction: mid,
                });
            }
        }

        ScriptWalk {
            instructions: self.instructions,
            end,
            dangling,
            by_offset,
            branches,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rbgi_nls::Encoding;

    use super::*;
    use crate::registry::{ArgType, ArityPolicy, LenWidth, OpcodeDescriptor, OpcodeWidth};

    fn test_registry() -> Registry {
        let mut b = Registry::builder(OpcodeWidth::U32);
        let mut goto = OpcodeDescriptor::new(0x018, "goto", ArityPolicy::Fixed(1), vec![ArgType::U32]);
        goto.branch_arg = Some(0);
        b.push(goto);
        let mut end = OpcodeDescriptor::new(0x01b, "end_script", ArityPolicy::Fixed(0), vec![]);
        end.terminal = true;
        b.push(end);
        b.push(OpcodeDescriptor::new(
            0x110,
            "wait",
            ArityPolicy::Fixed(1),
            vec![ArgType::I32],
        ));
        b.push(OpcodeDescriptor::new(
            0x1b2,
            "char_act",
            ArityPolicy::Fixed(1),
            vec![ArgType::Str { len_width: LenWidth::U16, encoding: Encoding::ShiftJis }],
        ));
        b.build().unwrap()
    }

    fn emit_op(out: &mut Vec<u8>, opcode: u32) {
        out.extend_from_slice(&opcode.to_le_bytes());
    }

    fn emit_i32(out: &mut Vec<u8>, v: i32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    #[test]
    fn end_script_halts_the_walk() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x110);
        emit_i32(&mut bytes, 2000);
        emit_op(&mut bytes, 0x01b);
        // Trailing garbage after the terminal opcode is never looked at.
        bytes.extend_from_slice(&[0xde, 0xad]);

        let walk = walk(&bytes, 0, &reg);
        assert_eq!(walk.end, WalkEnd::EndScript);
        assert_eq!(walk.instructions.len(), 2);
        assert_eq!(walk.instructions.last().unwrap().mnemonic, "end_script");
    }

    #[test]
    fn exact_end_of_range_halts_cleanly() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x110);
        emit_i32(&mut bytes, 1);
        emit_op(&mut bytes, 0x110);
        emit_i32(&mut bytes, 2);

        let walk = walk(&bytes, 0, &reg);
        assert_eq!(walk.end, WalkEnd::EndOfRange);
        assert_eq!(walk.instructions.len(), 2);
        // Consecutive instructions tile the range exactly.
        assert_eq!(walk.instructions[0].end_offset(), walk.instructions[1].offset);
    }

    #[test]
    fn failure_keeps_partial_results() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x110);
        emit_i32(&mut bytes, 2000);
        emit_op(&mut bytes, 0x999);

        let walk = walk(&bytes, 0, &reg);
        assert_eq!(
            walk.end,
            WalkEnd::Failed(DecodeError::UnknownOpcode { opcode: 0x999, offset: 8 })
        );
        assert!(walk.is_failed());
        assert_eq!(walk.error().unwrap().offset(), 8);
        assert_eq!(walk.instructions.len(), 1);
        assert_eq!(walk.instructions[0].mnemonic, "wait");
    }

    #[test]
    fn goto_resolves_to_earlier_instruction() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x110); // offset 0
        emit_i32(&mut bytes, 1);
        emit_op(&mut bytes, 0x110); // offset 8
        emit_i32(&mut bytes, 2);
        emit_op(&mut bytes, 0x018); // offset 16, goto 8
        emit_i32(&mut bytes, 8);

        let walk = walk(&bytes, 0, &reg);
        assert_eq!(walk.end, WalkEnd::EndOfRange);
        assert_eq!(walk.branch_target(2), Some(8));
        assert_eq!(walk.resolve(8), Some(1));
        assert!(walk.dangling.is_empty());
    }

    #[test]
    fn branch_diagnostics_distinguish_outside_from_mid_instruction() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x018); // offset 0, goto 0x6 (inside instruction 0)
        emit_i32(&mut bytes, 0x6);
        emit_op(&mut bytes, 0x018); // offset 8, goto 0x4000 (outside the walk)
        emit_i32(&mut bytes, 0x4000);

        let walk = walk(&bytes, 0, &reg);
        assert_eq!(walk.end, WalkEnd::EndOfRange);
        assert_eq!(
            walk.dangling,
            vec![
                DanglingBranch { from: 0, index: 0, target: 0x6, mid_instruction: true },
                DanglingBranch { from: 8, index: 1, target: 0x4000, mid_instruction: false },
            ]
        );
    }

    #[test]
    fn base_offset_shifts_everything_absolute() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x110); // absolute 0x1000
        emit_i32(&mut bytes, 7);
        emit_op(&mut bytes, 0x018); // absolute 0x1008, goto 0x1000
        emit_i32(&mut bytes, 0x1000);

        let walk = walk(&bytes, 0x1000, &reg);
        assert_eq!(walk.instructions[0].offset, 0x1000);
        assert_eq!(walk.resolve(0x1000), Some(0));
        assert!(walk.dangling.is_empty());
    }

    #[test]
    fn stepping_and_cancelling_keeps_prefix() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        emit_op(&mut bytes, 0x110);
        emit_i32(&mut bytes, 1);
        emit_op(&mut bytes, 0x110);
        emit_i32(&mut bytes, 2);

        let mut walker = Walker::new(&bytes, 0, &reg);
        assert_eq!(walker.state(), WalkState::Running(0));
        assert_eq!(walker.step().unwrap().mnemonic, "wait");
        assert_eq!(walker.state(), WalkState::Running(8));
        let seen = walker.instructions().to_vec();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].mnemonic, "wait");

        // Caller decides to stop here.
        let walk = walker.finish();
        assert_eq!(walk.end, WalkEnd::Cancelled);
        assert_eq!(walk.instructions, seen);
    }

    #[test]
    fn empty_input_is_an_empty_end_of_range_walk() {
        let reg = test_registry();
        let walk = walk(&[], 0, &reg);
        assert_eq!(walk.end, WalkEnd::EndOfRange);
        assert!(walk.instructions.is_empty());
        assert!(walk.dangling.is_empty());
    }
}
