//! Human-readable listings. Pure functions over decoded data: no state, no
//! I/O, byte-identical output for identical input.

use crate::inst::{Instruction, Operand};
use crate::walk::ScriptWalk;

/// One line, `offset: mnemonic arg1, arg2`. Offsets are zero-padded hex;
/// integers decimal; strings quoted and escaped; blobs hex byte lists.
pub fn format_instruction(inst: &Instruction) -> String {
    let mut line = format!("{:08x}: {}", inst.offset, inst.mnemonic);
    if !inst.args.is_empty() {
        let args: Vec<String> = inst.args.iter().map(|arg| render_operand(&arg.value)).collect();
        line.push(' ');
        line.push_str(&args.join(", "));
    }
    line
}

/// The whole walk, one instruction per line. Branch targets that resolve
/// within the walk are annotated with the destination instruction's index.
pub fn format(walk: &ScriptWalk) -> String {
    let mut out = String::new();
    for (index, inst) in walk.instructions.iter().enumerate() {
        out.push_str(&format_instruction(inst));
        if let Some(target) = walk.branch_target(index) {
            if let Some(dest) = walk.resolve(target) {
                out.push_str(&format!(" ; -> #{dest}"));
            }
        }
        out.push('\n');
    }
    out
}

fn render_operand(op: &Operand) -> String {
    match op {
        Operand::Int(v) => v.to_string(),
        Operand::UInt(v) => v.to_string(),
        Operand::Float(v) => format!("{v:?}"),
        Operand::Str(s) => format!("{s:?}"),
        Operand::Bytes(bytes) => {
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("[{}]", hex.join(" "))
        }
    }
}
