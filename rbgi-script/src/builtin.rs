//! The built-in BGI/Ethornell opcode table.
//!
//! Arities and signatures for several opcodes are inferred from argument
//! lists observed in real scripts, not from documentation. Treat this table
//! as the starting point for a profile: export it with
//! [`crate::records::RegistryFile::from_registry`] and edit the records when
//! a corpus contradicts an entry.

use rbgi_nls::Encoding;

use crate::registry::{ArgType, ArityPolicy, LenWidth, OpcodeDescriptor, OpcodeWidth, Registry};

fn fixed(opcode: u32, mnemonic: &str, args: Vec<ArgType>) -> OpcodeDescriptor {
    let n = args.len() as u32;
    OpcodeDescriptor::new(opcode, mnemonic, ArityPolicy::Fixed(n), args)
}

fn branch(opcode: u32, mnemonic: &str) -> OpcodeDescriptor {
    let mut desc = fixed(opcode, mnemonic, vec![ArgType::U32]);
    desc.branch_arg = Some(0);
    desc
}

fn variadic(opcode: u32, mnemonic: &str, min: u32, max: u32, elem: ArgType) -> OpcodeDescriptor {
    OpcodeDescriptor::new(
        opcode,
        mnemonic,
        ArityPolicy::Variadic { min, max: Some(max) },
        vec![elem],
    )
}

fn marker(opcode: u32, mnemonic: &str, elem: ArgType) -> OpcodeDescriptor {
    OpcodeDescriptor::new(opcode, mnemonic, ArityPolicy::TerminatedByMarker, vec![elem])
}

impl Registry {
    /// The catalogued BGI table, strings in the engine's native Shift-JIS.
    pub fn bgi() -> Registry {
        Registry::bgi_with_encoding(Encoding::ShiftJis)
    }

    /// The same table with another string encoding, for translated scripts.
    pub fn bgi_with_encoding(encoding: Encoding) -> Registry {
        let int = ArgType::I32;
        let s = ArgType::Str { len_width: LenWidth::U16, encoding };

        let mut b = Registry::builder(OpcodeWidth::U32);

        // Control flow. `call` and `exec_script` may target other files.
        b.push(branch(0x018, "goto"));
        b.push(branch(0x019, "goto2"));
        b.push(branch(0x01a, "call"));
        let mut end = fixed(0x01b, "end_script", vec![]);
        end.terminal = true;
        b.push(end);
        b.push(variadic(0x01e, "start_script", 1, 2, s));
        b.push(branch(0x0f0, "exec_script"));

        // Script structure and bookkeeping.
        b.push(marker(0x022, "before_sprite", int));
        b.push(fixed(0x0e2, "cmd0xe2", vec![int, int]));
        b.push(fixed(0x0e3, "cmd0xe3", vec![]));
        b.push(fixed(0x0e6, "end_if", vec![int, int]));
        b.push(fixed(0x0e7, "check_translator_note", vec![s]));
        b.push(fixed(0x0f4, "cmd0xf4", vec![]));
        b.push(fixed(0x110, "wait", vec![int]));
        b.push(fixed(0x120, "cmd0x120", vec![]));
        b.push(fixed(0x121, "cmd0x121", vec![int]));
        b.push(fixed(0x126, "cmd0x126", vec![int]));
        b.push(fixed(0x151, "cmd0x151", vec![]));
        b.push(fixed(0x1b1, "cmd0x1b1", vec![]));
        b.push(fixed(0x1b4, "set_script_file", vec![s, int]));
        b.push(fixed(0x230, "cmd0x230", vec![int; 6]));
        b.push(fixed(0x340, "cmd0x340", vec![int, int, int]));

        // Text.
        b.push(variadic(0x140, "say", 1, 3, s));
        b.push(fixed(0x14c, "set_font", vec![int, int, int]));
        b.push(fixed(0x1b2, "char_act", vec![s]));
        b.push(fixed(0x1b6, "set_voice_seq", vec![int, s]));

        // Sound and video.
        b.push(fixed(0x180, "sound", vec![int, int, s, int]));
        b.push(fixed(0x1a0, "sound_1a0", vec![int, int, s, int]));
        b.push(fixed(0x1bf, "play_movie", vec![int, s]));

        // Graphics.
        b.push(fixed(0x185, "img_hide", vec![int, int, int]));
        b.push(fixed(0x186, "fx_smth1", vec![int, int, int]));
        b.push(fixed(0x240, "bg240", vec![int, int, s]));
        b.push(fixed(0x260, "bg", vec![s]));
        b.push(fixed(0x261, "bg_transition", vec![int, int, int, s, s]));
        b.push(fixed(0x268, "fade_to_black", vec![int]));
        b.push(fixed(0x269, "transition", vec![int, int, int, s]));
        let mut sprite_args = vec![int; 14];
        sprite_args.push(s);
        sprite_args.push(int);
        b.push(fixed(0x280, "sprite", sprite_args));
        b.push(fixed(0x288, "sprite_hide", vec![int; 8]));
        b.push(fixed(0x28a, "sprite_hide_all", vec![int, int]));

        b.build().expect("built-in table is consistent")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_builds_with_the_full_catalogue() {
        let reg = Registry::bgi();
        assert_eq!(reg.len(), 38);
        assert_eq!(reg.opcode_width(), OpcodeWidth::U32);
    }

    #[test]
    fn control_flow_annotations() {
        let reg = Registry::bgi();
        for opcode in [0x018, 0x019, 0x01a, 0x0f0] {
            assert_eq!(reg.lookup(opcode).unwrap().branch_arg, Some(0), "0x{opcode:03x}");
        }
        let end = reg.lookup(0x01b).unwrap();
        assert!(end.terminal);
        assert_eq!(end.arity, ArityPolicy::Fixed(0));
        assert!(!reg.lookup(0x110).unwrap().terminal);
    }

    #[test]
    fn spot_check_signatures() {
        let reg = Registry::bgi();
        assert_eq!(reg.lookup(0x110).unwrap().arg_types, vec![ArgType::I32]);
        assert_eq!(reg.lookup(0x280).unwrap().arg_types.len(), 16);
        assert_eq!(
            reg.lookup(0x140).unwrap().arity,
            ArityPolicy::Variadic { min: 1, max: Some(3) }
        );
        assert_eq!(
            reg.lookup(0x022).unwrap().arity,
            ArityPolicy::TerminatedByMarker
        );
        assert_eq!(reg.lookup(0x1b2).unwrap().mnemonic, "char_act");
    }

    #[test]
    fn encoding_is_selectable_per_profile() {
        let reg = Registry::bgi_with_encoding(Encoding::Gbk);
        let desc = reg.lookup(0x1b2).unwrap();
        assert_eq!(
            desc.arg_types,
            vec![ArgType::Str { len_width: LenWidth::U16, encoding: Encoding::Gbk }]
        );
    }
}
