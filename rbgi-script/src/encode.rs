//! The encode direction: instruction sequences back to wire bytes, under the
//! same registry that decoded them. Values that do not fit their declared
//! signature are rejected; nothing is silently narrowed.

use rbgi_nls::Codec;

use crate::error::EncodeError;
use crate::inst::{Instruction, Operand};
use crate::registry::{ArgType, ArityPolicy, LenWidth, OpcodeWidth, Registry};

/// Encode a whole sequence in order.
pub fn encode(instructions: &[Instruction], registry: &Registry) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for (index, inst) in instructions.iter().enumerate() {
        encode_one(inst, index, registry, &mut out)?;
    }
    Ok(out)
}

/// Encode one instruction onto `out`. `index` is only used to locate errors.
pub fn encode_one(
    inst: &Instruction,
    index: usize,
    registry: &Registry,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    let desc = registry
        .lookup(inst.opcode)
        .ok_or(EncodeError::UnknownOpcode { index, opcode: inst.opcode })?;

    match registry.opcode_width() {
        OpcodeWidth::U16 => {
            let narrow = u16::try_from(inst.opcode)
                .map_err(|_| EncodeError::OpcodeTooWide { index, opcode: inst.opcode })?;
            out.extend_from_slice(&narrow.to_le_bytes());
        }
        OpcodeWidth::U32 => out.extend_from_slice(&inst.opcode.to_le_bytes()),
    }

    let got = inst.args.len();
    let arity_err = || EncodeError::Arity {
        index,
        mnemonic: desc.mnemonic.clone(),
        got,
        arity: desc.arity,
    };
    match desc.arity {
        ArityPolicy::Fixed(n) => {
            if got != n as usize {
                return Err(arity_err());
            }
            for (arg_index, (arg, &ty)) in inst.args.iter().zip(&desc.arg_types).enumerate() {
                encode_value(&arg.value, ty, index, arg_index, out)?;
            }
        }
        ArityPolicy::Variadic { min, max } => {
            let in_bounds =
                got as u32 >= min && max.map_or(true, |max| got as u32 <= max);
            if !in_bounds {
                return Err(arity_err());
            }
            let elem = desc.arg_types[0];
            for (arg_index, arg) in inst.args.iter().enumerate() {
                encode_value(&arg.value, elem, index, arg_index, out)?;
            }
        }
        ArityPolicy::TerminatedByMarker => {
            let elem = desc.arg_types[0];
            for (arg_index, arg) in inst.args.iter().enumerate() {
                // A zero element would read back as the terminator.
                if arg.value.is_zero() {
                    return Err(EncodeError::ZeroMarkerArg { index, arg: arg_index });
                }
                encode_value(&arg.value, elem, index, arg_index, out)?;
            }
            // The sentinel is the all-zero element.
            out.resize(out.len() + elem.min_len(), 0);
        }
    }
    Ok(())
}

fn encode_value(
    value: &Operand,
    ty: ArgType,
    index: usize,
    arg: usize,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    let mismatch = || EncodeError::TypeMismatch {
        index,
        arg,
        want: ty,
        got: value.kind(),
    };
    match ty {
        ArgType::Int { width, signed } => {
            let wide: i128 = match *value {
                Operand::Int(v) => v.into(),
                Operand::UInt(v) => v.into(),
                _ => return Err(mismatch()),
            };
            let bits = width.byte_len() as u32 * 8;
            let in_range = if signed {
                let lo = -(1i128 << (bits - 1));
                let hi = (1i128 << (bits - 1)) - 1;
                (lo..=hi).contains(&wide)
            } else {
                (0..(1i128 << bits)).contains(&wide)
            };
            if !in_range {
                return Err(EncodeError::IntOutOfRange { index, arg, value: wide, ty });
            }
            // Two's-complement low bytes, little-endian.
            let raw = (wide as u64).to_le_bytes();
            out.extend_from_slice(&raw[..width.byte_len()]);
        }

        ArgType::Float32 => match *value {
            Operand::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(mismatch()),
        },

        ArgType::Str { len_width, encoding } => {
            let s = match value {
                Operand::Str(s) => s,
                _ => return Err(mismatch()),
            };
            let payload = Codec::new(encoding)
                .encode(s)
                .ok_or(EncodeError::Unencodable { index, arg, encoding })?;
            if payload.len() as u64 > len_width.max_len() {
                return Err(EncodeError::StringTooLong {
                    index,
                    arg,
                    len: payload.len(),
                    limit: len_width.max_len(),
                });
            }
            match len_width {
                LenWidth::U8 => out.push(payload.len() as u8),
                LenWidth::U16 => out.extend_from_slice(&(payload.len() as u16).to_le_bytes()),
                LenWidth::U32 => out.extend_from_slice(&(payload.len() as u32).to_le_bytes()),
            }
            out.extend_from_slice(&payload);
        }

        ArgType::Bytes { width } => {
            let bytes = match value {
                Operand::Bytes(b) => b,
                _ => return Err(mismatch()),
            };
            if bytes.len() != width as usize {
                return Err(EncodeError::BlobLen { index, arg, got: bytes.len(), want: width });
            }
            out.extend_from_slice(bytes);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rbgi_nls::Encoding;

    use super::*;
    use crate::inst::ArgValue;
    use crate::registry::{IntWidth, OpcodeDescriptor};
    use crate::walk::{WalkEnd, walk};

    fn test_registry() -> Registry {
        let mut b = Registry::builder(OpcodeWidth::U32);
        b.push(OpcodeDescriptor::new(
            0x110,
            "wait",
            ArityPolicy::Fixed(1),
            vec![ArgType::I32],
        ));
        b.push(OpcodeDescriptor::new(
            0x180,
            "sound",
            ArityPolicy::Fixed(4),
            vec![
                ArgType::I32,
                ArgType::I32,
                ArgType::Str { len_width: LenWidth::U16, encoding: Encoding::ShiftJis },
                ArgType::I32,
            ],
        ));
        b.push(OpcodeDescriptor::new(
            0x140,
            "say",
            ArityPolicy::Variadic { min: 1, max: Some(3) },
            vec![ArgType::Str { len_width: LenWidth::U16, encoding: Encoding::ShiftJis }],
        ));
        b.push(OpcodeDescriptor::new(
            0x022,
            "before_sprite",
            ArityPolicy::TerminatedByMarker,
            vec![ArgType::I32],
        ));
        let mut end = OpcodeDescriptor::new(0x01b, "end_script", ArityPolicy::Fixed(0), vec![]);
        end.terminal = true;
        b.push(end);
        b.build().unwrap()
    }

    fn sjis_str(s: &str) -> Vec<u8> {
        let payload = Codec::new(Encoding::ShiftJis).encode(s).unwrap();
        let mut out = (payload.len() as u16).to_le_bytes().to_vec();
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn walk_then_encode_restores_the_stream() {
        let reg = test_registry();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x110u32.to_le_bytes());
        bytes.extend_from_slice(&2000i32.to_le_bytes());
        bytes.extend_from_slice(&0x180u32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&100i32.to_le_bytes());
        bytes.extend_from_slice(&sjis_str("BGM020"));
        bytes.extend_from_slice(&2i32.to_le_bytes());
        // Marker list: two elements plus the zero terminator.
        bytes.extend_from_slice(&0x022u32.to_le_bytes());
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&7i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        // Variadic at its max, so re-decoding cannot over-consume.
        bytes.extend_from_slice(&0x140u32.to_le_bytes());
        for s in ["Kazushi", "Pierre", "Daigo"] {
            bytes.extend_from_slice(&sjis_str(s));
        }
        bytes.extend_from_slice(&0x01bu32.to_le_bytes());

        let first = walk(&bytes, 0, &reg);
        assert_eq!(first.end, WalkEnd::EndScript);
        let encoded = encode(&first.instructions, &reg).unwrap();
        assert_eq!(encoded, bytes);

        let second = walk(&encoded, 0, &reg);
        assert_eq!(second.instructions, first.instructions);
    }

    #[test]
    fn int_out_of_range_is_rejected() {
        let mut b = Registry::builder(OpcodeWidth::U16);
        b.push(OpcodeDescriptor::new(
            0x01,
            "tiny",
            ArityPolicy::Fixed(1),
            vec![ArgType::Int { width: IntWidth::W8, signed: true }],
        ));
        let reg = b.build().unwrap();
        let inst = Instruction {
            offset: 0,
            opcode: 0x01,
            mnemonic: "tiny".into(),
            args: vec![ArgValue::new(Operand::Int(300), 1)],
            byte_length: 3,
        };
        let err = encode(&[inst], &reg).unwrap_err();
        assert_eq!(
            err,
            EncodeError::IntOutOfRange {
                index: 0,
                arg: 0,
                value: 300,
                ty: ArgType::Int { width: IntWidth::W8, signed: true },
            }
        );
    }

    #[test]
    fn negative_ints_encode_two_complement() {
        let reg = test_registry();
        let inst = Instruction {
            offset: 0,
            opcode: 0x110,
            mnemonic: "wait".into(),
            args: vec![ArgValue::new(Operand::Int(-1), 4)],
            byte_length: 8,
        };
        let out = encode(&[inst], &reg).unwrap();
        assert_eq!(&out[4..], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn arity_and_type_violations_are_rejected() {
        let reg = test_registry();
        let too_many = Instruction {
            offset: 0,
            opcode: 0x110,
            mnemonic: "wait".into(),
            args: vec![
                ArgValue::new(Operand::Int(1), 4),
                ArgValue::new(Operand::Int(2), 4),
            ],
            byte_length: 12,
        };
        assert!(matches!(
            encode(&[too_many], &reg).unwrap_err(),
            EncodeError::Arity { got: 2, .. }
        ));

        let wrong_kind = Instruction {
            offset: 0,
            opcode: 0x110,
            mnemonic: "wait".into(),
            args: vec![ArgValue::new(Operand::Str("2000".into()), 4)],
            byte_length: 8,
        };
        assert!(matches!(
            encode(&[wrong_kind], &reg).unwrap_err(),
            EncodeError::TypeMismatch { got: "str", .. }
        ));
    }

    #[test]
    fn zero_marker_element_is_rejected() {
        let reg = test_registry();
        let inst = Instruction {
            offset: 0,
            opcode: 0x022,
            mnemonic: "before_sprite".into(),
            args: vec![
                ArgValue::new(Operand::Int(3), 4),
                ArgValue::new(Operand::Int(0), 4),
            ],
            byte_length: 16,
        };
        assert_eq!(
            encode(&[inst], &reg).unwrap_err(),
            EncodeError::ZeroMarkerArg { index: 0, arg: 1 }
        );
    }

    #[test]
    fn unencodable_string_is_rejected() {
        let reg = test_registry();
        let inst = Instruction {
            offset: 0,
            opcode: 0x140,
            mnemonic: "say".into(),
            args: vec![ArgValue::new(Operand::Str("🎴".into()), 0)],
            byte_length: 0,
        };
        assert_eq!(
            encode(&[inst], &reg).unwrap_err(),
            EncodeError::Unencodable { index: 0, arg: 0, encoding: Encoding::ShiftJis }
        );
    }

    #[test]
    fn u16_profile_rejects_wide_opcodes() {
        let mut b = Registry::builder(OpcodeWidth::U16);
        b.push(OpcodeDescriptor::new(
            0x1_0000,
            "oops",
            ArityPolicy::Fixed(0),
            vec![],
        ));
        let reg = b.build().unwrap();
        let inst = Instruction {
            offset: 0,
            opcode: 0x1_0000,
            mnemonic: "oops".into(),
            args: vec![],
            byte_length: 2,
        };
        assert_eq!(
            encode(&[inst], &reg).unwrap_err(),
            EncodeError::OpcodeTooWide { index: 0, opcode: 0x1_0000 }
        );
    }
}
