//! Argument and instruction decoding.
//!
//! One instruction is decoded as an atomic unit: read the opcode field, look
//! up its descriptor, then consume the argument list the way its arity policy
//! dictates. The cursor only ever moves forward; a failed decode reports the
//! exact offset it stopped at.

use rbgi_nls::Codec;

use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::inst::{ArgValue, Instruction, Operand};
use crate::registry::{ArgType, ArityPolicy, IntWidth, LenWidth, OpcodeDescriptor, OpcodeWidth, Registry};

/// Decode one argument of the given type, advancing the cursor past it.
pub fn decode_arg(cur: &mut Cursor<'_>, ty: ArgType) -> Result<ArgValue, DecodeError> {
    match ty {
        ArgType::Int { width, signed } => {
            let raw_len = width.byte_len() as u32;
            let value = if signed {
                let v = match width {
                    IntWidth::W8 => cur.read_i8("int argument")? as i64,
                    IntWidth::W16 => cur.read_i16("int argument")? as i64,
                    IntWidth::W32 => cur.read_i32("int argument")? as i64,
                    IntWidth::W64 => cur.read_i64("int argument")?,
                };
                Operand::Int(v)
            } else {
                let v = match width {
                    IntWidth::W8 => cur.read_u8("int argument")? as u64,
                    IntWidth::W16 => cur.read_u16("int argument")? as u64,
                    IntWidth::W32 => cur.read_u32("int argument")? as u64,
                    IntWidth::W64 => cur.read_u64("int argument")?,
                };
                Operand::UInt(v)
            };
            Ok(ArgValue::new(value, raw_len))
        }

        ArgType::Float32 => {
            let v = cur.read_f32("float argument")?;
            Ok(ArgValue::new(Operand::Float(v), 4))
        }

        ArgType::Str { len_width, encoding } => {
            let len = match len_width {
                LenWidth::U8 => cur.read_u8("string length prefix")? as u32,
                LenWidth::U16 => cur.read_u16("string length prefix")? as u32,
                LenWidth::U32 => cur.read_u32("string length prefix")?,
            };
            let payload_offset = cur.offset();
            let payload = cur.take(len as usize, "string payload")?;
            let text = Codec::new(encoding)
                .decode(payload)
                .ok_or(DecodeError::InvalidEncoding {
                    offset: payload_offset,
                    len,
                    encoding,
                })?;
            let raw_len = (len_width.byte_len() + payload.len()) as u32;
            Ok(ArgValue::new(Operand::Str(text), raw_len))
        }

        ArgType::Bytes { width } => {
            let payload = cur.take(width as usize, "blob argument")?;
            Ok(ArgValue::new(Operand::Bytes(payload.to_vec()), width))
        }
    }
}

/// Decode the instruction at the cursor. On success the cursor sits exactly
/// at the next instruction; on failure the error carries the offset that
/// matters and the cursor position is unspecified.
pub fn decode_one(cur: &mut Cursor<'_>, registry: &Registry) -> Result<Instruction, DecodeError> {
    let offset = cur.offset();
    let opcode = match registry.opcode_width() {
        OpcodeWidth::U16 => cur.read_u16("opcode")? as u32,
        OpcodeWidth::U32 => cur.read_u32("opcode")?,
    };
    let desc = registry
        .lookup(opcode)
        .ok_or(DecodeError::UnknownOpcode { opcode, offset })?;

    let args = decode_args(cur, desc)?;
    let byte_length = (cur.offset() - offset) as u32;
    Ok(Instruction {
        offset,
        opcode,
        mnemonic: desc.mnemonic.clone(),
        args,
        byte_length,
    })
}

fn decode_args(cur: &mut Cursor<'_>, desc: &OpcodeDescriptor) -> Result<Vec<ArgValue>, DecodeError> {
    match desc.arity {
        ArityPolicy::Fixed(_) => {
            let mut args = Vec::with_capacity(desc.arg_types.len());
            for &ty in &desc.arg_types {
                args.push(decode_arg(cur, ty)?);
            }
            Ok(args)
        }

        ArityPolicy::Variadic { min, max } => {
            // Registry validation pins exactly one repeating element type.
            let elem = desc.arg_types[0];
            let mut args = Vec::new();
            loop {
                if let Some(max) = max {
                    if args.len() as u32 >= max {
                        break;
                    }
                }
                if cur.is_empty() && args.len() as u32 >= min {
                    break;
                }
                // Probe on a copy so a failed candidate leaves the cursor at
                // the end of the last committed argument.
                let mut probe = *cur;
                match decode_arg(&mut probe, elem) {
                    Ok(arg) => {
                        *cur = probe;
                        args.push(arg);
                    }
                    Err(_) if args.len() as u32 >= min => break,
                    Err(err) => return Err(err),
                }
            }
            Ok(args)
        }

        ArityPolicy::TerminatedByMarker => {
            let elem = desc.arg_types[0];
            let mut args = Vec::new();
            loop {
                let arg = decode_arg(cur, elem)?;
                if arg.value.is_zero() {
                    // Sentinel: consumed, not stored.
                    break;
                }
                args.push(arg);
            }
            Ok(args)
        }
    }
}
