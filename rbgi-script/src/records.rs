//! On-disk form of a registry: a profile header plus one record per opcode.
//!
//! Records are what gets edited when a new opcode is catalogued or an arity
//! turns out to be wrong; no recompilation involved. Argument types are
//! spelled compactly (`i32`, `u8`, `f32`, `str`, `bytes[4]`); `str` takes the
//! profile's default length-prefix width and encoding unless overridden as
//! `str:u8` or `str[gbk]`.

use rbgi_nls::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::registry::{
    ArgType, ArityPolicy, IntWidth, LenWidth, OpcodeDescriptor, OpcodeWidth, Registry,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub profile: ProfileRecord,
    pub opcodes: Vec<OpcodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub opcode_width: OpcodeWidth,

    /// Default encoding for string arguments ("sjis", "gbk", "utf8").
    pub encoding: String,

    /// Default byte-count prefix width for string arguments.
    #[serde(default = "default_len_width")]
    pub string_len_width: LenWidth,
}

fn default_len_width() -> LenWidth {
    LenWidth::U16
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeRecord {
    pub opcode: u32,
    pub mnemonic: String,
    pub arity: ArityRecord,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_arg: Option<usize>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub terminal: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityRecord {
    Fixed(u32),
    Variadic {
        min: u32,
        #[serde(default)]
        max: Option<u32>,
    },
    Marker,
}

impl RegistryFile {
    /// Resolve records into a validated [`Registry`].
    pub fn to_registry(&self) -> Result<Registry, RegistryError> {
        let encoding = Encoding::from_name(&self.profile.encoding)
            .ok_or_else(|| RegistryError::UnknownEncoding(self.profile.encoding.clone()))?;
        let len_width = self.profile.string_len_width;

        let mut builder = Registry::builder(self.profile.opcode_width);
        for rec in &self.opcodes {
            let arity = match rec.arity {
                ArityRecord::Fixed(n) => ArityPolicy::Fixed(n),
                ArityRecord::Variadic { min, max } => ArityPolicy::Variadic { min, max },
                ArityRecord::Marker => ArityPolicy::TerminatedByMarker,
            };
            let arg_types = rec
                .args
                .iter()
                .map(|spelling| parse_arg_type(spelling, encoding, len_width))
                .collect::<Result<Vec<_>, _>>()?;
            let mut desc = OpcodeDescriptor::new(rec.opcode, rec.mnemonic.clone(), arity, arg_types);
            desc.branch_arg = rec.branch_arg;
            desc.terminal = rec.terminal;
            builder.push(desc);
        }
        builder.build()
    }

    /// Export a registry back to records, e.g. as the starting point for a
    /// new engine profile. Records come out sorted by opcode so the file is
    /// stable under re-export.
    pub fn from_registry(registry: &Registry, encoding: Encoding, len_width: LenWidth) -> Self {
        let mut opcodes: Vec<OpcodeRecord> = registry
            .descriptors()
            .map(|desc| OpcodeRecord {
                opcode: desc.opcode,
                mnemonic: desc.mnemonic.clone(),
                arity: match desc.arity {
                    ArityPolicy::Fixed(n) => ArityRecord::Fixed(n),
                    ArityPolicy::Variadic { min, max } => ArityRecord::Variadic { min, max },
                    ArityPolicy::TerminatedByMarker => ArityRecord::Marker,
                },
                args: desc
                    .arg_types
                    .iter()
                    .map(|ty| render_arg_type(*ty, encoding, len_width))
                    .collect(),
                branch_arg: desc.branch_arg,
                terminal: desc.terminal,
            })
            .collect();
        opcodes.sort_by_key(|rec| rec.opcode);

        RegistryFile {
            profile: ProfileRecord {
                opcode_width: registry.opcode_width(),
                encoding: encoding.name().to_owned(),
                string_len_width: len_width,
            },
            opcodes,
        }
    }
}

fn parse_len_width(name: &str) -> Option<LenWidth> {
    match name {
        "u8" => Some(LenWidth::U8),
        "u16" => Some(LenWidth::U16),
        "u32" => Some(LenWidth::U32),
        _ => None,
    }
}

fn len_width_name(width: LenWidth) -> &'static str {
    match width {
        LenWidth::U8 => "u8",
        LenWidth::U16 => "u16",
        LenWidth::U32 => "u32",
    }
}

fn parse_arg_type(
    spelling: &str,
    default_encoding: Encoding,
    default_len_width: LenWidth,
) -> Result<ArgType, RegistryError> {
    let spelling = spelling.trim();
    let simple = match spelling {
        "i8" => Some(ArgType::Int { width: IntWidth::W8, signed: true }),
        "i16" => Some(ArgType::Int { width: IntWidth::W16, signed: true }),
        "i32" => Some(ArgType::I32),
        "i64" => Some(ArgType::Int { width: IntWidth::W64, signed: true }),
        "u8" => Some(ArgType::Int { width: IntWidth::W8, signed: false }),
        "u16" => Some(ArgType::Int { width: IntWidth::W16, signed: false }),
        "u32" => Some(ArgType::U32),
        "u64" => Some(ArgType::Int { width: IntWidth::W64, signed: false }),
        "f32" => Some(ArgType::Float32),
        _ => None,
    };
    if let Some(ty) = simple {
        return Ok(ty);
    }

    if let Some(rest) = spelling.strip_prefix("bytes[") {
        let width = rest
            .strip_suffix(']')
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| RegistryError::UnknownArgType(spelling.to_owned()))?;
        return Ok(ArgType::Bytes { width });
    }

    if let Some(rest) = spelling.strip_prefix("str") {
        // rest is "" | ":u8" | "[gbk]" | ":u8[gbk]"
        let (len_part, enc_part) = match rest.find('[') {
            Some(open) => {
                let enc = rest[open..]
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(|| RegistryError::UnknownArgType(spelling.to_owned()))?;
                (&rest[..open], Some(enc))
            }
            None => (rest, None),
        };
        let len_width = match len_part {
            "" => default_len_width,
            _ => len_part
                .strip_prefix(':')
                .and_then(parse_len_width)
                .ok_or_else(|| RegistryError::UnknownArgType(spelling.to_owned()))?,
        };
        let encoding = match enc_part {
            None => default_encoding,
            Some(name) => Encoding::from_name(name)
                .ok_or_else(|| RegistryError::UnknownEncoding(name.to_owned()))?,
        };
        return Ok(ArgType::Str { len_width, encoding });
    }

    Err(RegistryError::UnknownArgType(spelling.to_owned()))
}

fn render_arg_type(ty: ArgType, default_encoding: Encoding, default_len_width: LenWidth) -> String {
    match ty {
        ArgType::Int { .. } | ArgType::Float32 => ty.to_string(),
        ArgType::Bytes { width } => format!("bytes[{width}]"),
        ArgType::Str { len_width, encoding } => {
            let mut out = String::from("str");
            if len_width != default_len_width {
                out.push(':');
                out.push_str(len_width_name(len_width));
            }
            if encoding != default_encoding {
                out.push('[');
                out.push_str(encoding.name());
                out.push(']');
            }
            out
        }
    }
}
