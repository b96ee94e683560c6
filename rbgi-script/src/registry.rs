//! The opcode table: one immutable descriptor per opcode, plus the wire
//! conventions (opcode field width) of one engine version.
//!
//! The table is configuration, not code: built and validated once per
//! engine-version profile, then only read. Decoding logic never
//! special-cases individual opcodes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use rbgi_nls::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Width of the opcode field. Fixed per engine version, not per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpcodeWidth {
    U16,
    U32,
}

impl OpcodeWidth {
    #[inline]
    pub fn byte_len(self) -> usize {
        match self {
            OpcodeWidth::U16 => 2,
            OpcodeWidth::U32 => 4,
        }
    }
}

/// Storage width of an integer argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    #[inline]
    pub fn byte_len(self) -> usize {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }
}

/// Width of a string's byte-count prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LenWidth {
    U8,
    U16,
    U32,
}

impl LenWidth {
    #[inline]
    pub fn byte_len(self) -> usize {
        match self {
            LenWidth::U8 => 1,
            LenWidth::U16 => 2,
            LenWidth::U32 => 4,
        }
    }

    /// Largest payload length the prefix can express.
    #[inline]
    pub fn max_len(self) -> u64 {
        match self {
            LenWidth::U8 => u8::MAX as u64,
            LenWidth::U16 => u16::MAX as u64,
            LenWidth::U32 => u32::MAX as u64,
        }
    }
}

/// Wire type of one argument. All multi-byte fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Int { width: IntWidth, signed: bool },
    Float32,
    /// Byte-count prefix of `len_width`, then exactly that many bytes in
    /// `encoding`.
    Str { len_width: LenWidth, encoding: Encoding },
    /// An opaque blob of exactly `width` bytes.
    Bytes { width: u32 },
}

impl ArgType {
    pub const I32: ArgType = ArgType::Int { width: IntWidth::W32, signed: true };
    pub const U32: ArgType = ArgType::Int { width: IntWidth::W32, signed: false };

    /// Smallest number of stream bytes a value of this type can occupy.
    pub fn min_len(self) -> usize {
        match self {
            ArgType::Int { width, .. } => width.byte_len(),
            ArgType::Float32 => 4,
            ArgType::Str { len_width, .. } => len_width.byte_len(),
            ArgType::Bytes { width } => width as usize,
        }
    }

    #[inline]
    pub fn is_int(self) -> bool {
        matches!(self, ArgType::Int { .. })
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ArgType::Int { width, signed } => {
                let sign = if signed { 'i' } else { 'u' };
                write!(f, "{}{}", sign, width.byte_len() * 8)
            }
            ArgType::Float32 => write!(f, "f32"),
            ArgType::Str { .. } => write!(f, "str"),
            ArgType::Bytes { width } => write!(f, "bytes[{width}]"),
        }
    }
}

/// How an opcode's argument list ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityPolicy {
    /// Exactly this many arguments, in declared type order.
    Fixed(u32),
    /// Between `min` and `max` repetitions of one element type; `None` means
    /// unbounded. The list ends at `max` or stream end, or where the next
    /// bytes no longer decode as the element type.
    Variadic { min: u32, max: Option<u32> },
    /// Repetitions of one element type until a zero-valued sentinel, which is
    /// consumed but not stored.
    TerminatedByMarker,
}

impl fmt::Display for ArityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ArityPolicy::Fixed(n) => write!(f, "fixed({n})"),
            ArityPolicy::Variadic { min, max: Some(max) } => {
                write!(f, "variadic({min}..={max})")
            }
            ArityPolicy::Variadic { min, max: None } => write!(f, "variadic({min}..)"),
            ArityPolicy::TerminatedByMarker => write!(f, "marker-terminated"),
        }
    }
}

/// Everything the decoder needs to know about one opcode.
#[derive(Debug, Clone, PartialEq)]
pub struct OpcodeDescriptor {
    pub opcode: u32,
    pub mnemonic: String,

    pub arity: ArityPolicy,

    /// For `Fixed(n)`: the n argument types in order.
    /// For `Variadic`/`TerminatedByMarker`: exactly one element type.
    pub arg_types: Vec<ArgType>,

    /// Index of the argument holding an absolute byte offset, if this opcode
    /// transfers control.
    pub branch_arg: Option<usize>,

    /// The walker halts after decoding this opcode.
    pub terminal: bool,
}

impl OpcodeDescriptor {
    pub fn new(
        opcode: u32,
        mnemonic: impl Into<String>,
        arity: ArityPolicy,
        arg_types: Vec<ArgType>,
    ) -> Self {
        Self {
            opcode,
            mnemonic: mnemonic.into(),
            arity,
            arg_types,
            branch_arg: None,
            terminal: false,
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        match self.arity {
            ArityPolicy::Fixed(n) => {
                if self.arg_types.len() != n as usize {
                    return Err(RegistryError::FixedArityMismatch {
                        opcode: self.opcode,
                        mnemonic: self.mnemonic.clone(),
                        arity: n,
                        got: self.arg_types.len(),
                    });
                }
            }
            ArityPolicy::Variadic { min, max } => {
                self.validate_repeating()?;
                if let Some(max) = max {
                    if max < min {
                        return Err(RegistryError::VariadicBounds {
                            opcode: self.opcode,
                            mnemonic: self.mnemonic.clone(),
                            min,
                            max,
                        });
                    }
                }
            }
            ArityPolicy::TerminatedByMarker => {
                self.validate_repeating()?;
            }
        }

        if let Some(arg) = self.branch_arg {
            if !matches!(self.arity, ArityPolicy::Fixed(_)) {
                return Err(RegistryError::BadBranchArg {
                    opcode: self.opcode,
                    mnemonic: self.mnemonic.clone(),
                    arg,
                    problem: "only meaningful with fixed arity",
                });
            }
            match self.arg_types.get(arg) {
                None => {
                    return Err(RegistryError::BadBranchArg {
                        opcode: self.opcode,
                        mnemonic: self.mnemonic.clone(),
                        arg,
                        problem: "out of range",
                    });
                }
                Some(ty) if !ty.is_int() => {
                    return Err(RegistryError::BadBranchArg {
                        opcode: self.opcode,
                        mnemonic: self.mnemonic.clone(),
                        arg,
                        problem: "not an integer type",
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Repeating arities take exactly one element type, and the element must
    /// consume at least one stream byte.
    fn validate_repeating(&self) -> Result<(), RegistryError> {
        if self.arg_types.len() != 1 {
            return Err(RegistryError::RepeatingArityMismatch {
                opcode: self.opcode,
                mnemonic: self.mnemonic.clone(),
                policy: self.arity,
                got: self.arg_types.len(),
            });
        }
        let elem = self.arg_types[0];
        if elem.min_len() == 0 {
            return Err(RegistryError::ZeroWidthElement {
                opcode: self.opcode,
                mnemonic: self.mnemonic.clone(),
                ty: elem,
            });
        }
        Ok(())
    }
}

/// Immutable opcode table of one engine-version profile.
///
/// Built once, then only read; share it by reference (or `Arc`) across any
/// number of concurrent walks.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    opcode_width: OpcodeWidth,
    by_opcode: HashMap<u32, OpcodeDescriptor>,
}

impl Registry {
    pub fn builder(opcode_width: OpcodeWidth) -> RegistryBuilder {
        RegistryBuilder {
            opcode_width,
            descriptors: Vec::new(),
        }
    }

    #[inline]
    pub fn opcode_width(&self) -> OpcodeWidth {
        self.opcode_width
    }

    /// `None` for opcodes the table does not catalogue.
    #[inline]
    pub fn lookup(&self, opcode: u32) -> Option<&OpcodeDescriptor> {
        self.by_opcode.get(&opcode)
    }

    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }

    /// All descriptors, in no particular order.
    pub fn descriptors(&self) -> impl Iterator<Item = &OpcodeDescriptor> {
        self.by_opcode.values()
    }
}

/// Collects descriptors, then validates the whole table at `build` time.
/// Insertion order is irrelevant.
pub struct RegistryBuilder {
    opcode_width: OpcodeWidth,
    descriptors: Vec<OpcodeDescriptor>,
}

impl RegistryBuilder {
    pub fn push(&mut self, desc: OpcodeDescriptor) -> &mut Self {
        self.descriptors.push(desc);
        self
    }

    /// Rejects duplicate opcodes and inconsistent descriptors. A duplicate
    /// never wins by overwriting; the whole load fails.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut by_opcode = HashMap::with_capacity(self.descriptors.len());
        for desc in self.descriptors {
            desc.validate()?;
            match by_opcode.entry(desc.opcode) {
                Entry::Occupied(prev) => {
                    let prev: &OpcodeDescriptor = prev.get();
                    return Err(RegistryError::DuplicateOpcode {
                        opcode: desc.opcode,
                        mnemonic: desc.mnemonic,
                        existing: prev.mnemonic.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(desc);
                }
            }
        }
        Ok(Registry {
            opcode_width: self.opcode_width,
            by_opcode,
        })
    }
}
