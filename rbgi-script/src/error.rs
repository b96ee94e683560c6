use rbgi_nls::Encoding;
use thiserror::Error;

use crate::registry::{ArgType, ArityPolicy};

/// Errors produced while decoding a script stream.
///
/// Every variant carries the absolute byte offset it occurred at, so callers
/// can resume, skip, or report precisely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Opcode not present in the registry. Recoverable: the table may not
    /// catalogue this engine feature yet.
    #[error("unknown opcode 0x{opcode:03x} at offset 0x{offset:x}")]
    UnknownOpcode { opcode: u32, offset: u64 },

    /// The stream ended mid-opcode or mid-argument.
    #[error("truncated stream at offset 0x{offset:x}: {what} needs {needed} bytes, {remaining} remain")]
    Truncated {
        offset: u64,
        what: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// String payload bytes are not valid in the declared encoding.
    #[error("invalid {encoding} string of {len} bytes at offset 0x{offset:x}")]
    InvalidEncoding {
        offset: u64,
        len: u32,
        encoding: Encoding,
    },
}

impl DecodeError {
    /// Absolute byte offset the error is attributed to.
    pub fn offset(&self) -> u64 {
        match *self {
            DecodeError::UnknownOpcode { offset, .. } => offset,
            DecodeError::Truncated { offset, .. } => offset,
            DecodeError::InvalidEncoding { offset, .. } => offset,
        }
    }
}

/// Registry construction failures. Fatal at load time, never reached while
/// decoding instructions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate opcode 0x{opcode:03x}: {mnemonic} collides with {existing}")]
    DuplicateOpcode {
        opcode: u32,
        mnemonic: String,
        existing: String,
    },

    #[error("opcode 0x{opcode:03x} ({mnemonic}): fixed arity {arity} but {got} argument types")]
    FixedArityMismatch {
        opcode: u32,
        mnemonic: String,
        arity: u32,
        got: usize,
    },

    #[error("opcode 0x{opcode:03x} ({mnemonic}): {policy} arity takes one repeating element type, got {got}")]
    RepeatingArityMismatch {
        opcode: u32,
        mnemonic: String,
        policy: ArityPolicy,
        got: usize,
    },

    #[error("opcode 0x{opcode:03x} ({mnemonic}): variadic bounds {min}..={max} are inverted")]
    VariadicBounds {
        opcode: u32,
        mnemonic: String,
        min: u32,
        max: u32,
    },

    #[error("opcode 0x{opcode:03x} ({mnemonic}): branch argument {arg} is {problem}")]
    BadBranchArg {
        opcode: u32,
        mnemonic: String,
        arg: usize,
        problem: &'static str,
    },

    #[error("opcode 0x{opcode:03x} ({mnemonic}): repeating element type {ty} has zero width")]
    ZeroWidthElement {
        opcode: u32,
        mnemonic: String,
        ty: ArgType,
    },

    #[error("unknown argument type {0:?} in registry record")]
    UnknownArgType(String),

    #[error("unknown encoding {0:?} in registry record")]
    UnknownEncoding(String),
}

/// Errors produced while re-encoding an instruction sequence. Located by
/// instruction index (and argument index where one applies) rather than by
/// byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("instruction #{index}: unknown opcode 0x{opcode:03x}")]
    UnknownOpcode { index: usize, opcode: u32 },

    #[error("instruction #{index}: opcode 0x{opcode:x} does not fit the u16 opcode field")]
    OpcodeTooWide { index: usize, opcode: u32 },

    #[error("instruction #{index} ({mnemonic}): {got} arguments do not satisfy {arity} arity")]
    Arity {
        index: usize,
        mnemonic: String,
        got: usize,
        arity: ArityPolicy,
    },

    #[error("instruction #{index} argument {arg}: expected {want}, found {got}")]
    TypeMismatch {
        index: usize,
        arg: usize,
        want: ArgType,
        got: &'static str,
    },

    #[error("instruction #{index} argument {arg}: value {value} does not fit {ty}")]
    IntOutOfRange {
        index: usize,
        arg: usize,
        value: i128,
        ty: ArgType,
    },

    #[error("instruction #{index} argument {arg}: string is not representable in {encoding}")]
    Unencodable {
        index: usize,
        arg: usize,
        encoding: Encoding,
    },

    #[error("instruction #{index} argument {arg}: string payload of {len} bytes exceeds length prefix limit {limit}")]
    StringTooLong {
        index: usize,
        arg: usize,
        len: usize,
        limit: u64,
    },

    #[error("instruction #{index} argument {arg}: blob of {got} bytes where {want} are declared")]
    BlobLen {
        index: usize,
        arg: usize,
        got: usize,
        want: u32,
    },

    #[error("instruction #{index} argument {arg}: zero value would terminate the marker list early")]
    ZeroMarkerArg { index: usize, arg: usize },
}
