/// A decoded argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Any signed integer argument, widened losslessly.
    Int(i64),
    /// Any unsigned integer argument, widened losslessly.
    UInt(u64),
    Float(f32),
    Str(String),
    Bytes(Vec<u8>),
}

impl Operand {
    /// Short kind name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Int(_) => "int",
            Operand::UInt(_) => "uint",
            Operand::Float(_) => "float",
            Operand::Str(_) => "str",
            Operand::Bytes(_) => "bytes",
        }
    }

    /// Zero test, used for marker-terminated argument lists: integer zero,
    /// empty string, or all-zero blob end the list.
    pub fn is_zero(&self) -> bool {
        match self {
            Operand::Int(v) => *v == 0,
            Operand::UInt(v) => *v == 0,
            Operand::Float(v) => *v == 0.0,
            Operand::Str(s) => s.is_empty(),
            Operand::Bytes(b) => b.iter().all(|&byte| byte == 0),
        }
    }
}

/// One decoded argument together with its exact footprint in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgValue {
    pub value: Operand,
    /// Stream bytes this argument consumed. For strings that is the length
    /// prefix plus the payload.
    pub raw_len: u32,
}

impl ArgValue {
    pub fn new(value: Operand, raw_len: u32) -> Self {
        Self { value, raw_len }
    }
}

/// One decoded instruction.
///
/// Owns everything it refers to; in particular the mnemonic is copied out of
/// the registry so instruction sequences keep no references into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Absolute byte position of the opcode field.
    pub offset: u64,
    pub opcode: u32,
    pub mnemonic: String,
    pub args: Vec<ArgValue>,
    /// Opcode field plus all argument bytes.
    pub byte_length: u32,
}

impl Instruction {
    /// Offset one past this instruction, i.e. where the next one starts.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.byte_length as u64
    }
}
