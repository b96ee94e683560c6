//! rbgi-script
//!
//! Bytecode decoding for BGI/Ethornell-style compiled visual-novel scripts.
//! An opcode registry (data, not code) tells the decoder how many arguments
//! follow each opcode and how wide they are; a stream walker turns a byte
//! range into an instruction sequence with exact offset attribution; the
//! formatter and encoder turn that sequence into a listing or back into
//! bytes.
//!
//! Start from [`registry::Registry::bgi`] for the catalogued engine table,
//! or load one from [`records`].

pub mod cursor;
pub mod decode;
pub mod disasm;
pub mod encode;
pub mod error;
pub mod inst;
pub mod records;
pub mod registry;
pub mod walk;

mod builtin;
