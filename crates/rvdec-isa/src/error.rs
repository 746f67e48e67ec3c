//! Decode engine errors.

use crate::operand::SpecialField;
use crate::Opcode;
use thiserror::Error;

/// Errors raised by decoder construction and decode-time lookups.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("illegal opcode: {0:#x}")]
    IllegalOpcode(Opcode),
    #[error("unknown opcode: {0:#x}")]
    UnknownOpcode(Opcode),
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),
    #[error("unknown pseudo-instruction mnemonic: {0}")]
    UnknownPseudoMnemonic(String),
    #[error("{mnemonic}: register number {reg} out of range")]
    InvalidRegisterNumber { mnemonic: String, reg: u64 },
    #[error("{mnemonic}: special field {field} not supported by this extractor")]
    UnsupportedSpecialField {
        mnemonic: String,
        field: SpecialField,
    },
    #[error("{mnemonic}: no special field at index {index}")]
    InvalidSpecialFieldIndex { mnemonic: String, index: usize },
    #[error("context already exists: {0}")]
    ContextAlreadyExists(String),
    #[error("unknown context: {0}")]
    UnknownContext(String),
    #[error("cannot read ISA file {path}: {reason}")]
    BadIsaFile { path: String, reason: String },
    #[error("{mnemonic}: unknown instruction form {form}")]
    UnknownForm { mnemonic: String, form: String },
    #[error("{mnemonic}: missing required key {key}")]
    MissingIsaKey { mnemonic: String, key: String },
    #[error("{mnemonic}: form has no field named {field}")]
    UnknownField { mnemonic: String, field: String },
    #[error("{mnemonic}: stencil {stencil:#x} matches no encoding length")]
    BadStencil { mnemonic: String, stencil: Opcode },
    #[error("overlay {overlay}: base instruction {base} not found")]
    OverlayBaseNotFound { overlay: String, base: String },
    #[error("ambiguous opcode: {mnemonic} collides with {existing}")]
    AmbiguousOpcode { mnemonic: String, existing: String },
    #[error("{mnemonic}: malformed annotation: {reason}")]
    BadAnnotation { mnemonic: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
