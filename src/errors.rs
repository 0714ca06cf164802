//! Domain-specific error types.
//!
//! Uses `thiserror` for structured error definitions; `anyhow` is reserved for
//! the orchestration layer and the binary.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the bytecode loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    #[error("empty bytecode")]
    EmptyBytecode,

    #[error("bytecode too large ({0} bytes, max {1})")]
    BytecodeTooLarge(usize, usize),
}

/// A fork name that does not match any [`EvmVersion`](crate::utils::opcodes::EvmVersion).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fork '{0}'")]
pub struct UnknownFork(pub String);

/// Why an offset does not decode to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("offset {0} is past the end of the code")]
    OutOfRange(usize),

    #[error("offset {0} lies inside immediate data")]
    InsideImmediate(usize),

    #[error("undefined opcode 0x{opcode:02x} at offset {offset}")]
    UndefinedOpcode { offset: usize, opcode: u8 },

    #[error("immediate of opcode at offset {offset} is truncated ({needed} bytes, {have} available)")]
    TruncatedImmediate { offset: usize, needed: usize, have: usize },
}

impl DecodeError {
    /// Offset the failed decode was asked about.
    pub fn offset(&self) -> usize {
        match *self {
            DecodeError::OutOfRange(offset) | DecodeError::InsideImmediate(offset) => offset,
            DecodeError::UndefinedOpcode { offset, .. } => offset,
            DecodeError::TruncatedImmediate { offset, .. } => offset,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInstruction
    }
}

/// Errors from the symbolic stack model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack underflow: needed {needed} items, have {have}")]
    Underflow { needed: usize, have: usize },

    #[error("stack overflow: limit {limit}")]
    Overflow { limit: usize },

    #[error("return stack underflow")]
    ReturnUnderflow,

    #[error("return stack overflow: limit {limit}")]
    ReturnOverflow { limit: usize },

    #[error("jump destination has no static provenance")]
    DynamicJump,

    #[error("invalid jump destination {0:#x}")]
    InvalidDestination(U256),
}

impl StackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::Underflow { .. } | StackError::ReturnUnderflow => ErrorKind::StackUnderflow,
            StackError::Overflow { .. } | StackError::ReturnOverflow { .. } => ErrorKind::StackOverflow,
            StackError::DynamicJump => ErrorKind::DynamicJump,
            StackError::InvalidDestination(_) => ErrorKind::InvalidDestination,
        }
    }
}

/// The reason a program is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("invalid instruction")]
    InvalidInstruction,

    #[error("invalid destination")]
    InvalidDestination,

    #[error("dynamic jump")]
    DynamicJump,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack misalignment")]
    StackMisalignment,
}

/// A rejection: the offset where the violation was detected and its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} at offset {offset:#06x}")]
pub struct ValidationError {
    pub offset: usize,
    pub kind: ErrorKind,
}

impl ValidationError {
    pub fn new(offset: usize, kind: ErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Maximum allowed bytecode size (24 KB, the EVM contract limit).
pub const MAX_BYTECODE_SIZE: usize = 24_576;
