//! Instruction decoding.
//!
//! A [`Decoder`] walks the code once up front, marking every offset where an
//! instruction starts (immediate data is skipped), and afterwards answers
//! `decode(offset)` in constant time.

use crate::errors::DecodeError;
use crate::utils::opcodes::{opcode_table, EvmVersion, OpClass, OpcodeTable};
use primitive_types::U256;

/// Decoded view of the instruction at one offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    pub name: &'static str,
    pub class: OpClass,
    pub immediate_len: usize,
    pub pops: usize,
    pub pushes: usize,
}

impl Instruction {
    /// Offset of the following instruction.
    pub fn next(&self) -> usize {
        self.offset + 1 + self.immediate_len
    }
}

/// Offset → instruction lookup over an immutable code buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    code: &'a [u8],
    fork: EvmVersion,
    table: &'static OpcodeTable,
    /// `true` wherever an instruction starts.
    boundaries: Vec<bool>,
}

impl<'a> Decoder<'a> {
    pub fn new(code: &'a [u8], fork: EvmVersion) -> Self {
        let table = opcode_table();
        let mut boundaries = vec![false; code.len()];
        let mut offset = 0usize;
        while offset < code.len() {
            boundaries[offset] = true;
            // Undefined opcodes are one byte wide.
            let width = table
                .lookup(code[offset], fork)
                .map_or(0, |info| info.immediate_bytes as usize);
            offset += 1 + width;
        }
        Self { code, fork, table, boundaries }
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn fork(&self) -> EvmVersion {
        self.fork
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Whether an instruction starts at `offset`.
    pub fn is_boundary(&self, offset: usize) -> bool {
        self.boundaries.get(offset).copied().unwrap_or(false)
    }

    /// Decode the instruction starting at `offset`.
    pub fn decode(&self, offset: usize) -> Result<Instruction, DecodeError> {
        if offset >= self.code.len() {
            return Err(DecodeError::OutOfRange(offset));
        }
        if !self.boundaries[offset] {
            return Err(DecodeError::InsideImmediate(offset));
        }
        let opcode = self.code[offset];
        let info = self
            .table
            .lookup(opcode, self.fork)
            .ok_or(DecodeError::UndefinedOpcode { offset, opcode })?;

        let needed = info.immediate_bytes as usize;
        let have = self.code.len() - offset - 1;
        if needed > have {
            return Err(DecodeError::TruncatedImmediate { offset, needed, have });
        }

        Ok(Instruction {
            offset,
            opcode,
            name: info.name,
            class: info.class,
            immediate_len: needed,
            pops: info.pops as usize,
            pushes: info.pushes as usize,
        })
    }

    /// Immediate bytes of a decoded instruction.
    pub fn immediate(&self, ins: &Instruction) -> &'a [u8] {
        &self.code[ins.offset + 1..ins.next()]
    }

    /// The literal pushed by a `pushN` (zero for `push0`).
    pub fn push_value(&self, ins: &Instruction) -> U256 {
        U256::from_big_endian(self.immediate(ins))
    }

    /// Target of a relative jump: next offset plus the signed 16-bit immediate.
    /// `None` if the target would fall before the start of the code.
    pub fn relative_target(&self, ins: &Instruction) -> Option<usize> {
        let imm = self.immediate(ins);
        if imm.len() != 2 {
            return None;
        }
        let rel = i16::from_be_bytes([imm[0], imm[1]]);
        ins.next().checked_add_signed(rel as isize)
    }

    /// Every instruction in code order, undecodable ones included.
    pub fn instructions(&self) -> impl Iterator<Item = Result<Instruction, DecodeError>> + '_ {
        self.boundaries
            .iter()
            .enumerate()
            .filter(|(_, start)| **start)
            .map(move |(offset, _)| self.decode(offset))
    }
}
