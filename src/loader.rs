//! Bytecode loading and disassembly.
//!
//! Turns hex input into raw code bytes and renders a listing of the
//! instructions the decoder sees in them.

use crate::decoder::Decoder;
use crate::errors::{DecodeError, LoaderError, MAX_BYTECODE_SIZE};
use crate::utils::helpers::{abbreviate, offset_hex};
use crate::utils::opcodes::{opcode_table, EvmVersion};

/// Holds the raw code bytes of one program.
#[derive(Debug, Clone)]
pub struct Loader {
    /// Raw bytecode as bytes.
    pub binary: Vec<u8>,
    /// Largest accepted program, in bytes.
    pub max_size: usize,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// Create a new, empty loader ready to accept bytecode.
    pub fn new() -> Self {
        Self::with_max_size(MAX_BYTECODE_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self { binary: Vec::new(), max_size }
    }

    /// Load bytecode from a hex string (with or without `0x` prefix).
    ///
    /// Whitespace anywhere in the input is ignored, so wrapped hex dumps load
    /// as-is. Empty input loads as empty code.
    pub fn load_binary(&mut self, source: &str) -> Result<(), LoaderError> {
        let trimmed = source.trim();
        let hex_str: String = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let binary = hex::decode(&hex_str).map_err(|_| LoaderError::InvalidHex(abbreviate(&hex_str, 40)))?;
        self.load_bytes(binary)
    }

    /// Load raw code bytes.
    pub fn load_bytes(&mut self, binary: Vec<u8>) -> Result<(), LoaderError> {
        if binary.len() > self.max_size {
            return Err(LoaderError::BytecodeTooLarge(binary.len(), self.max_size));
        }
        log::trace!("loaded {} bytes", binary.len());
        self.binary = binary;
        Ok(())
    }

    /// Generate disassembly lines for `fork`.
    ///
    /// Bytes that do not decode are listed as `unknown` and the listing
    /// resumes at the next byte.
    pub fn disasm(&self, fork: EvmVersion) -> Vec<String> {
        let decoder = Decoder::new(&self.binary, fork);
        decoder
            .instructions()
            .map(|decoded| match decoded {
                Ok(ins) if ins.immediate_len > 0 => {
                    let hex = hex::encode(decoder.immediate(&ins));
                    format!("{} {} 0x{hex}", offset_hex(ins.offset), ins.name)
                }
                Ok(ins) => format!("{} {}", offset_hex(ins.offset), ins.name),
                Err(DecodeError::TruncatedImmediate { offset, .. }) => {
                    let name = opcode_table()
                        .lookup(self.binary[offset], fork)
                        .map_or("unknown", |info| info.name);
                    let rest = hex::encode(&self.binary[offset..]);
                    format!("{} {name} (truncated 0x{rest})", offset_hex(offset))
                }
                Err(e) => {
                    let offset = e.offset();
                    let byte = self.binary.get(offset).copied().unwrap_or_default();
                    format!("{} unknown 0x{byte:02x}", offset_hex(offset))
                }
            })
            .collect()
    }
}
