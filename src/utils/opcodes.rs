//! Opcode definitions covering every hard-fork from Frontier through Cancun,
//! plus the static control-flow extension (`rjump`, `rjumpi`, `jumpsub`,
//! `returnsub`) gated behind [`EvmVersion::Prague`].
//!
//! Each opcode carries its byte value, mnemonic, the stack items it pops /
//! pushes, its immediate width, the class the validator dispatches on, and the
//! hard-fork that introduced it.

use crate::errors::UnknownFork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use std::sync::OnceLock;

/// EVM hard-fork versions (chronological order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvmVersion {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Istanbul,
    Berlin,
    London,
    Paris,        // The Merge
    Shanghai,
    Cancun,
    Prague,
}

impl EvmVersion {
    /// Return all EVM versions in chronological order.
    pub fn all() -> &'static [EvmVersion] {
        &[
            EvmVersion::Frontier,
            EvmVersion::Homestead,
            EvmVersion::TangerineWhistle,
            EvmVersion::SpuriousDragon,
            EvmVersion::Byzantium,
            EvmVersion::Constantinople,
            EvmVersion::Istanbul,
            EvmVersion::Berlin,
            EvmVersion::London,
            EvmVersion::Paris,
            EvmVersion::Shanghai,
            EvmVersion::Cancun,
            EvmVersion::Prague,
        ]
    }

    /// The newest fork; the only one with static subroutines.
    pub fn latest() -> Self {
        EvmVersion::Prague
    }

    /// Lowercase, dash-separated name as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            EvmVersion::Frontier => "frontier",
            EvmVersion::Homestead => "homestead",
            EvmVersion::TangerineWhistle => "tangerine-whistle",
            EvmVersion::SpuriousDragon => "spurious-dragon",
            EvmVersion::Byzantium => "byzantium",
            EvmVersion::Constantinople => "constantinople",
            EvmVersion::Istanbul => "istanbul",
            EvmVersion::Berlin => "berlin",
            EvmVersion::London => "london",
            EvmVersion::Paris => "paris",
            EvmVersion::Shanghai => "shanghai",
            EvmVersion::Cancun => "cancun",
            EvmVersion::Prague => "prague",
        }
    }
}

impl Default for EvmVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl fmt::Display for EvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvmVersion {
    type Err = UnknownFork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        EvmVersion::all()
            .iter()
            .copied()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| UnknownFork(s.to_string()))
    }
}

/// How the validator treats an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Ends the path successfully: stop, return, revert, selfdestruct.
    Halt,
    /// The designated invalid opcode.
    Invalid,
    /// Push-literal; the value is the immediate (zero for `push0`).
    Push,
    /// `dupN`: copies the N-th slot from the top.
    Dup(u8),
    /// `swapN`: exchanges the top with the slot N below it.
    Swap(u8),
    JumpDest,
    Jump,
    JumpI,
    RJump,
    RJumpI,
    JumpSub,
    ReturnSub,
    /// Fixed pop/push counts; anything pushed has no provenance.
    Effect,
}

/// Information about a single opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub byte: u8,
    pub name: &'static str,
    /// Number of stack items consumed.
    pub pops: u8,
    /// Number of stack items produced.
    pub pushes: u8,
    /// The hard-fork that introduced this opcode.
    pub since: EvmVersion,
    /// Width of the inline immediate (`pushN`, relative jumps).
    pub immediate_bytes: u8,
    pub class: OpClass,
}

impl OpcodeInfo {
    /// Stack diff = pushes − pops  (may be negative).
    pub fn stack_diff(&self) -> i16 {
        self.pushes as i16 - self.pops as i16
    }

    /// Whether the opcode exists at the given fork.
    pub fn defined_at(&self, fork: EvmVersion) -> bool {
        self.since <= fork
    }
}

/// Byte → opcode lookup, one slot per possible byte.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    entries: [Option<OpcodeInfo>; 256],
}

impl OpcodeTable {
    /// Look up an opcode regardless of fork.
    pub fn get(&self, byte: u8) -> Option<&OpcodeInfo> {
        self.entries[byte as usize].as_ref()
    }

    /// Look up an opcode that is defined at `fork`.
    pub fn lookup(&self, byte: u8, fork: EvmVersion) -> Option<&OpcodeInfo> {
        self.get(byte).filter(|info| info.defined_at(fork))
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.entries[byte as usize].is_some()
    }

    /// Iterate over all known opcodes in byte order.
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.entries.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<u8> for OpcodeTable {
    type Output = OpcodeInfo;

    fn index(&self, byte: u8) -> &OpcodeInfo {
        match self.get(byte) {
            Some(info) => info,
            None => panic!("no opcode 0x{byte:02x}"),
        }
    }
}

const PUSH_NAMES: [&str; 33] = [
    "push0", "push1", "push2", "push3", "push4", "push5", "push6", "push7", "push8",
    "push9", "push10", "push11", "push12", "push13", "push14", "push15", "push16",
    "push17", "push18", "push19", "push20", "push21", "push22", "push23", "push24",
    "push25", "push26", "push27", "push28", "push29", "push30", "push31", "push32",
];

const DUP_NAMES: [&str; 16] = [
    "dup1", "dup2", "dup3", "dup4", "dup5", "dup6", "dup7", "dup8",
    "dup9", "dup10", "dup11", "dup12", "dup13", "dup14", "dup15", "dup16",
];

const SWAP_NAMES: [&str; 16] = [
    "swap1", "swap2", "swap3", "swap4", "swap5", "swap6", "swap7", "swap8",
    "swap9", "swap10", "swap11", "swap12", "swap13", "swap14", "swap15", "swap16",
];

const LOG_NAMES: [&str; 5] = ["log0", "log1", "log2", "log3", "log4"];

/// Build the full opcode table (byte → info).
pub fn build_opcode_table() -> OpcodeTable {
    use EvmVersion::*;
    use OpClass::*;

    let mut m: [Option<OpcodeInfo>; 256] = [None; 256];

    macro_rules! op {
        ($byte:expr, $name:expr, $pops:expr, $pushes:expr, $since:expr) => {
            op!($byte, $name, $pops, $pushes, $since, Effect, 0)
        };
        ($byte:expr, $name:expr, $pops:expr, $pushes:expr, $since:expr, $class:expr) => {
            op!($byte, $name, $pops, $pushes, $since, $class, 0)
        };
        ($byte:expr, $name:expr, $pops:expr, $pushes:expr, $since:expr, $class:expr, $imm:expr) => {
            m[$byte as usize] = Some(OpcodeInfo {
                byte: $byte,
                name: $name,
                pops: $pops,
                pushes: $pushes,
                since: $since,
                immediate_bytes: $imm,
                class: $class,
            });
        };
    }

    // -- Stop and Arithmetic -----------------------------------------------
    op!(0x00, "stop",         0, 0, Frontier, Halt);
    op!(0x01, "add",          2, 1, Frontier);
    op!(0x02, "mul",          2, 1, Frontier);
    op!(0x03, "sub",          2, 1, Frontier);
    op!(0x04, "div",          2, 1, Frontier);
    op!(0x05, "sdiv",         2, 1, Frontier);
    op!(0x06, "mod",          2, 1, Frontier);
    op!(0x07, "smod",         2, 1, Frontier);
    op!(0x08, "addmod",       3, 1, Frontier);
    op!(0x09, "mulmod",       3, 1, Frontier);
    op!(0x0A, "exp",          2, 1, Frontier);
    op!(0x0B, "signextend",   2, 1, Frontier);

    // -- Comparison and Bitwise Logic --------------------------------------
    op!(0x10, "lt",           2, 1, Frontier);
    op!(0x11, "gt",           2, 1, Frontier);
    op!(0x12, "slt",          2, 1, Frontier);
    op!(0x13, "sgt",          2, 1, Frontier);
    op!(0x14, "eq",           2, 1, Frontier);
    op!(0x15, "iszero",       1, 1, Frontier);
    op!(0x16, "and",          2, 1, Frontier);
    op!(0x17, "or",           2, 1, Frontier);
    op!(0x18, "xor",          2, 1, Frontier);
    op!(0x19, "not",          1, 1, Frontier);
    op!(0x1A, "byte",         2, 1, Frontier);
    // Constantinople
    op!(0x1B, "shl",          2, 1, Constantinople);
    op!(0x1C, "shr",          2, 1, Constantinople);
    op!(0x1D, "sar",          2, 1, Constantinople);

    // -- SHA3 --------------------------------------------------------------
    op!(0x20, "sha3",         2, 1, Frontier);

    // -- Environment Information -------------------------------------------
    op!(0x30, "address",      0, 1, Frontier);
    op!(0x31, "balance",      1, 1, Frontier);
    op!(0x32, "origin",       0, 1, Frontier);
    op!(0x33, "caller",       0, 1, Frontier);
    op!(0x34, "callvalue",    0, 1, Frontier);
    op!(0x35, "calldataload", 1, 1, Frontier);
    op!(0x36, "calldatasize", 0, 1, Frontier);
    op!(0x37, "calldatacopy", 3, 0, Frontier);
    op!(0x38, "codesize",     0, 1, Frontier);
    op!(0x39, "codecopy",     3, 0, Frontier);
    op!(0x3A, "gasprice",     0, 1, Frontier);
    op!(0x3B, "extcodesize",  1, 1, Frontier);
    op!(0x3C, "extcodecopy",  4, 0, Frontier);
    // Byzantium
    op!(0x3D, "returndatasize", 0, 1, Byzantium);
    op!(0x3E, "returndatacopy", 3, 0, Byzantium);
    // Constantinople
    op!(0x3F, "extcodehash",  1, 1, Constantinople);

    // -- Block Information -------------------------------------------------
    op!(0x40, "blockhash",    1, 1, Frontier);
    op!(0x41, "coinbase",     0, 1, Frontier);
    op!(0x42, "timestamp",    0, 1, Frontier);
    op!(0x43, "number",       0, 1, Frontier);
    op!(0x44, "difficulty",   0, 1, Frontier);  // prevrandao post-Paris
    op!(0x45, "gaslimit",     0, 1, Frontier);
    // Istanbul
    op!(0x46, "chainid",      0, 1, Istanbul);
    op!(0x47, "selfbalance",  0, 1, Istanbul);
    // London
    op!(0x48, "basefee",      0, 1, London);
    // Cancun
    op!(0x49, "blobhash",     1, 1, Cancun);
    op!(0x4A, "blobbasefee",  0, 1, Cancun);

    // -- Stack, Memory, Storage and Flow -----------------------------------
    op!(0x50, "pop",          1, 0, Frontier);
    op!(0x51, "mload",        1, 1, Frontier);
    op!(0x52, "mstore",       2, 0, Frontier);
    op!(0x53, "mstore8",      2, 0, Frontier);
    op!(0x54, "sload",        1, 1, Frontier);
    op!(0x55, "sstore",       2, 0, Frontier);
    op!(0x56, "jump",         1, 0, Frontier, Jump);
    op!(0x57, "jumpi",        2, 0, Frontier, JumpI);
    op!(0x58, "pc",           0, 1, Frontier);
    op!(0x59, "msize",        0, 1, Frontier);
    op!(0x5A, "gas",          0, 1, Frontier);
    op!(0x5B, "jumpdest",     0, 0, Frontier, JumpDest);
    // Cancun
    op!(0x5C, "tload",        1, 1, Cancun);
    op!(0x5D, "tstore",       2, 0, Cancun);
    op!(0x5E, "mcopy",        3, 0, Cancun);

    // -- PUSH0 (Shanghai) --------------------------------------------------
    op!(0x5F, "push0",        0, 1, Shanghai, Push);

    // -- PUSH1..PUSH32 -----------------------------------------------------
    for n in 1u8..=32 {
        op!(0x5F + n, PUSH_NAMES[n as usize], 0, 1, Frontier, Push, n);
    }

    // -- DUP1..DUP16 -------------------------------------------------------
    for n in 1u8..=16 {
        op!(0x7F + n, DUP_NAMES[n as usize - 1], n, n + 1, Frontier, Dup(n));
    }

    // -- SWAP1..SWAP16 -----------------------------------------------------
    for n in 1u8..=16 {
        op!(0x8F + n, SWAP_NAMES[n as usize - 1], n + 1, n + 1, Frontier, Swap(n));
    }

    // -- LOG0..LOG4 ---------------------------------------------------------
    for n in 0u8..=4 {
        op!(0xA0 + n, LOG_NAMES[n as usize], n + 2, 0, Frontier);
    }

    // -- Static control flow -----------------------------------------------
    op!(0xE0, "rjump",        0, 0, Prague, RJump, 2);
    op!(0xE1, "rjumpi",       1, 0, Prague, RJumpI, 2);
    op!(0xE3, "jumpsub",      1, 0, Prague, JumpSub);
    op!(0xE4, "returnsub",    0, 0, Prague, ReturnSub);

    // -- System operations -------------------------------------------------
    op!(0xF0, "create",       3, 1, Frontier);
    op!(0xF1, "call",         7, 1, Frontier);
    op!(0xF2, "callcode",     7, 1, Frontier);
    op!(0xF3, "return",       2, 0, Frontier, Halt);
    op!(0xF4, "delegatecall", 6, 1, Homestead);
    // Constantinople
    op!(0xF5, "create2",      4, 1, Constantinople);
    // Byzantium
    op!(0xFA, "staticcall",   6, 1, Byzantium);
    op!(0xFD, "revert",       2, 0, Byzantium, Halt);
    op!(0xFE, "invalid",      0, 0, Frontier, Invalid);
    op!(0xFF, "selfdestruct", 1, 0, Frontier, Halt);

    OpcodeTable { entries: m }
}

/// The process-wide table, built on first use.
pub fn opcode_table() -> &'static OpcodeTable {
    static TABLE: OnceLock<OpcodeTable> = OnceLock::new();
    TABLE.get_or_init(build_opcode_table)
}
