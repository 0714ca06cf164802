//! jumpguard: static safety validation for EVM bytecode
//!
//! Decides before execution whether a program can ever halt exceptionally
//! for a reason other than gas or unbounded recursion: invalid instructions,
//! jumps to non-destinations, dynamic jumps, stack underflow or overflow,
//! and blocks reached at inconsistent stack heights. Static relative jumps
//! and subroutines (`rjump`, `rjumpi`, `jumpsub`, `returnsub`) are supported.

pub mod utils;

pub mod checker;
pub mod decoder;
pub mod errors;
pub mod jumpdests;
pub mod loader;
pub mod report;
pub mod stack;
pub mod validator;

pub use validator::{validate, Analysis, Validator, Verdict};
