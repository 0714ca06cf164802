//! Program-level validation report.

use crate::utils::opcodes::EvmVersion;
use crate::validator::{Analysis, Verdict};
use serde::{Deserialize, Serialize};

/// The outcome of checking one program, ready for serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub fork: EvmVersion,
    pub code_size: usize,
    pub verdict: Verdict,
    /// Reached block entries; empty for a rejected program.
    #[serde(default)]
    pub block_entries: Vec<usize>,
    #[serde(default)]
    pub routines: usize,
}

impl Report {
    pub fn new(fork: EvmVersion, code_size: usize, verdict: Verdict) -> Self {
        Self { fork, code_size, verdict, block_entries: Vec::new(), routines: 0 }
    }

    /// Build a report from a validator run.
    pub fn from_run(fork: EvmVersion, code_size: usize, run: Result<Analysis, crate::errors::ValidationError>) -> Self {
        match run {
            Ok(analysis) => Self {
                fork,
                code_size,
                verdict: Verdict::Valid { max_stack_depth: analysis.max_stack_depth },
                block_entries: analysis.block_entries,
                routines: analysis.routines,
            },
            Err(e) => Self::new(fork, code_size, Verdict::Invalid { offset: e.offset, kind: e.kind }),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict.is_valid()
    }

    /// Serialise the report to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "fork": self.fork,
            "code_size": self.code_size,
            "verdict": self.verdict,
            "block_entries": self.block_entries,
            "routines": self.routines,
        })
    }
}
