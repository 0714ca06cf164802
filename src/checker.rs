//! Validation orchestrator.
//!
//! Ties together loading, validation and output rendering for one program.

use crate::errors::{LoaderError, MAX_BYTECODE_SIZE};
use crate::loader::Loader;
use crate::report::Report;
use crate::utils::helpers::{colors, offset_hex};
use crate::utils::opcodes::EvmVersion;
use crate::validator::{Validator, Verdict};
use anyhow::{Context, Result};
use std::str::FromStr;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Asm,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "asm" => Ok(OutputFormat::Asm),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unknown output format '{other}' (expected text, asm or json)"),
        }
    }
}

/// Result of a checking run.
pub struct Check {
    pub text: String,
    pub report: Report,
}

/// Configuration for the checker.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub fork: EvmVersion,
    pub format: OutputFormat,
    pub color: bool,
    pub max_code_size: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            fork: EvmVersion::latest(),
            format: OutputFormat::Text,
            color: true,
            max_code_size: MAX_BYTECODE_SIZE,
        }
    }
}

/// Validate raw bytecode (hex string) and render the outcome.
pub fn check_bytecode(hex_code: &str, config: &CheckConfig) -> Result<Check> {
    let mut loader = Loader::with_max_size(config.max_code_size);
    loader.load_binary(hex_code).context("failed to load bytecode")?;

    if loader.binary.is_empty() {
        return Err(LoaderError::EmptyBytecode).context("failed to load bytecode");
    }

    let validator = Validator::new(&loader.binary, config.fork);
    let report = Report::from_run(config.fork, loader.binary.len(), validator.run());

    let text = match config.format {
        OutputFormat::Text => render_text(&report, &validator, config.color),
        OutputFormat::Asm => render_asm(&loader, &report, &validator, config.fork),
        OutputFormat::Json => serde_json::to_string_pretty(&report.to_json()).context("serialise to JSON")?,
    };

    Ok(Check { text, report })
}

/// One-line verdict.
pub fn render_text(report: &Report, validator: &Validator<'_>, color: bool) -> String {
    match report.verdict {
        Verdict::Valid { max_stack_depth } => {
            let line = format!(
                "valid: max stack depth {max_stack_depth}, {} blocks, {} subroutines",
                report.block_entries.len(),
                report.routines,
            );
            colors::colorize(&line, colors::OKGREEN, color)
        }
        Verdict::Invalid { offset, kind } => {
            let line = format!(
                "invalid: {kind} at offset {} ({})",
                offset_hex(offset),
                validator.mnemonic(offset),
            );
            colors::colorize(&line, colors::FAIL, color)
        }
    }
}

fn render_asm(loader: &Loader, report: &Report, validator: &Validator<'_>, fork: EvmVersion) -> String {
    let mut lines = loader.disasm(fork);
    lines.push(format!("; {}", render_text(report, validator, false)));
    lines.join("\n")
}
