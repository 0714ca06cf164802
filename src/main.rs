//! jumpguard CLI: static safety check for EVM bytecode.

use anyhow::{Context, Result};
use clap::Parser;
use jumpguard::checker::{check_bytecode, CheckConfig, OutputFormat};
use jumpguard::errors::MAX_BYTECODE_SIZE;
use jumpguard::utils::opcodes::EvmVersion;
use std::io::{IsTerminal, Read};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "jumpguard",
    version,
    about = "Static validator for EVM bytecode: rejects code that could halt on a bad jump or stack error"
)]
struct Cli {
    /// Bytecode as a hex string (with or without 0x prefix).
    #[arg(value_name = "BYTECODE")]
    bytecode: Option<String>,

    /// Read bytecode from a file instead.
    #[arg(short = 'f', long)]
    file: Option<String>,

    /// Output format: text (default), asm, json.
    #[arg(short = 'o', long, default_value = "text")]
    format: String,

    /// Hard fork whose instruction set applies.
    #[arg(long, default_value_t = EvmVersion::latest())]
    fork: EvmVersion,

    /// Largest accepted program, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = MAX_BYTECODE_SIZE)]
    max_size: usize,

    /// Disable coloured output.
    #[arg(long)]
    no_color: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Determine the hex bytecode.
    let hex_code = if let Some(ref path) = cli.file {
        let mut buf = String::new();
        std::fs::File::open(path)
            .and_then(|mut f| f.read_to_string(&mut buf))
            .with_context(|| format!("cannot read {path}"))?;
        buf.trim().to_string()
    } else if let Some(ref code) = cli.bytecode {
        code.trim().to_string()
    } else if std::io::stdin().is_terminal() {
        anyhow::bail!("no bytecode provided; pass it as an argument, via -f, or pipe to stdin");
    } else {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf.trim().to_string()
    };

    if hex_code.is_empty() {
        anyhow::bail!("empty bytecode");
    }

    let config = CheckConfig {
        fork: cli.fork,
        format: cli.format.parse::<OutputFormat>()?,
        color: !cli.no_color,
        max_code_size: cli.max_size,
    };

    let result = check_bytecode(&hex_code, &config)?;
    println!("{}", result.text);

    Ok(if result.report.is_valid() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
