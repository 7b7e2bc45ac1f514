//! Command-line front end for the prepatch relocation mapper.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn, LevelFilter};

use prepatch::decoder::CapstoneDecoder;
use prepatch::describe::Representation;
use prepatch::driver::{self, RunConfig};
use prepatch::format::OutputFormat;
use prepatch::input;
use prepatch::parser::GoblinParser;
use prepatch::Architecture;

#[derive(Parser, Debug)]
#[command(version, about = "Generate a relocation map for a compiled binary", long_about = None)]
struct Args {
    /// Candidate address list (IDA export, first column holds 0x-prefixed
    /// addresses)
    #[arg(long)]
    csv: PathBuf,

    /// Binary file to analyze
    #[arg(long)]
    binary: PathBuf,

    /// Virtual address of byte 0 of the image
    #[arg(long, value_parser = parse_address, default_value = "0x400000")]
    image_base: u32,

    /// Reference address relocatable pointers cluster around
    #[arg(long, value_parser = parse_address, default_value = "0x01CF4064")]
    memory_base: u32,

    /// Bytes to read per candidate address
    #[arg(long, default_value_t = prepatch::DEFAULT_BYTES_TO_READ)]
    bytes_to_read: usize,

    /// Candidate list delimiter ("\t" for tab)
    #[arg(long, default_value = "\t")]
    csv_delimiter: String,

    /// Maximum distance from the memory base for a value to qualify as a
    /// relocatable reference
    #[arg(long, value_parser = parse_address, default_value = "0x10000")]
    max_offset_range: u32,

    /// Target architecture
    #[arg(long, value_enum, default_value = "x86-32")]
    arch: Architecture,

    /// Descriptor representation
    #[arg(long, value_enum, default_value = "bytes")]
    representation: Representation,

    /// Output format
    #[arg(long, value_enum, default_value = "toml")]
    format: OutputFormat,

    /// Description recorded in the map metadata
    #[arg(long, default_value = "Pre-patched instructions for runtime relocation")]
    description: String,

    /// Output file (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Parse a hex (`0x`-prefixed) or decimal address
fn parse_address(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", s, e))
}

/// Resolve the delimiter flag to a single byte
fn delimiter_byte(s: &str) -> Result<u8> {
    match s {
        "\\t" => Ok(b'\t'),
        s if s.len() == 1 => Ok(s.as_bytes()[0]),
        other => bail!("delimiter must be a single character: {:?}", other),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // Logs go to stderr so a stdout relocation map stays clean
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    info!("=== prepatch run starting ===");
    info!("Candidate list: {}", args.csv.display());
    info!("Binary: {}", args.binary.display());
    info!("Image base: 0x{:08X}", args.image_base);
    info!("Memory base: 0x{:08X}", args.memory_base);
    info!("Bytes to read: {}", args.bytes_to_read);
    info!("Max offset range: 0x{:X}", args.max_offset_range);
    info!("Representation: {}", args.representation);

    let delimiter = delimiter_byte(&args.csv_delimiter)?;

    let image = input::load_image(&args.binary)
        .with_context(|| format!("failed to load binary {}", args.binary.display()))?;

    match GoblinParser::new().parse(&image) {
        Ok(probe) => {
            if let Some(base) = probe.image_base {
                if base != args.image_base {
                    warn!(
                        "Headers report image base 0x{:08X}, configured 0x{:08X}",
                        base, args.image_base
                    );
                }
            }
            if let Some(arch) = probe.architecture {
                if arch != args.arch {
                    warn!("Headers report an {} image, decoding as {}", arch, args.arch);
                }
            }
        }
        Err(err) => debug!("Image probe failed: {}", err),
    }

    let candidates = input::read_candidates(&args.csv, delimiter)
        .with_context(|| format!("failed to read candidate list {}", args.csv.display()))?;

    let decoder = CapstoneDecoder::for_architecture(args.arch)?;

    let config = RunConfig {
        memory_base: args.memory_base,
        image_base: args.image_base,
        max_range: args.max_offset_range,
        bytes_to_read: args.bytes_to_read,
        representation: args.representation,
        description: args.description,
    };
    let result = driver::run(&image, &candidates, &decoder, &config);

    let output = args.format.get_formatter().format(&result)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Relocation map written to {}", path.display());
        }
        None => print!("{}", output),
    }

    Ok(())
}
