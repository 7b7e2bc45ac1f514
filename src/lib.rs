//! Core IR, traits, and result model for the prepatch relocation mapper.
//!
//! This library finds instructions whose encoding embeds an absolute memory
//! address close to a known reference address (the "memory base") and emits a
//! relocation descriptor for each one. A runtime patcher can later rewrite the
//! marked bytes so the program runs against a different memory base without
//! re-disassembling the binary at load time.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::fs;
//! use prepatch::{
//!     decoder::CapstoneDecoder,
//!     driver::{self, RunConfig},
//!     Architecture,
//! };
//!
//! // Read binary file
//! let image = fs::read("path/to/binary").unwrap();
//!
//! // Create a decoder for the target architecture
//! let decoder = CapstoneDecoder::for_architecture(Architecture::X86_32).unwrap();
//!
//! // Candidate instruction addresses (normally loaded from an IDA export)
//! let candidates = vec![0x0048D774];
//!
//! // Generate the relocation map
//! let result = driver::run(&image, &candidates, &decoder, &RunConfig::default());
//! println!("{} instructions described", result.metadata.total_instructions);
//! ```

pub mod decoder;
pub mod describe;
pub mod driver;
pub mod format;
pub mod input;
pub mod parser;
pub mod scanner;

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Represents a virtual address in the 32-bit image
pub type Address = u32;

/// Maximum instruction size in bytes
pub const MAX_INSTRUCTION_SIZE: usize = 16;

/// Default read window per candidate address
pub const DEFAULT_BYTES_TO_READ: usize = 15;

/// Default reference address relocatable pointers cluster around
pub const DEFAULT_MEMORY_BASE: Address = 0x01CF_4064;

/// Default virtual address of byte 0 of the image (PE default)
pub const DEFAULT_IMAGE_BASE: Address = 0x0040_0000;

/// Default maximum distance from the memory base for a value to count as a
/// relocatable reference
pub const DEFAULT_MAX_RANGE: u32 = 0x10000;

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    /// Address of the instruction as reported by the decoder
    pub addr: Address,
    /// Size of the instruction in bytes
    pub size: u8,
    /// Instruction mnemonic (e.g., "mov", "lea")
    pub mnemonic: String,
    /// Instruction operands as string representation
    pub operands: String,
    /// Raw bytes of the instruction (up to MAX_INSTRUCTION_SIZE)
    pub bytes: [u8; MAX_INSTRUCTION_SIZE],
}

impl Insn {
    /// Returns the instruction bytes, up to the actual instruction size.
    ///
    /// All relocation math must go through this accessor: the read window is
    /// larger than most instructions, and bytes past `size` belong to the
    /// *next* instruction.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.size as usize]
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.mnemonic, self.operands)
    }
}

/// Decoder trait: architecture-specific disassembler.
pub trait Decoder: Send + Sync {
    /// Decode at most one instruction from `window`, which starts at virtual
    /// address `at`.
    ///
    /// # Returns
    /// * `Ok(Some(insn))` - an instruction was recognized at `at`
    /// * `Ok(None)` - the decoder found no valid instruction at `at`
    /// * `Err(..)` - the decoder itself failed unexpectedly
    fn decode_one(&self, window: &[u8], at: Address) -> Result<Option<Insn>, RelocationError>;
}

/// Supported architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
#[non_exhaustive]
pub enum Architecture {
    /// 32-bit x86
    #[value(name = "x86-32")]
    X86_32,
    /// 64-bit x86
    #[value(name = "x86-64")]
    X86_64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_32 => write!(f, "x86-32"),
            Architecture::X86_64 => write!(f, "x86-64"),
        }
    }
}

impl Architecture {
    /// Return the default architecture
    pub fn default() -> Self {
        Architecture::X86_32
    }
}

/// One relocation descriptor, keyed externally by the decoded instruction
/// address.
///
/// The two shapes share a key space and run metadata and differ only in
/// payload, so they are variants of one type rather than two structures.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum RelocationDescriptor {
    /// Hex dump with every byte of a matched 4-byte span masked as "XX",
    /// plus the signed offset of the first match
    ByteMasked { bytes: String, offset: String },
    /// Mnemonic and operand text with every in-range hex literal replaced by
    /// a `<memory_base>` placeholder carrying the signed offset
    TextSubstituted(String),
}

/// Mapping from address key to relocation descriptor.
///
/// Insertion order follows input address order; inserting an existing key
/// overwrites the descriptor but keeps the original position, matching the
/// behavior of a keyed document mapping.
#[derive(Debug, Clone, Default)]
pub struct RelocMap {
    entries: HashMap<String, RelocationDescriptor>,
    order: Vec<String>,
}

impl RelocMap {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, overwriting any previous descriptor for `key`
    pub fn insert(&mut self, key: String, descriptor: RelocationDescriptor) {
        if self.entries.insert(key.clone(), descriptor).is_none() {
            self.order.push(key);
        }
    }

    /// Look up a descriptor by its address key
    pub fn get(&self, key: &str) -> Option<&RelocationDescriptor> {
        self.entries.get(key)
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelocationDescriptor)> {
        self.order
            .iter()
            .map(move |key| (key.as_str(), &self.entries[key]))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the mapping holds no entries
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Serialize for RelocMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, descriptor) in self.iter() {
            map.serialize_entry(key, descriptor)?;
        }
        map.end()
    }
}

/// Metadata describing one relocation-map run.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// Version of the tool that produced the map
    pub tool_version: String,
    /// Reference address the offsets are relative to
    pub memory_base: Address,
    /// Virtual address of byte 0 of the image
    pub image_base: Address,
    /// Count of successfully described instructions
    pub total_instructions: usize,
    /// Free-form description of the run
    pub description: String,
}

/// Result of one relocation-map run.
///
/// Created once by the batch driver, immutable afterwards, then handed to a
/// formatter for serialization.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Run metadata
    pub metadata: RunMetadata,
    /// Full mapping of address key to relocation descriptor
    pub instructions: RelocMap,
    /// Per-outcome counters for the run
    pub stats: driver::RunStats,
}

/// Error type for relocation-map operations
#[derive(Debug, thiserror::Error)]
pub enum RelocationError {
    /// Failed to parse binary format
    #[error("Failed to parse binary format: {0}")]
    ParsingError(String),

    /// Decoder error
    #[error(transparent)]
    DecoderError(#[from] decoder::DecoderError),

    /// Candidate list error
    #[error("Candidate list error: {0}")]
    CandidateListError(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}
