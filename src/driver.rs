//! Batch driver: walks the candidate list and accumulates the relocation map.

use log::{debug, error, info};

use crate::describe::{self, Representation};
use crate::{Address, Decoder, RelocMap, RunMetadata, RunResult};

/// Terminal outcome for one candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decode and build succeeded, descriptor added to the mapping
    Described,
    /// File-offset bounds check failed before any decode attempt
    OutOfRange,
    /// The decoder found no valid instruction
    DecodeFailed,
    /// The decoder failed unexpectedly
    DecodeError,
}

/// Per-outcome counters for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Total candidate addresses processed
    pub total: usize,
    /// Successfully described instructions
    pub described: usize,
    /// Candidates whose file offset fell outside the image
    pub out_of_range: usize,
    /// Candidates the decoder found no instruction at
    pub decode_failed: usize,
    /// Unexpected decoder failures
    pub decode_errors: usize,
}

impl RunStats {
    /// Record one terminal outcome
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Described => self.described += 1,
            Outcome::OutOfRange => self.out_of_range += 1,
            Outcome::DecodeFailed => self.decode_failed += 1,
            Outcome::DecodeError => self.decode_errors += 1,
        }
    }

    /// Fraction of candidates that were described, or None for an empty run
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.described as f64 / self.total as f64)
        }
    }
}

/// Configuration for one relocation-map run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Reference address the offsets are relative to
    pub memory_base: Address,
    /// Virtual address of byte 0 of the image
    pub image_base: Address,
    /// Maximum distance from the memory base for a value to qualify
    pub max_range: u32,
    /// Read window per candidate address
    pub bytes_to_read: usize,
    /// Descriptor representation to produce
    pub representation: Representation,
    /// Free-form description recorded in the run metadata
    pub description: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            memory_base: crate::DEFAULT_MEMORY_BASE,
            image_base: crate::DEFAULT_IMAGE_BASE,
            max_range: crate::DEFAULT_MAX_RANGE,
            bytes_to_read: crate::DEFAULT_BYTES_TO_READ,
            representation: Representation::default(),
            description: "Pre-patched instructions for runtime relocation".to_string(),
        }
    }
}

/// Process every candidate address and accumulate the relocation map.
///
/// Per-address failures never abort the batch; each candidate ends in exactly
/// one [`Outcome`] and the counters are derived from that sequence. A summary
/// of counts per outcome is logged at the end of every run.
pub fn run(
    image: &[u8],
    candidates: &[Address],
    decoder: &dyn Decoder,
    config: &RunConfig,
) -> RunResult {
    let mut mapping = RelocMap::new();
    let mut stats = RunStats::default();

    for (index, &addr) in candidates.iter().enumerate() {
        if index % 100 == 0 && index > 0 {
            info!("Progress: {}/{} addresses processed", index, candidates.len());
        }

        let outcome = process_one(image, addr, decoder, config, &mut mapping);
        stats.record(outcome);
    }

    info!("=== Run summary ===");
    info!("Total addresses: {}", stats.total);
    info!("Described: {}", stats.described);
    info!("Out of range: {}", stats.out_of_range);
    info!("Decode failures: {}", stats.decode_failed);
    info!("Decoder errors: {}", stats.decode_errors);
    match stats.success_rate() {
        Some(rate) => info!("Success rate: {:.2}%", rate * 100.0),
        None => info!("Success rate: N/A"),
    }

    RunResult {
        metadata: RunMetadata {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            memory_base: config.memory_base,
            image_base: config.image_base,
            total_instructions: stats.described,
            description: config.description.clone(),
        },
        instructions: mapping,
        stats,
    }
}

/// Run one candidate address to its terminal outcome.
fn process_one(
    image: &[u8],
    addr: Address,
    decoder: &dyn Decoder,
    config: &RunConfig,
    mapping: &mut RelocMap,
) -> Outcome {
    // Bounds check comes first: an out-of-range candidate never reaches the
    // decoder.
    let offset = i64::from(addr) - i64::from(config.image_base);
    if offset < 0 || offset as u64 + config.bytes_to_read as u64 > image.len() as u64 {
        debug!("Address out of range: 0x{:08X} (offset: {})", addr, offset);
        return Outcome::OutOfRange;
    }

    let start = offset as usize;
    let window = &image[start..start + config.bytes_to_read];
    debug!("Decoding at 0x{:08X}, offset: {}", addr, start);

    match decoder.decode_one(window, addr) {
        Ok(Some(insn)) => {
            let (key, descriptor) = describe::build(
                &insn,
                config.memory_base,
                config.max_range,
                config.representation,
            );
            debug!("Described {}: {:?}", key, descriptor);
            mapping.insert(key, descriptor);
            Outcome::Described
        }
        Ok(None) => {
            debug!("Decode failed at 0x{:08X}", addr);
            Outcome::DecodeFailed
        }
        Err(err) => {
            error!("Decoder error at 0x{:08X}: {}", addr, err);
            Outcome::DecodeError
        }
    }
}
