//! Capstone-based instruction decoder.

use std::fmt;

use capstone::arch::x86::ArchMode as X86Mode;
use capstone::prelude::BuildsCapstone;
use capstone::Capstone;

use crate::{Address, Architecture, Decoder, Insn, RelocationError, MAX_INSTRUCTION_SIZE};

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// Capstone error
    #[error("Capstone error: {0}")]
    CapstoneError(#[from] capstone::Error),

    /// Unsupported architecture
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(Architecture),
}

/// A Capstone-based decoder for the supported x86 modes.
#[derive(Debug)]
pub enum CapstoneDecoder {
    X86_32(Capstone),
    X86_64(Capstone),
}

// SAFETY: Capstone's C-API handle is thread-safe as long as no two threads
// disassemble on the *same* handle concurrently; this decoder is used by a
// single consumer.
unsafe impl Send for CapstoneDecoder {}
unsafe impl Sync for CapstoneDecoder {}

impl CapstoneDecoder {
    /// Create a decoder for a specific architecture
    pub fn for_architecture(arch: Architecture) -> Result<Self, DecoderError> {
        match arch {
            Architecture::X86_32 => Ok(CapstoneDecoder::X86_32(Self::build_x86_32()?)),
            Architecture::X86_64 => Ok(CapstoneDecoder::X86_64(Self::build_x86_64()?)),
        }
    }

    /// Build an x86 32-bit decoder
    pub fn build_x86_32() -> Result<Capstone, DecoderError> {
        Ok(Capstone::new()
            .x86()
            .mode(X86Mode::Mode32)
            .detail(false)
            .build()?)
    }

    /// Build an x86 64-bit decoder
    pub fn build_x86_64() -> Result<Capstone, DecoderError> {
        Ok(Capstone::new()
            .x86()
            .mode(X86Mode::Mode64)
            .detail(false)
            .build()?)
    }

    /// Get the architecture of this decoder
    pub fn architecture(&self) -> Architecture {
        match self {
            CapstoneDecoder::X86_32(_) => Architecture::X86_32,
            CapstoneDecoder::X86_64(_) => Architecture::X86_64,
        }
    }

    fn capstone(&self) -> &Capstone {
        match self {
            CapstoneDecoder::X86_32(cs) => cs,
            CapstoneDecoder::X86_64(cs) => cs,
        }
    }
}

impl fmt::Display for CapstoneDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapstoneDecoder::{}", self.architecture())
    }
}

impl Decoder for CapstoneDecoder {
    fn decode_one(&self, window: &[u8], at: Address) -> Result<Option<Insn>, RelocationError> {
        let insns = self
            .capstone()
            .disasm_count(window, u64::from(at), 1)
            .map_err(DecoderError::CapstoneError)?;

        let Some(i) = insns.iter().next() else {
            return Ok(None);
        };

        // Copy up to MAX_INSTRUCTION_SIZE bytes of encoding
        let mut bytes = [0u8; MAX_INSTRUCTION_SIZE];
        for (j, b) in i.bytes().iter().enumerate().take(MAX_INSTRUCTION_SIZE) {
            bytes[j] = *b;
        }

        Ok(Some(Insn {
            addr: i.address() as Address,
            size: i.bytes().len() as u8,
            mnemonic: i.mnemonic().unwrap_or("").to_string(),
            operands: i.op_str().unwrap_or("").to_string(),
            bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_mapping() {
        let decoder = CapstoneDecoder::for_architecture(Architecture::X86_64).unwrap();
        assert_eq!(decoder.architecture(), Architecture::X86_64);
    }

    #[test]
    fn test_x86_decode() {
        // mov eax, 1
        let bytes = [0xb8, 0x01, 0x00, 0x00, 0x00];
        let decoder = CapstoneDecoder::for_architecture(Architecture::X86_32).unwrap();

        let insn = decoder.decode_one(&bytes, 0x1000).unwrap().unwrap();
        assert_eq!(insn.mnemonic, "mov");
        assert_eq!(insn.size, 5);
        assert_eq!(insn.addr, 0x1000);
        assert_eq!(insn.bytes(), &bytes);
    }

    #[test]
    fn test_decode_truncates_to_instruction_length() {
        // lea eax, [esi + 0x1cf4064] followed by padding that belongs to the
        // next instruction
        let window = [
            0x8D, 0x86, 0x64, 0x40, 0xCF, 0x01, 0x90, 0x90, 0x90, 0x90, 0x90, 0x90, 0x90, 0x90,
            0x90,
        ];
        let decoder = CapstoneDecoder::for_architecture(Architecture::X86_32).unwrap();

        let insn = decoder.decode_one(&window, 0x0048D774).unwrap().unwrap();
        assert_eq!(insn.mnemonic, "lea");
        assert_eq!(insn.size, 6);
        assert_eq!(insn.bytes(), &window[..6]);
        assert!(insn.operands.contains("esi"));
        assert!(insn.operands.contains("0x1cf4064"));
    }

    #[test]
    fn test_decode_failure_on_invalid_bytes() {
        // 0xff 0xff is not a valid x86-32 instruction
        let window = [0xff, 0xff];
        let decoder = CapstoneDecoder::for_architecture(Architecture::X86_32).unwrap();

        assert!(decoder.decode_one(&window, 0x1000).unwrap().is_none());
    }

    #[test]
    fn test_decode_failure_on_empty_window() {
        let decoder = CapstoneDecoder::for_architecture(Architecture::X86_32).unwrap();
        assert!(decoder.decode_one(&[], 0x1000).unwrap().is_none());
    }
}
