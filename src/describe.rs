//! Relocation-descriptor builder.
//!
//! Combines one decoded instruction with scanner output to produce the
//! descriptor in the selected representation.

use std::fmt;

use clap::ValueEnum;

use crate::scanner::{self, ByteMatch};
use crate::{Address, Insn, RelocationDescriptor};

/// Available descriptor representations.
#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq)]
pub enum Representation {
    /// Masked instruction bytes plus the primary offset
    Bytes,
    /// Mnemonic and operand text with substituted literals
    Text,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Bytes => write!(f, "byte-masked"),
            Representation::Text => write!(f, "text-substituted"),
        }
    }
}

impl Representation {
    /// Return all available representations
    pub fn all() -> &'static [Representation] {
        &[Representation::Bytes, Representation::Text]
    }

    /// Return the default representation
    pub fn default() -> Self {
        Representation::Bytes
    }
}

/// Build the descriptor for one decoded instruction.
///
/// The key is derived from the decoder-reported address, which is
/// authoritative over the originally requested candidate address.
pub fn build(
    insn: &Insn,
    memory_base: Address,
    max_range: u32,
    representation: Representation,
) -> (String, RelocationDescriptor) {
    let key = address_key(insn.addr);

    let descriptor = match representation {
        Representation::Bytes => {
            let matches = scanner::bytes::scan(insn.bytes(), memory_base, max_range);
            let bytes = masked_bytes(insn.bytes(), &matches);
            let offset = format_offset(
                matches
                    .first()
                    .map(|m| m.signed_offset)
                    .unwrap_or_default(),
            );
            RelocationDescriptor::ByteMasked { bytes, offset }
        }
        Representation::Text => {
            let substituted = scanner::text::substitute(&insn.operands, memory_base, max_range);
            RelocationDescriptor::TextSubstituted(format!("{} {}", insn.mnemonic, substituted))
        }
    };

    (key, descriptor)
}

/// Format an address as the external map key: 8-digit uppercase hex
pub fn address_key(addr: Address) -> String {
    format!("0x{:08X}", addr)
}

/// Format a signed offset as hex with an explicit sign for negative values
pub fn format_offset(offset: i64) -> String {
    if offset >= 0 {
        format!("0x{:X}", offset)
    } else {
        format!("-0x{:X}", -offset)
    }
}

/// Render instruction bytes as uppercase hex groups, masking every byte that
/// falls inside the union of the matches' 4-byte spans.
fn masked_bytes(raw: &[u8], matches: &[ByteMatch]) -> String {
    let mut masked = vec![false; raw.len()];
    for m in matches {
        for flag in masked.iter_mut().skip(m.byte_offset).take(4) {
            *flag = true;
        }
    }

    raw.iter()
        .zip(masked)
        .map(|(b, is_masked)| {
            if is_masked {
                "XX".to_string()
            } else {
                format!("{:02X}", b)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_INSTRUCTION_SIZE;
    use rstest::rstest;

    const BASE: Address = 0x01CF_4064;
    const RANGE: u32 = 0x10000;

    fn insn(addr: Address, raw: &[u8], mnemonic: &str, operands: &str) -> Insn {
        let mut bytes = [0u8; MAX_INSTRUCTION_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);
        Insn {
            addr,
            size: raw.len() as u8,
            mnemonic: mnemonic.to_string(),
            operands: operands.to_string(),
            bytes,
        }
    }

    #[rstest]
    #[case(0, "0x0")]
    #[case(0x2A, "0x2A")]
    #[case(-1, "-0x1")]
    #[case(-0x10, "-0x10")]
    #[case(0x10000, "0x10000")]
    fn test_format_offset(#[case] offset: i64, #[case] expected: &str) {
        assert_eq!(format_offset(offset), expected);
    }

    #[test]
    fn test_address_key_is_eight_digit_uppercase() {
        assert_eq!(address_key(0x48D774), "0x0048D774");
        assert_eq!(address_key(0xFFFF_FFFF), "0xFFFFFFFF");
    }

    #[test]
    fn test_byte_masked_end_to_end() {
        // lea eax, [esi + 0x1cf4064]
        let insn = insn(
            0x0048D774,
            &[0x8D, 0x86, 0x64, 0x40, 0xCF, 0x01],
            "lea",
            "eax, [esi + 0x1cf4064]",
        );

        let (key, descriptor) = build(&insn, BASE, RANGE, Representation::Bytes);
        assert_eq!(key, "0x0048D774");
        assert_eq!(
            descriptor,
            RelocationDescriptor::ByteMasked {
                bytes: "8D 86 XX XX XX XX".to_string(),
                offset: "0x0".to_string(),
            }
        );
    }

    #[test]
    fn test_byte_masked_without_matches() {
        // mov eax, 1: immediate far from the memory base
        let insn = insn(0x00401000, &[0xB8, 0x01, 0x00, 0x00, 0x00], "mov", "eax, 1");

        let (_, descriptor) = build(&insn, BASE, RANGE, Representation::Bytes);
        assert_eq!(
            descriptor,
            RelocationDescriptor::ByteMasked {
                bytes: "B8 01 00 00 00".to_string(),
                offset: "0x0".to_string(),
            }
        );
    }

    #[test]
    fn test_byte_masked_reports_first_offset_of_multiple_matches() {
        // Two disjoint in-range values inside one encoding
        let mut raw = Vec::new();
        raw.push(0x68); // push imm32
        raw.extend_from_slice(&(BASE + 0x2A).to_le_bytes());
        raw.push(0x90);
        raw.extend_from_slice(&(BASE - 0x10).to_le_bytes());

        let insn = insn(0x00401000, &raw, "push", "");
        let (_, descriptor) = build(&insn, BASE, RANGE, Representation::Bytes);

        match descriptor {
            RelocationDescriptor::ByteMasked { bytes, offset } => {
                assert_eq!(bytes, "68 XX XX XX XX 90 XX XX XX XX");
                assert_eq!(offset, "0x2A");
            }
            other => panic!("expected byte-masked descriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_byte_masked_unions_overlapping_spans() {
        let raw = [0x01, 0x01, 0x01, 0x01, 0x01];
        let insn = insn(0x00401000, &raw, "add", "");

        let (_, descriptor) = build(&insn, 0x0101_0101, RANGE, Representation::Bytes);
        match descriptor {
            RelocationDescriptor::ByteMasked { bytes, offset } => {
                assert_eq!(bytes, "XX XX XX XX XX");
                assert_eq!(offset, "0x0");
            }
            other => panic!("expected byte-masked descriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_text_substituted_end_to_end() {
        let insn = insn(
            0x0048D774,
            &[0x8D, 0x86, 0x8E, 0x40, 0xCF, 0x01],
            "lea",
            "eax, [esi + 0x1cf408e]",
        );

        let (key, descriptor) = build(&insn, BASE, RANGE, Representation::Text);
        assert_eq!(key, "0x0048D774");
        assert_eq!(
            descriptor,
            RelocationDescriptor::TextSubstituted(
                "lea eax, [esi + <memory_base>+0x2A]".to_string()
            )
        );
    }

    #[test]
    fn test_text_substituted_keeps_trailing_space_for_empty_operands() {
        let insn = insn(0x00401000, &[0xC3], "ret", "");

        let (_, descriptor) = build(&insn, BASE, RANGE, Representation::Text);
        assert_eq!(
            descriptor,
            RelocationDescriptor::TextSubstituted("ret ".to_string())
        );
    }
}
