//! Text-level reference scanner.
//!
//! Rewrites hexadecimal literals in decoded operand text when they fall
//! within range of the memory base. The replacement token carries the signed
//! offset so the runtime patcher can rebuild the literal against a different
//! base.

use crate::Address;

/// Placeholder token substituted for an in-range hexadecimal literal
pub const PLACEHOLDER: &str = "<memory_base>";

/// Replace every in-range hexadecimal literal in `operands` with the
/// placeholder token and its signed hex offset.
///
/// Literals are maximal `0x`-prefixed runs of hex digits, scanned left to
/// right without overlap. Literals that are out of range or fail to parse
/// are left unchanged, byte for byte.
pub fn substitute(operands: &str, memory_base: Address, max_range: u32) -> String {
    let mut out = String::with_capacity(operands.len());
    let mut rest = operands;

    while let Some(pos) = rest.find("0x") {
        let (before, tail) = rest.split_at(pos);
        out.push_str(before);

        // Hex digits are single-byte, so the char count is a byte count
        let digit_count = tail[2..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .count();
        if digit_count == 0 {
            out.push_str("0x");
            rest = &tail[2..];
            continue;
        }

        let (literal, remainder) = tail.split_at(2 + digit_count);
        match u64::from_str_radix(&literal[2..], 16) {
            Ok(value) if value.abs_diff(u64::from(memory_base)) <= u64::from(max_range) => {
                let offset = value as i64 - i64::from(memory_base);
                if offset >= 0 {
                    out.push_str(&format!("{}+0x{:X}", PLACEHOLDER, offset));
                } else {
                    out.push_str(&format!("{}-0x{:X}", PLACEHOLDER, -offset));
                }
            }
            _ => out.push_str(literal),
        }
        rest = remainder;
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BASE: Address = 0x01CF_4064;
    const RANGE: u32 = 0x10000;

    #[rstest]
    #[case("[0x1CF408E]", "[<memory_base>+0x2A]")]
    #[case("eax, [esi + 0x1cf4064]", "eax, [esi + <memory_base>+0x0]")]
    #[case("dword ptr [0x1cf4054]", "dword ptr [<memory_base>-0x10]")]
    #[case("dword ptr [0x1cf4063]", "dword ptr [<memory_base>-0x1]")]
    fn test_in_range_literals_are_replaced(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute(input, BASE, RANGE), expected);
    }

    #[rstest]
    #[case("dword ptr [0x401000]")]
    #[case("eax, 0x2a")]
    #[case("eax, [ebx + 0xffffffff]")]
    fn test_out_of_range_literals_are_unchanged(#[case] input: &str) {
        assert_eq!(substitute(input, BASE, RANGE), input);
    }

    #[test]
    fn test_multiple_literals_replaced_left_to_right() {
        let input = "0x1cf4064, [edi + 0x1cf408e]";
        assert_eq!(
            substitute(input, BASE, RANGE),
            "<memory_base>+0x0, [edi + <memory_base>+0x2A]"
        );
    }

    #[test]
    fn test_mixed_range_literals() {
        let input = "dword ptr [0x401000], 0x1cf408e";
        assert_eq!(
            substitute(input, BASE, RANGE),
            "dword ptr [0x401000], <memory_base>+0x2A"
        );
    }

    #[test]
    fn test_prefix_without_digits_is_unchanged() {
        assert_eq!(substitute("0x", BASE, RANGE), "0x");
        assert_eq!(substitute("mov eax, 0xzz", BASE, RANGE), "mov eax, 0xzz");
    }

    #[test]
    fn test_unparseable_literal_is_unchanged() {
        // Too wide for a 64-bit parse
        let input = "0xFFFFFFFFFFFFFFFFFF";
        assert_eq!(substitute(input, BASE, RANGE), input);
    }

    #[test]
    fn test_empty_and_plain_text() {
        assert_eq!(substitute("", BASE, RANGE), "");
        assert_eq!(substitute("eax, ebx", BASE, RANGE), "eax, ebx");
    }
}
