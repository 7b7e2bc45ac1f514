//! TOML output formatter.
//!
//! The document layout (inline tables under `[instructions]`) is what the
//! runtime patcher consumes, so it is rendered by hand rather than through a
//! generic serializer.

use crate::{RelocationDescriptor, RelocationError, RunResult};

use super::RunFormatter;

impl RunFormatter for super::TomlFormatter {
    fn format(&self, result: &RunResult) -> Result<String, RelocationError> {
        let mut output = String::new();

        output.push_str("[metadata]\n");
        output.push_str(&format!(
            "tool_version = \"{}\"\n",
            escape_toml_string(&result.metadata.tool_version)
        ));
        output.push_str(&format!(
            "memory_base = \"0x{:08X}\"\n",
            result.metadata.memory_base
        ));
        output.push_str(&format!(
            "image_base = \"0x{:08X}\"\n",
            result.metadata.image_base
        ));
        output.push_str(&format!(
            "total_instructions = {}\n",
            result.metadata.total_instructions
        ));
        output.push_str(&format!(
            "description = \"{}\"\n",
            escape_toml_string(&result.metadata.description)
        ));

        output.push_str("\n[instructions]\n");
        for (key, descriptor) in result.instructions.iter() {
            match descriptor {
                RelocationDescriptor::ByteMasked { bytes, offset } => {
                    output.push_str(&format!(
                        "\"{}\" = {{ bytes = \"{}\", offset = \"{}\" }}\n",
                        key, bytes, offset
                    ));
                }
                RelocationDescriptor::TextSubstituted(text) => {
                    output.push_str(&format!(
                        "\"{}\" = \"{}\"\n",
                        key,
                        escape_toml_string(text)
                    ));
                }
            }
        }

        Ok(output)
    }
}

/// Escape a string for a basic TOML string literal
fn escape_toml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
