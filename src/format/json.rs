//! JSON output formatter

use serde_json::json;

use crate::{RelocationError, RunResult};

use super::RunFormatter;

impl RunFormatter for super::JsonFormatter {
    fn format(&self, result: &RunResult) -> Result<String, RelocationError> {
        let doc = json!({
            "metadata": {
                "tool_version": result.metadata.tool_version,
                "memory_base": format!("0x{:08X}", result.metadata.memory_base),
                "image_base": format!("0x{:08X}", result.metadata.image_base),
                "total_instructions": result.metadata.total_instructions,
                "description": result.metadata.description,
            },
            "instructions": result.instructions,
        });

        serde_json::to_string_pretty(&doc)
            .map_err(|e| RelocationError::Generic(format!("JSON serialization error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{OutputFormat, RunFormatter};
    use crate::driver::RunStats;
    use crate::{RelocMap, RelocationDescriptor, RunMetadata, RunResult};

    fn sample_result() -> RunResult {
        let mut instructions = RelocMap::new();
        instructions.insert(
            "0x0048D774".to_string(),
            RelocationDescriptor::ByteMasked {
                bytes: "8D 86 XX XX XX XX".to_string(),
                offset: "0x2A".to_string(),
            },
        );
        instructions.insert(
            "0x0048D8A4".to_string(),
            RelocationDescriptor::TextSubstituted(
                "lea eax, [esi + <memory_base>+0x2A]".to_string(),
            ),
        );

        RunResult {
            metadata: RunMetadata {
                tool_version: "0.1.0".to_string(),
                memory_base: 0x01CF_4064,
                image_base: 0x0040_0000,
                total_instructions: 2,
                description: "Pre-patched instructions for runtime relocation".to_string(),
            },
            instructions,
            stats: RunStats::default(),
        }
    }

    #[test]
    fn test_json_structure() {
        let formatter = OutputFormat::Json.get_formatter();
        let output = formatter.format(&sample_result()).unwrap();

        let doc: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            doc["metadata"]["memory_base"].as_str(),
            Some("0x01CF4064")
        );
        assert_eq!(doc["metadata"]["total_instructions"].as_u64(), Some(2));
        assert_eq!(
            doc["instructions"]["0x0048D774"]["bytes"].as_str(),
            Some("8D 86 XX XX XX XX")
        );
        assert_eq!(
            doc["instructions"]["0x0048D8A4"].as_str(),
            Some("lea eax, [esi + <memory_base>+0x2A]")
        );
    }
}
