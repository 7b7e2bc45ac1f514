//! Output format module implementation

mod json;
mod toml;

pub use self::json::*;
pub use self::toml::*;

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::{RelocationError, RunResult};

/// Supported output formats for the relocation map
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// TOML document (default; consumed by the runtime patcher)
    Toml,
    /// JSON document
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Toml => write!(f, "toml"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" => Ok(OutputFormat::Toml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get the default output format
    pub fn default() -> Self {
        OutputFormat::Toml
    }

    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[OutputFormat::Toml, OutputFormat::Json]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn RunFormatter> {
        match self {
            OutputFormat::Toml => Box::new(TomlFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
        }
    }
}

/// Formatter trait for relocation-map output
pub trait RunFormatter {
    /// Render a run result to its persisted representation
    fn format(&self, result: &RunResult) -> Result<String, RelocationError>;
}

/// Format the relocation map as a TOML document
pub struct TomlFormatter;

/// Format the relocation map as a JSON document
pub struct JsonFormatter;
