//! Goblin-based image probe.
//!
//! The probe is advisory: the configured image base stays authoritative, but
//! when the binary parses as PE or ELF the driver can warn about a mismatch
//! between the configuration and what the headers say.

use goblin::{elf, pe, Object};
use log::debug;

use crate::{Address, Architecture, RelocationError};

/// What the binary's headers report about the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image base from the headers, if the format carries one
    pub image_base: Option<Address>,
    /// Machine architecture, if recognized
    pub architecture: Option<Architecture>,
}

/// A probe that handles PE and ELF via Goblin.
#[derive(Debug, Default)]
pub struct GoblinParser;

impl GoblinParser {
    /// Construct a new GoblinParser.
    pub fn new() -> Self {
        GoblinParser
    }

    /// Probe an image for its header-reported base and architecture.
    ///
    /// Unrecognized formats are not an error; they yield an empty
    /// [`ImageInfo`].
    pub fn parse(&self, data: &[u8]) -> Result<ImageInfo, RelocationError> {
        match Object::parse(data) {
            Ok(Object::PE(pe)) => Ok(Self::parse_pe(&pe)),
            Ok(Object::Elf(elf)) => Ok(Self::parse_elf(&elf)),
            Ok(_) => {
                debug!("Image format not recognized, probe is empty");
                Ok(ImageInfo::default())
            }
            Err(err) => Err(RelocationError::ParsingError(err.to_string())),
        }
    }

    /// Probe a PE image.
    fn parse_pe(pe: &pe::PE<'_>) -> ImageInfo {
        let architecture = match pe.header.coff_header.machine {
            pe::header::COFF_MACHINE_X86 => Some(Architecture::X86_32),
            pe::header::COFF_MACHINE_X86_64 => Some(Architecture::X86_64),
            _ => None,
        };

        ImageInfo {
            image_base: u32::try_from(pe.image_base).ok(),
            architecture,
        }
    }

    /// Probe an ELF image.
    fn parse_elf(elf: &elf::Elf<'_>) -> ImageInfo {
        let architecture = match elf.header.e_machine {
            elf::header::EM_386 => Some(Architecture::X86_32),
            elf::header::EM_X86_64 => Some(Architecture::X86_64),
            _ => None,
        };

        // The lowest loadable segment address plays the role of the PE image
        // base.
        let image_base = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == elf::program_header::PT_LOAD)
            .map(|ph| ph.p_vaddr)
            .min()
            .and_then(|vaddr| u32::try_from(vaddr).ok());

        ImageInfo {
            image_base,
            architecture,
        }
    }
}
