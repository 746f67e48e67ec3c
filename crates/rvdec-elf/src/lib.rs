//! Minimal ELF reader for RISC-V binaries.
//!
//! Parses just enough of an ELF image (header, section headers, section
//! name table) to locate the `.riscv.attributes` section and extract the
//! embedded ISA string from it.

mod attributes;
mod constants;
mod file;

pub use attributes::*;
pub use constants::*;
pub use file::*;

use thiserror::Error;

/// ELF parsing errors.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("could not read ELF file {path}: {source}")]
    NotFound {
        path: String,
        source: std::io::Error,
    },
    #[error("ELF data too small")]
    TooSmall,
    #[error("Invalid ELF magic number")]
    InvalidMagic,
    #[error("Only little-endian ELF supported")]
    NotLittleEndian,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Section header out of bounds")]
    SectionOutOfBounds,
    #[error("Malformed .riscv.attributes section")]
    MalformedAttributes,
}

pub type Result<T> = std::result::Result<T, ElfError>;
