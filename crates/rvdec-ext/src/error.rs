//! Extension-manager errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("{0} does not contain instruction-definition JSONs")]
    InvalidJsonDirectory(String),
    #[error("required JSON key {0} is missing")]
    MissingRequiredKey(String),
    #[error("meta-extensions should not contain the {0} key")]
    MetaExtensionUnexpectedKey(String),
    #[error("invalid ISA string {isa}: {reason}")]
    InvalidIsaString { isa: String, reason: String },
    #[error("extension {0} has a duplicate definition")]
    DuplicateExtension(String),
    #[error("unknown extension for xlen={xlen}: {ext}")]
    UnknownExtension { xlen: u32, ext: String },
    #[error("{ext} is not a valid base extension")]
    InvalidBaseExtension { ext: String },
    #[error("{ext} extension requires {required} to also be present in the ISA string")]
    MissingRequiredExtension { ext: String, required: String },
    #[error("{ext} extension conflicts with {conflict}")]
    ConflictingExtension { ext: String, conflict: String },
    #[error("circular dependency detected involving extension {0}")]
    CircularDependency(String),
    #[error("extension {0} has a dependency on itself")]
    SelfReferential(String),
    #[error("unresolved dependency {dependency} for extension {ext}")]
    UnresolvedDependency { ext: String, dependency: String },
    #[error("extension {0} is not allowed by the configured allow/block lists")]
    ExtensionNotAllowed(String),
    #[error("cannot read extension spec {path}: {reason}")]
    BadSpecFile { path: String, reason: String },
    #[error("could not find a RISC-V ISA string in {0}")]
    IsaNotFoundInElf(String),
    #[error(transparent)]
    Elf(#[from] rvdec_elf::ElfError),
    #[error(transparent)]
    Decode(#[from] rvdec_isa::DecodeError),
}

pub type Result<T> = std::result::Result<T, ExtensionError>;
