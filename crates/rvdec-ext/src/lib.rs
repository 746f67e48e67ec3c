//! RISC-V extension management.
//!
//! Resolves a RISC-V ISA string (given directly or read from an ELF's
//! `.riscv.attributes` section) against an extension-spec JSON into a
//! concrete set of enabled extensions, and packages their
//! instruction-definition JSONs into an [`rvdec::Decoder`].

mod error;
mod manager;
mod spec;

pub use error::*;
pub use manager::*;
pub use spec::*;
