//! ELF format constants.

/// ELF magic number (little-endian `\x7fELF`).
pub const ELF_MAGIC: u32 = 0x464c_457f;

/// EI_CLASS values.
pub const ELF_CLASS_32: u8 = 1;
pub const ELF_CLASS_64: u8 = 2;

/// EI_DATA little-endian marker.
pub const ELF_DATA_LSB: u8 = 1;

/// Section type of `.riscv.attributes`.
pub const SHT_RISCV_ATTRIBUTES: u32 = 0x7000_0003;

/// Attribute sub-sub-section tag covering the whole file.
pub const TAG_FILE: u64 = 1;

/// Attribute tag carrying the ISA string.
pub const TAG_RISCV_ARCH: u64 = 5;
