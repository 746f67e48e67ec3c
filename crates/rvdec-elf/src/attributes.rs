//! `.riscv.attributes` section walker.
//!
//! The section starts with an `'A'` byte followed by vendor sub-sections.
//! Each sub-section is `[u32 length][vendor NTBS][sub-sub-sections...]`;
//! each sub-sub-section is `[ULEB128 tag][u32 length][attribute pairs...]`
//! where a pair is a ULEB128 tag followed by either a ULEB128 integer
//! (even tag) or a null-terminated string (odd tag).

use crate::constants::{SHT_RISCV_ATTRIBUTES, TAG_FILE, TAG_RISCV_ARCH};
use crate::{ElfError, ElfFile, Result};

const RISCV_ATTRIBUTES_SECTION: &str = ".riscv.attributes";
const RISCV_VENDOR: &[u8] = b"riscv\0";

/// Decode a ULEB128 value starting at `pos`.
///
/// Returns the value and the position of the first byte after it. Bits
/// past the 64th are discarded; attribute tags never get near that.
pub fn read_uleb128(data: &[u8], pos: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut pos = pos;
    loop {
        let byte = *data.get(pos).ok_or(ElfError::MalformedAttributes)?;
        if shift < 64 {
            result |= u64::from(byte & 0x7f) << shift;
        }
        pos += 1;
        if byte & 0x80 == 0 {
            return Ok((result, pos));
        }
        shift += 7;
    }
}

fn read_le32(data: &[u8], pos: usize) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(pos..pos + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(ElfError::MalformedAttributes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_ntbs(data: &[u8], pos: usize) -> Result<&[u8]> {
    let rest = data.get(pos..).ok_or(ElfError::MalformedAttributes)?;
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(ElfError::MalformedAttributes)?;
    Ok(&rest[..len])
}

/// Extract the `Tag_RISCV_arch` ISA string from an ELF image.
///
/// Returns `None` when the ELF has no usable `.riscv.attributes` section
/// or the section carries no ISA string.
pub fn find_isa_string(elf: &ElfFile) -> Result<Option<String>> {
    let has_section = elf
        .sections
        .iter()
        .any(|s| s.name == RISCV_ATTRIBUTES_SECTION && s.sh_type == SHT_RISCV_ATTRIBUTES);
    if !has_section {
        return Ok(None);
    }
    let Some(data) = elf.section_data(RISCV_ATTRIBUTES_SECTION) else {
        return Ok(None);
    };
    if data.first() != Some(&b'A') {
        return Ok(None);
    }

    let mut sub_sec = 1usize;
    while sub_sec < data.len() {
        let sub_sec_len = read_le32(data, sub_sec)? as usize;
        if sub_sec_len == 0 {
            return Err(ElfError::MalformedAttributes);
        }
        let vendor_start = sub_sec + 4;

        if data.get(vendor_start..vendor_start + RISCV_VENDOR.len()) == Some(RISCV_VENDOR) {
            let mut sub_sub = vendor_start + RISCV_VENDOR.len();
            let sub_sec_end = (sub_sec + sub_sec_len).min(data.len());

            while sub_sub < sub_sec_end {
                let (tag, after_tag) = read_uleb128(data, sub_sub)?;
                let sub_sub_len = read_le32(data, after_tag)? as usize;
                if sub_sub_len == 0 {
                    return Err(ElfError::MalformedAttributes);
                }

                if tag == TAG_FILE {
                    let sub_sub_end = (sub_sub + sub_sub_len).min(data.len());
                    let mut pos = after_tag + 4;
                    while pos < sub_sub_end {
                        let (attr, after) = read_uleb128(data, pos)?;
                        if attr == TAG_RISCV_ARCH {
                            let isa = read_ntbs(data, after)?;
                            return Ok(Some(
                                isa.iter().map(|&b| b as char).collect::<String>(),
                            ));
                        } else if attr & 1 == 1 {
                            pos = after + read_ntbs(data, after)?.len() + 1;
                        } else {
                            let (_, next) = read_uleb128(data, after)?;
                            pos = next;
                        }
                    }
                }
                sub_sub += sub_sub_len;
            }
        }
        sub_sec += sub_sec_len;
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uleb128_single_byte() {
        assert_eq!(read_uleb128(&[0x05], 0).unwrap(), (5, 1));
        assert_eq!(read_uleb128(&[0x7f], 0).unwrap(), (127, 1));
    }

    #[test]
    fn test_uleb128_multi_byte() {
        // 624485 from the LEB128 reference example
        assert_eq!(read_uleb128(&[0xe5, 0x8e, 0x26], 0).unwrap(), (624_485, 3));
    }

    #[test]
    fn test_uleb128_truncated() {
        assert!(read_uleb128(&[0x80], 0).is_err());
    }
}
