//! ISA-string extraction from `.riscv.attributes`.

use std::path::PathBuf;

use rvdec_ext::{ExtensionError, RiscvExtensionManager};

fn json_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../json")
}

fn spec_path() -> PathBuf {
    json_dir().join("riscv_isa_spec.json")
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Build the `.riscv.attributes` payload carrying one ISA string.
fn attributes_section(isa: &str) -> Vec<u8> {
    // Pairs: Tag_stack_align (4, ULEB) then Tag_RISCV_arch (5, NTBS).
    let mut pairs = vec![0x04, 16];
    pairs.push(0x05);
    pairs.extend_from_slice(isa.as_bytes());
    pairs.push(0);

    // Sub-sub-section: Tag_file, u32 length (tag + length + pairs).
    let mut sub_sub = vec![0x01];
    push_u32(&mut sub_sub, (1 + 4 + pairs.len()) as u32);
    sub_sub.extend_from_slice(&pairs);

    // Sub-section: u32 length, vendor NTBS, sub-sub-sections.
    let vendor = b"riscv\0";
    let mut sub = Vec::new();
    push_u32(&mut sub, (4 + vendor.len() + sub_sub.len()) as u32);
    sub.extend_from_slice(vendor);
    sub.extend_from_slice(&sub_sub);

    let mut section = vec![b'A'];
    section.extend_from_slice(&sub);
    section
}

fn section_header(
    out: &mut Vec<u8>,
    name: u32,
    sh_type: u32,
    offset: u64,
    size: u64,
) {
    push_u32(out, name);
    push_u32(out, sh_type);
    push_u64(out, 0); // flags
    push_u64(out, 0); // addr
    push_u64(out, offset);
    push_u64(out, size);
    push_u32(out, 0); // link
    push_u32(out, 0); // info
    push_u64(out, 0); // addralign
    push_u64(out, 0); // entsize
}

/// Synthesize a minimal ELF64 with (optionally) a `.riscv.attributes`
/// section.
fn build_elf(isa: Option<&str>) -> Vec<u8> {
    const SHT_RISCV_ATTRIBUTES: u32 = 0x7000_0003;
    const SHT_STRTAB: u32 = 3;

    let attrs = isa.map(attributes_section).unwrap_or_default();
    let shstrtab = b"\0.riscv.attributes\0.shstrtab\0";

    let attrs_offset = 64u64;
    let shstrtab_offset = attrs_offset + attrs.len() as u64;
    let shoff = shstrtab_offset + shstrtab.len() as u64;

    let mut elf = Vec::new();
    // ELF header
    elf.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    elf.extend_from_slice(&[0; 8]);
    elf.extend_from_slice(&2u16.to_le_bytes()); // e_type
    elf.extend_from_slice(&243u16.to_le_bytes()); // e_machine: RISC-V
    push_u32(&mut elf, 1); // e_version
    push_u64(&mut elf, 0); // e_entry
    push_u64(&mut elf, 0); // e_phoff
    push_u64(&mut elf, shoff);
    push_u32(&mut elf, 0); // e_flags
    elf.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
    elf.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
    elf.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
    elf.extend_from_slice(&3u16.to_le_bytes()); // e_shnum
    elf.extend_from_slice(&2u16.to_le_bytes()); // e_shstrndx

    assert_eq!(elf.len(), 64);
    elf.extend_from_slice(&attrs);
    elf.extend_from_slice(shstrtab);

    section_header(&mut elf, 0, 0, 0, 0);
    section_header(
        &mut elf,
        1,
        if isa.is_some() { SHT_RISCV_ATTRIBUTES } else { SHT_STRTAB },
        attrs_offset,
        attrs.len() as u64,
    );
    section_header(
        &mut elf,
        19,
        SHT_STRTAB,
        shstrtab_offset,
        shstrtab.len() as u64,
    );
    elf
}

#[test]
fn test_isa_string_extraction() {
    let elf = rvdec_elf::ElfFile::parse(build_elf(Some("rv64imac"))).unwrap();
    let isa = rvdec_elf::find_isa_string(&elf).unwrap();
    assert_eq!(isa.as_deref(), Some("rv64imac"));
}

#[test]
fn test_from_elf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.elf");
    std::fs::write(&path, build_elf(Some("rv64imc"))).unwrap();

    let manager = RiscvExtensionManager::from_elf(&path, &spec_path(), &json_dir()).unwrap();
    assert_eq!(manager.xlen(), 64);
    assert_eq!(manager.isa(), "rv64imc");
    for ext in ["i", "m", "c"] {
        assert!(manager.is_enabled(ext), "{ext}");
    }
    assert!(!manager.is_enabled("d"));
}

#[test]
fn test_isa_not_found_in_elf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.elf");
    std::fs::write(&path, build_elf(None)).unwrap();

    let err = RiscvExtensionManager::from_elf(&path, &spec_path(), &json_dir()).unwrap_err();
    assert!(matches!(err, ExtensionError::IsaNotFoundInElf(_)));
}

#[test]
fn test_elf_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nothere.elf");
    let err = RiscvExtensionManager::from_elf(&path, &spec_path(), &json_dir()).unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::Elf(rvdec_elf::ElfError::NotFound { .. })
    ));
}
