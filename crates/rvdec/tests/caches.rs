//! Cache behaviour, direct/pseudo/trace construction, and build errors.

mod common;

use common::*;
use rvdec::{
    DecodeError, DecodedInst, Decoder, DirectInfo, DirectInfoBitMask, DirectInfoStores, MatchSet,
    PseudoInfo, TraceInfo,
};

#[test]
fn test_decode_idempotence() {
    let mut decoder = standard_decoder();
    let first = decoder.make_inst(0x0031_00b3).unwrap();
    let second = decoder.make_inst(0x0031_00b3).unwrap();
    assert_eq!(first.mnemonic(), second.mnemonic());
    assert_eq!(first.uid(), second.uid());
    assert_eq!(
        first.opinfo().source_regs().unwrap(),
        second.opinfo().source_regs().unwrap()
    );
    assert_eq!(first.opinfo().immediate(), second.opinfo().immediate());
}

#[test]
fn test_cache_transparency_across_flush() {
    let mut decoder = standard_decoder();
    for word in [0x0031_00b3u64, 0x0002_8593, 0x9c61, 0x5008_a0d7, 0x6013] {
        let before = decoder.make_inst(word).unwrap();
        decoder.flush_caches().unwrap();
        let after = decoder.make_inst(word).unwrap();
        assert_eq!(before.mnemonic(), after.mnemonic(), "{word:#x}");
        assert_eq!(before.uid(), after.uid());
        assert_eq!(before.opinfo().immediate(), after.opinfo().immediate());
        assert_eq!(
            before.opinfo().dest_regs().unwrap(),
            after.opinfo().dest_regs().unwrap()
        );
    }
}

#[test]
fn test_cached_prototype_stays_pristine() {
    let mut decoder = standard_decoder();
    // Populate the prototype cache, then mutate the returned copy.
    let mut inst = decoder.make_inst(0x8006).unwrap();
    let cmov = DirectInfo::new("cmov", vec![1, 2, 3], vec![4]);
    decoder.morph_inst(&mut inst, &cmov).unwrap();
    assert_eq!(inst.mnemonic(), "cmov");

    // The cache must still hand out the original decode.
    let fresh = decoder.make_inst(0x8006).unwrap();
    assert_eq!(fresh.mnemonic(), "c.mv");
}

#[test]
fn test_direct_info_by_mnemonic_and_uid() {
    let decoder = standard_decoder();
    let by_name = decoder
        .make_inst_directly(&DirectInfo::new("fcvt.l.d", vec![1], vec![4]))
        .unwrap();
    let by_uid = decoder
        .make_inst_directly(&DirectInfo::by_uid(
            decoder.lookup_inst_uid("fcvt.l.d").unwrap(),
            vec![1],
            vec![4],
        ))
        .unwrap();
    assert_eq!(by_name.mnemonic(), "fcvt.l.d");
    assert_eq!(by_name.uid(), by_uid.uid());
    assert_eq!(by_name.mnemonic(), by_uid.mnemonic());
    // fcvt.l.d reads a double and writes an integer
    assert_eq!(by_name.opinfo().float_source_regs().unwrap(), 0b10);
    assert_eq!(by_name.opinfo().int_dest_regs().unwrap(), 0b1_0000);
}

#[test]
fn test_direct_info_errors() {
    let decoder = standard_decoder();
    assert!(matches!(
        decoder.make_inst_directly(&DirectInfo::new("nothere", vec![1], vec![2])),
        Err(DecodeError::UnknownMnemonic(_))
    ));
    let bad_reg = DirectInfo::new("add", vec![99], vec![3]);
    let inst = decoder.make_inst_directly(&bad_reg).unwrap();
    assert!(matches!(
        inst.opinfo().source_regs(),
        Err(DecodeError::InvalidRegisterNumber { reg: 99, .. })
    ));
}

#[test]
fn test_direct_bitmask_and_stores() {
    let decoder = standard_decoder();
    let inst = decoder
        .make_inst_directly(&DirectInfoBitMask::new("add", 0b110, 0b1000))
        .unwrap();
    assert_eq!(inst.opinfo().source_regs().unwrap(), 0b110);
    assert_eq!(inst.opinfo().dest_regs().unwrap(), 0b1000);

    let store = decoder
        .make_inst_directly(&DirectInfoStores::new("sd", vec![1], vec![2]).with_immediate(8))
        .unwrap();
    assert_eq!(store.opinfo().source_address_regs().unwrap(), 0b10);
    assert_eq!(store.opinfo().source_data_regs().unwrap(), 0b100);
    assert_eq!(store.opinfo().immediate(), 8);
}

#[test]
fn test_pseudo_inst() {
    use rvdec::{OperandFieldId, OperandInfo, RegisterType};

    let decoder = standard_decoder();
    assert_eq!(decoder.lookup_pseudo_inst_uid("cmov").unwrap(), 2);
    assert_eq!(decoder.lookup_pseudo_inst_mnemonic(2).unwrap(), "cmov");

    let mut sources = OperandInfo::new();
    sources.add(OperandFieldId::Rs1, RegisterType::Long, 1, false);
    sources.add(OperandFieldId::Rs2, RegisterType::Long, 2, false);
    let mut dests = OperandInfo::new();
    dests.add(OperandFieldId::Rd, RegisterType::Long, 4, false);

    let inst = decoder
        .make_pseudo_inst(&PseudoInfo::new("cmov", sources, dests))
        .unwrap();
    assert_eq!(inst.mnemonic(), "cmov");
    assert_eq!(inst.opinfo().source_regs().unwrap(), 0b110);

    assert!(matches!(
        decoder.make_pseudo_inst(&PseudoInfo::new("add", OperandInfo::new(), OperandInfo::new())),
        Err(DecodeError::UnknownPseudoMnemonic(_))
    ));
}

struct TraceRecord {
    mnemonic: &'static str,
    opcode: u64,
}

impl TraceInfo for TraceRecord {
    fn mnemonic(&self) -> &str {
        self.mnemonic
    }
    fn opcode(&self) -> u64 {
        self.opcode
    }
    fn source_regs(&self) -> &[u64] {
        &[1, 2]
    }
    fn dest_regs(&self) -> &[u64] {
        &[3]
    }
    fn immediate(&self) -> u64 {
        0
    }
}

#[test]
fn test_trace_agreement_uses_decode() {
    let mut decoder = standard_decoder();
    let trace = TraceRecord {
        mnemonic: "add",
        opcode: 0x0031_00b3,
    };
    let inst = decoder.make_inst_from_trace(&trace).unwrap();
    assert_eq!(inst.mnemonic(), "add");
}

#[test]
fn test_trace_mnemonic_is_authoritative() {
    let mut decoder = standard_decoder();
    // The word decodes as add, but the trace says cmov; the trace wins.
    let trace = TraceRecord {
        mnemonic: "cmov",
        opcode: 0x0031_00b3,
    };
    let inst = decoder.make_inst_from_trace(&trace).unwrap();
    assert_eq!(inst.mnemonic(), "cmov");
    assert_eq!(inst.uid(), 2);
    assert_eq!(inst.opinfo().source_regs().unwrap(), 0b110);
}

#[test]
fn test_trace_unknown_mnemonic() {
    let mut decoder = standard_decoder();
    let trace = TraceRecord {
        mnemonic: "nothere",
        opcode: 0x0031_00b3,
    };
    assert!(matches!(
        decoder.make_inst_from_trace(&trace),
        Err(DecodeError::UnknownMnemonic(_))
    ));
}

#[test]
fn test_overlay_base_not_found() {
    // Excluding the "i" tag removes ori but keeps the prefetch overlays.
    let files = vec![json_path("isa_rv64i.json"), json_path("isa_rv64zicbop.json")];
    let exclusions = MatchSet::patterns(&["i".to_string()]).unwrap();
    let err = Decoder::<Alloc, UArch>::with_filters(
        &files,
        &anno_files(),
        &uid_list(),
        &Vec::new(),
        &MatchSet::default(),
        &exclusions,
        Alloc,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DecodeError::OverlayBaseNotFound { ref base, .. } if base == "ori"
    ));
}

#[test]
fn test_ambiguous_opcode_build_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.json");
    std::fs::write(
        &path,
        r#"[ { "mnemonic": "foo", "form": "R", "stencil": "0x33", "type": ["int"] },
             { "mnemonic": "bar", "form": "R", "stencil": "0x33", "type": ["int"] } ]"#,
    )
    .unwrap();
    let err = Decoder::<Alloc, UArch>::new(
        &[path],
        &Vec::new(),
        &Vec::new(),
        &Vec::new(),
        Alloc,
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::AmbiguousOpcode { .. }));
}

#[test]
fn test_bad_isa_file() {
    let err = Decoder::<Alloc, UArch>::new(
        &[json_path("nothere.json")],
        &Vec::new(),
        &Vec::new(),
        &Vec::new(),
        Alloc,
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::BadIsaFile { .. }));
}

#[test]
fn test_uid_lookups_are_bidirectional() {
    let decoder = standard_decoder();
    let uid = decoder.lookup_inst_uid("amoxor.d").unwrap();
    assert_eq!(decoder.lookup_inst_mnemonic(uid).unwrap(), "amoxor.d");
    assert!(matches!(
        decoder.lookup_inst_uid("nothere"),
        Err(DecodeError::UnknownMnemonic(_))
    ));
}

#[test]
fn test_uncached_path_matches_cached() {
    let mut decoder = standard_decoder();
    let cached = decoder.get_info(0x0031_00b3).unwrap();
    let uncached = decoder.get_info_uncached(0x0031_00b3).unwrap();
    assert_eq!(cached.opinfo.mnemonic(), uncached.opinfo.mnemonic());
    assert_eq!(cached.opinfo.uid(), uncached.opinfo.uid());
}
