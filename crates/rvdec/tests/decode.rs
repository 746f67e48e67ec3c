//! Decode behaviour over the RV64 and RV32 JSON corpora.

mod common;

use common::*;
use rvdec::{
    DecodeError, DecodedInst, Decoder, DirectInfo, ExtractedInstTypes, InstructionTypes, MatchSet,
    SpecialField,
};

#[test]
fn test_add_operands() {
    let mut decoder = standard_decoder();
    // add x3, x1, x2
    let inst = decoder.make_inst(0x0031_00b3).unwrap();
    assert_eq!(inst.mnemonic(), "add");
    assert_eq!(inst.opinfo().source_regs().unwrap(), 0b110);
    assert_eq!(inst.opinfo().dest_regs().unwrap(), 0b1000);
    assert!(inst.opinfo().is_inst_type(InstructionTypes::INT));
}

#[test]
fn test_addi_immediate() {
    let mut decoder = standard_decoder();
    // addi x11, x5, 0x20
    let inst = decoder.make_inst(0x0202_8593).unwrap();
    assert_eq!(inst.mnemonic(), "addi");
    assert!(inst.opinfo().has_immediate());
    assert_eq!(inst.opinfo().immediate(), 0x20);
}

#[test]
fn test_mv_overlay_on_addi() {
    let mut decoder = standard_decoder();
    // addi x11, x5, 0 decodes as mv
    let inst = decoder.make_inst(0x0002_8593).unwrap();
    assert_eq!(inst.mnemonic(), "mv");
    assert!(!inst.opinfo().has_immediate());
    assert!(inst.opinfo().is_inst_type(InstructionTypes::MOVE));
    assert_eq!(inst.uid(), decoder.lookup_inst_uid("mv").unwrap());
}

#[test]
fn test_canonical_nop_uid() {
    let mut decoder = standard_decoder();
    let inst = decoder.make_inst(rvdec::CANONICAL_NOP).unwrap();
    assert_eq!(inst.mnemonic(), "nop");
    assert_eq!(inst.uid(), 1);
}

#[test]
fn test_jalr_call_and_return() {
    let mut decoder = standard_decoder();
    // jalr x1, x5, 0
    assert!(decoder
        .is_opcode_inst_type(0x0002_80e7, InstructionTypes::BRANCH)
        .unwrap());
    assert!(decoder
        .is_opcode_extracted_inst_type(0x0002_80e7, ExtractedInstTypes::Call)
        .unwrap());
    assert!(decoder
        .is_opcode_extracted_inst_type(0x0002_80e7, ExtractedInstTypes::Return)
        .unwrap());
    // jal x0 is neither
    assert!(!decoder
        .is_opcode_extracted_inst_type(0x0000_006f, ExtractedInstTypes::Call)
        .unwrap());
}

#[test]
fn test_czext_b_implied_immediate() {
    let mut decoder = standard_decoder();
    let inst = decoder.make_inst(0x9c61).unwrap();
    assert_eq!(inst.mnemonic(), "c.zext.b");
    assert!(inst.opinfo().has_immediate());
    assert_eq!(inst.opinfo().immediate(), 0xff);
}

#[test]
fn test_morph_to_cmov() {
    let mut decoder = standard_decoder();
    // c.mv x0, x1
    let mut inst = decoder.make_inst(0x8006).unwrap();
    assert_eq!(inst.mnemonic(), "c.mv");

    let cmov = DirectInfo::new("cmov", vec![1, 2, 3], vec![4]);
    decoder.morph_inst(&mut inst, &cmov).unwrap();
    assert_eq!(inst.mnemonic(), "cmov");
    assert_eq!(inst.uid(), 2);
    assert!(inst.opinfo().is_inst_type(InstructionTypes::INT));
    assert!(inst.opinfo().is_inst_type(InstructionTypes::MOVE));
    assert!(inst.opinfo().is_inst_type(InstructionTypes::CONDITIONAL));
    assert_eq!(inst.opinfo().source_regs().unwrap(), 0b1110);

    // A fresh decode of the original opcode is unaffected
    let fresh = decoder.make_inst(0x8006).unwrap();
    assert_eq!(fresh.mnemonic(), "c.mv");
}

#[test]
fn test_vid_v_register_files() {
    let mut decoder = standard_decoder();
    let inst = decoder.make_inst(0x5008_a0d7).unwrap();
    assert_eq!(inst.mnemonic(), "vid.v");
    assert_eq!(inst.opinfo().vector_source_regs().unwrap(), 0b0);
    assert_eq!(inst.opinfo().vector_dest_regs().unwrap(), 0b10);
    assert!(inst.opinfo().is_inst_type(InstructionTypes::VECTOR));
    assert_eq!(inst.opinfo().special_field(SpecialField::Vm).unwrap(), 0);
}

#[test]
fn test_prefetch_included() {
    let mut decoder = standard_decoder();
    let inst = decoder.make_inst(0x6013).unwrap();
    assert_eq!(inst.mnemonic(), "prefetch.i");
    assert!(inst.opinfo().has_immediate());
    assert_eq!(inst.opinfo().immediate(), 0);
    assert!(inst.opinfo().tags().is_member("pf"));
}

#[test]
fn test_prefetch_excluded_by_tag() {
    let exclusions = MatchSet::patterns(&["pf".to_string()]).unwrap();
    let mut decoder: Decoder<Alloc, UArch> = Decoder::with_filters(
        &rv64_isa_files(),
        &anno_files(),
        &uid_list(),
        &Vec::new(),
        &MatchSet::default(),
        &exclusions,
        Alloc,
    )
    .unwrap();
    let inst = decoder.make_inst(0x6013).unwrap();
    assert_eq!(inst.mnemonic(), "ori");
    assert!(!inst.opinfo().tags().is_member("pf"));
}

#[test]
fn test_unknown_opcode_without_compressed() {
    // A context with no compressed instructions: 0x0 falls off the trie.
    let files = vec![json_path("isa_rv64i.json")];
    let mut decoder: Decoder<Alloc, UArch> =
        Decoder::new(&files, &anno_files(), &uid_list(), &Vec::new(), Alloc).unwrap();
    assert!(matches!(
        decoder.make_inst(0x0),
        Err(DecodeError::UnknownOpcode(0))
    ));
}

#[test]
fn test_all_zeros_is_illegal() {
    // With C loaded, 0x0 reaches c.addi4spn with a zero immediate.
    let mut decoder = standard_decoder();
    assert!(matches!(
        decoder.make_inst(0x0),
        Err(DecodeError::IllegalOpcode(0))
    ));
}

#[test]
fn test_zclsd_pair_load() {
    let mut decoder = rv32_decoder();
    // c.ld a0, 0(a0) under Zclsd: destination pair a0/a1
    let inst = decoder.make_inst(0x6008).unwrap();
    assert_eq!(inst.mnemonic(), "c.ld");
    assert!(inst.opinfo().is_inst_type(InstructionTypes::PAIR));
    assert_eq!(inst.opinfo().int_dest_regs().unwrap(), (1 << 10) | (1 << 11));
    // Odd destination register: the pair form is illegal
    assert!(matches!(
        decoder.make_inst(0x6004),
        Err(DecodeError::IllegalOpcode(_))
    ));
}

#[test]
fn test_amo_address_and_data_sources() {
    let mut decoder = standard_decoder();
    // amoxor.d x6, x2, (x5)
    let inst = decoder.make_inst(0x2022_b32f).unwrap();
    assert_eq!(inst.mnemonic(), "amoxor.d");
    assert_eq!(inst.opinfo().source_address_regs().unwrap(), 1 << 5);
    assert_eq!(inst.opinfo().source_data_regs().unwrap(), 1 << 2);
    assert_eq!(inst.opinfo().special_field(SpecialField::Aq).unwrap(), 0);
    assert_eq!(inst.opinfo().special_field(SpecialField::Rl).unwrap(), 0);
    assert!(inst.opinfo().is_inst_type(InstructionTypes::ATOMIC));
}

#[test]
fn test_csr_special_field() {
    let mut decoder = standard_decoder();
    // csrrw x0, mstatus, x5
    let inst = decoder.make_inst(0x3002_9073).unwrap();
    assert_eq!(inst.mnemonic(), "csrrw");
    assert_eq!(inst.opinfo().special_field(SpecialField::Csr).unwrap(), 0x300);
    assert!(matches!(
        inst.opinfo().special_field(SpecialField::Rm),
        Err(DecodeError::UnsupportedSpecialField { .. })
    ));
}

#[test]
fn test_cfld_register_files() {
    let mut decoder = standard_decoder();
    // c.fld f10, 80(x10)
    let inst = decoder.make_inst(0x2928).unwrap();
    assert_eq!(inst.mnemonic(), "c.fld");
    assert_eq!(inst.opinfo().float_dest_regs().unwrap(), 1 << 10);
    assert_eq!(inst.opinfo().int_source_regs().unwrap(), 1 << 10);
    assert_eq!(inst.opinfo().immediate(), 80);
}

#[test]
fn test_fmadd_rounding_mode() {
    let mut decoder = standard_decoder();
    // fmadd.d f10 = f15, f10, f14 with dynamic rounding
    let inst = decoder.make_inst(0x72a7_f543).unwrap();
    assert_eq!(inst.mnemonic(), "fmadd.d");
    assert_eq!(inst.opinfo().special_field(SpecialField::Rm).unwrap(), 7);
    assert_eq!(inst.opinfo().float_dest_regs().unwrap(), 1 << 10);
}

#[test]
fn test_cm_push_register_list() {
    // Zcmp conflicts with Zcd, so build it into its own context.
    let files = vec![
        json_path("isa_rv64i.json"),
        json_path("isa_rv64c.json"),
        json_path("isa_rv64zcmp.json"),
    ];
    let mut decoder: Decoder<Alloc, UArch> =
        Decoder::new(&files, &anno_files(), &uid_list(), &Vec::new(), Alloc).unwrap();
    // cm.push {ra, s0}, -32 (rlist=5, spimm=1)
    let inst = decoder.make_inst(0xb856).unwrap();
    assert_eq!(inst.mnemonic(), "cm.push");
    assert_eq!(
        inst.opinfo().special_field(SpecialField::StackAdj).unwrap(),
        32
    );
    assert_eq!(
        inst.opinfo().source_data_regs().unwrap(),
        (1 << 1) | (1 << 8)
    );
}

#[test]
fn test_sspush_implied_link_register() {
    let mut decoder = standard_decoder();
    let inst = decoder.make_inst(0x6081).unwrap();
    assert_eq!(inst.mnemonic(), "c.sspush");
    let sources = inst.opinfo().source_operand_info().unwrap();
    assert_eq!(sources.elements().len(), 1);
    assert_eq!(sources.elements()[0].reg, 1);
    assert!(sources.elements()[0].is_implied);
}

#[test]
fn test_clui_still_reachable_around_sspush() {
    let mut decoder = standard_decoder();
    // c.lui x1, 1: same rds1 as c.sspush but a nonzero immediate
    let inst = decoder.make_inst(0x6085).unwrap();
    assert_eq!(inst.mnemonic(), "c.lui");
}

#[test]
fn test_annotation_and_overrides() {
    let mut decoder = standard_decoder();
    // andn x3, x1, x2: the override flips pipelined to false
    let inst = decoder.make_inst(0x4020_f1b3).unwrap();
    assert_eq!(inst.mnemonic(), "andn");
    let anno = inst.annotation().expect("andn carries an annotation");
    assert!(!anno.pipelined);
    assert_eq!(anno.latency, 1);

    // srai x1, x1, 1: the override adds a rob_group
    let inst = decoder.make_inst(0x4010_d093).unwrap();
    assert_eq!(inst.mnemonic(), "srai");
    let anno = inst.annotation().expect("srai carries an annotation");
    assert_eq!(anno.rob_group, vec!["begin".to_string()]);

    // add keeps its file annotation untouched
    let inst = decoder.make_inst(0x0031_00b3).unwrap();
    let anno = inst.annotation().expect("add carries an annotation");
    assert!(anno.pipelined);
    assert_eq!(anno.pipes, vec!["alu0".to_string(), "alu1".to_string()]);
}

#[test]
fn test_context_isolation() {
    let mut decoder = standard_decoder();
    decoder
        .make_context(
            "RV32",
            &rv32_isa_files(),
            &anno_files(),
            &uid_list(),
            &Vec::new(),
            &MatchSet::default(),
            &MatchSet::default(),
        )
        .unwrap();

    // 0x6008 is the rv64 c.ld in BASE: one destination
    let inst = decoder.make_inst(0x6008).unwrap();
    assert_eq!(inst.mnemonic(), "c.ld");
    assert!(!inst.opinfo().is_inst_type(InstructionTypes::PAIR));
    assert_eq!(inst.opinfo().int_dest_regs().unwrap(), 1 << 10);

    // The same word in the RV32 context is the Zclsd pair load
    decoder.switch_context("RV32").unwrap();
    let inst = decoder.make_inst(0x6008).unwrap();
    assert!(inst.opinfo().is_inst_type(InstructionTypes::PAIR));
    assert_eq!(inst.opinfo().int_dest_regs().unwrap(), (1 << 10) | (1 << 11));

    // Vector opcodes exist only in BASE
    assert!(decoder.make_inst(0x5008_a0d7).is_err());
    decoder.switch_context(rvdec::BASE_CONTEXT).unwrap();
    assert!(decoder.make_inst(0x5008_a0d7).is_ok());
}

#[test]
fn test_context_registry_errors() {
    let mut decoder = standard_decoder();
    assert!(!decoder.has_context("NEW"));
    assert!(matches!(
        decoder.switch_context("NEW"),
        Err(DecodeError::UnknownContext(_))
    ));
    let err = decoder
        .make_context(
            rvdec::BASE_CONTEXT,
            &rv64_isa_files(),
            &anno_files(),
            &uid_list(),
            &Vec::new(),
            &MatchSet::default(),
            &MatchSet::default(),
        )
        .unwrap_err();
    assert!(matches!(err, DecodeError::ContextAlreadyExists(_)));
}

#[test]
fn test_get_opcode_returns_stencil() {
    let decoder = standard_decoder();
    assert_eq!(decoder.get_opcode("add").unwrap(), 0x33);
    assert_eq!(decoder.get_opcode("amoxor.d").unwrap(), 0x2000_302f);
    assert!(matches!(
        decoder.get_opcode("nothere"),
        Err(DecodeError::UnknownMnemonic(_))
    ));
}

#[test]
fn test_round_trip_canonical_encodings() {
    // Decoding a mnemonic's own stencil yields that mnemonic and UID.
    let mut decoder = standard_decoder();
    for mnemonic in [
        "add",
        "sub",
        "mul",
        "amoxor.d",
        "fadd.d",
        "csrrw",
        "fence.i",
        "c.addi16sp",
        "vid.v",
    ] {
        let stencil = decoder.get_opcode(mnemonic).unwrap();
        let info = decoder.get_info(stencil).unwrap();
        assert_eq!(info.opinfo.mnemonic(), mnemonic, "{stencil:#x}");
        assert_eq!(
            info.opinfo.uid(),
            decoder.lookup_inst_uid(mnemonic).unwrap()
        );
    }
}

#[test]
fn test_display_dumps_trie() {
    let decoder = standard_decoder();
    let dump = format!("{decoder}");
    assert!(dump.contains("match-list"));
    assert!(dump.contains("add"));
}
