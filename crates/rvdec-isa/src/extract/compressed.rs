//! Operand and immediate extraction for the 16-bit compressed formats.
//!
//! The compressed encodings scatter immediate bits; each form's
//! permutation is reproduced here exactly.

use super::standard::sign_extend;
use super::ExtractOpts;
use crate::form::{self, FormKind};
use crate::meta::InstMetaData;
use crate::operand::{OperandFieldId, OperandInfo, SpecialField};
use crate::Opcode;

#[inline]
fn bit(word: Opcode, n: u32) -> u64 {
    (word >> n) & 1
}

#[inline]
fn bits(word: Opcode, lsb: u32, width: u32) -> u64 {
    (word >> lsb) & ((1 << width) - 1)
}

/// Compressed prime register: 3-bit field selecting x8..x15 (f8..f15).
#[inline]
fn prime(value: u64) -> u64 {
    value + 8
}

fn add(
    info: &mut OperandInfo,
    opts: &ExtractOpts,
    meta: &InstMetaData,
    field_id: OperandFieldId,
    name: &str,
    reg: u64,
    is_store_data: bool,
) {
    if !opts.hidden(name) {
        info.add(field_id, meta.operand_type(field_id), reg, is_store_data);
    }
}

pub(super) fn sources(
    kind: FormKind,
    opts: &ExtractOpts,
    opcode: Opcode,
    meta: &InstMetaData,
    info: &mut OperandInfo,
) {
    let rds1 = form::CRDS1.extract(opcode);
    let rs2 = form::CRS2.extract(opcode);
    let rs1p = prime(form::CRS1P.extract(opcode));
    let rs2p = prime(form::CRS2P.extract(opcode));
    let rds1p = prime(form::CRDS1P.extract(opcode));
    match kind {
        FormKind::CR => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rds1, false);
            add(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, false);
        }
        FormKind::CI | FormKind::CShamt => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rds1, false);
        }
        FormKind::CAddi16Sp => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", 2, false);
        }
        FormKind::CLui | FormKind::CIW | FormKind::CJ => {}
        FormKind::CLw | FormKind::CLd | FormKind::CFld | FormKind::CLdPair => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1p, false);
        }
        FormKind::CLb | FormKind::CLh => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1p, false);
        }
        FormKind::CSw | FormKind::CSd | FormKind::CFsd => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1p, false);
            add(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2p, true);
        }
        FormKind::CSb | FormKind::CSh => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1p, false);
            add(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2p, true);
        }
        FormKind::CSdPair => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1p, false);
            add(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2p, true);
            add(info, opts, meta, OperandFieldId::Rs3, "rs3", rs2p + 1, true);
        }
        FormKind::CLwSp | FormKind::CLdSp | FormKind::CFldSp => {
            // Stack-pointer loads address through x2.
            info.add_implied(OperandFieldId::Rs1, meta.default_source_type(), 2, false);
        }
        FormKind::CSwSp | FormKind::CSdSp | FormKind::CFsdSp => {
            info.add_implied(OperandFieldId::Rs1, meta.default_source_type(), 2, false);
            add(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, true);
        }
        FormKind::CBAlu | FormKind::CZext => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rds1p, false);
        }
        FormKind::CB => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1p, false);
        }
        FormKind::CA => {
            add(info, opts, meta, OperandFieldId::Rs1, "rs1", rds1p, false);
            add(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2p, false);
        }
        FormKind::CSsPush | FormKind::CSsPopChk => {
            // Operands are implied by the instruction, not encoded.
        }
        FormKind::CmPushPop => {
            if cm_is_push(opcode) {
                info.add_implied(OperandFieldId::Rs1, meta.default_source_type(), 2, false);
                for reg in cm_reg_list(opcode) {
                    info.add(OperandFieldId::Rs2, meta.operand_type(OperandFieldId::Rs2), reg, true);
                }
            } else {
                info.add_implied(OperandFieldId::Rs1, meta.default_source_type(), 2, false);
            }
        }
        _ => {}
    }
}

pub(super) fn dests(
    kind: FormKind,
    opts: &ExtractOpts,
    opcode: Opcode,
    meta: &InstMetaData,
    info: &mut OperandInfo,
) {
    let rds1 = form::CRDS1.extract(opcode);
    let rdp = prime(form::CRDP.extract(opcode));
    let rds1p = prime(form::CRDS1P.extract(opcode));
    match kind {
        FormKind::CR | FormKind::CI | FormKind::CLui | FormKind::CShamt => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rds1, false);
        }
        FormKind::CAddi16Sp => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", 2, false);
        }
        FormKind::CIW => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rdp, false);
        }
        FormKind::CLw | FormKind::CLd | FormKind::CFld | FormKind::CLb | FormKind::CLh => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rdp, false);
        }
        FormKind::CLdPair => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rdp, false);
            add(info, opts, meta, OperandFieldId::Rd2, "rd2", rdp + 1, false);
        }
        FormKind::CLwSp | FormKind::CLdSp | FormKind::CFldSp => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rds1, false);
        }
        FormKind::CBAlu | FormKind::CZext => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rds1p, false);
        }
        FormKind::CA => {
            add(info, opts, meta, OperandFieldId::Rd, "rd", rds1p, false);
        }
        FormKind::CmPushPop => {
            if !cm_is_push(opcode) {
                for reg in cm_reg_list(opcode) {
                    info.add(OperandFieldId::Rd2, meta.operand_type(OperandFieldId::Rd2), reg, false);
                }
            }
            info.add_implied(OperandFieldId::Rd, meta.default_dest_type(), 2, false);
        }
        _ => {}
    }
}

pub(super) fn immediate(kind: FormKind, opcode: Opcode) -> u64 {
    let w = opcode;
    match kind {
        // nzuimm[5:4|9:6|2|3] in bits 12:5
        FormKind::CIW => {
            (bits(w, 11, 2) << 4) | (bits(w, 7, 4) << 6) | (bit(w, 6) << 2) | (bit(w, 5) << 3)
        }
        // offset[5:3] in 12:10, offset[2|6] in 6:5
        FormKind::CLw | FormKind::CSw => {
            (bits(w, 10, 3) << 3) | (bit(w, 6) << 2) | (bit(w, 5) << 6)
        }
        // offset[5:3] in 12:10, offset[7:6] in 6:5
        FormKind::CLd
        | FormKind::CFld
        | FormKind::CSd
        | FormKind::CFsd
        | FormKind::CLdPair
        | FormKind::CSdPair => (bits(w, 10, 3) << 3) | (bits(w, 5, 2) << 6),
        FormKind::CI => ci_imm(w) as u64,
        FormKind::CLui => (sign_extend((bit(w, 12) << 17) | (bits(w, 2, 5) << 12), 17)) as u64,
        FormKind::CAddi16Sp => addi16sp_imm(w) as u64,
        FormKind::CShamt => (bit(w, 12) << 5) | bits(w, 2, 5),
        // offset[5] in 12, offset[4:2] in 6:4, offset[7:6] in 3:2
        FormKind::CLwSp => (bit(w, 12) << 5) | (bits(w, 4, 3) << 2) | (bits(w, 2, 2) << 6),
        // offset[5] in 12, offset[4:3] in 6:5, offset[8:6] in 4:2
        FormKind::CLdSp | FormKind::CFldSp => {
            (bit(w, 12) << 5) | (bits(w, 5, 2) << 3) | (bits(w, 2, 3) << 6)
        }
        // offset[5:2] in 12:9, offset[7:6] in 8:7
        FormKind::CSwSp => (bits(w, 9, 4) << 2) | (bits(w, 7, 2) << 6),
        // offset[5:3] in 12:10, offset[8:6] in 9:7
        FormKind::CSdSp | FormKind::CFsdSp => (bits(w, 10, 3) << 3) | (bits(w, 7, 3) << 6),
        FormKind::CBAlu => (bit(w, 12) << 5) | bits(w, 2, 5),
        FormKind::CB => cb_offset(w) as u64,
        FormKind::CJ => cj_offset(w) as u64,
        // uimm[1] in 5, uimm[0] in 6
        FormKind::CLb | FormKind::CSb => (bit(w, 5) << 1) | bit(w, 6),
        // uimm[1] in 5
        FormKind::CLh | FormKind::CSh => bit(w, 5) << 1,
        FormKind::CmPushPop => cm_stack_adj(w),
        _ => 0,
    }
}

pub(super) fn signed_offset(kind: FormKind, opts: &ExtractOpts, opcode: Opcode) -> i64 {
    match kind {
        FormKind::CI => ci_imm(opcode),
        FormKind::CLui | FormKind::CAddi16Sp => immediate(kind, opcode) as i64,
        FormKind::CB => cb_offset(opcode),
        FormKind::CJ => cj_offset(opcode),
        FormKind::CBAlu => {
            if opts.signed_imm.unwrap_or(false) {
                sign_extend(immediate(kind, opcode), 5)
            } else {
                immediate(kind, opcode) as i64
            }
        }
        _ => immediate(kind, opcode) as i64,
    }
}

pub(super) fn has_immediate(kind: FormKind) -> bool {
    !matches!(
        kind,
        FormKind::CR | FormKind::CA | FormKind::CZext | FormKind::CSsPush | FormKind::CSsPopChk
    )
}

pub(super) fn special_field(kind: FormKind, field: SpecialField, opcode: Opcode) -> Option<u64> {
    match (kind, field) {
        (FormKind::CmPushPop, SpecialField::StackAdj) => Some(cm_stack_adj(opcode)),
        _ => None,
    }
}

pub(super) fn is_illop(kind: FormKind, opcode: Opcode) -> bool {
    match kind {
        // All-zero halfword is the canonical illegal encoding; it reaches
        // the CIW leaf (cop=0, cfunc3=0) with a zero immediate.
        FormKind::CIW => immediate(kind, opcode) == 0,
        FormKind::CLui | FormKind::CAddi16Sp => immediate(kind, opcode) == 0,
        // Stack-pointer loads to x0 are reserved.
        FormKind::CLwSp | FormKind::CLdSp => form::CRDS1.extract(opcode) == 0,
        // Register pairs must start on an even register.
        FormKind::CLdPair => (prime(form::CRDP.extract(opcode))) % 2 != 0,
        FormKind::CSdPair => (prime(form::CRS2P.extract(opcode))) % 2 != 0,
        FormKind::CmPushPop => form::CRLIST.extract(opcode) < 4,
        _ => false,
    }
}

pub(super) fn is_hint(kind: FormKind, opts: &ExtractOpts, opcode: Opcode) -> bool {
    match kind {
        FormKind::CR | FormKind::CI | FormKind::CShamt => {
            !opts.hidden("rd") && form::CRDS1.extract(opcode) == 0
        }
        _ => false,
    }
}

/// CI immediate: imm[5] in bit 12, imm[4:0] in bits 6:2, sign-extended.
fn ci_imm(w: Opcode) -> i64 {
    sign_extend((bit(w, 12) << 5) | bits(w, 2, 5), 5)
}

/// c.addi16sp: nzimm[9] in 12, [4|6|8:7|5] in bits 6:2, sign-extended.
fn addi16sp_imm(w: Opcode) -> i64 {
    let imm = (bit(w, 12) << 9)
        | (bit(w, 6) << 4)
        | (bit(w, 5) << 6)
        | (bits(w, 3, 2) << 7)
        | (bit(w, 2) << 5);
    sign_extend(imm, 9)
}

/// CB offset: [8|4:3] in 12:10, [7:6|2:1|5] in 6:2, sign-extended.
fn cb_offset(w: Opcode) -> i64 {
    let imm = (bit(w, 12) << 8)
        | (bits(w, 10, 2) << 3)
        | (bits(w, 5, 2) << 6)
        | (bits(w, 3, 2) << 1)
        | (bit(w, 2) << 5);
    sign_extend(imm, 8)
}

/// CJ offset: [11|4|9:8|10|6|7|3:1|5] in bits 12:2, sign-extended.
fn cj_offset(w: Opcode) -> i64 {
    let imm = (bit(w, 12) << 11)
        | (bit(w, 11) << 4)
        | (bits(w, 9, 2) << 8)
        | (bit(w, 8) << 10)
        | (bit(w, 7) << 6)
        | (bit(w, 6) << 7)
        | (bits(w, 3, 3) << 1)
        | (bit(w, 2) << 5);
    sign_extend(imm, 11)
}

fn cm_is_push(w: Opcode) -> bool {
    form::CMFUNC.extract(w) == 0b11000
}

/// Saved-register list of cm.push/cm.pop: {ra}, {ra,s0}, ... {ra,s0-s11}.
fn cm_reg_list(w: Opcode) -> Vec<u64> {
    const S_REGS: [u64; 12] = [8, 9, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27];
    let rlist = form::CRLIST.extract(w);
    if rlist < 4 {
        return Vec::new();
    }
    let num_s = if rlist == 15 { 12 } else { rlist as usize - 4 };
    let mut regs = vec![1];
    regs.extend_from_slice(&S_REGS[..num_s]);
    regs
}

/// Stack adjustment: minimum frame for the register list plus spimm*16.
fn cm_stack_adj(w: Opcode) -> u64 {
    let nregs = cm_reg_list(w).len() as u64;
    let base = (nregs * 8 + 15) / 16 * 16;
    base + form::CSPIMM.extract(w) * 16
}
