//! Operand and immediate extraction for the 32-bit base formats.

use super::ExtractOpts;
use crate::form::{self, FormKind};
use crate::meta::InstMetaData;
use crate::operand::{OperandFieldId, OperandInfo, SpecialField};
use crate::Opcode;

fn add_source(
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

fn add_dest(
    info: &mut OperandInfo,
    opts: &ExtractOpts,
    meta: &InstMetaData,
    field_id: OperandFieldId,
    reg: u64,
) {
    if !opts.hidden("rd") {
        info.add(field_id, meta.operand_type(field_id), reg, false);
    }
}

pub(super) fn sources(
    kind: FormKind,
    opts: &ExtractOpts,
    opcode: Opcode,
    meta: &InstMetaData,
    info: &mut OperandInfo,
) {
    let rs1 = form::RS1.extract(opcode);
    let rs2 = form::RS2.extract(opcode);
    match kind {
        FormKind::R | FormKind::Rfloat | FormKind::VSetR => {
            add_source(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1, false);
            add_source(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, false);
        }
        FormKind::R4 => {
            add_source(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1, false);
            add_source(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, false);
            add_source(
                info,
                opts,
                meta,
                OperandFieldId::Rs3,
                "rs3",
                form::RS3.extract(opcode),
                false,
            );
        }
        FormKind::I
        | FormKind::Ish
        | FormKind::IshW
        | FormKind::IFloat
        | FormKind::Csr
        | FormKind::Fence
        | FormKind::R2float
        | FormKind::VSet => {
            add_source(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1, false);
        }
        FormKind::S | FormKind::SFloat => {
            add_source(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1, false);
            add_source(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, true);
        }
        FormKind::B => {
            add_source(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1, false);
            add_source(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, false);
        }
        FormKind::Amo => {
            add_source(info, opts, meta, OperandFieldId::Rs1, "rs1", rs1, false);
            add_source(info, opts, meta, OperandFieldId::Rs2, "rs2", rs2, true);
        }
        FormKind::U | FormKind::J | FormKind::CsrI | FormKind::System | FormKind::VSetI => {}
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
    let rd = form::RD.extract(opcode);
    match kind {
        FormKind::R
        | FormKind::R4
        | FormKind::I
        | FormKind::Ish
        | FormKind::IshW
        | FormKind::U
        | FormKind::J
        | FormKind::Amo
        | FormKind::Rfloat
        | FormKind::R2float
        | FormKind::Csr
        | FormKind::CsrI
        | FormKind::Fence
        | FormKind::IFloat
        | FormKind::VSet
        | FormKind::VSetI
        | FormKind::VSetR => {
            add_dest(info, opts, meta, OperandFieldId::Rd, rd);
        }
        FormKind::S | FormKind::B | FormKind::SFloat | FormKind::System => {}
        _ => {}
    }
}

pub(super) fn immediate(kind: FormKind, opcode: Opcode) -> u64 {
    match kind {
        FormKind::I | FormKind::IFloat => form::IMM12.extract(opcode),
        FormKind::Ish => form::SHAMT6.extract(opcode),
        FormKind::IshW => form::SHAMT5.extract(opcode),
        FormKind::S | FormKind::SFloat => {
            (form::SIMM7.extract(opcode) << 5) | form::SIMM5.extract(opcode)
        }
        FormKind::B => b_offset(opcode) as u64,
        FormKind::U => form::IMM20.extract(opcode),
        FormKind::J => j_offset(opcode) as u64,
        FormKind::CsrI => form::UIMM5.extract(opcode),
        FormKind::VSet => form::ZIMM11.extract(opcode),
        FormKind::VSetI => form::ZIMM10.extract(opcode),
        _ => 0,
    }
}

pub(super) fn signed_offset(kind: FormKind, _opts: &ExtractOpts, opcode: Opcode) -> i64 {
    match kind {
        FormKind::I | FormKind::IFloat => form::IMM12.extract_signed(opcode),
        FormKind::S | FormKind::SFloat => sign_extend(immediate(kind, opcode), 12),
        FormKind::B => b_offset(opcode),
        FormKind::J => j_offset(opcode),
        _ => immediate(kind, opcode) as i64,
    }
}

pub(super) fn has_immediate(kind: FormKind) -> bool {
    matches!(
        kind,
        FormKind::I
            | FormKind::Ish
            | FormKind::IshW
            | FormKind::S
            | FormKind::SFloat
            | FormKind::B
            | FormKind::U
            | FormKind::J
            | FormKind::CsrI
            | FormKind::IFloat
            | FormKind::VSet
            | FormKind::VSetI
    )
}

pub(super) fn special_field(kind: FormKind, field: SpecialField, opcode: Opcode) -> Option<u64> {
    match (kind, field) {
        (FormKind::Amo, SpecialField::Aq) => Some(form::AQ.extract(opcode)),
        (FormKind::Amo, SpecialField::Rl) => Some(form::RL.extract(opcode)),
        (FormKind::R4 | FormKind::Rfloat | FormKind::R2float, SpecialField::Rm) => {
            Some(form::RM.extract(opcode))
        }
        (FormKind::Csr | FormKind::CsrI, SpecialField::Csr) => Some(form::CSR_IDX.extract(opcode)),
        (FormKind::VSetI, SpecialField::Avl) => Some(form::UIMM5.extract(opcode)),
        _ => None,
    }
}

pub(super) fn is_hint(kind: FormKind, opts: &ExtractOpts, opcode: Opcode) -> bool {
    // Writes to x0 in integer computational forms are hints.
    match kind {
        FormKind::I | FormKind::Ish | FormKind::IshW | FormKind::U => {
            !opts.hidden("rd") && form::RD.extract(opcode) == 0
        }
        _ => false,
    }
}

/// B-format offset: imm[12|10:5] in bits 31:25, imm[4:1|11] in bits 11:7.
fn b_offset(opcode: Opcode) -> i64 {
    let w = opcode;
    let imm = (((w >> 31) & 0x1) << 12)
        | (((w >> 7) & 0x1) << 11)
        | (((w >> 25) & 0x3f) << 5)
        | (((w >> 8) & 0xf) << 1);
    sign_extend(imm, 12)
}

/// J-format offset: imm[20|10:1|11|19:12] in bits 31:12.
fn j_offset(opcode: Opcode) -> i64 {
    let w = opcode;
    let imm = (((w >> 31) & 0x1) << 20)
        | (((w >> 12) & 0xff) << 12)
        | (((w >> 20) & 0x1) << 11)
        | (((w >> 21) & 0x3ff) << 1);
    sign_extend(imm, 20)
}

pub(crate) fn sign_extend(value: u64, sign_bit: u32) -> i64 {
    let shift = 63 - sign_bit;
    ((value << shift) as i64) >> shift
}
