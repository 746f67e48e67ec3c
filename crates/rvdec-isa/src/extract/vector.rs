//! Operand extraction for the vector formats.

use super::standard::sign_extend;
use super::ExtractOpts;
use crate::form::{self, FormKind};
use crate::meta::InstMetaData;
use crate::operand::{OperandFieldId, OperandInfo, SpecialField};
use crate::Opcode;

pub(super) fn is_vector(kind: FormKind) -> bool {
    matches!(
        kind,
        FormKind::VArith
            | FormKind::VArithImm
            | FormKind::VMunary
            | FormKind::VLoad
            | FormKind::VStore
    )
}

pub(super) fn sources(
    kind: FormKind,
    opts: &ExtractOpts,
    opcode: Opcode,
    meta: &InstMetaData,
    info: &mut OperandInfo,
) {
    match kind {
        FormKind::VArith => {
            if !opts.hidden("rs2") {
                info.add(
                    OperandFieldId::Rs2,
                    meta.operand_type(OperandFieldId::Rs2),
                    form::RS2.extract(opcode),
                    false,
                );
            }
            if !opts.hidden("rs1") {
                info.add(
                    OperandFieldId::Rs1,
                    meta.operand_type(OperandFieldId::Rs1),
                    form::RS1.extract(opcode),
                    false,
                );
            }
        }
        FormKind::VArithImm => {
            if !opts.hidden("rs2") {
                info.add(
                    OperandFieldId::Rs2,
                    meta.operand_type(OperandFieldId::Rs2),
                    form::RS2.extract(opcode),
                    false,
                );
            }
        }
        FormKind::VMunary => {}
        FormKind::VLoad => {
            info.add(
                OperandFieldId::Rs1,
                meta.operand_type(OperandFieldId::Rs1),
                form::RS1.extract(opcode),
                false,
            );
        }
        FormKind::VStore => {
            info.add(
                OperandFieldId::Rs1,
                meta.operand_type(OperandFieldId::Rs1),
                form::RS1.extract(opcode),
                false,
            );
            // Store data travels in the vd slot.
            info.add(
                OperandFieldId::Rs2,
                meta.operand_type(OperandFieldId::Rs2),
                form::RD.extract(opcode),
                true,
            );
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
    match kind {
        FormKind::VArith | FormKind::VArithImm | FormKind::VMunary | FormKind::VLoad => {
            if !opts.hidden("rd") {
                info.add(
                    OperandFieldId::Rd,
                    meta.operand_type(OperandFieldId::Rd),
                    form::RD.extract(opcode),
                    false,
                );
            }
        }
        FormKind::VStore => {}
        _ => {}
    }
}

pub(super) fn immediate(kind: FormKind, opcode: Opcode) -> u64 {
    match kind {
        // simm5 rides in the rs1 slot
        FormKind::VArithImm => sign_extend(form::RS1.extract(opcode), 4) as u64,
        _ => 0,
    }
}

pub(super) fn has_immediate(kind: FormKind) -> bool {
    matches!(kind, FormKind::VArithImm)
}

pub(super) fn special_field(kind: FormKind, field: SpecialField, opcode: Opcode) -> Option<u64> {
    match (kind, field) {
        (
            FormKind::VArith
            | FormKind::VArithImm
            | FormKind::VMunary
            | FormKind::VLoad
            | FormKind::VStore,
            SpecialField::Vm,
        ) => Some(form::VM.extract(opcode)),
        (FormKind::VLoad | FormKind::VStore, SpecialField::Nf) => Some(form::NF.extract(opcode)),
        _ => None,
    }
}
