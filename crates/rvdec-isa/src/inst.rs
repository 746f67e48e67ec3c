//! The decoded-instruction view and the user-facing traits.

use std::sync::Arc;

use crate::error::Result;
use crate::extract::Extractor;
use crate::meta::{ExtractedInstTypes, InstMetaData, InstUid, InstructionTypes};
use crate::operand::{OperandFieldId, OperandInfo, RegisterType, SpecialField};
use crate::tag::{MatchSet, Tag};
use crate::Opcode;

/// Link registers recognized for call/return classification.
fn is_link(reg: u64) -> bool {
    reg == 1 || reg == 5
}

/// The decoded view of one instruction: opcode word, identity, meta-data,
/// and the extractor that interprets the word.
///
/// Cheap to clone; the heavy parts are shared.
#[derive(Clone, Debug)]
pub struct OpcodeInfo {
    opcode: Opcode,
    mnemonic: Arc<str>,
    uid: InstUid,
    meta: Arc<InstMetaData>,
    extractor: Arc<dyn Extractor>,
}

impl OpcodeInfo {
    pub fn new(
        opcode: Opcode,
        mnemonic: Arc<str>,
        uid: InstUid,
        meta: Arc<InstMetaData>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            opcode,
            mnemonic,
            uid,
            meta,
            extractor,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn uid(&self) -> InstUid {
        self.uid
    }

    pub fn meta(&self) -> &Arc<InstMetaData> {
        &self.meta
    }

    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.extractor
    }

    pub fn inst_types(&self) -> InstructionTypes {
        self.meta.inst_types()
    }

    pub fn is_inst_type(&self, itype: InstructionTypes) -> bool {
        self.meta.is_inst_type(itype)
    }

    pub fn tags(&self) -> &MatchSet<Tag> {
        self.meta.tags()
    }

    /// Instruction types that depend on the opcode word, not just the
    /// meta record.
    pub fn is_extracted_inst_type(&self, itype: ExtractedInstTypes) -> Result<bool> {
        let jal = self.meta.is_inst_type(InstructionTypes::JAL);
        let jalr = self.meta.is_inst_type(InstructionTypes::JALR);
        match itype {
            ExtractedInstTypes::Call => {
                if !jal && !jalr {
                    return Ok(false);
                }
                Ok(self.first_reg(&self.dest_operand_info()?, OperandFieldId::Rd)
                    .is_some_and(is_link))
            }
            ExtractedInstTypes::Return => {
                if !jalr {
                    return Ok(false);
                }
                let rd = self.first_reg(&self.dest_operand_info()?, OperandFieldId::Rd);
                let rs1 = self.first_reg(&self.source_operand_info()?, OperandFieldId::Rs1);
                let Some(rs1) = rs1 else { return Ok(false) };
                // rd == rs1 == link is a plain call, not a return
                Ok(is_link(rs1) && !(rd == Some(rs1)))
            }
        }
    }

    fn first_reg(&self, info: &OperandInfo, field: OperandFieldId) -> Option<u64> {
        info.elements()
            .iter()
            .find(|e| e.field_id == field)
            .map(|e| e.reg)
    }

    pub fn source_operand_info(&self) -> Result<OperandInfo> {
        self.extractor.source_operand_info(self.opcode, &self.meta)
    }

    pub fn dest_operand_info(&self) -> Result<OperandInfo> {
        self.extractor.dest_operand_info(self.opcode, &self.meta)
    }

    /// Bitmask over all register files of source register numbers.
    pub fn source_regs(&self) -> Result<u64> {
        Ok(self.source_operand_info()?.reg_mask())
    }

    pub fn dest_regs(&self) -> Result<u64> {
        Ok(self.dest_operand_info()?.reg_mask())
    }

    pub fn int_source_regs(&self) -> Result<u64> {
        Ok(self
            .source_operand_info()?
            .reg_mask_where(|e| e.operand_type.is_int()))
    }

    pub fn int_dest_regs(&self) -> Result<u64> {
        Ok(self
            .dest_operand_info()?
            .reg_mask_where(|e| e.operand_type.is_int()))
    }

    pub fn float_source_regs(&self) -> Result<u64> {
        Ok(self
            .source_operand_info()?
            .reg_mask_where(|e| e.operand_type.is_float()))
    }

    pub fn float_dest_regs(&self) -> Result<u64> {
        Ok(self
            .dest_operand_info()?
            .reg_mask_where(|e| e.operand_type.is_float()))
    }

    pub fn vector_source_regs(&self) -> Result<u64> {
        Ok(self
            .source_operand_info()?
            .reg_mask_where(|e| e.operand_type == RegisterType::Vector))
    }

    pub fn vector_dest_regs(&self) -> Result<u64> {
        Ok(self
            .dest_operand_info()?
            .reg_mask_where(|e| e.operand_type == RegisterType::Vector))
    }

    /// Address sources of loads, stores, and atomics.
    pub fn source_address_regs(&self) -> Result<u64> {
        if self.meta.is_none_of(
            InstructionTypes::LOAD | InstructionTypes::STORE | InstructionTypes::ATOMIC,
        ) {
            return Ok(0);
        }
        Ok(self
            .source_operand_info()?
            .reg_mask_where(|e| !e.is_store_data))
    }

    /// Store-data sources.
    pub fn source_data_regs(&self) -> Result<u64> {
        Ok(self
            .source_operand_info()?
            .reg_mask_where(|e| e.is_store_data))
    }

    pub fn immediate(&self) -> u64 {
        self.extractor.immediate(self.opcode)
    }

    pub fn signed_offset(&self) -> i64 {
        self.extractor.signed_offset(self.opcode)
    }

    pub fn has_immediate(&self) -> bool {
        self.extractor.has_immediate()
    }

    pub fn special_field(&self, field: SpecialField) -> Result<u64> {
        self.extractor.special_field(field, self.opcode, &self.meta)
    }

    pub fn is_illop(&self) -> bool {
        self.extractor.is_illop(self.opcode)
    }

    pub fn is_hint(&self) -> bool {
        self.extractor.is_hint(self.opcode)
    }

    pub fn dasm_string(&self) -> String {
        self.extractor.dasm(&self.mnemonic, self.opcode, &self.meta)
    }
}

/// Annotation payloads are opaque to the decode engine except for how
/// they are built from the per-mnemonic annotation JSON.
pub trait Annotation: Sized + Send + Sync {
    fn from_json(mnemonic: &str, value: &serde_json::Value) -> Result<Self>;
}

/// Minimal annotation type for callers that carry no micro-architectural
/// payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoAnnotation;

impl Annotation for NoAnnotation {
    fn from_json(_mnemonic: &str, _value: &serde_json::Value) -> Result<Self> {
        Ok(Self)
    }
}

/// The user-defined decoded-instruction value.
pub trait DecodedInst<A>: Clone {
    fn mnemonic(&self) -> &str;

    fn uid(&self) -> InstUid;

    /// Adopt a new decoded view in place.
    fn morph(&mut self, opinfo: OpcodeInfo, annotation: Option<Arc<A>>);
}

/// Injected allocator for decoded-instruction values.
pub trait InstAllocator<A> {
    type Inst: DecodedInst<A>;

    fn construct(&self, opinfo: &OpcodeInfo, annotation: Option<&Arc<A>>) -> Self::Inst;

    /// Copy an existing instruction. Cached prototypes are copied through
    /// here so they stay pristine.
    fn copy(&self, inst: &Self::Inst) -> Self::Inst {
        inst.clone()
    }
}
