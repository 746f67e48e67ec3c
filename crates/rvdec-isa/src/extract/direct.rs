//! Direct extractors: programmatic operand descriptions.
//!
//! These construct decoded instructions from explicit operand lists or
//! bitmasks instead of an opcode word. They drive `make_inst_directly`,
//! `make_pseudo_inst`, and `morph_inst`.

use std::sync::Arc;

use super::{dasm_string, Extractor};
use crate::error::{DecodeError, Result};
use crate::meta::{InstMetaData, InstUid, INVALID_UID};
use crate::operand::{OperandFieldId, OperandInfo, SpecialField};
use crate::Opcode;

/// Highest representable register number in operand bitmasks.
pub const MAX_REG_NUM: u64 = 63;

/// Extractors that carry their own identity instead of deriving it from
/// an opcode word.
pub trait DirectExtractor: Extractor {
    fn mnemonic(&self) -> &str;

    fn uid(&self) -> InstUid {
        INVALID_UID
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor>;
}

fn reg_list_mask(mnemonic: &str, regs: &[u64]) -> Result<u64> {
    let mut mask = 0u64;
    for &reg in regs {
        if reg > MAX_REG_NUM {
            return Err(DecodeError::InvalidRegisterNumber {
                mnemonic: mnemonic.to_string(),
                reg,
            });
        }
        mask |= 1 << reg;
    }
    Ok(mask)
}

fn mask_to_list(mask: u64) -> Vec<u64> {
    (0..=MAX_REG_NUM).filter(|&r| mask & (1 << r) != 0).collect()
}

fn source_field(index: usize) -> OperandFieldId {
    *OperandFieldId::SOURCES
        .get(index)
        .unwrap_or(&OperandFieldId::Rs4)
}

fn build_sources(
    mnemonic: &str,
    meta: &InstMetaData,
    regs: &[u64],
    is_store_data: bool,
    info: &mut OperandInfo,
    index: &mut usize,
) -> Result<()> {
    for &reg in regs {
        if reg > MAX_REG_NUM {
            return Err(DecodeError::InvalidRegisterNumber {
                mnemonic: mnemonic.to_string(),
                reg,
            });
        }
        let field = source_field(*index);
        info.add(field, meta.operand_type(field), reg, is_store_data);
        *index += 1;
    }
    Ok(())
}

fn build_dests(mnemonic: &str, meta: &InstMetaData, regs: &[u64], info: &mut OperandInfo) -> Result<()> {
    for (i, &reg) in regs.iter().enumerate() {
        if reg > MAX_REG_NUM {
            return Err(DecodeError::InvalidRegisterNumber {
                mnemonic: mnemonic.to_string(),
                reg,
            });
        }
        let field = if i == 0 {
            OperandFieldId::Rd
        } else {
            OperandFieldId::Rd2
        };
        info.add(field, meta.operand_type(field), reg, false);
    }
    Ok(())
}

/// Register-list direct extractor.
#[derive(Clone, Debug)]
pub struct DirectInfo {
    mnemonic: String,
    uid: InstUid,
    sources: Vec<u64>,
    dests: Vec<u64>,
    specials: Vec<(SpecialField, u64)>,
    imm: Option<u64>,
}

impl DirectInfo {
    pub fn new(mnemonic: &str, sources: Vec<u64>, dests: Vec<u64>) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            uid: INVALID_UID,
            sources,
            dests,
            specials: Vec::new(),
            imm: None,
        }
    }

    pub fn by_uid(uid: InstUid, sources: Vec<u64>, dests: Vec<u64>) -> Self {
        Self {
            mnemonic: String::new(),
            uid,
            sources,
            dests,
            specials: Vec::new(),
            imm: None,
        }
    }

    pub fn with_immediate(mut self, imm: u64) -> Self {
        self.imm = Some(imm);
        self
    }

    pub fn with_special(mut self, field: SpecialField, value: u64) -> Self {
        self.specials.push((field, value));
        self
    }

    /// Special-field value by declaration index, bounds-checked.
    pub fn special_by_index(&self, index: usize) -> Result<u64> {
        self.specials
            .get(index)
            .map(|&(_, v)| v)
            .ok_or_else(|| DecodeError::InvalidSpecialFieldIndex {
                mnemonic: self.mnemonic.clone(),
                index,
            })
    }
}

impl Extractor for DirectInfo {
    fn name(&self) -> &'static str {
        "DirectInfo"
    }

    fn source_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        let mut index = 0;
        build_sources(&self.mnemonic, meta, &self.sources, false, &mut info, &mut index)?;
        Ok(info)
    }

    fn dest_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        build_dests(&self.mnemonic, meta, &self.dests, &mut info)?;
        Ok(info)
    }

    fn immediate(&self, _opcode: Opcode) -> u64 {
        self.imm.unwrap_or(0)
    }

    fn has_immediate(&self) -> bool {
        self.imm.is_some()
    }

    fn special_field(&self, field: SpecialField, _opcode: Opcode, meta: &InstMetaData) -> Result<u64> {
        self.specials
            .iter()
            .find(|(f, _)| *f == field)
            .map(|&(_, v)| v)
            .ok_or_else(|| DecodeError::UnsupportedSpecialField {
                mnemonic: meta.mnemonic().to_string(),
                field,
            })
    }

    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String {
        let dests = self.dest_operand_info(opcode, meta).unwrap_or_default();
        let sources = self.source_operand_info(opcode, meta).unwrap_or_default();
        dasm_string(mnemonic, &dests, &sources, self.imm)
    }
}

impl DirectExtractor for DirectInfo {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn uid(&self) -> InstUid {
        self.uid
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor> {
        Arc::new(self.clone())
    }
}

/// Bitmask direct extractor.
#[derive(Clone, Debug)]
pub struct DirectInfoBitMask {
    mnemonic: String,
    uid: InstUid,
    source_mask: u64,
    dest_mask: u64,
    imm: Option<u64>,
}

impl DirectInfoBitMask {
    pub fn new(mnemonic: &str, source_mask: u64, dest_mask: u64) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            uid: INVALID_UID,
            source_mask,
            dest_mask,
            imm: None,
        }
    }

    pub fn by_uid(uid: InstUid, source_mask: u64, dest_mask: u64) -> Self {
        Self {
            mnemonic: String::new(),
            uid,
            source_mask,
            dest_mask,
            imm: None,
        }
    }

    pub fn with_immediate(mut self, imm: u64) -> Self {
        self.imm = Some(imm);
        self
    }
}

impl Extractor for DirectInfoBitMask {
    fn name(&self) -> &'static str {
        "DirectInfoBitMask"
    }

    fn source_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        let mut index = 0;
        build_sources(
            &self.mnemonic,
            meta,
            &mask_to_list(self.source_mask),
            false,
            &mut info,
            &mut index,
        )?;
        Ok(info)
    }

    fn dest_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        build_dests(&self.mnemonic, meta, &mask_to_list(self.dest_mask), &mut info)?;
        Ok(info)
    }

    fn immediate(&self, _opcode: Opcode) -> u64 {
        self.imm.unwrap_or(0)
    }

    fn has_immediate(&self) -> bool {
        self.imm.is_some()
    }

    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String {
        let dests = self.dest_operand_info(opcode, meta).unwrap_or_default();
        let sources = self.source_operand_info(opcode, meta).unwrap_or_default();
        dasm_string(mnemonic, &dests, &sources, self.imm)
    }
}

impl DirectExtractor for DirectInfoBitMask {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn uid(&self) -> InstUid {
        self.uid
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor> {
        Arc::new(self.clone())
    }
}

/// Store-shaped direct extractor: address sources vs data sources.
#[derive(Clone, Debug)]
pub struct DirectInfoStores {
    mnemonic: String,
    uid: InstUid,
    addr_sources: Vec<u64>,
    data_sources: Vec<u64>,
    imm: Option<u64>,
}

impl DirectInfoStores {
    pub fn new(mnemonic: &str, addr_sources: Vec<u64>, data_sources: Vec<u64>) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            uid: INVALID_UID,
            addr_sources,
            data_sources,
            imm: None,
        }
    }

    pub fn with_immediate(mut self, imm: u64) -> Self {
        self.imm = Some(imm);
        self
    }
}

impl Extractor for DirectInfoStores {
    fn name(&self) -> &'static str {
        "DirectInfoStores"
    }

    fn source_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        let mut index = 0;
        build_sources(&self.mnemonic, meta, &self.addr_sources, false, &mut info, &mut index)?;
        build_sources(&self.mnemonic, meta, &self.data_sources, true, &mut info, &mut index)?;
        Ok(info)
    }

    fn dest_operand_info(&self, _opcode: Opcode, _meta: &InstMetaData) -> Result<OperandInfo> {
        Ok(OperandInfo::new())
    }

    fn immediate(&self, _opcode: Opcode) -> u64 {
        self.imm.unwrap_or(0)
    }

    fn has_immediate(&self) -> bool {
        self.imm.is_some()
    }

    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String {
        let sources = self.source_operand_info(opcode, meta).unwrap_or_default();
        dasm_string(mnemonic, &OperandInfo::new(), &sources, self.imm)
    }
}

impl DirectExtractor for DirectInfoStores {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn uid(&self) -> InstUid {
        self.uid
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor> {
        Arc::new(self.clone())
    }
}

/// Dest-plus-stores direct extractor, for fused micro-ops that both write
/// a register and store data.
#[derive(Clone, Debug)]
pub struct DirectInfoDestStores {
    mnemonic: String,
    uid: InstUid,
    dests: Vec<u64>,
    addr_sources: Vec<u64>,
    data_sources: Vec<u64>,
    imm: Option<u64>,
}

impl DirectInfoDestStores {
    pub fn new(
        mnemonic: &str,
        dests: Vec<u64>,
        addr_sources: Vec<u64>,
        data_sources: Vec<u64>,
    ) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            uid: INVALID_UID,
            dests,
            addr_sources,
            data_sources,
            imm: None,
        }
    }

    pub fn with_immediate(mut self, imm: u64) -> Self {
        self.imm = Some(imm);
        self
    }
}

impl Extractor for DirectInfoDestStores {
    fn name(&self) -> &'static str {
        "DirectInfoDestStores"
    }

    fn source_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        let mut index = 0;
        build_sources(&self.mnemonic, meta, &self.addr_sources, false, &mut info, &mut index)?;
        build_sources(&self.mnemonic, meta, &self.data_sources, true, &mut info, &mut index)?;
        Ok(info)
    }

    fn dest_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        build_dests(&self.mnemonic, meta, &self.dests, &mut info)?;
        Ok(info)
    }

    fn immediate(&self, _opcode: Opcode) -> u64 {
        self.imm.unwrap_or(0)
    }

    fn has_immediate(&self) -> bool {
        self.imm.is_some()
    }

    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String {
        let dests = self.dest_operand_info(opcode, meta).unwrap_or_default();
        let sources = self.source_operand_info(opcode, meta).unwrap_or_default();
        dasm_string(mnemonic, &dests, &sources, self.imm)
    }
}

impl DirectExtractor for DirectInfoDestStores {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn uid(&self) -> InstUid {
        self.uid
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor> {
        Arc::new(self.clone())
    }
}

/// Pseudo-instruction extractor: fully-specified operand lists.
#[derive(Clone, Debug)]
pub struct PseudoInfo {
    mnemonic: String,
    uid: InstUid,
    sources: OperandInfo,
    dests: OperandInfo,
    imm: Option<u64>,
}

impl PseudoInfo {
    pub fn new(mnemonic: &str, sources: OperandInfo, dests: OperandInfo) -> Self {
        Self {
            mnemonic: mnemonic.to_string(),
            uid: INVALID_UID,
            sources,
            dests,
            imm: None,
        }
    }

    pub fn by_uid(uid: InstUid, sources: OperandInfo, dests: OperandInfo) -> Self {
        Self {
            mnemonic: String::new(),
            uid,
            sources,
            dests,
            imm: None,
        }
    }

    pub fn with_immediate(mut self, imm: u64) -> Self {
        self.imm = Some(imm);
        self
    }
}

impl Extractor for PseudoInfo {
    fn name(&self) -> &'static str {
        "PseudoInfo"
    }

    fn source_operand_info(&self, _opcode: Opcode, _meta: &InstMetaData) -> Result<OperandInfo> {
        Ok(self.sources.clone())
    }

    fn dest_operand_info(&self, _opcode: Opcode, _meta: &InstMetaData) -> Result<OperandInfo> {
        Ok(self.dests.clone())
    }

    fn immediate(&self, _opcode: Opcode) -> u64 {
        self.imm.unwrap_or(0)
    }

    fn has_immediate(&self) -> bool {
        self.imm.is_some()
    }

    fn dasm(&self, mnemonic: &str, _opcode: Opcode, _meta: &InstMetaData) -> String {
        dasm_string(mnemonic, &self.dests, &self.sources, self.imm)
    }
}

impl DirectExtractor for PseudoInfo {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn uid(&self) -> InstUid {
        self.uid
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_meta;
    use super::*;

    #[test]
    fn test_direct_info_masks() {
        let ex = DirectInfo::new("cmov", vec![1, 2, 3], vec![4]);
        let meta = test_meta("cmov");
        let sources = ex.source_operand_info(0, &meta).unwrap();
        assert_eq!(sources.reg_mask(), 0b1110);
        let dests = ex.dest_operand_info(0, &meta).unwrap();
        assert_eq!(dests.reg_mask(), 0b1_0000);
    }

    #[test]
    fn test_invalid_register_number() {
        let ex = DirectInfo::new("cmov", vec![99], vec![]);
        let meta = test_meta("cmov");
        assert!(matches!(
            ex.source_operand_info(0, &meta),
            Err(DecodeError::InvalidRegisterNumber { reg: 99, .. })
        ));
    }

    #[test]
    fn test_bitmask_roundtrip() {
        let ex = DirectInfoBitMask::new("x", 0b110, 0b1000);
        let meta = test_meta("x");
        assert_eq!(ex.source_operand_info(0, &meta).unwrap().reg_mask(), 0b110);
        assert_eq!(ex.dest_operand_info(0, &meta).unwrap().reg_mask(), 0b1000);
    }

    #[test]
    fn test_stores_split() {
        let ex = DirectInfoStores::new("sd", vec![1], vec![2]);
        let meta = test_meta("sd");
        let sources = ex.source_operand_info(0, &meta).unwrap();
        assert_eq!(sources.reg_mask_where(|e| !e.is_store_data), 0b10);
        assert_eq!(sources.reg_mask_where(|e| e.is_store_data), 0b100);
    }

    #[test]
    fn test_special_by_index_bounds() {
        let ex = DirectInfo::new("x", vec![], vec![]).with_special(SpecialField::Csr, 0x300);
        assert_eq!(ex.special_by_index(0).unwrap(), 0x300);
        assert!(matches!(
            ex.special_by_index(1),
            Err(DecodeError::InvalidSpecialFieldIndex { index: 1, .. })
        ));
    }

    #[test]
    fn test_reg_list_mask_helper() {
        assert_eq!(reg_list_mask("x", &[0, 5]).unwrap(), 0b10_0001);
        assert!(reg_list_mask("x", &[64]).is_err());
    }
}
