//! Trace-driven extraction.

use std::sync::Arc;

use super::{dasm_string, DirectExtractor, Extractor};
use crate::error::Result;
use crate::meta::{InstMetaData, InstUid, INVALID_UID};
use crate::operand::{OperandFieldId, OperandInfo};
use crate::Opcode;

/// Values a trace record must expose to drive `make_inst_from_trace`.
pub trait TraceInfo {
    fn mnemonic(&self) -> &str;
    fn opcode(&self) -> Opcode;
    fn function(&self) -> &str {
        ""
    }
    fn source_regs(&self) -> &[u64];
    fn dest_regs(&self) -> &[u64];
    fn immediate(&self) -> u64;
}

/// Extractor wrapping a trace record. Used when the decoded mnemonic
/// disagrees with the trace and the trace is authoritative.
#[derive(Clone, Debug)]
pub struct TraceExtractor {
    mnemonic: String,
    sources: Vec<u64>,
    dests: Vec<u64>,
    imm: u64,
}

impl TraceExtractor {
    pub fn new<T: TraceInfo>(tinfo: &T) -> Self {
        Self {
            mnemonic: tinfo.mnemonic().to_string(),
            sources: tinfo.source_regs().to_vec(),
            dests: tinfo.dest_regs().to_vec(),
            imm: tinfo.immediate(),
        }
    }
}

impl Extractor for TraceExtractor {
    fn name(&self) -> &'static str {
        "TraceExtractor"
    }

    fn source_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        for (i, &reg) in self.sources.iter().enumerate() {
            let field = *OperandFieldId::SOURCES.get(i).unwrap_or(&OperandFieldId::Rs4);
            info.add(field, meta.operand_type(field), reg, false);
        }
        Ok(info)
    }

    fn dest_operand_info(&self, _opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        for (i, &reg) in self.dests.iter().enumerate() {
            let field = if i == 0 {
                OperandFieldId::Rd
            } else {
                OperandFieldId::Rd2
            };
            info.add(field, meta.operand_type(field), reg, false);
        }
        Ok(info)
    }

    fn immediate(&self, _opcode: Opcode) -> u64 {
        self.imm
    }

    fn has_immediate(&self) -> bool {
        true
    }

    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String {
        let dests = self.dest_operand_info(opcode, meta).unwrap_or_default();
        let sources = self.source_operand_info(opcode, meta).unwrap_or_default();
        dasm_string(mnemonic, &dests, &sources, Some(self.imm))
    }
}

impl DirectExtractor for TraceExtractor {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn uid(&self) -> InstUid {
        INVALID_UID
    }

    fn clone_extractor(&self) -> Arc<dyn Extractor> {
        Arc::new(self.clone())
    }
}
