//! Extractors: per-form decoders for operands, immediates, and special
//! fields.
//!
//! Three families live here: form-based extractors (one per instruction
//! format, including the compressed and vector formats), overlay
//! extractors (a base-form extractor refined by per-instruction options),
//! and direct extractors (programmatic operand descriptions with no
//! opcode word behind them).

mod compressed;
mod direct;
mod standard;
mod trace;
mod vector;

pub use direct::*;
pub use trace::*;

use rustc_hash::FxHashSet;

use crate::error::{DecodeError, Result};
use crate::form::FormKind;
use crate::meta::InstMetaData;
use crate::operand::{OperandFieldId, OperandInfo, SpecialField};
use crate::Opcode;

/// Common decode interface over an opcode word.
pub trait Extractor: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn source_operand_info(&self, opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo>;

    fn dest_operand_info(&self, opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo>;

    /// Raw immediate value (zero-extended field bits).
    fn immediate(&self, _opcode: Opcode) -> u64 {
        0
    }

    /// Sign-extended branch/jump/load-store offset.
    fn signed_offset(&self, opcode: Opcode) -> i64 {
        self.immediate(opcode) as i64
    }

    fn has_immediate(&self) -> bool {
        false
    }

    fn special_field(&self, field: SpecialField, _opcode: Opcode, meta: &InstMetaData) -> Result<u64> {
        Err(DecodeError::UnsupportedSpecialField {
            mnemonic: meta.mnemonic().to_string(),
            field,
        })
    }

    /// The word decodes here but names an illegal operation.
    fn is_illop(&self, _opcode: Opcode) -> bool {
        false
    }

    /// The word is an architectural hint (e.g. a write to x0).
    fn is_hint(&self, _opcode: Opcode) -> bool {
        false
    }

    /// Debug disassembly.
    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String;
}

/// An implied operand attached by the decoded form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImpliedOperand {
    pub field_id: OperandFieldId,
    pub reg: u64,
    pub is_store_data: bool,
}

/// Per-instruction extraction options layered over a form.
///
/// This is how one underlying encoding morphs into a distinct decoded
/// instruction: hide encoded operands or the immediate, imply extra
/// operands or an immediate value, mask or re-sign the immediate.
#[derive(Clone, Debug, Default)]
pub struct ExtractOpts {
    /// Field names (or `"imm"`) suppressed from the decoded view.
    pub hide: FxHashSet<String>,
    pub implied_sources: Vec<ImpliedOperand>,
    pub implied_dests: Vec<ImpliedOperand>,
    pub implied_imm: Option<u64>,
    /// AND-mask applied to the extracted immediate and offset.
    pub imm_mask: Option<u64>,
    /// Override the form's immediate signedness.
    pub signed_imm: Option<bool>,
}

impl ExtractOpts {
    pub fn hidden(&self, name: &str) -> bool {
        self.hide.contains(name)
    }
}

/// Form-based extractor: one per instruction format, specialized per
/// instruction by [`ExtractOpts`].
#[derive(Clone, Debug)]
pub struct FormExtractor {
    kind: FormKind,
    opts: ExtractOpts,
}

impl FormExtractor {
    pub fn new(kind: FormKind) -> Self {
        Self {
            kind,
            opts: ExtractOpts::default(),
        }
    }

    pub fn with_opts(kind: FormKind, opts: ExtractOpts) -> Self {
        Self { kind, opts }
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn opts(&self) -> &ExtractOpts {
        &self.opts
    }

    fn raw_immediate(&self, opcode: Opcode) -> u64 {
        if let Some(imm) = self.opts.implied_imm {
            return imm;
        }
        let imm = if self.kind.is_compressed() {
            compressed::immediate(self.kind, opcode)
        } else if vector::is_vector(self.kind) {
            vector::immediate(self.kind, opcode)
        } else {
            standard::immediate(self.kind, opcode)
        };
        match self.opts.imm_mask {
            Some(mask) => imm & mask,
            None => imm,
        }
    }
}

impl Extractor for FormExtractor {
    fn name(&self) -> &'static str {
        "FormExtractor"
    }

    fn source_operand_info(&self, opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        if self.kind.is_compressed() {
            compressed::sources(self.kind, &self.opts, opcode, meta, &mut info);
        } else if vector::is_vector(self.kind) {
            vector::sources(self.kind, &self.opts, opcode, meta, &mut info);
        } else {
            standard::sources(self.kind, &self.opts, opcode, meta, &mut info);
        }
        for implied in &self.opts.implied_sources {
            info.add_implied(
                implied.field_id,
                meta.operand_type(implied.field_id),
                implied.reg,
                implied.is_store_data,
            );
        }
        Ok(info)
    }

    fn dest_operand_info(&self, opcode: Opcode, meta: &InstMetaData) -> Result<OperandInfo> {
        let mut info = OperandInfo::new();
        if self.kind.is_compressed() {
            compressed::dests(self.kind, &self.opts, opcode, meta, &mut info);
        } else if vector::is_vector(self.kind) {
            vector::dests(self.kind, &self.opts, opcode, meta, &mut info);
        } else {
            standard::dests(self.kind, &self.opts, opcode, meta, &mut info);
        }
        for implied in &self.opts.implied_dests {
            info.add_implied(
                implied.field_id,
                meta.operand_type(implied.field_id),
                implied.reg,
                implied.is_store_data,
            );
        }
        Ok(info)
    }

    fn immediate(&self, opcode: Opcode) -> u64 {
        self.raw_immediate(opcode)
    }

    fn signed_offset(&self, opcode: Opcode) -> i64 {
        if self.opts.implied_imm.is_some() {
            return self.raw_immediate(opcode) as i64;
        }
        let signed = if self.kind.is_compressed() {
            compressed::signed_offset(self.kind, &self.opts, opcode)
        } else if vector::is_vector(self.kind) {
            vector::immediate(self.kind, opcode) as i64
        } else {
            standard::signed_offset(self.kind, &self.opts, opcode)
        };
        match self.opts.imm_mask {
            Some(mask) => signed & mask as i64,
            None => signed,
        }
    }

    fn has_immediate(&self) -> bool {
        if self.opts.hidden("imm") {
            return false;
        }
        if self.opts.implied_imm.is_some() {
            return true;
        }
        if self.kind.is_compressed() {
            compressed::has_immediate(self.kind)
        } else if vector::is_vector(self.kind) {
            vector::has_immediate(self.kind)
        } else {
            standard::has_immediate(self.kind)
        }
    }

    fn special_field(&self, field: SpecialField, opcode: Opcode, meta: &InstMetaData) -> Result<u64> {
        let value = if self.kind.is_compressed() {
            compressed::special_field(self.kind, field, opcode)
        } else if vector::is_vector(self.kind) {
            vector::special_field(self.kind, field, opcode)
        } else {
            standard::special_field(self.kind, field, opcode)
        };
        value.ok_or_else(|| DecodeError::UnsupportedSpecialField {
            mnemonic: meta.mnemonic().to_string(),
            field,
        })
    }

    fn is_illop(&self, opcode: Opcode) -> bool {
        if self.kind.is_compressed() {
            compressed::is_illop(self.kind, opcode)
        } else {
            false
        }
    }

    fn is_hint(&self, opcode: Opcode) -> bool {
        if self.kind.is_compressed() {
            compressed::is_hint(self.kind, &self.opts, opcode)
        } else {
            standard::is_hint(self.kind, &self.opts, opcode)
        }
    }

    fn dasm(&self, mnemonic: &str, opcode: Opcode, meta: &InstMetaData) -> String {
        let dests = self.dest_operand_info(opcode, meta).unwrap_or_default();
        let sources = self.source_operand_info(opcode, meta).unwrap_or_default();
        dasm_string(
            mnemonic,
            &dests,
            &sources,
            self.has_immediate().then(|| self.immediate(opcode)),
        )
    }
}

/// Shared disassembly formatting: `mnemonic\td1,d2,s1,s2, 0xIMM`.
pub(crate) fn dasm_string(
    mnemonic: &str,
    dests: &OperandInfo,
    sources: &OperandInfo,
    imm: Option<u64>,
) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    out.push_str(mnemonic);
    out.push('\t');
    let mut first = true;
    for e in dests.elements().iter().chain(sources.elements()) {
        if !first {
            out.push(',');
        }
        let _ = write!(out, "{}", e.reg);
        first = false;
    }
    if let Some(imm) = imm {
        let _ = write!(out, " {imm:#x}");
    }
    out
}
