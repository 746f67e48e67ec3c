//! Instruction factories: the leaves of the decode trie.

use std::sync::Arc;

use crate::extract::Extractor;
use crate::form::FormKind;
use crate::inst::OpcodeInfo;
use crate::meta::{InstMetaData, InstUid};
use crate::Opcode;

/// What a factory hands back per decode: the decoded view plus the
/// attached annotation.
#[derive(Clone, Debug)]
pub struct FactoryInfo<A> {
    pub opinfo: OpcodeInfo,
    pub annotation: Option<Arc<A>>,
}

/// An overlay: a sibling factory that refines the base match with an
/// extra predicate on the opcode word.
#[derive(Debug)]
pub struct Overlay<A> {
    match_mask: Opcode,
    match_value: Opcode,
    /// (mask, value) pairs that must NOT hold for the overlay to apply.
    exclude: Vec<(Opcode, Opcode)>,
    factory: Arc<Factory<A>>,
}

impl<A> Overlay<A> {
    pub fn new(
        match_mask: Opcode,
        match_value: Opcode,
        exclude: Vec<(Opcode, Opcode)>,
        factory: Arc<Factory<A>>,
    ) -> Self {
        Self {
            match_mask,
            match_value,
            exclude,
            factory,
        }
    }

    pub fn matches(&self, opcode: Opcode) -> bool {
        (opcode & self.match_mask) == self.match_value
            && !self.exclude.iter().any(|&(m, v)| (opcode & m) == v)
    }

    pub fn factory(&self) -> &Arc<Factory<A>> {
        &self.factory
    }
}

/// The factory for one mnemonic: stencil, identity, meta-data, default
/// extractor, and the ordered overlay list.
///
/// Overlays are evaluated in declaration order; the first whose predicate
/// holds wins. Overlay predicate failure is not an error, it yields the
/// base.
#[derive(Debug)]
pub struct Factory<A> {
    mnemonic: Arc<str>,
    uid: InstUid,
    form: FormKind,
    stencil: Opcode,
    opcode_mask: Opcode,
    meta: Arc<InstMetaData>,
    extractor: Arc<dyn Extractor>,
    annotation: Option<Arc<A>>,
    overlays: Vec<Overlay<A>>,
}

impl<A> Factory<A> {
    pub fn new(
        mnemonic: Arc<str>,
        uid: InstUid,
        form: FormKind,
        stencil: Opcode,
        opcode_mask: Opcode,
        meta: Arc<InstMetaData>,
        extractor: Arc<dyn Extractor>,
        annotation: Option<Arc<A>>,
    ) -> Self {
        Self {
            mnemonic,
            uid,
            form,
            stencil,
            opcode_mask,
            meta,
            extractor,
            annotation,
            overlays: Vec::new(),
        }
    }

    pub fn mnemonic(&self) -> &Arc<str> {
        &self.mnemonic
    }

    pub fn uid(&self) -> InstUid {
        self.uid
    }

    pub fn form(&self) -> FormKind {
        self.form
    }

    /// The frozen opcode-field values of this mnemonic, in opcode-word
    /// coordinates. `(word & opcode_mask) == stencil` is the defining
    /// predicate.
    pub fn stencil(&self) -> Opcode {
        self.stencil
    }

    pub fn opcode_mask(&self) -> Opcode {
        self.opcode_mask
    }

    pub fn meta(&self) -> &Arc<InstMetaData> {
        &self.meta
    }

    pub fn annotation(&self) -> Option<&Arc<A>> {
        self.annotation.as_ref()
    }

    pub fn push_overlay(&mut self, overlay: Overlay<A>) {
        self.overlays.push(overlay);
    }

    pub fn overlays(&self) -> &[Overlay<A>] {
        &self.overlays
    }

    /// Decode `opcode` through this factory, resolving overlays.
    pub fn get_info(&self, opcode: Opcode) -> Arc<FactoryInfo<A>> {
        for overlay in &self.overlays {
            if overlay.matches(opcode) {
                return overlay.factory.make_info(opcode);
            }
        }
        self.make_info(opcode)
    }

    fn make_info(&self, opcode: Opcode) -> Arc<FactoryInfo<A>> {
        Arc::new(FactoryInfo {
            opinfo: OpcodeInfo::new(
                opcode,
                Arc::clone(&self.mnemonic),
                self.uid,
                Arc::clone(&self.meta),
                Arc::clone(&self.extractor),
            ),
            annotation: self.annotation.clone(),
        })
    }

    /// Build info from a caller-supplied extractor, bypassing overlay
    /// resolution and the caches. Direct-construction and morph paths
    /// come through here.
    pub fn get_info_bypass_cache(
        &self,
        opcode: Opcode,
        extractor: Arc<dyn Extractor>,
    ) -> Arc<FactoryInfo<A>> {
        Arc::new(FactoryInfo {
            opinfo: OpcodeInfo::new(
                opcode,
                Arc::clone(&self.mnemonic),
                self.uid,
                Arc::clone(&self.meta),
                extractor,
            ),
            annotation: self.annotation.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FormExtractor;
    use crate::meta::InstructionTypes;
    use crate::operand::RegisterType;
    use crate::tag::MatchSet;
    use rustc_hash::FxHashMap;

    fn factory(mnemonic: &str, form: FormKind, stencil: Opcode) -> Factory<()> {
        let meta = Arc::new(InstMetaData::new(
            mnemonic.to_string(),
            1,
            InstructionTypes::INT,
            Vec::new(),
            MatchSet::tags(&[]),
            FxHashMap::default(),
            RegisterType::Long,
            RegisterType::Long,
            64,
        ));
        Factory::new(
            Arc::from(mnemonic),
            1,
            form,
            stencil & form.opcode_mask(),
            form.opcode_mask(),
            meta,
            Arc::new(FormExtractor::new(form)),
            None,
        )
    }

    #[test]
    fn test_base_decode() {
        let f = factory("add", FormKind::R, 0x0000_0033);
        let info = f.get_info(0x0031_00b3);
        assert_eq!(info.opinfo.mnemonic(), "add");
        assert_eq!(info.opinfo.source_regs().unwrap(), 0b110);
    }

    #[test]
    fn test_overlay_first_match_wins() {
        let mut addi = factory("addi", FormKind::I, 0x0000_0013);
        let nop = Arc::new(factory("nop", FormKind::I, 0x0000_0013));
        let mv = Arc::new(factory("mv", FormKind::I, 0x0000_0013));
        // nop: rd=0, rs1=0, imm=0 — listed first
        addi.push_overlay(Overlay::new(0xffff_ff80, 0x0, vec![], nop));
        // mv: imm=0, rs1 != 0
        addi.push_overlay(Overlay::new(0xfff0_0013, 0x0000_0013, vec![(0xf_8000, 0)], mv));

        assert_eq!(addi.get_info(0x0000_0013).opinfo.mnemonic(), "nop");
        assert_eq!(addi.get_info(0x0002_8593).opinfo.mnemonic(), "mv");
        assert_eq!(addi.get_info(0x0202_8593).opinfo.mnemonic(), "addi");
    }

    #[test]
    fn test_stencil_predicate() {
        let f = factory("amoxor.d", FormKind::Amo, 0x2000_302f);
        assert_eq!(0x2062_b32f & f.opcode_mask(), f.stencil());
    }
}
