//! The decode table: the trie root plus the two decode caches.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::builder::FactoryBuilder;
use crate::cache::DecodeCache;
use crate::error::{DecodeError, Result};
use crate::extract::{DirectExtractor, TraceExtractor, TraceInfo};
use crate::factory::{Factory, FactoryInfo};
use crate::field::Field;
use crate::inst::{Annotation, DecodedInst, InstAllocator};
use crate::json::load_isa_file;
use crate::meta::INVALID_UID;
use crate::tag::{MatchSet, Pattern};
use crate::trie::{order_fields, Node};
use crate::Opcode;

/// Decode table for one context.
///
/// Owns the trie, the factory builder that populated it, and two
/// direct-mapped caches: opcode → factory info and opcode → pristine
/// instruction prototype. Cached prototypes are never handed out; callers
/// get copies, so consumer mutation cannot leak back into the cache.
#[derive(Debug)]
pub struct DTable<I, A> {
    root: Node<A>,
    builder: FactoryBuilder<A>,
    icache: DecodeCache<I>,
    ocache: DecodeCache<Arc<FactoryInfo<A>>>,
}

impl<I, A> DTable<I, A>
where
    I: DecodedInst<A>,
    A: Annotation,
{
    pub fn new(builder: FactoryBuilder<A>) -> Self {
        Self {
            root: Node::length_selector(),
            builder,
            icache: DecodeCache::new(),
            ocache: DecodeCache::new(),
        }
    }

    /// Ingest the ISA JSON files and populate the trie.
    pub fn configure<P: AsRef<Path>>(
        &mut self,
        isa_files: &[P],
        inclusions: &MatchSet<Pattern>,
        exclusions: &MatchSet<Pattern>,
    ) -> Result<()> {
        let mut entries = Vec::new();
        for path in isa_files {
            let mut file_entries = load_isa_file(path.as_ref())?;
            debug!(path = %path.as_ref().display(), count = file_entries.len(), "ISA file loaded");
            entries.append(&mut file_entries);
        }

        let output = self.builder.build(entries, inclusions, exclusions)?;
        for factory in output.trie_factories {
            let mut remaining = placement_fields(&factory);
            self.root.insert(&mut remaining, factory)?;
        }
        self.root.finalize();
        Ok(())
    }

    /// Authoritative (uncached) trie walk. Usable through a shared
    /// reference, e.g. from multiple threads over a built context.
    pub fn get_info_uncached(&self, opcode: Opcode) -> Result<Arc<FactoryInfo<A>>> {
        self.root
            .get_info(opcode)
            .ok_or(DecodeError::UnknownOpcode(opcode))
    }

    /// Memoized decode: opcode word → factory info.
    pub fn get_info(&mut self, opcode: Opcode) -> Result<Arc<FactoryInfo<A>>> {
        if let Some(info) = self.ocache.lookup(opcode) {
            return Ok(Arc::clone(info));
        }
        let info = self.get_info_uncached(opcode)?;
        self.ocache.allocate(opcode, Arc::clone(&info));
        Ok(info)
    }

    /// Decode an opcode word into a user instruction.
    pub fn make_inst<AL>(&mut self, opcode: Opcode, allocator: &AL) -> Result<I>
    where
        AL: InstAllocator<A, Inst = I>,
    {
        if let Some(prototype) = self.icache.lookup(opcode) {
            return Ok(allocator.copy(prototype));
        }
        let info = self.get_info(opcode)?;
        if info.opinfo.is_illop() {
            return Err(DecodeError::IllegalOpcode(opcode));
        }
        let prototype = allocator.construct(&info.opinfo, info.annotation.as_ref());
        let result = allocator.copy(&prototype);
        self.icache.allocate(opcode, prototype);
        Ok(result)
    }

    /// Decode from a trace record. The trace's mnemonic is authoritative:
    /// when the decoded mnemonic disagrees, the factory for the trace's
    /// mnemonic is used with an extractor wrapping the trace info.
    pub fn make_inst_from_trace<T, AL>(&mut self, tinfo: &T, allocator: &AL) -> Result<I>
    where
        T: TraceInfo,
        AL: InstAllocator<A, Inst = I>,
    {
        let inst = self.make_inst(tinfo.opcode(), allocator)?;
        if inst.mnemonic() == tinfo.mnemonic() {
            return Ok(inst);
        }

        let factory = self
            .builder
            .find_factory(tinfo.mnemonic())
            .ok_or_else(|| DecodeError::UnknownMnemonic(tinfo.mnemonic().to_string()))?;
        let extractor = Arc::new(TraceExtractor::new(tinfo));
        let info = factory.get_info_bypass_cache(tinfo.opcode(), extractor);
        let inst = allocator.construct(&info.opinfo, info.annotation.as_ref());
        self.icache.allocate(tinfo.opcode(), allocator.copy(&inst));
        Ok(inst)
    }

    /// Construct an instruction from direct extraction info, bypassing
    /// the caches.
    pub fn make_inst_directly<AL>(
        &self,
        ex_info: &dyn DirectExtractor,
        allocator: &AL,
    ) -> Result<I>
    where
        AL: InstAllocator<A, Inst = I>,
    {
        let factory = self.direct_factory(ex_info)?;
        let info = factory.get_info_bypass_cache(0, ex_info.clone_extractor());
        Ok(allocator.construct(&info.opinfo, info.annotation.as_ref()))
    }

    /// Morph an existing instruction in place with new direct extraction
    /// info.
    ///
    /// The prototype cache is not invalidated: it holds pristine forms
    /// keyed by the original opcode, which stay valid.
    pub fn morph_inst(&self, inst: &mut I, ex_info: &dyn DirectExtractor) -> Result<()> {
        let factory = self.direct_factory(ex_info)?;
        let info = factory.get_info_bypass_cache(0, ex_info.clone_extractor());
        inst.morph(info.opinfo.clone(), info.annotation.clone());
        Ok(())
    }

    fn direct_factory(&self, ex_info: &dyn DirectExtractor) -> Result<&Arc<Factory<A>>> {
        if ex_info.uid() != INVALID_UID {
            return self
                .builder
                .find_factory_by_uid(ex_info.uid())
                .ok_or_else(|| DecodeError::UnknownMnemonic(format!("uid {}", ex_info.uid())));
        }
        self.builder
            .find_factory(ex_info.mnemonic())
            .ok_or_else(|| DecodeError::UnknownMnemonic(ex_info.mnemonic().to_string()))
    }

    /// The stencil registered for a mnemonic.
    pub fn get_opcode(&self, mnemonic: &str) -> Result<Opcode> {
        self.builder
            .find_factory(mnemonic)
            .map(|f| f.stencil())
            .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))
    }

    pub fn builder(&self) -> &FactoryBuilder<A> {
        &self.builder
    }

    /// Reset both caches and drop trie-internal memoization.
    pub fn flush_caches(&mut self) {
        self.icache.reset();
        self.ocache.reset();
        self.root.flush_caches();
    }
}

/// A factory's trie-placement fields with their stencil values.
fn placement_fields<A>(factory: &Arc<Factory<A>>) -> Vec<(Field, u64)> {
    let mut fields: Vec<Field> = factory.form().opcode_fields().to_vec();
    // "fixed" constraints widen the mask past the form's opcode fields;
    // "ignore" narrows it. Honour both by re-deriving from the mask.
    fields.retain(|f| factory.opcode_mask() & f.mask() == f.mask());
    for field in factory.form().fields() {
        if factory.opcode_mask() & field.mask() == field.mask()
            && !fields.iter().any(|f| f == field)
        {
            fields.push(*field);
        }
    }
    order_fields(&fields)
        .into_iter()
        .map(|f| (f, f.extract(factory.stencil())))
        .collect()
}

impl<I, A> std::fmt::Display for DTable<I, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.root, f)
    }
}
