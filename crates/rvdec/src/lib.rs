//! RISC-V instruction decoder.
//!
//! A decoder is built from declarative ISA JSON files and hands back
//! rich decoded-instruction values through a caller-supplied allocator:
//!
//! ```ignore
//! let mut decoder: Decoder<MyAlloc, MyAnno> = Decoder::new(
//!     &isa_files, &anno_files, &uid_list, &overrides, MyAlloc)?;
//! let inst = decoder.make_inst(0x003100b3)?; // add x3, x1, x2
//! assert_eq!(inst.mnemonic(), "add");
//! ```
//!
//! Multiple independently configured contexts can live side by side;
//! `switch_context` selects the active one.

mod context;

pub use context::{Context, ContextRegistry};
pub use rvdec_isa::*;

use std::path::Path;
use std::sync::Arc;

/// Name of the context every decoder starts with.
pub const BASE_CONTEXT: &str = "BASE";

/// The canonical NOP encoding (`addi x0, x0, 0`).
pub const CANONICAL_NOP: Opcode = 0x13;

/// Decoder facade.
///
/// `AL` allocates the user's decoded-instruction values, `A` is the
/// annotation payload attached per mnemonic from the annotation JSONs.
#[derive(Debug)]
pub struct Decoder<AL, A>
where
    AL: InstAllocator<A>,
    A: Annotation,
{
    allocator: AL,
    contexts: ContextRegistry<AL::Inst, A>,
    current: String,
}

impl<AL, A> Decoder<AL, A>
where
    AL: InstAllocator<A>,
    A: Annotation,
{
    /// Build a decoder with a `BASE` context from ISA and annotation
    /// files.
    pub fn new<P: AsRef<Path>>(
        isa_files: &[P],
        anno_files: &[P],
        uid_list: &InstUidList,
        anno_overrides: &AnnotationOverrides,
        allocator: AL,
    ) -> Result<Self> {
        Self::with_filters(
            isa_files,
            anno_files,
            uid_list,
            anno_overrides,
            &MatchSet::default(),
            &MatchSet::default(),
            allocator,
        )
    }

    /// Build a decoder with tag inclusion/exclusion filters.
    #[allow(clippy::too_many_arguments)]
    pub fn with_filters<P: AsRef<Path>>(
        isa_files: &[P],
        anno_files: &[P],
        uid_list: &InstUidList,
        anno_overrides: &AnnotationOverrides,
        inclusions: &MatchSet<Pattern>,
        exclusions: &MatchSet<Pattern>,
        allocator: AL,
    ) -> Result<Self> {
        let mut contexts = ContextRegistry::new();
        contexts.make_context(
            BASE_CONTEXT,
            isa_files,
            anno_files,
            uid_list,
            anno_overrides,
            inclusions,
            exclusions,
        )?;
        Ok(Self {
            allocator,
            contexts,
            current: BASE_CONTEXT.to_string(),
        })
    }

    /// Build another named context alongside the existing ones.
    #[allow(clippy::too_many_arguments)]
    pub fn make_context<P: AsRef<Path>>(
        &mut self,
        name: &str,
        isa_files: &[P],
        anno_files: &[P],
        uid_list: &InstUidList,
        anno_overrides: &AnnotationOverrides,
        inclusions: &MatchSet<Pattern>,
        exclusions: &MatchSet<Pattern>,
    ) -> Result<()> {
        self.contexts.make_context(
            name,
            isa_files,
            anno_files,
            uid_list,
            anno_overrides,
            inclusions,
            exclusions,
        )
    }

    /// Make `name` the active context.
    pub fn switch_context(&mut self, name: &str) -> Result<()> {
        self.contexts.get(name)?;
        self.current = name.to_string();
        Ok(())
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.has_context(name)
    }

    fn context(&self) -> Result<&Context<AL::Inst, A>> {
        self.contexts.get(&self.current)
    }

    fn context_mut(&mut self) -> Result<&mut Context<AL::Inst, A>> {
        self.contexts.get_mut(&self.current)
    }

    /// Decode an opcode word into an instruction value.
    pub fn make_inst(&mut self, opcode: Opcode) -> Result<AL::Inst> {
        let Self {
            allocator,
            contexts,
            current,
        } = self;
        contexts.get_mut(current)?.dtable.make_inst(opcode, allocator)
    }

    /// Decode from a trace record; the trace's mnemonic wins on
    /// disagreement.
    pub fn make_inst_from_trace<T: TraceInfo>(&mut self, tinfo: &T) -> Result<AL::Inst> {
        let Self {
            allocator,
            contexts,
            current,
        } = self;
        contexts
            .get_mut(current)?
            .dtable
            .make_inst_from_trace(tinfo, allocator)
    }

    /// Construct an instruction from direct extraction info.
    pub fn make_inst_directly(&self, ex_info: &dyn DirectExtractor) -> Result<AL::Inst> {
        self.context()?
            .dtable
            .make_inst_directly(ex_info, &self.allocator)
    }

    /// Construct a pseudo instruction from direct extraction info.
    pub fn make_pseudo_inst(&self, ex_info: &dyn DirectExtractor) -> Result<AL::Inst> {
        let context = self.context()?;
        let factory = if ex_info.uid() != INVALID_UID {
            context.pseudo.find_factory_by_uid(ex_info.uid())?
        } else {
            context.pseudo.find_factory(ex_info.mnemonic())?
        };
        let info = factory.get_info_bypass_cache(0, ex_info.clone_extractor());
        Ok(self
            .allocator
            .construct(&info.opinfo, info.annotation.as_ref()))
    }

    /// Morph an existing instruction in place.
    pub fn morph_inst(&self, inst: &mut AL::Inst, ex_info: &dyn DirectExtractor) -> Result<()> {
        self.context()?.dtable.morph_inst(inst, ex_info)
    }

    /// Decode to factory info without constructing an instruction.
    pub fn get_info(&mut self, opcode: Opcode) -> Result<Arc<FactoryInfo<A>>> {
        self.context_mut()?.dtable.get_info(opcode)
    }

    /// Cache-free decode, usable through a shared reference.
    pub fn get_info_uncached(&self, opcode: Opcode) -> Result<Arc<FactoryInfo<A>>> {
        self.context()?.dtable.get_info_uncached(opcode)
    }

    pub fn is_opcode_inst_type(&mut self, opcode: Opcode, itype: InstructionTypes) -> Result<bool> {
        Ok(self.get_info(opcode)?.opinfo.is_inst_type(itype))
    }

    pub fn is_opcode_extracted_inst_type(
        &mut self,
        opcode: Opcode,
        itype: ExtractedInstTypes,
    ) -> Result<bool> {
        self.get_info(opcode)?.opinfo.is_extracted_inst_type(itype)
    }

    pub fn lookup_inst_uid(&self, mnemonic: &str) -> Result<InstUid> {
        self.context()?.dtable.builder().find_uid(mnemonic)
    }

    pub fn lookup_inst_mnemonic(&self, uid: InstUid) -> Result<String> {
        Ok(self.context()?.dtable.builder().find_mnemonic(uid)?.to_string())
    }

    pub fn lookup_pseudo_inst_uid(&self, mnemonic: &str) -> Result<InstUid> {
        self.context()?.pseudo.find_uid(mnemonic)
    }

    pub fn lookup_pseudo_inst_mnemonic(&self, uid: InstUid) -> Result<String> {
        Ok(self.context()?.pseudo.find_mnemonic(uid)?.to_string())
    }

    /// The stencil registered for a mnemonic.
    pub fn get_opcode(&self, mnemonic: &str) -> Result<Opcode> {
        self.context()?.dtable.get_opcode(mnemonic)
    }

    /// Reset the active context's decode caches.
    pub fn flush_caches(&mut self) -> Result<()> {
        self.context_mut()?.dtable.flush_caches();
        Ok(())
    }
}

impl<AL, A> std::fmt::Display for Decoder<AL, A>
where
    AL: InstAllocator<A>,
    A: Annotation,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.context() {
            Ok(context) => std::fmt::Display::fmt(&context.dtable, f),
            Err(_) => writeln!(f, "<no active context>"),
        }
    }
}
