//! Named decoder contexts.

use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::debug;

use rvdec_isa::{
    Annotation, AnnotationOverrides, DTable, DecodeError, DecodedInst, FactoryBuilder,
    InstUidList, MatchSet, Pattern, PseudoBuilder, Result,
};

/// One fully built decoder context: the decode table (which owns its
/// builder and caches) plus the pseudo-instruction builder.
#[derive(Debug)]
pub struct Context<I, A> {
    pub(crate) dtable: DTable<I, A>,
    pub(crate) pseudo: PseudoBuilder<A>,
}

/// Registry of independent, named decoder contexts.
///
/// Contexts are built once and never mutated afterwards (caches aside);
/// creating one does not affect another.
#[derive(Debug)]
pub struct ContextRegistry<I, A> {
    registry: FxHashMap<String, Context<I, A>>,
}

impl<I, A> ContextRegistry<I, A>
where
    I: DecodedInst<A>,
    A: Annotation,
{
    pub fn new() -> Self {
        Self {
            registry: FxHashMap::default(),
        }
    }

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
        if self.registry.contains_key(name) {
            return Err(DecodeError::ContextAlreadyExists(name.to_string()));
        }

        let builder = FactoryBuilder::new(anno_files, uid_list, anno_overrides)?;
        let mut dtable = DTable::new(builder);
        dtable.configure(isa_files, inclusions, exclusions)?;

        let mut pseudo = PseudoBuilder::new();
        pseudo.adopt(dtable.builder());

        debug!(context = name, "context built");
        self.registry.insert(
            name.to_string(),
            Context { dtable, pseudo },
        );
        Ok(())
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Context<I, A>> {
        self.registry
            .get(name)
            .ok_or_else(|| DecodeError::UnknownContext(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Context<I, A>> {
        self.registry
            .get_mut(name)
            .ok_or_else(|| DecodeError::UnknownContext(name.to_string()))
    }
}

impl<I, A> Default for ContextRegistry<I, A>
where
    I: DecodedInst<A>,
    A: Annotation,
{
    fn default() -> Self {
        Self::new()
    }
}
