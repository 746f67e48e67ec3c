//! Factory builder: turns ISA JSON entries into factories.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{DecodeError, Result};
use crate::extract::{ExtractOpts, Extractor, FormExtractor, ImpliedOperand};
use crate::factory::{Factory, Overlay};
use crate::form::FormKind;
use crate::inst::Annotation;
use crate::json::{parse_hex, ImplicitSpec, InstEntry, OperSpec, OverlaySpec};
use crate::meta::{
    AnnotationOverrides, InstMetaData, InstUid, InstUidList, InstructionTypes, UidRegistry,
    INVALID_UID,
};
use crate::operand::{OperandFieldId, RegisterType};
use crate::tag::{MatchSet, Pattern};
use crate::Opcode;

/// Builder output: the base factories to install in the trie.
#[derive(Debug)]
pub struct BuildOutput<A> {
    pub trie_factories: Vec<Arc<Factory<A>>>,
}

/// Ingests ISA JSON entries and produces factories, resolving overlays
/// and registering everything for mnemonic/UID lookup.
#[derive(Debug)]
pub struct FactoryBuilder<A> {
    uids: UidRegistry,
    annotations: FxHashMap<String, serde_json::Value>,
    factories: FxHashMap<String, Arc<Factory<A>>>,
    factories_by_uid: FxHashMap<InstUid, Arc<Factory<A>>>,
}

impl<A: Annotation> FactoryBuilder<A> {
    /// Create a builder from annotation files, UID reservations, and
    /// annotation overrides.
    ///
    /// Overrides are `(mnemonic, "attr:value")` pairs; the value fragment
    /// is parsed as JSON (a bare word falls back to a string) and merged
    /// into that mnemonic's annotation object before construction.
    pub fn new<P: AsRef<Path>>(
        anno_files: &[P],
        uid_list: &InstUidList,
        anno_overrides: &AnnotationOverrides,
    ) -> Result<Self> {
        let mut annotations: FxHashMap<String, serde_json::Value> = FxHashMap::default();
        for path in anno_files {
            for (mnemonic, value) in crate::json::load_annotation_file(path.as_ref())? {
                match annotations.get_mut(&mnemonic) {
                    Some(serde_json::Value::Object(existing)) => {
                        if let serde_json::Value::Object(incoming) = value {
                            existing.extend(incoming);
                        }
                    }
                    _ => {
                        annotations.insert(mnemonic, value);
                    }
                }
            }
        }

        for (mnemonic, nvp) in anno_overrides {
            let (attr, raw) = nvp.split_once(':').ok_or_else(|| DecodeError::BadAnnotation {
                mnemonic: mnemonic.clone(),
                reason: format!("override {nvp:?} is not of the form attr:value"),
            })?;
            let value: serde_json::Value = serde_json::from_str(raw.trim())
                .unwrap_or_else(|_| serde_json::Value::String(raw.trim().to_string()));
            let entry = annotations
                .entry(mnemonic.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            match entry {
                serde_json::Value::Object(map) => {
                    map.insert(attr.trim().to_string(), value);
                }
                _ => {
                    return Err(DecodeError::BadAnnotation {
                        mnemonic: mnemonic.clone(),
                        reason: "annotation payload is not an object".to_string(),
                    });
                }
            }
        }

        Ok(Self {
            uids: UidRegistry::new(uid_list),
            annotations,
            factories: FxHashMap::default(),
            factories_by_uid: FxHashMap::default(),
        })
    }

    /// Build factories from parsed entries, applying the tag filter and
    /// resolving overlays in declaration order.
    pub fn build(
        &mut self,
        entries: Vec<InstEntry>,
        inclusions: &MatchSet<Pattern>,
        exclusions: &MatchSet<Pattern>,
    ) -> Result<BuildOutput<A>> {
        let mut bases: Vec<String> = Vec::new();
        let mut pending: FxHashMap<String, Factory<A>> = FxHashMap::default();
        let mut overlays: Vec<(InstEntry, OverlaySpec)> = Vec::new();

        for entry in entries {
            let tags = MatchSet::tags(&entry.tags);
            if !inclusions.is_empty() && !inclusions.match_any_any(&tags) {
                debug!(mnemonic = %entry.mnemonic, "skipped by inclusion filter");
                continue;
            }
            if exclusions.match_any_any(&tags) {
                debug!(mnemonic = %entry.mnemonic, "skipped by exclusion filter");
                continue;
            }
            let mut entry = entry;
            match entry.overlay.take() {
                Some(spec) => overlays.push((entry, spec)),
                None => {
                    let mnemonic = entry.mnemonic.clone();
                    let factory = self.build_factory(&entry)?;
                    if pending.contains_key(&mnemonic) || self.factories.contains_key(&mnemonic) {
                        return Err(DecodeError::AmbiguousOpcode {
                            mnemonic: mnemonic.clone(),
                            existing: mnemonic,
                        });
                    }
                    bases.push(mnemonic.clone());
                    pending.insert(mnemonic, factory);
                }
            }
        }

        // Overlays attach to their base in JSON order; the first whose
        // predicate holds wins at decode time.
        for (entry, spec) in overlays {
            let base = pending.get_mut(&spec.base).ok_or_else(|| {
                DecodeError::OverlayBaseNotFound {
                    overlay: entry.mnemonic.clone(),
                    base: spec.base.clone(),
                }
            })?;
            let form = match entry.form.as_deref() {
                Some(name) => FormKind::from_name(&entry.mnemonic, name)?,
                None => base.form(),
            };
            let overlay_factory = Arc::new(self.build_factory_with_form(
                &entry,
                form,
                Some((base.stencil(), base.opcode_mask())),
            )?);
            let (mask, value, exclude) = overlay_predicate(&entry.mnemonic, form, &spec)?;
            self.register(&overlay_factory);
            base.push_overlay(Overlay::new(mask, value, exclude, Arc::clone(&overlay_factory)));
            debug!(overlay = %entry.mnemonic, base = %spec.base, "overlay attached");
        }

        let mut trie_factories = Vec::new();
        for mnemonic in bases {
            let Some(factory) = pending.remove(&mnemonic) else {
                continue;
            };
            let factory = Arc::new(factory);
            self.register(&factory);
            if factory.form() != FormKind::Pseudo {
                trie_factories.push(Arc::clone(&factory));
            }
        }

        Ok(BuildOutput { trie_factories })
    }

    fn register(&mut self, factory: &Arc<Factory<A>>) {
        self.factories
            .insert(factory.mnemonic().to_string(), Arc::clone(factory));
        self.factories_by_uid.insert(factory.uid(), Arc::clone(factory));
    }

    fn build_factory(&mut self, entry: &InstEntry) -> Result<Factory<A>> {
        let form_name = entry.form.as_deref().ok_or_else(|| DecodeError::MissingIsaKey {
            mnemonic: entry.mnemonic.clone(),
            key: "form".to_string(),
        })?;
        let form = FormKind::from_name(&entry.mnemonic, form_name)?;
        self.build_factory_with_form(entry, form, None)
    }

    fn build_factory_with_form(
        &mut self,
        entry: &InstEntry,
        form: FormKind,
        inherited_stencil: Option<(Opcode, Opcode)>,
    ) -> Result<Factory<A>> {
        let mnemonic = entry.mnemonic.as_str();

        let (mut stencil, mut mask) = match (&entry.stencil, inherited_stencil) {
            (Some(text), _) => {
                let raw = parse_hex(mnemonic, text)?;
                (raw & form.opcode_mask(), form.opcode_mask())
            }
            (None, Some((stencil, mask))) => (stencil, mask),
            (None, None) if form == FormKind::Pseudo => (0, 0),
            (None, None) => {
                return Err(DecodeError::MissingIsaKey {
                    mnemonic: mnemonic.to_string(),
                    key: "stencil".to_string(),
                });
            }
        };

        for (name, value) in &entry.fixed {
            let field = form.field(name).ok_or_else(|| DecodeError::UnknownField {
                mnemonic: mnemonic.to_string(),
                field: name.clone(),
            })?;
            stencil = (stencil & !field.mask()) | field.pack(*value);
            mask |= field.mask();
        }
        for name in &entry.ignore {
            let field = form.field(name).ok_or_else(|| DecodeError::UnknownField {
                mnemonic: mnemonic.to_string(),
                field: name.clone(),
            })?;
            stencil &= !field.mask();
            mask &= !field.mask();
        }

        let mut inst_types = InstructionTypes::empty();
        for name in &entry.itypes {
            match InstructionTypes::from_name(name) {
                Some(t) => inst_types |= t,
                None => warn!(mnemonic, itype = %name, "unknown instruction type"),
            }
        }

        let mut oper_types: FxHashMap<OperandFieldId, RegisterType> = FxHashMap::default();
        let mut default_source = RegisterType::Long;
        let mut default_dest = RegisterType::Long;
        let hints = [
            (&entry.w_oper, RegisterType::Word),
            (&entry.l_oper, RegisterType::Long),
            (&entry.s_oper, RegisterType::Single),
            (&entry.d_oper, RegisterType::Double),
            (&entry.q_oper, RegisterType::Quad),
            (&entry.h_oper, RegisterType::Half),
            (&entry.v_oper, RegisterType::Vector),
        ];
        for (spec, rtype) in hints {
            match spec {
                None => {}
                Some(OperSpec::All(word)) if word == "all" => {
                    default_source = rtype;
                    default_dest = rtype;
                }
                Some(OperSpec::All(word)) => {
                    return Err(DecodeError::MissingIsaKey {
                        mnemonic: mnemonic.to_string(),
                        key: format!("operand hint list (got {word:?})"),
                    });
                }
                Some(OperSpec::Fields(fields)) => {
                    for name in fields {
                        let field =
                            OperandFieldId::from_name(name).ok_or_else(|| DecodeError::UnknownField {
                                mnemonic: mnemonic.to_string(),
                                field: name.clone(),
                            })?;
                        oper_types.insert(field, rtype);
                    }
                }
            }
        }

        let uid = self.uids.assign(mnemonic);
        let meta = Arc::new(InstMetaData::new(
            mnemonic.to_string(),
            uid,
            inst_types,
            entry.isa.clone(),
            MatchSet::tags(&entry.tags),
            oper_types,
            default_source,
            default_dest,
            entry.data.unwrap_or(64),
        ));

        let opts = build_opts(mnemonic, entry)?;
        let extractor: Arc<dyn Extractor> = Arc::new(FormExtractor::with_opts(form, opts));

        let annotation = match self.annotations.get(mnemonic) {
            Some(value) => Some(Arc::new(A::from_json(mnemonic, value)?)),
            None => None,
        };

        debug!(mnemonic, ?form, stencil, "factory built");

        Ok(Factory::new(
            Arc::from(mnemonic),
            uid,
            form,
            stencil,
            mask,
            meta,
            extractor,
            annotation,
        ))
    }

    pub fn find_factory(&self, mnemonic: &str) -> Option<&Arc<Factory<A>>> {
        self.factories.get(mnemonic)
    }

    pub fn find_factory_by_uid(&self, uid: InstUid) -> Option<&Arc<Factory<A>>> {
        self.factories_by_uid.get(&uid)
    }

    pub fn find_uid(&self, mnemonic: &str) -> Result<InstUid> {
        self.factories
            .get(mnemonic)
            .map(|f| f.uid())
            .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))
    }

    pub fn find_mnemonic(&self, uid: InstUid) -> Result<&str> {
        self.factories_by_uid
            .get(&uid)
            .map(|f| f.mnemonic().as_ref())
            .ok_or_else(|| DecodeError::UnknownMnemonic(format!("uid {uid}")))
    }
}

fn build_opts(mnemonic: &str, entry: &InstEntry) -> Result<ExtractOpts> {
    let mut opts = ExtractOpts {
        hide: entry.hide.iter().cloned().collect(),
        signed_imm: entry.imm_signed,
        ..Default::default()
    };
    if let Some(text) = &entry.imm_mask {
        opts.imm_mask = Some(parse_hex(mnemonic, text)?);
    }
    if let Some(implicit) = &entry.implicit {
        apply_implicit(mnemonic, implicit, &mut opts)?;
    }
    Ok(opts)
}

fn apply_implicit(mnemonic: &str, spec: &ImplicitSpec, opts: &mut ExtractOpts) -> Result<()> {
    opts.implied_imm = spec.imm.map(|v| v as u64);
    for op in &spec.sources {
        let field_id = OperandFieldId::from_name(&op.field).ok_or_else(|| DecodeError::UnknownField {
            mnemonic: mnemonic.to_string(),
            field: op.field.clone(),
        })?;
        opts.implied_sources.push(ImpliedOperand {
            field_id,
            reg: op.reg,
            is_store_data: op.data,
        });
    }
    for op in &spec.dests {
        let field_id = OperandFieldId::from_name(&op.field).ok_or_else(|| DecodeError::UnknownField {
            mnemonic: mnemonic.to_string(),
            field: op.field.clone(),
        })?;
        opts.implied_dests.push(ImpliedOperand {
            field_id,
            reg: op.reg,
            is_store_data: op.data,
        });
    }
    Ok(())
}

/// Compute the overlay predicate from the field-level match spec.
fn overlay_predicate(
    mnemonic: &str,
    form: FormKind,
    spec: &OverlaySpec,
) -> Result<(Opcode, Opcode, Vec<(Opcode, Opcode)>)> {
    let mut mask = 0u64;
    let mut value = 0u64;
    for (name, v) in &spec.field_match {
        let field = form.field(name).ok_or_else(|| DecodeError::UnknownField {
            mnemonic: mnemonic.to_string(),
            field: name.clone(),
        })?;
        mask |= field.mask();
        value |= field.pack(*v);
    }
    if let Some(text) = &spec.match_mask {
        mask |= parse_hex(mnemonic, text)?;
    }
    if let Some(text) = &spec.match_value {
        value |= parse_hex(mnemonic, text)?;
    }
    let mut exclude = Vec::new();
    for (name, v) in &spec.exclude {
        let field = form.field(name).ok_or_else(|| DecodeError::UnknownField {
            mnemonic: mnemonic.to_string(),
            field: name.clone(),
        })?;
        exclude.push((field.mask(), field.pack(*v)));
    }
    Ok((mask, value, exclude))
}

/// Pseudo-instruction builder: factories reachable by name or UID only,
/// never matched against opcode words.
#[derive(Debug)]
pub struct PseudoBuilder<A> {
    factories: FxHashMap<String, Arc<Factory<A>>>,
    factories_by_uid: FxHashMap<InstUid, Arc<Factory<A>>>,
}

impl<A: Annotation> PseudoBuilder<A> {
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
            factories_by_uid: FxHashMap::default(),
        }
    }

    /// Register the pseudo-form factories found in `builder`.
    pub fn adopt(&mut self, builder: &FactoryBuilder<A>) {
        for factory in builder.factories.values() {
            if factory.form() == FormKind::Pseudo {
                self.factories
                    .insert(factory.mnemonic().to_string(), Arc::clone(factory));
                self.factories_by_uid.insert(factory.uid(), Arc::clone(factory));
            }
        }
    }

    pub fn find_factory(&self, mnemonic: &str) -> Result<&Arc<Factory<A>>> {
        self.factories
            .get(mnemonic)
            .ok_or_else(|| DecodeError::UnknownPseudoMnemonic(mnemonic.to_string()))
    }

    pub fn find_factory_by_uid(&self, uid: InstUid) -> Result<&Arc<Factory<A>>> {
        self.factories_by_uid
            .get(&uid)
            .ok_or_else(|| DecodeError::UnknownPseudoMnemonic(format!("uid {uid}")))
    }

    pub fn find_uid(&self, mnemonic: &str) -> Result<InstUid> {
        Ok(self.find_factory(mnemonic)?.uid())
    }

    pub fn find_mnemonic(&self, uid: InstUid) -> Result<&str> {
        Ok(self.find_factory_by_uid(uid)?.mnemonic().as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<A: Annotation> Default for PseudoBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = {
    // INVALID_UID is never handed out by the registry; pseudo lookups by
    // UID rely on that.
    assert!(INVALID_UID == 0);
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::NoAnnotation;

    fn builder() -> FactoryBuilder<NoAnnotation> {
        FactoryBuilder::new::<&str>(&[], &Vec::new(), &Vec::new()).unwrap()
    }

    fn entries(json: &str) -> Vec<InstEntry> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_build_and_lookup() {
        let mut b = builder();
        let output = b
            .build(
                entries(
                    r#"[{ "mnemonic": "add", "form": "R", "stencil": "0x33",
                          "type": ["int", "arith"], "tags": ["i", "g"] }]"#,
                ),
                &MatchSet::default(),
                &MatchSet::default(),
            )
            .unwrap();
        assert_eq!(output.trie_factories.len(), 1);
        let factory = b.find_factory("add").unwrap();
        assert_eq!(factory.stencil(), 0x33);
        assert!(factory.meta().is_inst_type(InstructionTypes::INT));
    }

    #[test]
    fn test_overlay_base_not_found() {
        let mut b = builder();
        let err = b
            .build(
                entries(
                    r#"[{ "mnemonic": "mv", "type": ["int", "move"],
                          "overlay": { "base": "addi", "match": {"imm12": 0} } }]"#,
                ),
                &MatchSet::default(),
                &MatchSet::default(),
            )
            .unwrap_err();
        assert!(matches!(err, DecodeError::OverlayBaseNotFound { .. }));
    }

    #[test]
    fn test_tag_exclusion_drops_entry() {
        let mut b = builder();
        let exclusions = MatchSet::patterns(&["pf".to_string()]).unwrap();
        let output = b
            .build(
                entries(
                    r#"[{ "mnemonic": "prefetch.i", "form": "I", "stencil": "0x6013",
                          "type": ["int", "prefetch"], "tags": ["pf"] }]"#,
                ),
                &MatchSet::default(),
                &exclusions,
            )
            .unwrap();
        assert!(output.trie_factories.is_empty());
        assert!(b.find_factory("prefetch.i").is_none());
    }

    #[test]
    fn test_pseudo_not_in_trie() {
        let mut b = builder();
        let output = b
            .build(
                entries(
                    r#"[{ "mnemonic": "cmov", "form": "PSEUDO",
                          "type": ["int", "move", "cond"] }]"#,
                ),
                &MatchSet::default(),
                &MatchSet::default(),
            )
            .unwrap();
        assert!(output.trie_factories.is_empty());
        assert!(b.find_factory("cmov").is_some());

        let mut pseudo: PseudoBuilder<NoAnnotation> = PseudoBuilder::new();
        pseudo.adopt(&b);
        assert!(pseudo.find_factory("cmov").is_ok());
        assert!(pseudo.find_factory("nothere").is_err());
    }

    #[test]
    fn test_fixed_tightens_stencil() {
        let mut b = builder();
        b.build(
            entries(
                r#"[{ "mnemonic": "lr.w", "form": "AMO", "stencil": "0x1000202f",
                      "type": ["int", "load", "atomic"], "fixed": {"rs2": 0},
                      "hide": ["rs2"] }]"#,
            ),
            &MatchSet::default(),
            &MatchSet::default(),
        )
        .unwrap();
        let factory = b.find_factory("lr.w").unwrap();
        assert_ne!(factory.opcode_mask() & crate::form::RS2.mask(), 0);
    }
}
