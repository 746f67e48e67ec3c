//! The RISC-V extension manager.
//!
//! Turns an ISA string (textual or embedded in an ELF) plus an
//! extension-spec JSON into the set of enabled extensions and the list of
//! instruction-definition JSONs to load for a decoder context.

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use rvdec::{Annotation, AnnotationOverrides, Decoder, InstAllocator, InstUidList};
use rvdec_isa::{MatchSet, Pattern};

use crate::error::{ExtensionError, Result};
use crate::spec::{EnabledBy, ExtensionSpec, UnknownExtensionAction};

pub const DEFAULT_MAJOR_VERSION: u32 = 2;
pub const DEFAULT_MINOR_VERSION: u32 = 0;

const VALID_XLENS: [u32; 2] = [32, 64];

#[derive(Debug)]
struct ExtensionInfo {
    jsons: Vec<String>,
    internal: bool,
    enabled: bool,
    force_enabled: bool,
    enables: Vec<String>,
    enabled_by: Vec<Vec<String>>,
    requires: Vec<String>,
    conflicts: Vec<String>,
    version: (u32, u32),
}

/// All extension state for one XLEN.
#[derive(Debug, Default)]
struct XlenState {
    order: Vec<String>,
    extensions: FxHashMap<String, ExtensionInfo>,
    meta_extensions: FxHashMap<String, Vec<String>>,
    aliases: FxHashMap<String, String>,
    base_extensions: FxHashSet<String>,
    meta_order: Vec<String>,
}

impl XlenState {
    /// Expand a name through aliases and meta-extensions to the concrete
    /// extensions it denotes.
    fn resolve(&self, name: &str, out: &mut Vec<String>, visiting: &mut Vec<String>) -> Result<()> {
        if visiting.iter().any(|v| v == name) {
            return Err(ExtensionError::CircularDependency(name.to_string()));
        }
        if let Some(target) = self.aliases.get(name) {
            visiting.push(name.to_string());
            self.resolve(target, out, visiting)?;
            visiting.pop();
        } else if let Some(members) = self.meta_extensions.get(name) {
            visiting.push(name.to_string());
            for member in members {
                self.resolve(member, out, visiting)?;
            }
            visiting.pop();
        } else {
            out.push(name.to_string());
        }
        Ok(())
    }

    fn resolve_all(&self, name: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.resolve(name, &mut out, &mut Vec::new())?;
        Ok(out)
    }

    fn enable(&mut self, xlen: u32, name: &str, action: UnknownExtensionAction) -> Result<()> {
        for concrete in self.resolve_all(name)? {
            if self.extensions.contains_key(&concrete) {
                self.set_enabled(&concrete);
            } else {
                match action {
                    UnknownExtensionAction::Error => {
                        return Err(ExtensionError::UnknownExtension {
                            xlen,
                            ext: concrete,
                        });
                    }
                    UnknownExtensionAction::Warn => {
                        warn!(xlen, ext = %concrete, "unknown extension ignored");
                    }
                    UnknownExtensionAction::Ignore => {}
                }
            }
        }
        Ok(())
    }

    fn set_enabled(&mut self, name: &str) {
        let enables = match self.extensions.get_mut(name) {
            Some(info) => {
                info.enabled = true;
                info.enables.clone()
            }
            None => return,
        };
        for dep in enables {
            self.force_enable(&dep);
        }
    }

    /// Transitive force-enable; the flag doubles as the visited mark.
    fn force_enable(&mut self, name: &str) {
        let Ok(concrete) = self.resolve_all(name) else {
            return;
        };
        for name in concrete {
            let enables = match self.extensions.get_mut(&name) {
                Some(info) if !info.force_enabled => {
                    info.enabled = true;
                    info.force_enabled = true;
                    info.enables.clone()
                }
                _ => continue,
            };
            for dep in enables {
                self.force_enable(&dep);
            }
        }
    }

    fn set_version(&mut self, name: &str, major: u32, minor: u32) -> Result<()> {
        for concrete in self.resolve_all(name)? {
            if let Some(info) = self.extensions.get_mut(&concrete) {
                info.version = (major, minor);
            }
        }
        Ok(())
    }

    /// Ultimately enabled: force-enabled, or explicitly enabled with any
    /// `enabled_by` AND-group (if declared) fully enabled.
    fn is_enabled(&self, name: &str) -> bool {
        let Some(info) = self.extensions.get(name) else {
            return false;
        };
        if info.force_enabled {
            return true;
        }
        if !info.enabled {
            return false;
        }
        info.enabled_by.is_empty()
            || info.enabled_by.iter().any(|group| {
                group.iter().all(|dep| {
                    self.resolve_all(dep).is_ok_and(|deps| {
                        deps.iter().all(|d| {
                            self.extensions
                                .get(d)
                                .is_some_and(|i| i.force_enabled || i.enabled)
                        })
                    })
                })
            })
    }

    /// Validate requires/conflicts for every enabled extension.
    fn finalize(
        &self,
        allowlist: &FxHashSet<String>,
        blocklist: &FxHashSet<String>,
    ) -> Result<()> {
        for name in &self.order {
            if !self.is_enabled(name) {
                continue;
            }
            let info = &self.extensions[name];

            for required in &info.requires {
                let deps = self.resolve_all(required)?;
                if deps.is_empty() {
                    return Err(ExtensionError::UnresolvedDependency {
                        ext: name.clone(),
                        dependency: required.clone(),
                    });
                }
                for dep in deps {
                    if !self.extensions.contains_key(&dep) {
                        return Err(ExtensionError::UnresolvedDependency {
                            ext: name.clone(),
                            dependency: dep,
                        });
                    }
                    if !self.is_enabled(&dep) {
                        return Err(ExtensionError::MissingRequiredExtension {
                            ext: name.clone(),
                            required: dep,
                        });
                    }
                }
            }
            for conflict in &info.conflicts {
                for dep in self.resolve_all(conflict)? {
                    if self.is_enabled(&dep) {
                        return Err(ExtensionError::ConflictingExtension {
                            ext: name.clone(),
                            conflict: dep,
                        });
                    }
                }
            }
            if !info.internal {
                if blocklist.contains(name) {
                    return Err(ExtensionError::ExtensionNotAllowed(name.clone()));
                }
                if !allowlist.is_empty() && !allowlist.contains(name) {
                    return Err(ExtensionError::ExtensionNotAllowed(name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Reject cycles in the `enables` graph.
    fn check_enables_cycles(&self) -> Result<()> {
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        fn visit(
            state: &XlenState,
            name: &str,
            colors: &mut FxHashMap<String, u8>,
        ) -> Result<()> {
            match colors.get(name).copied().unwrap_or(WHITE) {
                BLACK => return Ok(()),
                GREY => return Err(ExtensionError::CircularDependency(name.to_string())),
                _ => {}
            }
            colors.insert(name.to_string(), GREY);
            if let Some(info) = state.extensions.get(name) {
                for dep in &info.enables {
                    for concrete in state.resolve_all(dep)? {
                        visit(state, &concrete, colors)?;
                    }
                }
            }
            colors.insert(name.to_string(), BLACK);
            Ok(())
        }

        let mut colors = FxHashMap::default();
        for name in &self.order {
            visit(self, name, &mut colors)?;
        }
        Ok(())
    }
}

/// Extension manager for the RISC-V ISA-string grammar.
#[derive(Debug)]
pub struct RiscvExtensionManager {
    action: UnknownExtensionAction,
    states: FxHashMap<u32, XlenState>,
    json_dir: PathBuf,
    isa: String,
    xlen: u32,
    allowlist: FxHashSet<String>,
    blocklist: FxHashSet<String>,
}

impl RiscvExtensionManager {
    /// Load the extension spec; no ISA is selected yet.
    pub fn from_isa_spec_json<P: AsRef<Path>>(spec_json: P, json_dir: P) -> Result<Self> {
        let json_dir = json_dir.as_ref().to_path_buf();
        if !json_dir.is_dir() {
            return Err(ExtensionError::InvalidJsonDirectory(
                json_dir.display().to_string(),
            ));
        }

        let spec = ExtensionSpec::load(spec_json.as_ref())?;
        let mut states: FxHashMap<u32, XlenState> = FxHashMap::default();

        for entry in &spec.extensions {
            let (name, xlens) = entry.validate()?;
            for dep in entry
                .enables
                .iter()
                .chain(&entry.requires)
                .chain(&entry.conflicts)
            {
                if dep == name {
                    return Err(ExtensionError::SelfReferential(name.to_string()));
                }
            }
            for xlen in xlens {
                if !VALID_XLENS.contains(&xlen) {
                    continue;
                }
                let state = states.entry(xlen).or_default();

                if let Some(meta) = &entry.meta_extension {
                    for meta_name in meta.to_vec() {
                        if !state.meta_extensions.contains_key(&meta_name) {
                            state.meta_order.push(meta_name.clone());
                            state.meta_extensions.insert(meta_name.clone(), Vec::new());
                        }
                        if let Some(members) = state.meta_extensions.get_mut(&meta_name) {
                            members.push(name.to_string());
                        }
                    }
                }

                if entry.is_base_extension {
                    state.base_extensions.insert(name.to_string());
                }

                if entry.is_meta_extension {
                    // A pure grouping; carries no factory JSONs itself.
                    if !state.meta_extensions.contains_key(name) {
                        state.meta_order.push(name.to_string());
                        state.meta_extensions.insert(name.to_string(), Vec::new());
                    }
                    continue;
                }

                if state.extensions.contains_key(name) {
                    return Err(ExtensionError::DuplicateExtension(name.to_string()));
                }
                for alias in &entry.aliases {
                    state.aliases.insert(alias.clone(), name.to_string());
                }
                state.order.push(name.to_string());
                state.extensions.insert(
                    name.to_string(),
                    ExtensionInfo {
                        jsons: entry.jsons.clone(),
                        internal: entry.internal,
                        enabled: false,
                        force_enabled: false,
                        enables: entry.enables.clone(),
                        enabled_by: entry
                            .enabled_by
                            .as_ref()
                            .map(EnabledBy::groups)
                            .unwrap_or_default(),
                        requires: entry.requires.clone(),
                        conflicts: entry.conflicts.clone(),
                        version: (DEFAULT_MAJOR_VERSION, DEFAULT_MINOR_VERSION),
                    },
                );
            }
        }

        for state in states.values() {
            state.check_enables_cycles()?;
        }

        Ok(Self {
            action: spec.unknown_extension_action,
            states,
            json_dir,
            isa: String::new(),
            xlen: 0,
            allowlist: FxHashSet::default(),
            blocklist: FxHashSet::default(),
        })
    }

    /// Load the spec and select an ISA in one step.
    pub fn from_isa<P: AsRef<Path>>(isa: &str, spec_json: P, json_dir: P) -> Result<Self> {
        let mut manager = Self::from_isa_spec_json(spec_json, json_dir)?;
        manager.set_isa(isa)?;
        Ok(manager)
    }

    /// Read the ISA string from an ELF's `.riscv.attributes` section.
    pub fn from_elf<P: AsRef<Path>>(elf: P, spec_json: P, json_dir: P) -> Result<Self> {
        let mut manager = Self::from_isa_spec_json(spec_json, json_dir)?;
        let file = rvdec_elf::ElfFile::open(elf.as_ref())?;
        let isa = rvdec_elf::find_isa_string(&file)?
            .ok_or_else(|| ExtensionError::IsaNotFoundInElf(elf.as_ref().display().to_string()))?;
        manager.set_isa(&isa)?;
        Ok(manager)
    }

    /// Restrict which extensions may end up enabled. Must be configured
    /// before `set_isa`.
    pub fn set_allowlist<S: Into<String>>(&mut self, allow: impl IntoIterator<Item = S>) {
        self.allowlist = allow.into_iter().map(Into::into).collect();
    }

    pub fn set_blocklist<S: Into<String>>(&mut self, block: impl IntoIterator<Item = S>) {
        self.blocklist = block.into_iter().map(Into::into).collect();
    }

    /// Parse an ISA string and resolve the extension set.
    pub fn set_isa(&mut self, isa: &str) -> Result<()> {
        self.isa = isa.to_lowercase();
        let invalid = |reason: &str| ExtensionError::InvalidIsaString {
            isa: isa.to_string(),
            reason: reason.to_string(),
        };

        let s = self.isa.clone();
        if s.len() < 5 || !s.starts_with("rv") || !s.as_bytes()[2].is_ascii_digit() {
            return Err(invalid("expected rv<xlen><base>"));
        }

        let rest = &s[2..];
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let xlen: u32 = rest[..digits]
            .parse()
            .map_err(|_| invalid("could not determine xlen"))?;
        if !self.states.contains_key(&xlen) {
            return Err(invalid("invalid xlen"));
        }
        self.xlen = xlen;
        let action = self.action;
        let state = self
            .states
            .get_mut(&xlen)
            .ok_or_else(|| invalid("invalid xlen"))?;

        let mut view = &rest[digits..];
        if view.is_empty() {
            return Err(invalid("missing base extension"));
        }

        let base = &view[..1];
        if !state.base_extensions.contains(base) {
            return Err(ExtensionError::InvalidBaseExtension {
                ext: base.to_string(),
            });
        }
        state.enable(xlen, base, action)?;
        view = &view[1..];

        if view.starts_with(|c: char| c.is_ascii_digit()) {
            let (major, minor, next) = extract_versions(isa, view)?;
            state.set_version(base, major, minor)?;
            view = next;
        }

        // Single-character extensions until the first z/s/x letter.
        loop {
            let Some(c) = view.chars().next() else { break };
            if c == '_' {
                view = &view[1..];
                continue;
            }
            if matches!(c, 'z' | 's' | 'x') {
                break;
            }
            let ext = c.to_string();
            state.enable(xlen, &ext, action)?;
            view = &view[1..];
            if view.starts_with(|ch: char| ch.is_ascii_digit()) {
                let (major, minor, next) = extract_versions(isa, view)?;
                state.set_version(&ext, major, minor)?;
                view = next;
            }
        }

        // Multi-character extensions, underscore-separated.
        while !view.is_empty() {
            if let Some(stripped) = view.strip_prefix('_') {
                view = stripped;
                continue;
            }
            let end = view.find('_').unwrap_or(view.len());
            let token = &view[..end];
            let (name, version) = split_version_suffix(isa, token)?;
            state.enable(xlen, name, action)?;
            if let Some((major, minor)) = version {
                state.set_version(name, major, minor)?;
            }
            view = &view[end..];
        }

        state.finalize(&self.allowlist, &self.blocklist)?;
        debug!(isa = %self.isa, xlen, "ISA resolved");
        Ok(())
    }

    pub fn isa(&self) -> &str {
        &self.isa
    }

    pub fn xlen(&self) -> u32 {
        self.xlen
    }

    fn state(&self) -> Option<&XlenState> {
        self.states.get(&self.xlen)
    }

    /// Is an extension (or alias, or fully-enabled meta extension)
    /// enabled?
    pub fn is_enabled(&self, ext: &str) -> bool {
        let Some(state) = self.state() else {
            return false;
        };
        match state.resolve_all(ext) {
            Ok(concrete) if !concrete.is_empty() => {
                concrete.iter().all(|name| state.is_enabled(name))
            }
            _ => false,
        }
    }

    /// Names of the enabled extensions, internal-only ones filtered out.
    pub fn get_enabled_extensions(&self, include_meta: bool) -> Vec<String> {
        let Some(state) = self.state() else {
            return Vec::new();
        };
        let mut names: Vec<String> = state
            .order
            .iter()
            .filter(|name| state.is_enabled(name))
            .filter(|name| !state.extensions[*name].internal)
            .cloned()
            .collect();
        if include_meta {
            for meta in &state.meta_order {
                let members = &state.meta_extensions[meta];
                if !members.is_empty() && members.iter().all(|m| self.is_enabled(m)) {
                    names.push(meta.clone());
                }
            }
        }
        names
    }

    /// Version of an enabled extension.
    pub fn get_version(&self, ext: &str) -> Option<(u32, u32)> {
        self.state()?.extensions.get(ext).map(|i| i.version)
    }

    /// Instruction-definition JSONs of all enabled extensions, in spec
    /// order, deduplicated.
    pub fn get_jsons(&self) -> Vec<PathBuf> {
        let Some(state) = self.state() else {
            return Vec::new();
        };
        let mut seen = FxHashSet::default();
        let mut paths = Vec::new();
        for name in &state.order {
            if !state.is_enabled(name) {
                continue;
            }
            for json in &state.extensions[name].jsons {
                if seen.insert(json.clone()) {
                    paths.push(self.json_dir.join(json));
                }
            }
        }
        paths
    }

    /// Package the enabled extensions into a decoder.
    pub fn construct_decoder<AL, A, P>(
        &self,
        anno_files: &[P],
        uid_list: &InstUidList,
        anno_overrides: &AnnotationOverrides,
        inclusions: &MatchSet<Pattern>,
        exclusions: &MatchSet<Pattern>,
        allocator: AL,
    ) -> Result<Decoder<AL, A>>
    where
        AL: InstAllocator<A>,
        A: Annotation,
        P: AsRef<Path>,
    {
        let isa_files = self.get_jsons();
        let anno_files: Vec<PathBuf> = anno_files
            .iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        Ok(Decoder::with_filters(
            &isa_files,
            &anno_files,
            uid_list,
            anno_overrides,
            inclusions,
            exclusions,
            allocator,
        )?)
    }
}

/// Parse `<major>[p<minor>]` at the head of `view`.
fn extract_versions<'a>(isa: &str, view: &'a str) -> Result<(u32, u32, &'a str)> {
    let invalid = || ExtensionError::InvalidIsaString {
        isa: isa.to_string(),
        reason: "invalid version number".to_string(),
    };
    let digits = view
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(view.len());
    let major: u32 = view[..digits].parse().map_err(|_| invalid())?;
    let mut rest = &view[digits..];
    let mut minor = DEFAULT_MINOR_VERSION;
    if let Some(after_p) = rest.strip_prefix('p') {
        if !after_p.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let minor_digits = after_p
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_p.len());
        minor = after_p[..minor_digits].parse().map_err(|_| invalid())?;
        rest = &after_p[minor_digits..];
    }
    Ok((major, minor, rest))
}

/// Split a trailing `<major>[p<minor>]` version off a multi-character
/// extension token.
fn split_version_suffix<'a>(isa: &str, token: &'a str) -> Result<(&'a str, Option<(u32, u32)>)> {
    let invalid = || ExtensionError::InvalidIsaString {
        isa: isa.to_string(),
        reason: format!("invalid version number on {token}"),
    };
    let bytes = token.as_bytes();
    let mut i = token.len();
    while i > 0 && bytes[i - 1].is_ascii_digit() {
        i -= 1;
    }
    if i == token.len() {
        return Ok((token, None));
    }
    if i == 0 {
        return Err(invalid());
    }

    let mut name_end = i;
    let mut major_range = i..token.len();
    let minor_range;
    if bytes[i - 1] == b'p' {
        let p = i - 1;
        let mut j = p;
        while j > 0 && bytes[j - 1].is_ascii_digit() {
            j -= 1;
        }
        if j == p {
            return Err(invalid());
        }
        minor_range = Some(i..token.len());
        major_range = j..p;
        name_end = j;
    } else {
        minor_range = None;
    }

    let major: u32 = token[major_range].parse().map_err(|_| invalid())?;
    let minor: u32 = match minor_range {
        Some(range) => token[range].parse().map_err(|_| invalid())?,
        None => DEFAULT_MINOR_VERSION,
    };
    Ok((&token[..name_end], Some((major, minor))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_version_suffix() {
        assert_eq!(split_version_suffix("x", "zba").unwrap(), ("zba", None));
        assert_eq!(
            split_version_suffix("x", "zba2").unwrap(),
            ("zba", Some((2, 0)))
        );
        assert_eq!(
            split_version_suffix("x", "zba2p1").unwrap(),
            ("zba", Some((2, 1)))
        );
        assert!(split_version_suffix("x", "2p1").is_err());
    }

    #[test]
    fn test_extract_versions() {
        let (major, minor, rest) = extract_versions("x", "2p1mc").unwrap();
        assert_eq!((major, minor), (2, 1));
        assert_eq!(rest, "mc");
        let (major, minor, rest) = extract_versions("x", "3c").unwrap();
        assert_eq!((major, minor), (3, 0));
        assert_eq!(rest, "c");
    }
}
