//! Serde model of the extension-spec JSON.

use serde::Deserialize;

use crate::error::{ExtensionError, Result};

/// What to do when an ISA string names an extension the spec does not
/// declare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownExtensionAction {
    #[default]
    Error,
    Warn,
    Ignore,
}

/// A value that may be a scalar or a list.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// `enabled_by`: a single AND-group or a list of AND-groups.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum EnabledBy {
    Group(Vec<String>),
    Groups(Vec<Vec<String>>),
}

impl EnabledBy {
    pub fn groups(&self) -> Vec<Vec<String>> {
        match self {
            Self::Group(g) => vec![g.clone()],
            Self::Groups(gs) => gs.clone(),
        }
    }
}

/// One extension declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionEntry {
    pub extension: Option<String>,
    pub xlen: Option<OneOrMany<u32>>,
    #[serde(default)]
    pub jsons: Vec<String>,
    #[serde(default)]
    pub is_meta_extension: bool,
    #[serde(default)]
    pub is_base_extension: bool,
    pub meta_extension: Option<OneOrMany<String>>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub enables: Vec<String>,
    pub enabled_by: Option<EnabledBy>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub internal: bool,
}

impl ExtensionEntry {
    /// Required-key and meta-extension shape validation.
    pub fn validate(&self) -> Result<(&str, Vec<u32>)> {
        let name = self
            .extension
            .as_deref()
            .ok_or_else(|| ExtensionError::MissingRequiredKey("extension".to_string()))?;
        let xlens = self
            .xlen
            .as_ref()
            .ok_or_else(|| ExtensionError::MissingRequiredKey("xlen".to_string()))?
            .to_vec();

        if self.is_meta_extension {
            for (present, key) in [
                (!self.aliases.is_empty(), "aliases"),
                (!self.enables.is_empty(), "enables"),
                (self.enabled_by.is_some(), "enabled_by"),
                (!self.requires.is_empty(), "requires"),
                (!self.conflicts.is_empty(), "conflicts"),
            ] {
                if present {
                    return Err(ExtensionError::MetaExtensionUnexpectedKey(key.to_string()));
                }
            }
        }
        Ok((name, xlens))
    }
}

/// The extension-spec JSON: one file describing all extensions.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionSpec {
    #[serde(default)]
    pub unknown_extension_action: UnknownExtensionAction,
    pub extensions: Vec<ExtensionEntry>,
}

impl ExtensionSpec {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ExtensionError::BadSpecFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ExtensionError::BadSpecFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_parses() {
        let spec: ExtensionSpec = serde_json::from_str(
            r#"{ "unknown_extension_action": "warn",
                 "extensions": [
                   { "extension": "i", "xlen": [32, 64], "is_base_extension": true,
                     "jsons": ["isa_rv64i.json"] },
                   { "extension": "g", "xlen": 64, "is_meta_extension": true },
                   { "extension": "m", "xlen": [32, 64], "meta_extension": "g",
                     "jsons": ["isa_rv64m.json"] } ] }"#,
        )
        .unwrap();
        assert_eq!(spec.unknown_extension_action, UnknownExtensionAction::Warn);
        assert_eq!(spec.extensions.len(), 3);
        let (name, xlens) = spec.extensions[0].validate().unwrap();
        assert_eq!(name, "i");
        assert_eq!(xlens, vec![32, 64]);
    }

    #[test]
    fn test_missing_xlen() {
        let entry: ExtensionEntry =
            serde_json::from_str(r#"{ "extension": "m" }"#).unwrap();
        assert!(matches!(
            entry.validate(),
            Err(ExtensionError::MissingRequiredKey(ref k)) if k == "xlen"
        ));
    }

    #[test]
    fn test_meta_extension_unexpected_key() {
        let entry: ExtensionEntry = serde_json::from_str(
            r#"{ "extension": "g", "xlen": 64, "is_meta_extension": true,
                 "requires": ["i"] }"#,
        )
        .unwrap();
        assert!(matches!(
            entry.validate(),
            Err(ExtensionError::MetaExtensionUnexpectedKey(ref k)) if k == "requires"
        ));
    }
}
