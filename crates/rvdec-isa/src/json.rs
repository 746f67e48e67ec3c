//! Serde model of the ISA-definition JSON files.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{DecodeError, Result};

/// One instruction definition.
///
/// ```json
/// { "mnemonic": "amoxor.d", "form": "AMO", "stencil": "0x2000302f",
///   "type": ["int", "load", "atomic"], "tags": ["a", "g"],
///   "l-oper": "all", "data": 64 }
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstEntry {
    pub mnemonic: String,
    pub form: Option<String>,
    pub stencil: Option<String>,
    #[serde(rename = "type", default)]
    pub itypes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub isa: Vec<String>,
    #[serde(default)]
    pub fixed: FxHashMap<String, u64>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub data: Option<u32>,
    #[serde(rename = "w-oper")]
    pub w_oper: Option<OperSpec>,
    #[serde(rename = "l-oper")]
    pub l_oper: Option<OperSpec>,
    #[serde(rename = "s-oper")]
    pub s_oper: Option<OperSpec>,
    #[serde(rename = "d-oper")]
    pub d_oper: Option<OperSpec>,
    #[serde(rename = "q-oper")]
    pub q_oper: Option<OperSpec>,
    #[serde(rename = "h-oper")]
    pub h_oper: Option<OperSpec>,
    #[serde(rename = "v-oper")]
    pub v_oper: Option<OperSpec>,
    pub implicit: Option<ImplicitSpec>,
    pub overlay: Option<OverlaySpec>,
    #[serde(default)]
    pub hide: Vec<String>,
    #[serde(rename = "imm-mask")]
    pub imm_mask: Option<String>,
    #[serde(rename = "imm-signed")]
    pub imm_signed: Option<bool>,
}

/// Register-file hint: `"all"` or a list of operand field names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OperSpec {
    All(String),
    Fields(Vec<String>),
}

/// Operands implied by the decoded form regardless of encoding.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImplicitSpec {
    pub imm: Option<i64>,
    #[serde(default)]
    pub sources: Vec<ImplicitOperand>,
    #[serde(default)]
    pub dests: Vec<ImplicitOperand>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImplicitOperand {
    pub field: String,
    pub reg: u64,
    #[serde(default)]
    pub data: bool,
}

/// Overlay declaration: the base mnemonic plus the extra predicate.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlaySpec {
    pub base: String,
    #[serde(rename = "match", default)]
    pub field_match: FxHashMap<String, u64>,
    #[serde(default)]
    pub exclude: FxHashMap<String, u64>,
    #[serde(rename = "match-mask")]
    pub match_mask: Option<String>,
    #[serde(rename = "match-value")]
    pub match_value: Option<String>,
}

/// Parse a `0x`-prefixed hex literal from an ISA JSON.
pub fn parse_hex(mnemonic: &str, text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|_| DecodeError::MissingIsaKey {
        mnemonic: mnemonic.to_string(),
        key: format!("valid hex value (got {text})"),
    })
}

/// Load one ISA-definition JSON file: a top-level array of entries.
pub fn load_isa_file(path: &std::path::Path) -> Result<Vec<InstEntry>> {
    let text = std::fs::read_to_string(path).map_err(|e| DecodeError::BadIsaFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| DecodeError::BadIsaFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Load one annotation JSON file: a top-level object keyed by mnemonic.
pub fn load_annotation_file(
    path: &std::path::Path,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| DecodeError::BadIsaFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| DecodeError::BadIsaFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(DecodeError::BadIsaFile {
            path: path.display().to_string(),
            reason: "annotation file is not a JSON object".to_string(),
        }),
    }
}
