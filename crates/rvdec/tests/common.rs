//! Shared test support: a concrete instruction type, micro-architecture
//! annotation, and allocator.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use rvdec::{
    Annotation, DecodeError, DecodedInst, Decoder, InstAllocator, InstUid, OpcodeInfo, Result,
};

/// Micro-architecture payload attached per mnemonic.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UArch {
    pub pipelined: bool,
    pub latency: u32,
    pub pipes: Vec<String>,
    pub rob_group: Vec<String>,
}

impl Default for UArch {
    fn default() -> Self {
        Self {
            pipelined: true,
            latency: 1,
            pipes: Vec::new(),
            rob_group: Vec::new(),
        }
    }
}

impl Annotation for UArch {
    fn from_json(mnemonic: &str, value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::BadAnnotation {
            mnemonic: mnemonic.to_string(),
            reason: e.to_string(),
        })
    }
}

/// The decoded-instruction value the tests exercise.
#[derive(Clone, Debug)]
pub struct Inst {
    opinfo: OpcodeInfo,
    annotation: Option<Arc<UArch>>,
}

impl Inst {
    pub fn opinfo(&self) -> &OpcodeInfo {
        &self.opinfo
    }

    pub fn annotation(&self) -> Option<&Arc<UArch>> {
        self.annotation.as_ref()
    }

    pub fn dasm_string(&self) -> String {
        self.opinfo.dasm_string()
    }
}

impl DecodedInst<UArch> for Inst {
    fn mnemonic(&self) -> &str {
        self.opinfo.mnemonic()
    }

    fn uid(&self) -> InstUid {
        self.opinfo.uid()
    }

    fn morph(&mut self, opinfo: OpcodeInfo, annotation: Option<Arc<UArch>>) {
        self.opinfo = opinfo;
        self.annotation = annotation;
    }
}

#[derive(Debug)]
pub struct Alloc;

impl InstAllocator<UArch> for Alloc {
    type Inst = Inst;

    fn construct(&self, opinfo: &OpcodeInfo, annotation: Option<&Arc<UArch>>) -> Inst {
        Inst {
            opinfo: opinfo.clone(),
            annotation: annotation.cloned(),
        }
    }
}

pub fn json_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../json")
        .join(name)
}

/// The RV64 GCB + Zicsr + Zifencei corpus, plus the extensions the tests
/// poke at (Zicbop, Zcb, Zicond, V, Zcd, Zicfiss, pseudo-ops).
pub fn rv64_isa_files() -> Vec<PathBuf> {
    [
        "isa_rv64i.json",
        "isa_pseudo.json",
        "isa_rv64m.json",
        "isa_rv64a.json",
        "isa_rv64f.json",
        "isa_rv64d.json",
        "isa_rv64c.json",
        "isa_rv64zcd.json",
        "isa_rv64zba.json",
        "isa_rv64zbb.json",
        "isa_rv64zbs.json",
        "isa_rv64zicsr.json",
        "isa_rv64zifencei.json",
        "isa_rv64zicbop.json",
        "isa_rv64zcb.json",
        "isa_rv64zicond.json",
        "isa_rv64v.json",
        "isa_rv64zicfiss.json",
    ]
    .iter()
    .map(|name| json_path(name))
    .collect()
}

pub fn rv32_isa_files() -> Vec<PathBuf> {
    ["isa_rv32i.json", "isa_rv32c.json", "isa_rv32zclsd.json"]
        .iter()
        .map(|name| json_path(name))
        .collect()
}

pub fn anno_files() -> Vec<PathBuf> {
    vec![json_path("uarch_rv64.json")]
}

pub fn uid_list() -> rvdec::InstUidList {
    vec![("nop".to_string(), 1), ("cmov".to_string(), 2)]
}

pub fn anno_overrides() -> rvdec::AnnotationOverrides {
    vec![
        ("andn".to_string(), "pipelined:false".to_string()),
        ("srai".to_string(), "rob_group:[\"begin\"]".to_string()),
    ]
}

/// A decoder over the standard RV64 corpus.
pub fn standard_decoder() -> Decoder<Alloc, UArch> {
    Decoder::new(
        &rv64_isa_files(),
        &anno_files(),
        &uid_list(),
        &anno_overrides(),
        Alloc,
    )
    .expect("standard decoder builds")
}

/// A decoder over the RV32 I + C + Zclsd corpus.
pub fn rv32_decoder() -> Decoder<Alloc, UArch> {
    Decoder::new(
        &rv32_isa_files(),
        &anno_files(),
        &uid_list(),
        &Vec::new(),
        Alloc,
    )
    .expect("rv32 decoder builds")
}
