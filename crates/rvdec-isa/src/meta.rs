//! Per-mnemonic categorical meta-data.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::error::{DecodeError, Result};
use crate::operand::{OperandFieldId, RegisterType};
use crate::tag::{MatchSet, Tag};

/// Stable unique identifier of a mnemonic within one context.
pub type InstUid = u32;

/// UID value meaning "not assigned".
pub const INVALID_UID: InstUid = 0;

/// User-supplied mnemonic → UID reservations.
pub type InstUidList = Vec<(String, InstUid)>;

/// Annotation override pairs: `(mnemonic, "attr:value")`.
pub type AnnotationOverrides = Vec<(String, String)>;

bitflags! {
    /// Categorical instruction-type flags.
    pub struct InstructionTypes: u64 {
        const INT         = 1 << 0;
        const FLOAT       = 1 << 1;
        const ARITH       = 1 << 2;
        const MULTIPLY    = 1 << 3;
        const DIVIDE      = 1 << 4;
        const BRANCH      = 1 << 5;
        const CONDITIONAL = 1 << 6;
        const JAL         = 1 << 7;
        const JALR        = 1 << 8;
        const LOAD        = 1 << 9;
        const STORE       = 1 << 10;
        const ATOMIC      = 1 << 11;
        const FENCE       = 1 << 12;
        const SYSTEM      = 1 << 13;
        const CSR         = 1 << 14;
        const MOVE        = 1 << 15;
        const COMPARE     = 1 << 16;
        const CONVERT     = 1 << 17;
        const MAC         = 1 << 18;
        const SQRT        = 1 << 19;
        const VECTOR      = 1 << 20;
        const MASK        = 1 << 21;
        const SEGMENT     = 1 << 22;
        const FAULTFIRST  = 1 << 23;
        const INDEXED     = 1 << 24;
        const UNIT_STRIDE = 1 << 25;
        const STRIDE      = 1 << 26;
        const PREFETCH    = 1 << 27;
        const HINT        = 1 << 28;
        const CACHE       = 1 << 29;
        const CRYPTO      = 1 << 30;
        const HYPERVISOR  = 1 << 31;
        const PAIR        = 1 << 32;
        const PSEUDO      = 1 << 33;
    }
}

impl InstructionTypes {
    /// Parse one category string from an ISA JSON `type` list.
    pub fn from_name(name: &str) -> Option<Self> {
        let flag = match name {
            "int" => Self::INT,
            "float" => Self::FLOAT,
            "arith" => Self::ARITH,
            "mul" | "multiply" => Self::MULTIPLY,
            "div" | "divide" => Self::DIVIDE,
            "branch" => Self::BRANCH,
            "cond" | "conditional" => Self::CONDITIONAL,
            "jal" => Self::JAL,
            "jalr" => Self::JALR,
            "load" => Self::LOAD,
            "store" => Self::STORE,
            "atomic" => Self::ATOMIC,
            "fence" => Self::FENCE,
            "system" => Self::SYSTEM,
            "csr" => Self::CSR,
            "move" => Self::MOVE,
            "compare" => Self::COMPARE,
            "convert" => Self::CONVERT,
            "mac" => Self::MAC,
            "sqrt" => Self::SQRT,
            "vector" => Self::VECTOR,
            "mask" => Self::MASK,
            "segment" => Self::SEGMENT,
            "faultfirst" => Self::FAULTFIRST,
            "indexed" => Self::INDEXED,
            "unit_stride" => Self::UNIT_STRIDE,
            "stride" => Self::STRIDE,
            "prefetch" => Self::PREFETCH,
            "hint" => Self::HINT,
            "cache" => Self::CACHE,
            "crypto" => Self::CRYPTO,
            "hypervisor" => Self::HYPERVISOR,
            "pair" => Self::PAIR,
            "pseudo" => Self::PSEUDO,
            _ => return None,
        };
        Some(flag)
    }
}

/// Instruction types derived from the opcode word rather than the meta
/// record (e.g. `jalr x1, x5` is both a call and a return).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractedInstTypes {
    Call,
    Return,
}

/// Per-mnemonic meta-data record.
///
/// Built once per context and immutable afterwards; factories and decoded
/// instructions hold shared references to it.
#[derive(Clone, Debug)]
pub struct InstMetaData {
    mnemonic: String,
    uid: InstUid,
    inst_types: InstructionTypes,
    isa_extensions: Vec<String>,
    tags: MatchSet<Tag>,
    oper_types: FxHashMap<OperandFieldId, RegisterType>,
    default_source_type: RegisterType,
    default_dest_type: RegisterType,
    data_size: u32,
}

impl InstMetaData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mnemonic: String,
        uid: InstUid,
        inst_types: InstructionTypes,
        isa_extensions: Vec<String>,
        tags: MatchSet<Tag>,
        oper_types: FxHashMap<OperandFieldId, RegisterType>,
        default_source_type: RegisterType,
        default_dest_type: RegisterType,
        data_size: u32,
    ) -> Self {
        Self {
            mnemonic,
            uid,
            inst_types,
            isa_extensions,
            tags,
            oper_types,
            default_source_type,
            default_dest_type,
            data_size,
        }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn uid(&self) -> InstUid {
        self.uid
    }

    pub fn inst_types(&self) -> InstructionTypes {
        self.inst_types
    }

    pub fn is_inst_type(&self, itype: InstructionTypes) -> bool {
        self.inst_types.contains(itype)
    }

    /// True when every flag in `itype` is absent.
    pub fn is_none_of(&self, itype: InstructionTypes) -> bool {
        (self.inst_types & itype).is_empty()
    }

    pub fn isa_extensions(&self) -> &[String] {
        &self.isa_extensions
    }

    pub fn tags(&self) -> &MatchSet<Tag> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.is_member(tag)
    }

    /// Register-file type of the operand extracted from `field`.
    pub fn operand_type(&self, field: OperandFieldId) -> RegisterType {
        if let Some(&t) = self.oper_types.get(&field) {
            return t;
        }
        match field {
            OperandFieldId::Rd | OperandFieldId::Rd2 => self.default_dest_type,
            _ => self.default_source_type,
        }
    }

    pub fn default_source_type(&self) -> RegisterType {
        self.default_source_type
    }

    pub fn default_dest_type(&self) -> RegisterType {
        self.default_dest_type
    }

    pub fn data_size(&self) -> u32 {
        self.data_size
    }
}

/// Bidirectional mnemonic/UID registry shared by the regular and pseudo
/// builders.
#[derive(Debug, Default)]
pub struct UidRegistry {
    by_mnemonic: FxHashMap<String, InstUid>,
    by_uid: FxHashMap<InstUid, String>,
    next: InstUid,
}

impl UidRegistry {
    pub fn new(uid_list: &InstUidList) -> Self {
        let mut registry = Self {
            by_mnemonic: FxHashMap::default(),
            by_uid: FxHashMap::default(),
            next: INVALID_UID + 1,
        };
        for (mnemonic, uid) in uid_list {
            registry.by_mnemonic.insert(mnemonic.clone(), *uid);
            registry.by_uid.entry(*uid).or_insert_with(|| mnemonic.clone());
            registry.next = registry.next.max(uid + 1);
        }
        registry
    }

    /// UID for `mnemonic`, honouring user reservations and auto-allocating
    /// otherwise.
    pub fn assign(&mut self, mnemonic: &str) -> InstUid {
        if let Some(&uid) = self.by_mnemonic.get(mnemonic) {
            return uid;
        }
        let uid = self.next;
        self.next += 1;
        self.by_mnemonic.insert(mnemonic.to_string(), uid);
        self.by_uid.insert(uid, mnemonic.to_string());
        uid
    }

    pub fn lookup_uid(&self, mnemonic: &str) -> Result<InstUid> {
        self.by_mnemonic
            .get(mnemonic)
            .copied()
            .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))
    }

    pub fn lookup_mnemonic(&self, uid: InstUid) -> Option<&str> {
        self.by_uid.get(&uid).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parsing() {
        let t = InstructionTypes::from_name("atomic").unwrap();
        assert_eq!(t, InstructionTypes::ATOMIC);
        assert!(InstructionTypes::from_name("bogus").is_none());
    }

    #[test]
    fn test_uid_registry_reservations() {
        let mut reg = UidRegistry::new(&vec![("nop".to_string(), 1), ("cmov".to_string(), 2)]);
        assert_eq!(reg.assign("nop"), 1);
        assert_eq!(reg.assign("cmov"), 2);
        // Auto-allocation continues past the reservations
        let add = reg.assign("add");
        assert!(add > 2);
        assert_eq!(reg.assign("add"), add);
        assert_eq!(reg.lookup_mnemonic(add), Some("add"));
        assert_eq!(reg.lookup_uid("add").unwrap(), add);
    }

    #[test]
    fn test_unknown_mnemonic() {
        let reg = UidRegistry::new(&Vec::new());
        assert!(matches!(
            reg.lookup_uid("nothere"),
            Err(DecodeError::UnknownMnemonic(_))
        ));
    }
}
