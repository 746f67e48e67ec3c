//! Instruction formats and their field layouts.
//!
//! Each form lists every field of its encoding and the subset of *opcode
//! fields* — the fields that must match the stencil for an instruction to
//! be identified. The synthetic `family` field (bits 0..16) is used only
//! by the length selector at the trie root.

use crate::error::{DecodeError, Result};
use crate::field::Field;

/// The `family` field of the synthetic `*` form.
pub const FAMILY: Field = Field::new("family", 0, 16);

// 32-bit encoding fields
pub const OPCODE: Field = Field::new("opcode", 0, 7);
pub const RD: Field = Field::new("rd", 7, 5);
pub const FUNC3: Field = Field::new("func3", 12, 3);
pub const RS1: Field = Field::new("rs1", 15, 5);
pub const RS2: Field = Field::new("rs2", 20, 5);
pub const RS3: Field = Field::new("rs3", 27, 5);
pub const FUNC7: Field = Field::new("func7", 25, 7);
pub const FUNC6: Field = Field::new("func6", 26, 6);
pub const FUNC5: Field = Field::new("func5", 27, 5);
pub const FMT2: Field = Field::new("fmt", 25, 2);
pub const CVT: Field = Field::new("cvt", 20, 5);
pub const RM: Field = Field::new("rm", 12, 3);
pub const AQ: Field = Field::new("aq", 26, 1);
pub const RL: Field = Field::new("rl", 25, 1);
pub const IMM12: Field = Field::new("imm12", 20, 12);
pub const IMM20: Field = Field::new("imm20", 12, 20);
pub const CSR_IDX: Field = Field::new("csr", 20, 12);
pub const UIMM5: Field = Field::new("uimm", 15, 5);
pub const SHAMT6: Field = Field::new("shamt", 20, 6);
pub const SHAMT5: Field = Field::new("shamtw", 20, 5);
pub const SIMM5: Field = Field::new("imm5", 7, 5);
pub const SIMM7: Field = Field::new("imm7", 25, 7);
pub const SUCC: Field = Field::new("succ", 20, 4);
pub const PRED: Field = Field::new("pred", 24, 4);
pub const FM: Field = Field::new("fm", 28, 4);

// Vector fields
pub const VM: Field = Field::new("vm", 25, 1);
pub const VFUNC6: Field = Field::new("vfunc6", 26, 6);
pub const NF: Field = Field::new("nf", 29, 3);
pub const MEW: Field = Field::new("mew", 28, 1);
pub const MOP: Field = Field::new("mop", 26, 2);
pub const LUMOP: Field = Field::new("lumop", 20, 5);
pub const VSETF: Field = Field::new("vsetf", 31, 1);
pub const VSETF2: Field = Field::new("vsetf2", 30, 1);
pub const VSETLO: Field = Field::new("vsetlo", 25, 5);
pub const ZIMM11: Field = Field::new("zimm11", 20, 11);
pub const ZIMM10: Field = Field::new("zimm10", 20, 10);

// 16-bit encoding fields
pub const COP: Field = Field::new("cop", 0, 2);
pub const CFUNC3: Field = Field::new("cfunc3", 13, 3);
pub const CFUNC1: Field = Field::new("cfunc1", 12, 1);
pub const CFUNC2B: Field = Field::new("cfunc2b", 10, 2);
pub const CFUNC2: Field = Field::new("cfunc2", 5, 2);
pub const CFUNC3A: Field = Field::new("cfunc3a", 2, 3);
pub const CB6: Field = Field::new("cb6", 6, 1);
pub const CRDS1: Field = Field::new("rds1", 7, 5);
pub const CRS2: Field = Field::new("rs2", 2, 5);
pub const CRDP: Field = Field::new("rdp", 2, 3);
pub const CRS1P: Field = Field::new("rs1p", 7, 3);
pub const CRS2P: Field = Field::new("rs2p", 2, 3);
pub const CRDS1P: Field = Field::new("rds1p", 7, 3);
pub const CIMM5: Field = Field::new("imm5", 2, 5);
pub const CIMM1: Field = Field::new("imm1", 12, 1);
pub const CIMM8: Field = Field::new("imm8", 5, 8);
pub const CMFUNC: Field = Field::new("cmfunc", 8, 5);
pub const CRLIST: Field = Field::new("rlist", 4, 4);
pub const CSPIMM: Field = Field::new("spimm", 2, 2);

/// Instruction format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormKind {
    // 32-bit
    R,
    R4,
    I,
    Ish,
    IshW,
    S,
    B,
    U,
    J,
    Amo,
    Rfloat,
    R2float,
    Csr,
    CsrI,
    Fence,
    System,
    IFloat,
    SFloat,
    // vector
    VArith,
    VArithImm,
    VMunary,
    VSet,
    VSetI,
    VSetR,
    VLoad,
    VStore,
    // 16-bit
    CR,
    CI,
    CIW,
    CLw,
    CLd,
    CFld,
    CSw,
    CSd,
    CFsd,
    CLwSp,
    CLdSp,
    CFldSp,
    CSwSp,
    CSdSp,
    CFsdSp,
    CLui,
    CAddi16Sp,
    CShamt,
    CBAlu,
    CB,
    CJ,
    CA,
    CZext,
    CLb,
    CLh,
    CSb,
    CSh,
    CLdPair,
    CSdPair,
    CSsPush,
    CSsPopChk,
    CmPushPop,
    // never placed in the trie
    Pseudo,
}

impl FormKind {
    /// Look a form up by its JSON name.
    pub fn from_name(mnemonic: &str, name: &str) -> Result<Self> {
        let kind = match name {
            "R" => Self::R,
            "R4" => Self::R4,
            "I" => Self::I,
            "ISH" => Self::Ish,
            "ISHW" => Self::IshW,
            "S" => Self::S,
            "B" => Self::B,
            "U" => Self::U,
            "J" => Self::J,
            "AMO" => Self::Amo,
            "RFLOAT" => Self::Rfloat,
            "R2FLOAT" => Self::R2float,
            "CSR" => Self::Csr,
            "CSRI" => Self::CsrI,
            "FENCE" => Self::Fence,
            "SYSTEM" => Self::System,
            "IF" => Self::IFloat,
            "SF" => Self::SFloat,
            "V" => Self::VArith,
            "VI" => Self::VArithImm,
            "VMUNARY" => Self::VMunary,
            "VSET" => Self::VSet,
            "VSETI" => Self::VSetI,
            "VSETR" => Self::VSetR,
            "VL" => Self::VLoad,
            "VS" => Self::VStore,
            "CR" => Self::CR,
            "CI" => Self::CI,
            "CIW" => Self::CIW,
            "CLW" => Self::CLw,
            "CLD" => Self::CLd,
            "CFLD" => Self::CFld,
            "CSW" => Self::CSw,
            "CSD" => Self::CSd,
            "CFSD" => Self::CFsd,
            "CLWSP" => Self::CLwSp,
            "CLDSP" => Self::CLdSp,
            "CFLDSP" => Self::CFldSp,
            "CSWSP" => Self::CSwSp,
            "CSDSP" => Self::CSdSp,
            "CFSDSP" => Self::CFsdSp,
            "CLUI" => Self::CLui,
            "CADDI16SP" => Self::CAddi16Sp,
            "CSHAMT" => Self::CShamt,
            "CBALU" => Self::CBAlu,
            "CB" => Self::CB,
            "CJ" => Self::CJ,
            "CA" => Self::CA,
            "CZEXT" => Self::CZext,
            "CLB" => Self::CLb,
            "CLH" => Self::CLh,
            "CSB" => Self::CSb,
            "CSH" => Self::CSh,
            "CLP" => Self::CLdPair,
            "CSP" => Self::CSdPair,
            "CSSPUSH" => Self::CSsPush,
            "CSSPOPCHK" => Self::CSsPopChk,
            "CMPP" => Self::CmPushPop,
            "PSEUDO" => Self::Pseudo,
            _ => {
                return Err(DecodeError::UnknownForm {
                    mnemonic: mnemonic.to_string(),
                    form: name.to_string(),
                });
            }
        };
        Ok(kind)
    }

    /// Every field of the encoding, operand fields included.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::R => &[OPCODE, RD, FUNC3, RS1, RS2, FUNC7],
            Self::R4 => &[OPCODE, RD, RM, RS1, RS2, FMT2, RS3],
            Self::I => &[OPCODE, RD, FUNC3, RS1, IMM12],
            Self::Ish => &[OPCODE, RD, FUNC3, RS1, SHAMT6, FUNC6],
            Self::IshW => &[OPCODE, RD, FUNC3, RS1, SHAMT5, FUNC7],
            Self::S => &[OPCODE, SIMM5, FUNC3, RS1, RS2, SIMM7],
            Self::B => &[OPCODE, SIMM5, FUNC3, RS1, RS2, SIMM7],
            Self::U | Self::J => &[OPCODE, RD, IMM20],
            Self::Amo => &[OPCODE, RD, FUNC3, RS1, RS2, RL, AQ, FUNC5],
            Self::Rfloat => &[OPCODE, RD, RM, RS1, RS2, FUNC7],
            Self::R2float => &[OPCODE, RD, RM, RS1, CVT, FUNC7],
            Self::Csr => &[OPCODE, RD, FUNC3, RS1, CSR_IDX],
            Self::CsrI => &[OPCODE, RD, FUNC3, UIMM5, CSR_IDX],
            Self::Fence => &[OPCODE, RD, FUNC3, RS1, SUCC, PRED, FM],
            Self::System => &[OPCODE, RD, FUNC3, RS1, IMM12],
            Self::IFloat => &[OPCODE, RD, FUNC3, RS1, IMM12],
            Self::SFloat => &[OPCODE, SIMM5, FUNC3, RS1, RS2, SIMM7],
            Self::VArith | Self::VArithImm => &[OPCODE, RD, FUNC3, RS1, RS2, VM, VFUNC6],
            Self::VMunary => &[OPCODE, RD, FUNC3, RS1, RS2, VM, VFUNC6],
            Self::VSet => &[OPCODE, RD, FUNC3, RS1, ZIMM11, VSETF],
            Self::VSetI => &[OPCODE, RD, FUNC3, UIMM5, ZIMM10, VSETF2, VSETF],
            Self::VSetR => &[OPCODE, RD, FUNC3, RS1, RS2, VSETLO, VSETF2, VSETF],
            Self::VLoad => &[OPCODE, RD, FUNC3, RS1, LUMOP, VM, MOP, MEW, NF],
            Self::VStore => &[OPCODE, RD, FUNC3, RS1, LUMOP, VM, MOP, MEW, NF],
            Self::CR => &[COP, CRS2, CRDS1, CFUNC1, CFUNC3],
            Self::CI | Self::CLui => &[COP, CIMM5, CRDS1, CIMM1, CFUNC3],
            Self::CAddi16Sp => &[COP, CIMM5, CRDS1, CIMM1, CFUNC3],
            Self::CShamt => &[COP, CIMM5, CRDS1, CIMM1, CFUNC3],
            Self::CIW => &[COP, CRDP, CIMM8, CFUNC3],
            Self::CLw | Self::CLd | Self::CFld | Self::CLdPair => {
                &[COP, CRDP, CFUNC2, CRS1P, CFUNC2B, CFUNC1, CFUNC3]
            }
            Self::CSw | Self::CSd | Self::CFsd | Self::CSdPair => {
                &[COP, CRS2P, CFUNC2, CRS1P, CFUNC2B, CFUNC1, CFUNC3]
            }
            Self::CLwSp | Self::CLdSp | Self::CFldSp => &[COP, CIMM5, CRDS1, CIMM1, CFUNC3],
            Self::CSwSp | Self::CSdSp | Self::CFsdSp => &[COP, CRS2, CFUNC3],
            Self::CBAlu => &[COP, CIMM5, CRDS1P, CFUNC2B, CIMM1, CFUNC3],
            Self::CB => &[COP, CIMM5, CRS1P, CFUNC2B, CIMM1, CFUNC3],
            Self::CJ => &[COP, CFUNC3],
            Self::CA => &[COP, CRS2P, CFUNC2, CRDS1P, CFUNC2B, CFUNC1, CFUNC3],
            Self::CZext => &[COP, CFUNC3A, CFUNC2, CRDS1P, CFUNC2B, CFUNC1, CFUNC3],
            Self::CLb | Self::CLh => &[COP, CRDP, CB6, CRS1P, CFUNC2B, CFUNC1, CFUNC3],
            Self::CSb | Self::CSh => &[COP, CRS2P, CB6, CRS1P, CFUNC2B, CFUNC1, CFUNC3],
            Self::CSsPush | Self::CSsPopChk => &[COP, CIMM5, CRDS1, CIMM1, CFUNC3],
            Self::CmPushPop => &[COP, CSPIMM, CRLIST, CMFUNC, CFUNC3],
            Self::Pseudo => &[],
        }
    }

    /// The opcode fields: the subset that must match the stencil.
    pub fn opcode_fields(self) -> &'static [Field] {
        match self {
            Self::R => &[OPCODE, FUNC3, FUNC7],
            Self::R4 => &[OPCODE, FMT2],
            Self::I | Self::IFloat => &[OPCODE, FUNC3],
            Self::Ish => &[OPCODE, FUNC3, FUNC6],
            Self::IshW => &[OPCODE, FUNC3, FUNC7],
            Self::S | Self::B | Self::SFloat => &[OPCODE, FUNC3],
            Self::U | Self::J => &[OPCODE],
            Self::Amo => &[OPCODE, FUNC3, FUNC5],
            Self::Rfloat => &[OPCODE, FUNC7],
            Self::R2float => &[OPCODE, FUNC7, CVT],
            Self::Csr | Self::CsrI => &[OPCODE, FUNC3],
            Self::Fence => &[OPCODE, FUNC3],
            Self::System => &[OPCODE, FUNC3, IMM12, RS1, RD],
            Self::VArith | Self::VArithImm => &[OPCODE, FUNC3, VFUNC6],
            Self::VMunary => &[OPCODE, FUNC3, VFUNC6, RS1, RS2],
            Self::VSet => &[OPCODE, FUNC3, VSETF],
            Self::VSetI => &[OPCODE, FUNC3, VSETF, VSETF2],
            Self::VSetR => &[OPCODE, FUNC3, VSETF, VSETF2, VSETLO],
            Self::VLoad | Self::VStore => &[OPCODE, FUNC3, LUMOP, MOP, MEW],
            Self::CR => &[COP, CFUNC3, CFUNC1],
            Self::CI | Self::CLui | Self::CShamt | Self::CIW | Self::CJ => &[COP, CFUNC3],
            Self::CAddi16Sp => &[COP, CFUNC3, CRDS1],
            Self::CLw | Self::CLd | Self::CFld | Self::CLdPair => &[COP, CFUNC3],
            Self::CSw | Self::CSd | Self::CFsd | Self::CSdPair => &[COP, CFUNC3],
            Self::CLwSp | Self::CLdSp | Self::CFldSp => &[COP, CFUNC3],
            Self::CSwSp | Self::CSdSp | Self::CFsdSp => &[COP, CFUNC3],
            Self::CBAlu => &[COP, CFUNC3, CFUNC2B],
            Self::CB => &[COP, CFUNC3],
            Self::CA => &[COP, CFUNC3, CFUNC2B, CFUNC1, CFUNC2],
            Self::CZext => &[COP, CFUNC3, CFUNC2B, CFUNC1, CFUNC2, CFUNC3A],
            Self::CLb | Self::CSb => &[COP, CFUNC3, CFUNC2B, CFUNC1],
            Self::CLh | Self::CSh => &[COP, CFUNC3, CFUNC2B, CFUNC1, CB6],
            Self::CSsPush | Self::CSsPopChk => &[COP, CFUNC3, CRDS1, CIMM5, CIMM1],
            Self::CmPushPop => &[COP, CFUNC3, CMFUNC],
            Self::Pseudo => &[],
        }
    }

    /// Look up a field of this form by name.
    pub fn field(self, name: &str) -> Option<Field> {
        self.fields().iter().copied().find(|f| f.name == name)
    }

    /// Mask of all opcode fields in opcode-word coordinates.
    pub fn opcode_mask(self) -> u64 {
        self.opcode_fields().iter().fold(0, |m, f| m | f.mask())
    }

    /// Instruction size in bytes.
    pub fn size(self) -> u32 {
        if self.is_compressed() { 2 } else { 4 }
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Self::CR
                | Self::CI
                | Self::CIW
                | Self::CLw
                | Self::CLd
                | Self::CFld
                | Self::CSw
                | Self::CSd
                | Self::CFsd
                | Self::CLwSp
                | Self::CLdSp
                | Self::CFldSp
                | Self::CSwSp
                | Self::CSdSp
                | Self::CFsdSp
                | Self::CLui
                | Self::CAddi16Sp
                | Self::CShamt
                | Self::CBAlu
                | Self::CB
                | Self::CJ
                | Self::CA
                | Self::CZext
                | Self::CLb
                | Self::CLh
                | Self::CSb
                | Self::CSh
                | Self::CLdPair
                | Self::CSdPair
                | Self::CSsPush
                | Self::CSsPopChk
                | Self::CmPushPop
        )
    }
}
