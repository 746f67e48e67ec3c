//! Decoded operand descriptions and special fields.

/// Register-file type of an operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterType {
    /// 32-bit integer
    Word,
    /// 64-bit integer
    Long,
    /// 16-bit float
    Half,
    /// 32-bit float
    Single,
    /// 64-bit float
    Double,
    /// 128-bit float
    Quad,
    /// Vector register
    Vector,
    None,
}

impl RegisterType {
    /// True for the integer register file.
    pub fn is_int(self) -> bool {
        matches!(self, Self::Word | Self::Long)
    }

    /// True for the floating-point register file.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Half | Self::Single | Self::Double | Self::Quad)
    }
}

/// Identifier of the encoding field an operand was extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperandFieldId {
    Rd,
    /// Second destination (register pairs, fused ops)
    Rd2,
    Rs1,
    Rs2,
    Rs3,
    Rs4,
}

impl OperandFieldId {
    /// Source field ids in operand-list order.
    pub const SOURCES: [Self; 4] = [Self::Rs1, Self::Rs2, Self::Rs3, Self::Rs4];

    pub fn name(self) -> &'static str {
        match self {
            Self::Rd => "rd",
            Self::Rd2 => "rd2",
            Self::Rs1 => "rs1",
            Self::Rs2 => "rs2",
            Self::Rs3 => "rs3",
            Self::Rs4 => "rs4",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rd" => Some(Self::Rd),
            "rd2" => Some(Self::Rd2),
            "rs1" => Some(Self::Rs1),
            "rs2" => Some(Self::Rs2),
            "rs3" => Some(Self::Rs3),
            "rs4" => Some(Self::Rs4),
            _ => None,
        }
    }
}

/// One decoded operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperandElement {
    pub field_id: OperandFieldId,
    pub operand_type: RegisterType,
    pub reg: u64,
    /// Store-data operand (vs address) for memory instructions.
    pub is_store_data: bool,
    /// Operand implied by the decoded form rather than encoded.
    pub is_implied: bool,
}

/// Ordered list of decoded operands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperandInfo {
    elements: Vec<OperandElement>,
}

impl OperandInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        field_id: OperandFieldId,
        operand_type: RegisterType,
        reg: u64,
        is_store_data: bool,
    ) {
        self.elements.push(OperandElement {
            field_id,
            operand_type,
            reg,
            is_store_data,
            is_implied: false,
        });
    }

    pub fn add_implied(
        &mut self,
        field_id: OperandFieldId,
        operand_type: RegisterType,
        reg: u64,
        is_store_data: bool,
    ) {
        self.elements.push(OperandElement {
            field_id,
            operand_type,
            reg,
            is_store_data,
            is_implied: true,
        });
    }

    pub fn elements(&self) -> &[OperandElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bitmask of all register numbers in the list.
    pub fn reg_mask(&self) -> u64 {
        self.elements
            .iter()
            .fold(0, |mask, e| mask | (1u64 << (e.reg & 0x3f)))
    }

    /// Bitmask of register numbers whose operand type satisfies `pred`.
    pub fn reg_mask_where<F: Fn(&OperandElement) -> bool>(&self, pred: F) -> u64 {
        self.elements
            .iter()
            .filter(|e| pred(e))
            .fold(0, |mask, e| mask | (1u64 << (e.reg & 0x3f)))
    }
}

/// Any non-register, non-immediate decoded datum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialField {
    /// Atomic acquire bit
    Aq,
    /// Application vector length (vsetivli)
    Avl,
    /// CSR index
    Csr,
    /// Vector segment count
    Nf,
    /// Atomic release bit
    Rl,
    /// Floating-point rounding mode
    Rm,
    /// Stack adjustment (cm.push/cm.pop)
    StackAdj,
    /// Vector mask bit
    Vm,
    /// Vector AMO write-destination bit
    Wd,
}

impl std::fmt::Display for SpecialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Aq => "aq",
            Self::Avl => "avl",
            Self::Csr => "csr",
            Self::Nf => "nf",
            Self::Rl => "rl",
            Self::Rm => "rm",
            Self::StackAdj => "stack_adj",
            Self::Vm => "vm",
            Self::Wd => "wd",
        };
        f.write_str(name)
    }
}
