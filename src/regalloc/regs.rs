use std::fmt;

/// Registers the linear-scan allocator hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PoolReg {
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
}

/// Registers reserved for spill-code insertion. They never enter the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ScratchReg {
    // Left-operand scratch. R0 cannot be used as an index register, so it
    // only ever appears in the destination slot.
    R0 = 0,
    // Right-operand scratch, legal in indexed forms like `x(R5)`.
    R5 = 5,
}

/// Registers permanently bound to the stack and frame pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FrameReg {
    Sp = 6,
    Fp = 7,
}

/// A register that a virtual register may be preset to. Pool registers are
/// deliberately absent: presetting one would collide with the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FixedReg {
    Scratch(ScratchReg),
    Frame(FrameReg),
}

impl FixedReg {
    pub const SP: FixedReg = FixedReg::Frame(FrameReg::Sp);
    pub const FP: FixedReg = FixedReg::Frame(FrameReg::Fp);
    pub const LEFT_SCRATCH: FixedReg = FixedReg::Scratch(ScratchReg::R0);
    pub const RIGHT_SCRATCH: FixedReg = FixedReg::Scratch(ScratchReg::R5);
}

/// Every physical register of the machine, partitioned by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysReg {
    Pool(PoolReg),
    Fixed(FixedReg),
}

/// Allocation order of the working pool.
pub const POOL_REGS: [PoolReg; 4] = [PoolReg::R1, PoolReg::R2, PoolReg::R3, PoolReg::R4];

impl PhysReg {
    pub const SP: PhysReg = PhysReg::Fixed(FixedReg::SP);
    pub const FP: PhysReg = PhysReg::Fixed(FixedReg::FP);

    /// Hardware register number (`R0`..`R7`).
    pub fn number(self) -> u8 {
        match self {
            PhysReg::Pool(r) => r as u8,
            PhysReg::Fixed(FixedReg::Scratch(r)) => r as u8,
            PhysReg::Fixed(FixedReg::Frame(r)) => r as u8,
        }
    }

    pub fn from_name(name: &str) -> Option<PhysReg> {
        // Case-sensitive: `r1` or `sp` in a listing is a memory symbol.
        let reg = match name {
            "R0" => PhysReg::Fixed(FixedReg::LEFT_SCRATCH),
            "R1" => PhysReg::Pool(PoolReg::R1),
            "R2" => PhysReg::Pool(PoolReg::R2),
            "R3" => PhysReg::Pool(PoolReg::R3),
            "R4" => PhysReg::Pool(PoolReg::R4),
            "R5" => PhysReg::Fixed(FixedReg::RIGHT_SCRATCH),
            "SP" | "R6" => PhysReg::SP,
            "FP" | "R7" => PhysReg::FP,
            _ => return None,
        };
        Some(reg)
    }
}

impl From<PoolReg> for PhysReg {
    fn from(reg: PoolReg) -> Self {
        PhysReg::Pool(reg)
    }
}

impl From<FixedReg> for PhysReg {
    fn from(reg: FixedReg) -> Self {
        PhysReg::Fixed(reg)
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysReg::Fixed(FixedReg::Frame(FrameReg::Sp)) => write!(f, "SP"),
            PhysReg::Fixed(FixedReg::Frame(FrameReg::Fp)) => write!(f, "FP"),
            _ => write!(f, "R{}", self.number()),
        }
    }
}

impl fmt::Display for PoolReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        PhysReg::Pool(*self).fmt(f)
    }
}

impl fmt::Display for FixedReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        PhysReg::Fixed(*self).fmt(f)
    }
}
