use indexmap::IndexMap;
use std::fmt;

use crate::regalloc::regs::{FixedReg, PhysReg};

// ----------- Virtual register -----------

/// Index into a function's virtual register table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(pub(crate) u32);

impl VReg {
    #[inline]
    pub fn id(&self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%v{}", self.0)
    }
}

/// Allocation state of a virtual register. Each field is written at most
/// once, by the phase that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VRegInfo {
    pub debug_name: Option<String>,
    /// Set at creation for registers that always live in a fixed register.
    pub preset: Option<FixedReg>,
    pub assigned: Option<PhysReg>,
    pub live_start: Option<usize>,
    /// Exclusive.
    pub live_end: Option<usize>,
    pub spill_slot: Option<u32>,
}

impl VRegInfo {
    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.preset.is_some()
    }

    #[inline]
    pub fn is_spilled(&self) -> bool {
        self.assigned.is_none() && self.spill_slot.is_some()
    }
}

// ----------- Mnemonic -----------

macro_rules! mnemonics {
    ($($variant:ident => $name:literal),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Mnemonic {
            $($variant,)*
            /// Passed through untouched.
            Other(String),
        }

        impl Mnemonic {
            pub fn name(&self) -> &str {
                match self {
                    $(Mnemonic::$variant => $name,)*
                    Mnemonic::Other(name) => name,
                }
            }

            pub fn parse(word: &str) -> Mnemonic {
                let word = word.to_ascii_lowercase();
                match word.as_str() {
                    $($name => Mnemonic::$variant,)*
                    _ => Mnemonic::Other(word),
                }
            }
        }
    };
}

mnemonics! {
    Load => "load",
    Store => "store",
    In => "in",
    Out => "out",
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    Div => "div",
    Mod => "mod",
    And => "and",
    Or => "or",
    Xor => "xor",
    Shl => "shl",
    Shr => "shr",
    Shra => "shra",
    Not => "not",
    Comp => "comp",
    Jump => "jump",
    Jneg => "jneg",
    Jzer => "jzer",
    Jpos => "jpos",
    Jnneg => "jnneg",
    Jnzer => "jnzer",
    Jnpos => "jnpos",
    Jles => "jles",
    Jequ => "jequ",
    Jgre => "jgre",
    Jnles => "jnles",
    Jnequ => "jnequ",
    Jngre => "jngre",
    Push => "push",
    Pop => "pop",
    Pushr => "pushr",
    Popr => "popr",
    Call => "call",
    Exit => "exit",
    Svc => "svc",
    Nop => "nop",
}

impl Mnemonic {
    pub fn is_jump(&self) -> bool {
        self.name().starts_with('j')
    }

    /// Jumps that test the state register rather than a general register.
    /// Their left operand is encoded as `R0` and never printed.
    pub fn has_implicit_left(&self) -> bool {
        matches!(
            self,
            Mnemonic::Jump
                | Mnemonic::Jles
                | Mnemonic::Jequ
                | Mnemonic::Jgre
                | Mnemonic::Jnles
                | Mnemonic::Jnequ
                | Mnemonic::Jngre
        )
    }

    /// The prior value of the left operand is overwritten without being read.
    pub fn discards_left(&self) -> bool {
        matches!(self, Mnemonic::Load | Mnemonic::In)
    }

    pub fn writes_left(&self) -> bool {
        !(self.is_jump()
            || matches!(
                self,
                Mnemonic::Store | Mnemonic::Out | Mnemonic::Comp | Mnemonic::Nop
            ))
    }

    /// `pop SP, Rx` writes the popped value into its right operand.
    pub fn writes_right(&self) -> bool {
        matches!(self, Mnemonic::Pop)
    }

    pub fn allows_missing_right(&self) -> bool {
        matches!(self, Mnemonic::Not | Mnemonic::Pushr | Mnemonic::Popr)
    }

    pub fn may_write_memory(&self) -> bool {
        matches!(
            self,
            Mnemonic::Store
                | Mnemonic::Call
                | Mnemonic::Svc
                | Mnemonic::Push
                | Mnemonic::Pop
                | Mnemonic::Pushr
                | Mnemonic::Popr
                | Mnemonic::Other(_)
        )
    }

    /// Whether a register-direct right operand may be replaced by an
    /// arbitrary addressed operand.
    pub fn accepts_any_right(&self) -> bool {
        !(self.is_jump() || matches!(self, Mnemonic::Store | Mnemonic::Pop | Mnemonic::Call))
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Reserve `value` words.
    Ds,
    /// Define one word holding `value`.
    Dc,
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Ds => "ds",
            Directive::Dc => "dc",
        }
    }

    pub fn parse(word: &str) -> Option<Directive> {
        match word.to_ascii_lowercase().as_str() {
            "ds" => Some(Directive::Ds),
            "dc" => Some(Directive::Dc),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

// ----------- Operands -----------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Imm {
    Int(i64),
    Symbol(String),
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imm::Int(value) => write!(f, "{}", value),
            Imm::Symbol(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AddressingMode {
    Immediate = 0,
    Direct = 1,
    Indirect = 2,
}

impl AddressingMode {
    pub fn prefix(self) -> &'static str {
        match self {
            AddressingMode::Immediate => "=",
            AddressingMode::Direct => "",
            AddressingMode::Indirect => "@",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Imm(Imm),
    Reg(VReg),
    /// `imm(reg)`
    Indexed(Imm, VReg),
}

impl Address {
    pub fn reg(&self) -> Option<VReg> {
        match self {
            Address::Imm(_) => None,
            Address::Reg(reg) | Address::Indexed(_, reg) => Some(*reg),
        }
    }

    pub fn imm(&self) -> Option<&Imm> {
        match self {
            Address::Imm(imm) | Address::Indexed(imm, _) => Some(imm),
            Address::Reg(_) => None,
        }
    }

    /// Replace the register part, keeping the shape.
    pub fn with_reg(&self, reg: VReg) -> Address {
        match self {
            Address::Imm(imm) => Address::Imm(imm.clone()),
            Address::Reg(_) => Address::Reg(reg),
            Address::Indexed(imm, _) => Address::Indexed(imm.clone(), reg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RightOperand {
    pub mode: AddressingMode,
    pub addr: Address,
}

impl RightOperand {
    pub fn new(mode: AddressingMode, addr: Address) -> Self {
        Self { mode, addr }
    }

    /// `=value`
    pub fn int(value: i64) -> Self {
        Self::new(AddressingMode::Immediate, Address::Imm(Imm::Int(value)))
    }

    /// `name`, a direct memory reference or jump target.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(AddressingMode::Direct, Address::Imm(Imm::Symbol(name.into())))
    }

    /// The register's own value.
    pub fn reg(reg: VReg) -> Self {
        Self::new(AddressingMode::Direct, Address::Reg(reg))
    }

    /// `offset(base)`, the memory word at `base + offset`.
    pub fn indexed(offset: i64, base: VReg) -> Self {
        Self::new(
            AddressingMode::Direct,
            Address::Indexed(Imm::Int(offset), base),
        )
    }

    pub fn is_plain_reg(&self, reg: VReg) -> bool {
        self.mode == AddressingMode::Direct && self.addr == Address::Reg(reg)
    }

    pub fn label_target(&self) -> Option<&str> {
        match (&self.mode, &self.addr) {
            (AddressingMode::Direct, Address::Imm(Imm::Symbol(name))) => Some(name),
            _ => None,
        }
    }
}

// ----------- Instruction -----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalInst {
    pub label: Option<String>,
    pub mnemonic: Mnemonic,
    pub left: VReg,
    pub right: Option<RightOperand>,
}

impl NormalInst {
    /// Every virtual register this instruction mentions, left first.
    pub fn regs(&self) -> impl Iterator<Item = VReg> + '_ {
        std::iter::once(self.left).chain(self.right.as_ref().and_then(|r| r.addr.reg()))
    }

    pub fn right_reg(&self) -> Option<VReg> {
        self.right.as_ref().and_then(|r| r.addr.reg())
    }

    pub fn jump_target(&self) -> Option<&str> {
        if !self.mnemonic.is_jump() {
            return None;
        }
        self.right.as_ref().and_then(|r| r.label_target())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    NoOp {
        label: Option<String>,
    },
    Pseudo {
        label: String,
        directive: Directive,
        value: i64,
    },
    Normal(NormalInst),
}

impl Instruction {
    pub fn label(&self) -> Option<&str> {
        match self {
            Instruction::NoOp { label } => label.as_deref(),
            Instruction::Pseudo { label, .. } => Some(label),
            Instruction::Normal(inst) => inst.label.as_deref(),
        }
    }

    /// Detach the label, if the instruction can live without one.
    pub fn take_label(&mut self) -> Option<String> {
        match self {
            Instruction::NoOp { label } => label.take(),
            Instruction::Pseudo { .. } => None,
            Instruction::Normal(inst) => inst.label.take(),
        }
    }

    /// Attach `label` if the slot is free; hands it back otherwise.
    pub fn try_set_label(&mut self, new: String) -> Result<(), String> {
        let slot = match self {
            Instruction::NoOp { label } => label,
            Instruction::Pseudo { .. } => return Err(new),
            Instruction::Normal(inst) => &mut inst.label,
        };
        if slot.is_some() {
            return Err(new);
        }
        *slot = Some(new);
        Ok(())
    }

    pub fn as_normal(&self) -> Option<&NormalInst> {
        match self {
            Instruction::Normal(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn jump_target(&self) -> Option<&str> {
        self.as_normal().and_then(|inst| inst.jump_target())
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Instruction::NoOp { .. })
    }
}

// ----------- Function -----------

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub name: String,
    pub insts: Vec<Instruction>,
    pub vregs: Vec<VRegInfo>,
    /// A label with no instruction after it.
    pub trailing_label: Option<String>,
    fixed: IndexMap<FixedReg, VReg>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn new_vreg(&mut self, debug_name: Option<String>) -> VReg {
        let id = VReg(self.vregs.len() as u32);
        self.vregs.push(VRegInfo {
            debug_name,
            ..VRegInfo::default()
        });
        id
    }

    /// The unique virtual register bound to `reg`.
    pub fn fixed(&mut self, reg: FixedReg) -> VReg {
        if let Some(vreg) = self.fixed.get(&reg) {
            return *vreg;
        }
        let id = VReg(self.vregs.len() as u32);
        self.vregs.push(VRegInfo {
            preset: Some(reg),
            assigned: Some(PhysReg::Fixed(reg)),
            ..VRegInfo::default()
        });
        self.fixed.insert(reg, id);
        id
    }

    pub fn fixed_reg_of(&self, vreg: VReg) -> Option<FixedReg> {
        self.vregs.get(vreg.index()).and_then(|info| info.preset)
    }

    #[inline]
    pub fn info(&self, vreg: VReg) -> &VRegInfo {
        &self.vregs[vreg.index()]
    }

    #[inline]
    pub fn info_mut(&mut self, vreg: VReg) -> &mut VRegInfo {
        &mut self.vregs[vreg.index()]
    }

    pub fn contains(&self, vreg: VReg) -> bool {
        vreg.index() < self.vregs.len()
    }

    pub fn is_fixed(&self, vreg: VReg) -> bool {
        self.info(vreg).is_fixed()
    }

    /// Name used in listings: the fixed register, the debug name, or `%vN`.
    pub fn vreg_name(&self, vreg: VReg) -> String {
        let info = self.info(vreg);
        match (&info.preset, &info.debug_name) {
            (Some(reg), _) => reg.to_string(),
            (None, Some(name)) => format!("%{}", name),
            (None, None) => vreg.to_string(),
        }
    }

    /// Labels defined in this function, mapped to the index that carries them.
    /// The trailing label maps to `insts.len()`.
    pub fn label_positions(&self) -> IndexMap<String, usize> {
        let mut positions = IndexMap::new();
        for (idx, inst) in self.insts.iter().enumerate() {
            if let Some(label) = inst.label() {
                positions.insert(label.to_string(), idx);
            }
        }
        if let Some(label) = &self.trailing_label {
            positions.insert(label.clone(), self.insts.len());
        }
        positions
    }

    pub fn labels(&self) -> Vec<&str> {
        self.insts
            .iter()
            .filter_map(|inst| inst.label())
            .chain(self.trailing_label.as_deref())
            .collect()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".fn {}", self.name)?;
        for inst in &self.insts {
            format_inst(f, inst, self)?;
            writeln!(f)?;
        }
        if let Some(label) = &self.trailing_label {
            writeln!(f, "{}", label)?;
        }
        writeln!(f, ".end")
    }
}

fn format_inst(f: &mut fmt::Formatter<'_>, inst: &Instruction, func: &Function) -> fmt::Result {
    let label = inst.label().unwrap_or("");
    match inst {
        Instruction::NoOp { .. } => write!(f, "{:<7} nop", label),
        Instruction::Pseudo {
            directive, value, ..
        } => write!(f, "{:<7} {:<5} {}", label, directive, value),
        Instruction::Normal(inst) => {
            write!(f, "{:<7} {:<5} ", label, inst.mnemonic)?;
            let right = inst
                .right
                .as_ref()
                .map(|right| format_right(right, |reg| func.vreg_name(reg)));
            match right {
                Some(right) if inst.mnemonic.has_implicit_left() => write!(f, "{}", right),
                Some(right) => write!(f, "{}, {}", func.vreg_name(inst.left), right),
                None => write!(f, "{}", func.vreg_name(inst.left)),
            }
        }
    }
}

/// Render a right-hand operand, naming registers through `reg_name`.
pub fn format_right(right: &RightOperand, reg_name: impl Fn(VReg) -> String) -> String {
    let body = match &right.addr {
        Address::Imm(imm) => imm.to_string(),
        Address::Reg(reg) => reg_name(*reg),
        Address::Indexed(imm, reg) => format!("{}({})", imm, reg_name(*reg)),
    };
    format!("{}{}", right.mode.prefix(), body)
}
