use std::collections::HashSet;

use crate::diag::InternalError;
use crate::ir::types::*;
use crate::regalloc::regs::FixedReg;

/// Accumulates the instruction stream of one function.
pub struct FunctionBuilder {
    func: Function,
    pending_label: Option<String>,
    defined_labels: HashSet<String>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            func: Function::new(name),
            pending_label: None,
            defined_labels: HashSet::new(),
        }
    }

    pub fn new_vreg(&mut self) -> VReg {
        self.func.new_vreg(None)
    }

    pub fn new_named_vreg(&mut self, name: impl Into<String>) -> VReg {
        self.func.new_vreg(Some(name.into()))
    }

    pub fn fixed(&mut self, reg: FixedReg) -> VReg {
        self.func.fixed(reg)
    }

    /// Attach `name` to the next emitted instruction. A label that is still
    /// pending gets its own `NoOp` so it is not lost.
    pub fn add_label(&mut self, name: impl Into<String>) -> Result<(), InternalError> {
        let name = name.into();
        if !self.defined_labels.insert(name.clone()) {
            return Err(InternalError::DuplicateLabel(name));
        }
        if let Some(prev) = self.pending_label.replace(name) {
            self.func.insts.push(Instruction::NoOp { label: Some(prev) });
        }
        Ok(())
    }

    pub fn emit_no_operand(&mut self, mnemonic: Mnemonic) -> Result<(), InternalError> {
        if mnemonic != Mnemonic::Nop {
            return Err(InternalError::malformed(
                mnemonic.name(),
                "operands required",
            ));
        }
        let label = self.pending_label.take();
        self.func.insts.push(Instruction::NoOp { label });
        Ok(())
    }

    pub fn emit_pseudo(&mut self, directive: Directive, value: i64) -> Result<(), InternalError> {
        let label = self
            .pending_label
            .take()
            .ok_or_else(|| InternalError::malformed(directive.name(), "directive needs a label"))?;
        self.func.insts.push(Instruction::Pseudo {
            label,
            directive,
            value,
        });
        Ok(())
    }

    pub fn emit_normal(
        &mut self,
        mnemonic: Mnemonic,
        left: VReg,
        right: Option<RightOperand>,
    ) -> Result<(), InternalError> {
        self.check_shape(&mnemonic, left, right.as_ref())?;
        let label = self.pending_label.take();
        self.func.insts.push(Instruction::Normal(NormalInst {
            label,
            mnemonic,
            left,
            right,
        }));
        Ok(())
    }

    /// Emit a jump to `target`. State jumps (`jump`, `jequ`, ...) take no
    /// condition register; register jumps (`jneg`, `jzer`, ...) require one.
    pub fn emit_jump(
        &mut self,
        mnemonic: Mnemonic,
        cond: Option<VReg>,
        target: impl Into<String>,
    ) -> Result<(), InternalError> {
        let left = match (mnemonic.has_implicit_left(), cond) {
            (true, None) => self.fixed(FixedReg::LEFT_SCRATCH),
            (false, Some(reg)) => reg,
            (true, Some(_)) => {
                return Err(InternalError::malformed(
                    mnemonic.name(),
                    "state jump takes no register",
                ));
            }
            (false, None) => {
                return Err(InternalError::malformed(
                    mnemonic.name(),
                    "register jump needs a register",
                ));
            }
        };
        self.emit_normal(mnemonic, left, Some(RightOperand::symbol(target)))
    }

    fn check_shape(
        &self,
        mnemonic: &Mnemonic,
        left: VReg,
        right: Option<&RightOperand>,
    ) -> Result<(), InternalError> {
        let malformed = |reason| Err(InternalError::malformed(mnemonic.name(), reason));

        if *mnemonic == Mnemonic::Nop {
            return malformed("nop takes no operands");
        }
        let regs_known = std::iter::once(left)
            .chain(right.and_then(|r| r.addr.reg()))
            .all(|reg| self.func.contains(reg));
        if !regs_known {
            return malformed("unknown virtual register");
        }
        let Some(right) = right else {
            if mnemonic.allows_missing_right() {
                return Ok(());
            }
            return malformed("missing right-hand operand");
        };
        if mnemonic.is_jump() {
            if right.label_target().is_none() {
                return malformed("jump target must be a literal label");
            }
            if mnemonic.has_implicit_left()
                && self.func.fixed_reg_of(left) != Some(FixedReg::LEFT_SCRATCH)
            {
                return malformed("state jump must carry R0");
            }
        }
        if *mnemonic == Mnemonic::Pop {
            if self.func.fixed_reg_of(left) != Some(FixedReg::SP) {
                return malformed("pop needs SP on the left");
            }
            if !matches!(right.addr, Address::Reg(_)) || right.mode != AddressingMode::Direct {
                return malformed("pop needs a register on the right");
            }
        }
        Ok(())
    }

    /// Close the function. Every jump must name a label defined in it.
    pub fn finish(mut self) -> Result<Function, InternalError> {
        self.func.trailing_label = self.pending_label.take();
        for inst in &self.func.insts {
            if let Some(target) = inst.jump_target() {
                if !self.defined_labels.contains(target) {
                    return Err(InternalError::UndefinedJumpTarget(target.to_string()));
                }
            }
        }
        Ok(self.func)
    }
}

/// LIFO of virtual registers holding intermediate values during expression
/// lowering.
#[derive(Debug, Default)]
pub struct RegStack {
    regs: Vec<VReg>,
}

impl RegStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reg: VReg) {
        self.regs.push(reg);
    }

    pub fn pop(&mut self) -> Result<VReg, InternalError> {
        self.regs.pop().ok_or(InternalError::EmptyValueStack)
    }

    pub fn peek(&self) -> Option<VReg> {
        self.regs.last().copied()
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}
