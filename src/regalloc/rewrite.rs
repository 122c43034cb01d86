use log::{debug, trace};

use crate::diag::InternalError;
use crate::frame::Frame;
use crate::ir::{Function, Instruction, Mnemonic, NormalInst, RightOperand, VReg};
use crate::regalloc::regs::FixedReg;

/// Rewrite every use of a spilled register to go through the scratch
/// registers:
///
/// ```text
///   load  R0, slot(FP)    ; unless the instruction discards its left
///   load  R5, slot(FP)    ; spilled right operand
///   op    R0, R5
///   store R0, slot(FP)    ; if the instruction writes its left
/// ```
///
/// A label on the original instruction moves to the first inserted load.
/// Returns the number of inserted instructions.
pub fn insert_spill_code(func: &mut Function, frame: &Frame) -> Result<usize, InternalError> {
    let scratch = Scratch {
        left: func.fixed(FixedReg::LEFT_SCRATCH),
        right: func.fixed(FixedReg::RIGHT_SCRATCH),
        fp: func.fixed(FixedReg::FP),
    };

    let original = std::mem::take(&mut func.insts);
    let mut out = Vec::with_capacity(original.len());
    let mut inserted = 0;

    for inst in original {
        let Instruction::Normal(inst) = inst else {
            out.push(inst);
            continue;
        };
        let left_slot = spill_slot_of(func, inst.left)?;
        let right_slot = match inst.right_reg() {
            Some(reg) => spill_slot_of(func, reg)?,
            None => None,
        };
        if left_slot.is_none() && right_slot.is_none() {
            out.push(Instruction::Normal(inst));
            continue;
        }

        let (before, inst, after) = bracket(inst, left_slot, right_slot, frame, &scratch);
        trace!(
            "{}: {} before, {} after `{}`",
            func.name,
            before.len(),
            after.len(),
            inst.mnemonic
        );
        inserted += before.len() + after.len();
        out.extend(before);
        out.push(Instruction::Normal(inst));
        out.extend(after);
    }

    func.insts = out;
    debug!("{}: inserted {} spill instruction(s)", func.name, inserted);
    Ok(inserted)
}

struct Scratch {
    left: VReg,
    right: VReg,
    fp: VReg,
}

impl Scratch {
    fn slot_operand(&self, frame: &Frame, slot: u32) -> RightOperand {
        RightOperand::indexed(frame.spill_slot_offset(slot), self.fp)
    }

    fn load(&self, reg: VReg, frame: &Frame, slot: u32) -> NormalInst {
        NormalInst {
            label: None,
            mnemonic: Mnemonic::Load,
            left: reg,
            right: Some(self.slot_operand(frame, slot)),
        }
    }

    fn store(&self, reg: VReg, frame: &Frame, slot: u32) -> NormalInst {
        NormalInst {
            label: None,
            mnemonic: Mnemonic::Store,
            left: reg,
            right: Some(self.slot_operand(frame, slot)),
        }
    }
}

fn bracket(
    mut inst: NormalInst,
    left_slot: Option<u32>,
    right_slot: Option<u32>,
    frame: &Frame,
    scratch: &Scratch,
) -> (Vec<Instruction>, NormalInst, Vec<Instruction>) {
    let mut before = Vec::new();
    let mut after = Vec::new();

    if let Some(slot) = left_slot {
        if !inst.mnemonic.discards_left() {
            before.push(scratch.load(scratch.left, frame, slot));
        }
        inst.left = scratch.left;
        if inst.mnemonic.writes_left() {
            after.push(scratch.store(scratch.left, frame, slot));
        }
    }

    if let Some(slot) = right_slot {
        if inst.mnemonic.writes_right() {
            after.push(scratch.store(scratch.right, frame, slot));
        } else {
            before.push(scratch.load(scratch.right, frame, slot));
        }
        if let Some(right) = &mut inst.right {
            right.addr = right.addr.with_reg(scratch.right);
        }
    }

    if let Some(first) = before.first_mut() {
        first.label = inst.label.take();
    }

    let wrap = |insts: Vec<NormalInst>| -> Vec<Instruction> {
        insts.into_iter().map(Instruction::Normal).collect()
    };
    (wrap(before), inst, wrap(after))
}

fn spill_slot_of(func: &Function, reg: VReg) -> Result<Option<u32>, InternalError> {
    let info = func.info(reg);
    if info.is_spilled() {
        return Ok(info.spill_slot);
    }
    match info.assigned {
        Some(_) => Ok(None),
        None => Err(InternalError::UnresolvedOperand(reg.id())),
    }
}

#[cfg(test)]
#[path = "../tests/t_spill.rs"]
mod tests;
