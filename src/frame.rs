use log::debug;

use crate::diag::InternalError;
use crate::ir::{Function, Instruction, Mnemonic, NormalInst, RightOperand};
use crate::regalloc::regs::FixedReg;

/// Activation record layout of one function, addressed relative to `FP`.
///
/// Parameters sit below the frame pointer and locals above it; spill slots
/// sit above every local the function ever has live at once.
///
/// Higher address
///  ^
///  |  +--------------------+ <- FP + max_locals + spill_slots
///  |  |   spill slot n-1   |
///  |  |        ...         |
///  |  |   spill slot 0     | <- FP + max_locals + 1
///  |  +--------------------+
///  |  |   local (nested)   |    reused once the scope exits
///  |  |   local 1          | <- FP + 1
///  |  +--------------------+ <- FP
///  |  |   saved state      |
///  |  +--------------------+
///  |  |   param n-1        | <- FP - 1
///  |  |        ...         |
///  |  |   param 0          | <- FP - n
///  |  +--------------------+
///  v
/// Lower address
#[derive(Debug, Default)]
pub struct Frame {
    param_count: u32,
    locals: u32,
    max_locals: u32,
    scopes: Vec<u32>,
    spill_slots: u32,
}

impl Frame {
    pub fn new(param_count: u32) -> Self {
        Self {
            param_count,
            ..Self::default()
        }
    }

    pub fn param_count(&self) -> u32 {
        self.param_count
    }

    /// FP-relative offset of parameter `index`.
    pub fn param_offset(&self, index: u32) -> i64 {
        -(1 + self.param_count as i64 - index as i64)
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(self.locals);
    }

    pub fn exit_scope(&mut self) -> Result<(), InternalError> {
        self.locals = self.scopes.pop().ok_or(InternalError::FrameUnderflow)?;
        Ok(())
    }

    /// Reserve `size` words and return the FP-relative offset of the first.
    pub fn reserve_local(&mut self, size: u32) -> i64 {
        let offset = self.locals as i64 + 1;
        self.locals += size;
        self.max_locals = self.max_locals.max(self.locals);
        offset
    }

    pub fn reserve_spill_locations(&mut self, count: u32) {
        self.spill_slots = self.spill_slots.max(count);
    }

    #[inline]
    pub fn max_locals(&self) -> u32 {
        self.max_locals
    }

    #[inline]
    pub fn spill_slots(&self) -> u32 {
        self.spill_slots
    }

    pub fn spill_slot_offset(&self, slot: u32) -> i64 {
        self.max_locals as i64 + 1 + slot as i64
    }

    /// Words to reserve on entry.
    #[inline]
    pub fn size(&self) -> u32 {
        self.max_locals + self.spill_slots
    }

    /// Move `SP` past the frame on entry and back on every way out: before
    /// each `exit` and where control falls off the end. An `exit` label moves
    /// to its release so jumps to it still restore `SP`. Nothing is inserted
    /// for an empty frame. Returns the number of inserted instructions.
    pub fn insert_frame_code(&self, func: &mut Function) -> usize {
        let size = self.size();
        if size == 0 {
            return 0;
        }
        let sp = func.fixed(FixedReg::SP);
        let adjust = |mnemonic: Mnemonic, label: Option<String>| {
            Instruction::Normal(NormalInst {
                label,
                mnemonic,
                left: sp,
                right: Some(RightOperand::int(size as i64)),
            })
        };

        let original = std::mem::take(&mut func.insts);
        let original_len = original.len();
        let falls_through = func.trailing_label.is_some()
            || !original
                .iter()
                .rev()
                .find_map(Instruction::as_normal)
                .is_some_and(|inst| matches!(inst.mnemonic, Mnemonic::Jump | Mnemonic::Exit));

        let mut out = Vec::with_capacity(original.len() + 2);
        out.push(adjust(Mnemonic::Add, None));
        for mut inst in original {
            if inst.as_normal().is_some_and(|n| n.mnemonic == Mnemonic::Exit) {
                out.push(adjust(Mnemonic::Sub, inst.take_label()));
            }
            out.push(inst);
        }
        if falls_through {
            out.push(adjust(Mnemonic::Sub, func.trailing_label.take()));
        }

        let inserted = out.len() - original_len;
        func.insts = out;
        debug!("{}: frame of {} word(s), {} adjustment(s)", func.name, size, inserted);
        inserted
    }
}

#[cfg(test)]
#[path = "tests/t_frame.rs"]
mod tests;
