use std::collections::VecDeque;
use std::fmt;

use log::{debug, trace};

use crate::diag::InternalError;
use crate::ir::{Function, VReg};
use crate::regalloc::liveness::{RangeEvent, RangeEventKind};
use crate::regalloc::regs::{PhysReg, PoolReg, POOL_REGS};
use crate::regalloc::spill::SpillAllocator;

/// Helper wrapper to pretty-print the allocation state of a function in a
/// stable order.
pub struct AllocMapDisplay<'a>(pub &'a Function);

impl<'a> fmt::Display for AllocMapDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.0;
        let mut first = true;
        for (i, info) in func.vregs.iter().enumerate() {
            if info.is_fixed() {
                continue;
            }
            let name = func.vreg_name(VReg(i as u32));
            let line = match (info.assigned, info.spill_slot) {
                (Some(reg), _) => format!("{} -> {}", name, reg),
                (None, Some(slot)) => format!("{} -> spill[{}]", name, slot),
                (None, None) => continue,
            };
            if !first {
                writeln!(f)?;
            }
            first = false;
            f.write_str(&line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveReg {
    vreg: VReg,
    end: usize,
    reg: PoolReg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationResult {
    /// Peak number of spill slots in use; the frame reserves this many.
    pub spill_slots: u32,
}

pub struct LinearScan<'a> {
    func: &'a mut Function,
    // Ordered by descending live end, so the eviction candidate is first.
    active: Vec<ActiveReg>,
    spill_alloc: SpillAllocator,
}

impl<'a> LinearScan<'a> {
    pub fn new(func: &'a mut Function) -> Self {
        Self {
            func,
            active: Vec::new(),
            spill_alloc: SpillAllocator::new(),
        }
    }

    fn live_end(&self, vreg: VReg) -> usize {
        self.func.info(vreg).live_end.unwrap_or(0)
    }

    fn insert_into_active_set(&mut self, active: ActiveReg) {
        let pos = self
            .active
            .iter()
            .position(|a| a.end < active.end)
            .unwrap_or(self.active.len());
        self.active.insert(pos, active);
    }

    fn assign_reg(&mut self, vreg: VReg, reg: PoolReg) {
        self.func.info_mut(vreg).assigned = Some(PhysReg::Pool(reg));
        let end = self.live_end(vreg);
        self.insert_into_active_set(ActiveReg { vreg, end, reg });
    }

    fn spill(&mut self, vreg: VReg) {
        let from = self.func.info(vreg).live_start.unwrap_or(0);
        let slot = self.spill_alloc.alloc_slot(from);
        let info = self.func.info_mut(vreg);
        info.assigned = None;
        info.spill_slot = Some(slot);
        debug!(
            "{}: spilling {} to slot {}",
            self.func.name,
            self.func.vreg_name(vreg),
            slot
        );
    }

    fn handle_range_start(&mut self, free_regs: &mut VecDeque<PoolReg>, vreg: VReg) {
        if let Some(reg) = free_regs.pop_front() {
            self.assign_reg(vreg, reg);
            return;
        }

        let end = self.live_end(vreg);
        match self.active.first().copied() {
            // Spill victim, give its reg to current
            Some(victim) if victim.end > end => {
                self.active.remove(0);
                self.spill(victim.vreg);
                self.assign_reg(vreg, victim.reg);
            }
            // Spill current since it lives at least as long (it doesn't enter the active set)
            _ => self.spill(vreg),
        }
    }

    fn handle_range_end(
        &mut self,
        free_regs: &mut VecDeque<PoolReg>,
        vreg: VReg,
    ) -> Result<(), InternalError> {
        let info = self.func.info(vreg);
        match (info.assigned, info.spill_slot) {
            (Some(PhysReg::Pool(reg)), _) => {
                self.active.retain(|a| a.vreg != vreg);
                // Keep this register hot for future ranges.
                free_regs.push_front(reg);
            }
            (None, Some(slot)) => {
                let at = info.live_end.unwrap_or(0);
                self.spill_alloc.release_slot(slot, at);
            }
            _ => return Err(InternalError::UnallocatedRelease(vreg.id())),
        }
        Ok(())
    }

    // Note: this consumes self, rendering it unusable after calling this method.
    pub fn alloc(self, events: &[RangeEvent]) -> Result<AllocationResult, InternalError> {
        self.alloc_into(events, &POOL_REGS)
    }

    // Note: this consumes self, rendering it unusable after calling this method.
    pub fn alloc_into(
        mut self,
        events: &[RangeEvent],
        pool: &[PoolReg],
    ) -> Result<AllocationResult, InternalError> {
        let mut free_regs: VecDeque<PoolReg> = pool.iter().copied().collect();

        for event in events {
            trace!("{}: {}", self.func.name, event);
            match event.kind {
                RangeEventKind::Start => self.handle_range_start(&mut free_regs, event.reg),
                RangeEventKind::End => self.handle_range_end(&mut free_regs, event.reg)?,
            }
        }

        Ok(AllocationResult {
            spill_slots: self.spill_alloc.total_slots(),
        })
    }
}

#[cfg(test)]
#[path = "../tests/t_regalloc.rs"]
mod tests;
