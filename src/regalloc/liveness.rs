use std::cmp::Ordering;
use std::fmt;

use crate::ir::{Function, VReg};

// -- Live ranges --

/// Half-open instruction-index interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    pub start: usize,
    pub end: usize,
}

impl LiveRange {
    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeEventKind {
    // Declaration order is the tie-break at equal index.
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEvent {
    pub index: usize,
    pub kind: RangeEventKind,
    pub reg: VReg,
}

impl PartialOrd for RangeEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RangeEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // sort by:
        // 1. index
        // 2. kind: Start < End
        // 3. reg (deterministic order among equal events)
        self.index
            .cmp(&other.index)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.reg.cmp(&other.reg))
    }
}

impl fmt::Display for RangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RangeEventKind::Start => "start",
            RangeEventKind::End => "end",
        };
        write!(f, "[{}] {} {}", self.index, kind, self.reg)
    }
}

/// Record `live_start`/`live_end` for every allocatable register and return
/// the sorted range events. Fixed registers are skipped.
pub fn analyze(func: &mut Function) -> Vec<RangeEvent> {
    let mut seen = vec![false; func.vregs.len()];
    for (idx, inst) in func.insts.iter().enumerate() {
        let Some(inst) = inst.as_normal() else {
            continue;
        };
        for reg in inst.regs() {
            if !seen[reg.index()] {
                seen[reg.index()] = true;
                func.vregs[reg.index()].live_start = Some(idx);
            }
        }
    }

    let mut done = vec![false; func.vregs.len()];
    for (idx, inst) in func.insts.iter().enumerate().rev() {
        let Some(inst) = inst.as_normal() else {
            continue;
        };
        for reg in inst.regs() {
            if !done[reg.index()] {
                done[reg.index()] = true;
                func.vregs[reg.index()].live_end = Some(idx + 1);
            }
        }
    }

    let mut events = Vec::new();
    for (i, info) in func.vregs.iter_mut().enumerate() {
        if info.is_fixed() {
            info.live_start = None;
            info.live_end = None;
            continue;
        }
        let (Some(start), Some(end)) = (info.live_start, info.live_end) else {
            continue;
        };
        let reg = VReg(i as u32);
        events.push(RangeEvent {
            index: start,
            kind: RangeEventKind::Start,
            reg,
        });
        events.push(RangeEvent {
            index: end,
            kind: RangeEventKind::End,
            reg,
        });
    }
    events.sort();
    events
}

pub fn live_range(func: &Function, reg: VReg) -> Option<LiveRange> {
    let info = func.info(reg);
    match (info.live_start, info.live_end) {
        (Some(start), Some(end)) => Some(LiveRange { start, end }),
        _ => None,
    }
}

/// Format live ranges for human-readable output.
pub fn format_live_ranges(func: &Function) -> String {
    let mut out = String::new();
    out.push_str(&format!("Live Ranges ({}):\n", func.name));
    out.push_str("--------------------------------\n");
    for i in 0..func.vregs.len() {
        let reg = VReg(i as u32);
        if let Some(range) = live_range(func, reg) {
            out.push_str(&format!(
                "  {}: [{}; {})\n",
                func.vreg_name(reg),
                range.start,
                range.end
            ));
        }
    }
    out.push_str("--------------------------------\n");
    out
}

#[cfg(test)]
#[path = "../tests/t_liveness.rs"]
mod tests;
