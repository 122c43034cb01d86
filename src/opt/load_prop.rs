use log::{debug, trace};

use super::{JumpRanges, Pass};
use crate::ir::{AddressingMode, Function, Instruction, Mnemonic, NormalInst, RightOperand, VReg};
use crate::regalloc::regs::FixedReg;

/// Replace reads of a register filled by a constant load with the load's own
/// operand, then turn the load into a `NoOp`.
///
/// Two shapes are rewritten:
/// - the register is read at two or more later points (constant propagation);
/// - the register is read exactly once, by the very next instruction
///   (variable propagation).
///
/// A single far-away read is left alone: the register costs nothing extra
/// and propagating a memory operand that far would need the same safety
/// checks for no gain.
pub struct LoadPropagation;

impl Pass for LoadPropagation {
    fn name(&self) -> &'static str {
        "load-propagation"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let ranges = JumpRanges::new(func);
        let occurrences = collect_occurrences(func);
        let mut changed = false;

        for (reg_idx, occ) in occurrences.iter().enumerate() {
            let reg = VReg(reg_idx as u32);
            if func.is_fixed(reg) {
                continue;
            }
            let Some(candidate) = Candidate::find(func, reg, occ) else {
                continue;
            };
            if !candidate.is_safe(func, &ranges) {
                trace!(
                    "{}: not propagating {} at {}",
                    func.name,
                    func.vreg_name(reg),
                    candidate.load_idx
                );
                continue;
            }
            debug!(
                "{}: propagating {} from {} into {} use(s)",
                func.name,
                func.vreg_name(reg),
                candidate.load_idx,
                candidate.uses.len()
            );
            candidate.apply(func);
            changed = true;
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occurrence {
    /// `op X, %v` where `op` accepts any right-hand operand.
    SubstitutableRead(usize),
    /// Any other mention: left slot, index register, `store`, `pop` ...
    Other(usize),
}

impl Occurrence {
    fn idx(self) -> usize {
        match self {
            Occurrence::SubstitutableRead(idx) | Occurrence::Other(idx) => idx,
        }
    }
}

fn collect_occurrences(func: &Function) -> Vec<Vec<Occurrence>> {
    let mut occurrences = vec![Vec::new(); func.vregs.len()];
    for (idx, inst) in func.insts.iter().enumerate() {
        let Some(inst) = inst.as_normal() else {
            continue;
        };
        occurrences[inst.left.index()].push(Occurrence::Other(idx));
        if let Some(right) = inst.right_reg() {
            if right == inst.left {
                continue;
            }
            let occ = if is_substitutable_read(inst, right) {
                Occurrence::SubstitutableRead(idx)
            } else {
                Occurrence::Other(idx)
            };
            occurrences[right.index()].push(occ);
        }
    }
    occurrences
}

fn is_substitutable_read(inst: &NormalInst, reg: VReg) -> bool {
    inst.mnemonic.accepts_any_right()
        && inst.right.as_ref().is_some_and(|right| right.is_plain_reg(reg))
}

struct Candidate {
    load_idx: usize,
    source: RightOperand,
    uses: Vec<usize>,
}

impl Candidate {
    fn find(func: &Function, reg: VReg, occ: &[Occurrence]) -> Option<Candidate> {
        let (first, rest) = occ.split_first()?;
        let load_idx = match first {
            Occurrence::Other(idx) => *idx,
            Occurrence::SubstitutableRead(_) => return None,
        };
        let source = constant_load_source(func, load_idx, reg)?;

        let mut uses = Vec::with_capacity(rest.len());
        for occ in rest {
            match occ {
                Occurrence::SubstitutableRead(idx) => uses.push(*idx),
                Occurrence::Other(_) => return None,
            }
        }
        match uses.as_slice() {
            [] => None,
            [only] if *only != load_idx + 1 => None,
            _ => Some(Candidate {
                load_idx,
                source: source.clone(),
                uses,
            }),
        }
    }

    fn last_use(&self) -> usize {
        self.uses.last().copied().unwrap_or(self.load_idx)
    }

    fn is_safe(&self, func: &Function, ranges: &JumpRanges) -> bool {
        let end = self.last_use();
        if !ranges.is_closed(self.load_idx, end) {
            return false;
        }
        if self.uses.len() == 1 {
            return true;
        }
        let span = &func.insts[self.load_idx + 1..end];
        let reads_memory = self.source.mode != AddressingMode::Immediate;
        let base = self.source.addr.reg().and_then(|reg| func.fixed_reg_of(reg));
        span.iter().filter_map(Instruction::as_normal).all(|inst| {
            if reads_memory && inst.mnemonic.may_write_memory() {
                return false;
            }
            match base {
                Some(base) => !writes_fixed(func, inst, base),
                None => true,
            }
        })
    }

    fn apply(self, func: &mut Function) {
        for idx in &self.uses {
            if let Instruction::Normal(inst) = &mut func.insts[*idx] {
                inst.right = Some(self.source.clone());
            }
        }
        let label = func.insts[self.load_idx].take_label();
        func.insts[self.load_idx] = Instruction::NoOp { label };
    }
}

/// `load %v, src` where `src` mentions no allocatable register.
fn constant_load_source(func: &Function, idx: usize, reg: VReg) -> Option<&RightOperand> {
    let inst = func.insts[idx].as_normal()?;
    if inst.mnemonic != Mnemonic::Load || inst.left != reg {
        return None;
    }
    let source = inst.right.as_ref()?;
    match source.addr.reg() {
        Some(base) if !func.is_fixed(base) => None,
        _ => Some(source),
    }
}

fn writes_fixed(func: &Function, inst: &NormalInst, reg: FixedReg) -> bool {
    if inst.mnemonic.writes_left() && func.fixed_reg_of(inst.left) == Some(reg) {
        return true;
    }
    if inst.mnemonic.writes_right()
        && inst.right_reg().and_then(|r| func.fixed_reg_of(r)) == Some(reg)
    {
        return true;
    }
    // Stack operations move SP whatever their operands say.
    reg == FixedReg::SP
        && matches!(
            inst.mnemonic,
            Mnemonic::Push
                | Mnemonic::Pop
                | Mnemonic::Pushr
                | Mnemonic::Popr
                | Mnemonic::Call
                | Mnemonic::Exit
        )
}
