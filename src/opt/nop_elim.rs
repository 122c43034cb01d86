use super::Pass;
use crate::ir::{Function, Instruction};

/// Drop `NoOp`s, moving any label they carry onto the next instruction (or
/// the function's trailing label). A `NoOp` survives only when its label has
/// nowhere to go because the next instruction already carries one.
pub struct NopElimination;

impl Pass for NopElimination {
    fn name(&self) -> &'static str {
        "nop-elimination"
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let original = std::mem::take(&mut func.insts);
        let mut out = Vec::with_capacity(original.len());
        let mut carried: Option<String> = None;

        for inst in &original {
            if let Instruction::NoOp { label } = inst {
                match (carried.take(), label) {
                    (None, label) => carried = label.clone(),
                    (Some(prev), None) => carried = Some(prev),
                    (Some(prev), Some(label)) => {
                        out.push(Instruction::NoOp { label: Some(prev) });
                        carried = Some(label.clone());
                    }
                }
                continue;
            }

            let mut inst = inst.clone();
            if let Some(label) = carried.take() {
                if let Err(label) = inst.try_set_label(label) {
                    out.push(Instruction::NoOp { label: Some(label) });
                }
            }
            out.push(inst);
        }

        let mut changed = false;
        if let Some(label) = carried {
            if func.trailing_label.is_none() {
                func.trailing_label = Some(label);
                changed = true;
            } else {
                out.push(Instruction::NoOp { label: Some(label) });
            }
        }
        changed |= out != original;

        func.insts = out;
        changed
    }
}
