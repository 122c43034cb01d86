//! Peephole optimization over one function's instruction stream.
//!
//! Passes run once, in order: load propagation first (it leaves behind
//! labelled `NoOp`s) and no-op elimination second.

pub mod jump_ranges;
pub mod load_prop;
pub mod nop_elim;

use log::debug;

use crate::ir::Function;

pub use jump_ranges::JumpRanges;
pub use load_prop::LoadPropagation;
pub use nop_elim::NopElimination;

pub trait Pass {
    fn name(&self) -> &'static str;
    fn run(&mut self, func: &mut Function) -> bool;
}

struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    fn new() -> Self {
        Self {
            passes: vec![Box::new(LoadPropagation), Box::new(NopElimination)],
        }
    }

    fn run(&mut self, func: &mut Function) -> bool {
        let mut changed = false;
        for pass in &mut self.passes {
            let pass_changed = pass.run(func);
            debug!(
                "{}: pass `{}` {}",
                func.name,
                pass.name(),
                if pass_changed { "changed the stream" } else { "made no change" }
            );
            changed |= pass_changed;
        }
        changed
    }
}

/// Run all peephole passes. Returns whether anything changed.
pub fn optimize(func: &mut Function) -> bool {
    PassManager::new().run(func)
}

#[cfg(test)]
#[path = "../tests/t_opt.rs"]
mod tests;
