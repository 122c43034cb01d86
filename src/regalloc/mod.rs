pub mod alloc;
pub mod liveness;
pub mod regs;
pub mod rewrite;
pub mod spill;

pub use alloc::{AllocMapDisplay, AllocationResult, LinearScan};
pub use liveness::{LiveRange, RangeEvent, RangeEventKind};
pub use regs::{FixedReg, PhysReg, PoolReg};
pub use rewrite::insert_spill_code;
