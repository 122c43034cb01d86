//! Instruction stream for the six-register machine.
//!
//! ## Concepts:
//!
//! - A function is a flat, ordered list of instructions. There are no blocks; control flow is
//!   expressed by labels and jump-family instructions that name them.
//! - Virtual registers are dense indices into the function's register table. The table holds the
//!   allocation state of each register (preset, assigned register, live range, spill slot).
//! - Fixed virtual registers are bound to a reserved physical register (`SP`, `FP`, or one of the
//!   spill scratch registers) at creation and never take part in allocation.
//!
//! ## Instructions
//!
//! - `NoOp` carries an optional label and nothing else.
//! - `Pseudo` is a data directive (`ds` reserves words, `dc` defines one). It always has a label.
//! - `Normal` is a machine operation with a left register operand and an optional right-hand
//!   operand. The right-hand side is an immediate, a register, or `imm(reg)`, plus an addressing
//!   mode (`=`, direct, `@`).
//!
//! ## Labels
//!
//! A label names the instruction that carries it. Labels added to the builder attach to the next
//! emitted instruction. A label left over at the end of the function is kept as the function's
//! trailing label.
//!
//! ## Shape rules
//!
//! The builder rejects instructions that the later phases cannot reason about:
//!
//! - jumps must target a direct, register-free label;
//! - `pop` must name `SP` on the left and a register on the right;
//! - only `not`, `pushr` and `popr` may omit the right-hand operand.

pub mod builder;
pub mod types;

pub use builder::{FunctionBuilder, RegStack};
pub use types::*;

#[cfg(test)]
#[path = "../tests/t_ir_builder.rs"]
mod tests;
