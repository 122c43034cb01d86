pub mod compile;
pub mod diag;
pub mod emit;
pub mod frame;
pub mod ir;
pub mod listing;
pub mod opt;
pub mod regalloc;

pub use compile::{CompileOptions, LowerOptions, compile, lower_function};
pub use diag::{CompileError, InternalError};
