use std::path::PathBuf;

use thiserror::Error;

use crate::emit::EmitError;
use crate::listing::ListingError;

/// An invariant breach caused by an earlier phase. These abort lowering of
/// the current function and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("internal compiler error: malformed `{mnemonic}`: {reason}")]
    MalformedInstruction {
        mnemonic: String,
        reason: &'static str,
    },

    #[error("internal compiler error: label `{0}` defined twice")]
    DuplicateLabel(String),

    #[error("internal compiler error: jump to undefined label `{0}`")]
    UndefinedJumpTarget(String),

    #[error("internal compiler error: release of %v{0} which holds no register or slot")]
    UnallocatedRelease(u32),

    #[error("internal compiler error: pop from an empty value stack")]
    EmptyValueStack,

    #[error("internal compiler error: frame scope exit without a matching enter")]
    FrameUnderflow,

    #[error("internal compiler error: %v{0} has neither a register nor a spill slot")]
    UnresolvedOperand(u32),
}

impl InternalError {
    pub fn malformed(mnemonic: impl Into<String>, reason: &'static str) -> Self {
        InternalError::MalformedInstruction {
            mnemonic: mnemonic.into(),
            reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("in function `{0}`: {1}")]
    Lower(String, InternalError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("IO error: {0}: {1}")]
    Io(PathBuf, std::io::Error),
}
