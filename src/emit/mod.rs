//! Bridge from a register-resolved function to an assembly writer.

pub mod text;

use thiserror::Error;

use crate::diag::InternalError;
use crate::ir::{format_right, Function, Instruction, RightOperand, VReg};

pub use text::{TextWriter, TextWriterConfig};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write assembly: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// The assembly writer the final stream is handed to. Labels given to
/// `add_label` belong to the next emitted instruction.
pub trait AsmWriter {
    fn add_label(&mut self, name: &str) -> Result<(), EmitError>;

    /// An instruction with one operand, or none.
    fn emit(&mut self, mnemonic: &str, operand: Option<&str>) -> Result<(), EmitError>;

    fn emit_pair(&mut self, mnemonic: &str, left: &str, right: &str) -> Result<(), EmitError>;

    /// Flush any pending label and the underlying output.
    fn finish(&mut self) -> Result<(), EmitError>;
}

/// Forward every instruction of `func` to `writer`. Every register operand
/// must have been resolved to a physical register by now.
pub fn emit_function(func: &Function, writer: &mut dyn AsmWriter) -> Result<(), EmitError> {
    for inst in &func.insts {
        if let Some(label) = inst.label() {
            writer.add_label(label)?;
        }
        match inst {
            Instruction::NoOp { .. } => writer.emit("nop", None)?,
            Instruction::Pseudo {
                directive, value, ..
            } => writer.emit(directive.name(), Some(&value.to_string()))?,
            Instruction::Normal(inst) => {
                let mnemonic = inst.mnemonic.name();
                let right = inst
                    .right
                    .as_ref()
                    .map(|right| right_text(func, right))
                    .transpose()?;
                match right {
                    Some(right) if inst.mnemonic.has_implicit_left() => {
                        writer.emit(mnemonic, Some(&right))?
                    }
                    Some(right) => writer.emit_pair(mnemonic, &phys_name(func, inst.left)?, &right)?,
                    None => writer.emit(mnemonic, Some(&phys_name(func, inst.left)?))?,
                }
            }
        }
    }

    if let Some(label) = &func.trailing_label {
        writer.add_label(label)?;
    }
    Ok(())
}

fn phys_name(func: &Function, reg: VReg) -> Result<String, InternalError> {
    func.info(reg)
        .assigned
        .map(|phys| phys.to_string())
        .ok_or(InternalError::UnresolvedOperand(reg.id()))
}

fn right_text(func: &Function, right: &RightOperand) -> Result<String, InternalError> {
    let base = right.addr.reg().map(|reg| phys_name(func, reg)).transpose()?;
    Ok(format_right(right, |_| base.clone().unwrap_or_default()))
}

#[cfg(test)]
#[path = "../tests/t_emit.rs"]
mod tests;
