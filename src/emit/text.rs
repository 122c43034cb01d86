use std::io::Write;

use super::{AsmWriter, EmitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWriterConfig {
    pub label_width: usize,
    pub mnemonic_width: usize,
}

impl Default for TextWriterConfig {
    fn default() -> Self {
        Self {
            label_width: 8,
            mnemonic_width: 6,
        }
    }
}

/// Column-formatted assembly text:
///
/// ```text
/// loop    load  R1, =5
///         jzer  R1, done
/// ```
pub struct TextWriter<W: Write> {
    out: W,
    config: TextWriterConfig,
    pending_label: Option<String>,
}

impl<W: Write> TextWriter<W> {
    pub fn new(out: W, config: TextWriterConfig) -> Self {
        Self {
            out,
            config,
            pending_label: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, mnemonic: &str, operands: &str) -> Result<(), EmitError> {
        let mut line = String::new();
        let label = self.pending_label.take().unwrap_or_default();
        if label.len() < self.config.label_width {
            line.push_str(&format!("{:<width$}", label, width = self.config.label_width));
        } else {
            line.push_str(&label);
            line.push(' ');
        }
        if operands.is_empty() {
            line.push_str(mnemonic);
        } else {
            line.push_str(&format!(
                "{:<width$} {}",
                mnemonic,
                operands,
                width = self.config.mnemonic_width.saturating_sub(1)
            ));
        }
        writeln!(self.out, "{}", line.trim_end())?;
        Ok(())
    }
}

impl<W: Write> AsmWriter for TextWriter<W> {
    fn add_label(&mut self, name: &str) -> Result<(), EmitError> {
        if self.pending_label.is_some() {
            self.write_line("nop", "")?;
        }
        self.pending_label = Some(name.to_string());
        Ok(())
    }

    fn emit(&mut self, mnemonic: &str, operand: Option<&str>) -> Result<(), EmitError> {
        self.write_line(mnemonic, operand.unwrap_or(""))
    }

    fn emit_pair(&mut self, mnemonic: &str, left: &str, right: &str) -> Result<(), EmitError> {
        self.write_line(mnemonic, &format!("{}, {}", left, right))
    }

    fn finish(&mut self) -> Result<(), EmitError> {
        if self.pending_label.is_some() {
            self.write_line("nop", "")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
