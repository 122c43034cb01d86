//! Line-oriented textual form of the builder API.
//!
//! ```text
//! ; sum of two parameters
//! .fn add2 params=2 locals=1
//!         load  %a, -3(FP)
//!         load  %b, -2(FP)
//!         add   %a, %b
//!         store %a, 1(FP)
//! done
//! .end
//! ```
//!
//! A line starting in the first column starts with a label. Virtual registers
//! are written `%name`; `SP`, `FP`, `R0` and `R5` name fixed registers. Pool
//! registers (`R1`..`R4`) belong to the allocator and are rejected.

use std::collections::HashMap;

use thiserror::Error;

use crate::diag::InternalError;
use crate::ir::{
    Address, AddressingMode, Directive, Function, FunctionBuilder, Imm, Mnemonic, RightOperand,
    VReg,
};
use crate::regalloc::regs::PhysReg;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("line {line}: {msg}")]
    Syntax { line: usize, msg: String },

    #[error("line {line}: {source}")]
    Shape { line: usize, source: InternalError },

    #[error("line {line}: `{name}` is an allocatable register and cannot be named directly")]
    PoolRegister { line: usize, name: String },

    #[error("function `{0}` is missing `.end`")]
    UnterminatedFunction(String),
}

/// One function read from a listing, with the frame facts its header states.
#[derive(Debug)]
pub struct ListedFunction {
    pub func: Function,
    pub params: u32,
    pub locals: u32,
}

pub fn parse_listing(source: &str) -> Result<Vec<ListedFunction>, ListingError> {
    let mut funcs = Vec::new();
    let mut current: Option<FunctionReader> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }

        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix(".fn") {
            if let Some(open) = &current {
                return Err(ListingError::UnterminatedFunction(open.name.clone()));
            }
            current = Some(FunctionReader::from_header(header, line_no)?);
            continue;
        }
        if trimmed == ".end" {
            let Some(reader) = current.take() else {
                return Err(syntax(line_no, "`.end` without `.fn`"));
            };
            funcs.push(reader.finish(line_no)?);
            continue;
        }

        let Some(reader) = current.as_mut() else {
            return Err(syntax(line_no, "instruction outside of a function"));
        };
        reader.read_line(line, line_no)?;
    }

    match current {
        Some(open) => Err(ListingError::UnterminatedFunction(open.name)),
        None => Ok(funcs),
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn syntax(line: usize, msg: impl Into<String>) -> ListingError {
    ListingError::Syntax {
        line,
        msg: msg.into(),
    }
}

struct FunctionReader {
    name: String,
    params: u32,
    locals: u32,
    builder: FunctionBuilder,
    vregs: HashMap<String, VReg>,
}

impl FunctionReader {
    fn from_header(header: &str, line: usize) -> Result<Self, ListingError> {
        let mut words = header.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| syntax(line, "`.fn` needs a function name"))?
            .to_string();

        let mut params = 0;
        let mut locals = 0;
        for word in words {
            let (key, value) = word
                .split_once('=')
                .ok_or_else(|| syntax(line, format!("expected key=value, found `{}`", word)))?;
            let value: u32 = value
                .parse()
                .map_err(|_| syntax(line, format!("invalid count `{}`", value)))?;
            match key {
                "params" => params = value,
                "locals" => locals = value,
                _ => return Err(syntax(line, format!("unknown attribute `{}`", key))),
            }
        }

        Ok(Self {
            builder: FunctionBuilder::new(name.clone()),
            name,
            params,
            locals,
            vregs: HashMap::new(),
        })
    }

    fn read_line(&mut self, line: &str, line_no: usize) -> Result<(), ListingError> {
        let shape = |source| ListingError::Shape {
            line: line_no,
            source,
        };

        let mut rest = line;
        if !line.starts_with(char::is_whitespace) {
            let end = line.find(char::is_whitespace).unwrap_or(line.len());
            self.builder.add_label(&line[..end]).map_err(shape)?;
            rest = &line[end..];
        }
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(());
        }

        let (word, operands) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };

        if let Some(directive) = Directive::parse(word) {
            let value = operands
                .parse()
                .map_err(|_| syntax(line_no, format!("invalid `{}` value `{}`", word, operands)))?;
            return self.builder.emit_pseudo(directive, value).map_err(shape);
        }

        let mnemonic = Mnemonic::parse(word);
        let operands: Vec<&str> = if operands.is_empty() {
            Vec::new()
        } else {
            operands.split(',').map(str::trim).collect()
        };

        match operands.as_slice() {
            [] => self.builder.emit_no_operand(mnemonic).map_err(shape),
            [target] if mnemonic.has_implicit_left() => {
                self.builder.emit_jump(mnemonic, None, *target).map_err(shape)
            }
            [left] => {
                let left = self.parse_reg(left, line_no)?;
                self.builder.emit_normal(mnemonic, left, None).map_err(shape)
            }
            [left, right] => {
                let left = self.parse_reg(left, line_no)?;
                let right = self.parse_right(right, line_no)?;
                self.builder
                    .emit_normal(mnemonic, left, Some(right))
                    .map_err(shape)
            }
            _ => Err(syntax(line_no, "too many operands")),
        }
    }

    fn parse_reg(&mut self, text: &str, line: usize) -> Result<VReg, ListingError> {
        if let Some(name) = text.strip_prefix('%') {
            if !is_ident(name) {
                return Err(syntax(line, format!("invalid register name `{}`", text)));
            }
            let builder = &mut self.builder;
            let reg = *self
                .vregs
                .entry(name.to_string())
                .or_insert_with(|| builder.new_named_vreg(name));
            return Ok(reg);
        }
        match PhysReg::from_name(text) {
            Some(PhysReg::Fixed(reg)) => Ok(self.builder.fixed(reg)),
            Some(PhysReg::Pool(_)) => Err(ListingError::PoolRegister {
                line,
                name: text.to_string(),
            }),
            None => Err(syntax(line, format!("expected a register, found `{}`", text))),
        }
    }

    fn parse_right(&mut self, text: &str, line: usize) -> Result<RightOperand, ListingError> {
        let (mode, body) = match text.as_bytes().first() {
            Some(b'=') => (AddressingMode::Immediate, &text[1..]),
            Some(b'@') => (AddressingMode::Indirect, &text[1..]),
            _ => (AddressingMode::Direct, text),
        };
        let body = body.trim();

        let addr = if let Some(open) = body.find('(') {
            let Some(inner) = body[open + 1..].strip_suffix(')') else {
                return Err(syntax(line, format!("unbalanced parentheses in `{}`", text)));
            };
            let imm = parse_imm(body[..open].trim(), line)?;
            Address::Indexed(imm, self.parse_reg(inner.trim(), line)?)
        } else if body.starts_with('%') || PhysReg::from_name(body).is_some() {
            Address::Reg(self.parse_reg(body, line)?)
        } else {
            Address::Imm(parse_imm(body, line)?)
        };
        Ok(RightOperand::new(mode, addr))
    }

    fn finish(self, line: usize) -> Result<ListedFunction, ListingError> {
        let func = self
            .builder
            .finish()
            .map_err(|source| ListingError::Shape { line, source })?;
        Ok(ListedFunction {
            func,
            params: self.params,
            locals: self.locals,
        })
    }
}

fn parse_imm(text: &str, line: usize) -> Result<Imm, ListingError> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Imm::Int(value));
    }
    if is_ident(text) {
        return Ok(Imm::Symbol(text.to_string()));
    }
    Err(syntax(line, format!("invalid immediate `{}`", text)))
}

fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "tests/t_listing.rs"]
mod tests;
