//! Bytecode assembler for authoring class programs.

use thiserror::Error;

use crate::util::bytes::{write_u16_le, write_u32_le};

use super::opcode::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("label {0} is used but never bound")]
    UnboundLabel(usize),
    #[error("label {0} is bound twice")]
    Rebound(usize),
    #[error("code segment exceeds 64 KiB (branch target {0})")]
    TooLarge(usize),
}

/// Emits one class's code segment. Offsets returned by [`Assembler::handler`]
/// go into the class's export dictionary.
#[derive(Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
    error: Option<AsmError>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Start a handler with `auto_size` bytes of automatic storage; returns its offset.
    pub fn handler(&mut self, auto_size: u16) -> u32 {
        let at = self.code.len() as u32;
        write_u16_le(&mut self.code, auto_size);
        at
    }

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn bind(&mut self, label: Label) -> &mut Self {
        match self.labels[label.0] {
            Some(_) => {
                self.error.get_or_insert(AsmError::Rebound(label.0));
            }
            None => self.labels[label.0] = Some(self.code.len()),
        }
        self
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    pub fn op_u8(&mut self, op: Opcode, operand: u8) -> &mut Self {
        self.code.push(op as u8);
        self.code.push(operand);
        self
    }

    pub fn op_u16(&mut self, op: Opcode, operand: u16) -> &mut Self {
        self.code.push(op as u8);
        write_u16_le(&mut self.code, operand);
        self
    }

    /// Emit raw bytes as they are.
    pub fn bytes(&mut self, raw: &[u8]) -> &mut Self {
        self.code.extend_from_slice(raw);
        self
    }

    fn target(&mut self, label: Label) {
        self.fixups.push((self.code.len(), label));
        write_u16_le(&mut self.code, 0);
    }

    /// `BRT`, `BRF`, `BRA` or `JSR` to `label`.
    pub fn branch(&mut self, op: Opcode, label: Label) -> &mut Self {
        self.code.push(op as u8);
        self.target(label);
        self
    }

    /// Load a constant into the top cell, using the shortest encoding.
    pub fn constant(&mut self, value: i32) -> &mut Self {
        match value {
            0..=0xFF => self.op_u8(Opcode::Shtc, value as u8),
            0x100..=0xFFFF => self.op_u16(Opcode::Intc, value as u16),
            _ => {
                self.code.push(Opcode::Lngc as u8);
                write_u32_le(&mut self.code, value as u32);
                self
            }
        }
    }

    /// `PUSH` followed by a constant.
    pub fn push_constant(&mut self, value: i32) -> &mut Self {
        self.op(Opcode::Push).constant(value)
    }

    pub fn case(&mut self, arms: &[(i32, Label)], default: Label) -> &mut Self {
        self.code.push(Opcode::Case as u8);
        write_u16_le(&mut self.code, arms.len() as u16);
        for &(value, label) in arms {
            write_u32_le(&mut self.code, value as u32);
            self.target(label);
        }
        self.target(default);
        self
    }

    /// Load native code resource `index` (as bound by a `C:` import).
    pub fn rcrs(&mut self, index: u16) -> &mut Self {
        match index.checked_mul(4) {
            Some(operand) => self.op_u16(Opcode::Rcrs, operand),
            None => {
                self.error.get_or_insert(AsmError::TooLarge(index as usize * 4));
                self
            }
        }
    }

    pub fn call(&mut self, argc: u8) -> &mut Self {
        self.op_u8(Opcode::Call, argc)
    }

    pub fn send(&mut self, argc: u8, message: u16) -> &mut Self {
        self.op_u8(Opcode::Send, argc);
        write_u16_le(&mut self.code, message);
        self
    }

    pub fn pass(&mut self, argc: u8) -> &mut Self {
        self.op_u8(Opcode::Pass, argc)
    }

    pub fn arg(&mut self, index: u8) -> &mut Self {
        self.op_u8(Opcode::Arg, index)
    }

    pub fn end(&mut self) -> &mut Self {
        self.op(Opcode::End)
    }

    pub fn finish(mut self) -> Result<Vec<u8>, AsmError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for &(at, label) in &self.fixups {
            let target = self.labels[label.0].ok_or(AsmError::UnboundLabel(label.0))?;
            let target = u16::try_from(target).map_err(|_| AsmError::TooLarge(target))?;
            self.code[at..at + 2].copy_from_slice(&target.to_le_bytes());
        }
        Ok(self.code)
    }
}
