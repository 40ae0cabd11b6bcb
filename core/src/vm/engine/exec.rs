//! The interpreter loop.
//!
//! Each frame owns one accumulator cell on the shared stack. Constants and
//! loads overwrite the top cell, `PUSH` opens a new one, and binary operators
//! pop the top and combine it into the cell below as `second OP top`.

use std::rc::Rc;

use tracing::trace;

use crate::error::VmFault;
use crate::vm::linker::{HandlerEntry, Thunk};
use crate::vm::objects::ObjectHandle;
use crate::vm::opcode::{Opcode, Width};
use crate::vm::value::Value;

use super::Engine;
use super::frame::{Frame, fetch_u16, fetch_u32, fetch_u8, load_var, store_var};

fn access_width(op: Opcode) -> Width {
    use Opcode::*;
    match op {
        Lab | Sab | Lsb | Ssb | Lxb | Sxb => Width::Byte,
        Law | Saw | Lsw | Ssw | Lxw | Sxw => Width::Word,
        _ => Width::Long,
    }
}

fn power(base: i32, exp: i32) -> i32 {
    if exp >= 0 {
        return base.wrapping_pow(exp as u32);
    }
    match base {
        1 => 1,
        -1 if exp % 2 == 0 => 1,
        -1 => -1,
        _ => 0,
    }
}

impl Engine {
    pub(super) fn run_handler(
        &mut self,
        slot: usize,
        thunk: &Rc<Thunk>,
        entry: HandlerEntry,
        message: u16,
        args: &[Value],
    ) -> Result<Value, VmFault> {
        let owner = self
            .objects
            .get(slot)
            .map(|object| object.handle)
            .ok_or(VmFault::BadObject { handle: slot as i64 })?;
        let class = thunk.levels.get(entry.level).ok_or(VmFault::NoHandler {
            class: thunk.class,
            message,
        })?;
        self.stack.push(Value::ZERO)?;
        let mut frame = Frame::enter(entry.level, class, entry.offset, self.stack.sp())?;

        loop {
            let code = frame.code();
            let at = frame.pc;
            let byte = fetch_u8(code, at)?;
            let op = Opcode::from_u8(byte).ok_or(VmFault::InvalidOpcode { opcode: byte, pc: at })?;
            trace!(pc = at, op = op.mnemonic(), "step");
            let operand = at + 1;
            let mut next = operand + op.operand_len();

            match op {
                Opcode::Brt | Opcode::Brf | Opcode::Bra => {
                    let taken = match op {
                        Opcode::Brt => self.stack.top()?.truthy(),
                        Opcode::Brf => !self.stack.top()?.truthy(),
                        _ => true,
                    };
                    if taken {
                        next = frame.target(fetch_u16(code, operand)?)?;
                    }
                }
                Opcode::Case => {
                    let count = fetch_u16(code, operand)? as usize;
                    let table = operand + 2;
                    let value = self.stack.top()?.as_int() as u32;
                    let mut target = None;
                    for arm in (0..count).map(|i| table + i * 6) {
                        if fetch_u32(code, arm)? == value {
                            target = Some(fetch_u16(code, arm + 4)?);
                            break;
                        }
                    }
                    let target = match target {
                        Some(target) => target,
                        None => fetch_u16(code, table + count * 6)?,
                    };
                    next = frame.target(target)?;
                }

                Opcode::Push => self.stack.push(Value::ZERO)?,
                Opcode::Dup => {
                    let top = self.stack.top()?;
                    self.stack.push(top)?;
                }
                Opcode::Not => self.unary(|v| Value::from(!v.truthy()))?,
                Opcode::SetB => self.unary(|v| Value::from(v.truthy()))?,
                Opcode::Neg => self.unary(|v| Value::Int(v.as_int().wrapping_neg()))?,
                Opcode::BNot => self.unary(|v| Value::Int(!v.as_int()))?,
                Opcode::Inc => self.unary(|v| Value::Int(v.as_int().wrapping_add(1)))?,
                Opcode::Dec => self.unary(|v| Value::Int(v.as_int().wrapping_sub(1)))?,

                Opcode::Add => self.binary(frame.floor, |a, b| Ok(a.wrapping_add(b)))?,
                Opcode::Sub => self.binary(frame.floor, |a, b| Ok(a.wrapping_sub(b)))?,
                Opcode::Mul => self.binary(frame.floor, |a, b| Ok(a.wrapping_mul(b)))?,
                Opcode::Div | Opcode::Mod => self.binary(frame.floor, |a, b| match (op, b) {
                    (_, 0) => Err(VmFault::DivisionByZero { pc: at }),
                    (Opcode::Div, b) => Ok(a.wrapping_div(b)),
                    (_, b) => Ok(a.wrapping_rem(b)),
                })?,
                Opcode::Exp => self.binary(frame.floor, |a, b| Ok(power(a, b)))?,
                Opcode::BAnd => self.binary(frame.floor, |a, b| Ok(a & b))?,
                Opcode::BOr => self.binary(frame.floor, |a, b| Ok(a | b))?,
                Opcode::Xor => self.binary(frame.floor, |a, b| Ok(a ^ b))?,
                Opcode::Shl => self.binary(frame.floor, |a, b| Ok(a.wrapping_shl(b as u32)))?,
                Opcode::Shr => self.binary(frame.floor, |a, b| Ok(a.wrapping_shr(b as u32)))?,
                Opcode::Lt => self.binary(frame.floor, |a, b| Ok((a < b) as i32))?,
                Opcode::Le => self.binary(frame.floor, |a, b| Ok((a <= b) as i32))?,
                Opcode::Eq => self.binary(frame.floor, |a, b| Ok((a == b) as i32))?,
                Opcode::Ne => self.binary(frame.floor, |a, b| Ok((a != b) as i32))?,
                Opcode::Ge => self.binary(frame.floor, |a, b| Ok((a >= b) as i32))?,
                Opcode::Gt => self.binary(frame.floor, |a, b| Ok((a > b) as i32))?,

                Opcode::Shtc => self.stack.set_top(Value::Int(fetch_u8(code, operand)? as i32))?,
                Opcode::Intc => self.stack.set_top(Value::Int(fetch_u16(code, operand)? as i32))?,
                Opcode::Lngc => self.stack.set_top(Value::Int(fetch_u32(code, operand)? as i32))?,

                Opcode::Rcrs => {
                    let index = (fetch_u16(code, operand)? / 4) as u32;
                    let id = frame
                        .class
                        .natives
                        .get(&index)
                        .copied()
                        .ok_or(VmFault::UnboundNative { index })?;
                    self.stack.set_top(Value::Native(id))?;
                }
                Opcode::Call => {
                    let args = self.pop_args(frame.floor, fetch_u8(code, operand)?)?;
                    let result = match self.stack.top()? {
                        Value::Native(id) => self.call_native(id, &args)?,
                        Value::Int(value) => return Err(VmFault::NotCallable { value: value as i64 }),
                    };
                    self.stack.set_top(result)?;
                }
                Opcode::Send => {
                    let argc = fetch_u8(code, operand)?;
                    let msg = fetch_u16(code, operand + 1)?;
                    let args = self.pop_args(frame.floor, argc)?;
                    let target = self.stack.top()?.as_int();
                    let target = usize::try_from(target).map_err(|_| VmFault::BadObject { handle: target as i64 })?;
                    let result = self.dispatch(target, msg, &args)?;
                    self.stack.set_top(result)?;
                }
                Opcode::Pass => {
                    let args = self.pop_args(frame.floor, fetch_u8(code, operand)?)?;
                    let result = match thunk.handler_above(frame.level, message) {
                        Some(parent) => self.invoke(slot, thunk, parent, message, &args)?,
                        None => self.unhandled(thunk, message)?,
                    };
                    self.stack.set_top(result)?;
                }
                Opcode::Jsr => {
                    let target = frame.target(fetch_u16(code, operand)?)?;
                    self.stack.reserve()?;
                    frame.returns.push(next);
                    next = target;
                }
                Opcode::Rts => {
                    next = frame.returns.pop().ok_or(VmFault::ReturnWithoutCall { pc: at })?;
                    self.stack.release_to(self.stack.reserved().saturating_sub(1));
                }

                Opcode::Aim => {
                    let scale = fetch_u16(code, operand)? as i32;
                    let index = self.stack.pop_above(frame.floor)?.low() as i32;
                    self.stack.set_top(Value::Int(index.wrapping_mul(scale)))?;
                }
                Opcode::Ais => {
                    let shift = fetch_u8(code, operand)? as u32;
                    let index = self.stack.pop_above(frame.floor)?.low() as i32;
                    self.stack.set_top(Value::Int(index.wrapping_shl(shift)))?;
                }

                Opcode::Lab | Opcode::Law | Opcode::Lad => {
                    let offset = fetch_u16(code, operand)? as usize;
                    let value = load_var(&frame.autos, offset, access_width(op), "auto")?;
                    self.stack.set_top(Value::Int(value))?;
                }
                Opcode::Sab | Opcode::Saw | Opcode::Sad => {
                    let offset = fetch_u16(code, operand)? as usize;
                    let value = self.stack.top()?.as_int();
                    store_var(&mut frame.autos, offset, access_width(op), value, "auto")?;
                }
                Opcode::Lsb | Opcode::Lsw | Opcode::Lsd => {
                    let offset = fetch_u16(code, operand)? as usize;
                    let value = load_var(self.statics(owner, frame.level)?, offset, access_width(op), "static")?;
                    self.stack.set_top(Value::Int(value))?;
                }
                Opcode::Ssb | Opcode::Ssw | Opcode::Ssd => {
                    let offset = fetch_u16(code, operand)? as usize;
                    let value = self.stack.top()?.as_int();
                    store_var(self.statics(owner, frame.level)?, offset, access_width(op), value, "static")?;
                }
                Opcode::Lxb | Opcode::Lxw | Opcode::Lxd => {
                    let index = fetch_u16(code, operand)?;
                    let var = frame
                        .class
                        .externals
                        .get(index as usize)
                        .ok_or(VmFault::UnboundExternal { index })?;
                    let area = self.statics(owner, var.level)?;
                    let value = load_var(area, var.offset as usize, access_width(op), "external")?;
                    self.stack.set_top(Value::Int(value))?;
                }
                Opcode::Sxb | Opcode::Sxw | Opcode::Sxd => {
                    let index = fetch_u16(code, operand)?;
                    let var = frame
                        .class
                        .externals
                        .get(index as usize)
                        .ok_or(VmFault::UnboundExternal { index })?;
                    let value = self.stack.top()?.as_int();
                    let area = self.statics(owner, var.level)?;
                    store_var(area, var.offset as usize, access_width(op), value, "external")?;
                }

                Opcode::Ltba
                | Opcode::Ltwa
                | Opcode::Ltda
                | Opcode::Leta
                | Opcode::Laba
                | Opcode::Lawa
                | Opcode::Lada
                | Opcode::Saba
                | Opcode::Sawa
                | Opcode::Sada
                | Opcode::Leaa
                | Opcode::Lsba
                | Opcode::Lswa
                | Opcode::Lsda
                | Opcode::Ssba
                | Opcode::Sswa
                | Opcode::Ssda
                | Opcode::Lesa
                | Opcode::Lxba
                | Opcode::Lxwa
                | Opcode::Lxda
                | Opcode::Sxba
                | Opcode::Sxwa
                | Opcode::Sxda
                | Opcode::Lexa
                | Opcode::Sxas
                | Opcode::Leca => {
                    return Err(VmFault::UnsupportedOpcode {
                        name: op.mnemonic(),
                        pc: at,
                    });
                }

                Opcode::Sole => self.stack.set_top(Value::Int(slot as i32))?,
                Opcode::Arg => {
                    let index = fetch_u8(code, operand)? as usize;
                    self.stack.set_top(args.get(index).copied().unwrap_or(Value::ZERO))?;
                }
                Opcode::End => return self.stack.top(),
                Opcode::Brk => trace!(pc = at, class = %frame.class.class, "breakpoint"),
            }
            frame.pc = next;
        }
    }

    #[inline]
    fn unary(&mut self, f: impl FnOnce(Value) -> Value) -> Result<(), VmFault> {
        let top = self.stack.top()?;
        self.stack.set_top(f(top))
    }

    #[inline]
    fn binary(&mut self, floor: usize, f: impl FnOnce(i32, i32) -> Result<i32, VmFault>) -> Result<(), VmFault> {
        let rhs = self.stack.pop_above(floor)?.as_int();
        let lhs = self.stack.top()?.as_int();
        self.stack.set_top(Value::Int(f(lhs, rhs)?))
    }

    /// Pop `argc` arguments; the first pushed comes out first.
    fn pop_args(&mut self, floor: usize, argc: u8) -> Result<Vec<Value>, VmFault> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.stack.pop_above(floor)?);
        }
        args.reverse();
        Ok(args)
    }

    fn statics(&mut self, owner: ObjectHandle, level: usize) -> Result<&mut [u8], VmFault> {
        self.objects
            .resolve_mut(owner)
            .and_then(|object| object.statics.get_mut(level))
            .map(|area| area.as_mut_slice())
            .ok_or(VmFault::BadObject {
                handle: owner.slot as i64,
            })
    }
}
