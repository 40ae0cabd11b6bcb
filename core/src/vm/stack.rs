use crate::error::VmFault;

use super::value::Value;

/// Fixed-size operand stack shared by all frames. Grows downward: `sp` starts
/// at the capacity and the top cell is `slots[sp]`. Subroutine return
/// addresses are carved from the bottom of the same arena (`reserved`).
#[derive(Debug)]
pub struct VmStack {
    slots: Box<[Value]>,
    sp: usize,
    reserved: usize,
}

impl VmStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Value::ZERO; capacity].into_boxed_slice(),
            sp: capacity,
            reserved: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Values currently on the stack.
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len() - self.sp
    }

    /// Cells held back for subroutine return addresses.
    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<(), VmFault> {
        if self.sp <= self.reserved {
            return Err(VmFault::StackOverflow {
                capacity: self.slots.len(),
            });
        }
        self.sp -= 1;
        self.slots[self.sp] = value;
        Ok(())
    }

    /// Pop while keeping at least the cell at `floor` (a frame's accumulator).
    #[inline]
    pub fn pop_above(&mut self, floor: usize) -> Result<Value, VmFault> {
        if self.sp >= floor {
            return Err(VmFault::StackUnderflow);
        }
        let value = self.slots[self.sp];
        self.sp += 1;
        Ok(value)
    }

    #[inline]
    pub fn top(&self) -> Result<Value, VmFault> {
        self.slots.get(self.sp).copied().ok_or(VmFault::StackUnderflow)
    }

    #[inline]
    pub fn set_top(&mut self, value: Value) -> Result<(), VmFault> {
        let cell = self.slots.get_mut(self.sp).ok_or(VmFault::StackUnderflow)?;
        *cell = value;
        Ok(())
    }

    /// Claim one cell for a return address; fails once operands and returns fill the arena.
    #[inline]
    pub fn reserve(&mut self) -> Result<(), VmFault> {
        if self.reserved >= self.sp {
            return Err(VmFault::StackOverflow {
                capacity: self.slots.len(),
            });
        }
        self.reserved += 1;
        Ok(())
    }

    /// Give back return cells down to `reserved` claimed in total.
    #[inline]
    pub fn release_to(&mut self, reserved: usize) {
        self.reserved = reserved.min(self.reserved);
    }

    /// Drop everything above `sp`; used to unwind a faulted or finished frame.
    #[inline]
    pub fn reset_to(&mut self, sp: usize) {
        self.sp = sp.min(self.slots.len());
    }
}
