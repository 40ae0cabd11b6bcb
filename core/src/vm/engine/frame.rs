use crate::error::VmFault;
use crate::vm::linker::ClassLevel;
use crate::vm::opcode::Width;

/// State of one running handler.
pub(super) struct Frame<'t> {
    pub(super) level: usize,
    pub(super) class: &'t ClassLevel,
    pub(super) pc: usize,
    /// Stack position of the frame's accumulator cell; pops never go past it.
    pub(super) floor: usize,
    pub(super) autos: Vec<u8>,
    pub(super) returns: Vec<usize>,
}

impl<'t> Frame<'t> {
    /// Enter the handler at `offset`: an `auto_size` prologue, then code.
    pub(super) fn enter(level: usize, class: &'t ClassLevel, offset: u32, floor: usize) -> Result<Self, VmFault> {
        let offset = offset as usize;
        let auto_size = fetch_u16(&class.code, offset)?;
        Ok(Self {
            level,
            class,
            pc: offset + 2,
            floor,
            autos: vec![0; auto_size as usize],
            returns: Vec::new(),
        })
    }

    #[inline]
    pub(super) fn code(&self) -> &'t [u8] {
        let class: &'t ClassLevel = self.class;
        &class.code
    }

    /// Validate a branch target against this level's code segment.
    #[inline]
    pub(super) fn target(&self, target: u16) -> Result<usize, VmFault> {
        let len = self.class.code.len();
        let target = target as usize;
        if target >= len {
            return Err(VmFault::InvalidBranch { target, len });
        }
        Ok(target)
    }
}

#[inline]
pub(super) fn fetch_u8(code: &[u8], at: usize) -> Result<u8, VmFault> {
    code.get(at).copied().ok_or(VmFault::CodeOverrun { pc: at })
}

#[inline]
pub(super) fn fetch_u16(code: &[u8], at: usize) -> Result<u16, VmFault> {
    match code.get(at..at + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(VmFault::CodeOverrun { pc: at }),
    }
}

#[inline]
pub(super) fn fetch_u32(code: &[u8], at: usize) -> Result<u32, VmFault> {
    match code.get(at..at + 4) {
        Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(VmFault::CodeOverrun { pc: at }),
    }
}

fn bad_variable(access: &'static str, area: &'static str, offset: usize, width: Width, size: usize) -> VmFault {
    VmFault::BadVariable {
        access,
        area,
        offset,
        width: width.bytes(),
        size,
    }
}

/// Bytes and words load zero-extended; longs load signed.
pub(crate) fn load_var(area: &[u8], offset: usize, width: Width, name: &'static str) -> Result<i32, VmFault> {
    let bytes = area
        .get(offset..offset + width.bytes())
        .ok_or_else(|| bad_variable("load", name, offset, width, area.len()))?;
    Ok(match width {
        Width::Byte => bytes[0] as i32,
        Width::Word => u16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        Width::Long => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    })
}

pub(super) fn store_var(
    area: &mut [u8],
    offset: usize,
    width: Width,
    value: i32,
    name: &'static str,
) -> Result<(), VmFault> {
    let size = area.len();
    let bytes = area
        .get_mut(offset..offset + width.bytes())
        .ok_or_else(|| bad_variable("store", name, offset, width, size))?;
    match width {
        Width::Byte => bytes[0] = value as u8,
        Width::Word => bytes.copy_from_slice(&(value as u16).to_le_bytes()),
        Width::Long => bytes.copy_from_slice(&value.to_le_bytes()),
    }
    Ok(())
}
