//! Error taxonomy shared by the archive, linker and VM layers.
//!
//! Per-load failures (`UnknownResource`, `KindMismatch`, `UnsupportedExtension`)
//! are recoverable; `LinkError` aborts thunk construction; `VmFault` aborts a
//! single dispatch and leaves the object table and archive untouched.

use std::io;

use thiserror::Error;

use crate::archive::{ResourceId, ResourceKind};
use crate::util::bytes::OutOfBounds;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("bad archive magic 0x{found:08X} (expected 0x{expected:08X})")]
    BadMagic { found: u32, expected: u32 },
    #[error("truncated {what}")]
    Truncated { what: &'static str },
    #[error("archive cannot hold more than {max} {what}")]
    Full { what: &'static str, max: usize },
    #[error("unknown resource {id}")]
    UnknownResource { id: ResourceId },
    #[error("resource {id} has kind {actual}, expected {expected}")]
    KindMismatch {
        id: ResourceId,
        expected: ResourceKind,
        actual: ResourceKind,
    },
    #[error("resource {id} uses unsupported intra-resource offset 0x{offset:04X}")]
    UnsupportedExtension { id: ResourceId, offset: u16 },
    #[error("resource {id} uses unknown compression tag {tag}")]
    UnknownCompression { id: ResourceId, tag: u8 },
    #[error("resource {id} failed to decompress: {source}")]
    Decompress {
        id: ResourceId,
        #[source]
        source: DecompressError,
    },
    #[error("resource {id} ({kind}) is malformed: {source}")]
    View {
        id: ResourceId,
        kind: ResourceKind,
        #[source]
        source: OutOfBounds,
    },
}

impl ArchiveError {
    /// True for errors a caller may treat as "resource absent".
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ArchiveError::UnknownResource { .. }
                | ArchiveError::KindMismatch { .. }
                | ArchiveError::UnsupportedExtension { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompressError {
    #[error("compressed input exhausted at input byte {input} (output {output} of {size})")]
    InputExhausted { input: usize, output: usize, size: usize },
    #[error("back-reference distance {distance} at output byte {output} reaches before the buffer")]
    BadBackReference { distance: usize, output: usize },
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("class {class} has no program resource")]
    MissingProgram { class: ResourceId },
    #[error("class {class} program header is truncated")]
    BadProgramHeader { class: ResourceId },
    #[error("dictionary {resource} is malformed: {reason}")]
    BadDictionary { resource: ResourceId, reason: String },
    #[error("class {class} imports unknown native `{name}`")]
    UnknownNative { class: ResourceId, name: String },
    #[error("class {class} exports handler for message {message} at invalid offset {offset}")]
    BadHandlerOffset {
        class: ResourceId,
        message: u16,
        offset: u32,
    },
    #[error("external `{name}` in class {class} refers to class level {level} of {depth}")]
    BadExternalClass {
        class: ResourceId,
        name: String,
        level: usize,
        depth: usize,
    },
    #[error("inheritance chain of {class} exceeds {max} levels")]
    TooDeep { class: ResourceId, max: usize },
}

#[derive(Debug, Error)]
pub enum VmFault {
    #[error("operand stack overflow ({capacity} values)")]
    StackOverflow { capacity: usize },
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("invalid opcode 0x{opcode:02X} at {pc}")]
    InvalidOpcode { opcode: u8, pc: usize },
    #[error("unsupported opcode {name} at {pc}")]
    UnsupportedOpcode { name: &'static str, pc: usize },
    #[error("branch target {target} outside code segment of {len} bytes")]
    InvalidBranch { target: usize, len: usize },
    #[error("instruction at {pc} runs past the end of the code segment")]
    CodeOverrun { pc: usize },
    #[error("{access} of {width} bytes at offset {offset} outside {area} area of {size} bytes")]
    BadVariable {
        access: &'static str,
        area: &'static str,
        offset: usize,
        width: usize,
        size: usize,
    },
    #[error("message {message} has no handler in class {class}")]
    NoHandler { class: ResourceId, message: u16 },
    #[error("no native bound at code-resource index {index}")]
    UnboundNative { index: u32 },
    #[error("external variable index {index} is not bound")]
    UnboundExternal { index: u16 },
    #[error("value {value} is not a callable native")]
    NotCallable { value: i64 },
    #[error("division by zero at {pc}")]
    DivisionByZero { pc: usize },
    #[error("return without subroutine call at {pc}")]
    ReturnWithoutCall { pc: usize },
    #[error("object handle {handle} does not refer to a live object")]
    BadObject { handle: i64 },
    #[error("nested dispatch exceeds {max} levels")]
    CallDepthExceeded { max: usize },
    #[error("native `{name}` failed: {message}")]
    Native { name: &'static str, message: String },
    #[error("object creation failed: {0}")]
    Create(Box<EngineError>),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Vm(#[from] VmFault),
    #[error("no free object slot in {start}..{end}")]
    NoFreeSlot { start: usize, end: usize },
    #[error("object slot {slot} is out of range (capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },
    #[error("object slot {slot} is already occupied")]
    SlotOccupied { slot: usize },
    #[error("invalid engine configuration: {0}")]
    Config(String),
}
