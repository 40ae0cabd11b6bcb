//! Object VM subsystem
//!
//! Class programs and their dictionaries are linked into thunks, instantiated
//! into the object table and driven by message dispatch through a small
//! stack interpreter.

pub mod assembler;
mod dictionary;
mod engine;
mod host;
mod linker;
mod natives;
mod objects;
mod opcode;
mod program;
mod stack;
mod value;

pub use assembler::{AsmError, Assembler, Label};
pub use dictionary::{DICTIONARY_HEADER_SIZE, DictEntry, DictionaryWriter, parse_dictionary};
pub use engine::{ArchiveSource, Engine, MSG_CREATE, MSG_DESTROY, MSG_RESTORE};
pub use host::{Event, EventKind, Host, NullHost};
pub use linker::{ClassLevel, ExternalVar, HandlerEntry, Thunk, link_class};
pub use natives::{MAX_DICE, NativeFn, NativeRegistry};
pub use objects::{Object, ObjectHandle, ObjectTable};
pub use opcode::{Opcode, Width};
pub use program::{PROGRAM_HEADER_SIZE, ProgramHeader};
pub use stack::VmStack;
pub use value::{NativeId, Value};

#[cfg(test)]
mod vm_test;
