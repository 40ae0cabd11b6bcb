pub(super) use std::cell::RefCell;
pub(super) use std::collections::VecDeque;
pub(super) use std::io::Cursor;
pub(super) use std::rc::Rc;

pub(super) use crate::{
    archive::{ArchiveBuilder, Compression, ResourceId, ResourceKind, ShortId},
    config::EngineConfig,
    error::{ArchiveError, EngineError, LinkError, VmFault},
    vm::{
        Assembler, DictionaryWriter, Engine, Event, EventKind, Host, MSG_CREATE, MSG_DESTROY, MSG_RESTORE, ObjectHandle, Opcode,
        ProgramHeader, Value, Width,
    },
};

mod dispatch;
mod linker;
mod objects;

/// Program, imports and exports of class `n` sit at indices `3n`, `3n+1`, `3n+2` of directory 0.
pub(super) fn class_id(n: u8) -> ResourceId {
    ShortId::new(0, n * 3).into()
}

pub(super) struct ClassBuilder {
    pub(super) asm: Assembler,
    pub(super) imports: DictionaryWriter,
    pub(super) exports: DictionaryWriter,
    pub(super) parent: ResourceId,
    pub(super) static_size: u16,
}

impl ClassBuilder {
    pub(super) fn new() -> Self {
        Self {
            asm: Assembler::new(),
            imports: DictionaryWriter::new(),
            exports: DictionaryWriter::new(),
            parent: ResourceId::INVALID,
            static_size: 0,
        }
    }

    pub(super) fn child_of(parent: u8) -> Self {
        Self {
            parent: class_id(parent),
            ..Self::new()
        }
    }

    pub(super) fn statics(mut self, size: u16) -> Self {
        self.static_size = size;
        self
    }

    pub(super) fn native(mut self, name: &str, index: u32) -> Self {
        self.imports.code(name, index);
        self
    }

    pub(super) fn external(mut self, width: Width, name: &str, offset: u16, class: usize) -> Self {
        self.imports.variable(width, name, offset, class);
        self
    }

    pub(super) fn handler(mut self, message: u16, auto_size: u16, body: impl FnOnce(&mut Assembler)) -> Self {
        let at = self.asm.handler(auto_size);
        self.exports.message(message, at);
        body(&mut self.asm);
        self
    }

    /// Code that belongs to no handler, to shift later offsets.
    pub(super) fn padding(mut self, len: usize) -> Self {
        self.asm.bytes(&vec![Opcode::Brk as u8; len]);
        self
    }
}

/// Classes in order, as class 0, 1, ... Programs are LZ-compressed.
pub(super) fn class_archive(classes: Vec<ClassBuilder>) -> ArchiveBuilder {
    let mut builder = ArchiveBuilder::new();
    let dir = builder.add_directory().unwrap();
    for (n, class) in classes.into_iter().enumerate() {
        let base = (n * 3) as u8;
        let header = ProgramHeader {
            exports: ShortId::new(dir, base + 2).into(),
            imports: ShortId::new(dir, base + 1).into(),
            parent: class.parent,
            static_size: class.static_size,
        };
        let code = class.asm.finish().unwrap();
        builder
            .add(dir, ResourceKind::PROGRAM, Compression::Lz, &header.with_code(&code))
            .unwrap();
        builder
            .add(dir, ResourceKind::DICTIONARY, Compression::Raw, &class.imports.finish())
            .unwrap();
        builder
            .add(dir, ResourceKind::DICTIONARY, Compression::Raw, &class.exports.finish())
            .unwrap();
    }
    builder
}

pub(super) fn test_config() -> EngineConfig {
    EngineConfig {
        stack_size: 256,
        object_capacity: 16,
        program_slots_start: 8,
        rng_seed: Some(7),
        ..EngineConfig::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum HostCall {
    Rect(i32, i32, i32, i32, u8),
    Palette { start: usize, count: usize, colors: Vec<u8> },
    Play(u32),
    Stop(u32),
    Beep,
}

/// Host that logs every call into a log shared with the test.
#[derive(Debug, Clone, Default)]
pub(super) struct RecordingHost {
    pub(super) log: Rc<RefCell<Vec<HostCall>>>,
    pub(super) events: Rc<RefCell<VecDeque<Event>>>,
}

impl RecordingHost {
    pub(super) fn calls(&self) -> Vec<HostCall> {
        self.log.borrow().clone()
    }
}

impl Host for RecordingHost {
    fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u8) {
        self.log.borrow_mut().push(HostCall::Rect(x, y, w, h, color));
    }

    fn set_palette(&mut self, colors: &[u8], start: usize, count: usize) {
        self.log.borrow_mut().push(HostCall::Palette {
            start,
            count,
            colors: colors.to_vec(),
        });
    }

    fn play_stream(&mut self, sound: u32) -> u32 {
        self.log.borrow_mut().push(HostCall::Play(sound));
        sound + 100
    }

    fn stop_handle(&mut self, handle: u32) {
        self.log.borrow_mut().push(HostCall::Stop(handle));
    }

    fn poll_event(&mut self) -> Option<Event> {
        self.events.borrow_mut().pop_front()
    }

    fn beep(&mut self) {
        self.log.borrow_mut().push(HostCall::Beep);
    }
}

pub(super) fn engine_from(builder: &ArchiveBuilder, config: EngineConfig) -> (Engine, RecordingHost) {
    let host = RecordingHost::default();
    let engine = Engine::from_reader(Cursor::new(builder.build()), config)
        .unwrap()
        .with_host(host.clone());
    (engine, host)
}

pub(super) fn engine_with(classes: Vec<ClassBuilder>, config: EngineConfig) -> (Engine, RecordingHost) {
    engine_from(&class_archive(classes), config)
}

pub(super) fn boot(classes: Vec<ClassBuilder>) -> (Engine, RecordingHost) {
    engine_with(classes, test_config())
}

/// Instantiate class `n` in the first free program slot.
pub(super) fn spawn(engine: &mut Engine, n: u8) -> ObjectHandle {
    engine.create_program(class_id(n), None).unwrap()
}

pub(super) fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&v| Value::Int(v)).collect()
}

pub(super) fn send_ok(engine: &mut Engine, handle: ObjectHandle, message: u16, args: &[i32]) -> i32 {
    engine.send(handle, message, &ints(args)).unwrap().as_int()
}
