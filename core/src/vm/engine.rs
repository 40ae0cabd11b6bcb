mod exec;
mod frame;

use std::io::{Read, Seek};
use std::path::Path;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace, warn};

use crate::archive::{Archive, ResourceId, ResourceLoader};
use crate::config::EngineConfig;
use crate::error::{ArchiveError, EngineError, LinkError, VmFault};
use crate::util::{FastHashMap, fast_hash_map_new};

use super::host::{Event, Host, NullHost};
use super::linker::{HandlerEntry, Thunk, link_class};
use super::natives::{NativeFn, NativeRegistry};
use super::objects::{Object, ObjectHandle, ObjectTable};
use super::opcode::Width;
use super::stack::VmStack;
use super::value::{NativeId, Value};

/// Predefined message numbers.
pub const MSG_CREATE: u16 = 0;
pub const MSG_DESTROY: u16 = 1;
pub const MSG_RESTORE: u16 = 2;

/// Any seekable byte source an archive can be read from.
pub trait ArchiveSource: Read + Seek {}

impl<T: Read + Seek> ArchiveSource for T {}

/// Archive loader, linked classes, live objects and the shared operand stack.
pub struct Engine {
    config: EngineConfig,
    loader: ResourceLoader<Box<dyn ArchiveSource>>,
    natives: NativeRegistry,
    thunks: FastHashMap<ResourceId, Rc<Thunk>>,
    objects: ObjectTable,
    stack: VmStack,
    host: Box<dyn Host>,
    rng: StdRng,
    depth: usize,
    last_event: Option<Event>,
}

impl Engine {
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(ArchiveError::Io)?;
        debug!(path = %path.display(), "opening archive");
        Self::from_reader(std::io::BufReader::new(file), config)
    }

    pub fn from_reader<R: Read + Seek + 'static>(reader: R, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let source: Box<dyn ArchiveSource> = Box::new(reader);
        let archive = Archive::from_reader(source)?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            loader: ResourceLoader::new(archive, config.resource_cache),
            natives: NativeRegistry::with_builtins(),
            thunks: fast_hash_map_new(),
            objects: ObjectTable::new(config.object_capacity),
            stack: VmStack::new(config.stack_size),
            host: Box::new(NullHost),
            rng,
            depth: 0,
            last_event: None,
            config,
        })
    }

    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn loader_mut(&mut self) -> &mut ResourceLoader<Box<dyn ArchiveSource>> {
        &mut self.loader
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Bind an extra native. Classes linked afterwards can import it by name.
    pub fn register_native(&mut self, name: &'static str, f: NativeFn) -> NativeId {
        self.natives.register(name, f)
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&Object> {
        self.objects.resolve(handle)
    }

    pub fn host_mut(&mut self) -> &mut dyn Host {
        self.host.as_mut()
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn last_event(&self) -> Option<Event> {
        self.last_event
    }

    pub(crate) fn set_last_event(&mut self, event: Option<Event>) {
        self.last_event = event;
    }

    /// Operand stack cells in use; zero whenever no dispatch is running.
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Linked form of `class`, memoized per class id when `share_thunks` is set.
    pub fn thunk(&mut self, class: ResourceId) -> Result<Rc<Thunk>, LinkError> {
        if self.config.share_thunks
            && let Some(thunk) = self.thunks.get(&class)
        {
            return Ok(thunk.clone());
        }
        let thunk = Rc::new(link_class(
            &mut self.loader,
            &self.natives,
            class,
            self.config.max_class_depth,
        )?);
        if self.config.share_thunks {
            self.thunks.insert(class, thunk.clone());
        }
        Ok(thunk)
    }

    /// Create an instance of `class` and run its CREATE handler, if it has one.
    ///
    /// Without an explicit slot the first free one at or above
    /// `program_slots_start` is used. If CREATE faults the slot is released
    /// again and the fault is returned.
    pub fn create_program(&mut self, class: ResourceId, slot: Option<usize>) -> Result<ObjectHandle, EngineError> {
        let slot = match slot {
            Some(slot) => slot,
            None => {
                let (start, end) = (self.config.program_slots_start, self.objects.capacity());
                self.objects
                    .find_free(start, end)
                    .ok_or(EngineError::NoFreeSlot { start, end })?
            }
        };
        let handle = self.objects.check_vacant(slot)?;
        let thunk = self.thunk(class)?;
        let has_create = thunk.handler(MSG_CREATE).is_some();
        self.objects.insert(Object::new(class, handle, thunk))?;
        debug!(%class, slot, "created object");

        if has_create && let Err(fault) = self.dispatch(slot, MSG_CREATE, &[]) {
            warn!(%class, slot, error = %fault, "CREATE handler failed");
            if self.objects.is_live(handle) {
                self.objects.remove(slot);
            }
            return Err(fault.into());
        }
        Ok(handle)
    }

    /// Run DESTROY (when handled) and clear `slot`. Returns false for an empty slot.
    pub fn destroy(&mut self, slot: usize) -> Result<bool, EngineError> {
        let Some(object) = self.objects.get(slot) else {
            return Ok(false);
        };
        let handle = object.handle;
        if object.thunk.handler(MSG_DESTROY).is_some() {
            self.dispatch(slot, MSG_DESTROY, &[])?;
        }
        if self.objects.is_live(handle) {
            self.objects.remove(slot);
            debug!(slot, "destroyed object");
        }
        Ok(true)
    }

    /// Deliver RESTORE to every live object that handles it, in slot order.
    /// Returns how many handlers completed; a fault is logged and the sweep goes on.
    pub fn restore_all(&mut self) -> usize {
        let targets: Vec<ObjectHandle> = self
            .objects
            .iter()
            .filter(|object| object.thunk.handler(MSG_RESTORE).is_some())
            .map(|object| object.handle)
            .collect();
        let mut restored = 0;
        for handle in targets {
            // an earlier RESTORE handler may have destroyed this one
            if !self.objects.is_live(handle) {
                continue;
            }
            match self.dispatch(handle.slot, MSG_RESTORE, &[]) {
                Ok(_) => restored += 1,
                Err(fault) => warn!(slot = handle.slot, error = %fault, "RESTORE handler failed"),
            }
        }
        debug!(restored, "restore sweep done");
        restored
    }

    /// Send `message` to a live object. Faults abort only this dispatch.
    pub fn send(&mut self, handle: ObjectHandle, message: u16, args: &[Value]) -> Result<Value, VmFault> {
        if !self.objects.is_live(handle) {
            return Err(VmFault::BadObject {
                handle: handle.slot as i64,
            });
        }
        let result = self.dispatch(handle.slot, message, args);
        if let Err(fault) = &result {
            let class = self.objects.resolve(handle).map(|o| o.class);
            warn!(class = ?class, slot = handle.slot, message, error = %fault, "dispatch aborted");
        }
        result
    }

    /// Dispatch by raw slot, as `SEND` and the messaging natives do.
    pub(crate) fn dispatch(&mut self, slot: usize, message: u16, args: &[Value]) -> Result<Value, VmFault> {
        let thunk = self
            .objects
            .get(slot)
            .map(|object| object.thunk.clone())
            .ok_or(VmFault::BadObject { handle: slot as i64 })?;
        match thunk.handler(message) {
            Some(entry) => self.invoke(slot, &thunk, entry, message, args),
            None => self.unhandled(&thunk, message),
        }
    }

    fn unhandled(&self, thunk: &Thunk, message: u16) -> Result<Value, VmFault> {
        if self.config.strict_dispatch {
            return Err(VmFault::NoHandler {
                class: thunk.class,
                message,
            });
        }
        trace!(class = %thunk.class, message, "message not handled");
        Ok(Value::ZERO)
    }

    fn invoke(
        &mut self,
        slot: usize,
        thunk: &Rc<Thunk>,
        entry: HandlerEntry,
        message: u16,
        args: &[Value],
    ) -> Result<Value, VmFault> {
        if self.depth >= self.config.max_call_depth {
            return Err(VmFault::CallDepthExceeded {
                max: self.config.max_call_depth,
            });
        }
        trace!(class = %thunk.class, slot, message, level = entry.level, "dispatch");
        self.depth += 1;
        let saved_sp = self.stack.sp();
        let saved_reserved = self.stack.reserved();
        let result = self.run_handler(slot, thunk, entry, message, args);
        self.stack.reset_to(saved_sp);
        self.stack.release_to(saved_reserved);
        self.depth -= 1;
        result
    }

    fn call_native(&mut self, id: NativeId, args: &[Value]) -> Result<Value, VmFault> {
        let (name, f) = self.natives.get(id).ok_or(VmFault::NotCallable { value: id.0 as i64 })?;
        trace!(native = name, argc = args.len(), "native call");
        f(self, args)
    }

    /// Read a static variable of a live object, for hosts and tests.
    pub fn read_static(&self, handle: ObjectHandle, level: usize, offset: usize, width: Width) -> Option<i32> {
        let area = self.objects.resolve(handle)?.statics.get(level)?;
        frame::load_var(area, offset, width, "static").ok()
    }
}
