//! Fixed-capacity object table.
//!
//! Slots carry a generation that bumps on every destroy, so a stale
//! [`ObjectHandle`] never resolves to the slot's next occupant.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::archive::ResourceId;
use crate::error::EngineError;

use super::linker::Thunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub slot: usize,
    pub generation: u32,
}

#[derive(Debug)]
pub struct Object {
    pub class: ResourceId,
    pub handle: ObjectHandle,
    pub thunk: Rc<Thunk>,
    /// Static storage, one area per thunk level.
    pub statics: Vec<Vec<u8>>,
}

impl Object {
    pub fn new(class: ResourceId, handle: ObjectHandle, thunk: Rc<Thunk>) -> Self {
        let statics = thunk
            .levels
            .iter()
            .map(|level| vec![0; level.static_size as usize])
            .collect();
        Self {
            class,
            handle,
            thunk,
            statics,
        }
    }
}

#[derive(Debug)]
pub struct ObjectTable {
    slots: Vec<Option<Object>>,
    generations: Vec<u32>,
    free: BTreeSet<usize>,
}

impl ObjectTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            generations: vec![0; capacity],
            free: (0..capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live objects.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// Lowest free slot in `start..end`.
    pub fn find_free(&self, start: usize, end: usize) -> Option<usize> {
        let end = end.min(self.slots.len());
        if start >= end {
            return None;
        }
        self.free.range(start..end).next().copied()
    }

    /// Handle the next object placed at `slot` will receive.
    pub fn check_vacant(&self, slot: usize) -> Result<ObjectHandle, EngineError> {
        match self.slots.get(slot) {
            None => Err(EngineError::SlotOutOfRange {
                slot,
                capacity: self.slots.len(),
            }),
            Some(Some(_)) => Err(EngineError::SlotOccupied { slot }),
            Some(None) => Ok(ObjectHandle {
                slot,
                generation: self.generations[slot],
            }),
        }
    }

    pub fn insert(&mut self, object: Object) -> Result<ObjectHandle, EngineError> {
        let handle = self.check_vacant(object.handle.slot)?;
        if handle != object.handle {
            return Err(EngineError::SlotOccupied { slot: handle.slot });
        }
        self.slots[handle.slot] = Some(object);
        self.free.remove(&handle.slot);
        Ok(handle)
    }

    /// Clear `slot`, invalidating every handle to it.
    pub fn remove(&mut self, slot: usize) -> Option<Object> {
        let object = self.slots.get_mut(slot)?.take()?;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.insert(slot);
        Some(object)
    }

    pub fn get(&self, slot: usize) -> Option<&Object> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Object> {
        self.slots.get_mut(slot)?.as_mut()
    }

    pub fn resolve(&self, handle: ObjectHandle) -> Option<&Object> {
        self.get(handle.slot)
            .filter(|object| object.handle.generation == handle.generation)
    }

    pub fn resolve_mut(&mut self, handle: ObjectHandle) -> Option<&mut Object> {
        self.get_mut(handle.slot)
            .filter(|object| object.handle.generation == handle.generation)
    }

    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.resolve(handle).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.slots.iter().flatten()
    }
}
