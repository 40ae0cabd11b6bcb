//! Collaborators supplied by the embedding application.
//!
//! Natives are the only callers; the archive and interpreter never touch the host.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    KeyDown,
    MouseMove,
    MouseDown,
    MouseUp,
    Quit,
}

impl EventKind {
    /// Value handed to bytecode; 0 means "no event".
    pub fn code(self) -> i32 {
        match self {
            EventKind::KeyDown => 1,
            EventKind::MouseMove => 2,
            EventKind::MouseDown => 3,
            EventKind::MouseUp => 4,
            EventKind::Quit => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub x: i16,
    pub y: i16,
    pub key: u16,
}

/// Surface, mixer and event source. Every method defaults to doing nothing.
pub trait Host {
    fn draw_rect(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, _color: u8) {}

    /// `colors` holds `count` RGB triplets for indices starting at `start`.
    fn set_palette(&mut self, _colors: &[u8], _start: usize, _count: usize) {}

    /// Start a sound resource; returns a handle for [`Host::stop_handle`].
    fn play_stream(&mut self, _sound: u32) -> u32 {
        0
    }

    fn stop_handle(&mut self, _handle: u32) {}

    fn poll_event(&mut self) -> Option<Event> {
        None
    }

    fn beep(&mut self) {}
}

/// Host with no output and no input.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {}
