//! Native code resources callable from bytecode through `RCRS`/`CALL`.
//!
//! Every native receives the engine explicitly and the call's arguments in
//! push order; it returns one value.

use rand::Rng;
use tracing::trace;

use crate::archive::ResourceId;
use crate::error::{EngineError, VmFault};
use crate::util::{FastHashMap, fast_hash_map_new};
use crate::views::{Palette, load_view};

use super::engine::Engine;
use super::value::{NativeId, Value};

pub type NativeFn = fn(&mut Engine, &[Value]) -> Result<Value, VmFault>;

#[derive(Debug, Clone)]
pub struct NativeRegistry {
    entries: Vec<(&'static str, NativeFn)>,
    by_name: FastHashMap<&'static str, NativeId>,
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_name: fast_hash_map_new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for &(name, f) in BUILTINS {
            reg.register(name, f);
        }
        reg
    }

    /// Bind `name`. Re-registering a name keeps its id and replaces the function.
    pub fn register(&mut self, name: &'static str, f: NativeFn) -> NativeId {
        if let Some(&id) = self.by_name.get(name) {
            self.entries[id.0 as usize].1 = f;
            return id;
        }
        let id = NativeId(self.entries.len() as u32);
        self.entries.push((name, f));
        self.by_name.insert(name, id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<NativeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: NativeId) -> Option<(&'static str, NativeFn)> {
        self.entries.get(id.0 as usize).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const BUILTINS: &[(&str, NativeFn)] = &[
    ("rnd", rnd),
    ("dice", dice),
    ("absv", absv),
    ("minv", minv),
    ("maxv", maxv),
    ("create_program", create_program),
    ("destroy_object", destroy_object),
    ("send_message", send_message),
    ("notify", send_message),
    ("fill_rectangle", fill_rectangle),
    ("draw_rectangle", draw_rectangle),
    ("set_palette", set_palette),
    ("sound_effect", sound_effect),
    ("stop_sound", stop_sound),
    ("peek_event", peek_event),
    ("beep", beep),
];

fn arg(args: &[Value], index: usize, name: &'static str) -> Result<i32, VmFault> {
    args.get(index).map(|v| v.as_int()).ok_or_else(|| VmFault::Native {
        name,
        message: format!("missing argument {}", index + 1),
    })
}

/// Uniform integer in `low..=high` (bounds may come in either order).
fn rnd(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let a = arg(args, 0, "rnd")?;
    let b = arg(args, 1, "rnd")?;
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Ok(Value::Int(engine.rng_mut().random_range(low..=high)))
}

/// Sum of `ndice` rolls of a `nsides` die, plus `bonus`.
/// Upper bound on dice rolled per call.
pub const MAX_DICE: i32 = 255;

fn dice(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let ndice = arg(args, 0, "dice")?;
    let nsides = arg(args, 1, "dice")?;
    let bonus = arg(args, 2, "dice")?;
    let mut total = bonus;
    if nsides > 0 {
        for _ in 0..ndice.clamp(0, MAX_DICE) {
            total = total.wrapping_add(engine.rng_mut().random_range(1..=nsides));
        }
    }
    Ok(Value::Int(total))
}

fn absv(_: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    Ok(Value::Int(arg(args, 0, "absv")?.wrapping_abs()))
}

fn minv(_: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    Ok(Value::Int(arg(args, 0, "minv")?.min(arg(args, 1, "minv")?)))
}

fn maxv(_: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    Ok(Value::Int(arg(args, 0, "maxv")?.max(arg(args, 1, "maxv")?)))
}

/// `create_program(slot, class)`; a negative slot picks the first free program slot.
/// Returns the slot, or -1 when the table is full.
fn create_program(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let slot = arg(args, 0, "create_program")?;
    let class = ResourceId(arg(args, 1, "create_program")? as u32);
    let slot = usize::try_from(slot).ok();
    match engine.create_program(class, slot) {
        Ok(handle) => Ok(Value::Int(handle.slot as i32)),
        Err(EngineError::NoFreeSlot { .. }) => Ok(Value::Int(-1)),
        Err(EngineError::Vm(fault)) => Err(fault),
        Err(err) => Err(VmFault::Create(Box::new(err))),
    }
}

fn destroy_object(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let slot = arg(args, 0, "destroy_object")?;
    let slot = usize::try_from(slot).map_err(|_| VmFault::BadObject { handle: slot as i64 })?;
    match engine.destroy(slot) {
        Ok(_) => Ok(Value::ZERO),
        Err(EngineError::Vm(fault)) => Err(fault),
        Err(err) => Err(VmFault::Create(Box::new(err))),
    }
}

/// `send_message(slot, message, args...)`.
fn send_message(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let slot = arg(args, 0, "send_message")?;
    let message = arg(args, 1, "send_message")? as u16;
    let slot = usize::try_from(slot).map_err(|_| VmFault::BadObject { handle: slot as i64 })?;
    engine.dispatch(slot, message, &args[2..])
}

fn fill_rectangle(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let [x, y, w, h, color] = rect_args(args, "fill_rectangle")?;
    engine.host_mut().draw_rect(x, y, w, h, color as u8);
    Ok(Value::ZERO)
}

/// Outline drawn as four one-pixel fills.
fn draw_rectangle(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let [x, y, w, h, color] = rect_args(args, "draw_rectangle")?;
    let color = color as u8;
    let host = engine.host_mut();
    host.draw_rect(x, y, w, 1, color);
    host.draw_rect(x, y.wrapping_add(h).wrapping_sub(1), w, 1, color);
    host.draw_rect(x, y, 1, h, color);
    host.draw_rect(x.wrapping_add(w).wrapping_sub(1), y, 1, h, color);
    Ok(Value::ZERO)
}

fn rect_args(args: &[Value], name: &'static str) -> Result<[i32; 5], VmFault> {
    Ok([
        arg(args, 0, name)?,
        arg(args, 1, name)?,
        arg(args, 2, name)?,
        arg(args, 3, name)?,
        arg(args, 4, name)?,
    ])
}

/// `set_palette(resource)`: load a palette and hand its colors to the host.
fn set_palette(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let id = ResourceId(arg(args, 0, "set_palette")? as u32);
    let palette: Option<Palette> = load_view(engine.loader_mut(), id).map_err(|err| VmFault::Native {
        name: "set_palette",
        message: err.to_string(),
    })?;
    let Some(palette) = palette else {
        return Ok(Value::Int(-1));
    };
    let (start, count) = palette.range();
    let count = (count as usize).min(palette.colors.len() / 3);
    engine
        .host_mut()
        .set_palette(&palette.colors[..count * 3], start as usize, count);
    Ok(Value::Int(count as i32))
}

fn sound_effect(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let sound = arg(args, 0, "sound_effect")? as u32;
    Ok(Value::Int(engine.host_mut().play_stream(sound) as i32))
}

fn stop_sound(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let handle = arg(args, 0, "stop_sound")? as u32;
    engine.host_mut().stop_handle(handle);
    Ok(Value::ZERO)
}

/// `peek_event()` polls and returns the event kind (0 for none).
/// `peek_event(1|2|3)` returns x, y or key of the last polled event.
fn peek_event(engine: &mut Engine, args: &[Value]) -> Result<Value, VmFault> {
    let selector = args.first().map_or(0, |v| v.as_int());
    if selector == 0 {
        let event = engine.host_mut().poll_event();
        trace!(?event, "polled event");
        engine.set_last_event(event);
        return Ok(Value::Int(event.map_or(0, |e| e.kind.code())));
    }
    let field = engine.last_event().map_or(0, |e| match selector {
        1 => e.x as i32,
        2 => e.y as i32,
        3 => e.key as i32,
        _ => 0,
    });
    Ok(Value::Int(field))
}

fn beep(engine: &mut Engine, _: &[Value]) -> Result<Value, VmFault> {
    engine.host_mut().beep();
    Ok(Value::ZERO)
}
