use std::path::Path;

use anyhow::Context;
use relic_core::vm::{Engine, Host, Value};
use relic_core::{EngineConfig, ResourceId};
use tracing::info;

/// One `--send` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSpec {
    pub message: u16,
    pub args: Vec<i32>,
}

/// Host for headless runs: drawing and sound become log lines, input is empty.
#[derive(Debug, Default)]
pub struct TraceHost {
    next_stream: u32,
}

impl Host for TraceHost {
    fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u8) {
        info!(x, y, w, h, color, "draw_rect");
    }

    fn set_palette(&mut self, colors: &[u8], start: usize, count: usize) {
        info!(start, count, bytes = colors.len(), "set_palette");
    }

    fn play_stream(&mut self, sound: u32) -> u32 {
        self.next_stream += 1;
        info!(sound, handle = self.next_stream, "play_stream");
        self.next_stream
    }

    fn stop_handle(&mut self, handle: u32) {
        info!(handle, "stop_handle");
    }

    fn beep(&mut self) {
        info!("beep");
    }
}

/// Create `class` and deliver `sends` in order, printing each result.
pub fn run(
    archive: &Path,
    class: ResourceId,
    slot: Option<usize>,
    sends: &[SendSpec],
    config: EngineConfig,
) -> anyhow::Result<()> {
    let mut engine = Engine::open(archive, config)
        .with_context(|| format!("Failed to open archive '{}'", archive.display()))?
        .with_host(TraceHost::default());
    let handle = engine
        .create_program(class, slot)
        .with_context(|| format!("Failed to create program {class}"))?;
    println!("created {class} in slot {}", handle.slot);

    for send in sends {
        let args: Vec<Value> = send.args.iter().copied().map(Value::Int).collect();
        let result = engine
            .send(handle, send.message, &args)
            .with_context(|| format!("Message {} to {class} failed", send.message))?;
        println!("message {} -> {}", send.message, result.as_int());
    }
    Ok(())
}
