//! WASM API for the virtual console.
//!
//! Provides JavaScript-callable interfaces for assembling, loading, running
//! and inspecting programs. Scheduler events cross the boundary as JSON
//! strings in the same `{"type", "data"}` shape the actor emits.

use crate::assembler::source_map::SourceMap;
use crate::memory::map::{FRAMEBUFFER, FRAMEBUFFER_SIZE, PALETTE_RAM, PALETTE_RAM_SIZE};
use crate::{
    assemble, disassemble, Breakpoint, BreakpointSet, Command, Event, RunState, Scheduler,
    SchedulerConfig, SharedMemory,
};
use std::collections::HashMap;
use std::time::Duration;
use wasm_bindgen::prelude::*;

/// JavaScript-compatible error wrapper
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct JsError {
    message: String,
}

#[wasm_bindgen]
impl JsError {
    #[wasm_bindgen(constructor)]
    pub fn new(message: &str) -> JsError {
        JsError {
            message: message.to_string(),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn message(&self) -> String {
        self.message.clone()
    }
}

impl<E: std::error::Error> From<E> for JsError {
    fn from(err: E) -> Self {
        JsError::new(&err.to_string())
    }
}

/// Result of assembly operation
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct AssemblyResult {
    success: bool,
    byte_count: usize,
    errors_json: String,
    symbols_json: String,
}

#[wasm_bindgen]
impl AssemblyResult {
    #[wasm_bindgen(getter)]
    pub fn success(&self) -> bool {
        self.success
    }

    #[wasm_bindgen(getter)]
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// `[{errorType, file, line, column, message}]`
    #[wasm_bindgen(getter)]
    pub fn errors(&self) -> String {
        self.errors_json.clone()
    }

    /// `{name: address}`
    #[wasm_bindgen(getter)]
    pub fn symbols(&self) -> String {
        self.symbols_json.clone()
    }
}

/// Main console interface for JavaScript
#[wasm_bindgen]
pub struct WasmConsole {
    scheduler: Scheduler,
    memory: SharedMemory,
    breakpoints: BreakpointSet,
    source_map: SourceMap,
}

#[wasm_bindgen]
impl WasmConsole {
    /// Create a console with reset CPU and default palette
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmConsole, JsError> {
        let memory = SharedMemory::new();
        let mut scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.handle(Command::Init(memory.clone()))?;

        Ok(WasmConsole {
            scheduler,
            memory,
            breakpoints: BreakpointSet::new(),
            source_map: SourceMap::new(),
        })
    }

    /// Assemble `source` and, if it has no errors, load it and move PC to
    /// the first segment.
    ///
    /// `includes` is a plain object mapping include paths to file contents.
    pub fn assemble_and_load(
        &mut self,
        source: String,
        file: String,
        includes: &js_sys::Object,
    ) -> Result<AssemblyResult, JsError> {
        let resolver = include_map(includes);
        let output = assemble(&source, &file, &resolver);

        let result = AssemblyResult {
            success: output.is_loadable(),
            byte_count: output.byte_count(),
            errors_json: serde_json::to_string(&output.errors)?,
            symbols_json: serde_json::to_string(&output.symbol_table)?,
        };
        if !output.is_loadable() {
            return Ok(result);
        }

        let entry = output.segments.first().map_or(0, |s| s.start_address);
        self.command(Command::Load(output.segments))?;
        self.command(Command::SetProgramCounter(entry as u32))?;
        self.source_map = output.source_map;
        self.sync_breakpoints()?;
        Ok(result)
    }

    /// Advance simulated time. Returns the stop event as JSON, if any.
    ///
    /// Negative or NaN elapsed times count as zero; anything beyond the
    /// catch-up limit (including `Infinity`) is clamped to it.
    pub fn tick(&mut self, elapsed_ms: f64) -> Result<Option<String>, JsError> {
        let elapsed = clamp_elapsed(elapsed_ms, self.scheduler.config().max_catch_up);
        self.scheduler
            .tick(elapsed)
            .map(|event| to_json(&event))
            .transpose()
    }

    pub fn run(&mut self) -> Result<Option<String>, JsError> {
        self.command(Command::Run)
    }

    pub fn pause(&mut self) -> Result<Option<String>, JsError> {
        self.command(Command::Pause)
    }

    /// Execute a single instruction
    pub fn step(&mut self) -> Result<Option<String>, JsError> {
        self.command(Command::Step)
    }

    /// Reset the CPU (memory contents are kept)
    pub fn reset(&mut self) -> Result<Option<String>, JsError> {
        self.command(Command::Reset)
    }

    pub fn set_pc(&mut self, address: u32) -> Result<Option<String>, JsError> {
        self.command(Command::SetProgramCounter(address))
    }

    /// Register/flag snapshot as JSON
    pub fn snapshot(&mut self) -> Result<Option<String>, JsError> {
        self.command(Command::GetSnapshot)
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.scheduler.state() == RunState::Running
    }

    // Breakpoint methods

    /// Set a breakpoint on a source line. Returns the resolved address, if
    /// the line emitted code.
    pub fn add_breakpoint(&mut self, file: String, line: usize) -> Result<Option<u16>, JsError> {
        let breakpoint = Breakpoint::new(file, line);
        self.breakpoints.add(breakpoint.clone());
        self.sync_breakpoints()?;
        Ok(self.breakpoints.address_of(&breakpoint))
    }

    pub fn remove_breakpoint(&mut self, file: String, line: usize) -> Result<(), JsError> {
        self.breakpoints.remove(&Breakpoint::new(file, line));
        self.sync_breakpoints()
    }

    pub fn clear_breakpoints(&mut self) -> Result<(), JsError> {
        self.breakpoints.clear();
        self.sync_breakpoints()
    }

    // Input

    pub fn set_controller(&mut self, port: u8, buttons: u8) -> Result<(), JsError> {
        self.command(Command::SetController { port, buttons })?;
        Ok(())
    }

    // Memory access methods

    /// Read a single byte from memory
    pub fn read_memory(&self, address: u16) -> u8 {
        self.memory.get(address)
    }

    /// Read a range of memory (for memory viewers)
    pub fn read_range(&self, start: u16, length: usize) -> Vec<u8> {
        let start = start as usize;
        self.memory.copy_range(start..start + length)
    }

    /// Raw 4bpp framebuffer bytes for the renderer
    pub fn framebuffer(&self) -> Vec<u8> {
        let start = FRAMEBUFFER as usize;
        self.memory.copy_range(start..start + FRAMEBUFFER_SIZE)
    }

    /// Palette RAM contents
    pub fn palette(&self) -> Vec<u8> {
        let start = PALETTE_RAM as usize;
        self.memory.copy_range(start..start + PALETTE_RAM_SIZE)
    }

    /// Disassemble `count` instructions of memory starting at `start`
    pub fn disassemble(&self, start: u16, count: usize) -> js_sys::Array {
        let bytes = self.memory.copy_range(start as usize..0x1_0000);
        disassemble(&bytes, start)
            .iter()
            .take(count)
            .map(|line| JsValue::from_str(&format!("${:04X}  {}", line.address, line.text())))
            .collect()
    }
}

impl WasmConsole {
    fn command(&mut self, command: Command) -> Result<Option<String>, JsError> {
        self.scheduler
            .handle(command)?
            .map(|event| to_json(&event))
            .transpose()
    }

    fn sync_breakpoints(&mut self) -> Result<(), JsError> {
        let addresses = self.breakpoints.resolve(&self.source_map);
        self.command(Command::SetBreakpoints(addresses))?;
        Ok(())
    }
}

fn clamp_elapsed(elapsed_ms: f64, max_catch_up: Duration) -> Duration {
    if elapsed_ms.is_nan() || elapsed_ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(elapsed_ms / 1000.0)
        .unwrap_or(max_catch_up)
        .min(max_catch_up)
}

fn to_json(event: &Event) -> Result<String, JsError> {
    Ok(serde_json::to_string(event)?)
}

fn include_map(includes: &js_sys::Object) -> HashMap<String, String> {
    js_sys::Object::entries(includes)
        .iter()
        .filter_map(|entry| {
            let pair = js_sys::Array::from(&entry);
            Some((pair.get(0).as_string()?, pair.get(1).as_string()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_elapsed() {
        let limit = Duration::from_millis(100);
        assert_eq!(clamp_elapsed(16.0, limit), Duration::from_millis(16));
        assert_eq!(clamp_elapsed(250.0, limit), limit);
        assert_eq!(clamp_elapsed(f64::INFINITY, limit), limit);
        assert_eq!(clamp_elapsed(f64::MAX, limit), limit);
        assert_eq!(clamp_elapsed(-5.0, limit), Duration::ZERO);
        assert_eq!(clamp_elapsed(f64::NAN, limit), Duration::ZERO);
    }
}
