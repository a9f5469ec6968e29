//! Shared memory region between the execution actor and its readers.
//!
//! The region is a single-writer/many-reader buffer: the CPU engine's
//! [`Memory`](super::Memory) is the only code allowed to store bytes, while any
//! number of cloned handles can read concurrently (renderers, debugger views).
//! Accesses use relaxed atomics, so a reader may observe a frame that is only
//! partially updated while the CPU is running. Deterministic inspection needs
//! the scheduler to be stopped first.

use super::map::MEMORY_SIZE;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A cheaply clonable handle to the console's 64KB of memory.
///
/// # Examples
///
/// ```
/// use vconsole::{assemble, Command, NoIncludes, Scheduler, SchedulerConfig, SharedMemory};
///
/// let output = assemble("LD R0, #$42\nST R0, [$1234]", "main.asm", &NoIncludes);
///
/// let shared = SharedMemory::new();
/// let mut scheduler = Scheduler::new(SchedulerConfig::default());
/// scheduler.handle(Command::Init(shared.clone())).unwrap();
/// scheduler.handle(Command::Load(output.segments)).unwrap();
/// scheduler.handle(Command::Step).unwrap();
/// scheduler.handle(Command::Step).unwrap();
///
/// // Readers see the engine's writes through their own handle
/// assert_eq!(shared.get(0x1234), 0x42);
/// ```
#[derive(Clone)]
pub struct SharedMemory {
    cells: Arc<[AtomicU8]>,
}

impl SharedMemory {
    /// Allocates a zero-filled 64KB region.
    pub fn new() -> Self {
        Self {
            cells: (0..MEMORY_SIZE).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Reads one byte. Addresses are 16-bit, so this cannot go out of range.
    pub fn get(&self, address: u16) -> u8 {
        self.cells[address as usize].load(Ordering::Relaxed)
    }

    /// Copies a range of bytes. The range is clamped to the address space.
    pub fn copy_range(&self, range: Range<usize>) -> Vec<u8> {
        let end = range.end.min(MEMORY_SIZE);
        let start = range.start.min(end);
        self.cells[start..end]
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }

    /// Copies the whole address space.
    pub fn to_vec(&self) -> Vec<u8> {
        self.copy_range(0..MEMORY_SIZE)
    }

    /// Number of live handles to this region (engine + readers).
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.cells)
    }

    pub(crate) fn set(&self, address: u16, value: u8) {
        self.cells[address as usize].store(value, Ordering::Relaxed);
    }

    pub(crate) fn fill(&self, value: u8) {
        for cell in self.cells.iter() {
            cell.store(value, Ordering::Relaxed);
        }
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemory")
            .field("size", &self.cells.len())
            .field("handles", &self.handle_count())
            .finish()
    }
}
