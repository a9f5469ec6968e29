//! Source-level breakpoints
//!
//! Breakpoints are set on `(file, line)` pairs and survive reassembly. Each
//! time a new [`SourceMap`] is produced the set is resolved again, yielding the
//! address list the scheduler compares PC against. A breakpoint on a line that
//! emitted no bytes stays in the set but resolves to nothing.

use crate::assembler::source_map::SourceMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A breakpoint on a source line
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Breakpoint {
    pub file: String,
    /// Line number (1-indexed)
    pub line: usize,
}

impl Breakpoint {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Breakpoints and their addresses under the most recent source map
///
/// # Examples
///
/// ```
/// use vconsole::{assemble, Breakpoint, BreakpointSet, NoIncludes};
///
/// let mut breakpoints = BreakpointSet::new();
/// breakpoints.add(Breakpoint::new("main.asm", 2));
///
/// let output = assemble("NOP\nLD R0, #1\nHLT", "main.asm", &NoIncludes);
/// assert_eq!(breakpoints.resolve(&output.source_map), vec![0x0001]);
///
/// // Reassembly moves the line; resolving again follows it
/// let output = assemble("NOP\nNOP\nLD R0, #1", "main.asm", &NoIncludes);
/// assert_eq!(breakpoints.resolve(&output.source_map), vec![0x0001]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BreakpointSet {
    breakpoints: BTreeSet<Breakpoint>,
    resolved: BTreeMap<Breakpoint, u16>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a breakpoint. Returns false if it was already set.
    ///
    /// The new breakpoint has no address until the next [`resolve`](Self::resolve).
    pub fn add(&mut self, breakpoint: Breakpoint) -> bool {
        self.breakpoints.insert(breakpoint)
    }

    /// Removes a breakpoint. Returns false if it was not set.
    pub fn remove(&mut self, breakpoint: &Breakpoint) -> bool {
        self.resolved.remove(breakpoint);
        self.breakpoints.remove(breakpoint)
    }

    pub fn clear(&mut self) {
        self.breakpoints.clear();
        self.resolved.clear();
    }

    pub fn contains(&self, breakpoint: &Breakpoint) -> bool {
        self.breakpoints.contains(breakpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Re-resolves every breakpoint against `map`, discarding previous
    /// addresses, and returns the sorted, de-duplicated address list.
    pub fn resolve(&mut self, map: &SourceMap) -> Vec<u32> {
        self.resolved.clear();
        for breakpoint in &self.breakpoints {
            match map.address_for(&breakpoint.file, breakpoint.line) {
                Some(address) => {
                    log::debug!("breakpoint {breakpoint} at ${address:04X}");
                    self.resolved.insert(breakpoint.clone(), address);
                }
                None => log::debug!("breakpoint {breakpoint} has no code"),
            }
        }
        self.addresses()
    }

    /// Address a breakpoint resolved to, if any
    pub fn address_of(&self, breakpoint: &Breakpoint) -> Option<u16> {
        self.resolved.get(breakpoint).copied()
    }

    /// Breakpoint(s) that resolved to `address`
    pub fn at_address(&self, address: u16) -> impl Iterator<Item = &Breakpoint> {
        self.resolved
            .iter()
            .filter(move |(_, &resolved)| resolved == address)
            .map(|(breakpoint, _)| breakpoint)
    }

    /// Resolved addresses, sorted and de-duplicated
    pub fn addresses(&self) -> Vec<u32> {
        let addresses: BTreeSet<u32> = self.resolved.values().map(|&a| a as u32).collect();
        addresses.into_iter().collect()
    }
}
