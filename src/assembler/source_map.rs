//! Source map correlating emitted bytes with source lines
//!
//! One entry is recorded per byte-emitting line, in emission order. The map is
//! used to resolve `(file, line)` breakpoints to addresses and to show which
//! line the CPU is executing.

use serde::{Deserialize, Serialize};

/// One `{address, file, line}` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// Address of the first byte emitted by the line
    pub address: u16,

    pub file: String,

    /// Line number (1-indexed)
    pub line: usize,
}

/// Ordered list of source map entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMap {
    entries: Vec<SourceMapEntry>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry
    pub fn add_mapping(&mut self, address: u16, file: &str, line: usize) {
        self.entries.push(SourceMapEntry {
            address,
            file: file.to_string(),
            line,
        });
    }

    /// Address of the first byte emitted for `file:line`
    ///
    /// # Examples
    ///
    /// ```
    /// use vconsole::assembler::source_map::SourceMap;
    ///
    /// let mut map = SourceMap::new();
    /// map.add_mapping(0x0000, "main.asm", 1);
    /// map.add_mapping(0x0003, "main.asm", 2);
    /// assert_eq!(map.address_for("main.asm", 2), Some(0x0003));
    /// assert_eq!(map.address_for("main.asm", 3), None);
    /// ```
    pub fn address_for(&self, file: &str, line: usize) -> Option<u16> {
        self.entries
            .iter()
            .find(|entry| entry.line == line && entry.file == file)
            .map(|entry| entry.address)
    }

    /// Source location of the line whose bytes start at `address`
    pub fn location_for(&self, address: u16) -> Option<&SourceMapEntry> {
        self.entries.iter().find(|entry| entry.address == address)
    }

    pub fn entries(&self) -> &[SourceMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_map_add_lookup() {
        let mut map = SourceMap::new();
        map.add_mapping(0x8000, "main.asm", 1);
        map.add_mapping(0x8002, "lib.asm", 4);

        let loc = map.location_for(0x8002).unwrap();
        assert_eq!(loc.file, "lib.asm");
        assert_eq!(loc.line, 4);

        assert!(map.location_for(0x9000).is_none());
        assert_eq!(map.address_for("lib.asm", 4), Some(0x8002));
        assert_eq!(map.address_for("main.asm", 4), None);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut map = SourceMap::new();
        map.add_mapping(0x10, "a.asm", 2);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"[{"address":16,"file":"a.asm","line":2}]"#);
    }
}
